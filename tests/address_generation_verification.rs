//! 地址生成算法验证测试
//!
//! 使用 BIP39 标准测试向量，对照独立的 BIP32 实现（coins-bip32）
//! 验证各链地址生成结果

mod common;

use coins_bip32::prelude::*;
use common::{create_imported_manager, ABANDON_MNEMONIC};
use ironvault::{
    domain::{
        chain_config::{BTC_DERIVATION_PATH, ETH_DERIVATION_PATH, ETH_TESTNET_DERIVATION_PATH},
        BitcoinKey, Chain, EthereumKey, Network,
    },
    utils::AddressValidator,
    WalletError,
};
use tempfile::TempDir;

fn oracle_secret(path: &str) -> [u8; 32] {
    let mnemonic = bip39::Mnemonic::parse(ABANDON_MNEMONIC).unwrap();
    let seed = mnemonic.to_seed("");
    let xpriv = XPriv::root_from_seed(&seed, None)
        .unwrap()
        .derive_path(&path.parse::<coins_bip32::path::DerivationPath>().unwrap())
        .unwrap();
    let signing_key: &k256::ecdsa::SigningKey = xpriv.as_ref();
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&signing_key.to_bytes());
    secret
}

/// 测试向量：
/// - Mnemonic: "abandon ... about"
/// - Expected Ethereum address: 0x9858EfFD232B4033E47d90003D41EC34EcaEda94
#[test]
fn test_ethereum_address_generation_bip39_vector() {
    let dir = TempDir::new().unwrap();
    let manager = create_imported_manager(&dir, Network::Mainnet);

    let address = manager.ethereum_address().unwrap();
    assert_eq!(
        address.to_string(),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );

    let oracle = EthereumKey::from_bytes(&oracle_secret(ETH_DERIVATION_PATH)).unwrap();
    assert_eq!(oracle.address(), address);
}

#[test]
fn test_ethereum_testnet_uses_coin_type_1() {
    let dir = TempDir::new().unwrap();
    let manager = create_imported_manager(&dir, Network::Testnet);

    let address = manager.ethereum_address().unwrap();
    assert_ne!(
        address.to_string(),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );

    let oracle = EthereumKey::from_bytes(&oracle_secret(ETH_TESTNET_DERIVATION_PATH)).unwrap();
    assert_eq!(oracle.address(), address);
    assert_eq!(manager.chain_id(), 11_155_111);
}

#[test]
fn test_bitcoin_address_generation() {
    let dir = TempDir::new().unwrap();
    let manager = create_imported_manager(&dir, Network::Mainnet);

    let address = manager.bitcoin_address().unwrap().to_string();
    assert!(address.starts_with("bc1q"), "got {}", address);
    assert_eq!(address.len(), 42);
    assert!(AddressValidator::validate(Chain::Bitcoin, &address));

    let oracle = BitcoinKey::from_bytes(&oracle_secret(BTC_DERIVATION_PATH)).unwrap();
    assert_eq!(oracle.address().unwrap().to_string(), address);
}

#[test]
fn test_bitcoin_unavailable_on_testnet() {
    let dir = TempDir::new().unwrap();
    let manager = create_imported_manager(&dir, Network::Testnet);

    assert!(matches!(
        manager.bitcoin_address(),
        Err(WalletError::UnsupportedOnTestnet(Chain::Bitcoin))
    ));
}

#[test]
fn test_solana_address_generation() {
    let dir = TempDir::new().unwrap();
    let mainnet = create_imported_manager(&dir, Network::Mainnet);
    let address = mainnet.solana_address().unwrap().to_string();
    assert!(AddressValidator::validate(Chain::Solana, &address));
    assert!((32..=44).contains(&address.len()));

    // 测试网使用不同的路径，地址不同
    mainnet.switch_network(Network::Testnet).unwrap();
    mainnet.unlock(common::PASSWORD).unwrap();
    let devnet = mainnet.solana_address().unwrap().to_string();
    assert_ne!(address, devnet);
}

#[test]
fn test_addresses_are_deterministic_across_imports() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let first = create_imported_manager(&a, Network::Mainnet);
    let second = create_imported_manager(&b, Network::Mainnet);

    assert_eq!(
        first.ethereum_address().unwrap(),
        second.ethereum_address().unwrap()
    );
    assert_eq!(
        first.bitcoin_address().unwrap(),
        second.bitcoin_address().unwrap()
    );
    assert_eq!(
        first.solana_address().unwrap(),
        second.solana_address().unwrap()
    );
}
