//! 交易构建和签名验证测试
//!
//! 三条链通过同一个 trait 走完 构建 → 估费 → 签名 → 序列化 的流程

use super::*;
use crate::domain::{
    amount::{Lamports, Satoshis, Wei},
    chain_config::Network,
    keys::{BitcoinKey, EthereumKey, SolanaKeypair},
};

fn secret(byte: u8) -> [u8; 32] {
    let mut s = [0u8; 32];
    s[31] = byte;
    s
}

/// 泛型驱动：任何链构建器都能走完整流程
fn run_pipeline<B: ChainTransactionBuilder>(
    builder: &B,
    request: &B::Request,
    key: &B::Key,
) -> (B::Amount, SignedTransaction, String) {
    let unsigned = builder.build_transaction(request).unwrap();
    let fee = builder.estimate_fee(&unsigned).unwrap();
    let signed = builder.sign(&unsigned, key).unwrap();
    let serialized = builder.serialize(&signed);
    (fee, signed, serialized)
}

#[test]
fn test_ethereum_pipeline() {
    let key = EthereumKey::from_bytes(&secret(1)).unwrap();
    let builder = EthereumTransactionBuilder::new(Network::Mainnet);
    let request = EthereumTransferRequest {
        to: Some("0x1234567890123456789012345678901234567890".to_string()),
        value: Wei::from_decimal_str("0.1").unwrap(),
        balance: Wei::from_decimal_str("1").unwrap(),
        nonce: 0,
        gas_price: Wei(20_000_000_000),
        gas_limit: None,
        data: Vec::new(),
    };

    let (fee, signed, serialized) = run_pipeline(&builder, &request, &key);
    assert_eq!(fee, Wei(20_000_000_000 * 21_000));
    assert_eq!(signed.chain, Chain::Ethereum);
    assert!(serialized.starts_with("0x"));
    assert!(signed.id.starts_with("0x") && signed.id.len() == 66);

    // build_and_sign 与分步流程结果一致（RFC 6979 确定性签名）
    assert_eq!(builder.build_and_sign(&request, &key).unwrap(), serialized);
}

#[test]
fn test_bitcoin_pipeline() {
    let key = BitcoinKey::from_bytes(&secret(1)).unwrap();
    let builder = BitcoinTransactionBuilder::new(Network::Mainnet);
    let request = BitcoinTransferRequest {
        from: key.address().unwrap().to_string(),
        to: "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string(),
        value: Satoshis(50_000),
        utxos: vec![Utxo {
            txid: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".to_string(),
            output_index: 0,
            value: Satoshis(100_000),
            script_pubkey: None,
        }],
        fee_rate: None,
    };

    let (fee, signed, serialized) = run_pipeline(&builder, &request, &key);
    // 默认费率 10 sat/byte，带找零输出
    assert_eq!(fee, Satoshis(1_880));
    assert_eq!(signed.chain, Chain::Bitcoin);
    assert_eq!(signed.id.len(), 64);
    assert!(hex::decode(&serialized).is_ok());
}

#[test]
fn test_solana_pipeline() {
    let key = SolanaKeypair::from_bytes(&secret(1));
    let builder = SolanaTransactionBuilder::new();
    let request = SolanaTransferRequest {
        from: key.pubkey().to_string(),
        to: SolanaKeypair::from_bytes(&secret(2)).pubkey().to_string(),
        lamports: Lamports::from_decimal_str("0.5").unwrap(),
        balance: Lamports::from_decimal_str("1").unwrap(),
        recent_blockhash: bs58::encode([3u8; 32]).into_string(),
    };

    let (fee, signed, serialized) = run_pipeline(&builder, &request, &key);
    assert_eq!(fee, Lamports(5_000));
    assert_eq!(signed.chain, Chain::Solana);
    assert_eq!(bs58::decode(&serialized).into_vec().unwrap(), signed.raw);
}

#[test]
fn test_chain_tags() {
    assert_eq!(EthereumTransactionBuilder::new(Network::Testnet).chain(), Chain::Ethereum);
    assert_eq!(BitcoinTransactionBuilder::new(Network::Mainnet).chain(), Chain::Bitcoin);
    assert_eq!(SolanaTransactionBuilder::new().chain(), Chain::Solana);
}
