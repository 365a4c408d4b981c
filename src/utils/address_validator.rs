//! 地址验证模块
//!
//! 统一的收款地址解析与校验，构建交易前必须先经过这里

use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;

use crate::{
    domain::{
        chain_config::Chain,
        keys::{keccak256, EthereumAddress, SolanaPubkey},
    },
    error::{WalletError, WalletResult},
};

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 地址格式是否有效
    pub fn validate(chain: Chain, address: &str) -> bool {
        match chain {
            Chain::Ethereum => Self::parse_ethereum(address).is_ok(),
            Chain::Bitcoin => Self::parse_bitcoin(address).is_ok(),
            Chain::Solana => Self::parse_solana(address).is_ok(),
        }
    }

    /// 解析 EVM 地址（支持 EIP-55 Checksum）
    ///
    /// 全小写或全大写视为未带校验和，直接接受；大小写混合时必须通过 EIP-55
    pub fn parse_ethereum(address: &str) -> WalletResult<EthereumAddress> {
        let reject = |reason: &str| WalletError::invalid_address(Chain::Ethereum, address, reason);

        let hex_part = address
            .strip_prefix("0x")
            .ok_or_else(|| reject("missing 0x prefix"))?;

        if hex_part.len() != 40 {
            return Err(reject("expected 40 hex characters"));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(reject("contains non-hex characters"));
        }

        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && !Self::verify_eip55_checksum(hex_part) {
            return Err(reject("EIP-55 checksum mismatch"));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|e| reject(&e.to_string()))?;
        Ok(EthereumAddress(bytes))
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        let hash = keccak256(hex_part.to_ascii_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            (nibble >= 8) == ch.is_ascii_uppercase()
        })
    }

    /// 解析 Bitcoin 主网地址（P2PKH / P2SH / Bech32 / Bech32m）
    pub fn parse_bitcoin(address: &str) -> WalletResult<bitcoin::Address> {
        bitcoin::Address::<NetworkUnchecked>::from_str(address)
            .map_err(|e| WalletError::invalid_address(Chain::Bitcoin, address, e))?
            .require_network(bitcoin::Network::Bitcoin)
            .map_err(|e| WalletError::invalid_address(Chain::Bitcoin, address, e))
    }

    /// 解析 Solana 地址（base58，解码后 32 字节）
    pub fn parse_solana(address: &str) -> WalletResult<SolanaPubkey> {
        let reject = |reason: &str| WalletError::invalid_address(Chain::Solana, address, reason);

        if address.is_empty() {
            return Err(reject("empty address"));
        }
        // base58 字母表排除 0 O I l
        if let Some(bad) = address.chars().find(|c| matches!(c, '0' | 'O' | 'I' | 'l')) {
            return Err(reject(&format!("invalid base58 character '{}'", bad)));
        }

        let decoded = bs58::decode(address)
            .into_vec()
            .map_err(|e| reject(&e.to_string()))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| reject(&format!("decoded to {} bytes, expected 32", v.len())))?;

        Ok(SolanaPubkey(bytes))
    }
}
