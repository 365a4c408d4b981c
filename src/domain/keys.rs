//! 链专属密钥类型
//!
//! 派生出的 32 字节私钥在这里被包装成各链的签名密钥，并计算对应地址

use std::fmt;

use bitcoin::{
    secp256k1::{PublicKey, Secp256k1, SecretKey},
    Address,
};
use ed25519_dalek::{Signer, SigningKey as Ed25519SigningKey};
use k256::ecdsa::SigningKey as EcdsaSigningKey;
use sha3::{Digest, Keccak256};

use crate::error::{WalletError, WalletResult};

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ethereum
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 20 字节 Ethereum 地址，Display 输出 EIP-55 校验和格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthereumAddress(pub [u8; 20]);

impl EthereumAddress {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55: keccak(小写 hex) 对应半字节 >= 8 的字母大写
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let body: String = lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let nibble = if i % 2 == 0 {
                    hash[i / 2] >> 4
                } else {
                    hash[i / 2] & 0x0f
                };
                if c.is_ascii_alphabetic() && nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect();

        format!("0x{}", body)
    }
}

impl fmt::Display for EthereumAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

/// secp256k1 签名密钥（Ethereum）
#[derive(Clone)]
pub struct EthereumKey {
    signing_key: EcdsaSigningKey,
}

impl EthereumKey {
    pub fn from_bytes(secret: &[u8; 32]) -> WalletResult<Self> {
        let signing_key = EcdsaSigningKey::from_slice(secret)
            .map_err(|e| WalletError::InvalidKey(format!("ethereum key: {}", e)))?;
        Ok(Self { signing_key })
    }

    pub fn signing_key(&self) -> &EcdsaSigningKey {
        &self.signing_key
    }

    /// keccak256(未压缩公钥去掉 0x04 前缀) 的后 20 字节
    pub fn address(&self) -> EthereumAddress {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        EthereumAddress(out)
    }
}

impl fmt::Debug for EthereumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumKey")
            .field("address", &self.address().to_checksum())
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bitcoin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// secp256k1 签名密钥（Bitcoin，仅主网 P2WPKH）
pub struct BitcoinKey {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl BitcoinKey {
    pub fn from_bytes(secret: &[u8; 32]) -> WalletResult<Self> {
        let secret_key = SecretKey::from_slice(secret)
            .map_err(|e| WalletError::InvalidKey(format!("bitcoin key: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// 33 字节压缩公钥
    pub fn compressed_public_key(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    /// 原生 SegWit (bc1q...) 主网地址
    pub fn address(&self) -> WalletResult<Address> {
        Address::p2wpkh(
            &bitcoin::PublicKey::new(self.public_key),
            bitcoin::Network::Bitcoin,
        )
        .map_err(|e| WalletError::InvalidKey(format!("p2wpkh address: {}", e)))
    }
}

impl Drop for BitcoinKey {
    fn drop(&mut self) {
        self.secret_key.non_secure_erase();
    }
}

impl fmt::Debug for BitcoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitcoinKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Solana
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 32 字节 Solana 公钥，Display 输出 base58
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolanaPubkey(pub [u8; 32]);

impl SolanaPubkey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SolanaPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

/// ed25519 密钥对（Solana）
pub struct SolanaKeypair {
    signing_key: Ed25519SigningKey,
}

impl SolanaKeypair {
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: Ed25519SigningKey::from_bytes(secret),
        }
    }

    pub fn pubkey(&self) -> SolanaPubkey {
        SolanaPubkey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for SolanaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaKeypair")
            .field("pubkey", &self.pubkey().to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eip55_reference_vectors() {
        // EIP-55 文档里的示例地址
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        ] {
            let bytes: [u8; 20] = hex::decode(&expected[2..]).unwrap().try_into().unwrap();
            assert_eq!(EthereumAddress(bytes).to_checksum(), expected);
        }
    }

    #[test]
    fn test_ethereum_key_from_known_secret() {
        // 私钥 1 对应的公开地址
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = EthereumKey::from_bytes(&secret).unwrap();
        assert_eq!(
            key.address().to_string(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(EthereumKey::from_bytes(&[0u8; 32]).is_err());
        assert!(BitcoinKey::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_bitcoin_key_address_is_native_segwit() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = BitcoinKey::from_bytes(&secret).unwrap();
        assert_eq!(
            key.address().unwrap().to_string(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(key.compressed_public_key()[0], 0x02);
    }

    #[test]
    fn test_solana_keypair_signs() {
        use ed25519_dalek::{Signature, Verifier, VerifyingKey};

        let keypair = SolanaKeypair::from_bytes(&[7u8; 32]);
        let sig = keypair.sign(b"hello");
        let vk = VerifyingKey::from_bytes(keypair.pubkey().as_bytes()).unwrap();
        assert!(vk.verify(b"hello", &Signature::from_bytes(&sig)).is_ok());

        let rendered = keypair.pubkey().to_string();
        assert!((32..=44).contains(&rendered.len()));
    }
}
