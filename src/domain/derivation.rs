//! 钱包派生策略
//!
//! 为不同的加密曲线提供统一的私钥派生接口：
//! - secp256k1 (Ethereum, Bitcoin)：BIP32 派生树，`Bitcoin seed` 主密钥
//! - ed25519 (Solana)：`HMAC-SHA512("ed25519 seed", seed ‖ path)` 取前 32 字节
//!
//! ed25519 分支不是 SLIP-0010。它保证不同路径得到不同密钥，但与其他
//! ed25519 HD 钱包不互通；已有保险库依赖这一行为，修改前必须先有迁移方案。

use std::{fmt, str::FromStr};

use bitcoin::hashes::{hash160, Hash};
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use hmac::{Hmac, Mac};
use k256::{
    elliptic_curve::{sec1::ToEncodedPoint, PrimeField},
    FieldBytes, Scalar, SecretKey,
};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    domain::chain_config::CurveType,
    error::{WalletError, WalletResult},
};

type HmacSha512 = Hmac<Sha512>;

/// 硬化派生起始索引 (2^31)
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

const BIP32_SEED_KEY: &[u8] = b"Bitcoin seed";
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::InvalidKey(format!("hmac init failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// 32 字节大端整数 → 曲线标量，>= n 时返回 None
fn scalar_from_bytes(bytes: &[u8]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BIP32 派生路径
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 解析后的派生路径，例如 `m/44'/60'/0'/0/0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn indices(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut parts = path.trim().split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::InvalidDerivationPath(format!(
                "'{}' must start with 'm'",
                path
            )));
        }

        let indices = parts
            .map(|part| {
                let (digits, hardened) = match part
                    .strip_suffix('\'')
                    .or_else(|| part.strip_suffix('h'))
                {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                let index: u32 = digits.parse().map_err(|_| {
                    WalletError::InvalidDerivationPath(format!(
                        "'{}': bad component '{}'",
                        path, part
                    ))
                })?;
                if index >= HARDENED_OFFSET {
                    return Err(WalletError::InvalidDerivationPath(format!(
                        "'{}': index {} out of range",
                        path, index
                    )));
                }
                Ok(if hardened { index + HARDENED_OFFSET } else { index })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.0 {
            if *index >= HARDENED_OFFSET {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HD 密钥
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// BIP32 扩展私钥节点
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HdKey {
    private_key: [u8; 32],
    chain_code: [u8; 32],
    depth: u8,
    child_index: u32,
    parent_fingerprint: u32,
}

impl HdKey {
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    pub fn parent_fingerprint(&self) -> u32 {
        self.parent_fingerprint
    }

    /// 33 字节压缩公钥
    pub fn public_key(&self) -> WalletResult<[u8; 33]> {
        let secret = SecretKey::from_bytes(FieldBytes::from_slice(&self.private_key))
            .map_err(|_| WalletError::InvalidKey("private key is not a valid scalar".into()))?;
        let point = secret.public_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        Ok(out)
    }

    /// HASH160(压缩公钥) 前 4 字节
    pub fn fingerprint(&self) -> WalletResult<u32> {
        let hash = hash160::Hash::hash(&self.public_key()?).to_byte_array();
        Ok(u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]))
    }
}

impl fmt::Debug for HdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKey")
            .field("private_key", &"<redacted>")
            .field("depth", &self.depth)
            .field("child_index", &self.child_index)
            .field("parent_fingerprint", &format_args!("{:08x}", self.parent_fingerprint))
            .finish()
    }
}

/// 从种子生成主密钥
pub fn derive_master_key(seed: &[u8]) -> WalletResult<HdKey> {
    let i = hmac_sha512(BIP32_SEED_KEY, &[seed])?;
    let (il, ir) = i.split_at(32);

    let scalar = scalar_from_bytes(il)
        .ok_or_else(|| WalletError::InvalidKey("master key >= curve order".into()))?;
    if bool::from(scalar.is_zero()) {
        return Err(WalletError::InvalidKey("master key is zero".into()));
    }

    let mut key = HdKey {
        private_key: [0u8; 32],
        chain_code: [0u8; 32],
        depth: 0,
        child_index: 0,
        parent_fingerprint: 0,
    };
    key.private_key.copy_from_slice(il);
    key.chain_code.copy_from_slice(ir);
    Ok(key)
}

/// 派生单个子节点
///
/// 硬化索引混入父私钥，普通索引混入父压缩公钥。I_L >= n 或子私钥为 0 时
/// 返回 `InvalidKey`；固定路径下不会自动改用下一个索引。
pub fn derive_child(parent: &HdKey, index: u32) -> WalletResult<HdKey> {
    let index_bytes = index.to_be_bytes();
    let i = if index >= HARDENED_OFFSET {
        hmac_sha512(
            &parent.chain_code,
            &[&[0u8][..], &parent.private_key[..], &index_bytes[..]],
        )?
    } else {
        let public_key = parent.public_key()?;
        hmac_sha512(&parent.chain_code, &[&public_key[..], &index_bytes[..]])?
    };
    let (il, ir) = i.split_at(32);

    let tweak = scalar_from_bytes(il).ok_or_else(|| {
        WalletError::InvalidKey(format!("I_L >= curve order at index {}", index))
    })?;
    let parent_scalar = scalar_from_bytes(&parent.private_key)
        .ok_or_else(|| WalletError::InvalidKey("parent key >= curve order".into()))?;

    let child = tweak + parent_scalar;
    if bool::from(child.is_zero()) {
        return Err(WalletError::InvalidKey(format!(
            "child key is zero at index {}",
            index
        )));
    }

    let mut key = HdKey {
        private_key: child.to_repr().into(),
        chain_code: [0u8; 32],
        depth: parent.depth.saturating_add(1),
        child_index: index,
        parent_fingerprint: parent.fingerprint()?,
    };
    key.chain_code.copy_from_slice(ir);
    Ok(key)
}

/// 沿路径从种子派生
pub fn derive_path(seed: &[u8], path: &DerivationPath) -> WalletResult<HdKey> {
    path.indices()
        .iter()
        .try_fold(derive_master_key(seed)?, |key, index| derive_child(&key, *index))
}

/// Solana 使用的 ed25519 派生（非 SLIP-0010）
pub fn derive_ed25519(seed: &[u8], path: &str) -> WalletResult<Ed25519SigningKey> {
    let hash = hmac_sha512(ED25519_SEED_KEY, &[seed, path.as_bytes()])?;
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&hash[..32]);
    Ok(Ed25519SigningKey::from_bytes(&secret))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生策略
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    /// 从 64 字节种子沿路径派生 32 字节私钥
    fn derive_secret(&self, seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>>;
}

/// BIP32 策略 (ETH, BTC)
pub struct Secp256k1Strategy;

impl DerivationStrategy for Secp256k1Strategy {
    fn derive_secret(&self, seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
        let path: DerivationPath = path.parse()?;
        let key = derive_path(seed, &path)?;
        Ok(Zeroizing::new(*key.private_key()))
    }
}

/// seed ‖ path 哈希策略 (SOL)
pub struct Ed25519Strategy;

impl DerivationStrategy for Ed25519Strategy {
    fn derive_secret(&self, seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
        let key = derive_ed25519(seed, path)?;
        Ok(Zeroizing::new(key.to_bytes()))
    }
}

/// 策略工厂
pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    pub fn create_strategy(curve_type: CurveType) -> Box<dyn DerivationStrategy> {
        match curve_type {
            CurveType::Secp256k1 => Box::new(Secp256k1Strategy),
            CurveType::Ed25519 => Box::new(Ed25519Strategy),
        }
    }
}
