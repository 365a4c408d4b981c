//! 助记词保险库
//!
//! scrypt 从密码派生 32 字节密钥，AES-256-GCM 加密 `{mnemonic, version}`。
//! 持久化结构只包含 salt / nonce / 密文和 scrypt 参数，派生密钥与明文只在
//! 加解密期间短暂存在，用完即清零。

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const VAULT_VERSION: u32 = 1;

/// scrypt 参数（N = 2^log_n）
///
/// 早期保险库文件没有这个字段，读取时按 (15, 8, 1) 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: 15, // N = 32768
            r: 8,
            p: 1,
        }
    }
}

/// 可接受的 scrypt 参数范围，内存占用约为 128 · r · 2^log_n 字节
const LOG_N_RANGE: std::ops::RangeInclusive<u8> = 10..=20;
const MAX_R: u32 = 16;
const MAX_P: u32 = 16;

impl KdfParams {
    /// 参数是否落在可接受范围内
    ///
    /// 新建保险库和读取磁盘上的保险库都用同一套上限
    pub fn is_within_limits(&self) -> bool {
        LOG_N_RANGE.contains(&self.log_n)
            && (1..=MAX_R).contains(&self.r)
            && (1..=MAX_P).contains(&self.p)
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
        let params = scrypt::Params::new(self.log_n, self.r, self.p, KEY_LEN)
            .map_err(|e| WalletError::Encryption(format!("invalid scrypt params: {}", e)))?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        scrypt::scrypt(password.as_bytes(), salt, &params, &mut key[..])
            .map_err(|e| WalletError::Encryption(format!("scrypt failed: {}", e)))?;
        Ok(key)
    }
}

/// 加密前的明文结构
#[derive(Serialize, Deserialize)]
struct VaultPayload<S> {
    mnemonic: S,
    version: u32,
}

/// 持久化的保险库
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    #[serde(with = "base64_bytes")]
    salt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    data: Vec<u8>,
    #[serde(default)]
    kdf: KdfParams,
}

impl Vault {
    /// 用默认 scrypt 参数加密助记词
    pub fn create(mnemonic: &str, password: &str) -> WalletResult<Self> {
        Self::create_with_params(mnemonic, password, KdfParams::default())
    }

    /// 每次调用都生成新的随机 salt 和 nonce
    pub fn create_with_params(
        mnemonic: &str,
        password: &str,
        kdf: KdfParams,
    ) -> WalletResult<Self> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key = kdf.derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| WalletError::Encryption(format!("invalid key: {}", e)))?;

        let plaintext = Zeroizing::new(serde_json::to_vec(&VaultPayload {
            mnemonic,
            version: VAULT_VERSION,
        })?);

        let data = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| WalletError::Encryption(format!("encryption failed: {}", e)))?;

        Ok(Self {
            salt,
            nonce,
            data,
            kdf,
        })
    }

    /// 解密出助记词
    ///
    /// 密码错误、密文或 nonce 被篡改都返回 `DecryptionError`
    pub fn decrypt(&self, password: &str) -> WalletResult<Zeroizing<String>> {
        if self.nonce.len() != NONCE_LEN {
            return Err(WalletError::DecryptionError);
        }
        // 被篡改的参数可能让 scrypt 申请上 PB 级内存
        if !self.kdf.is_within_limits() {
            tracing::warn!(kdf = ?self.kdf, "Vault scrypt parameters out of range");
            return Err(WalletError::DecryptionError);
        }

        let key = self.kdf.derive_key(password, &self.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| WalletError::Encryption(format!("invalid key: {}", e)))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&self.nonce), self.data.as_slice())
                .map_err(|_| WalletError::DecryptionError)?,
        );

        let mut payload: VaultPayload<String> =
            serde_json::from_slice(&plaintext).map_err(|_| WalletError::DecryptionError)?;
        let mnemonic = Zeroizing::new(std::mem::take(&mut payload.mnemonic));
        Ok(mnemonic)
    }

    /// 只判断密码是否正确，不返回明文
    pub fn validate_password(&self, password: &str) -> bool {
        self.decrypt(password).is_ok()
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("salt_len", &self.salt.len())
            .field("data_len", &self.data.len())
            .field("kdf", &self.kdf)
            .finish()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
