//! 会话存储
//!
//! 解锁后把助记词缓存到一个仅所有者可读写的会话文件，有效期内再次解锁
//! 不必重新输入密码。会话文件与保险库同等敏感。
//!
//! 会话只有在 `now < expiration` 且网络一致时有效；任何一项校验失败
//! （过期、网络不符、文件损坏）都会直接删除会话文件。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    domain::chain_config::Network,
    error::{WalletError, WalletResult},
    infrastructure::storage,
};

const TOKEN_LEN: usize = 32;

/// 会话文件内容
#[derive(Serialize, Deserialize)]
pub struct SessionData {
    /// 32 字节随机数的 hex
    pub token: String,
    pub mnemonic: String,
    pub expiration: DateTime<Utc>,
    pub network: Network,
}

impl SessionData {
    pub fn new(mnemonic: &str, network: Network, duration: Duration) -> Self {
        let mut token = [0u8; TOKEN_LEN];
        OsRng.fill_bytes(&mut token);

        Self {
            token: hex::encode(token),
            mnemonic: mnemonic.to_string(),
            expiration: Utc::now() + duration,
            network,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, network: Network) -> bool {
        !self.is_expired_at(now) && self.network == network
    }
}

impl Drop for SessionData {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
        self.token.zeroize();
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("expiration", &self.expiration)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// 会话文件的读写
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    duration: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入新会话，覆盖旧会话
    pub fn create(&self, mnemonic: &str, network: Network) -> WalletResult<DateTime<Utc>> {
        let session = SessionData::new(mnemonic, network, self.duration);
        storage::write_json(&self.path, &session)?;
        tracing::debug!(
            network = %network,
            expiration = %session.expiration,
            "Session created"
        );
        Ok(session.expiration)
    }

    /// 读取当前网络下仍然有效的会话
    pub fn load(&self, network: Network) -> WalletResult<Option<Zeroizing<String>>> {
        self.load_at(network, Utc::now())
    }

    pub fn load_at(
        &self,
        network: Network,
        now: DateTime<Utc>,
    ) -> WalletResult<Option<Zeroizing<String>>> {
        let mut session: SessionData = match storage::read_json(&self.path) {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(WalletError::Serialization(e)) => {
                tracing::warn!(error = %e, "Session file is corrupted, discarding");
                self.clear()?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if session.is_expired_at(now) {
            tracing::info!(expiration = %session.expiration, "Session expired, discarding");
            self.clear()?;
            return Ok(None);
        }

        if session.network != network {
            tracing::info!(
                session_network = %session.network,
                current_network = %network,
                "Session belongs to another network, discarding"
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(Zeroizing::new(std::mem::take(&mut session.mnemonic))))
    }

    /// 删除会话文件，不存在也视为成功
    pub fn clear(&self) -> WalletResult<()> {
        storage::remove_file_if_exists(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MNEMONIC: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.json"), Duration::minutes(30))
    }

    #[test]
    fn test_create_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.create(MNEMONIC, Network::Mainnet).unwrap();
        let loaded = store.load(Network::Mainnet).unwrap().unwrap();
        assert_eq!(loaded.as_str(), MNEMONIC);
        assert!(store.exists());
    }

    #[test]
    fn test_session_file_layout() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(MNEMONIC, Network::Testnet).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(json["token"].as_str().unwrap().len(), 64);
        assert_eq!(json["network"], "testnet");
        assert!(json["expiration"].is_string());
    }

    #[test]
    fn test_expired_session_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let expiration = store.create(MNEMONIC, Network::Mainnet).unwrap();

        let later = expiration + Duration::seconds(1);
        assert!(store.load_at(Network::Mainnet, later).unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_expiration_boundary_is_exclusive() {
        let session = SessionData::new(MNEMONIC, Network::Mainnet, Duration::minutes(30));
        let exp = session.expiration;
        assert!(session.is_valid_at(exp - Duration::seconds(1), Network::Mainnet));
        assert!(!session.is_valid_at(exp, Network::Mainnet));
    }

    #[test]
    fn test_network_mismatch_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create(MNEMONIC, Network::Mainnet).unwrap();

        assert!(store.load(Network::Testnet).unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_corrupt_session_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), b"{\"token\": 1").unwrap();

        assert!(store.load(Network::Mainnet).unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.clear().unwrap();
        store.create(MNEMONIC, Network::Mainnet).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load(Network::Mainnet).unwrap().is_none());
    }
}
