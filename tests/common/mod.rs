//! 测试辅助模块
//! 提供临时数据目录和低成本 KDF 参数的钱包管理器

#![allow(dead_code)]

use ironvault::{
    config::Config, domain::Network, infrastructure::KdfParams, WalletManager,
};
use tempfile::TempDir;

/// BIP39 标准测试向量
pub const ABANDON_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const PASSWORD: &str = "correct horse battery staple";

/// 测试用 scrypt 参数（N = 2^10）
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        log_n: 10,
        r: 8,
        p: 1,
    }
}

pub fn test_config(dir: &TempDir, network: Network) -> Config {
    let mut config = Config::with_data_dir(dir.path()).expect("Failed to build test config");
    config.network = network;
    config.kdf = fast_kdf();
    config
}

/// 创建测试钱包管理器
pub fn create_test_manager(dir: &TempDir) -> WalletManager {
    WalletManager::new(test_config(dir, Network::Mainnet))
}

/// 导入标准测试助记词
pub fn create_imported_manager(dir: &TempDir, network: Network) -> WalletManager {
    let manager = WalletManager::new(test_config(dir, network));
    manager
        .import(ABANDON_MNEMONIC, PASSWORD)
        .expect("Failed to import test mnemonic");
    manager
}
