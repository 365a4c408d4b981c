//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    domain::chain_config::Network,
    error::WalletResult,
    infrastructure::{encryption::KdfParams, storage},
};

pub const VAULT_FILE: &str = "wallet.vault";
pub const SESSION_FILE: &str = "session.json";
pub const NETWORK_FILE: &str = "network.txt";

pub const DEFAULT_SESSION_MINUTES: u64 = 30;
/// 会话最长一周
pub const MAX_SESSION_MINUTES: u64 = 7 * 24 * 60;

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 保险库、会话、网络文件所在目录
    pub data_dir: PathBuf,
    pub network: Network,
    pub session_duration_minutes: u64,
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LoggingConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or(defaults.level),
            format: std::env::var("LOG_FORMAT").unwrap_or(defaults.format),
        }
    }
}

/// 配置文件中出现的字段覆盖已有配置
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    network: Option<Network>,
    session_duration_minutes: Option<u64>,
    kdf: Option<KdfParams>,
    logging: Option<LoggingConfig>,
}

/// `$HOME/.ironvault`，没有 HOME 时落在当前目录
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ironvault")
}

/// 读取网络文件，不存在或内容无法识别时为 mainnet
pub fn read_network_file(data_dir: &Path) -> WalletResult<Network> {
    Ok(storage::read_text(&data_dir.join(NETWORK_FILE))?
        .map(|contents| Network::from_file_contents(&contents))
        .unwrap_or_default())
}

pub fn write_network_file(data_dir: &Path, network: Network) -> WalletResult<()> {
    storage::write_private_file(&data_dir.join(NETWORK_FILE), network.as_str().as_bytes())
}

impl Config {
    /// 指定数据目录，其余取默认值，网络从该目录的网络文件读取
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.into();
        let network = read_network_file(&data_dir)
            .with_context(|| format!("Failed to read network file in {:?}", data_dir))?;

        Ok(Self {
            data_dir,
            network,
            session_duration_minutes: DEFAULT_SESSION_MINUTES,
            kdf: KdfParams::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var_os("IRONVAULT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut config = Self::with_data_dir(data_dir)?;

        if let Ok(network) = std::env::var("IRONVAULT_NETWORK") {
            config.network = network
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid IRONVAULT_NETWORK")?;
        }
        if let Ok(minutes) = std::env::var("IRONVAULT_SESSION_MINUTES") {
            config.session_duration_minutes = minutes
                .parse()
                .with_context(|| format!("Invalid IRONVAULT_SESSION_MINUTES: {}", minutes))?;
        }
        config.logging = LoggingConfig::from_env();

        Ok(config)
    }

    /// 从配置文件加载配置（TOML）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = Self::read_file(path.as_ref())?;
        let data_dir = file.data_dir.clone().unwrap_or_else(default_data_dir);
        let mut config = Self::with_data_dir(data_dir)?;
        config.apply(file)?;
        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                let file = Self::read_file(path.as_ref())?;
                config.apply(file)?;
            }
        }

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<FileConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")
    }

    fn apply(&mut self, file: FileConfig) -> Result<()> {
        if let Some(data_dir) = file.data_dir {
            if data_dir != self.data_dir {
                // 换了目录，网络文件也要重新读
                self.network = read_network_file(&data_dir)
                    .with_context(|| format!("Failed to read network file in {:?}", data_dir))?;
                self.data_dir = data_dir;
            }
        }
        if let Some(network) = file.network {
            self.network = network;
        }
        if let Some(minutes) = file.session_duration_minutes {
            self.session_duration_minutes = minutes;
        }
        if let Some(kdf) = file.kdf {
            self.kdf = kdf;
        }
        if let Some(logging) = file.logging {
            self.logging = logging;
        }
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.session_duration_minutes == 0 || self.session_duration_minutes > MAX_SESSION_MINUTES
        {
            anyhow::bail!(
                "session duration must be between 1 and {} minutes",
                MAX_SESSION_MINUTES
            );
        }

        // N = 2^10 以下的 scrypt 强度不足
        if !self.kdf.is_within_limits() {
            anyhow::bail!("kdf parameters out of range: {:?}", self.kdf);
        }

        Ok(())
    }

    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join(VAULT_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn network_path(&self) -> PathBuf {
        self.data_dir.join(NETWORK_FILE)
    }

    pub fn session_duration(&self) -> chrono::Duration {
        let minutes = self.session_duration_minutes.min(MAX_SESSION_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }
}
