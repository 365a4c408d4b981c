//! 统一错误类型
//!
//! 核心库所有操作都返回 [`WalletResult`]，错误原样交给调用方，
//! 展示层（emoji、颜色、操作提示）不属于核心职责。

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::chain_config::Chain;

pub type WalletResult<T> = std::result::Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    // 密钥派生
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    // 保险库 / 生命周期
    /// 密码错误与密文被篡改在 GCM 下无法区分
    #[error("failed to decrypt vault: wrong password or corrupted data")]
    DecryptionError,

    #[error("invalid password")]
    InvalidPassword,

    #[error("wallet is locked")]
    WalletLocked,

    #[error("wallet already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{0} is not supported in testnet mode")]
    UnsupportedOnTestnet(Chain),

    // 交易构建
    #[error("invalid {chain} address '{address}': {reason}")]
    InvalidAddress {
        chain: Chain,
        address: String,
        reason: String,
    },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: trying to send {requested} but available balance is only {available}")]
    InsufficientFunds { requested: String, available: String },

    #[error("recent blockhash is missing")]
    MissingBlockhash,

    #[error("invalid blockhash encoding: {0}")]
    InvalidBlockhashEncoding(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // 基础设施
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("wallet state lock poisoned")]
    StatePoisoned,
}

impl WalletError {
    pub fn invalid_address(
        chain: Chain,
        address: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidAddress {
            chain,
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// 稳定的错误码，供 CLI / 导出层映射提示文案
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "invalid_key",
            Self::InvalidDerivationPath(_) => "invalid_derivation_path",
            Self::InvalidMnemonic(_) => "invalid_mnemonic",
            Self::DecryptionError => "decryption_failed",
            Self::InvalidPassword => "invalid_password",
            Self::WalletLocked => "wallet_locked",
            Self::AlreadyExists(_) => "wallet_already_exists",
            Self::UnsupportedOnTestnet(_) => "unsupported_on_testnet",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::MissingBlockhash => "missing_blockhash",
            Self::InvalidBlockhashEncoding(_) => "invalid_blockhash_encoding",
            Self::Signing(_) => "signing_failed",
            Self::Encryption(_) => "encryption_failed",
            Self::Storage { .. } => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::StatePoisoned => "internal",
        }
    }
}
