//! IronVault - 多链钱包核心库
//!
//! 单一助记词派生 Ethereum / Bitcoin / Solana 密钥，助记词以
//! scrypt + AES-256-GCM 加密保存在本地保险库中。交易在本地构建和签名，
//! 广播与链上查询由调用方负责。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{WalletError, WalletResult};
pub use service::WalletManager;

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{Chain, Lamports, Network, Satoshis, Wei},
        error::{WalletError, WalletResult},
        service::{
            transaction_builder::{
                BitcoinTransactionBuilder, BitcoinTransferRequest, EthereumTransactionBuilder,
                EthereumTransferRequest, SolanaTransactionBuilder, SolanaTransferRequest, Utxo,
            },
            ChainTransactionBuilder, SignedTransaction, WalletManager,
        },
    };
}
