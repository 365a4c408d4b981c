//! Domain 模块
//!
//! 链配置、金额、HD 派生与各链密钥，不涉及任何 I/O

pub mod amount;
pub mod chain_config;
pub mod derivation;
pub mod keys;

// 重新导出常用类型
pub use amount::{Lamports, Satoshis, Wei};
pub use chain_config::{Chain, CurveType, Network};
pub use derivation::{DerivationPath, DerivationStrategy, DerivationStrategyFactory, HdKey};
pub use keys::{BitcoinKey, EthereumAddress, EthereumKey, SolanaKeypair, SolanaPubkey};
