pub mod session;
pub mod transaction_builder;
pub mod wallet_manager;

pub use session::SessionStore;
pub use transaction_builder::{ChainTransactionBuilder, SignedTransaction};
pub use wallet_manager::WalletManager;
