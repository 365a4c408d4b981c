pub mod encryption;
pub mod logging;
pub mod storage;

pub use encryption::{KdfParams, Vault};
