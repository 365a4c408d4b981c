//! 统一交易构建器
//!
//! 每条链一个构建器，共享同一组能力：构建、估算手续费、签名、序列化。
//! 三条链的签名算法和线上格式互不相关，因此只共享 trait，不共享实现。
//!
//! 构建器从不访问网络：余额、nonce、gas price、费率、UTXO、blockhash
//! 都由调用方传入，签好的交易以字符串交还给调用方广播。

pub mod bitcoin;
pub mod ethereum;
pub mod solana;

#[cfg(test)]
mod tests;

use crate::{domain::chain_config::Chain, error::WalletResult};

pub use self::{
    bitcoin::{BitcoinTransactionBuilder, BitcoinTransferRequest, CoinSelector, SpendAll, Utxo},
    ethereum::{EthereumTransactionBuilder, EthereumTransferRequest},
    solana::{SolanaTransactionBuilder, SolanaTransferRequest},
};

/// 签名后的交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub chain: Chain,
    /// 线上格式原始字节
    pub raw: Vec<u8>,
    /// 交易标识：ETH 交易哈希 / BTC txid / SOL 第一个签名
    pub id: String,
}

/// 链交易构建器
pub trait ChainTransactionBuilder {
    type Request;
    type Unsigned;
    type Key;
    type Amount;

    fn chain(&self) -> Chain;

    /// 校验参数并组装未签名交易
    fn build_transaction(&self, request: &Self::Request) -> WalletResult<Self::Unsigned>;

    fn estimate_fee(&self, tx: &Self::Unsigned) -> WalletResult<Self::Amount>;

    fn sign(&self, tx: &Self::Unsigned, key: &Self::Key) -> WalletResult<SignedTransaction>;

    /// ETH 为 0x 前缀 hex，BTC 为 hex，SOL 为 base58
    fn serialize(&self, signed: &SignedTransaction) -> String;

    fn build_and_sign(&self, request: &Self::Request, key: &Self::Key) -> WalletResult<String> {
        let unsigned = self.build_transaction(request)?;
        let signed = self.sign(&unsigned, key)?;
        Ok(self.serialize(&signed))
    }
}
