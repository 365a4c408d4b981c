//! Ethereum 交易构建（legacy 交易 + EIP-155 重放保护）

use rlp::RlpStream;

use super::{ChainTransactionBuilder, SignedTransaction};
use crate::{
    domain::{
        amount::Wei,
        chain_config::{chain_id_for, Chain, Network},
        keys::{keccak256, EthereumAddress, EthereumKey},
    },
    error::{WalletError, WalletResult},
    utils::address_validator::AddressValidator,
};

/// 普通转账的固定 gas
pub const BASE_TRANSFER_GAS: u64 = 21_000;
/// calldata 每字节按非零字节计
pub const GAS_PER_DATA_BYTE: u64 = 16;
/// 调用方在网络报价上额外加的比例
pub const DEFAULT_GAS_PRICE_BUFFER_PERCENT: u32 = 20;

/// 没有 gas limit 时的保守估计
pub fn estimate_gas_limit(data: &[u8]) -> u64 {
    BASE_TRANSFER_GAS.saturating_add(GAS_PER_DATA_BYTE.saturating_mul(data.len() as u64))
}

/// gas price 上浮 `percent`%，溢出时取上限
pub fn apply_gas_price_buffer(gas_price: Wei, percent: u32) -> Wei {
    Wei(gas_price
        .get()
        .checked_mul(100 + percent as u128)
        .map(|v| v / 100)
        .unwrap_or(u128::MAX))
}

/// 大端整数去掉前导 0（RLP 标量编码）
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn append_u128(stream: &mut RlpStream, value: u128) {
    stream.append(&trim_leading_zeros(&value.to_be_bytes()));
}

/// 转账请求，余额与 nonce 由调用方查询后传入
#[derive(Debug, Clone)]
pub struct EthereumTransferRequest {
    pub nonce: u64,
    pub gas_price: Wei,
    /// None 时按 `estimate_gas_limit(data)` 估算
    pub gas_limit: Option<u64>,
    pub to: Option<String>,
    pub value: Wei,
    pub data: Vec<u8>,
    pub balance: Wei,
}

/// 待签名交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEthereumTransaction {
    pub nonce: u64,
    pub gas_price: Wei,
    pub gas_limit: u64,
    pub to: EthereumAddress,
    pub value: Wei,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl UnsignedEthereumTransaction {
    pub fn fee(&self) -> WalletResult<Wei> {
        self.gas_price
            .get()
            .checked_mul(self.gas_limit as u128)
            .map(Wei)
            .ok_or_else(|| WalletError::InvalidTransaction("fee overflows u128".into()))
    }

    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        append_u128(stream, self.gas_price.get());
        stream.append(&self.gas_limit);
        stream.append(&self.to.as_bytes().to_vec());
        append_u128(stream, self.value.get());
        stream.append(&self.data);
    }

    /// EIP-155 签名原文：[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        stream.out().to_vec()
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }
}

/// Ethereum 交易构建器
#[derive(Debug, Clone)]
pub struct EthereumTransactionBuilder {
    chain_id: u64,
}

impl EthereumTransactionBuilder {
    /// 主网 chainId 1，测试网 Sepolia 11155111
    pub fn new(network: Network) -> Self {
        Self::with_chain_id(chain_id_for(network))
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl ChainTransactionBuilder for EthereumTransactionBuilder {
    type Request = EthereumTransferRequest;
    type Unsigned = UnsignedEthereumTransaction;
    type Key = EthereumKey;
    type Amount = Wei;

    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    fn build_transaction(&self, request: &Self::Request) -> WalletResult<Self::Unsigned> {
        // 金额是无符号类型，value < 0 在类型层面不可能出现
        let to = request
            .to
            .as_deref()
            .ok_or_else(|| WalletError::InvalidTransaction("recipient address is missing".into()))?;
        let to = AddressValidator::parse_ethereum(to)?;

        if request.gas_price == Wei::ZERO {
            return Err(WalletError::InvalidTransaction(
                "gas price must be greater than zero".into(),
            ));
        }

        let gas_limit = match request.gas_limit {
            Some(0) => {
                return Err(WalletError::InvalidTransaction(
                    "gas limit must be greater than zero".into(),
                ))
            }
            Some(limit) => limit,
            None => {
                let estimated = estimate_gas_limit(&request.data);
                tracing::warn!(gas_limit = estimated, "Gas limit not provided, using estimate");
                estimated
            }
        };

        let tx = UnsignedEthereumTransaction {
            nonce: request.nonce,
            gas_price: request.gas_price,
            gas_limit,
            to,
            value: request.value,
            data: request.data.clone(),
            chain_id: self.chain_id,
        };

        // 先单独比较金额，再比较金额 + 手续费
        if request.value > request.balance {
            return Err(WalletError::InsufficientFunds {
                requested: request.value.to_string(),
                available: request.balance.to_string(),
            });
        }

        let fee = tx.fee()?;
        let total = request
            .value
            .checked_add(fee)
            .ok_or_else(|| WalletError::InvalidTransaction("value + fee overflows u128".into()))?;
        if total > request.balance {
            return Err(WalletError::InsufficientFunds {
                requested: format!("{} (including {} fee)", total, fee),
                available: request.balance.to_string(),
            });
        }

        tracing::info!(
            chain_id = self.chain_id,
            nonce = tx.nonce,
            to = %tx.to,
            value = %tx.value,
            fee = %fee,
            "Built Ethereum transaction"
        );
        Ok(tx)
    }

    fn estimate_fee(&self, tx: &Self::Unsigned) -> WalletResult<Wei> {
        tx.fee()
    }

    fn sign(&self, tx: &Self::Unsigned, key: &EthereumKey) -> WalletResult<SignedTransaction> {
        let hash = tx.signing_hash();
        let (signature, recovery_id) = key
            .signing_key()
            .sign_prehash_recoverable(&hash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        let v = u64::from(recovery_id.to_byte()) + 35 + tx.chain_id * 2;
        let r = signature.r().to_bytes();
        let s = signature.s().to_bytes();

        let mut stream = RlpStream::new_list(9);
        tx.append_body(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&r));
        stream.append(&trim_leading_zeros(&s));
        let raw = stream.out().to_vec();

        let id = format!("0x{}", hex::encode(keccak256(&raw)));
        Ok(SignedTransaction {
            chain: Chain::Ethereum,
            raw,
            id,
        })
    }

    fn serialize(&self, signed: &SignedTransaction) -> String {
        format!("0x{}", hex::encode(&signed.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn key() -> EthereumKey {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        EthereumKey::from_bytes(&secret).unwrap()
    }

    fn request() -> EthereumTransferRequest {
        EthereumTransferRequest {
            nonce: 3,
            gas_price: Wei(20_000_000_000),
            gas_limit: Some(21_000),
            to: Some(RECIPIENT.to_string()),
            value: Wei(10_000_000_000_000_000),
            data: Vec::new(),
            balance: Wei(1_000_000_000_000_000_000),
        }
    }

    #[test]
    fn test_gas_helpers() {
        assert_eq!(estimate_gas_limit(&[]), 21_000);
        assert_eq!(estimate_gas_limit(&[0xa9, 0x05, 0x9c, 0xbb]), 21_064);
        assert_eq!(
            apply_gas_price_buffer(Wei(10_000_000_000), DEFAULT_GAS_PRICE_BUFFER_PERCENT),
            Wei(12_000_000_000)
        );
        assert_eq!(apply_gas_price_buffer(Wei(u128::MAX), 20), Wei(u128::MAX));
    }

    #[test]
    fn test_missing_gas_limit_is_estimated() {
        let builder = EthereumTransactionBuilder::new(Network::Mainnet);
        let mut req = request();
        req.gas_limit = None;
        req.data = vec![1, 2];

        let tx = builder.build_transaction(&req).unwrap();
        assert_eq!(tx.gas_limit, 21_032);
    }

    #[test]
    fn test_validation_errors() {
        let builder = EthereumTransactionBuilder::new(Network::Mainnet);

        let mut req = request();
        req.to = None;
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::InvalidTransaction(_))
        ));

        let mut req = request();
        req.gas_price = Wei::ZERO;
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::InvalidTransaction(_))
        ));

        let mut req = request();
        req.gas_limit = Some(0);
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::InvalidTransaction(_))
        ));

        let mut req = request();
        req.to = Some("0x1234".into());
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::InvalidAddress { chain: Chain::Ethereum, .. })
        ));
    }

    #[test]
    fn test_insufficient_funds_reports_eth_amounts() {
        let builder = EthereumTransactionBuilder::new(Network::Mainnet);
        let mut req = request();
        req.balance = Wei(100_000_000_000_000_000);
        req.value = Wei(200_000_000_000_000_000);

        match builder.build_transaction(&req) {
            Err(WalletError::InsufficientFunds {
                requested,
                available,
            }) => {
                assert_eq!(requested, "0.2 ETH");
                assert_eq!(available, "0.1 ETH");
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_fee_pushes_total_over_balance() {
        let builder = EthereumTransactionBuilder::new(Network::Mainnet);
        let mut req = request();
        // 金额恰好等于余额，加上手续费后不足
        req.value = req.balance;

        let err = builder.build_transaction(&req).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert!(err.to_string().contains("0.00042 ETH"));
    }

    #[test]
    fn test_signature_recovers_sender_with_eip155_v() {
        for (network, chain_id) in [(Network::Mainnet, 1u64), (Network::Testnet, 11_155_111)] {
            let builder = EthereumTransactionBuilder::new(network);
            let tx = builder.build_transaction(&request()).unwrap();
            let signed = builder.sign(&tx, &key()).unwrap();

            let decoded = rlp::Rlp::new(&signed.raw);
            assert_eq!(decoded.item_count().unwrap(), 9);
            assert_eq!(decoded.val_at::<u64>(0).unwrap(), 3);

            let v: u64 = decoded.val_at(6).unwrap();
            assert!(v == chain_id * 2 + 35 || v == chain_id * 2 + 36);

            let r: Vec<u8> = decoded.val_at(7).unwrap();
            let s: Vec<u8> = decoded.val_at(8).unwrap();
            let mut rs = [0u8; 64];
            rs[32 - r.len()..32].copy_from_slice(&r);
            rs[64 - s.len()..].copy_from_slice(&s);

            let signature = Signature::from_slice(&rs).unwrap();
            let recid = RecoveryId::from_byte((v - 35 - chain_id * 2) as u8).unwrap();
            let recovered =
                VerifyingKey::recover_from_prehash(&tx.signing_hash(), &signature, recid).unwrap();
            assert_eq!(&recovered, key().signing_key().verifying_key());
        }
    }

    #[test]
    fn test_serialize_and_id() {
        let builder = EthereumTransactionBuilder::new(Network::Mainnet);
        let raw = builder.build_and_sign(&request(), &key()).unwrap();
        assert!(raw.starts_with("0x"));

        let tx = builder.build_transaction(&request()).unwrap();
        let signed = builder.sign(&tx, &key()).unwrap();
        assert_eq!(builder.serialize(&signed), raw);
        assert_eq!(signed.id, format!("0x{}", hex::encode(keccak256(&signed.raw))));
        assert_eq!(signed.id.len(), 66);
    }
}
