//! Bitcoin 交易构建（P2WPKH，仅主网）
//!
//! 费用按估算体积计算：`10 + 110 * 输入数 + 34 * 输出数` 字节 × 费率。
//! 找零不足粉尘阈值时并入手续费；追加找零输出后只重新估算一次费用，
//! 不做多轮协商。

use std::str::FromStr;

use ::bitcoin::{
    absolute::LockTime,
    consensus::encode::serialize,
    hashes::Hash,
    secp256k1::{Message, Secp256k1},
    sighash::{EcdsaSighashType, SighashCache},
    transaction::Version,
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use super::{ChainTransactionBuilder, SignedTransaction};
use crate::{
    domain::{
        amount::Satoshis,
        chain_config::{Chain, Network},
        keys::BitcoinKey,
    },
    error::{WalletError, WalletResult},
    utils::address_validator::AddressValidator,
};

/// 粉尘阈值（satoshi）
pub const DUST_LIMIT: u64 = 546;
/// 费率查询失败时的默认值（sat/byte）
pub const DEFAULT_FEE_RATE: u64 = 10;

const TX_OVERHEAD: u64 = 10;
const INPUT_SIZE: u64 = 110;
const OUTPUT_SIZE: u64 = 34;

/// P2WPKH 形状的交易体积估算
pub fn estimate_tx_size(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD + INPUT_SIZE * inputs as u64 + OUTPUT_SIZE * outputs as u64
}

/// 一次费用规划的结果，满足 `total_input == value + fee + change`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePlan {
    pub fee: Satoshis,
    pub change: Satoshis,
    pub tx_size: u64,
}

impl FeePlan {
    pub fn has_change(&self) -> bool {
        self.change > Satoshis::ZERO
    }
}

/// 找零结算，返回 (fee, change)
///
/// - `0 < change < 546`：找零并入手续费
/// - 否则追加找零输出，手续费增加一个输出的体积 × 费率，并从找零中扣除；
///   扣除后低于粉尘阈值时整笔找零并入手续费
pub fn settle_change(total_input: u64, value: u64, estimated_fee: u64, fee_rate: u64) -> (u64, u64) {
    let change = total_input.saturating_sub(value).saturating_sub(estimated_fee);

    if change == 0 {
        return (estimated_fee, 0);
    }
    if change < DUST_LIMIT {
        return (estimated_fee + change, 0);
    }

    let delta = OUTPUT_SIZE * fee_rate;
    match change.checked_sub(delta) {
        Some(reduced) if reduced >= DUST_LIMIT => (estimated_fee + delta, reduced),
        _ => (estimated_fee + change, 0),
    }
}

/// 计算手续费与找零
pub fn plan_fee(total_input: u64, value: u64, inputs: usize, fee_rate: u64) -> WalletResult<FeePlan> {
    let base_size = estimate_tx_size(inputs, 1);
    let estimated_fee = base_size
        .checked_mul(fee_rate)
        .ok_or_else(|| WalletError::InvalidTransaction("fee overflows u64".into()))?;

    let required = value
        .checked_add(estimated_fee)
        .ok_or_else(|| WalletError::InvalidTransaction("value + fee overflows u64".into()))?;
    if total_input < required {
        return Err(WalletError::InsufficientFunds {
            requested: format!(
                "{} (including {} fee)",
                Satoshis(required),
                Satoshis(estimated_fee)
            ),
            available: Satoshis(total_input).to_string(),
        });
    }

    let (fee, change) = settle_change(total_input, value, estimated_fee, fee_rate);
    let tx_size = if change > 0 {
        estimate_tx_size(inputs, 2)
    } else {
        base_size
    };

    Ok(FeePlan {
        fee: Satoshis(fee),
        change: Satoshis(change),
        tx_size,
    })
}

/// 可花费输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// 显示格式（字节反序）的交易 id
    pub txid: String,
    pub output_index: u32,
    pub value: Satoshis,
    /// 提供时必须与发送方地址的脚本一致
    pub script_pubkey: Option<ScriptBuf>,
}

/// 选币策略
pub trait CoinSelector {
    fn select(&self, utxos: &[Utxo], target: Satoshis) -> Vec<Utxo>;
}

/// 花掉全部 UTXO，不做子集选择
#[derive(Debug, Clone, Copy, Default)]
pub struct SpendAll;

impl CoinSelector for SpendAll {
    fn select(&self, utxos: &[Utxo], _target: Satoshis) -> Vec<Utxo> {
        utxos.to_vec()
    }
}

#[derive(Debug, Clone)]
pub struct BitcoinTransferRequest {
    pub from: String,
    pub to: String,
    pub value: Satoshis,
    pub utxos: Vec<Utxo>,
    /// sat/byte，None 时使用默认费率
    pub fee_rate: Option<u64>,
}

/// 待签名交易
#[derive(Debug, Clone)]
pub struct UnsignedBitcoinTransaction {
    pub tx: Transaction,
    pub inputs: Vec<Utxo>,
    pub sender_script: ScriptBuf,
    pub value: Satoshis,
    pub fee_rate: u64,
    pub plan: FeePlan,
}

/// Bitcoin 交易构建器
#[derive(Debug, Clone)]
pub struct BitcoinTransactionBuilder<S = SpendAll> {
    network: Network,
    selector: S,
}

impl BitcoinTransactionBuilder<SpendAll> {
    pub fn new(network: Network) -> Self {
        Self::with_selector(network, SpendAll)
    }
}

impl<S: CoinSelector> BitcoinTransactionBuilder<S> {
    pub fn with_selector(network: Network, selector: S) -> Self {
        Self { network, selector }
    }
}

impl<S: CoinSelector> ChainTransactionBuilder for BitcoinTransactionBuilder<S> {
    type Request = BitcoinTransferRequest;
    type Unsigned = UnsignedBitcoinTransaction;
    type Key = BitcoinKey;
    type Amount = Satoshis;

    fn chain(&self) -> Chain {
        Chain::Bitcoin
    }

    fn build_transaction(&self, request: &Self::Request) -> WalletResult<Self::Unsigned> {
        if !Chain::Bitcoin.supports(self.network) {
            return Err(WalletError::UnsupportedOnTestnet(Chain::Bitcoin));
        }

        let sender = AddressValidator::parse_bitcoin(&request.from)?;
        let recipient = AddressValidator::parse_bitcoin(&request.to)?;
        let sender_script = sender.script_pubkey();

        if request.value.get() < DUST_LIMIT {
            return Err(WalletError::InvalidTransaction(format!(
                "amount {} is below the dust limit of {} sat",
                request.value, DUST_LIMIT
            )));
        }

        let fee_rate = match request.fee_rate {
            Some(0) => {
                return Err(WalletError::InvalidTransaction(
                    "fee rate must be greater than zero".into(),
                ))
            }
            Some(rate) => rate,
            None => {
                tracing::warn!(fee_rate = DEFAULT_FEE_RATE, "Fee rate not provided, using default");
                DEFAULT_FEE_RATE
            }
        };

        let inputs = self.selector.select(&request.utxos, request.value);
        if let Some(foreign) = inputs
            .iter()
            .find(|u| matches!(&u.script_pubkey, Some(script) if *script != sender_script))
        {
            return Err(WalletError::InvalidTransaction(format!(
                "UTXO {}:{} is not owned by {}",
                foreign.txid, foreign.output_index, request.from
            )));
        }

        let total_input = inputs
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.value.get()))
            .ok_or_else(|| WalletError::InvalidTransaction("UTXO total overflows u64".into()))?;

        let plan = plan_fee(total_input, request.value.get(), inputs.len(), fee_rate)?;

        let input = inputs
            .iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.txid).map_err(|e| {
                    WalletError::InvalidTransaction(format!("invalid txid '{}': {}", utxo.txid, e))
                })?;
                Ok(TxIn {
                    previous_output: OutPoint::new(txid, utxo.output_index),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        let mut output = vec![TxOut {
            value: Amount::from_sat(request.value.get()),
            script_pubkey: recipient.script_pubkey(),
        }];
        if plan.has_change() {
            output.push(TxOut {
                value: Amount::from_sat(plan.change.get()),
                script_pubkey: sender_script.clone(),
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };

        tracing::info!(
            inputs = inputs.len(),
            value = %request.value,
            fee = %plan.fee,
            change = %plan.change,
            fee_rate,
            "Built Bitcoin transaction"
        );

        Ok(UnsignedBitcoinTransaction {
            tx,
            inputs,
            sender_script,
            value: request.value,
            fee_rate,
            plan,
        })
    }

    fn estimate_fee(&self, tx: &Self::Unsigned) -> WalletResult<Satoshis> {
        Ok(tx.plan.fee)
    }

    /// 每个输入做 BIP-143 签名，witness 为 [DER 签名 ‖ SIGHASH_ALL, 压缩公钥]
    fn sign(&self, unsigned: &Self::Unsigned, key: &BitcoinKey) -> WalletResult<SignedTransaction> {
        let key_script = key.address()?.script_pubkey();
        if key_script != unsigned.sender_script {
            return Err(WalletError::Signing(
                "signing key does not control the sender address".into(),
            ));
        }

        let secp = Secp256k1::signing_only();
        let mut tx = unsigned.tx.clone();
        let mut witnesses = Vec::with_capacity(unsigned.inputs.len());
        {
            let mut cache = SighashCache::new(&tx);
            for (index, utxo) in unsigned.inputs.iter().enumerate() {
                let sighash = cache
                    .p2wpkh_signature_hash(
                        index,
                        &unsigned.sender_script,
                        Amount::from_sat(utxo.value.get()),
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| WalletError::Signing(format!("input {}: {}", index, e)))?;

                let message = Message::from_digest(sighash.to_byte_array());
                let signature = secp.sign_ecdsa(&message, key.secret_key());

                let mut sig_bytes = signature.serialize_der().to_vec();
                sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);

                let mut witness = Witness::new();
                witness.push(sig_bytes);
                witness.push(key.compressed_public_key());
                witnesses.push(witness);
            }
        }

        for (input, witness) in tx.input.iter_mut().zip(witnesses) {
            input.witness = witness;
        }

        Ok(SignedTransaction {
            chain: Chain::Bitcoin,
            raw: serialize(&tx),
            id: tx.txid().to_string(),
        })
    }

    fn serialize(&self, signed: &SignedTransaction) -> String {
        hex::encode(&signed.raw)
    }
}

/// 地址对应的 scriptPubKey，调用方可用于筛选 UTXO
pub fn sender_script(address: &str) -> WalletResult<ScriptBuf> {
    Ok(AddressValidator::parse_bitcoin(address)?.script_pubkey())
}
