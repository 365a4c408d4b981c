//! Solana 交易构建（System Program 转账，legacy 消息格式）
//!
//! 手续费按每个签名 5000 lamports 固定计算，不查询链上费用。

use super::{ChainTransactionBuilder, SignedTransaction};
use crate::{
    domain::{
        amount::Lamports,
        chain_config::Chain,
        keys::{SolanaKeypair, SolanaPubkey},
    },
    error::{WalletError, WalletResult},
    utils::address_validator::AddressValidator,
};

/// 每个签名的固定手续费
pub const LAMPORTS_PER_SIGNATURE: u64 = 5000;

/// System Program id（全 0 公钥）
pub const SYSTEM_PROGRAM_ID: SolanaPubkey = SolanaPubkey([0u8; 32]);

/// SystemInstruction::Transfer 的枚举下标
const SYSTEM_TRANSFER_TAG: u32 = 2;

/// 校验并解码 recent blockhash
pub fn validate_blockhash(blockhash: &str) -> WalletResult<[u8; 32]> {
    if blockhash.is_empty() {
        return Err(WalletError::MissingBlockhash);
    }
    if let Some(bad) = blockhash
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() || matches!(c, '0' | 'O' | 'I' | 'l'))
    {
        return Err(WalletError::InvalidBlockhashEncoding(format!(
            "invalid base58 character '{}'",
            bad
        )));
    }
    // 32 字节的 base58 编码至少 32 个字符
    if blockhash.len() < 32 {
        return Err(WalletError::InvalidBlockhashEncoding(format!(
            "too short: {} characters",
            blockhash.len()
        )));
    }

    let decoded = bs58::decode(blockhash)
        .into_vec()
        .map_err(|e| WalletError::InvalidBlockhashEncoding(e.to_string()))?;
    decoded.try_into().map_err(|bytes: Vec<u8>| {
        WalletError::InvalidBlockhashEncoding(format!("decoded to {} bytes, expected 32", bytes.len()))
    })
}

/// compact-u16 长度前缀
pub(crate) fn encode_short_vec_len(out: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: SolanaPubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: SolanaPubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// System Program 转账指令
pub fn system_transfer(from: SolanaPubkey, to: SolanaPubkey, lamports: Lamports) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.get().to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta {
                pubkey: from,
                is_signer: true,
                is_writable: true,
            },
            AccountMeta {
                pubkey: to,
                is_signer: false,
                is_writable: true,
            },
        ],
        data,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// 编译后的 legacy 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<SolanaPubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// 账户排序：付款人第一，其后依次为 可写签名者、只读签名者、可写非签名者、只读非签名者。
    /// 同一公钥多次出现时合并权限。
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: SolanaPubkey,
        recent_blockhash: [u8; 32],
    ) -> WalletResult<Self> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta {
            pubkey: fee_payer,
            is_signer: true,
            is_writable: true,
        }];

        let mut merge = |meta: AccountMeta| {
            match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => metas.push(meta),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(*meta);
            }
            merge(AccountMeta {
                pubkey: ix.program_id,
                is_signer: false,
                is_writable: false,
            });
        }

        let (payer, rest) = metas.split_at(1);
        let rank = |m: &AccountMeta| match (m.is_signer, m.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        let mut ordered: Vec<AccountMeta> = rest.to_vec();
        // 稳定排序，组内保持首次出现的顺序
        ordered.sort_by_key(rank);
        ordered.insert(0, payer[0]);

        if ordered.len() > u8::MAX as usize {
            return Err(WalletError::InvalidTransaction(
                "too many accounts in message".into(),
            ));
        }

        let count = |signer: bool, writable: bool| {
            ordered
                .iter()
                .filter(|m| m.is_signer == signer && m.is_writable == writable)
                .count() as u8
        };
        let header = MessageHeader {
            num_required_signatures: ordered.iter().filter(|m| m.is_signer).count() as u8,
            num_readonly_signed_accounts: count(true, false),
            num_readonly_unsigned_accounts: count(false, false),
        };

        let account_keys: Vec<SolanaPubkey> = ordered.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &SolanaPubkey| {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| WalletError::InvalidTransaction(format!("account {} not in message", key)))
        };

        let instructions = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<WalletResult<Vec<_>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn fee_payer(&self) -> Option<&SolanaPubkey> {
        self.account_keys.first()
    }

    /// 线上格式，即签名的原文
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + 1 + 32 * self.account_keys.len() + 32 + 64);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_short_vec_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash);

        encode_short_vec_len(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_short_vec_len(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            encode_short_vec_len(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct SolanaTransferRequest {
    pub from: String,
    pub to: String,
    pub lamports: Lamports,
    /// 发送方当前余额，由调用方查询
    pub balance: Lamports,
    pub recent_blockhash: String,
}

#[derive(Debug, Clone)]
pub struct UnsignedSolanaTransaction {
    pub message: Message,
    pub lamports: Lamports,
}

impl UnsignedSolanaTransaction {
    pub fn fee(&self) -> Lamports {
        Lamports(LAMPORTS_PER_SIGNATURE * self.message.header.num_required_signatures as u64)
    }
}

/// Solana 交易构建器，主网和测试网（devnet）均可用
#[derive(Debug, Clone, Copy, Default)]
pub struct SolanaTransactionBuilder;

impl SolanaTransactionBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl ChainTransactionBuilder for SolanaTransactionBuilder {
    type Request = SolanaTransferRequest;
    type Unsigned = UnsignedSolanaTransaction;
    type Key = SolanaKeypair;
    type Amount = Lamports;

    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn build_transaction(&self, request: &Self::Request) -> WalletResult<Self::Unsigned> {
        let from = AddressValidator::parse_solana(&request.from)?;
        let to = AddressValidator::parse_solana(&request.to)?;
        let blockhash = validate_blockhash(&request.recent_blockhash)?;

        if request.lamports == Lamports::ZERO {
            return Err(WalletError::InvalidTransaction(
                "amount must be greater than zero".into(),
            ));
        }

        let fee = Lamports(LAMPORTS_PER_SIGNATURE);
        let required = request
            .lamports
            .checked_add(fee)
            .ok_or_else(|| WalletError::InvalidTransaction("amount + fee overflows u64".into()))?;
        if request.balance < required {
            return Err(WalletError::InsufficientFunds {
                requested: format!("{} (including {} fee)", required, fee),
                available: request.balance.to_string(),
            });
        }

        let instruction = system_transfer(from, to, request.lamports);
        let message = Message::compile(&[instruction], from, blockhash)?;

        tracing::info!(
            from = %from,
            to = %to,
            lamports = %request.lamports,
            "Built Solana transfer"
        );

        Ok(UnsignedSolanaTransaction {
            message,
            lamports: request.lamports,
        })
    }

    fn estimate_fee(&self, tx: &Self::Unsigned) -> WalletResult<Lamports> {
        Ok(tx.fee())
    }

    /// 交易格式：compact(签名数) ‖ 64 字节签名 ‖ 消息
    fn sign(&self, unsigned: &Self::Unsigned, keypair: &SolanaKeypair) -> WalletResult<SignedTransaction> {
        let payer = unsigned
            .message
            .fee_payer()
            .ok_or_else(|| WalletError::InvalidTransaction("message has no accounts".into()))?;
        if keypair.pubkey() != *payer {
            return Err(WalletError::Signing(format!(
                "keypair {} is not the fee payer {}",
                keypair.pubkey(),
                payer
            )));
        }

        let message = unsigned.message.serialize();
        let signature = keypair.sign(&message);

        let mut raw = Vec::with_capacity(1 + 64 + message.len());
        encode_short_vec_len(&mut raw, 1);
        raw.extend_from_slice(&signature);
        raw.extend_from_slice(&message);

        Ok(SignedTransaction {
            chain: Chain::Solana,
            raw,
            id: bs58::encode(signature).into_string(),
        })
    }

    fn serialize(&self, signed: &SignedTransaction) -> String {
        bs58::encode(&signed.raw).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    const BLOCKHASH: &str = "11111111111111111111111111111111";

    fn keypair() -> SolanaKeypair {
        SolanaKeypair::from_bytes(&[7u8; 32])
    }

    fn recipient() -> SolanaPubkey {
        SolanaKeypair::from_bytes(&[8u8; 32]).pubkey()
    }

    fn request(lamports: u64, balance: u64) -> SolanaTransferRequest {
        SolanaTransferRequest {
            from: keypair().pubkey().to_string(),
            to: recipient().to_string(),
            lamports: Lamports(lamports),
            balance: Lamports(balance),
            recent_blockhash: BLOCKHASH.to_string(),
        }
    }

    #[test]
    fn test_blockhash_validation() {
        assert!(matches!(validate_blockhash(""), Err(WalletError::MissingBlockhash)));
        assert!(matches!(
            validate_blockhash("abc"),
            Err(WalletError::InvalidBlockhashEncoding(_))
        ));
        assert!(matches!(
            validate_blockhash("0OIl1111111111111111111111111111"),
            Err(WalletError::InvalidBlockhashEncoding(_))
        ));
        assert!(matches!(
            validate_blockhash(&"z".repeat(60)),
            Err(WalletError::InvalidBlockhashEncoding(_))
        ));
        assert_eq!(validate_blockhash(BLOCKHASH).unwrap(), [0u8; 32]);

        let real = bs58::encode([0xabu8; 32]).into_string();
        assert_eq!(validate_blockhash(&real).unwrap(), [0xabu8; 32]);
    }

    #[test]
    fn test_short_vec_encoding() {
        for (len, expected) in [
            (0usize, vec![0x00u8]),
            (0x7f, vec![0x7f]),
            (0x80, vec![0x80, 0x01]),
            (0x3fff, vec![0xff, 0x7f]),
            (0x4000, vec![0x80, 0x80, 0x01]),
        ] {
            let mut out = Vec::new();
            encode_short_vec_len(&mut out, len);
            assert_eq!(out, expected, "len {}", len);
        }
    }

    #[test]
    fn test_transfer_message_layout() {
        let from = keypair().pubkey();
        let to = recipient();
        let message =
            Message::compile(&[system_transfer(from, to, Lamports(1_000))], from, [0u8; 32]).unwrap();

        assert_eq!(message.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(
            message.header,
            MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            }
        );
        assert_eq!(message.instructions[0].program_id_index, 2);
        assert_eq!(message.instructions[0].accounts, vec![0, 1]);

        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&1_000u64.to_le_bytes());
        assert_eq!(message.instructions[0].data, data);

        let bytes = message.serialize();
        assert_eq!(&bytes[..4], &[1, 0, 1, 3]);
        // header 3 + 长度 1 + 3 个公钥 + blockhash + 指令数 1 + 指令
        assert_eq!(bytes.len(), 3 + 1 + 96 + 32 + 1 + (1 + 1 + 2 + 1 + 12));
    }

    #[test]
    fn test_self_transfer_merges_accounts() {
        let from = keypair().pubkey();
        let message =
            Message::compile(&[system_transfer(from, from, Lamports(1))], from, [0u8; 32]).unwrap();
        assert_eq!(message.account_keys, vec![from, SYSTEM_PROGRAM_ID]);
        assert_eq!(message.instructions[0].accounts, vec![0, 0]);
    }

    #[test]
    fn test_insufficient_funds_includes_fee() {
        let builder = SolanaTransactionBuilder::new();
        assert!(builder.build_transaction(&request(1_000, 6_000)).is_ok());
        assert!(matches!(
            builder.build_transaction(&request(1_001, 6_000)),
            Err(WalletError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_invalid_requests() {
        let builder = SolanaTransactionBuilder::new();
        assert!(matches!(
            builder.build_transaction(&request(0, 1_000_000)),
            Err(WalletError::InvalidTransaction(_))
        ));

        let mut req = request(1_000, 1_000_000);
        req.recent_blockhash = String::new();
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::MissingBlockhash)
        ));

        let mut req = request(1_000, 1_000_000);
        req.to = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".into();
        assert!(matches!(
            builder.build_transaction(&req),
            Err(WalletError::InvalidAddress { chain: Chain::Solana, .. })
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let builder = SolanaTransactionBuilder::new();
        let unsigned = builder.build_transaction(&request(1_000, 1_000_000)).unwrap();
        assert_eq!(builder.estimate_fee(&unsigned).unwrap(), Lamports(5_000));

        let signed = builder.sign(&unsigned, &keypair()).unwrap();
        assert_eq!(signed.raw[0], 1);

        let signature = Signature::from_slice(&signed.raw[1..65]).unwrap();
        let verifying = VerifyingKey::from_bytes(keypair().pubkey().as_bytes()).unwrap();
        verifying.verify(&signed.raw[65..], &signature).unwrap();
        assert_eq!(&signed.raw[65..], &unsigned.message.serialize()[..]);

        assert_eq!(signed.id, bs58::encode(&signed.raw[1..65]).into_string());
        let encoded = builder.serialize(&signed);
        assert_eq!(bs58::decode(&encoded).into_vec().unwrap(), signed.raw);
    }

    #[test]
    fn test_sign_with_foreign_keypair_fails() {
        let builder = SolanaTransactionBuilder::new();
        let unsigned = builder.build_transaction(&request(1_000, 1_000_000)).unwrap();
        assert!(matches!(
            builder.sign(&unsigned, &SolanaKeypair::from_bytes(&[9u8; 32])),
            Err(WalletError::Signing(_))
        ));
    }
}
