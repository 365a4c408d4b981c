//! 钱包生命周期管理
//!
//! 状态机：Uninitialized → Locked ⇄ Unlocked
//!
//! 所有可变状态（助记词、网络、已加载的保险库）由一把读写锁保护：
//! 地址/密钥派生走读锁，initialize / import / unlock / lock / switch_network
//! 走写锁。密码只在调用期间使用，不驻留内存。

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    config::{self, Config},
    domain::{
        chain_config::{chain_id_for, Chain, Network},
        derivation::DerivationStrategyFactory,
        keys::{BitcoinKey, EthereumAddress, EthereumKey, SolanaKeypair, SolanaPubkey},
    },
    error::{WalletError, WalletResult},
    infrastructure::{encryption::Vault, storage},
    service::session::SessionStore,
};

/// 新钱包熵长度：256 bit → 24 个单词
const ENTROPY_LEN: usize = 32;

struct WalletState {
    network: Network,
    mnemonic: Option<Zeroizing<String>>,
    vault: Option<Vault>,
}

/// 钱包管理器
pub struct WalletManager {
    config: Config,
    sessions: SessionStore,
    state: RwLock<WalletState>,
}

/// BIP-39 助记词 → 64 字节种子（空 passphrase）
fn seed_from_mnemonic(mnemonic: &str) -> WalletResult<Zeroizing<[u8; 64]>> {
    let parsed = Mnemonic::parse_in(Language::English, mnemonic)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(parsed.to_seed("")))
}

/// 校验助记词并规范化空白
fn normalize_mnemonic(input: &str) -> WalletResult<Zeroizing<String>> {
    let normalized = Zeroizing::new(input.split_whitespace().collect::<Vec<_>>().join(" "));
    Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(normalized)
}

impl WalletManager {
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(config.session_path(), config.session_duration());
        let state = WalletState {
            network: config.network,
            mnemonic: None,
            vault: None,
        };

        Self {
            config,
            sessions,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn read_state(&self) -> WalletResult<RwLockReadGuard<'_, WalletState>> {
        self.state.read().map_err(|_| WalletError::StatePoisoned)
    }

    fn write_state(&self) -> WalletResult<RwLockWriteGuard<'_, WalletState>> {
        self.state.write().map_err(|_| WalletError::StatePoisoned)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 状态查询
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn vault_exists(&self) -> bool {
        self.config.vault_path().exists()
    }

    pub fn network(&self) -> Network {
        match self.state.read() {
            Ok(state) => state.network,
            Err(poisoned) => poisoned.into_inner().network,
        }
    }

    pub fn is_testnet(&self) -> bool {
        self.network() == Network::Testnet
    }

    /// 当前网络对应的 EIP-155 链 ID
    pub fn chain_id(&self) -> u64 {
        chain_id_for(self.network())
    }

    /// 内存中已解锁，或磁盘上有当前网络的有效会话
    pub fn is_unlocked(&self) -> bool {
        match self.unlocked_mnemonic() {
            Ok(_) => true,
            Err(WalletError::WalletLocked) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to check unlock state");
                false
            }
        }
    }

    /// 已解锁时返回助记词副本（用于备份导出）
    pub fn mnemonic(&self) -> WalletResult<Zeroizing<String>> {
        self.unlocked_mnemonic().map(|(mnemonic, _)| mnemonic)
    }

    /// 只校验密码，不改变锁定状态
    pub fn validate_password(&self, password: &str) -> WalletResult<bool> {
        let vault = {
            let state = self.read_state()?;
            state.vault.clone()
        };
        let vault = match vault {
            Some(vault) => vault,
            None => self.load_vault()?.ok_or(WalletError::WalletLocked)?,
        };
        Ok(vault.validate_password(password))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 状态迁移
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 生成新的 24 词助记词并创建保险库，完成后处于解锁状态
    pub fn initialize(&self, password: &str) -> WalletResult<Zeroizing<String>> {
        let mut state = self.write_state()?;
        self.ensure_no_vault()?;

        let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
        OsRng.fill_bytes(entropy.as_mut_slice());
        let mnemonic = Mnemonic::from_entropy(entropy.as_slice())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        let phrase = Zeroizing::new(mnemonic.to_string());

        self.persist_new_wallet(&mut state, phrase.clone(), password)?;
        tracing::info!(network = %state.network, "✅ Wallet initialized");
        Ok(phrase)
    }

    /// 用已有助记词创建保险库，完成后处于解锁状态
    pub fn import(&self, mnemonic: &str, password: &str) -> WalletResult<()> {
        let phrase = normalize_mnemonic(mnemonic)?;

        let mut state = self.write_state()?;
        self.ensure_no_vault()?;

        self.persist_new_wallet(&mut state, phrase, password)?;
        tracing::info!(network = %state.network, "✅ Wallet imported");
        Ok(())
    }

    /// 优先恢复有效会话，未命中时才解密保险库
    pub fn unlock(&self, password: &str) -> WalletResult<()> {
        let mut state = self.write_state()?;

        if let Some(mnemonic) = self.sessions.load(state.network)? {
            state.mnemonic = Some(mnemonic);
            tracing::info!(network = %state.network, "Wallet unlocked from session");
            return Ok(());
        }

        let vault = match state.vault.take() {
            Some(vault) => vault,
            None => self.load_vault()?.ok_or(WalletError::WalletLocked)?,
        };

        let decrypted = vault.decrypt(password);
        state.vault = Some(vault);
        let mnemonic = match decrypted {
            Ok(mnemonic) => mnemonic,
            Err(WalletError::DecryptionError) => {
                tracing::warn!("Unlock rejected: invalid password");
                return Err(WalletError::InvalidPassword);
            }
            Err(e) => return Err(e),
        };

        self.sessions.create(&mnemonic, state.network)?;
        state.mnemonic = Some(mnemonic);
        tracing::info!(network = %state.network, "Wallet unlocked from vault");
        Ok(())
    }

    /// 清除内存中的助记词并删除会话文件，可重复调用
    pub fn lock(&self) -> WalletResult<()> {
        let mut state = self.write_state()?;
        state.mnemonic = None;
        self.sessions.clear()?;
        tracing::info!("🔒 Wallet locked");
        Ok(())
    }

    /// 切换网络：写入网络文件，丢弃当前会话和内存中的助记词
    pub fn switch_network(&self, network: Network) -> WalletResult<()> {
        let mut state = self.write_state()?;

        config::write_network_file(&self.config.data_dir, network)?;
        if state.network != network {
            state.mnemonic = None;
            self.sessions.clear()?;
        }
        tracing::info!(from = %state.network, to = %network, "Network switched");
        state.network = network;
        Ok(())
    }

    fn ensure_no_vault(&self) -> WalletResult<()> {
        let path = self.config.vault_path();
        if path.exists() {
            return Err(WalletError::AlreadyExists(path));
        }
        Ok(())
    }

    fn load_vault(&self) -> WalletResult<Option<Vault>> {
        storage::read_json(&self.config.vault_path())
    }

    fn persist_new_wallet(
        &self,
        state: &mut WalletState,
        mnemonic: Zeroizing<String>,
        password: &str,
    ) -> WalletResult<()> {
        storage::ensure_private_dir(&self.config.data_dir)?;

        let vault = Vault::create_with_params(&mnemonic, password, self.config.kdf)?;
        storage::write_json(&self.config.vault_path(), &vault)?;

        // 保险库已落盘，之后的失败不能让调用方拿不到助记词
        state.vault = Some(vault);
        state.mnemonic = Some(mnemonic.clone());

        if let Err(e) = self.sessions.create(&mnemonic, state.network) {
            tracing::warn!(
                error = %e,
                "Session file not written, wallet stays unlocked in this process only"
            );
        }
        Ok(())
    }

    /// 读锁命中直接返回；未命中时升级为写锁尝试从会话恢复
    fn unlocked_mnemonic(&self) -> WalletResult<(Zeroizing<String>, Network)> {
        {
            let state = self.read_state()?;
            if let Some(mnemonic) = &state.mnemonic {
                return Ok((mnemonic.clone(), state.network));
            }
        }

        let mut state = self.write_state()?;
        if state.mnemonic.is_none() {
            let restored = self
                .sessions
                .load(state.network)?
                .ok_or(WalletError::WalletLocked)?;
            tracing::debug!("Restored unlocked state from session");
            state.mnemonic = Some(restored);
        }

        match &state.mnemonic {
            Some(mnemonic) => Ok((mnemonic.clone(), state.network)),
            None => Err(WalletError::WalletLocked),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 密钥与地址
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn derive_secret(&self, chain: Chain) -> WalletResult<Zeroizing<[u8; 32]>> {
        // 网络限制先于解锁检查
        if !chain.supports(self.network()) {
            return Err(WalletError::UnsupportedOnTestnet(chain));
        }

        let (mnemonic, network) = self.unlocked_mnemonic()?;
        let path = chain
            .derivation_path(network)
            .ok_or(WalletError::UnsupportedOnTestnet(chain))?;

        let seed = seed_from_mnemonic(&mnemonic)?;
        DerivationStrategyFactory::create_strategy(chain.curve_type()).derive_secret(&seed[..], path)
    }

    pub fn ethereum_key(&self) -> WalletResult<EthereumKey> {
        EthereumKey::from_bytes(&*self.derive_secret(Chain::Ethereum)?)
    }

    pub fn ethereum_address(&self) -> WalletResult<EthereumAddress> {
        Ok(self.ethereum_key()?.address())
    }

    pub fn bitcoin_key(&self) -> WalletResult<BitcoinKey> {
        BitcoinKey::from_bytes(&*self.derive_secret(Chain::Bitcoin)?)
    }

    pub fn bitcoin_address(&self) -> WalletResult<bitcoin::Address> {
        self.bitcoin_key()?.address()
    }

    pub fn solana_keypair(&self) -> WalletResult<SolanaKeypair> {
        Ok(SolanaKeypair::from_bytes(&*self.derive_secret(Chain::Solana)?))
    }

    pub fn solana_address(&self) -> WalletResult<SolanaPubkey> {
        Ok(self.solana_keypair()?.pubkey())
    }
}
