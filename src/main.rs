//! IronVault 主入口
//!
//! 打印钱包状态：网络、保险库与会话情况、已解锁时的各链地址。
//! 交互式命令行不在本库范围内。

use anyhow::{Context, Result};
use ironvault::{
    config::Config, domain::Chain, infrastructure::logging::init_logging, WalletManager,
};

fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向可选的 TOML 文件）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())
        .context("failed to load configuration")?;
    config.validate()?;

    // 3. 初始化日志
    init_logging(&config.logging)?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        network = %config.network,
        "Starting IronVault"
    );

    let manager = WalletManager::new(config);

    println!("data dir : {}", manager.config().data_dir.display());
    println!("network  : {} (chain id {})", manager.network(), manager.chain_id());

    if !manager.vault_exists() {
        println!("wallet   : not initialized");
        return Ok(());
    }

    // 只尝试恢复会话，不要求密码
    if !manager.is_unlocked() {
        println!("wallet   : locked");
        return Ok(());
    }

    println!("wallet   : unlocked (session)");
    for chain in Chain::ALL {
        let address = match chain {
            Chain::Ethereum => manager.ethereum_address().map(|a| a.to_string()),
            Chain::Bitcoin => manager.bitcoin_address().map(|a| a.to_string()),
            Chain::Solana => manager.solana_address().map(|a| a.to_string()),
        };
        match address {
            Ok(address) => println!("{:<9}: {}", chain.symbol(), address),
            Err(e) => println!("{:<9}: {}", chain.symbol(), e),
        }
    }

    Ok(())
}
