//! 原生币金额类型
//!
//! 每条链一个固定宽度整数 newtype（wei / satoshi / lamport），
//! 格式化与解析在编译期按类型确定，不再做运行时类型分派。

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;

use crate::{
    domain::chain_config::Chain,
    error::{WalletError, WalletResult},
};

/// 把最小单位整数格式化为整币十进制字符串
///
/// `fixed` 为 true 时保留全部小数位（BTC 习惯写 8 位），否则去掉末尾 0
fn format_units(value: u128, decimals: u32, fixed: bool) -> String {
    let decimal = i128::try_from(value)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals).ok());

    match decimal {
        Some(d) if fixed => d.to_string(),
        Some(d) => d.normalize().to_string(),
        // 超出 96 位尾数，手工拼接
        None => {
            let base = 10u128.pow(decimals);
            let frac = format!("{:0width$}", value % base, width = decimals as usize);
            let frac = if fixed { frac.as_str() } else { frac.trim_end_matches('0') };
            if frac.is_empty() {
                (value / base).to_string()
            } else {
                format!("{}.{}", value / base, frac)
            }
        }
    }
}

/// 解析整币十进制字符串为最小单位整数
fn parse_units(input: &str, decimals: u32) -> WalletResult<u128> {
    let trimmed = input.trim();
    let decimal = Decimal::from_str(trimmed)
        .map_err(|e| WalletError::InvalidAmount(format!("'{}': {}", trimmed, e)))?;

    if decimal.is_sign_negative() && !decimal.is_zero() {
        return Err(WalletError::InvalidAmount(format!(
            "'{}': amount must be non-negative",
            trimmed
        )));
    }

    let decimal = decimal.normalize();
    let scale = decimal.scale();
    if scale > decimals {
        return Err(WalletError::InvalidAmount(format!(
            "'{}': more than {} decimal places",
            trimmed, decimals
        )));
    }

    let mantissa = u128::try_from(decimal.mantissa().unsigned_abs())
        .map_err(|_| WalletError::InvalidAmount(format!("'{}': out of range", trimmed)))?;

    mantissa
        .checked_mul(10u128.pow(decimals - scale))
        .ok_or_else(|| WalletError::InvalidAmount(format!("'{}': out of range", trimmed)))
}

macro_rules! native_amount {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $chain:expr, fixed = $fixed:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $inner);

        impl $name {
            pub const ZERO: Self = Self(0);

            pub fn get(self) -> $inner {
                self.0
            }

            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }

            pub fn checked_sub(self, other: Self) -> Option<Self> {
                self.0.checked_sub(other.0).map(Self)
            }

            /// 解析整币金额，例如 `"0.1"`
            pub fn from_decimal_str(input: &str) -> WalletResult<Self> {
                let units = parse_units(input, $chain.decimals())?;
                <$inner>::try_from(units)
                    .map(Self)
                    .map_err(|_| WalletError::InvalidAmount(format!("'{}': out of range", input)))
            }

            /// 整币金额，不带符号
            pub fn to_decimal_string(self) -> String {
                format_units(self.0 as u128, $chain.decimals(), $fixed)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.to_decimal_string(), $chain.symbol())
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

native_amount!(
    /// Ethereum 金额 (1 ETH = 10^18 wei)
    Wei, u128, Chain::Ethereum, fixed = false
);

native_amount!(
    /// Bitcoin 金额 (1 BTC = 10^8 satoshi)
    Satoshis, u64, Chain::Bitcoin, fixed = true
);

native_amount!(
    /// Solana 金额 (1 SOL = 10^9 lamport)
    Lamports, u64, Chain::Solana, fixed = false
);
