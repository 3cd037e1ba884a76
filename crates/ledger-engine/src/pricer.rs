//! 체결 가격 계산.
//!
//! 알림 가격에 불리한 방향의 슬리피지를 적용합니다.
//! 매수는 더 비싸게, 매도는 더 싸게 체결된 것으로 간주합니다.

use ledger_core::{Action, Price, Rate};
use rust_decimal::Decimal;

use crate::error::{overflow, LedgerError};

/// 슬리피지를 반영한 체결 가격.
///
/// - 매수: `signal_price × (1 + slippage)`
/// - 매도: `signal_price × (1 − slippage)`
pub fn execution_price(
    signal_price: Price,
    action: Action,
    slippage_rate: Rate,
) -> Result<Price, LedgerError> {
    if signal_price <= Decimal::ZERO {
        return Err(LedgerError::InvalidInput(format!(
            "signal price must be positive: {}",
            signal_price
        )));
    }
    if slippage_rate < Decimal::ZERO {
        return Err(LedgerError::InvalidInput(format!(
            "slippage rate must not be negative: {}",
            slippage_rate
        )));
    }

    let factor = match action {
        Action::Buy => Decimal::ONE.checked_add(slippage_rate),
        Action::Sell => Decimal::ONE.checked_sub(slippage_rate),
    };
    factor
        .and_then(|f| signal_price.checked_mul(f))
        .ok_or_else(|| overflow("execution price"))
}
