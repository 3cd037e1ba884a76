//! FIFO 로트 매칭과 실현 손익 계산.
//!
//! 포지션과 반대 방향의 시그널을 가장 오래된 진입 로트부터 매칭합니다.
//!
//! - 청산 수량: `min(시그널 수량, |순포지션|)`
//! - 반전 수량: `max(0, 시그널 수량 − |순포지션|)`
//! - 청산 수수료: `청산 수량 × 체결가 × 수수료율` (시그널당 한 번)
//! - 로트별 손익: 롱 `(체결가 − 진입가) × 수량`, 숏 `(진입가 − 체결가) × 수량`에서
//!   해당 로트 진입 수수료 중 매칭된 비율만큼 차감
//!
//! 일부만 매칭된 로트는 남은 수량과 남은 진입 수수료를 가진 로트로 유지됩니다.

use ledger_core::{DecimalExt, Direction, Price, Quantity, Rate, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{overflow, LedgerError};
use crate::resolver::{sort_fifo, PositionState};

/// 로트 하나에 대한 매칭 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConsumption {
    /// 매칭된 로트(진입 거래) ID
    pub lot_id: i64,
    /// 로트 진입가
    pub entry_price: Price,
    /// 이번 시그널이 소진한 수량
    pub consumed: Quantity,
    /// 로트에 남는 수량
    pub remaining: Quantity,
    /// 이번 매칭에 배분된 진입 수수료
    pub entry_commission: Decimal,
    /// 로트에 남는 진입 수수료
    pub remaining_commission: Decimal,
    /// 이 조각의 손익 (진입 수수료 배분 차감 후, 청산 수수료 제외)
    pub pnl: Decimal,
}

impl LotConsumption {
    /// 로트가 모두 소진되어 삭제해야 하는지 확인합니다.
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= Decimal::ZERO || self.remaining.is_dust()
    }
}

/// 청산/반전 시그널의 매칭 계획.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlan {
    /// 청산되는 포지션 방향
    pub direction: Direction,
    pub contracts_closing: Quantity,
    pub contracts_reversing: Quantity,
    pub closing_commission: Decimal,
    /// 청산 수수료까지 반영한 실현 손익
    pub realized_pnl: Decimal,
    /// FIFO 순서의 로트별 매칭 결과
    pub consumptions: Vec<LotConsumption>,
}

impl MatchPlan {
    /// 반대 방향으로 새 로트를 열어야 하는지 확인합니다.
    ///
    /// 허용 오차 미만의 잔여 수량으로는 반전하지 않습니다.
    pub fn reverses(&self) -> bool {
        self.contracts_reversing > Decimal::ZERO && !self.contracts_reversing.is_dust()
    }
}

/// 청산 시그널을 미청산 로트에 FIFO로 매칭합니다.
///
/// `position`은 같은 로트 목록에서 도출된 상태여야 합니다. 로트 수량이
/// 청산 수량에 못 미치면 리졸버와 매처의 불일치로 보고
/// `NoOpeningPosition`을 반환합니다.
pub fn plan_close(
    symbol: &str,
    lots: &[Trade],
    position: PositionState,
    quantity: Quantity,
    execution_price: Price,
    commission_rate: Rate,
) -> Result<MatchPlan, LedgerError> {
    let no_position = || LedgerError::NoOpeningPosition {
        symbol: symbol.to_string(),
    };

    let direction = position.direction().ok_or_else(no_position)?;
    let magnitude = position.magnitude();

    let contracts_closing = quantity.min(magnitude);
    let contracts_reversing = (quantity - magnitude).max(Decimal::ZERO);

    let mut queue: Vec<Trade> = lots
        .iter()
        .filter(|t| t.is_lot() && t.direction() == direction)
        .cloned()
        .collect();
    if queue.is_empty() {
        return Err(no_position());
    }
    sort_fifo(&mut queue);

    let mut to_close = contracts_closing;
    let mut consumptions = Vec::new();

    for lot in &queue {
        if to_close <= Decimal::ZERO || to_close.is_dust() {
            break;
        }

        let consumed = to_close.min(lot.contracts);
        let entry_commission = if consumed == lot.contracts || lot.contracts.is_zero() {
            lot.commission
        } else {
            lot.commission
                .checked_mul(consumed)
                .and_then(|c| c.checked_div(lot.contracts))
                .ok_or_else(|| overflow("entry commission"))?
        };
        let spread = match direction {
            Direction::Long => execution_price.checked_sub(lot.execution_price),
            Direction::Short => lot.execution_price.checked_sub(execution_price),
        };
        let gross = spread
            .and_then(|d| d.checked_mul(consumed))
            .ok_or_else(|| overflow("lot pnl"))?;
        let pnl = gross
            .checked_sub(entry_commission)
            .ok_or_else(|| overflow("lot pnl"))?;

        debug!(
            lot_id = lot.id,
            entry_price = %lot.execution_price,
            consumed = %consumed,
            gross = %gross,
            "Matched lot"
        );

        consumptions.push(LotConsumption {
            lot_id: lot.id,
            entry_price: lot.execution_price,
            consumed,
            remaining: lot.contracts - consumed,
            entry_commission,
            remaining_commission: lot.commission - entry_commission,
            pnl,
        });
        to_close -= consumed;
    }

    if to_close > Decimal::ZERO && !to_close.is_dust() {
        return Err(no_position());
    }

    let closing_commission = contracts_closing
        .checked_mul(execution_price)
        .and_then(|n| n.checked_mul(commission_rate))
        .ok_or_else(|| overflow("closing commission"))?;
    let realized_pnl = consumptions
        .iter()
        .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.pnl))
        .and_then(|sum| sum.checked_sub(closing_commission))
        .ok_or_else(|| overflow("realized pnl"))?;

    Ok(MatchPlan {
        direction,
        contracts_closing,
        contracts_reversing,
        closing_commission,
        realized_pnl,
        consumptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ledger_core::{Action, NewTrade, TradeKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn lot(id: i64, kind: TradeKind, contracts: Decimal, price: Decimal, commission: Decimal) -> Trade {
        NewTrade {
            bot_id: Uuid::nil(),
            symbol: "X".to_string(),
            action: if kind == TradeKind::OpenLong {
                Action::Buy
            } else {
                Action::Sell
            },
            signal_price: price,
            execution_price: price,
            contracts,
            position_size: Decimal::ZERO,
            commission,
            pnl: Decimal::ZERO,
            balance_after: dec!(1000),
            kind,
            timestamp: Utc::now() + Duration::seconds(id),
        }
        .into_trade(id)
    }

    #[test]
    fn test_full_close_long() {
        let lots = vec![lot(1, TradeKind::OpenLong, dec!(1), dec!(100.1), dec!(0.05005))];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Long(dec!(1)),
            dec!(1),
            dec!(109.89),
            dec!(0.0005),
        )
        .unwrap();

        assert_eq!(plan.direction, Direction::Long);
        assert_eq!(plan.contracts_closing, dec!(1));
        assert_eq!(plan.contracts_reversing, Decimal::ZERO);
        assert_eq!(plan.closing_commission, dec!(0.054945));
        assert_eq!(plan.realized_pnl, dec!(9.685005));
        assert!(plan.consumptions[0].is_exhausted());
        assert!(!plan.reverses());
    }

    #[test]
    fn test_close_short_profits_when_price_falls() {
        let lots = vec![lot(1, TradeKind::OpenShort, dec!(2), dec!(50), Decimal::ZERO)];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Short(dec!(2)),
            dec!(2),
            dec!(45),
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(plan.direction, Direction::Short);
        assert_eq!(plan.realized_pnl, dec!(10));
    }

    #[test]
    fn test_reversal_split() {
        let lots = vec![lot(1, TradeKind::OpenLong, dec!(5), dec!(100), Decimal::ZERO)];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Long(dec!(5)),
            dec!(8),
            dec!(100),
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(plan.contracts_closing, dec!(5));
        assert_eq!(plan.contracts_reversing, dec!(3));
        assert!(plan.reverses());
        assert_eq!(plan.consumptions.len(), 1);
        assert!(plan.consumptions[0].is_exhausted());
    }

    #[test]
    fn test_fifo_matches_oldest_lot_first() {
        // 입력 순서와 무관하게 오래된 로트 A(id 1)가 먼저 매칭되어야 함
        let lots = vec![
            lot(2, TradeKind::OpenLong, dec!(4), dec!(120), Decimal::ZERO),
            lot(1, TradeKind::OpenLong, dec!(3), dec!(100), Decimal::ZERO),
        ];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Long(dec!(7)),
            dec!(3),
            dec!(110),
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(plan.consumptions.len(), 1);
        assert_eq!(plan.consumptions[0].lot_id, 1);
        assert_eq!(plan.realized_pnl, dec!(30));
    }

    #[test]
    fn test_partial_close_keeps_remainder_and_prorates_commission() {
        let lots = vec![lot(1, TradeKind::OpenLong, dec!(4), dec!(100), dec!(0.2))];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Long(dec!(4)),
            dec!(1),
            dec!(101),
            Decimal::ZERO,
        )
        .unwrap();

        let c = &plan.consumptions[0];
        assert_eq!(c.consumed, dec!(1));
        assert_eq!(c.remaining, dec!(3));
        assert_eq!(c.entry_commission, dec!(0.05));
        assert_eq!(c.remaining_commission, dec!(0.15));
        assert!(!c.is_exhausted());
        assert_eq!(plan.realized_pnl, dec!(0.95));
    }

    #[test]
    fn test_close_spanning_multiple_lots() {
        let lots = vec![
            lot(1, TradeKind::OpenShort, dec!(1), dec!(100), Decimal::ZERO),
            lot(2, TradeKind::OpenShort, dec!(2), dec!(90), Decimal::ZERO),
        ];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Short(dec!(3)),
            dec!(2),
            dec!(80),
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(plan.consumptions.len(), 2);
        assert!(plan.consumptions[0].is_exhausted());
        assert_eq!(plan.consumptions[1].remaining, dec!(1));
        // (100-80)*1 + (90-80)*1
        assert_eq!(plan.realized_pnl, dec!(30));
    }

    #[test]
    fn test_missing_lots_is_desync() {
        let err = plan_close(
            "X",
            &[],
            PositionState::Long(dec!(1)),
            dec!(1),
            dec!(100),
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NoOpeningPosition { ref symbol } if symbol == "X"));

        let short_lots = vec![lot(1, TradeKind::OpenLong, dec!(1), dec!(100), Decimal::ZERO)];
        let err = plan_close(
            "X",
            &short_lots,
            PositionState::Long(dec!(2)),
            dec!(2),
            dec!(100),
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NoOpeningPosition { .. }));
    }

    #[test]
    fn test_flat_position_has_nothing_to_match() {
        let result = plan_close(
            "X",
            &[],
            PositionState::Flat,
            dec!(1),
            dec!(100),
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(LedgerError::NoOpeningPosition { .. })));
    }

    #[test]
    fn test_dust_excess_does_not_reverse() {
        let lots = vec![lot(1, TradeKind::OpenLong, dec!(1), dec!(100), Decimal::ZERO)];
        let plan = plan_close(
            "X",
            &lots,
            PositionState::Long(dec!(1)),
            dec!(1.00005),
            dec!(100),
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(plan.contracts_reversing, dec!(0.00005));
        assert!(!plan.reverses());
    }

    #[test]
    fn test_huge_lot_pnl_is_rejected_not_panicking() {
        let huge = dec!(100000000000000000000);
        let lots = vec![lot(1, TradeKind::OpenShort, huge, dec!(1), Decimal::ZERO)];
        let result = plan_close(
            "X",
            &lots,
            PositionState::Short(huge),
            huge,
            huge,
            Decimal::ZERO,
        );

        assert!(matches!(result, Err(LedgerError::InvalidInput(ref m)) if m.contains("overflows")));
    }
}
