//! 순포지션 도출.
//!
//! 포지션은 저장하지 않고 항상 미청산 진입 로트의 합으로 계산합니다:
//! `Σ OPEN_LONG 수량 − Σ OPEN_SHORT 수량`.

use ledger_core::{DecimalExt, Direction, Quantity, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// (봇, 심볼)의 포지션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    /// 포지션 없음
    Flat,
    /// 롱 포지션 (수량)
    Long(Quantity),
    /// 숏 포지션 (수량)
    Short(Quantity),
}

impl PositionState {
    /// 부호가 있는 순포지션으로부터 상태를 만듭니다.
    pub fn from_net(net: Decimal) -> Self {
        if net.is_dust() {
            PositionState::Flat
        } else if net > Decimal::ZERO {
            PositionState::Long(net)
        } else {
            PositionState::Short(-net)
        }
    }

    /// 부호가 있는 순포지션.
    pub fn net(&self) -> Decimal {
        match self {
            PositionState::Flat => Decimal::ZERO,
            PositionState::Long(q) => *q,
            PositionState::Short(q) => -*q,
        }
    }

    /// 포지션 크기 (절대값).
    pub fn magnitude(&self) -> Quantity {
        self.net().abs()
    }

    /// 포지션 방향. 평탄하면 None.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(_) => Some(Direction::Long),
            PositionState::Short(_) => Some(Direction::Short),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionState::Flat => write!(f, "FLAT"),
            PositionState::Long(q) => write!(f, "LONG {}", q),
            PositionState::Short(q) => write!(f, "SHORT {}", q),
        }
    }
}

/// 로트 목록의 순포지션. 허용 오차 미만은 정확히 0으로 보고합니다.
///
/// 청산 거래가 섞여 있어도 진입 로트만 합산합니다.
pub fn net_position(lots: &[Trade]) -> Decimal {
    let net: Decimal = lots
        .iter()
        .filter(|t| t.is_lot())
        .map(Trade::signed_contracts)
        .sum();

    if net.is_dust() {
        Decimal::ZERO
    } else {
        net
    }
}

/// 로트 목록의 포지션 상태.
pub fn resolve(lots: &[Trade]) -> PositionState {
    PositionState::from_net(net_position(lots))
}

/// 로트를 FIFO 순서(시각 오름차순, 같으면 삽입 순)로 정렬합니다.
pub fn sort_fifo(lots: &mut [Trade]) {
    lots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ledger_core::{Action, NewTrade, TradeKind};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn lot(id: i64, kind: TradeKind, contracts: Decimal, offset_secs: i64) -> Trade {
        NewTrade {
            bot_id: Uuid::nil(),
            symbol: "X".to_string(),
            action: if kind.direction() == Direction::Long {
                Action::Buy
            } else {
                Action::Sell
            },
            signal_price: dec!(100),
            execution_price: dec!(100),
            contracts,
            position_size: Decimal::ZERO,
            commission: Decimal::ZERO,
            pnl: Decimal::ZERO,
            balance_after: dec!(1000),
            kind,
            timestamp: Utc::now() + Duration::seconds(offset_secs),
        }
        .into_trade(id)
    }

    #[test]
    fn test_flat_when_empty() {
        assert_eq!(resolve(&[]), PositionState::Flat);
        assert_eq!(net_position(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_long_and_short_sum() {
        let lots = vec![
            lot(1, TradeKind::OpenLong, dec!(5), 0),
            lot(2, TradeKind::OpenShort, dec!(2), 1),
        ];
        assert_eq!(net_position(&lots), dec!(3));
        assert_eq!(resolve(&lots), PositionState::Long(dec!(3)));

        let shorts = vec![lot(3, TradeKind::OpenShort, dec!(3), 0)];
        let state = resolve(&shorts);
        assert_eq!(state, PositionState::Short(dec!(3)));
        assert_eq!(state.net(), dec!(-3));
        assert_eq!(state.direction(), Some(Direction::Short));
    }

    #[test]
    fn test_close_trades_are_ignored() {
        let trades = vec![
            lot(1, TradeKind::OpenLong, dec!(1), 0),
            lot(2, TradeKind::CloseLong, dec!(1), 1),
        ];
        assert_eq!(net_position(&trades), dec!(1));
    }

    #[test]
    fn test_dust_is_flat() {
        let lots = vec![
            lot(1, TradeKind::OpenLong, dec!(1.00005), 0),
            lot(2, TradeKind::OpenShort, dec!(1), 1),
        ];
        assert_eq!(net_position(&lots), Decimal::ZERO);
        assert!(resolve(&lots).is_flat());
    }

    #[test]
    fn test_sort_fifo_breaks_ties_by_id() {
        let t = Utc::now();
        let mut a = lot(2, TradeKind::OpenLong, dec!(1), 0);
        let mut b = lot(1, TradeKind::OpenLong, dec!(1), 0);
        let c = lot(3, TradeKind::OpenLong, dec!(1), -10);
        a.timestamp = t;
        b.timestamp = t;

        let mut lots = vec![a, b, c];
        sort_fifo(&mut lots);
        let ids: Vec<_> = lots.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    proptest! {
        #[test]
        fn prop_net_matches_signed_sum(
            longs in prop::collection::vec(1i64..1_000_000, 0..8),
            shorts in prop::collection::vec(1i64..1_000_000, 0..8),
        ) {
            let mut lots = Vec::new();
            let mut id = 0;
            for q in &longs {
                id += 1;
                lots.push(lot(id, TradeKind::OpenLong, Decimal::new(*q, 3), id));
            }
            for q in &shorts {
                id += 1;
                lots.push(lot(id, TradeKind::OpenShort, Decimal::new(*q, 3), id));
            }

            let expected: Decimal = longs.iter().map(|q| Decimal::new(*q, 3)).sum::<Decimal>()
                - shorts.iter().map(|q| Decimal::new(*q, 3)).sum::<Decimal>();

            prop_assert_eq!(net_position(&lots), expected);
            prop_assert_eq!(resolve(&lots).net(), expected);
        }
    }
}
