//! 봇 성과 통계.
//!
//! 대시보드에서 쓰는 승률, 수익률, 잔고 히스토리를 원장 기록으로부터 계산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{Action, Bot, Trade};

/// 잔고 히스토리의 한 지점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub balance: Decimal,
    /// 시작 지점이면 None
    pub trade_id: Option<i64>,
    /// 시작 지점이면 None
    pub action: Option<Action>,
    pub symbol: Option<String>,
    pub pnl: Decimal,
}

/// 봇 성과 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStats {
    /// 원장에 남아 있는 거래 수
    pub total_trades: usize,
    /// 손익이 0이 아닌 청산 거래 수
    pub completed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// 승률 (백분율)
    pub win_rate_pct: Decimal,
    /// 총 손익 (현재 잔고 - 시작 잔고)
    pub total_pnl: Decimal,
    /// 수익률 (백분율)
    pub return_pct: Decimal,
    /// 시간순 잔고 히스토리
    pub balance_history: Vec<BalancePoint>,
}

impl BotStats {
    /// 봇과 거래 목록으로부터 통계를 계산합니다.
    pub fn from_trades(bot: &Bot, trades: &[Trade]) -> Self {
        let mut ordered: Vec<&Trade> = trades.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let mut winning_trades = 0;
        let mut losing_trades = 0;
        let mut balance_history = Vec::with_capacity(ordered.len() + 1);

        if !ordered.is_empty() {
            balance_history.push(BalancePoint {
                timestamp: bot.created_at,
                balance: bot.starting_balance,
                trade_id: None,
                action: None,
                symbol: None,
                pnl: Decimal::ZERO,
            });
        }

        for trade in ordered {
            if trade.kind.is_close() {
                if trade.pnl > Decimal::ZERO {
                    winning_trades += 1;
                } else if trade.pnl < Decimal::ZERO {
                    losing_trades += 1;
                }
            }

            balance_history.push(BalancePoint {
                timestamp: trade.timestamp,
                balance: trade.balance_after,
                trade_id: Some(trade.id),
                action: Some(trade.action),
                symbol: Some(trade.symbol.clone()),
                pnl: trade.pnl,
            });
        }

        let completed_trades = winning_trades + losing_trades;
        let win_rate_pct = if completed_trades > 0 {
            Decimal::from(winning_trades) / Decimal::from(completed_trades) * dec!(100)
        } else {
            Decimal::ZERO
        };

        Self {
            total_trades: trades.len(),
            completed_trades,
            winning_trades,
            losing_trades,
            win_rate_pct,
            total_pnl: bot.total_pnl(),
            return_pct: bot.historical_return_ratio() * dec!(100),
            balance_history,
        }
    }
}
