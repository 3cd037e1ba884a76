//! 가상 체결 기록.
//!
//! 이 모듈은 원장에 쌓이는 거래 관련 타입을 정의합니다:
//! - `Trade` - 저장된 개별 체결 기록
//! - `NewTrade` - 저장 전 체결 기록

use crate::domain::{Action, Direction, TradeKind};
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 원장에 저장된 체결 기록.
///
/// 진입 거래(`OPEN_*`) 중 아직 청산되지 않은 것들이 FIFO 로트 큐를 이룹니다.
/// `id`는 저장소가 삽입 순서대로 부여하며 같은 시각의 로트 간 순서를 정합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 삽입 순번
    pub id: i64,
    /// 소유 봇 ID
    pub bot_id: Uuid,
    /// 거래 심볼
    pub symbol: String,
    /// 시그널 방향
    pub action: Action,
    /// 알림이 보낸 가격
    pub signal_price: Price,
    /// 슬리피지가 반영된 체결 가격
    pub execution_price: Price,
    /// 계약 수량 (로트의 경우 남은 수량)
    pub contracts: Quantity,
    /// 알림이 보고한 포지션 크기 (참고용)
    pub position_size: Decimal,
    /// 이 체결에 부과된 수수료
    pub commission: Decimal,
    /// 실현 손익 (진입 거래는 0)
    pub pnl: Decimal,
    /// 체결 후 잔고
    pub balance_after: Decimal,
    /// 거래 유형
    pub kind: TradeKind,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// 진입 거래(로트)인지 확인합니다.
    pub fn is_lot(&self) -> bool {
        self.kind.is_open()
    }

    /// 로트의 포지션 방향.
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// 부호가 붙은 수량 (롱 +, 숏 -).
    pub fn signed_contracts(&self) -> Decimal {
        self.contracts * Decimal::from(self.direction().sign())
    }

    /// 체결 명목 가치.
    pub fn notional_value(&self) -> Decimal {
        self.contracts * self.execution_price
    }
}

/// 저장 전 체결 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub bot_id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub signal_price: Price,
    pub execution_price: Price,
    pub contracts: Quantity,
    pub position_size: Decimal,
    pub commission: Decimal,
    pub pnl: Decimal,
    pub balance_after: Decimal,
    pub kind: TradeKind,
    pub timestamp: DateTime<Utc>,
}

impl NewTrade {
    /// 저장소가 부여한 순번으로 `Trade`를 만듭니다.
    pub fn into_trade(self, id: i64) -> Trade {
        Trade {
            id,
            bot_id: self.bot_id,
            symbol: self.symbol,
            action: self.action,
            signal_price: self.signal_price,
            execution_price: self.execution_price,
            contracts: self.contracts,
            position_size: self.position_size,
            commission: self.commission,
            pnl: self.pnl,
            balance_after: self.balance_after,
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }
}
