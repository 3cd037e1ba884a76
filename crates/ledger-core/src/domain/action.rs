//! 매매 방향 및 거래 유형.
//!
//! 이 모듈은 원장의 상태 전이에 쓰이는 열거형을 정의합니다:
//! - `Action` - 시그널 방향 (매수/매도)
//! - `Direction` - 포지션 방향 (롱/숏)
//! - `TradeKind` - 거래 기록 유형 (OPEN_LONG 등)

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 시그널 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Action {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
        }
    }

    /// 이 방향의 시그널이 평탄 상태에서 여는 포지션 방향.
    pub fn opening_direction(&self) -> Direction {
        match self {
            Action::Buy => Direction::Long,
            Action::Sell => Direction::Short,
        }
    }

    /// 저장용 소문자 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            other => Err(CoreError::InvalidInput(format!(
                "Invalid action: must be buy or sell, got '{}'",
                other
            ))),
        }
    }
}

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 롱 (가격 상승 시 수익)
    Long,
    /// 숏 (가격 하락 시 수익)
    Short,
}

impl Direction {
    /// 이 방향의 포지션을 줄이는 시그널 방향.
    pub fn closing_action(&self) -> Action {
        match self {
            Direction::Long => Action::Sell,
            Direction::Short => Action::Buy,
        }
    }

    /// 순포지션 계산 시 부호 (롱 +1, 숏 -1).
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// 거래 기록 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeKind {
    /// 롱 포지션 진입
    OpenLong,
    /// 숏 포지션 진입
    OpenShort,
    /// 롱 포지션 청산
    CloseLong,
    /// 숏 포지션 청산
    CloseShort,
}

impl TradeKind {
    /// 주어진 방향의 진입 유형.
    pub fn open(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeKind::OpenLong,
            Direction::Short => TradeKind::OpenShort,
        }
    }

    /// 주어진 방향의 청산 유형.
    pub fn close(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeKind::CloseLong,
            Direction::Short => TradeKind::CloseShort,
        }
    }

    /// 진입 거래(로트)인지 확인합니다.
    pub fn is_open(&self) -> bool {
        matches!(self, TradeKind::OpenLong | TradeKind::OpenShort)
    }

    /// 청산 거래인지 확인합니다.
    pub fn is_close(&self) -> bool {
        !self.is_open()
    }

    /// 이 거래가 관여하는 포지션 방향.
    pub fn direction(&self) -> Direction {
        match self {
            TradeKind::OpenLong | TradeKind::CloseLong => Direction::Long,
            TradeKind::OpenShort | TradeKind::CloseShort => Direction::Short,
        }
    }

    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::OpenLong => "OPEN_LONG",
            TradeKind::OpenShort => "OPEN_SHORT",
            TradeKind::CloseLong => "CLOSE_LONG",
            TradeKind::CloseShort => "CLOSE_SHORT",
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeKind {
    type Err = CoreError;

    /// 이전 버전이 저장한 공백 구분 형식("OPEN LONG")도 허용합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(' ', "_").as_str() {
            "OPEN_LONG" => Ok(TradeKind::OpenLong),
            "OPEN_SHORT" => Ok(TradeKind::OpenShort),
            "CLOSE_LONG" => Ok(TradeKind::CloseLong),
            "CLOSE_SHORT" => Ok(TradeKind::CloseShort),
            other => Err(CoreError::InvalidInput(format!(
                "Unknown trade kind: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_case_insensitive() {
        assert_eq!("BUY".parse::<Action>().unwrap(), Action::Buy);
        assert_eq!(" sell ".parse::<Action>().unwrap(), Action::Sell);
        assert!("hold".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_directions() {
        assert_eq!(Action::Buy.opening_direction(), Direction::Long);
        assert_eq!(Action::Sell.opening_direction(), Direction::Short);
        assert_eq!(Direction::Long.closing_action(), Action::Sell);
        assert_eq!(Direction::Short.closing_action(), Action::Buy);
        assert_eq!(Action::Buy.opposite(), Action::Sell);
    }

    #[test]
    fn test_trade_kind_roundtrip_strings() {
        for kind in [
            TradeKind::OpenLong,
            TradeKind::OpenShort,
            TradeKind::CloseLong,
            TradeKind::CloseShort,
        ] {
            assert_eq!(kind.as_str().parse::<TradeKind>().unwrap(), kind);
        }
        assert_eq!(
            "OPEN LONG".parse::<TradeKind>().unwrap(),
            TradeKind::OpenLong
        );
        assert_eq!(
            "close short".parse::<TradeKind>().unwrap(),
            TradeKind::CloseShort
        );
    }

    #[test]
    fn test_trade_kind_classification() {
        assert!(TradeKind::OpenShort.is_open());
        assert!(TradeKind::CloseLong.is_close());
        assert_eq!(TradeKind::CloseShort.direction(), Direction::Short);
        assert_eq!(TradeKind::open(Direction::Long), TradeKind::OpenLong);
        assert_eq!(TradeKind::close(Direction::Short), TradeKind::CloseShort);
    }

    #[test]
    fn test_trade_kind_serde() {
        let json = serde_json::to_string(&TradeKind::OpenShort).unwrap();
        assert_eq!(json, "\"OPEN_SHORT\"");
    }
}
