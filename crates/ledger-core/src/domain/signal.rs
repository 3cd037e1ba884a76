//! 외부 알림 소스의 매매 시그널.
//!
//! 이 모듈은 시그널 관련 타입을 정의합니다:
//! - `Signal` - 검증된 매매 시그널
//! - `WebhookPayload` - TradingView 형식의 원본 웹훅 페이로드

use crate::domain::Action;
use crate::error::{CoreError, CoreResult};
use crate::types::{DecimalExt, Price, Quantity, POSITION_EPSILON};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// 원장 엔진에 전달되는 매매 시그널.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// 대상 봇
    pub bot_id: Uuid,
    /// 거래 심볼
    pub symbol: String,
    /// 매매 방향
    pub action: Action,
    /// 알림이 보낸 가격
    pub signal_price: Price,
    /// 계약 수량
    pub quantity: Quantity,
    /// 알림이 보고한 포지션 크기 (참고용)
    #[serde(default)]
    pub position_size: Decimal,
    /// 시그널 시각
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// 현재 시각으로 새 시그널을 생성합니다.
    pub fn new(
        bot_id: Uuid,
        symbol: impl Into<String>,
        action: Action,
        signal_price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            bot_id,
            symbol: symbol.into(),
            action,
            signal_price,
            quantity,
            position_size: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// 시그널 시각을 설정합니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 보고된 포지션 크기를 설정합니다.
    pub fn with_position_size(mut self, position_size: Decimal) -> Self {
        self.position_size = position_size;
        self
    }

    /// 변경 전에 거부해야 하는 입력을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput("symbol is required".to_string()));
        }
        if self.signal_price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "signal price must be positive: {}",
                self.signal_price
            )));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "quantity must be positive: {}",
                self.quantity
            )));
        }
        // 허용 오차 미만 로트는 리졸버가 평탄으로 보므로 열 수 없음
        if self.quantity.is_dust() {
            return Err(CoreError::InvalidInput(format!(
                "quantity must be at least {}: {}",
                POSITION_EPSILON, self.quantity
            )));
        }
        Ok(())
    }

    /// 감사 로그에 남길 요청 표현.
    pub fn to_request_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// TradingView 알림이 보내는 웹훅 본문.
///
/// ```json
/// {
///   "symbol": "BTCUSDT.P",
///   "price": "64250.5",
///   "time": "2024-05-01T12:00:00Z",
///   "data": { "action": "buy", "contracts": "0.01", "position_size": "0.01" }
/// }
/// ```
///
/// 숫자 필드는 JSON 숫자와 문자열을 모두 허용합니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

/// 웹훅 본문의 `data` 필드.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub contracts: Option<Value>,
    #[serde(default)]
    pub position_size: Option<Value>,
}

impl WebhookPayload {
    /// JSON 값에서 페이로드를 파싱합니다.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// 검증된 시그널로 변환합니다.
    ///
    /// 0이거나 빠진 가격/수량은 누락으로 취급합니다.
    pub fn into_signal(self, bot_id: Uuid) -> CoreResult<Signal> {
        let data = self.data.unwrap_or_default();

        let action = data.action.filter(|a| !a.trim().is_empty());
        let symbol = self.symbol.filter(|s| !s.trim().is_empty());
        let price = parse_decimal_field("price", self.price.as_ref())?.filter(|p| !p.is_zero());
        let contracts =
            parse_decimal_field("contracts", data.contracts.as_ref())?.filter(|c| !c.is_zero());

        let (Some(action), Some(symbol), Some(price), Some(contracts)) =
            (action, symbol, price, contracts)
        else {
            return Err(CoreError::InvalidInput(
                "Missing required fields: action, price, symbol, contracts".to_string(),
            ));
        };

        let action = Action::from_str(&action)?;
        let position_size =
            parse_decimal_field("position_size", data.position_size.as_ref())?.unwrap_or_default();
        let timestamp = match self.time.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_timestamp(raw)?,
            _ => Utc::now(),
        };

        let signal = Signal::new(bot_id, symbol.trim(), action, price, contracts)
            .with_position_size(position_size)
            .with_timestamp(timestamp);
        signal.validate()?;
        Ok(signal)
    }
}

/// JSON 숫자 또는 문자열을 Decimal로 변환합니다.
fn parse_decimal_field(field: &str, value: Option<&Value>) -> CoreResult<Option<Decimal>> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(CoreError::InvalidInput(format!(
                "{} must be a number, got {}",
                field, other
            )))
        }
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| CoreError::InvalidInput(format!("{} is not a valid number: {}", field, raw)))
}

fn parse_timestamp(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidInput(format!("invalid time '{}': {}", raw, e)))
}
