//! 가상 트레이딩 봇.
//!
//! 이 모듈은 봇 관련 타입을 정의합니다:
//! - `Bot` - 잔고와 수수료/슬리피지 설정을 가진 봇 엔티티
//! - `NewBot` - 봇 생성 입력
//! - `BotUpdate` - 봇 설정 변경 입력

use crate::error::CoreError;
use crate::types::Rate;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 기본 수수료율 (0.05%).
pub const DEFAULT_COMMISSION_RATE: Rate = dec!(0.0005);

/// 기본 슬리피지 (0.1%).
pub const DEFAULT_SLIPPAGE_RATE: Rate = dec!(0.001);

/// 시그널을 받아 가상 포지션을 운용하는 봇.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    /// 봇 ID
    pub id: Uuid,
    /// 표시 이름
    pub name: String,
    /// 알림 소스에 등록할 웹훅 URL
    pub webhook_url: String,
    /// 시작 잔고
    pub starting_balance: Decimal,
    /// 현재 잔고 (원장 엔진과 리베이스만 변경)
    pub current_balance: Decimal,
    /// 수수료율
    pub commission_rate: Rate,
    /// 슬리피지 비율
    pub slippage_rate: Rate,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl Bot {
    /// 생성 입력으로부터 새 봇을 만듭니다.
    ///
    /// 현재 잔고는 시작 잔고와 같게 초기화됩니다.
    pub fn new(input: NewBot, webhook_base_url: &str) -> Result<Self, CoreError> {
        input.validate()?;

        let id = Uuid::new_v4();
        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            webhook_url: webhook_url_for(webhook_base_url, id),
            starting_balance: input.starting_balance,
            current_balance: input.starting_balance,
            commission_rate: input.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE),
            slippage_rate: input.slippage_rate.unwrap_or(DEFAULT_SLIPPAGE_RATE),
            created_at: Utc::now(),
        })
    }

    /// 누적 수익률 ((현재 - 시작) / 시작). 시작 잔고가 0이면 0.
    pub fn historical_return_ratio(&self) -> Decimal {
        if self.starting_balance.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_balance - self.starting_balance) / self.starting_balance
    }

    /// 시작 잔고를 바꿨을 때 같은 수익률을 유지하는 현재 잔고.
    ///
    /// Decimal 범위를 넘으면 `None`.
    pub fn rebased_current_balance(&self, new_starting_balance: Decimal) -> Option<Decimal> {
        let ratio = if self.starting_balance.is_zero() {
            Decimal::ZERO
        } else {
            self.current_balance
                .checked_sub(self.starting_balance)?
                .checked_div(self.starting_balance)?
        };
        new_starting_balance.checked_mul(Decimal::ONE.checked_add(ratio)?)
    }

    /// 총 손익 (현재 - 시작).
    pub fn total_pnl(&self) -> Decimal {
        self.current_balance - self.starting_balance
    }

    /// 설정 변경을 적용합니다. 잔고는 변경하지 않습니다.
    pub fn apply_update(&mut self, update: &BotUpdate) -> Result<(), CoreError> {
        update.validate()?;

        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(rate) = update.commission_rate {
            self.commission_rate = rate;
        }
        if let Some(rate) = update.slippage_rate {
            self.slippage_rate = rate;
        }
        Ok(())
    }
}

/// 봇 ID에 대한 웹훅 URL.
pub fn webhook_url_for(base_url: &str, bot_id: Uuid) -> String {
    format!("{}/webhook/{}", base_url.trim_end_matches('/'), bot_id)
}

/// 봇 생성 입력.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBot {
    /// 표시 이름
    pub name: String,
    /// 시작 잔고
    pub starting_balance: Decimal,
    /// 수수료율 (없으면 기본값)
    #[serde(default)]
    pub commission_rate: Option<Rate>,
    /// 슬리피지 (없으면 기본값)
    #[serde(default)]
    pub slippage_rate: Option<Rate>,
}

impl NewBot {
    /// 기본 수수료/슬리피지로 생성 입력을 만듭니다.
    pub fn new(name: impl Into<String>, starting_balance: Decimal) -> Self {
        Self {
            name: name.into(),
            starting_balance,
            commission_rate: None,
            slippage_rate: None,
        }
    }

    /// 수수료율을 설정합니다.
    pub fn with_commission_rate(mut self, rate: Rate) -> Self {
        self.commission_rate = Some(rate);
        self
    }

    /// 슬리피지를 설정합니다.
    pub fn with_slippage_rate(mut self, rate: Rate) -> Self {
        self.slippage_rate = Some(rate);
        self
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("bot name is required".to_string()));
        }
        if self.starting_balance < Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "starting balance must not be negative: {}",
                self.starting_balance
            )));
        }
        validate_rate("commission_rate", self.commission_rate)?;
        validate_rate("slippage_rate", self.slippage_rate)
    }
}

/// 봇 설정 변경 입력.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub commission_rate: Option<Rate>,
    #[serde(default)]
    pub slippage_rate: Option<Rate>,
}

impl BotUpdate {
    /// 변경할 필드가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.commission_rate.is_none() && self.slippage_rate.is_none()
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::InvalidInput("No fields to update".to_string()));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidInput("bot name is required".to_string()));
            }
        }
        validate_rate("commission_rate", self.commission_rate)?;
        validate_rate("slippage_rate", self.slippage_rate)
    }
}

fn validate_rate(field: &str, rate: Option<Rate>) -> Result<(), CoreError> {
    match rate {
        Some(r) if r < Decimal::ZERO || r >= Decimal::ONE => Err(CoreError::InvalidInput(
            format!("{} must be in [0, 1): {}", field, r),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bot(starting: Decimal, current: Decimal) -> Bot {
        let mut bot = Bot::new(NewBot::new("test", starting), "http://localhost:5000").unwrap();
        bot.current_balance = current;
        bot
    }

    #[test]
    fn test_new_bot_defaults() {
        let bot = Bot::new(NewBot::new("  alpha ", dec!(1000)), "http://host/").unwrap();
        assert_eq!(bot.name, "alpha");
        assert_eq!(bot.current_balance, dec!(1000));
        assert_eq!(bot.commission_rate, DEFAULT_COMMISSION_RATE);
        assert_eq!(bot.slippage_rate, DEFAULT_SLIPPAGE_RATE);
        assert_eq!(bot.webhook_url, format!("http://host/webhook/{}", bot.id));
    }

    #[test]
    fn test_new_bot_validation() {
        assert!(Bot::new(NewBot::new("", dec!(1000)), "http://h").is_err());
        assert!(Bot::new(NewBot::new("a", dec!(-1)), "http://h").is_err());
        assert!(Bot::new(
            NewBot::new("a", dec!(1)).with_commission_rate(dec!(1.5)),
            "http://h"
        )
        .is_err());
    }

    #[test]
    fn test_rebase_keeps_return_ratio() {
        let bot = bot(dec!(1000), dec!(1100));
        assert_eq!(bot.historical_return_ratio(), dec!(0.1));
        assert_eq!(bot.rebased_current_balance(dec!(5000)), Some(dec!(5500)));
    }

    #[test]
    fn test_rebase_from_zero_start() {
        let bot = bot(Decimal::ZERO, dec!(50));
        assert_eq!(bot.historical_return_ratio(), Decimal::ZERO);
        assert_eq!(bot.rebased_current_balance(dec!(200)), Some(dec!(200)));
    }

    #[test]
    fn test_rebase_overflow_is_none() {
        let bot = bot(dec!(0.00000001), dec!(1000));
        assert_eq!(bot.rebased_current_balance(Decimal::MAX), None);
    }

    #[test]
    fn test_apply_update() {
        let mut bot = bot(dec!(1000), dec!(1000));
        let update = BotUpdate {
            name: Some("renamed".to_string()),
            commission_rate: Some(dec!(0.001)),
            slippage_rate: None,
        };
        bot.apply_update(&update).unwrap();
        assert_eq!(bot.name, "renamed");
        assert_eq!(bot.commission_rate, dec!(0.001));
        assert_eq!(bot.slippage_rate, DEFAULT_SLIPPAGE_RATE);
        assert_eq!(bot.current_balance, dec!(1000));

        assert!(bot.apply_update(&BotUpdate::default()).is_err());
    }

    proptest! {
        #[test]
        fn prop_rebase_preserves_return_ratio(
            start_cents in 1i64..100_000_000,
            current_cents in 0i64..100_000_000,
            new_cents in 1i64..100_000_000,
        ) {
            let original = bot(Decimal::new(start_cents, 2), Decimal::new(current_cents, 2));
            let new_start = Decimal::new(new_cents, 2);

            let mut rebased = original.clone();
            rebased.current_balance = original.rebased_current_balance(new_start).unwrap();
            rebased.starting_balance = new_start;

            let drift = (rebased.historical_return_ratio() - original.historical_return_ratio()).abs();
            prop_assert!(drift < dec!(0.000000000001), "drift {}", drift);
        }

        #[test]
        fn prop_rebase_to_same_start_is_identity(
            start_cents in 1i64..100_000_000,
            current_cents in 0i64..100_000_000,
        ) {
            let start = Decimal::new(start_cents, 2);
            let current = Decimal::new(current_cents, 2);
            let rebased = bot(start, current).rebased_current_balance(start).unwrap();
            prop_assert!((rebased - current).abs() < dec!(0.000000000001));
        }
    }
}
