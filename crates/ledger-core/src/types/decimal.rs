//! 정밀한 금융 계산을 위한 Decimal 유틸리티.
//!
//! 잔고, 가격, 수량 계산은 모두 `rust_decimal::Decimal`로 수행하여
//! 부동소수점 누적 오차를 피합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 계약 수량을 위한 타입.
pub type Quantity = Decimal;

/// 비율 타입 (0.0005 = 0.05%).
pub type Rate = Decimal;

/// 이 값보다 작은 순포지션 크기는 평탄(flat)으로 간주합니다.
pub const POSITION_EPSILON: Decimal = dec!(0.0001);

/// 금액 표시용 소수점 자릿수.
pub const MONEY_DP: u32 = 8;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 순포지션 허용 오차 미만의 크기인지 확인합니다.
    fn is_dust(&self) -> bool;

    /// 퍼센트 문자열로 변환합니다 (예: "5.25%").
    fn to_percentage_string(&self) -> String;

    /// 저장 정밀도(소수점 8자리)로 반올림합니다.
    fn round_money(&self) -> Decimal;
}

impl DecimalExt for Decimal {
    fn is_dust(&self) -> bool {
        self.abs() < POSITION_EPSILON
    }

    fn to_percentage_string(&self) -> String {
        let pct = *self * Decimal::from(100);
        format!("{:.2}%", pct)
    }

    fn round_money(&self) -> Decimal {
        self.round_dp_with_strategy(
            MONEY_DP,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        )
    }
}
