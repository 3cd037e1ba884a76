//! 시그널 처리 및 저장소 에러 타입.

use ledger_core::{Action, CoreError};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// 저장소 에러 타입.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Bot not found: {0}")]
    BotNotFound(Uuid),

    #[error("Trade not found: {0}")]
    TradeNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 시그널 처리 에러.
///
/// `Store`를 제외한 모든 변형은 비즈니스 규칙에 의한 거부이며,
/// 어느 경우든 트랜잭션은 롤백되어 부분 상태가 남지 않습니다.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient balance for position size: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("No opening position found for {symbol}")]
    NoOpeningPosition { symbol: String },

    #[error("Adding to positions not supported: {action} against position {position} on {symbol}")]
    UnsupportedOperation {
        symbol: String,
        action: Action,
        position: Decimal,
    },

    #[error("Bot not found: {0}")]
    BotNotFound(Uuid),

    #[error("Store error: {0}")]
    Store(StoreError),
}

/// 원장 작업을 위한 Result 타입.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// 감사 로그에 쓰는 안정적인 에러 태그.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::NoOpeningPosition { .. } => "no_opening_position",
            LedgerError::UnsupportedOperation { .. } => "unsupported_operation",
            LedgerError::BotNotFound(_) => "bot_not_found",
            LedgerError::Store(_) => "store",
        }
    }

    /// 인프라 장애가 아닌 규칙 위반에 의한 거부인지 확인합니다.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Store(_))
    }
}

/// Decimal 범위를 넘는 계산을 입력 거부로 바꿉니다.
pub(crate) fn overflow(context: &str) -> LedgerError {
    LedgerError::InvalidInput(format!("{} overflows decimal range", context))
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BotNotFound(id) => LedgerError::BotNotFound(id),
            other => LedgerError::Store(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Store(StoreError::Database(err))
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => LedgerError::InvalidInput(msg),
            other => LedgerError::InvalidInput(other.to_string()),
        }
    }
}
