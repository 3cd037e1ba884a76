//! 원장 시스템의 공통 에러 타입.
//!
//! 도메인 값 파싱, 설정 로드, 직렬화 과정에서 발생하는 에러를 정의합니다.
//! 신호 처리 에러는 `ledger-engine` 크레이트의 `LedgerError`가 담당합니다.

use thiserror::Error;

/// 핵심 원장 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Serialization(_)));
    }
}
