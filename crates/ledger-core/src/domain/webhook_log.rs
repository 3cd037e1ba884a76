//! 웹훅 처리 감사 로그.
//!
//! 시그널 처리 시도마다 하나씩 남는 추가 전용 기록입니다.
//! 포지션 상태 계산에는 절대 사용되지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// 처리 결과 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// 거래가 커밋됨
    Success,
    /// 거부 또는 실패
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogStatus::Success),
            "error" => Ok(LogStatus::Error),
            other => Err(CoreError::InvalidInput(format!(
                "Unknown log status: {}",
                other
            ))),
        }
    }
}

/// 저장된 웹훅 로그.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    pub bot_id: Uuid,
    pub status: LogStatus,
    /// 원본 요청 (JSON)
    pub request_body: Option<String>,
    /// 성공 응답 (JSON)
    pub response_body: Option<String>,
    /// 실패 사유
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 저장 전 웹훅 로그.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWebhookLog {
    pub bot_id: Uuid,
    pub status: LogStatus,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl NewWebhookLog {
    /// 성공 로그를 생성합니다.
    pub fn success(bot_id: Uuid, request: &serde_json::Value, response: &serde_json::Value) -> Self {
        Self {
            bot_id,
            status: LogStatus::Success,
            request_body: Some(request.to_string()),
            response_body: Some(response.to_string()),
            error_message: None,
        }
    }

    /// 실패 로그를 생성합니다.
    pub fn failure(bot_id: Uuid, request: &serde_json::Value, error: impl Into<String>) -> Self {
        Self {
            bot_id,
            status: LogStatus::Error,
            request_body: Some(request.to_string()),
            response_body: None,
            error_message: Some(error.into()),
        }
    }

    /// 저장소가 부여한 ID와 시각으로 `WebhookLog`를 만듭니다.
    pub fn into_log(self, id: i64, created_at: DateTime<Utc>) -> WebhookLog {
        WebhookLog {
            id,
            bot_id: self.bot_id,
            status: self.status,
            request_body: self.request_body,
            response_body: self.response_body,
            error_message: self.error_message,
            created_at,
        }
    }
}
