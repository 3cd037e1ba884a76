//! # Ledger Core
//!
//! 가상 선물 시그널 원장의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 원장 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 봇, 거래, 웹훅 로그 레코드
//! - 매매 방향 및 거래 유형
//! - 시그널 및 TradingView 웹훅 페이로드
//! - 봇 성과 통계
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
