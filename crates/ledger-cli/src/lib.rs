//! 원장 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 데이터베이스 마이그레이션
//! - 봇 생성/조회/설정 변경/삭제
//! - 시그널 및 웹훅 파일 처리
//! - 포지션 조회와 시작 잔고 리베이스

pub mod commands;

pub use commands::*;
