//! CLI 명령어 구현 모듈.

pub mod app;
pub mod bots;
pub mod output;
pub mod trading;

pub use app::LedgerApp;
pub use output::OutputFormat;
