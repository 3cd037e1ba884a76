//! 원장 운영을 위한 도메인 모델.

mod action;
mod bot;
mod signal;
mod statistics;
mod trade;
mod webhook_log;

pub use action::*;
pub use bot::*;
pub use signal::*;
pub use statistics::*;
pub use trade::*;
pub use webhook_log::*;
