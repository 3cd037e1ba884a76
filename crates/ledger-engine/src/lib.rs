//! 시그널 실행 엔진과 포지션 원장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 슬리피지를 반영한 체결 가격 계산 (`pricer`)
//! - 원장 기록으로부터 순포지션 도출 (`resolver`)
//! - FIFO 로트 매칭과 실현 손익 계산 (`matcher`)
//! - 시그널 하나를 원자적으로 처리하는 상태 머신 (`engine`)
//! - 트랜잭션 저장소 추상화와 메모리/PostgreSQL 구현 (`store`)
//! - 봇 생성/조회/설정 변경 (`bot_service`)
//!
//! # 예제
//!
//! ```rust,ignore
//! use ledger_engine::{LedgerEngine, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = LedgerEngine::new(store.clone(), store);
//! let result = engine.process_signal(&signal).await?;
//! ```

pub mod bot_service;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod pricer;
pub mod resolver;
pub mod store;

// 주요 타입 재내보내기
pub use bot_service::BotService;
pub use engine::{LedgerEngine, TradeOutcome, TradeResult};
pub use error::{LedgerError, LedgerResult, StoreError};
pub use matcher::{LotConsumption, MatchPlan};
pub use pricer::execution_price;
pub use resolver::{net_position, PositionState};
pub use store::{AuditSink, LedgerStore, LedgerTx, MemoryStore, PgLedgerStore};
