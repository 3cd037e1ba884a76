//! 원장 저장소 추상화.
//!
//! 엔진은 저장 기술에 의존하지 않고 다음 세 trait만 사용합니다:
//! - `LedgerStore` - 봇 단위 트랜잭션 시작과 일반 조회/관리
//! - `LedgerTx` - 봇 하나에 대한 원자적 읽기-수정-쓰기 단위
//! - `AuditSink` - 주 트랜잭션과 분리된 감사 로그 기록
//!
//! `LedgerTx`는 `commit` 없이 drop되면 롤백됩니다.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use ledger_core::{Bot, NewTrade, NewWebhookLog, Quantity, Trade, WebhookLog};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::StoreError;

/// 봇 하나에 대한 원자적 작업 단위.
///
/// 트랜잭션이 살아 있는 동안 같은 봇의 다른 트랜잭션은 대기합니다.
#[async_trait]
pub trait LedgerTx: Send {
    /// 트랜잭션 시작 시 잠금과 함께 읽은 봇.
    fn bot(&self) -> &Bot;

    /// 심볼의 미청산 진입 로트.
    async fn open_lots(&mut self, symbol: &str) -> Result<Vec<Trade>, StoreError>;

    /// 체결 기록을 추가하고 부여된 ID와 함께 반환합니다.
    async fn insert_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError>;

    /// 모두 소진된 로트를 삭제합니다.
    async fn delete_trade(&mut self, trade_id: i64) -> Result<(), StoreError>;

    /// 일부 소진된 로트를 남은 수량/수수료로 교체합니다.
    ///
    /// 로트의 ID와 시각은 유지되므로 FIFO 순서도 그대로입니다.
    async fn shrink_lot(
        &mut self,
        trade_id: i64,
        remaining: Quantity,
        remaining_commission: Decimal,
    ) -> Result<(), StoreError>;

    /// 거래 효과를 반영한 현재 잔고를 기록합니다.
    async fn update_balance(&mut self, current_balance: Decimal) -> Result<(), StoreError>;

    /// 시작 잔고 리베이스. 거래 경로와 구분되는 유일한 잔고 변경입니다.
    async fn rebase_balances(
        &mut self,
        starting_balance: Decimal,
        current_balance: Decimal,
    ) -> Result<(), StoreError>;

    /// 같은 트랜잭션 안에서 웹훅 로그를 추가합니다.
    async fn append_log(&mut self, log: NewWebhookLog) -> Result<(), StoreError>;

    /// 모든 변경을 한 번에 반영합니다.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// 트랜잭션 원장 저장소.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 봇 단위 상호 배제를 획득하고 트랜잭션을 시작합니다.
    ///
    /// 봇이 없으면 `StoreError::BotNotFound`.
    async fn begin(&self, bot_id: Uuid) -> Result<Box<dyn LedgerTx>, StoreError>;

    async fn insert_bot(&self, bot: &Bot) -> Result<(), StoreError>;

    async fn get_bot(&self, bot_id: Uuid) -> Result<Option<Bot>, StoreError>;

    /// 최근 생성 순.
    async fn list_bots(&self) -> Result<Vec<Bot>, StoreError>;

    /// 이름/수수료율/슬리피지만 갱신합니다. 잔고는 건드리지 않습니다.
    async fn update_bot_settings(&self, bot: &Bot) -> Result<(), StoreError>;

    /// 봇과 소속 거래/로그를 삭제합니다. 삭제했으면 true.
    async fn delete_bot(&self, bot_id: Uuid) -> Result<bool, StoreError>;

    /// 봇의 모든 거래 (시각 오름차순).
    async fn list_trades(&self, bot_id: Uuid) -> Result<Vec<Trade>, StoreError>;

    /// 트랜잭션 밖에서 읽는 미청산 로트 (조회 전용).
    async fn open_lots(&self, bot_id: Uuid, symbol: &str) -> Result<Vec<Trade>, StoreError>;

    /// 최근 웹훅 로그 (최신 순).
    async fn webhook_logs(&self, bot_id: Uuid, limit: i64) -> Result<Vec<WebhookLog>, StoreError>;
}

/// 감사 로그 기록 채널.
///
/// 실패한 시그널 처리의 로그를 주 트랜잭션 롤백 이후에 남길 때 사용합니다.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, log: NewWebhookLog) -> Result<(), StoreError>;
}
