//! 메모리 기반 원장 저장소.
//!
//! 봇마다 `tokio::sync::Mutex`로 보호되는 장부를 두고, 트랜잭션은 잠금을 쥔 채
//! 장부 사본을 수정하다가 커밋 시 원본을 교체합니다. 테스트와 단일 프로세스
//! 실행에 사용합니다.

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::{Bot, NewTrade, NewWebhookLog, Quantity, Trade, WebhookLog};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{AuditSink, LedgerStore, LedgerTx};
use crate::error::StoreError;
use crate::resolver::sort_fifo;

/// 봇 하나의 장부.
#[derive(Debug, Clone)]
struct BotBook {
    bot: Bot,
    trades: Vec<Trade>,
    logs: Vec<WebhookLog>,
}

/// 삽입 순번 발급기 (SERIAL 대응).
#[derive(Debug, Default)]
struct Sequences {
    trade: AtomicI64,
    log: AtomicI64,
}

impl Sequences {
    fn next_trade(&self) -> i64 {
        self.trade.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_log(&self) -> i64 {
        self.log.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// 메모리 원장 저장소.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: RwLock<HashMap<Uuid, Arc<Mutex<BotBook>>>>,
    sequences: Arc<Sequences>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn book(&self, bot_id: Uuid) -> Result<Arc<Mutex<BotBook>>, StoreError> {
        self.books
            .read()
            .await
            .get(&bot_id)
            .cloned()
            .ok_or(StoreError::BotNotFound(bot_id))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self, bot_id: Uuid) -> Result<Box<dyn LedgerTx>, StoreError> {
        let book = self.book(bot_id).await?;
        let guard = book.lock_owned().await;

        // 잠금 대기 중 삭제되었을 수 있음
        if !self.books.read().await.contains_key(&bot_id) {
            return Err(StoreError::BotNotFound(bot_id));
        }

        let staging = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard,
            staging,
            sequences: Arc::clone(&self.sequences),
        }))
    }

    async fn insert_bot(&self, bot: &Bot) -> Result<(), StoreError> {
        let mut books = self.books.write().await;
        if books.contains_key(&bot.id) {
            return Err(StoreError::Corrupt(format!("duplicate bot id {}", bot.id)));
        }
        books.insert(
            bot.id,
            Arc::new(Mutex::new(BotBook {
                bot: bot.clone(),
                trades: Vec::new(),
                logs: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn get_bot(&self, bot_id: Uuid) -> Result<Option<Bot>, StoreError> {
        match self.book(bot_id).await {
            Ok(book) => Ok(Some(book.lock().await.bot.clone())),
            Err(StoreError::BotNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_bots(&self) -> Result<Vec<Bot>, StoreError> {
        let books: Vec<_> = self.books.read().await.values().cloned().collect();

        let mut bots = Vec::with_capacity(books.len());
        for book in books {
            bots.push(book.lock().await.bot.clone());
        }
        bots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bots)
    }

    async fn update_bot_settings(&self, bot: &Bot) -> Result<(), StoreError> {
        let book = self.book(bot.id).await?;
        let mut book = book.lock().await;
        book.bot.name = bot.name.clone();
        book.bot.commission_rate = bot.commission_rate;
        book.bot.slippage_rate = bot.slippage_rate;
        Ok(())
    }

    async fn delete_bot(&self, bot_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.books.write().await.remove(&bot_id).is_some())
    }

    async fn list_trades(&self, bot_id: Uuid) -> Result<Vec<Trade>, StoreError> {
        let book = self.book(bot_id).await?;
        let mut trades = book.lock().await.trades.clone();
        sort_fifo(&mut trades);
        Ok(trades)
    }

    async fn open_lots(&self, bot_id: Uuid, symbol: &str) -> Result<Vec<Trade>, StoreError> {
        let book = self.book(bot_id).await?;
        let book = book.lock().await;
        Ok(lots_for(&book.trades, symbol))
    }

    async fn webhook_logs(&self, bot_id: Uuid, limit: i64) -> Result<Vec<WebhookLog>, StoreError> {
        let book = self.book(bot_id).await?;
        let book = book.lock().await;
        Ok(book
            .logs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, log: NewWebhookLog) -> Result<(), StoreError> {
        let book = self.book(log.bot_id).await?;
        let id = self.sequences.next_log();
        book.lock().await.logs.push(log.into_log(id, Utc::now()));
        Ok(())
    }
}

fn lots_for(trades: &[Trade], symbol: &str) -> Vec<Trade> {
    let mut lots: Vec<Trade> = trades
        .iter()
        .filter(|t| t.is_lot() && t.symbol == symbol)
        .cloned()
        .collect();
    sort_fifo(&mut lots);
    lots
}

/// 메모리 트랜잭션. 봇 잠금을 쥐고 장부 사본을 수정합니다.
struct MemoryTx {
    guard: OwnedMutexGuard<BotBook>,
    staging: BotBook,
    sequences: Arc<Sequences>,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    fn bot(&self) -> &Bot {
        &self.staging.bot
    }

    async fn open_lots(&mut self, symbol: &str) -> Result<Vec<Trade>, StoreError> {
        Ok(lots_for(&self.staging.trades, symbol))
    }

    async fn insert_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError> {
        let trade = trade.into_trade(self.sequences.next_trade());
        self.staging.trades.push(trade.clone());
        Ok(trade)
    }

    async fn delete_trade(&mut self, trade_id: i64) -> Result<(), StoreError> {
        let index = self
            .staging
            .trades
            .iter()
            .position(|t| t.id == trade_id)
            .ok_or(StoreError::TradeNotFound(trade_id))?;
        self.staging.trades.remove(index);
        Ok(())
    }

    async fn shrink_lot(
        &mut self,
        trade_id: i64,
        remaining: Quantity,
        remaining_commission: Decimal,
    ) -> Result<(), StoreError> {
        let lot = self
            .staging
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(StoreError::TradeNotFound(trade_id))?;
        lot.contracts = remaining;
        lot.commission = remaining_commission;
        Ok(())
    }

    async fn update_balance(&mut self, current_balance: Decimal) -> Result<(), StoreError> {
        self.staging.bot.current_balance = current_balance;
        Ok(())
    }

    async fn rebase_balances(
        &mut self,
        starting_balance: Decimal,
        current_balance: Decimal,
    ) -> Result<(), StoreError> {
        self.staging.bot.starting_balance = starting_balance;
        self.staging.bot.current_balance = current_balance;
        Ok(())
    }

    async fn append_log(&mut self, log: NewWebhookLog) -> Result<(), StoreError> {
        let id = self.sequences.next_log();
        self.staging.logs.push(log.into_log(id, Utc::now()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard, staging, ..
        } = *self;
        *guard = staging;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Action, NewBot, TradeKind};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn store_with_bot() -> (MemoryStore, Bot) {
        let store = MemoryStore::new();
        let bot = Bot::new(NewBot::new("mem", dec!(1000)), "http://h").unwrap();
        store.insert_bot(&bot).await.unwrap();
        (store, bot)
    }

    fn open_long(bot_id: Uuid, contracts: Decimal) -> NewTrade {
        NewTrade {
            bot_id,
            symbol: "X".to_string(),
            action: Action::Buy,
            signal_price: dec!(100),
            execution_price: dec!(100),
            contracts,
            position_size: Decimal::ZERO,
            commission: Decimal::ZERO,
            pnl: Decimal::ZERO,
            balance_after: dec!(1000),
            kind: TradeKind::OpenLong,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_applies_changes() {
        let (store, bot) = store_with_bot().await;

        let mut tx = store.begin(bot.id).await.unwrap();
        tx.insert_trade(open_long(bot.id, dec!(2))).await.unwrap();
        tx.update_balance(dec!(999)).await.unwrap();
        tx.commit().await.unwrap();

        let lots = store.open_lots(bot.id, "X").await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].contracts, dec!(2));
        let bot = store.get_bot(bot.id).await.unwrap().unwrap();
        assert_eq!(bot.current_balance, dec!(999));
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let (store, bot) = store_with_bot().await;

        {
            let mut tx = store.begin(bot.id).await.unwrap();
            tx.insert_trade(open_long(bot.id, dec!(2))).await.unwrap();
            tx.update_balance(dec!(1)).await.unwrap();
            tx.append_log(NewWebhookLog::failure(bot.id, &serde_json::Value::Null, "x"))
                .await
                .unwrap();
        }

        assert!(store.open_lots(bot.id, "X").await.unwrap().is_empty());
        assert!(store.webhook_logs(bot.id, 10).await.unwrap().is_empty());
        let bot = store.get_bot(bot.id).await.unwrap().unwrap();
        assert_eq!(bot.current_balance, dec!(1000));
    }

    #[tokio::test]
    async fn test_begin_serializes_per_bot() {
        let (store, bot) = store_with_bot().await;
        let other = Bot::new(NewBot::new("other", dec!(10)), "http://h").unwrap();
        store.insert_bot(&other).await.unwrap();

        let tx = store.begin(bot.id).await.unwrap();

        // 같은 봇은 대기
        let blocked = tokio::time::timeout(Duration::from_millis(50), store.begin(bot.id)).await;
        assert!(blocked.is_err());

        // 다른 봇은 진행
        let other_tx = tokio::time::timeout(Duration::from_millis(50), store.begin(other.id)).await;
        assert!(other_tx.is_ok());

        drop(tx);
        assert!(store.begin(bot.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_shrink_and_delete_lot() {
        let (store, bot) = store_with_bot().await;

        let mut tx = store.begin(bot.id).await.unwrap();
        let a = tx.insert_trade(open_long(bot.id, dec!(3))).await.unwrap();
        let b = tx.insert_trade(open_long(bot.id, dec!(1))).await.unwrap();
        tx.shrink_lot(a.id, dec!(1), dec!(0.01)).await.unwrap();
        tx.delete_trade(b.id).await.unwrap();
        assert!(matches!(
            tx.delete_trade(b.id).await,
            Err(StoreError::TradeNotFound(_))
        ));
        tx.commit().await.unwrap();

        let lots = store.open_lots(bot.id, "X").await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].id, a.id);
        assert_eq!(lots[0].contracts, dec!(1));
        assert_eq!(lots[0].commission, dec!(0.01));
    }

    #[tokio::test]
    async fn test_unknown_bot() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.begin(id).await, Err(StoreError::BotNotFound(_))));
        assert!(store.get_bot(id).await.unwrap().is_none());
        assert!(store
            .record(NewWebhookLog::failure(id, &serde_json::Value::Null, "x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_bot_cascades() {
        let (store, bot) = store_with_bot().await;
        store
            .record(NewWebhookLog::failure(bot.id, &serde_json::Value::Null, "x"))
            .await
            .unwrap();

        assert!(store.delete_bot(bot.id).await.unwrap());
        assert!(!store.delete_bot(bot.id).await.unwrap());
        assert!(matches!(
            store.webhook_logs(bot.id, 10).await,
            Err(StoreError::BotNotFound(_))
        ));
    }
}
