//! PostgreSQL 원장 저장소.
//!
//! 봇 단위 상호 배제는 `SELECT ... FOR UPDATE`로 봇 행을 잠가 구현합니다.
//! 같은 봇에 대한 트랜잭션은 행 잠금이 풀릴 때까지 대기하고, 다른 봇은
//! 서로 간섭하지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{
    Action, Bot, DatabaseConfig, LogStatus, NewTrade, NewWebhookLog, Quantity, Trade, TradeKind,
    WebhookLog,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuditSink, LedgerStore, LedgerTx};
use crate::error::StoreError;

const BOT_COLUMNS: &str = "id, name, webhook_url, starting_balance, current_balance, \
    commission_rate, slippage_rate, created_at";

const TRADE_COLUMNS: &str = "id, bot_id, symbol, action, signal_price, execution_price, \
    contracts, position_size, commission, pnl, balance_after, trade_type, timestamp";

const LOG_COLUMNS: &str =
    "id, bot_id, status, request_body, response_body, error_message, created_at";

#[derive(Debug, FromRow)]
struct BotRow {
    id: Uuid,
    name: String,
    webhook_url: String,
    starting_balance: Decimal,
    current_balance: Decimal,
    commission_rate: Decimal,
    slippage_rate: Decimal,
    created_at: DateTime<Utc>,
}

impl From<BotRow> for Bot {
    fn from(row: BotRow) -> Self {
        Bot {
            id: row.id,
            name: row.name,
            webhook_url: row.webhook_url,
            starting_balance: row.starting_balance,
            current_balance: row.current_balance,
            commission_rate: row.commission_rate,
            slippage_rate: row.slippage_rate,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TradeRow {
    id: i64,
    bot_id: Uuid,
    symbol: String,
    action: String,
    signal_price: Decimal,
    execution_price: Decimal,
    contracts: Decimal,
    position_size: Decimal,
    commission: Decimal,
    pnl: Decimal,
    balance_after: Decimal,
    trade_type: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = StoreError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let action = Action::from_str(&row.action)
            .map_err(|e| StoreError::Corrupt(format!("trade {}: {}", row.id, e)))?;
        let kind = TradeKind::from_str(&row.trade_type)
            .map_err(|e| StoreError::Corrupt(format!("trade {}: {}", row.id, e)))?;

        Ok(Trade {
            id: row.id,
            bot_id: row.bot_id,
            symbol: row.symbol,
            action,
            signal_price: row.signal_price,
            execution_price: row.execution_price,
            contracts: row.contracts,
            position_size: row.position_size,
            commission: row.commission,
            pnl: row.pnl,
            balance_after: row.balance_after,
            kind,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    bot_id: Uuid,
    status: String,
    request_body: Option<String>,
    response_body: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LogRow> for WebhookLog {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let status = LogStatus::from_str(&row.status)
            .map_err(|e| StoreError::Corrupt(format!("webhook log {}: {}", row.id, e)))?;

        Ok(WebhookLog {
            id: row.id,
            bot_id: row.bot_id,
            status,
            request_body: row.request_body,
            response_body: row.response_body,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

fn into_trades(rows: Vec<TradeRow>) -> Result<Vec<Trade>, StoreError> {
    rows.into_iter().map(Trade::try_from).collect()
}

fn lots_query() -> String {
    format!(
        "SELECT {TRADE_COLUMNS} FROM trades \
         WHERE bot_id = $1 AND symbol = $2 AND trade_type IN ('OPEN_LONG', 'OPEN_SHORT') \
         ORDER BY timestamp ASC, id ASC"
    )
}

/// PostgreSQL 원장 저장소.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// 새로운 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 기존 연결 풀을 재사용합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 스키마 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self, bot_id: Uuid) -> Result<Box<dyn LedgerTx>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<BotRow> = sqlx::query_as(&format!(
            "SELECT {BOT_COLUMNS} FROM bots WHERE id = $1 FOR UPDATE"
        ))
        .bind(bot_id)
        .fetch_optional(&mut *tx)
        .await?;

        let bot = row.map(Bot::from).ok_or(StoreError::BotNotFound(bot_id))?;
        debug!(bot_id = %bot_id, "Bot row locked");

        Ok(Box::new(PgLedgerTx { tx, bot }))
    }

    async fn insert_bot(&self, bot: &Bot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bots (id, name, webhook_url, starting_balance, current_balance,
                              commission_rate, slippage_rate, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(bot.id)
        .bind(&bot.name)
        .bind(&bot.webhook_url)
        .bind(bot.starting_balance)
        .bind(bot.current_balance)
        .bind(bot.commission_rate)
        .bind(bot.slippage_rate)
        .bind(bot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bot(&self, bot_id: Uuid) -> Result<Option<Bot>, StoreError> {
        let row: Option<BotRow> =
            sqlx::query_as(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = $1"))
                .bind(bot_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Bot::from))
    }

    async fn list_bots(&self) -> Result<Vec<Bot>, StoreError> {
        let rows: Vec<BotRow> = sqlx::query_as(&format!(
            "SELECT {BOT_COLUMNS} FROM bots ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Bot::from).collect())
    }

    async fn update_bot_settings(&self, bot: &Bot) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bots
            SET name = $2, commission_rate = $3, slippage_rate = $4
            WHERE id = $1
            "#,
        )
        .bind(bot.id)
        .bind(&bot.name)
        .bind(bot.commission_rate)
        .bind(bot.slippage_rate)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::BotNotFound(bot.id));
        }
        Ok(())
    }

    async fn delete_bot(&self, bot_id: Uuid) -> Result<bool, StoreError> {
        // trades/webhook_logs는 ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM bots WHERE id = $1")
            .bind(bot_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_trades(&self, bot_id: Uuid) -> Result<Vec<Trade>, StoreError> {
        let rows: Vec<TradeRow> = sqlx::query_as(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE bot_id = $1 ORDER BY timestamp ASC, id ASC"
        ))
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        into_trades(rows)
    }

    async fn open_lots(&self, bot_id: Uuid, symbol: &str) -> Result<Vec<Trade>, StoreError> {
        let rows: Vec<TradeRow> = sqlx::query_as(&lots_query())
            .bind(bot_id)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await?;
        into_trades(rows)
    }

    async fn webhook_logs(&self, bot_id: Uuid, limit: i64) -> Result<Vec<WebhookLog>, StoreError> {
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM webhook_logs WHERE bot_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(bot_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WebhookLog::try_from).collect()
    }
}

#[async_trait]
impl AuditSink for PgLedgerStore {
    async fn record(&self, log: NewWebhookLog) -> Result<(), StoreError> {
        insert_log(&self.pool, log).await
    }
}

async fn insert_log<'e, E>(executor: E, log: NewWebhookLog) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO webhook_logs (bot_id, status, request_body, response_body, error_message)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(log.bot_id)
    .bind(log.status.as_str())
    .bind(log.request_body)
    .bind(log.response_body)
    .bind(log.error_message)
    .execute(executor)
    .await?;
    Ok(())
}

/// 봇 행 잠금을 쥔 PostgreSQL 트랜잭션.
///
/// drop 시 sqlx가 롤백합니다.
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    bot: Bot,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    fn bot(&self) -> &Bot {
        &self.bot
    }

    async fn open_lots(&mut self, symbol: &str) -> Result<Vec<Trade>, StoreError> {
        let rows: Vec<TradeRow> = sqlx::query_as(&lots_query())
            .bind(self.bot.id)
            .bind(symbol)
            .fetch_all(&mut *self.tx)
            .await?;
        into_trades(rows)
    }

    async fn insert_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO trades (bot_id, symbol, action, signal_price, execution_price,
                                contracts, position_size, commission, pnl, balance_after,
                                trade_type, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(trade.bot_id)
        .bind(&trade.symbol)
        .bind(trade.action.as_str())
        .bind(trade.signal_price)
        .bind(trade.execution_price)
        .bind(trade.contracts)
        .bind(trade.position_size)
        .bind(trade.commission)
        .bind(trade.pnl)
        .bind(trade.balance_after)
        .bind(trade.kind.as_str())
        .bind(trade.timestamp)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(trade.into_trade(id))
    }

    async fn delete_trade(&mut self, trade_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM trades WHERE id = $1 AND bot_id = $2")
            .bind(trade_id)
            .bind(self.bot.id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TradeNotFound(trade_id));
        }
        Ok(())
    }

    async fn shrink_lot(
        &mut self,
        trade_id: i64,
        remaining: Quantity,
        remaining_commission: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE trades SET contracts = $3, commission = $4 WHERE id = $1 AND bot_id = $2",
        )
        .bind(trade_id)
        .bind(self.bot.id)
        .bind(remaining)
        .bind(remaining_commission)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TradeNotFound(trade_id));
        }
        Ok(())
    }

    async fn update_balance(&mut self, current_balance: Decimal) -> Result<(), StoreError> {
        sqlx::query("UPDATE bots SET current_balance = $2 WHERE id = $1")
            .bind(self.bot.id)
            .bind(current_balance)
            .execute(&mut *self.tx)
            .await?;
        self.bot.current_balance = current_balance;
        Ok(())
    }

    async fn rebase_balances(
        &mut self,
        starting_balance: Decimal,
        current_balance: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE bots SET starting_balance = $2, current_balance = $3 WHERE id = $1")
            .bind(self.bot.id)
            .bind(starting_balance)
            .bind(current_balance)
            .execute(&mut *self.tx)
            .await?;
        self.bot.starting_balance = starting_balance;
        self.bot.current_balance = current_balance;
        Ok(())
    }

    async fn append_log(&mut self, log: NewWebhookLog) -> Result<(), StoreError> {
        insert_log(&mut *self.tx, log).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
