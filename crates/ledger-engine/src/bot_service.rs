//! 봇 관리 서비스.
//!
//! 봇 생성/조회/설정 변경/삭제와 성과 통계를 제공합니다. 잔고는 여기서
//! 수정하지 않으며, 거래 경로(`LedgerEngine`)와 리베이스만 잔고를 바꿉니다.

use ledger_core::{Bot, BotDefaultsConfig, BotStats, BotUpdate, NewBot, WebhookLog};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// 웹훅 로그 조회 기본 개수.
pub const DEFAULT_LOG_LIMIT: i64 = 50;

/// 봇 관리 서비스.
#[derive(Clone)]
pub struct BotService {
    store: Arc<dyn LedgerStore>,
    defaults: BotDefaultsConfig,
}

impl BotService {
    pub fn new(store: Arc<dyn LedgerStore>, defaults: BotDefaultsConfig) -> Self {
        Self { store, defaults }
    }

    /// 새 봇을 만듭니다. 빠진 수수료율/슬리피지는 설정의 기본값을 씁니다.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_bot(&self, mut input: NewBot) -> LedgerResult<Bot> {
        input.commission_rate = input
            .commission_rate
            .or(Some(self.defaults.commission_rate));
        input.slippage_rate = input.slippage_rate.or(Some(self.defaults.slippage_rate));

        let bot = Bot::new(input, &self.defaults.public_base_url)?;
        self.store.insert_bot(&bot).await?;

        info!(
            bot_id = %bot.id,
            starting_balance = %bot.starting_balance,
            webhook_url = %bot.webhook_url,
            "Bot created"
        );
        Ok(bot)
    }

    pub async fn list_bots(&self) -> LedgerResult<Vec<Bot>> {
        Ok(self.store.list_bots().await?)
    }

    pub async fn get_bot(&self, bot_id: Uuid) -> LedgerResult<Bot> {
        self.store
            .get_bot(bot_id)
            .await?
            .ok_or(LedgerError::BotNotFound(bot_id))
    }

    /// 이름/수수료율/슬리피지를 변경합니다.
    pub async fn update_bot(&self, bot_id: Uuid, update: BotUpdate) -> LedgerResult<Bot> {
        let mut bot = self.get_bot(bot_id).await?;
        bot.apply_update(&update)?;
        self.store.update_bot_settings(&bot).await?;

        info!(bot_id = %bot_id, "Bot settings updated");
        Ok(bot)
    }

    /// 봇과 소속 거래/로그를 삭제합니다.
    pub async fn delete_bot(&self, bot_id: Uuid) -> LedgerResult<()> {
        if !self.store.delete_bot(bot_id).await? {
            return Err(LedgerError::BotNotFound(bot_id));
        }
        info!(bot_id = %bot_id, "Bot deleted");
        Ok(())
    }

    /// 거래 기록으로부터 성과 통계를 계산합니다.
    pub async fn bot_stats(&self, bot_id: Uuid) -> LedgerResult<BotStats> {
        let bot = self.get_bot(bot_id).await?;
        let trades = self.store.list_trades(bot_id).await?;
        Ok(BotStats::from_trades(&bot, &trades))
    }

    /// 최근 웹훅 로그 (최신 순).
    pub async fn webhook_logs(&self, bot_id: Uuid, limit: Option<i64>) -> LedgerResult<Vec<WebhookLog>> {
        self.get_bot(bot_id).await?;
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT);
        Ok(self.store.webhook_logs(bot_id, limit).await?)
    }
}
