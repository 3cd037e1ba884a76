//! 봇 관리 명령.

use anyhow::Result;
use ledger_core::{Bot, BotStats, BotUpdate, NewBot, WebhookLog};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::output::{render_bot, render_bots, render_logs, render_stats, OutputFormat};
use super::LedgerApp;

/// 봇 생성 인자.
#[derive(Debug, Clone)]
pub struct CreateBotArgs {
    pub name: String,
    pub starting_balance: Decimal,
    pub commission_rate: Option<Decimal>,
    pub slippage_rate: Option<Decimal>,
}

impl From<CreateBotArgs> for NewBot {
    fn from(args: CreateBotArgs) -> Self {
        NewBot {
            name: args.name,
            starting_balance: args.starting_balance,
            commission_rate: args.commission_rate,
            slippage_rate: args.slippage_rate,
        }
    }
}

pub async fn create_bot(app: &LedgerApp, args: CreateBotArgs, format: OutputFormat) -> Result<Bot> {
    let bot = app.bots.create_bot(args.into()).await?;
    println!("{}", render_bot(&bot, format)?);
    Ok(bot)
}

pub async fn list_bots(app: &LedgerApp, format: OutputFormat) -> Result<Vec<Bot>> {
    let bots = app.bots.list_bots().await?;
    println!("{}", render_bots(&bots, format)?);
    Ok(bots)
}

/// 봇 정보와 성과 통계를 출력합니다.
pub async fn show_bot(app: &LedgerApp, bot_id: Uuid, format: OutputFormat) -> Result<BotStats> {
    let bot = app.bots.get_bot(bot_id).await?;
    let stats = app.bots.bot_stats(bot_id).await?;

    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "bot": bot, "stats": stats });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Table => {
            println!("{}", render_bot(&bot, format)?);
            println!();
            println!("{}", render_stats(&stats, format)?);
        }
    }
    Ok(stats)
}

pub async fn update_bot(
    app: &LedgerApp,
    bot_id: Uuid,
    update: BotUpdate,
    format: OutputFormat,
) -> Result<Bot> {
    let bot = app.bots.update_bot(bot_id, update).await?;
    println!("{}", render_bot(&bot, format)?);
    Ok(bot)
}

pub async fn delete_bot(app: &LedgerApp, bot_id: Uuid) -> Result<()> {
    app.bots.delete_bot(bot_id).await?;
    println!("봇 삭제 완료: {}", bot_id);
    Ok(())
}

pub async fn show_logs(
    app: &LedgerApp,
    bot_id: Uuid,
    limit: Option<i64>,
    format: OutputFormat,
) -> Result<Vec<WebhookLog>> {
    let logs = app.bots.webhook_logs(bot_id, limit).await?;
    println!("{}", render_logs(&logs, format)?);
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::BotDefaultsConfig;
    use ledger_engine::{LedgerError, MemoryStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn app() -> LedgerApp {
        LedgerApp::with_store(Arc::new(MemoryStore::new()), BotDefaultsConfig::default())
    }

    #[tokio::test]
    async fn test_bot_lifecycle() {
        let app = app();

        let bot = create_bot(
            &app,
            CreateBotArgs {
                name: "cli".to_string(),
                starting_balance: dec!(500),
                commission_rate: None,
                slippage_rate: Some(Decimal::ZERO),
            },
            OutputFormat::Table,
        )
        .await
        .unwrap();
        assert_eq!(bot.slippage_rate, Decimal::ZERO);
        assert_eq!(bot.commission_rate, dec!(0.0005));

        assert_eq!(list_bots(&app, OutputFormat::Json).await.unwrap().len(), 1);

        let stats = show_bot(&app, bot.id, OutputFormat::Table).await.unwrap();
        assert_eq!(stats.total_trades, 0);

        delete_bot(&app, bot.id).await.unwrap();
        let err = delete_bot(&app, bot.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::BotNotFound(_))
        ));
    }
}
