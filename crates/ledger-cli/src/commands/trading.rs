//! 시그널 처리, 포지션 조회, 리베이스 명령.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ledger_core::{Action, Bot, Signal};
use ledger_engine::TradeResult;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::output::{render_bot, render_trade_result, OutputFormat};
use super::LedgerApp;

/// 수동 시그널 인자.
#[derive(Debug, Clone)]
pub struct SignalArgs {
    pub bot_id: Uuid,
    pub symbol: String,
    pub action: String,
    pub price: Decimal,
    pub contracts: Decimal,
    pub position_size: Option<Decimal>,
    /// RFC3339 시각 (없으면 현재 시각)
    pub time: Option<String>,
}

impl SignalArgs {
    pub fn into_signal(self) -> Result<Signal> {
        let action = Action::from_str(&self.action)?;
        let mut signal = Signal::new(self.bot_id, self.symbol, action, self.price, self.contracts);

        if let Some(size) = self.position_size {
            signal = signal.with_position_size(size);
        }
        if let Some(time) = self.time {
            let timestamp = DateTime::parse_from_rfc3339(&time)
                .with_context(|| format!("Invalid time: {}", time))?
                .with_timezone(&Utc);
            signal = signal.with_timestamp(timestamp);
        }
        Ok(signal)
    }
}

pub async fn send_signal(app: &LedgerApp, args: SignalArgs, format: OutputFormat) -> Result<TradeResult> {
    let signal = args.into_signal()?;
    let span = ledger_core::ledger_span!("manual_signal", signal.bot_id, signal.symbol);
    let result = app.engine.process_signal(&signal).instrument(span).await?;
    println!("{}", render_trade_result(&result, format)?);
    Ok(result)
}

/// 웹훅 JSON 파일을 읽어 처리합니다.
pub async fn send_webhook(
    app: &LedgerApp,
    bot_id: Uuid,
    path: &Path,
    format: OutputFormat,
) -> Result<TradeResult> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))?;

    info!(bot_id = %bot_id, path = %path.display(), "Replaying webhook payload");

    let result = app
        .engine
        .process_webhook(bot_id, &payload)
        .instrument(ledger_core::ledger_span!("webhook_replay", bot_id))
        .await?;
    println!("{}", render_trade_result(&result, format)?);
    Ok(result)
}

pub async fn show_position(app: &LedgerApp, bot_id: Uuid, symbol: &str) -> Result<Decimal> {
    let net = app.engine.get_position(bot_id, symbol).await?;
    println!("{} {}: {}", bot_id, symbol, net);
    Ok(net)
}

pub async fn rebase(
    app: &LedgerApp,
    bot_id: Uuid,
    starting_balance: Decimal,
    format: OutputFormat,
) -> Result<Bot> {
    let bot = app
        .engine
        .rebase_starting_balance(bot_id, starting_balance)
        .await?;
    println!("{}", render_bot(&bot, format)?);
    Ok(bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{BotDefaultsConfig, NewBot};
    use ledger_engine::{LedgerError, MemoryStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn app_with_bot() -> (LedgerApp, Bot) {
        let app = LedgerApp::with_store(Arc::new(MemoryStore::new()), BotDefaultsConfig::default());
        let bot = app
            .bots
            .create_bot(
                NewBot::new("trading", dec!(1000))
                    .with_commission_rate(Decimal::ZERO)
                    .with_slippage_rate(Decimal::ZERO),
            )
            .await
            .unwrap();
        (app, bot)
    }

    fn args(bot: &Bot, action: &str, price: Decimal, contracts: Decimal) -> SignalArgs {
        SignalArgs {
            bot_id: bot.id,
            symbol: "BTCUSDT".to_string(),
            action: action.to_string(),
            price,
            contracts,
            position_size: None,
            time: None,
        }
    }

    #[test]
    fn test_signal_args_parsing() {
        let bot_id = Uuid::new_v4();
        let signal = SignalArgs {
            bot_id,
            symbol: "ETHUSDT".to_string(),
            action: "SELL".to_string(),
            price: dec!(3000),
            contracts: dec!(0.5),
            position_size: Some(dec!(-0.5)),
            time: Some("2024-05-01T12:00:00Z".to_string()),
        }
        .into_signal()
        .unwrap();

        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.position_size, dec!(-0.5));
        assert_eq!(signal.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");

        let mut bad = args(&Bot::new(NewBot::new("x", dec!(1)), "http://h").unwrap(), "hold", dec!(1), dec!(1));
        assert!(bad.clone().into_signal().is_err());
        bad.action = "buy".to_string();
        bad.time = Some("yesterday".to_string());
        assert!(bad.into_signal().is_err());
    }

    #[tokio::test]
    async fn test_signal_position_and_rebase() {
        let (app, bot) = app_with_bot().await;

        send_signal(&app, args(&bot, "buy", dec!(100), dec!(2)), OutputFormat::Table)
            .await
            .unwrap();
        assert_eq!(show_position(&app, bot.id, "BTCUSDT").await.unwrap(), dec!(2));

        let result = send_signal(&app, args(&bot, "sell", dec!(150), dec!(2)), OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(result.realized_pnl, dec!(100));

        let rebased = rebase(&app, bot.id, dec!(2000), OutputFormat::Table).await.unwrap();
        assert_eq!(rebased.current_balance, dec!(2200));
    }

    #[tokio::test]
    async fn test_webhook_file() {
        let (app, bot) = app_with_bot().await;
        let path = std::env::temp_dir().join(format!("ledger-webhook-{}.json", bot.id));
        tokio::fs::write(
            &path,
            r#"{"symbol":"BTCUSDT","price":"100","data":{"action":"sell","contracts":"3"}}"#,
        )
        .await
        .unwrap();

        let result = send_webhook(&app, bot.id, &path, OutputFormat::Table).await.unwrap();
        assert_eq!(result.position, dec!(-3));

        tokio::fs::write(&path, r#"{"symbol":"BTCUSDT"}"#).await.unwrap();
        let err = send_webhook(&app, bot.id, &path, OutputFormat::Table)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvalidInput(_))
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
