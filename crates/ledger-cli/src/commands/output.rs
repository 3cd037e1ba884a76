//! 명령 결과 출력 형식.

use anyhow::Result;
use ledger_core::{Bot, BotStats, DecimalExt, WebhookLog};
use ledger_engine::TradeResult;
use serde::Serialize;
use std::fmt::Write;

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Use: table, json", s)),
        }
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_bot(bot: &Bot, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(bot);
    }

    let mut out = String::new();
    writeln!(out, "봇 ID:        {}", bot.id)?;
    writeln!(out, "이름:         {}", bot.name)?;
    writeln!(out, "웹훅 URL:     {}", bot.webhook_url)?;
    writeln!(out, "시작 잔고:    {}", bot.starting_balance)?;
    writeln!(out, "현재 잔고:    {}", bot.current_balance.round_money())?;
    writeln!(
        out,
        "누적 수익률:  {}",
        bot.historical_return_ratio().to_percentage_string()
    )?;
    writeln!(out, "수수료율:     {}", bot.commission_rate)?;
    write!(out, "슬리피지:     {}", bot.slippage_rate)?;
    Ok(out)
}

pub fn render_bots(bots: &[Bot], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(bots);
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<36}  {:<20}  {:>16}  {:>16}",
        "ID", "NAME", "STARTING", "CURRENT"
    )?;
    for bot in bots {
        writeln!(
            out,
            "{:<36}  {:<20}  {:>16}  {:>16}",
            bot.id,
            truncate(&bot.name, 20),
            bot.starting_balance.round_dp(2),
            bot.current_balance.round_dp(2)
        )?;
    }
    write!(out, "총 {}개", bots.len())?;
    Ok(out)
}

pub fn render_stats(stats: &BotStats, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(stats);
    }

    let mut out = String::new();
    writeln!(out, "총 거래:      {}", stats.total_trades)?;
    writeln!(out, "완료 거래:    {}", stats.completed_trades)?;
    writeln!(
        out,
        "승/패:        {}/{}",
        stats.winning_trades, stats.losing_trades
    )?;
    writeln!(out, "승률:         {}%", stats.win_rate_pct.round_dp(2))?;
    writeln!(out, "총 손익:      {}", stats.total_pnl)?;
    write!(out, "수익률:       {}%", stats.return_pct.round_dp(2))?;
    Ok(out)
}

pub fn render_trade_result(result: &TradeResult, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(result);
    }

    let mut out = String::new();
    writeln!(
        out,
        "{} {} {} @ {} -> {}",
        result.outcome,
        result.action,
        result.contracts,
        result.signal_price,
        result.execution_price
    )?;
    for trade in &result.trades {
        writeln!(
            out,
            "  #{:<6} {:<12} {:>12} @ {:<16} 명목 {:<16} 수수료 {:<12} 손익 {}",
            trade.id,
            trade.kind.as_str(),
            trade.contracts,
            trade.execution_price,
            trade.notional_value().round_money(),
            trade.commission.round_money(),
            trade.pnl.round_money()
        )?;
    }
    writeln!(
        out,
        "잔고: {} -> {}",
        result.previous_balance.round_money(),
        result.balance.round_money()
    )?;
    write!(out, "포지션: {}", result.position)?;
    Ok(out)
}

pub fn render_logs(logs: &[WebhookLog], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(logs);
    }

    let mut out = String::new();
    for log in logs {
        let detail = log
            .error_message
            .as_deref()
            .or(log.response_body.as_deref())
            .unwrap_or("");
        writeln!(
            out,
            "{}  {:<7}  {}",
            log.created_at.format("%Y-%m-%d %H:%M:%S"),
            log.status.as_str(),
            truncate(detail, 80)
        )?;
    }
    write!(out, "총 {}개", logs.len())?;
    Ok(out)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::NewBot;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("table").unwrap(), OutputFormat::Table);
        assert!(OutputFormat::parse("csv").is_err());
    }

    #[test]
    fn test_render_bots_table_and_json() {
        let bot = Bot::new(NewBot::new("alpha", dec!(1000)), "http://localhost:5000").unwrap();

        let table = render_bots(std::slice::from_ref(&bot), OutputFormat::Table).unwrap();
        assert!(table.contains(&bot.id.to_string()));
        assert!(table.ends_with("총 1개"));

        let json = render_bots(&[bot.clone()], OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "alpha");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
