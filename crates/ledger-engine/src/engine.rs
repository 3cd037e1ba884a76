//! 시그널 실행 엔진.
//!
//! 시그널 하나를 받아 포지션 상태에 따라 진입/청산/반전을 결정하고,
//! 체결 기록과 잔고 변경, 성공 로그를 하나의 트랜잭션으로 커밋합니다.
//!
//! | 현재 포지션 | 시그널 | 처리 |
//! |---|---|---|
//! | 없음 | 매수/매도 | 롱/숏 진입 (수수료만 차감) |
//! | 롱 | 매도 | FIFO 청산, 초과 수량은 숏 반전 |
//! | 숏 | 매수 | FIFO 청산, 초과 수량은 롱 반전 |
//! | 롱 | 매수, 숏 | 매도 | `UnsupportedOperation` |
//!
//! 실패한 시그널은 롤백 후 `AuditSink`로 별도 기록합니다.

use ledger_core::{
    Action, Bot, Direction, NewTrade, NewWebhookLog, Price, Quantity, Rate, Signal, Trade,
    TradeKind, WebhookPayload,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{overflow, LedgerError, LedgerResult};
use crate::matcher::plan_close;
use crate::pricer::execution_price;
use crate::resolver::{net_position, resolve};
use crate::store::{AuditSink, LedgerStore, LedgerTx};

/// 시그널 처리 결과 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Opened,
    Closed,
    ClosedAndReversed,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeOutcome::Opened => "opened",
            TradeOutcome::Closed => "closed",
            TradeOutcome::ClosedAndReversed => "closed_and_reversed",
        }
    }
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 커밋된 시그널 처리 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub bot_id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub outcome: TradeOutcome,
    pub signal_price: Price,
    pub execution_price: Price,
    /// 시그널 수량
    pub contracts: Quantity,
    /// 이번 시그널로 기록된 거래 (청산, 반전 진입 순)
    pub trades: Vec<Trade>,
    /// 실현 손익 (진입만 한 경우 0)
    pub realized_pnl: Decimal,
    /// 이번 시그널에 부과된 총 수수료
    pub commission: Decimal,
    pub previous_balance: Decimal,
    pub balance: Decimal,
    /// 처리 후 순포지션
    pub position: Decimal,
}

impl TradeResult {
    /// 웹훅 응답/성공 로그 본문.
    pub fn to_response_json(&self) -> Value {
        let mut body = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut body {
            map.insert("success".to_string(), Value::Bool(true));
        }
        body
    }
}

/// 가상 선물 원장 엔진.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// 시그널 하나를 원자적으로 처리합니다.
    ///
    /// 존재하는 봇에 대한 호출은 성공이든 실패든 웹훅 로그를 정확히 하나 남깁니다.
    #[instrument(
        skip(self, signal),
        fields(bot_id = %signal.bot_id, symbol = %signal.symbol, action = %signal.action)
    )]
    pub async fn process_signal(&self, signal: &Signal) -> LedgerResult<TradeResult> {
        let request = signal.to_request_json();
        self.run(signal, &request).await
    }

    /// TradingView 웹훅 본문을 파싱해 처리합니다.
    ///
    /// 파싱 실패도 `InvalidInput`으로 감사 로그에 남습니다.
    #[instrument(skip(self, payload), fields(bot_id = %bot_id))]
    pub async fn process_webhook(&self, bot_id: Uuid, payload: &Value) -> LedgerResult<TradeResult> {
        let parsed = WebhookPayload::from_value(payload).and_then(|p| p.into_signal(bot_id));
        match parsed {
            Ok(signal) => self.run(&signal, payload).await,
            Err(e) => {
                let err = LedgerError::from(e);
                self.audit_failure(bot_id, payload, &err).await;
                Err(err)
            }
        }
    }

    /// (봇, 심볼)의 현재 순포지션.
    pub async fn get_position(&self, bot_id: Uuid, symbol: &str) -> LedgerResult<Decimal> {
        if self.store.get_bot(bot_id).await?.is_none() {
            return Err(LedgerError::BotNotFound(bot_id));
        }
        let lots = self.store.open_lots(bot_id, symbol).await?;
        Ok(net_position(&lots))
    }

    /// 시작 잔고를 바꾸고 누적 수익률을 유지하도록 현재 잔고를 재계산합니다.
    #[instrument(skip(self), fields(bot_id = %bot_id))]
    pub async fn rebase_starting_balance(
        &self,
        bot_id: Uuid,
        new_starting_balance: Decimal,
    ) -> LedgerResult<Bot> {
        if new_starting_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "starting balance must not be negative: {}",
                new_starting_balance
            )));
        }

        let mut tx = self.store.begin(bot_id).await?;
        let current = tx
            .bot()
            .rebased_current_balance(new_starting_balance)
            .ok_or_else(|| overflow("rebased balance"))?;
        tx.rebase_balances(new_starting_balance, current).await?;
        let bot = tx.bot().clone();
        tx.commit().await?;

        info!(
            starting_balance = %bot.starting_balance,
            current_balance = %bot.current_balance,
            "Starting balance rebased"
        );
        Ok(bot)
    }

    async fn run(&self, signal: &Signal, request: &Value) -> LedgerResult<TradeResult> {
        match self.execute(signal, request).await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.audit_failure(signal.bot_id, request, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(&self, signal: &Signal, request: &Value) -> LedgerResult<TradeResult> {
        signal.validate()?;

        let mut tx = self.store.begin(signal.bot_id).await?;
        let bot = tx.bot().clone();

        let exec_price = execution_price(signal.signal_price, signal.action, bot.slippage_rate)?;
        let lots = tx.open_lots(&signal.symbol).await?;
        let position = resolve(&lots);

        debug!(
            position = %position,
            lots = lots.len(),
            execution_price = %exec_price,
            "Resolved position"
        );

        let previous_balance = bot.current_balance;
        let mut balance = previous_balance;
        let mut trades = Vec::new();
        let mut realized_pnl = Decimal::ZERO;
        let mut commission = Decimal::ZERO;

        let outcome = match position.direction() {
            None => {
                let lot = open_lot(
                    &mut tx,
                    signal,
                    signal.action.opening_direction(),
                    signal.quantity,
                    exec_price,
                    bot.commission_rate,
                    balance,
                )
                .await?;
                commission = commission
                    .checked_add(lot.commission)
                    .ok_or_else(|| overflow("commission"))?;
                balance = lot.balance_after;
                trades.push(lot);
                TradeOutcome::Opened
            }
            Some(direction) if signal.action == direction.closing_action() => {
                let plan = plan_close(
                    &signal.symbol,
                    &lots,
                    position,
                    signal.quantity,
                    exec_price,
                    bot.commission_rate,
                )?;

                for consumption in &plan.consumptions {
                    if consumption.is_exhausted() {
                        tx.delete_trade(consumption.lot_id).await?;
                    } else {
                        tx.shrink_lot(
                            consumption.lot_id,
                            consumption.remaining,
                            consumption.remaining_commission,
                        )
                        .await?;
                    }
                }

                balance = balance
                    .checked_add(plan.realized_pnl)
                    .ok_or_else(|| overflow("balance"))?;
                let close = tx
                    .insert_trade(NewTrade {
                        bot_id: signal.bot_id,
                        symbol: signal.symbol.clone(),
                        action: signal.action,
                        signal_price: signal.signal_price,
                        execution_price: exec_price,
                        contracts: plan.contracts_closing,
                        position_size: signal.position_size,
                        commission: plan.closing_commission,
                        pnl: plan.realized_pnl,
                        balance_after: balance,
                        kind: TradeKind::close(plan.direction),
                        timestamp: signal.timestamp,
                    })
                    .await?;
                realized_pnl = plan.realized_pnl;
                commission = commission
                    .checked_add(plan.closing_commission)
                    .ok_or_else(|| overflow("commission"))?;
                trades.push(close);

                if plan.reverses() {
                    let lot = open_lot(
                        &mut tx,
                        signal,
                        signal.action.opening_direction(),
                        plan.contracts_reversing,
                        exec_price,
                        bot.commission_rate,
                        balance,
                    )
                    .await?;
                    commission = commission
                        .checked_add(lot.commission)
                        .ok_or_else(|| overflow("commission"))?;
                    balance = lot.balance_after;
                    trades.push(lot);
                    TradeOutcome::ClosedAndReversed
                } else {
                    TradeOutcome::Closed
                }
            }
            Some(_) => {
                return Err(LedgerError::UnsupportedOperation {
                    symbol: signal.symbol.clone(),
                    action: signal.action,
                    position: position.net(),
                });
            }
        };

        let position_after = net_position(&tx.open_lots(&signal.symbol).await?);
        tx.update_balance(balance).await?;

        let result = TradeResult {
            bot_id: signal.bot_id,
            symbol: signal.symbol.clone(),
            action: signal.action,
            outcome,
            signal_price: signal.signal_price,
            execution_price: exec_price,
            contracts: signal.quantity,
            trades,
            realized_pnl,
            commission,
            previous_balance,
            balance,
            position: position_after,
        };

        tx.append_log(NewWebhookLog::success(
            signal.bot_id,
            request,
            &result.to_response_json(),
        ))
        .await?;
        tx.commit().await?;

        info!(
            outcome = %outcome,
            signal_price = %signal.signal_price,
            execution_price = %exec_price,
            contracts = %signal.quantity,
            pnl = %realized_pnl,
            commission = %commission,
            balance_before = %previous_balance,
            balance_after = %balance,
            position = %position_after,
            "FUTURES trade executed"
        );

        Ok(result)
    }

    /// 실패한 시도를 주 트랜잭션 밖에서 기록합니다. 기록 실패는 결과를 바꾸지 않습니다.
    async fn audit_failure(&self, bot_id: Uuid, request: &Value, err: &LedgerError) {
        // 로그 행은 소유 봇이 있어야 함
        if let LedgerError::BotNotFound(_) = err {
            warn!(bot_id = %bot_id, "Signal for unknown bot ignored");
            return;
        }

        if err.is_rejection() {
            warn!(bot_id = %bot_id, kind = err.kind(), error = %err, "Signal rejected");
        } else {
            error!(bot_id = %bot_id, error = %err, "Signal processing failed");
        }

        let log = NewWebhookLog::failure(bot_id, request, err.to_string());
        if let Err(e) = self.audit.record(log).await {
            warn!(bot_id = %bot_id, error = %e, "Failed to write webhook audit log");
        }
    }
}

/// 새 로트를 엽니다. 1배 명목 한도를 넘으면 `InsufficientBalance`.
async fn open_lot(
    tx: &mut Box<dyn LedgerTx>,
    signal: &Signal,
    direction: Direction,
    contracts: Quantity,
    exec_price: Price,
    commission_rate: Rate,
    balance: Decimal,
) -> LedgerResult<Trade> {
    let notional = contracts
        .checked_mul(exec_price)
        .ok_or_else(|| overflow("position notional"))?;
    if notional > balance {
        return Err(LedgerError::InsufficientBalance {
            required: notional,
            available: balance,
        });
    }

    let commission = notional
        .checked_mul(commission_rate)
        .ok_or_else(|| overflow("commission"))?;
    let trade = tx
        .insert_trade(NewTrade {
            bot_id: signal.bot_id,
            symbol: signal.symbol.clone(),
            action: signal.action,
            signal_price: signal.signal_price,
            execution_price: exec_price,
            contracts,
            position_size: signal.position_size,
            commission,
            pnl: Decimal::ZERO,
            balance_after: balance
                .checked_sub(commission)
                .ok_or_else(|| overflow("balance"))?,
            kind: TradeKind::open(direction),
            timestamp: signal.timestamp,
        })
        .await?;
    Ok(trade)
}
