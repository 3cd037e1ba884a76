//! 명령 실행에 필요한 서비스 묶음.

use anyhow::{Context, Result};
use ledger_core::{AppConfig, BotDefaultsConfig};
use ledger_engine::{AuditSink, BotService, LedgerEngine, LedgerStore, PgLedgerStore};
use std::sync::Arc;
use tracing::info;

/// 엔진과 봇 서비스를 같은 저장소 위에 묶은 애플리케이션 상태.
#[derive(Clone)]
pub struct LedgerApp {
    pub engine: LedgerEngine,
    pub bots: BotService,
}

impl LedgerApp {
    /// 저장소 하나를 원장, 감사 로그, 봇 관리에 함께 사용합니다.
    pub fn with_store<S>(store: Arc<S>, defaults: BotDefaultsConfig) -> Self
    where
        S: LedgerStore + AuditSink + 'static,
    {
        Self {
            engine: LedgerEngine::new(store.clone(), store.clone()),
            bots: BotService::new(store, defaults),
        }
    }

    /// 설정의 데이터베이스에 연결합니다.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let store = PgLedgerStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::with_store(Arc::new(store), config.defaults.clone()))
    }
}

/// 스키마 마이그레이션을 실행합니다.
pub async fn migrate(config: &AppConfig) -> Result<()> {
    let store = PgLedgerStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Migration failed")?;
    info!("Database schema is up to date");
    Ok(())
}
