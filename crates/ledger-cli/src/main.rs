//! 가상 선물 시그널 원장 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 스키마 마이그레이션
//! ledger migrate
//!
//! # 봇 생성 (시작 잔고 1000, 기본 수수료/슬리피지)
//! ledger create-bot -n "BTC 추세" -b 1000
//!
//! # 수동 시그널
//! ledger signal --bot <BOT_ID> -s BTCUSDT -a buy -p 64250.5 -c 0.01
//!
//! # TradingView 웹훅 본문 재생
//! ledger webhook --bot <BOT_ID> -f alert.json
//!
//! # 포지션 조회
//! ledger position --bot <BOT_ID> -s BTCUSDT
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{init_logging, AppConfig, BotUpdate, LogConfig};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::error;
use uuid::Uuid;

use ledger_cli::commands::app::migrate;
use ledger_cli::commands::bots::{self, CreateBotArgs};
use ledger_cli::commands::trading::{self, SignalArgs};
use ledger_cli::{LedgerApp, OutputFormat};

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Virtual futures signal ledger - 가상 선물 시그널 원장", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    /// 데이터베이스 URL (설정 파일보다 우선)
    #[arg(long, global = true)]
    db_url: Option<String>,

    /// 출력 형식 (table, json)
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 데이터베이스 마이그레이션 실행
    Migrate,

    /// 봇 생성
    CreateBot {
        /// 봇 이름
        #[arg(short, long)]
        name: String,

        /// 시작 잔고
        #[arg(short = 'b', long)]
        starting_balance: Decimal,

        /// 수수료율 (기본: 설정값)
        #[arg(long)]
        commission_rate: Option<Decimal>,

        /// 슬리피지 비율 (기본: 설정값)
        #[arg(long)]
        slippage_rate: Option<Decimal>,
    },

    /// 봇 목록 보기
    ListBots,

    /// 봇 정보와 성과 통계
    ShowBot {
        #[arg(long = "bot")]
        bot_id: Uuid,
    },

    /// 봇 설정 변경 (잔고 제외)
    UpdateBot {
        #[arg(long = "bot")]
        bot_id: Uuid,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        commission_rate: Option<Decimal>,

        #[arg(long)]
        slippage_rate: Option<Decimal>,
    },

    /// 봇과 모든 거래/로그 삭제
    DeleteBot {
        #[arg(long = "bot")]
        bot_id: Uuid,
    },

    /// 시그널 한 건 처리
    Signal {
        #[arg(long = "bot")]
        bot_id: Uuid,

        /// 심볼 (예: BTCUSDT)
        #[arg(short, long)]
        symbol: String,

        /// 방향 (buy, sell)
        #[arg(short, long)]
        action: String,

        /// 알림 가격
        #[arg(short, long)]
        price: Decimal,

        /// 계약 수량
        #[arg(short, long)]
        contracts: Decimal,

        /// 알림이 보고한 포지션 크기
        #[arg(long)]
        position_size: Option<Decimal>,

        /// 시그널 시각 (RFC3339, 기본: 현재)
        #[arg(short, long)]
        time: Option<String>,
    },

    /// TradingView 웹훅 JSON 파일 처리
    Webhook {
        #[arg(long = "bot")]
        bot_id: Uuid,

        /// JSON 파일 경로
        #[arg(short, long)]
        file: PathBuf,
    },

    /// 순포지션 조회
    Position {
        #[arg(long = "bot")]
        bot_id: Uuid,

        #[arg(short, long)]
        symbol: String,
    },

    /// 시작 잔고 변경 (누적 수익률 유지)
    Rebase {
        #[arg(long = "bot")]
        bot_id: Uuid,

        /// 새 시작 잔고
        #[arg(short = 'b', long)]
        starting_balance: Decimal,
    },

    /// 최근 웹훅 로그
    Logs {
        #[arg(long = "bot")]
        bot_id: Uuid,

        /// 최대 개수
        #[arg(short, long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(url) = cli.db_url.clone() {
        config.database.url = url;
    }

    // LOG_FORMAT이 지정되면 환경 변수 설정이 우선
    let log_config = if std::env::var("LOG_FORMAT").is_ok() {
        LogConfig::from_env()
    } else {
        LogConfig::from(&config.logging)
    };
    init_logging(log_config)?;

    if let Err(e) = run(cli, &config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let format = OutputFormat::parse(&cli.format)?;

    if let Commands::Migrate = cli.command {
        migrate(config).await?;
        println!("마이그레이션 완료");
        return Ok(());
    }

    let app = LedgerApp::connect(config).await?;

    match cli.command {
        Commands::Migrate => {}

        Commands::CreateBot {
            name,
            starting_balance,
            commission_rate,
            slippage_rate,
        } => {
            let args = CreateBotArgs {
                name,
                starting_balance,
                commission_rate,
                slippage_rate,
            };
            bots::create_bot(&app, args, format).await?;
        }

        Commands::ListBots => {
            bots::list_bots(&app, format).await?;
        }

        Commands::ShowBot { bot_id } => {
            bots::show_bot(&app, bot_id, format).await?;
        }

        Commands::UpdateBot {
            bot_id,
            name,
            commission_rate,
            slippage_rate,
        } => {
            let update = BotUpdate {
                name,
                commission_rate,
                slippage_rate,
            };
            bots::update_bot(&app, bot_id, update, format).await?;
        }

        Commands::DeleteBot { bot_id } => {
            bots::delete_bot(&app, bot_id).await?;
        }

        Commands::Signal {
            bot_id,
            symbol,
            action,
            price,
            contracts,
            position_size,
            time,
        } => {
            let args = SignalArgs {
                bot_id,
                symbol,
                action,
                price,
                contracts,
                position_size,
                time,
            };
            trading::send_signal(&app, args, format).await?;
        }

        Commands::Webhook { bot_id, file } => {
            trading::send_webhook(&app, bot_id, &file, format).await?;
        }

        Commands::Position { bot_id, symbol } => {
            trading::show_position(&app, bot_id, &symbol).await?;
        }

        Commands::Rebase {
            bot_id,
            starting_balance,
        } => {
            trading::rebase(&app, bot_id, starting_balance, format).await?;
        }

        Commands::Logs { bot_id, limit } => {
            bots::show_logs(&app, bot_id, limit, format).await?;
        }
    }

    Ok(())
}
