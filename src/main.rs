use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod runtime;
mod scenario;
mod services;
mod utils;

use config::{Config, LoggingConfig};
use scenario::Scenario;

#[derive(Parser, Debug)]
#[command(name = "tabdrag")]
#[command(about = "Перетаскивание вкладок между окнами (присоединение, перестановка, отсоединение) на симулированном рабочем столе")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "tabdrag.toml")]
    config: String,

    /// Уровень или фильтр логирования, перекрывает файл конфигурации
    #[arg(long)]
    log_level: Option<String>,

    /// Сценарий жеста; без него запускаются все по очереди
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(Config::load(&args.config)?);
    init_tracing(args.log_level.as_deref(), &config.logging)?;

    info!("Запуск tabdrag v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);
    info!(
        "Перемещение окон: {}",
        if config.motion.animated() { "анимированное" } else { "мгновенное" }
    );

    let scenarios = match args.scenario {
        Some(scenario) => vec![scenario],
        None => vec![
            Scenario::Attach,
            Scenario::Detach,
            Scenario::DetachBuffer,
            Scenario::Reorder,
            Scenario::Cancel,
        ],
    };

    let run_all = async {
        for scenario in scenarios {
            scenario::run(scenario, config.clone()).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    tokio::select! {
        result = run_all => {
            if let Err(e) = &result {
                error!("Сценарий завершился ошибкой: {:#}", e);
            }
            result?;
        }
        signal = signal::ctrl_c() => match signal {
            Ok(()) => warn!("Получен сигнал завершения (Ctrl+C), сценарий прерван"),
            Err(err) => error!("Ошибка ожидания сигнала завершения: {}", err),
        },
    }

    info!("tabdrag завершил работу");
    Ok(())
}

fn init_tracing(level_override: Option<&str>, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directive = match level_override {
        Some(level) => level,
        None if !logging.filter.is_empty() => logging.filter.as_str(),
        None => logging.level.as_str(),
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive))?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "full" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}
