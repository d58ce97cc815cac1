use anyhow::Context;
use clap::Parser;
use flag_simulator::app::report::{render_json, render_table};
use flag_simulator::config::launch::LaunchParams;
use flag_simulator::config::{extra_domain, CliConfig};
use flag_simulator::core::board::BoardSnapshot;
use flag_simulator::domain::ports::FlagClientFactory;
use flag_simulator::utils::error::{ErrorSeverity, SimError};
use flag_simulator::utils::{logger, validation::Validate};
use flag_simulator::{
    HttpClientFactory, InMemoryClientFactory, Session, SimulationEngine, StdRandom,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting flag-simulator");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = if config.is_offline() {
        let params = config.launch_params()?;
        let sdk_key = params.sdk_key.clone().unwrap_or_default();
        let factory = InMemoryClientFactory::with_flags(&sdk_key, config.offline_flags()?);
        tracing::info!("📴 Offline mode with {} flags", config.offline_flags.len());
        run(&config, factory).await
    } else {
        run(&config, HttpClientFactory::new()).await
    };

    if let Err(err) = result {
        let e = err.downcast::<SimError>()?;

        tracing::error!(
            "❌ Simulation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run<F: FlagClientFactory>(config: &CliConfig, factory: F) -> anyhow::Result<()> {
    let params = config.launch_params()?;
    let startup = config.startup_data()?;
    let settings = config.session_settings(&params);

    let session = match config.seed {
        Some(seed) => {
            tracing::info!("🎲 Using seed {}", seed);
            Session::with_random(factory, settings, startup, Arc::new(StdRandom::seeded(seed)))
        }
        None => Session::new(factory, settings, startup),
    };

    let sdk_key = params.sdk_key.clone().unwrap_or_default();
    let extra = extra_domain(&params, &config.extra_domain);
    let mut engine = SimulationEngine::new(session, sdk_key, extra);

    if config.watch {
        let mut emit_error = None;
        engine
            .watch(|session, snapshot| {
                if let Err(e) = emit(config, &params, session.flag_key(), snapshot) {
                    emit_error.get_or_insert(e);
                }
            })
            .await?;
        if let Some(e) = emit_error {
            return Err(e);
        }
    } else {
        let snapshot = engine.run_once().await?;
        let flag_key = engine.session().flag_key().to_string();
        engine.shutdown().await;
        emit(config, &params, &flag_key, &snapshot)?;
    }

    Ok(())
}

fn emit(
    config: &CliConfig,
    params: &LaunchParams,
    flag_key: &str,
    snapshot: &BoardSnapshot,
) -> anyhow::Result<()> {
    if config.json {
        let json = render_json(params, flag_key, snapshot).context("failed to render JSON report")?;
        println!("{}", json);
    } else {
        print!("{}", render_table(params, flag_key, snapshot));
    }
    Ok(())
}
