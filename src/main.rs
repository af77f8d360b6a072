use clap::Parser;
use kiln_host::{Config, Kiln};

#[derive(Parser, Debug)]
#[command(name = "kiln-host", about = "Closed-loop kiln temperature controller")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "kiln.toml")]
    config: String,

    /// Force simulate mode regardless of the configuration file.
    #[arg(long)]
    simulate: bool,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    tracing::info!("Starting kiln-host {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        e
    })?;
    if cli.simulate {
        config.simulate = true;
    }
    config.validate()?;

    tracing::info!(
        "Safety limits: max {:.0}C, max rate {:.0}C/min; relay window {:.1}s; tick {}ms",
        config.safety.max_temp_c,
        config.safety.max_rate_c_per_min,
        config.heater.cycle_time_s,
        config.control.tick_period_ms
    );

    let kiln = Kiln::new(config.clone());
    let _control_task = kiln.start().await;

    let app = kiln.router();
    let listener =
        tokio::net::TcpListener::bind((config.web.bind_address.as_str(), config.web.port)).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            kiln.shutdown();
        }
    }

    Ok(())
}
