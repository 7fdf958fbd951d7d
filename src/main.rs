use anyhow::{anyhow, Result};
use dns_challenge_crab::{
    Config, DynTxtStore, InMemoryTxtStore, SharedClock, SharedConfig, SystemClock,
};
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args
            .next()
            .unwrap_or("dns-challenge-crab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let clock: SharedClock = Arc::new(SystemClock);
    let txt_store: DynTxtStore = Arc::new(InMemoryTxtStore::new(clock.clone()));

    let dns_server = dns_challenge_crab::new_dns(config.clone(), txt_store, clock).await?;
    tracing::info!("DNS listening on UDP {}", dns_server.udp_local_addr()?);
    tracing::info!("DNS listening on TCP {}", dns_server.tcp_local_addr()?);
    tracing::info!("authoritative for \"{}\"", config.domain);
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    let health_handle = config.health_bind_addr.map(|bind_addr| {
        tracing::info!("health endpoint listening on {bind_addr}");
        tokio::spawn(dns_challenge_crab::new_http(bind_addr, config.health_timeout))
    });
    let health_done = async move {
        match health_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    let mut terminate = unix_signal(SignalKind::terminate())?;

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from SIGINT");
        },
        _ = terminate.recv() => {
            tracing::info!("quitting from SIGTERM");
        },
        Ok(dns_res) = dns_handle => {
            dns_res?;
        }
        Ok(health_res) = health_done => {
            if let Err(err) = health_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dns_challenge_crab=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
