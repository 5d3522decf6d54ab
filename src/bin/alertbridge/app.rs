use std::path::PathBuf;
use std::sync::Arc;

use alertbridge::Result;
use alertbridge::config::Config;
use alertbridge::error::{ConfigError, Error as BridgeError};
use alertbridge::feishu::FeishuClient;
use alertbridge::grafana::DashboardClient;
use alertbridge::http::HttpClient;
use alertbridge::pipeline::{AlertProcessor, ConsumerSettings, spawn_consumer};
use alertbridge::prometheus::RulesClient;
use alertbridge::server;
use alertbridge::telemetry::init_tracing;
use async_channel::unbounded;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::cli::Cli;

const DEFAULT_CONFIG: &str = "alertbridge.toml";

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = Config::from_env_and_file(&config_path)?;
    if let Some(verify) = cli.verify_tls_override() {
        config.http.verify_tls = verify;
    }
    info!(path = %config_path.display(), "configuration loaded");

    let http = HttpClient::new(&config.http)?;

    if cli.list_rules {
        return list_rules(http, &config).await;
    }

    let notifier = Arc::new(FeishuClient::new(http.clone(), &config.feishu));
    let renderer = Arc::new(DashboardClient::new(http, &config.grafana)?);
    let processor = Arc::new(AlertProcessor::new(
        notifier,
        renderer,
        config.pipeline.settle_delay,
    ));

    let listener = TcpListener::bind(config.server.bind_target())
        .await
        .map_err(BridgeError::Server)?;

    let (tx, rx) = unbounded();
    let consumer = spawn_consumer(rx, processor, ConsumerSettings::from(&config.pipeline));

    let served = server::serve(listener, server::router(tx), server::shutdown_signal()).await;

    let pending = consumer.shutdown().await;
    if pending > 0 {
        warn!(pending, "exiting with undelivered alert batches");
    }
    info!("alertbridge stopped");
    served
}

async fn list_rules(http: HttpClient, config: &Config) -> Result<()> {
    let prometheus = config
        .prometheus
        .as_ref()
        .ok_or(ConfigError::MissingField {
            field: "prometheus.url",
        })?;
    let client = RulesClient::new(http, prometheus.url.clone());
    match client.first_rule().await? {
        Some(rule) => {
            println!("name:     {}", rule.name);
            println!("query:    {}", rule.query);
            println!("duration: {}", rule.duration);
        }
        None => println!("no alerting rules loaded"),
    }
    Ok(())
}
