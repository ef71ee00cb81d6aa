//! `tsquery-watch` - runs one query and prints every output it produces.
//!
//! ```text
//! TSQUERY__API__BASE_URL=http://localhost:1324/ tsquery-watch query.yaml
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timeseries_query::adapters::{
    EventRouter, EventRouterConfig, ReqwestApiClient, ReqwestApiConfig, WebSocketTransport,
};
use timeseries_query::application::{AnalysisPipeline, QueryEngine, QueryOptions, QueryServices};
use timeseries_query::config::AppConfig;
use timeseries_query::domain::analysis::QueryOutput;
use timeseries_query::domain::query::{QueryContext, QuerySpec};

#[tokio::main]
async fn main() -> ExitCode {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: tsquery-watch <spec.json|spec.yaml>");
        return ExitCode::from(2);
    };

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    match run(config, &path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tsquery-watch failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: AppConfig, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let spec = QuerySpec::from_path(path)?;
    info!(path, datasets = spec.len(), "Loaded query");

    let mut router_config = EventRouterConfig::default()
        .with_reconnect(config.transport.reconnect)
        .with_backoff(config.transport.reset_timeout(), config.transport.retry_delta());
    if let Some(username) = &config.transport.username {
        router_config = router_config.with_username(username.clone());
    }
    let router = Arc::new(EventRouter::new(router_config));
    let transport = WebSocketTransport::new(config.events_url());

    let mut api_config = ReqwestApiConfig::new(config.api.base_url.clone())
        .with_timeout(config.api.timeout());
    if let Some(token) = config.api.token.clone() {
        api_config = api_config.with_token(token);
    }
    let api = Arc::new(ReqwestApiClient::new(api_config)?);

    let pipeline = Arc::new(AnalysisPipeline::with_defaults(
        config.analysis.table_max_series,
        config.analysis.table_max_points,
    ));

    let services = Arc::new(QueryServices {
        api,
        pipeline,
        events: router.clone(),
        options: QueryOptions {
            dataset_path: config.query.dataset_path.clone(),
            data_events: config.query.data_events.clone(),
            object_events: config.query.object_events.clone(),
        },
    });
    let engine = Arc::new(QueryEngine::new(services, router.connectivity()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router_task = {
        let router = router.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = router.run(&transport, shutdown).await {
                error!(error = %e, "Event router stopped");
            }
        })
    };
    let monitor_task = {
        let engine = engine.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_connectivity_monitor(shutdown).await {
                error!(error = %e, "Connectivity monitor stopped");
            }
        })
    };

    let query = engine.query(
        spec,
        Arc::new(|_qdata: &QueryContext, output: &QueryOutput| match serde_json::to_string(output) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(error = %e, "Cannot serialize output"),
        }),
        Arc::new(|status: &str| info!(status, "Query status")),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    engine.release(&query);
    query.close();
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(router_task, monitor_task);
    Ok(())
}
