use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use http::{Request, Response, StatusCode};
use msglog_middleware::middleware::{handler_fn, ClientAddr, RequestLogger};
use msglog_middleware::Config;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "msglog-middleware")]
#[command(about = "Publishes HTTP request logs to Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, help = "Publish one synthetic request log and exit")]
    probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };

    info!(
        bootstrap_url = %config.kafka.bootstrap_url,
        tls = config.kafka.tls.is_some(),
        partition_key = ?config.kafka.partition_key,
        publish_timeout_ms = config.kafka.publish_timeout_ms,
        "Configuration summary"
    );

    let next = handler_fn(|_request: Request<Bytes>| async {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    });

    let logger = RequestLogger::new(next, &config, "msglog-middleware")
        .await
        .context("failed to build request logger")?;

    if args.probe {
        let mut request = Request::builder()
            .method("GET")
            .uri("/msglog/probe")
            .header("host", "localhost")
            .header("x-source", "probe")
            .body(Bytes::new())
            .context("failed to build probe request")?;
        request
            .extensions_mut()
            .insert(ClientAddr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))));

        let response = logger.serve(request).await;
        let metrics = logger.metrics().snapshot();
        info!(
            status = %response.status(),
            published = metrics.published,
            publish_failures = metrics.publish_failures,
            "Probe finished"
        );

        if metrics.published == 0 {
            anyhow::bail!("probe record was not acknowledged");
        }
    } else {
        info!("Kafka connection verified");
    }

    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("msglog_middleware=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("msglog_middleware=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
