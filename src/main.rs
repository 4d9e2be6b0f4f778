use anyhow::Context;
use binlog_distributor::ingest::{spawn_throughput_reporter, Ingestor};
use binlog_distributor::publisher::{KafkaPublisher, LogPublisher, PublisherRegistry};
use binlog_distributor::{Backend, Config, Distributor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "binlog-distributor")]
#[command(about = "Routes binlog change events to subscriber queues", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, help = "Log routed messages instead of publishing them")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Distribute line-delimited JSON change events read from stdin (default)
    Run,
    /// Delete the table-level topic of every configured subscription
    Teardown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting binlog-distributor");
    info!("Loading configuration from {:?}", args.config);

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;
    let dry_run = args.dry_run || config.distributor.dry_run;

    info!(
        kafka_brokers = ?config.kafka.brokers,
        subscriptions = config.subscriptions.len(),
        dry_run,
        "Configuration summary"
    );

    let publishers = build_publishers(&config, dry_run)?;
    for subscription in &config.subscriptions {
        if publishers.get(subscription.backend()).is_none() {
            warn!(
                backend = %subscription.backend(),
                client_id = subscription.client_id(),
                table_key = subscription.table_key(),
                "Subscription references a backend with no publisher"
            );
        }
    }
    let distributor = Arc::new(Distributor::new(publishers));

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config, distributor).await?,
        Command::Teardown => {
            let deleted = distributor
                .delete_subscription_topics(&config.subscriptions)
                .await;
            info!(
                deleted,
                requested = config.subscriptions.len(),
                "Topic teardown finished"
            );
            println!("{}", deleted);
        }
    }

    Ok(())
}

async fn run(config: Config, distributor: Arc<Distributor>) -> anyhow::Result<()> {
    let reporter = spawn_throughput_reporter(
        distributor.clone(),
        Duration::from_secs(config.distributor.sample_interval_secs.max(1)),
    );
    let subscriptions = config.subscription_set();
    if subscriptions.is_empty() {
        warn!("No subscriptions configured, events will be read and dropped");
    }
    let ingestor = Ingestor::new(distributor.clone(), subscriptions);
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = ingestor.run(stdin) => {
            result.context("event stream failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    reporter.abort();
    info!(total = distributor.total_published(), "Stopped");
    Ok(())
}

fn build_publishers(config: &Config, dry_run: bool) -> anyhow::Result<PublisherRegistry> {
    if dry_run {
        let log = Arc::new(LogPublisher::new());
        return Ok(PublisherRegistry::new()
            .with(Backend::Redis, log.clone())
            .with(Backend::Exchange, log.clone())
            .with(Backend::Stream, log));
    }

    let kafka = KafkaPublisher::new(&config.kafka).context("failed to create Kafka publisher")?;
    Ok(PublisherRegistry::new().with(Backend::Stream, Arc::new(kafka)))
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("binlog_distributor=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("binlog_distributor=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
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
