// File: livelist-monitor/src/main.rs
// Purpose: Keep one backend list live from the command line and log what changes

use anyhow::{Context, Result};
use clap::Parser;
use livelist_sync::{
    ApiClient, CommissionPayment, Device, FcmLog, HttpPageSource, LiveList, LiveListConfig,
    LiveView, MessageBus, MomoPayTransaction, PageQuery, PageSource, PushChannel,
    PushChannelConfig, Record, RecordKind, SmsLog, Sort, TopUpRequest, Transaction,
    TransactionLog, ViewEvent, WaveBusinessTransaction,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livelist-monitor")]
#[command(version, about = "Keep a payments admin list live and log its changes", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = livelist_sync::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Resource to watch (transactions, devices, sms-logs, fcm-logs, topups, ...)
    #[arg(short, long, default_value = "transactions")]
    resource: RecordKind,

    /// 1-based page number
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Records per page (defaults to the configured view page size)
    #[arg(long)]
    page_size: Option<u32>,

    /// Free-text search
    #[arg(short, long)]
    search: Option<String>,

    /// Status filter; "all" disables it
    #[arg(long)]
    status: Option<String>,

    /// Order by this field, prefix with '-' for descending
    #[arg(long, allow_hyphen_values = true)]
    ordering: Option<String>,
}

impl Cli {
    fn query(&self, config: &LiveListConfig) -> PageQuery {
        let mut query = PageQuery::new(self.page_size.unwrap_or(config.view.page_size)).with_page(self.page);
        if let Some(search) = &self.search {
            query = query.with_search(search.as_str());
        }
        if let Some(status) = &self.status {
            query = query.with_filter("status", status.as_str());
        }
        if let Some(ordering) = &self.ordering {
            query = query.with_sort(parse_ordering(ordering));
        }
        query
    }
}

/// `-created_at` -> descending, `amount` or `+amount` -> ascending
fn parse_ordering(ordering: &str) -> Sort {
    match ordering.strip_prefix('-') {
        Some(field) => Sort::desc(field),
        None => Sort::asc(ordering.trim_start_matches('+')),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,livelist_sync=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = LiveListConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        api = %config.api.base_url,
        push = %config.push_url(),
        resource = %cli.resource,
        "livelist-monitor starting"
    );

    let bus = MessageBus::new(config.push.bus_capacity);
    let push = PushChannel::spawn(PushChannelConfig::from(&config), bus.clone());
    let client = ApiClient::new(&config.api).context("Failed to build HTTP client")?;
    let source: Arc<dyn PageSource> = Arc::new(HttpPageSource::new(client));
    let query = cli.query(&config);
    let policy = config.view.stale_responses;

    match cli.resource {
        RecordKind::Transaction => watch::<Transaction>(query, policy, source, &bus).await,
        RecordKind::Device => watch::<Device>(query, policy, source, &bus).await,
        RecordKind::SmsLog => watch::<SmsLog>(query, policy, source, &bus).await,
        RecordKind::FcmLog => watch::<FcmLog>(query, policy, source, &bus).await,
        RecordKind::TopUpRequest => watch::<TopUpRequest>(query, policy, source, &bus).await,
        RecordKind::MomoPayTransaction => watch::<MomoPayTransaction>(query, policy, source, &bus).await,
        RecordKind::WaveBusinessTransaction => {
            watch::<WaveBusinessTransaction>(query, policy, source, &bus).await
        }
        RecordKind::CommissionPayment => watch::<CommissionPayment>(query, policy, source, &bus).await,
        RecordKind::TransactionLog => watch::<TransactionLog>(query, policy, source, &bus).await,
    }?;

    push.shutdown().await;
    info!("livelist-monitor stopped");
    Ok(())
}

/// Run a view until Ctrl-C, logging snapshots and side-channel events
async fn watch<R: Record>(
    query: PageQuery,
    policy: livelist_sync::StaleResponsePolicy,
    source: Arc<dyn PageSource>,
    bus: &MessageBus,
) -> Result<()> {
    let mut view: LiveView<R> = LiveView::spawn(LiveList::with_policy(query, policy), source, bus);
    let mut events = view.take_events().context("view events already taken")?;
    let mut snapshots = view.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("View stopped unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(
                    kind = %R::KIND,
                    state = ?snapshot.state,
                    page = snapshot.page,
                    total_pages = snapshot.total_pages,
                    total_count = snapshot.total_count,
                    shown = snapshot.records.len(),
                    "List updated"
                );
            }
            Some(event) = events.recv() => match event {
                ViewEvent::Notification(notification) => {
                    info!(event = %notification.event, "Notification: {}", notification.message);
                }
                ViewEvent::LoadFailed(message) => warn!("Load failed: {}", message),
                ViewEvent::Loaded(outcome) => info!(?outcome, "Page loaded"),
                ViewEvent::Pushed(outcome) => info!(?outcome, "Push event"),
            },
        }
    }

    view.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_builds_query() {
        let cli = Cli::parse_from([
            "livelist-monitor",
            "--resource",
            "sms-logs",
            "--page",
            "2",
            "--status",
            "received",
            "--ordering",
            "-created_at",
        ]);
        assert_eq!(cli.resource, RecordKind::SmsLog);

        let query = cli.query(&LiveListConfig::default());
        assert_eq!(
            query.to_query_string(),
            "page=2&page_size=10&status=received&ordering=-created_at"
        );
    }

    #[test]
    fn test_descending_ordering_as_separate_value() {
        let cli = Cli::parse_from(["livelist-monitor", "--ordering", "-amount", "--page", "3"]);
        assert_eq!(cli.ordering.as_deref(), Some("-amount"));
        assert_eq!(cli.page, 3);
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(parse_ordering("amount"), Sort::asc("amount"));
        assert_eq!(parse_ordering("+amount"), Sort::asc("amount"));
        assert_eq!(parse_ordering("-amount"), Sort::desc("amount"));
    }
}
