use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use statline_storage::{HttpClientConfig, HttpFetcher};
use statline_sync::{FeedRegistry, StatlineConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "statline")]
#[command(about = "Statline sports-data acquisition command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Refresh every registered feed once and print a summary.
    Sync,
    /// Keep feeds refreshed on their intervals until ctrl-c.
    Watch {
        /// Feeds to watch; all registered feeds when omitted.
        feeds: Vec<String>,
        /// Override every feed's refresh interval, in seconds.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Serve the JSON API and refresh all feeds in the background.
    Serve,
    /// Print the latest snapshot held for a feed.
    Latest { feed_id: String },
    /// Check which upstream paths answer.
    Probe {
        /// Paths to probe; a built-in list when omitted.
        paths: Vec<String>,
    },
    /// List the feed registry.
    Feeds,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("statline=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let (_, scheduler) = statline_sync::scheduler_from_env().await?;
            for summary in statline_sync::sync_all(&scheduler).await {
                println!(
                    "{} provenance={} records={} source={} attempts={}{}",
                    summary.feed_id,
                    summary
                        .provenance
                        .map(|p| p.as_str())
                        .unwrap_or("unavailable"),
                    summary.records,
                    summary.source_endpoint.as_deref().unwrap_or("-"),
                    summary.attempts,
                    summary
                        .error
                        .map(|e| format!(" last_error=\"{e}\""))
                        .unwrap_or_default()
                );
            }
            scheduler.shutdown().await?;
        }
        Commands::Watch {
            feeds,
            interval_secs,
        } => {
            let (_, scheduler) = statline_sync::scheduler_from_env().await?;
            let feeds = if feeds.is_empty() {
                scheduler
                    .feeds()
                    .into_iter()
                    .map(|f| f.feed_id.clone())
                    .collect()
            } else {
                feeds
            };
            let interval = interval_secs.map(std::time::Duration::from_secs);
            for feed_id in &feeds {
                scheduler
                    .subscribe(feed_id, interval)
                    .await
                    .with_context(|| format!("subscribing {feed_id}"))?;
            }
            info!(feeds = feeds.len(), "watching; ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            scheduler.shutdown().await?;
        }
        Commands::Serve => {
            statline_web::serve_from_env().await?;
        }
        Commands::Latest { feed_id } => {
            let (_, scheduler) = statline_sync::scheduler_from_env().await?;
            if scheduler.feed(&feed_id).is_none() {
                anyhow::bail!("unknown feed {feed_id}");
            }
            match scheduler.get_latest(&feed_id).await {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?),
                None => eprintln!("no snapshot stored for {feed_id}"),
            }
            scheduler.shutdown().await?;
        }
        Commands::Probe { paths } => {
            let config = StatlineConfig::from_env();
            let transport = HttpFetcher::new(HttpClientConfig {
                user_agent: Some(config.user_agent.clone()),
                global_concurrency: config.http_concurrency,
            })?;
            let paths = if paths.is_empty() {
                statline_sync::DEFAULT_PROBE_PATHS
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            } else {
                paths
            };
            let results = statline_sync::probe(
                &transport,
                &config.base_url,
                &paths,
                config.candidate_timeout(),
            )
            .await;
            for result in &results {
                println!(
                    "{:<4} {:<32} status={} {}ms{}",
                    if result.ok { "ok" } else { "FAIL" },
                    result.path,
                    result
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".into()),
                    result.elapsed_ms,
                    result
                        .error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                );
            }
            let ok = results.iter().filter(|r| r.ok).count();
            println!("{ok}/{} reachable at {}", results.len(), config.base_url);
        }
        Commands::Feeds => {
            let config = StatlineConfig::from_env();
            let registry = FeedRegistry::load(&config.feeds_path).await?;
            for feed in &registry.feeds {
                let paths = statline_core::resolve_candidates(feed)
                    .into_iter()
                    .map(|c| c.path)
                    .collect::<Vec<_>>();
                println!(
                    "{} kind={} interval={}s fallback={} candidates=[{}]",
                    feed.feed_id,
                    feed.kind,
                    feed.refresh_interval_secs
                        .unwrap_or(config.refresh_interval_secs),
                    feed.fallback_count,
                    paths.join(", ")
                );
            }
        }
    }

    Ok(())
}
