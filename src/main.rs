use table_scout::config::AppConfig;
use table_scout::scrapers::{
    ChromeSession, ChromeTableAccessor, HeaderExtractor, RowCollector, RowSink, StopReason,
};
use table_scout::sink::JsonFileSink;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("📊 Table Scout - virtualized table collector");
    info!("==============================================");

    let config = AppConfig::load()?;

    // Attach to a logged-in browser when one is given, otherwise start our own
    let session = match &config.chrome_ws_url {
        Some(ws_url) => ChromeSession::connect(ws_url).await?,
        None => ChromeSession::launch(config.headless).await?,
    };
    let tab = session.table_tab(config.table_url.as_deref()).await?;

    let mut accessor = ChromeTableAccessor::new(tab, config.selectors.clone())?;
    accessor.wait_for_table().await?;
    info!("✅ Table visible");

    // Ctrl-C stops the loop at the next iteration and keeps what we have
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current iteration...");
            let _ = cancel_tx.send(true);
        }
    });

    let mut collector = RowCollector::new(config.collector.clone(), HeaderExtractor);
    let outcome = collector
        .run_until_cancelled(&mut accessor, &cancel_rx)
        .await;

    let stats = collector.stats();
    info!(
        "Read {} windows, scrolled {} times, turned {} pages, {} retries",
        stats.iterations, stats.scrolls, stats.pages, stats.retries
    );

    let failure = match outcome {
        Ok(StopReason::Exhausted) => {
            info!("✅ Reached the end of the table");
            None
        }
        Ok(StopReason::Cancelled) => {
            warn!("Stopped early, saving partial results");
            None
        }
        Ok(StopReason::IterationLimit) => {
            warn!("Stopped at the iteration ceiling, the table may be incomplete");
            None
        }
        Err(err) => {
            error!("❌ Collection failed: {}", err);
            if let Some(dir) = &config.debug_dir {
                if let Err(shot_err) = accessor.capture_debug_screenshot(dir, "collect_failed").await {
                    warn!("Could not capture debug screenshot: {:#}", shot_err);
                }
            }
            Some(err)
        }
    };

    // Partial results are still a valid prefix of the table
    let rows = collector.into_rows();
    let mut sink = JsonFileSink::new(&config.output_file);
    info!("Handing {} rows to the {} sink", rows.len(), sink.sink_name());
    sink.accept(&rows).await?;

    match failure {
        Some(err) => Err(err.into()),
        None => {
            info!("🎉 Done: {} rows in {}", rows.len(), sink.path().display());
            Ok(())
        }
    }
}
