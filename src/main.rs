//! # Local News Feed
//!
//! Resolves a coordinate to a place name and prints a filtered, deduplicated
//! feed of local news drawn from several topic categories.
//!
//! ## Usage
//!
//! ```sh
//! GNEWS_API_KEY=... local_news_feed --lat 18.52 --lon 73.85 -c weather -d 1
//! ```
//!
//! Logs go to stderr (`RUST_LOG` controls the level); the feed goes to
//! stdout or to `--output`.

use clap::Parser;
use local_news_feed::cli::Cli;
use local_news_feed::config::load_settings;
use local_news_feed::guard::LoadKey;
use local_news_feed::models::NewsFeed;
use local_news_feed::output::emit_feed;
use local_news_feed::pipeline::NewsService;
use local_news_feed::session::run_session;
use std::error::Error;
use std::sync::Arc;
use tokio::io::{self, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("local_news_feed starting up");

    let args = Cli::parse();
    let mut settings = load_settings(args.config.as_deref()).await?;
    args.apply_overrides(&mut settings);
    debug!(?settings, "Effective settings");

    let service = Arc::new(NewsService::from_settings(&settings)?);
    let criteria = args.criteria();

    if args.stdin {
        info!("Reading locations from stdin");
        run_session(
            service,
            criteria,
            BufReader::new(io::stdin()),
            &mut io::stdout(),
        )
        .await?;
    } else {
        let coordinate = args.coordinate()?;
        let key = LoadKey::new(coordinate);
        let feed = match service.load(coordinate, &criteria).await {
            Ok(feed) => feed,
            Err(e) => {
                error!(error = %e, "Cannot load news");
                let feed = NewsFeed::failed(key.to_string(), &e);
                emit_feed(&feed, args.output.as_deref()).await?;
                return Err(e.into());
            }
        };
        emit_feed(&feed, args.output.as_deref()).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
