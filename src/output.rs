//! Writing feeds out.
//!
//! A one-shot run prints a pretty JSON document; session mode prints one
//! compact JSON object per line so a consumer can stream them. With
//! `--output`, the document goes to a file instead of stdout.

use crate::models::NewsFeed;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::{info, instrument};

/// Write `feed` as pretty JSON to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn write_feed_file(feed: &NewsFeed, path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(feed)?;
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, json).await?;
    info!(articles = feed.articles.len(), "Wrote feed JSON");
    Ok(())
}

/// Serialize `feed` to `out` followed by a newline, then flush.
///
/// # Arguments
///
/// * `out` - Any async writer (stdout, a file, an in-memory pipe)
/// * `feed` - The feed to write
/// * `pretty` - Indented multi-line JSON when true, a single line otherwise
pub async fn write_feed<W>(out: &mut W, feed: &NewsFeed, pretty: bool) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut json = if pretty {
        serde_json::to_string_pretty(feed)?
    } else {
        serde_json::to_string(feed)?
    };
    json.push('\n');
    out.write_all(json.as_bytes()).await?;
    out.flush().await
}

/// Print `feed` to stdout, pretty or as a single line.
pub async fn print_feed(feed: &NewsFeed, pretty: bool) -> Result<(), Box<dyn Error>> {
    write_feed(&mut io::stdout(), feed, pretty).await?;
    Ok(())
}

/// Send `feed` to `output` when given, otherwise pretty-print it to stdout.
pub async fn emit_feed(feed: &NewsFeed, output: Option<&str>) -> Result<(), Box<dyn Error>> {
    match output {
        Some(path) => write_feed_file(feed, path).await,
        None => print_feed(feed, true).await,
    }
}
