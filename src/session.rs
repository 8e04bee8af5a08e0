//! Interactive session over stdin.
//!
//! Each line is one command:
//!
//! | Line | Effect |
//! |------|--------|
//! | `lat,lon` | load news for that coordinate |
//! | `default` | load news for the default place |
//! | `refresh` | forget the last loaded location |
//! | `cancel`  | cancel every run in flight |
//!
//! Loads run concurrently on one shared [`NewsService`], so the load guard
//! sees the same sequence of requests a map client would send. Each result
//! is printed as one JSON line as soon as it is ready, whether or not more
//! input has arrived.

use crate::filter::FilterCriteria;
use crate::guard::LoadKey;
use crate::models::{Coordinate, NewsFeed};
use crate::output::write_feed;
use crate::pipeline::NewsService;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Load(Option<Coordinate>),
    Refresh,
    Cancel,
}

impl SessionCommand {
    /// Parse one input line; `Ok(None)` for blank lines and `#` comments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let command = match line.to_ascii_lowercase().as_str() {
            LoadKey::DEFAULT => SessionCommand::Load(None),
            "refresh" => SessionCommand::Refresh,
            "cancel" => SessionCommand::Cancel,
            _ => SessionCommand::Load(Some(line.parse()?)),
        };
        Ok(Some(command))
    }
}

/// Run commands from `input` until EOF, writing each finished load to `out`
/// as one JSON line, then wait for outstanding loads.
///
/// # Arguments
///
/// * `service` - Shared service every load runs on
/// * `criteria` - Filters applied to every load in the session
/// * `input` - Command lines, usually buffered stdin
/// * `out` - Where result lines go, usually stdout
///
/// # Returns
///
/// `Ok(())` once input is exhausted and every load has been written. Read
/// and write failures end the session with that error.
#[instrument(level = "info", skip_all)]
pub async fn run_session<R, W>(
    service: Arc<NewsService>,
    criteria: FilterCriteria,
    input: R,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let criteria = Arc::new(criteria);
    let mut lines = input.lines();
    let mut loads: JoinSet<NewsFeed> = JoinSet::new();
    let mut input_open = true;

    while input_open || !loads.is_empty() {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) => dispatch(&service, &criteria, &mut loads, &line),
                None => {
                    debug!(pending = loads.len(), "Input closed");
                    input_open = false;
                }
            },
            Some(done) = loads.join_next(), if !loads.is_empty() => {
                write_joined(out, done).await?;
            }
            else => break,
        }
    }
    Ok(())
}

fn dispatch(
    service: &Arc<NewsService>,
    criteria: &Arc<FilterCriteria>,
    loads: &mut JoinSet<NewsFeed>,
    line: &str,
) {
    let command = match SessionCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            warn!(%line, error = %e, "Ignoring unreadable line");
            return;
        }
    };

    match command {
        SessionCommand::Load(coordinate) => {
            let service = Arc::clone(service);
            let criteria = Arc::clone(criteria);
            loads.spawn(async move {
                match service.load(coordinate, &criteria).await {
                    Ok(feed) => feed,
                    Err(e) => {
                        error!(error = %e, "Load failed");
                        NewsFeed::failed(LoadKey::new(coordinate).to_string(), &e)
                    }
                }
            });
        }
        SessionCommand::Refresh => {
            service.reset();
            info!("Forgot last loaded location");
        }
        SessionCommand::Cancel => {
            let cancelled = service.cancel_all();
            info!(cancelled, "Cancelled in-flight runs");
        }
    }
}

async fn write_joined<W>(out: &mut W, done: Result<NewsFeed, JoinError>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match done {
        Ok(feed) => write_feed(out, &feed, false).await,
        Err(e) => {
            error!(error = %e, "Load task panicked");
            Ok(())
        }
    }
}
