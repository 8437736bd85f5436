//! Activity providers feeding the sink from dedicated threads

use std::io::{self, BufRead, BufReader};
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ActivityCategory;

use super::activity::ActivitySink;

/// External source of activity events
///
/// `run` may block; it is given its own OS thread. It should return once
/// `shutdown` is cancelled or the source is exhausted.
pub trait ActivityProvider: Send {
    fn name(&self) -> &str;

    fn run(self: Box<Self>, sink: ActivitySink, shutdown: CancellationToken);
}

/// Start a provider on a named thread
///
/// `shutdown` doubles as the provider's running flag: it is cancelled when
/// `run` returns.
pub fn spawn_provider(
    provider: Box<dyn ActivityProvider>,
    sink: ActivitySink,
    shutdown: CancellationToken,
) -> io::Result<JoinHandle<()>> {
    let name = provider.name().to_string();

    thread::Builder::new()
        .name(format!("activity-{name}"))
        .spawn(move || {
            debug!(provider = %name, "activity provider started");
            provider.run(sink, shutdown.clone());
            shutdown.cancel();
            debug!(provider = %name, "activity provider finished");
        })
}

/// Split `category<TAB or space>description`; blank and `#` lines are skipped
pub fn parse_line(line: &str) -> Option<(ActivityCategory, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (category, description) = line
        .split_once(|c: char| c == '\t' || c == ' ')
        .unwrap_or((line, ""));
    Some((ActivityCategory::parse_lossy(category), description.trim()))
}

/// Reads one event per line from any buffered reader
///
/// Cancellation is checked between lines; a read that blocks keeps the thread
/// alive until the next line or end of input.
pub struct LineActivityProvider<R> {
    name: String,
    reader: R,
}

impl<R: BufRead + Send> LineActivityProvider<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl LineActivityProvider<BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> ActivityProvider for LineActivityProvider<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, sink: ActivitySink, shutdown: CancellationToken) {
        let Self { name, reader } = *self;

        for line in reader.lines() {
            if shutdown.is_cancelled() {
                break;
            }

            match line {
                Ok(line) => {
                    if let Some((category, description)) = parse_line(&line) {
                        sink.record(category, description);
                    }
                }
                Err(e) => {
                    warn!(provider = %name, "stopped reading events: {e}");
                    break;
                }
            }
        }
    }
}
