use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use joblog_core::{collapse_settled, DEFAULT_SEPARATOR_WIDTH};
use joblog_multiplexer::{LogMultiplexer, LogViewer};
use joblog_observability::{init_tracing, LogConfig};
use joblog_relay::{spawn_relay_client, RelayClientConfig, RelayLink};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Follow the live output of one or more jobs through the relay
#[derive(Parser, Debug)]
#[command(name = "joblog-tail")]
#[command(version)]
struct Args {
    /// Relay WebSocket URL (defaults to $JOBLOG_RELAY_URL)
    #[arg(long, value_name = "WS_URL")]
    url: Option<String>,

    /// Longest separator line to keep, in visible characters
    #[arg(short, long, default_value_t = DEFAULT_SEPARATOR_WIDTH)]
    width: usize,

    /// Print output as received, without canonicalizing
    #[arg(long)]
    raw: bool,

    /// Jobs to follow
    #[arg(required = true, value_name = "JOB")]
    jobs: Vec<String>,
}

/// What to print after a buffer change, given what is already on screen.
#[derive(Debug, PartialEq, Eq)]
enum Update {
    Unchanged,
    Append(String),
    /// The buffer was cleared or rewritten; print it again from the start.
    Reset(String),
}

/// How a job's buffer is turned into screen text.
#[derive(Debug, Clone, Copy)]
enum Render {
    Raw,
    Canonical { width: usize },
}

/// Per-job record of what has already been printed.
///
/// Appends are told apart from clears by the raw buffer. In canonical mode
/// only the settled part of the buffer is shown: a trailing blank run or an
/// unterminated line appears once the line after it arrives.
#[derive(Debug, Default)]
struct TailState {
    raw: String,
    shown: String,
}

impl TailState {
    fn advance(&mut self, current: &str, render: Render) -> Update {
        let appended = current.starts_with(self.raw.as_str());
        let target = match render {
            Render::Raw => current.to_string(),
            Render::Canonical { width } => collapse_settled(current, width),
        };

        let update = match target.strip_prefix(self.shown.as_str()) {
            Some("") if appended => Update::Unchanged,
            Some(rest) if appended => Update::Append(rest.to_string()),
            _ => Update::Reset(target.clone()),
        };

        self.raw.clear();
        self.raw.push_str(current);
        self.shown = target;
        update
    }
}

/// Shared stdout writer. With several jobs, a `==> job <==` header marks
/// every switch between them.
struct TailOutput {
    multi: bool,
    last_job: Option<String>,
}

impl TailOutput {
    fn write(&mut self, out: &mut impl Write, job: &str, update: Update) -> std::io::Result<()> {
        let (text, restarted) = match update {
            Update::Unchanged => return Ok(()),
            Update::Append(text) => (text, false),
            Update::Reset(text) => (text, true),
        };
        if self.multi && self.last_job.as_deref() != Some(job) {
            writeln!(out, "\n==> {job} <==")?;
            self.last_job = Some(job.to_string());
        }
        if restarted {
            writeln!(out, "\n--- {job}: log restarted ---")?;
        }
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // rustls panics on TLS connect when it cannot pick a provider on its own.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let _log_guard = init_tracing(&LogConfig::from_env())?;
    let args = Args::parse();

    let mut config = RelayClientConfig::default();
    if let Some(url) = args.url {
        config = config.with_url(url);
    }

    let link = Arc::new(RelayLink::new());
    let mux = Arc::new(LogMultiplexer::new(link.clone()));
    let client = spawn_relay_client(mux.clone(), link, config)
        .context("no relay URL: pass --url or set JOBLOG_RELAY_URL")?;

    let output = Arc::new(Mutex::new(TailOutput {
        multi: args.jobs.len() > 1,
        last_job: None,
    }));
    let mut viewers = JoinSet::new();

    for job in args.jobs {
        let mut viewer = LogViewer::open(mux.clone(), job.clone());
        if let Some(e) = viewer.warning() {
            info!(job = %job, error = %e, "not connected yet, subscription deferred");
        }
        let output = output.clone();
        let render = if args.raw {
            Render::Raw
        } else {
            Render::Canonical { width: args.width }
        };

        viewers.spawn(async move {
            let mut state = TailState::default();
            while let Some(snapshot) = viewer.changed().await {
                let update = state.advance(snapshot.as_str(), render);
                let mut output = output.lock().unwrap_or_else(|e| e.into_inner());
                output.write(&mut std::io::stdout().lock(), &job, update)?;
            }
            Ok::<_, std::io::Error>(())
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        Some(result) = viewers.join_next() => {
            if let Ok(Err(e)) = result {
                warn!(error = %e, "stdout closed");
            }
        }
    }

    viewers.abort_all();
    client.abort();
    Ok(())
}
