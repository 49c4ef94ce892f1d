//! issnharvest - ISSN Metadata Extractor
//!
//! A Rust service that fetches bibliographic metadata for a list of journal
//! ISSNs from the Crossref API, for a chosen year, and writes the results as
//! CSV files split into size-bounded parts, with a browser UI for upload,
//! progress, and downloads.
//!
//! ## Usage
//!
//! ```bash
//! issnharvest serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use issnharvest::{
    crossref::CrossrefClient,
    harvest::{self, HarvestConfig, Progress},
    loader,
};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// ISSN Metadata Extractor - Crossref harvesting service
#[derive(Parser)]
#[command(name = "issnharvest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser UI server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory part files are written into
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Serve { port, host, output } => run_server(host, port, output).await,
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Bounds for the year selector
const YEAR_MIN: i32 = 1900;
const YEAR_MAX: i32 = 2100;

/// Upload size ceiling
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

async fn run_server(host: String, port: u16, output: PathBuf) -> Result<()> {
    info!(host = %host, port, output = %output.display(), "Starting HTTP server");

    let config = HarvestConfig {
        output_dir: output,
        ..Default::default()
    };
    let app_state = Arc::new(AppState {
        config,
        run: Mutex::new(RunState::Idle),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/run", post(run_handler))
        .route("/api/status", get(status_handler))
        .route("/api/download/{name}", get(download_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

struct AppState {
    config: HarvestConfig,
    run: Mutex<RunState>,
}

/// Lifecycle of the single run the server drives at a time.
enum RunState {
    Idle,
    Running {
        done: usize,
        total: usize,
        started: String,
    },
    Completed {
        files: Vec<PathBuf>,
        rows: u64,
        rejected: u32,
    },
    Failed {
        message: String,
    },
}

/// Lock the run cell; a poisoned lock still holds a usable enum value.
fn lock_run(state: &AppState) -> MutexGuard<'_, RunState> {
    state
        .run
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Browser UI
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Accept an upload and start the harvest.
///
/// Multipart fields: `year` (numeric text) and `file` (the ISSN CSV).
/// Rejected with 409 while a run is in flight, 422 on malformed input.
async fn run_handler(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut year: Option<i32> = None;
    let mut upload: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "year" => match field.text().await {
                        Ok(text) => year = text.trim().parse().ok(),
                        Err(e) => return bad_request(format!("Unreadable year field: {}", e)),
                    },
                    "file" => match field.bytes().await {
                        Ok(bytes) => upload = Some(bytes.to_vec()),
                        Err(e) => return bad_request(format!("Unreadable upload: {}", e)),
                    },
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => return bad_request(format!("Malformed multipart body: {}", e)),
        }
    }

    let Some(year) = year else {
        return unprocessable("Missing or invalid year".to_string());
    };
    if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
        return unprocessable(format!(
            "Year must be between {} and {}",
            YEAR_MIN, YEAR_MAX
        ));
    }
    let Some(upload) = upload else {
        return unprocessable("Missing ISSN file".to_string());
    };

    let issns = match loader::read_issn_list(&upload) {
        Ok(issns) => issns,
        Err(e) => return unprocessable(e.to_string()),
    };
    if issns.is_empty() {
        return unprocessable("Upload contains no ISSN rows".to_string());
    }

    let total = issns.len() * 12;
    {
        let mut run = lock_run(&state);
        if matches!(*run, RunState::Running { .. }) {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "A run is already in progress" })),
            )
                .into_response();
        }
        *run = RunState::Running {
            done: 0,
            total,
            started: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
    }

    info!(issns = issns.len(), year, "Run accepted");

    let count = issns.len();
    let task_state = state.clone();
    tokio::spawn(async move {
        execute_run(task_state, issns, year).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "issns": count, "total": total })),
    )
        .into_response()
}

/// Drive one harvest to completion, mirroring its progress and final state
/// into the shared run cell.
async fn execute_run(state: Arc<AppState>, issns: Vec<String>, year: i32) {
    let client = match CrossrefClient::new(state.config.page_size) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Run setup failed");
            *lock_run(&state) = RunState::Failed {
                message: e.to_string(),
            };
            return;
        }
    };

    let progress_state = state.clone();
    let result = harvest::run_harvest(
        &client,
        &issns,
        year,
        &state.config,
        move |p: Progress| {
            let mut run = lock_run(&progress_state);
            if let RunState::Running { done, total, .. } = &mut *run {
                *done = p.done;
                *total = p.total;
            }
        },
    )
    .await;

    // A failed run presents no file manifest; sealed files from completed
    // months stay on disk, reachable only outside the interface.
    *lock_run(&state) = match result {
        Ok(report) => RunState::Completed {
            files: report.files,
            rows: report.rows,
            rejected: report.rejected,
        },
        Err(e) => {
            error!(error = %e, "Run failed");
            RunState::Failed {
                message: e.to_string(),
            }
        }
    };
}

/// Run state polled by the UI for the progress bar and download list.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let run = lock_run(&state);
    let body = match &*run {
        RunState::Idle => json!({ "status": "idle" }),
        RunState::Running {
            done,
            total,
            started,
        } => json!({
            "status": "running",
            "done": done,
            "total": total,
            "started": started,
        }),
        RunState::Completed {
            files,
            rows,
            rejected,
        } => json!({
            "status": "completed",
            "rows": rows,
            "rejected": rejected,
            "files": files
                .iter()
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                .collect::<Vec<_>>(),
        }),
        RunState::Failed { message } => json!({ "status": "failed", "error": message }),
    };
    Json(body)
}

/// Serve one completed-run file as a CSV attachment.
///
/// Lookups go through the run manifest only; no arbitrary paths.
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let path = {
        let run = lock_run(&state);
        match &*run {
            RunState::Completed { files, .. } => files
                .iter()
                .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(name.as_str()))
                .cloned(),
            _ => None,
        }
    };

    let Some(path) = path else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No such file in the completed run" })),
        )
            .into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (
                    header::CONTENT_TYPE,
                    "text/csv; charset=utf-8".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Download read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "File read failed" })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

// ============================================================================
// Browser UI
// ============================================================================

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>ISSN Metadata Extractor</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
  h1 { font-size: 1.4rem; }
  form { display: flex; gap: 1rem; align-items: center; flex-wrap: wrap; margin: 1rem 0; }
  label { display: flex; gap: 0.5rem; align-items: center; }
  button { padding: 0.4rem 1rem; }
  progress { width: 100%; height: 1rem; }
  #status { margin: 0.75rem 0; }
  #downloads { padding-left: 1.25rem; }
</style>
</head>
<body>
<h1>ISSN Metadata Extractor</h1>
<p>Upload a CSV with a column named <code>issn</code>, pick a year, and run the extraction.
One Crossref query per ISSN per month; results are written as monthly CSV parts.</p>
<form id="run-form">
  <label>Year
    <input type="number" name="year" value="2025" min="1900" max="2100" required>
  </label>
  <input type="file" name="file" accept=".csv" required>
  <button type="submit">Run Extraction</button>
</form>
<div id="status"></div>
<progress id="bar" value="0" max="1" hidden></progress>
<ul id="downloads"></ul>
<script>
const form = document.getElementById('run-form');
const statusEl = document.getElementById('status');
const bar = document.getElementById('bar');
const downloads = document.getElementById('downloads');
let timer = null;

form.addEventListener('submit', async (e) => {
  e.preventDefault();
  if (timer) clearInterval(timer);
  downloads.innerHTML = '';
  const resp = await fetch('/api/run', { method: 'POST', body: new FormData(form) });
  const body = await resp.json();
  if (!resp.ok) {
    statusEl.textContent = body.error || 'Run rejected';
    return;
  }
  statusEl.textContent = `Loaded ${body.issns} ISSNs, running...`;
  bar.hidden = false;
  bar.value = 0;
  bar.max = body.total;
  timer = setInterval(poll, 1000);
});

async function poll() {
  const resp = await fetch('/api/status');
  const body = await resp.json();
  if (body.status === 'running') {
    bar.max = body.total;
    bar.value = body.done;
    statusEl.textContent = `Running: ${body.done} / ${body.total}`;
  } else if (body.status === 'completed') {
    clearInterval(timer);
    timer = null;
    bar.value = bar.max;
    statusEl.textContent =
      `Extraction completed: ${body.rows} rows, ${body.rejected} rejected requests`;
    downloads.innerHTML = '';
    for (const name of body.files || []) {
      const li = document.createElement('li');
      const a = document.createElement('a');
      a.href = '/api/download/' + encodeURIComponent(name);
      a.textContent = 'Download ' + name;
      li.appendChild(a);
      downloads.appendChild(li);
    }
  } else if (body.status === 'failed') {
    clearInterval(timer);
    timer = null;
    bar.hidden = true;
    statusEl.textContent = 'Run failed: ' + body.error;
  }
}
</script>
</body>
</html>
"##;
