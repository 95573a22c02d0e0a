use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use futures::future::join_all;
use news_summarizer_api::config::DEFAULT_MAX_UPLOAD_BYTES;
use news_summarizer_api::inflight::InFlight;
use news_summarizer_api::{ErrorResponse, ExtractionResult};
use reqwest::multipart::{Form, Part};

/// Upload news article images or PDFs to a running summarizer server.
#[derive(Parser, Debug)]
#[command(name = "summarize-batch", version)]
struct Cli {
    /// Files to summarize (JPG, PNG, GIF or PDF)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: url::Url,

    /// Skip files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_bytes: usize,
}

struct Upload {
    path: PathBuf,
    name: String,
    mime: &'static str,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let endpoint = match cli.server.join("api/summarize") {
        Ok(url) => url,
        Err(e) => {
            eprintln!("invalid server URL: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let uploads: Vec<Upload> = cli
        .files
        .iter()
        .filter_map(|path| match prepare(path, cli.max_bytes) {
            Ok(upload) => Some(upload),
            Err(e) => {
                eprintln!("{}: skipped: {:#}", path.display(), e);
                None
            }
        })
        .collect();

    if uploads.is_empty() {
        return ExitCode::SUCCESS;
    }
    if uploads.len() > 1 {
        println!("processing {} files", uploads.len());
    }

    let client = reqwest::Client::new();
    let inflight = InFlight::new();

    // Every file is its own task; one failure does not cancel the others.
    let outcomes = join_all(
        uploads
            .iter()
            .map(|upload| submit(&client, &endpoint, upload, &inflight)),
    )
    .await;

    let mut failed = 0;
    for (upload, outcome) in uploads.iter().zip(outcomes) {
        match outcome {
            Ok(Some(result)) => {
                println!("── {} ({})", upload.name, upload.mime);
                println!("{}", result.headline);
                println!("{}", result.press);
                println!("{}\n", result.summary);
            }
            Ok(None) => println!("{}: already being processed", upload.name),
            Err(e) => {
                failed += 1;
                eprintln!("{}: failed: {:#}", upload.name, e);
            }
        }
    }

    if failed == 0 {
        println!("all files processed");
        ExitCode::SUCCESS
    } else {
        eprintln!("{} of {} files failed", failed, uploads.len());
        ExitCode::FAILURE
    }
}

fn prepare(path: &Path, max_bytes: usize) -> anyhow::Result<Upload> {
    let mime = mime_for(path).context("unsupported file type, use JPG, PNG, GIF or PDF")?;
    let size = std::fs::metadata(path)
        .with_context(|| format!("cannot read {}", path.display()))?
        .len();
    if size > max_bytes as u64 {
        bail!("file is {} bytes, the limit is {} bytes", size, max_bytes);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Upload {
        path: path.to_path_buf(),
        name,
        mime,
    })
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// `Ok(None)` when a file with the same name is still in flight.
async fn submit(
    client: &reqwest::Client,
    endpoint: &url::Url,
    upload: &Upload,
    inflight: &InFlight,
) -> anyhow::Result<Option<ExtractionResult>> {
    let Some(_guard) = inflight.try_acquire(&upload.name) else {
        return Ok(None);
    };

    let data = tokio::fs::read(&upload.path)
        .await
        .with_context(|| format!("cannot read {}", upload.path.display()))?;
    tracing::debug!(file = %upload.name, bytes = data.len(), "uploading");

    let part = Part::bytes(data)
        .file_name(upload.name.clone())
        .mime_str(upload.mime)?;
    let form = Form::new().part("file", part).text("fileType", upload.mime);

    let response = client
        .post(endpoint.clone())
        .multipart(form)
        .send()
        .await
        .context("request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => bail!(
                "HTTP {}: {}{}",
                status.as_u16(),
                err.error,
                err.details.map(|d| format!(" ({})", d)).unwrap_or_default()
            ),
            Err(_) => bail!("HTTP {}", status.as_u16()),
        }
    }

    let result = response
        .json::<ExtractionResult>()
        .await
        .context("unexpected response body")?;
    Ok(Some(result))
}
