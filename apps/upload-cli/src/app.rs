//! Command handlers.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use oseh_api::{ApiClient, LoginContext, validate_base_url};
use oseh_content_upload::{ContentUploader, PartRetryPolicy, UploadError, UploaderConfig};
use oseh_transfer::{ContentSource, FileSource, HashConfig, compute_sha512};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{Command, ConfigAction, ContentKind};
use crate::config::{self, Config};
use crate::render::render_events;

/// How a command that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Stopped by Ctrl-C.
    Interrupted,
}

impl Outcome {
    /// Process exit status; an interrupt exits like SIGINT would.
    pub fn code(self) -> u8 {
        match self {
            Outcome::Done => 0,
            Outcome::Interrupted => 130,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Splits an interrupt off from real failures.
fn settle<T>(result: Result<T, UploadError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_cancelled() => {
            info!("interrupted");
            Ok(None)
        }
        Err(e) => bail!(e.user_message()),
    }
}

pub async fn run(command: Command, config: Config) -> anyhow::Result<Outcome> {
    match command {
        Command::Upload {
            file,
            kind,
            concurrency,
            api_url,
        } => upload(&file, kind, concurrency, api_url, config).await,
        Command::Hash { file } => hash(&file).await,
        Command::Config { action } => configure(action, config).map(|()| Outcome::Done),
    }
}

async fn upload(
    file: &Path,
    kind: ContentKind,
    concurrency: Option<usize>,
    api_url: Option<String>,
    config: Config,
) -> anyhow::Result<Outcome> {
    let api_url = api_url.unwrap_or_else(|| config.api_url.clone());
    if config.token.is_empty() {
        bail!("no token configured; run `oseh-upload config set-token` or set OSEH_TOKEN");
    }
    let login = LoginContext::new(&api_url, &config.token).context("invalid login settings")?;
    let client = ApiClient::with_timeout(login, config.request_timeout())?;

    let source = FileSource::open(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;

    let mut uploader = ContentUploader::new(
        Arc::new(client),
        UploaderConfig {
            concurrency: concurrency.unwrap_or(config.concurrency).max(1),
            retry: PartRetryPolicy {
                max_retries: config.part_retries,
                ..PartRetryPolicy::default()
            },
            ..UploaderConfig::default()
        },
    );
    let events = uploader
        .take_events()
        .context("event receiver already taken")?;
    let renderer = tokio::spawn(render_events(events));
    let interrupt = spawn_interrupt_handler(uploader.cancel_token());

    info!(
        file = %source.path().display(),
        bytes = source.size(),
        kind = ?kind,
        "starting upload"
    );
    let result = uploader.start_upload(&source, &kind.scope()).await;

    interrupt.abort();
    // Closes the event channel so the renderer finishes.
    drop(uploader);
    if let Err(e) = renderer.await {
        debug!(error = %e, "event renderer ended abnormally");
    }

    match settle(result)? {
        Some(item) => {
            println!("{}", item.uid);
            Ok(Outcome::Done)
        }
        None => Ok(Outcome::Interrupted),
    }
}

async fn hash(file: &Path) -> anyhow::Result<Outcome> {
    let source = FileSource::open(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let digest = compute_sha512(&source, &HashConfig::default(), &cancel, None).await;
    interrupt.abort();

    match settle(digest.map_err(UploadError::from))? {
        Some(digest) => {
            debug!(file = %source.path().display(), "hashed");
            println!("{digest}");
            Ok(Outcome::Done)
        }
        None => Ok(Outcome::Interrupted),
    }
}

fn configure(action: ConfigAction, effective: Config) -> anyhow::Result<()> {
    let path = config::config_path()?;
    if let ConfigAction::Show = action {
        println!("# {}", path.display());
        print!("{}", effective.redacted()?);
        return Ok(());
    }

    // Edit the stored file, not the environment-overridden view.
    let mut config = Config::load_from(&path)?;
    match action {
        ConfigAction::Show => {}
        ConfigAction::SetApiUrl { url } => {
            validate_base_url(&url)?;
            config.api_url = url;
        }
        ConfigAction::SetToken { token } => {
            let token = token.trim();
            if token.is_empty() {
                bail!("token must not be empty");
            }
            config.token = token.to_string();
        }
    }
    config.save_to(&path)?;
    info!(path = %path.display(), "configuration updated");
    Ok(())
}

/// Cancels `cancel` on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("interrupt received, cancelling");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            },
        }
    })
}
