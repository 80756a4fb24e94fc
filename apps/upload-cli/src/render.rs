//! Turns upload events into log lines.

use oseh_content_upload::UploadEvent;
use oseh_protocol::JobIndicator;
use oseh_transfer::SpeedCalculator;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Logs events until the uploader drops its sender.
pub async fn render_events(mut events: mpsc::Receiver<UploadEvent>) {
    let speed = SpeedCalculator::new(None, None);
    let mut last_uploaded = 0u64;
    let mut last_hash_percent = None;
    let mut last_job_message = String::new();

    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Hashing { hashed, total } => {
                let pct = percent(hashed, total);
                // Only every tenth percent reaches info.
                if last_hash_percent.is_none_or(|last| pct / 10 > last / 10) {
                    info!(progress = %format!("{pct}%"), "hashing");
                } else {
                    debug!(hashed, total, "hashing");
                }
                last_hash_percent = Some(pct);
            }
            UploadEvent::CheckingExisting => info!("checking for an existing copy"),
            UploadEvent::Initializing => info!("starting upload session"),
            UploadEvent::Uploading {
                uploaded,
                total,
                parts,
                concurrency,
            } => {
                if uploaded == 0 {
                    info!(size = %human_bytes(total), parts, concurrency, "uploading");
                    continue;
                }
                speed.add_sample(uploaded.saturating_sub(last_uploaded));
                last_uploaded = uploaded;
                let eta = speed
                    .eta(total.saturating_sub(uploaded))
                    .map(|d| format!("{}s", d.as_secs()))
                    .unwrap_or_else(|| "?".into());
                info!(
                    progress = %format!("{}%", percent(uploaded, total)),
                    sent = %human_bytes(uploaded),
                    rate = %format!("{}/s", human_bytes(speed.bytes_per_second() as u64)),
                    eta = %eta,
                    "uploading"
                );
            }
            UploadEvent::JobProgress { message, indicator } => {
                let line = job_line(&message, indicator.as_ref());
                // Repeated messages only differ by their bar position.
                if message != last_job_message {
                    info!("{line}");
                    last_job_message = message;
                } else {
                    debug!("{line}");
                }
            }
            UploadEvent::JobReconnecting => {
                info!("reconnecting to processing job progress report");
            }
            UploadEvent::Processing {
                attempt,
                max_attempts,
            } => {
                if attempt == 1 || attempt % 10 == 0 {
                    info!(attempt, max_attempts, "waiting for processing");
                } else {
                    debug!(attempt, max_attempts, "waiting for processing");
                }
            }
            UploadEvent::Completed { uid, deduplicated } => {
                info!(%uid, deduplicated, "done");
            }
            // The command's exit error carries the same message.
            UploadEvent::Failed { error } => debug!(%error, "upload failed"),
            UploadEvent::Cancelled => info!("upload cancelled"),
        }
    }
}

fn job_line(message: &str, indicator: Option<&JobIndicator>) -> String {
    match indicator {
        Some(JobIndicator::Bar { at, of }) if *of > 0.0 => {
            format!("processing: {message} ({at}/{of})")
        }
        _ => format!("processing: {message}"),
    }
}

fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (done.min(total) as u128 * 100 / total as u128) as u64
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
