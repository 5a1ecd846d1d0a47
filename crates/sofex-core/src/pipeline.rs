//! The four-stage processing run.
//!
//! Load → extract → normalize → detect, strictly in that order, one
//! atomic [`ProcessingResult`] per submitted document. The whole run sits
//! under one timeout; cancellation is honored at stage boundaries, so a
//! stage either runs to completion or never starts. Document loading
//! (subprocess-heavy) runs on the blocking pool.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::{
    PageText, PipelineError, ProcessingMode, ProcessingResult, Stats, anomaly, extract, normalize,
    timeparse,
};

/// Caller-selected options for one run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub mode: ProcessingMode,
    /// IANA zone the document's bare local times are read in.
    pub port_timezone: String,
    pub enable_ocr: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Accuracy,
            port_timezone: "UTC".to_string(),
            enable_ocr: true,
        }
    }
}

/// Process one document end to end.
///
/// Fatal errors (unsupported format, corrupt container, unavailable OCR,
/// bad timezone, timeout) carry no partial result; per-event problems
/// come back inside the result as degraded rows and anomalies instead.
pub async fn process_document(
    bytes: Vec<u8>,
    declared_type: &str,
    options: &ProcessOptions,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<ProcessingResult, PipelineError> {
    let timeout_secs = config.limits.timeout_secs;
    match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        run_stages(bytes, declared_type, options, config, cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout(timeout_secs)),
    }
}

async fn run_stages(
    bytes: Vec<u8>,
    declared_type: &str,
    options: &ProcessOptions,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<ProcessingResult, PipelineError> {
    // Validate the zone before paying for extraction.
    if timeparse::parse_timezone(&options.port_timezone).is_none() {
        return Err(PipelineError::InvalidTimezone(options.port_timezone.clone()));
    }

    // Mode precedence: cost-saving turns OCR off even when the flag asks
    // for it.
    let enable_ocr = options.enable_ocr && options.mode == ProcessingMode::Accuracy;

    checkpoint(&cancel)?;
    let loader_options = config.loader.clone();
    let declared = declared_type.to_string();
    let pages = tokio::task::spawn_blocking(move || {
        sofex_document::load_with_options(&bytes, &declared, enable_ocr, &loader_options)
    })
    .await
    .map_err(|e| PipelineError::Internal(e.to_string()))??;

    checkpoint(&cancel)?;
    let candidates = extract::extract(&pages, config, options.mode);

    checkpoint(&cancel)?;
    let events = normalize::normalize(&candidates, &options.port_timezone, config)?;

    checkpoint(&cancel)?;
    let anomalies = anomaly::detect(&events, config);

    let stats = Stats::for_events(&events, config.thresholds.low_confidence);
    log::info!(
        "processed document: {} event(s), {} anomaly(ies)",
        stats.total_events,
        anomalies.len()
    );

    Ok(ProcessingResult {
        text_preview: preview(&pages, config.limits.preview_chars),
        events,
        stats,
        anomalies,
    })
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn preview(pages: &[PageText], cap: usize) -> Option<String> {
    if cap == 0 {
        return None;
    }
    let joined = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(cap).collect())
    }
}
