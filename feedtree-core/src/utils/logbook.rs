// src/utils/logbook.rs
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::{fs, io::Write, path::Path};

use crate::services::FeedId;
use crate::tree::Anomaly;

#[derive(Serialize)]
struct LogLine<'a> {
    ts: String,
    feed: FeedId,
    event: &'a str,
    data: &'a Anomaly,
}

/// Append one JSON line per anomaly to `log_path`. Returns how many were written.
pub fn append_anomalies(log_path: &Path, feed: FeedId, anomalies: &[Anomaly]) -> Result<usize> {
    if anomalies.is_empty() {
        return Ok(0);
    }
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({:?})", parent))?;
    }
    let ts = Utc::now().to_rfc3339();
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open anomaly log {:?}", log_path))?;
    for anomaly in anomalies {
        let line = LogLine {
            ts: ts.clone(),
            feed,
            event: anomaly.event(),
            data: anomaly,
        };
        let json = serde_json::to_string(&line)?;
        writeln!(f, "{}", json)?;
    }
    Ok(anomalies.len())
}
