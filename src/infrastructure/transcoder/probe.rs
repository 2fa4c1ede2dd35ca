//! ffprobe inspection of uploaded media.

use super::EngineError;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
}

impl ProbeReport {
    pub fn parse(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }

    pub fn has_video(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("video"))
    }

    /// Container duration in milliseconds, when ffprobe reports one.
    pub fn duration_ms(&self) -> Option<i64> {
        let secs: f64 = self.format.as_ref()?.duration.as_deref()?.parse().ok()?;
        (secs.is_finite() && secs > 0.0).then(|| (secs * 1000.0) as i64)
    }
}

pub async fn probe(ffprobe_bin: &str, path: &Path) -> Result<ProbeReport, EngineError> {
    let output = Command::new(ffprobe_bin)
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| EngineError::Launch {
            bin: ffprobe_bin.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        debug!(
            "ffprobe rejected {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(EngineError::Rejected("Invalid or unsupported video file".to_string()));
    }

    ProbeReport::parse(&output.stdout)
        .map_err(|_| EngineError::Rejected("Invalid or unsupported video file".to_string()))
}
