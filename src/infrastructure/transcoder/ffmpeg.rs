use super::probe;
use super::progress::ProgressParser;
use super::{EngineError, TranscodeEngine};
use crate::config::settings::AppConfig;
use crate::modules::jobs::events::EngineEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub preset: String,
    pub crf: u8,
}

impl FfmpegSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
            preset: config.ffmpeg_preset.clone(),
            crf: config.ffmpeg_crf,
        }
    }
}

/// Runs the system ffmpeg as a child process: H.264 video, AAC audio, MP4 container.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    settings: FfmpegSettings,
}

impl FfmpegEngine {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    fn transcode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostats", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        let crf = self.settings.crf.to_string();
        for arg in [
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-preset",
            self.settings.preset.as_str(),
            "-crf",
            crf.as_str(),
            "-progress",
            "pipe:1",
            "-f",
            "mp4",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn validate(&self, input: &Path) -> Result<(), EngineError> {
        let report = probe::probe(&self.settings.ffprobe_bin, input).await?;
        if !report.has_video() {
            return Err(EngineError::Rejected("No video stream found".to_string()));
        }
        debug!(
            "Validated {}: {} stream(s), {:?} ms",
            input.display(),
            report.streams.len(),
            report.duration_ms()
        );
        Ok(())
    }

    async fn start(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<mpsc::Receiver<EngineEvent>, EngineError> {
        let launch_error = |reason: String| EngineError::Launch {
            bin: self.settings.ffmpeg_bin.clone(),
            reason,
        };

        // Duration only feeds progress percentages; a failed probe is not fatal here.
        let duration_ms = probe::probe(&self.settings.ffprobe_bin, input)
            .await
            .ok()
            .and_then(|r| r.duration_ms());

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| launch_error(e.to_string()))?;
        }

        let args = self.transcode_args(input, output);
        info!(
            "FFmpeg command: {} {}",
            self.settings.ffmpeg_bin,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = Command::new(&self.settings.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| launch_error(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(drive(child_pipes(&mut child), child, duration_ms, output.to_path_buf(), tx));
        Ok(rx)
    }
}

type Pipes = (
    Option<tokio::process::ChildStdout>,
    Option<tokio::process::ChildStderr>,
);

fn child_pipes(child: &mut Child) -> Pipes {
    (child.stdout.take(), child.stderr.take())
}

async fn drive(
    (stdout, stderr): Pipes,
    mut child: Child,
    duration_ms: Option<i64>,
    output: PathBuf,
    tx: mpsc::Sender<EngineEvent>,
) {
    let _ = tx.send(EngineEvent::Started).await;

    let stderr_tail = tokio::spawn(async move {
        match stderr {
            Some(stderr) => collect_tail(stderr, STDERR_TAIL_LINES).await,
            None => VecDeque::new(),
        }
    });

    if let Some(stdout) = stdout {
        pump_progress(BufReader::new(stdout), duration_ms, &tx).await;
    }

    let status = child.wait().await;
    let tail = stderr_tail.await.unwrap_or_default();

    let event = match status {
        Ok(status) if status.success() => EngineEvent::Succeeded { output },
        Ok(status) => EngineEvent::Failed(failure_cause(&status.to_string(), &tail)),
        Err(e) => {
            warn!("Waiting on ffmpeg failed: {}", e);
            EngineEvent::Failed(format!("ffmpeg did not finish: {}", e))
        }
    };

    let _ = tx.send(event).await;
}

/// Forwards each completed progress block as a `Progress` event.
async fn pump_progress<R>(reader: R, duration_ms: Option<i64>, tx: &mpsc::Sender<EngineEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = ProgressParser::new();
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(snapshot) = parser.feed(&line) else {
            continue;
        };
        if let Some(percent) = snapshot.percentage(duration_ms.unwrap_or(0)) {
            debug!("ffmpeg at {:.1}% ({:.2}x realtime)", percent, snapshot.speed);
            if tx.send(EngineEvent::Progress(percent)).await.is_err() {
                break;
            }
        }
    }
}

async fn collect_tail<R>(reader: R, keep: usize) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(keep);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

fn failure_cause(status: &str, stderr_tail: &VecDeque<String>) -> String {
    match stderr_tail.back() {
        Some(last) => format!("ffmpeg {}: {}", status, last.trim()),
        None => format!("ffmpeg {}", status),
    }
}
