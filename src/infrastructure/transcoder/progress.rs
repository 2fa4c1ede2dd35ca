//! Parsing of ffmpeg `-progress` output.
//!
//! ffmpeg writes `key=value` lines and closes every block with
//! `progress=continue` or `progress=end`.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Output position in microseconds.
    pub out_time_us: i64,
    /// Encoding speed relative to realtime.
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Completion percentage against a total duration in milliseconds, clamped to 0..=100.
    pub fn percentage(&self, total_duration_ms: i64) -> Option<f64> {
        if self.is_complete {
            return Some(100.0);
        }
        if total_duration_ms <= 0 {
            return None;
        }
        let done_ms = self.out_time_us as f64 / 1000.0;
        Some((done_ms / total_duration_ms as f64 * 100.0).clamp(0.0, 100.0))
    }
}

#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line; returns a snapshot when the line closes a block.
    pub fn feed(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key {
            // Both carry microseconds; `out_time_ms` is misnamed by ffmpeg.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_us = us.max(0);
                }
            }
            "speed" => {
                if let Ok(speed) = value.trim_end_matches('x').parse::<f64>() {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.is_complete = value == "end";
                return Some(self.current.clone());
            }
            _ => {}
        }
        None
    }
}
