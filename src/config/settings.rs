use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown job store backend: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub job_store: StoreBackend,
    pub database_url: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub signed_url_ttl_secs: u64,
    pub persist_inputs: bool,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ffmpeg_preset: String,
    pub ffmpeg_crf: u8,
}

impl AppConfig {
    pub fn new() -> anyhow::Result<Self> {
        let job_store: StoreBackend = env::get_or(EnvKey::JobStore, "postgres")
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let database_url = env::get(EnvKey::DatabaseUrl).ok();
        if job_store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("{} is required when {}=postgres", EnvKey::DatabaseUrl.as_str(), EnvKey::JobStore.as_str());
        }

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 5000),
            job_store,
            database_url,
            s3_endpoint: env::get(EnvKey::S3Endpoint).ok(),
            s3_bucket: required(EnvKey::S3Bucket)?,
            s3_region: env::get_or(EnvKey::S3Region, "ap-southeast-2"),
            s3_access_key: required(EnvKey::S3AccessKey)?,
            s3_secret_key: required(EnvKey::S3SecretKey)?,
            jwt_secret: required(EnvKey::JwtSecret)?,
            upload_dir: PathBuf::from(env::get_or(EnvKey::UploadDir, "uploads")),
            output_dir: PathBuf::from(env::get_or(EnvKey::OutputDir, "outputs")),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 100 * 1024 * 1024),
            signed_url_ttl_secs: env::get_parsed(EnvKey::SignedUrlTtlSecs, 3600),
            persist_inputs: env::get_flag(EnvKey::PersistInputs, true),
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
            ffprobe_bin: env::get_or(EnvKey::FfprobeBin, "ffprobe"),
            ffmpeg_preset: env::get_or(EnvKey::FfmpegPreset, "veryslow"),
            ffmpeg_crf: env::get_parsed(EnvKey::FfmpegCrf, 28),
        })
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

fn required(key: EnvKey) -> anyhow::Result<String> {
    let name = key.as_str();
    env::get(key).map_err(|_| anyhow::anyhow!("{} is not set", name))
}
