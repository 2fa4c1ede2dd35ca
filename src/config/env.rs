use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    JobStore,
    DatabaseUrl,
    S3Endpoint,
    S3Bucket,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    JwtSecret,
    UploadDir,
    OutputDir,
    MaxUploadBytes,
    SignedUrlTtlSecs,
    PersistInputs,
    FfmpegBin,
    FfprobeBin,
    FfmpegPreset,
    FfmpegCrf,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::JobStore => "JOB_STORE",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::UploadDir => "UPLOAD_DIR",
            EnvKey::OutputDir => "OUTPUT_DIR",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
            EnvKey::SignedUrlTtlSecs => "SIGNED_URL_TTL_SECS",
            EnvKey::PersistInputs => "PERSIST_INPUTS",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::FfprobeBin => "FFPROBE_BIN",
            EnvKey::FfmpegPreset => "FFMPEG_PRESET",
            EnvKey::FfmpegCrf => "FFMPEG_CRF",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Accepts `true/false`, `1/0`, `yes/no`; anything else yields the default.
pub fn get_flag(key: EnvKey, default: bool) -> bool {
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "true" | "1" | "yes") => true,
        Ok(v) if matches!(v.as_str(), "false" | "0" | "no") => false,
        _ => default,
    }
}
