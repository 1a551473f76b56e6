use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Directory for temporarily stored uploads and transcode intermediates
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
    /// Maximum accepted upload size in bytes (default 50 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Accepted file extensions (lowercase, without the dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Minimum decoded duration in seconds
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: f64,
    /// Deadline for the external transcode subprocess
    #[serde(default = "default_transcode_timeout_secs")]
    pub transcode_timeout_secs: u64,
    /// External transcoder binary (overridable for tests)
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Path to the whisper GGML model file
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Transcription language ("auto" enables detection)
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Chat-completions endpoint of the generative text service
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    /// Bearer credentials for the service
    #[serde(default)]
    pub api_key: String,
    /// Model identifier sent with each request
    #[serde(default = "default_analysis_model")]
    pub model: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scratch_dir() -> String {
    "/tmp/herdlog-audio".to_string()
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["mp3", "wav", "m4a", "flac", "aac", "ogg", "wma", "webm", "opus"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_duration_secs() -> f64 {
    0.5
}

fn default_transcode_timeout_secs() -> u64 {
    60
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_model_path() -> String {
    "models/ggml-base.bin".to_string()
}

fn default_language() -> String {
    "ru".to_string()
}

fn default_analysis_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_analysis_model() -> String {
    "gigachat".to_string()
}

fn default_analysis_timeout_secs() -> u64 {
    30
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            min_duration_secs: default_min_duration_secs(),
            transcode_timeout_secs: default_transcode_timeout_secs(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            language: default_language(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            api_key: String::new(),
            model: default_analysis_model(),
            timeout_secs: default_analysis_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("HERDLOG").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
