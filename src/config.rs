// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::EngineError;
use crate::engine::hardware::{EncoderBackend, PRESETS};

/// Highest CRF / CQ value accepted by every backend
pub const MAX_QUALITY: u32 = 51;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// CRF for x265, CQ / global quality / QP for the hardware encoders
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// x265-style preset name, mapped per backend
    #[serde(default = "default_preset")]
    pub preset: String,

    /// `auto` to probe hardware, or a backend id (nvenc, qsv, amf, x265)
    #[serde(default = "default_encoder")]
    pub encoder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub recursive: bool,

    /// Recreate input subdirectories under the output directory
    #[serde(default = "default_true")]
    pub mirror_structure: bool,

    /// Always write .mkv instead of keeping the source container
    #[serde(default = "default_true")]
    pub force_container: bool,

    #[serde(default = "default_true")]
    pub skip_if_output_exists: bool,

    /// Skip sources whose video is already HEVC
    #[serde(default)]
    pub skip_if_target_codec: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write commands and failures to hevc-batch.log in the output directory
    #[serde(default = "default_true")]
    pub encode_log: bool,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./hevc")
}

fn default_quality() -> u32 {
    21
}

fn default_preset() -> String {
    "slow".to_string()
}

fn default_encoder() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            preset: default_preset(),
            encoder: default_encoder(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            mirror_structure: true,
            force_container: true,
            skip_if_output_exists: true,
            skip_if_target_codec: false,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { encode_log: true }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("hevc-batch");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default location, or create a default one if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from `path`, or create a default one there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            Ok(config)
        } else {
            let config = Config::default();

            // A read-only config dir is not fatal
            if let Err(e) = config.save_to(path) {
                tracing::warn!(error = %e, "could not create default config file");
                eprintln!(
                    "Warning: Could not create default config file. Run 'hevc-batch init-config' to create one."
                );
            }

            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// The forced backend, or `None` when detection should run
    pub fn forced_backend(&self) -> Option<EncoderBackend> {
        EncoderBackend::from_id(&self.encoding.encoder)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.encoding.quality > MAX_QUALITY {
            return Err(EngineError::InvalidConfig(format!(
                "quality must be between 0 and {}, got {}",
                MAX_QUALITY, self.encoding.quality
            )));
        }

        let preset = self.encoding.preset.to_ascii_lowercase();
        if !PRESETS.contains(&preset.as_str()) {
            return Err(EngineError::InvalidConfig(format!(
                "unknown preset '{}' (expected one of: {})",
                self.encoding.preset,
                PRESETS.join(", ")
            )));
        }

        let encoder = self.encoding.encoder.to_ascii_lowercase();
        if encoder != "auto" && EncoderBackend::from_id(&encoder).is_none() {
            let ids: Vec<&str> = EncoderBackend::ALL.iter().map(|b| b.id()).collect();
            return Err(EngineError::InvalidConfig(format!(
                "unknown encoder '{}' (expected auto, {})",
                self.encoding.encoder,
                ids.join(", ")
            )));
        }

        Ok(())
    }
}
