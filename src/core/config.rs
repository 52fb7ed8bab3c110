use crate::core::errors::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Tiling configuration
#[derive(Debug, Clone)]
pub struct TilingConfig {
    pub tile_size: u32,
    pub overlap: u32,
    /// Add a clamped tile per row/column when a trailing strip would be dropped
    pub cover_trailing_edges: bool,
}

/// Duplicate merging configuration
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub iou_threshold: f32,
}

/// OCR collaborator configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub endpoint: String,
    pub language: String,
    pub timeout: Duration,
    pub max_concurrent_tiles: usize,
}

/// How the wait between failed translation attempts evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

impl FromStr for RetryStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(RetryStrategy::Fixed),
            "exponential" | "exp" => Ok(RetryStrategy::Exponential),
            _ => Err(()),
        }
    }
}

/// Translation collaborator and orchestration configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub batch_delay: Duration,
    pub retry_strategy: RetryStrategy,
    pub call_timeout: Duration,
    pub max_concurrent: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: Level,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tiling: TilingConfig,
    pub dedup: DedupConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
    pub logging: LoggingConfig,
}

/// Values supplied on the command line; `None` keeps the loaded value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub tile_size: Option<u32>,
    pub overlap: Option<u32>,
    pub cover_trailing_edges: bool,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub verbose: bool,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `.env` and the environment without validating.
    ///
    /// Callers that apply overrides validate afterwards.
    pub fn load_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::load(&|key: &str| env::var(key).ok())
    }

    /// Load and validate from an arbitrary key lookup (environment, map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::load(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line values, then validate the result.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(tile_size) = overrides.tile_size {
            self.tiling.tile_size = tile_size;
        }
        if let Some(overlap) = overrides.overlap {
            self.tiling.overlap = overlap;
        }
        if overrides.cover_trailing_edges {
            self.tiling.cover_trailing_edges = true;
        }
        if let Some(ref lang) = overrides.source_lang {
            self.translation.source_lang = lang.clone();
        }
        if let Some(ref lang) = overrides.target_lang {
            self.translation.target_lang = lang.clone();
        }
        if overrides.verbose {
            self.logging.log_level = Level::DEBUG;
        }

        self.validate()
    }

    fn load<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = match lookup("LOG_LEVEL") {
            Some(raw) => parse_level(&raw).ok_or(ConfigError::EnvVarError {
                key: "LOG_LEVEL".to_string(),
                value: raw,
            })?,
            None => Level::INFO,
        };

        let retry_strategy = parse_or(lookup, "RETRY_STRATEGY", RetryStrategy::Fixed)?;
        let default_tile_workers = std::cmp::max(num_cpus::get() / 2, 1);

        Ok(Self {
            tiling: TilingConfig {
                tile_size: parse_or(lookup, "TILE_SIZE", 512)?,
                overlap: parse_or(lookup, "TILE_OVERLAP", 64)?,
                cover_trailing_edges: parse_or(lookup, "COVER_TRAILING_EDGES", false)?,
            },
            dedup: DedupConfig {
                iou_threshold: parse_or(lookup, "DEDUP_IOU_THRESHOLD", 0.5)?,
            },
            ocr: OcrConfig {
                endpoint: lookup("OCR_ENDPOINT")
                    .unwrap_or_else(|| "http://127.0.0.1:8866/predict/ocr_system".to_string()),
                language: lookup("OCR_LANGUAGE").unwrap_or_else(|| "korean".to_string()),
                timeout: seconds_or(lookup, "OCR_TIMEOUT_SECONDS", 60.0)?,
                max_concurrent_tiles: parse_or(lookup, "MAX_CONCURRENT_TILES", default_tile_workers)?,
            },
            translation: TranslationConfig {
                endpoint: lookup("TRANSLATION_ENDPOINT")
                    .unwrap_or_else(|| "http://127.0.0.1:5000/translate".to_string()),
                api_key: lookup("TRANSLATION_API_KEY")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                source_lang: lookup("SOURCE_LANG").unwrap_or_else(|| "ko".to_string()),
                target_lang: lookup("TARGET_LANG").unwrap_or_else(|| "en".to_string()),
                batch_size: parse_or(lookup, "TRANSLATION_BATCH_SIZE", 10)?,
                max_retries: parse_or(lookup, "MAX_RETRIES", 3)?,
                retry_delay: seconds_or(lookup, "RETRY_DELAY_SECONDS", 1.0)?,
                batch_delay: seconds_or(lookup, "BATCH_DELAY_SECONDS", 1.0)?,
                retry_strategy,
                call_timeout: seconds_or(lookup, "TRANSLATION_TIMEOUT_SECONDS", 30.0)?,
                max_concurrent: parse_or(lookup, "MAX_CONCURRENT_TRANSLATIONS", 4)?,
            },
            logging: LoggingConfig { log_level },
        })
    }

    /// Check every run-level parameter. Called again after CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiling = &self.tiling;
        if tiling.tile_size == 0 || tiling.tile_size <= tiling.overlap {
            return Err(ConfigError::InvalidTileGeometry {
                tile_size: tiling.tile_size,
                overlap: tiling.overlap,
            });
        }

        if !(0.0..=1.0).contains(&self.dedup.iou_threshold) {
            return Err(ConfigError::InvalidIoUThreshold(self.dedup.iou_threshold));
        }

        if self.ocr.max_concurrent_tiles == 0 {
            return Err(ConfigError::InvalidConcurrency("tile recognition"));
        }

        let translation = &self.translation;
        if translation.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(translation.batch_size));
        }
        if translation.max_retries == 0 {
            return Err(ConfigError::InvalidRetryCount(translation.max_retries));
        }
        if translation.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency("translation"));
        }
        if translation.source_lang.trim().is_empty() || translation.target_lang.trim().is_empty() {
            return Err(ConfigError::InvalidTranslationConfig(
                "source and target language codes must not be empty".to_string(),
            ));
        }
        if translation.call_timeout.is_zero() {
            return Err(ConfigError::InvalidTranslationConfig(
                "translation timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn tile_size(&self) -> u32 {
        self.tiling.tile_size
    }

    pub fn overlap(&self) -> u32 {
        self.tiling.overlap
    }

    pub fn iou_threshold(&self) -> f32 {
        self.dedup.iou_threshold
    }

    pub fn log_level(&self) -> Level {
        self.logging.log_level
    }

    pub fn source_lang(&self) -> &str {
        &self.translation.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.translation.target_lang
    }
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::EnvVarError {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn seconds_or<F>(lookup: &F, key: &str, default: f64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_or(lookup, key, default)?;
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::EnvVarError {
        key: key.to_string(),
        value: secs.to_string(),
    })
}
