use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::*;
use crate::core::labeler::{KeylessFirstLine, LabelMode};
use crate::core::patterns::FieldKind;
use crate::errors::{Result, SiftError};
use crate::utils::system::available_memory_bytes;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub processing: ProcessingConfig,
    pub classification: ClassificationConfig,
    pub output: OutputConfig,
    pub finalize: FinalizeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Reference scan workers; 0 uses every core.
    pub threads: usize,
    /// Input bytes labeled and classified at a time; 0 derives it from available memory.
    pub chunk_size_mb: usize,
    pub io_buffer_size_kb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub key_field: FieldKind,
    pub case_insensitive: bool,
    /// Unset picks raw rows for text output and labeled records for tabular output.
    pub label_mode: Option<LabelMode>,
    pub keyless_first_line: KeylessFirstLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Tabular,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub results_directory: PathBuf,
    pub tabular_file: String,
    pub censor_secrets: bool,
    pub clean_results: bool,
    pub retain_keyless_lines: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    pub chunk_size_mb: usize,
    pub temp_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbosity: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            key_field: FieldKind::Identifier,
            case_insensitive: false,
            label_mode: None,
            keyless_first_line: KeylessFirstLine::Ask,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            results_directory: PathBuf::from(DEFAULT_RESULTS_DIRECTORY),
            tabular_file: DEFAULT_TABULAR_FILE.to_string(),
            censor_secrets: false,
            clean_results: true,
            retain_keyless_lines: false,
        }
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: DEFAULT_FINALIZE_CHUNK_SIZE_MB,
            temp_directory: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: "normal".to_string(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("txt"),
            OutputFormat::Tabular => f.write_str("csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            ".txt" | "txt" | "text" => Ok(OutputFormat::Text),
            ".csv" | "csv" | "tabular" => Ok(OutputFormat::Tabular),
            other => Err(SiftError::Config(format!(
                "unknown output format '{}': expected txt or csv",
                other
            ))),
        }
    }
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.processing.threads > MAX_PROCESSING_THREADS {
            return Err(SiftError::Config(format!(
                "processing.threads must be at most {}",
                MAX_PROCESSING_THREADS
            )));
        }

        let chunk_mb = self.processing.chunk_size_mb;
        if chunk_mb != 0 && !(MIN_CHUNK_SIZE_MB..=MAX_CHUNK_SIZE_MB).contains(&chunk_mb) {
            return Err(SiftError::Config(format!(
                "processing.chunk_size_mb must be 0 or between {} and {}",
                MIN_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB
            )));
        }

        if !(MIN_CHUNK_SIZE_MB..=MAX_CHUNK_SIZE_MB).contains(&self.finalize.chunk_size_mb) {
            return Err(SiftError::Config(format!(
                "finalize.chunk_size_mb must be between {} and {}",
                MIN_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB
            )));
        }

        if self.processing.io_buffer_size_kb == 0 {
            return Err(SiftError::Config("processing.io_buffer_size_kb must be positive".into()));
        }

        if !self.classification.key_field.can_be_key() {
            return Err(SiftError::InvalidKeyField(self.classification.key_field.to_string()));
        }

        if self.output.format == OutputFormat::Tabular && self.output.tabular_file.trim().is_empty() {
            return Err(SiftError::Config("output.tabular_file must not be empty".into()));
        }

        if !matches!(self.logging.verbosity.as_str(), "silent" | "normal" | "verbose") {
            return Err(SiftError::Config(format!(
                "logging.verbosity must be silent, normal or verbose, got '{}'",
                self.logging.verbosity
            )));
        }

        Ok(())
    }

    pub fn threads(&self) -> usize {
        if self.processing.threads > 0 {
            return self.processing.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Explicit chunk size, or a share of the currently available memory.
    pub fn chunk_size_bytes(&self) -> usize {
        if self.processing.chunk_size_mb > 0 {
            return self.processing.chunk_size_mb * BYTES_PER_MB;
        }

        let available = available_memory_bytes() as f64;
        let derived_mb = (available * AUTO_CHUNK_MEMORY_PERCENT / PERCENT_100) as usize / BYTES_PER_MB;
        derived_mb.clamp(MIN_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB) * BYTES_PER_MB
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.processing.io_buffer_size_kb * BYTES_PER_KB
    }

    pub fn finalize_chunk_size_bytes(&self) -> usize {
        self.finalize.chunk_size_mb * BYTES_PER_MB
    }

    pub fn finalize_temp_directory(&self) -> PathBuf {
        self.finalize
            .temp_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn label_mode(&self) -> LabelMode {
        self.classification.label_mode.unwrap_or(match self.output.format {
            OutputFormat::Text => LabelMode::Raw,
            OutputFormat::Tabular => LabelMode::Labeled,
        })
    }

    pub fn tabular_path(&self) -> PathBuf {
        self.output.results_directory.join(&self.output.tabular_file)
    }
}
