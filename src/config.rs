use crate::aggregator::{AggregatorConfig, DEFAULT_DEADLINE};
use crate::cli::Cli;
use crate::error::{ConvertError, Result};
use crate::platform::{PlatformPolicy, encoding_for_label};
use crate::table::DEFAULT_DELIMITER;
use encoding_rs::Encoding;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mapping file names looked up when none is given, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["xml_to_csv_cfg", ".xml_to_csv_cfg"];

/// Per-user configuration directory name
pub const APP_DIR_NAME: &str = "xml-to-csv";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvProvider for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Everything one run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Directory scanned for input documents
    pub data_dir: PathBuf,
    /// Field mapping file, if one was given or found
    pub config_file: Option<PathBuf>,
    /// Directory the result file is created in
    pub output_dir: PathBuf,
    /// Output field delimiter
    pub delimiter: u8,
    /// Extraction deadline
    pub deadline: Duration,
    /// Maximum documents extracted at once
    pub max_concurrent_extractions: usize,
    /// Output encoding override; the platform policy decides when unset
    pub encoding: Option<&'static Encoding>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::cli::DEFAULT_DATA_DIR),
            config_file: None,
            output_dir: PathBuf::from("."),
            delimiter: DEFAULT_DELIMITER,
            deadline: DEFAULT_DEADLINE,
            max_concurrent_extractions: num_cpus::get(),
            encoding: None,
        }
    }
}

impl RunConfig {
    /// Build the run configuration with precedence: defaults -> environment -> CLI
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with(cli, &SystemEnvProvider, &Self::default_search_dirs())
    }

    /// Build the run configuration with a custom environment and mapping-file search path
    pub fn load_with(cli: &Cli, env: &impl EnvProvider, search_dirs: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default().apply_environment_overrides_with(env)?;

        config.data_dir = cli.data_dir.clone();
        config.config_file = match &cli.config_file {
            Some(path) => Some(path.clone()),
            None => Self::find_config_file(search_dirs),
        };

        Ok(config)
    }

    /// Working directory first, then the per-user configuration directory
    pub fn default_search_dirs() -> Vec<PathBuf> {
        let mut search = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search.push(config_dir.join(APP_DIR_NAME));
        }
        search
    }

    /// First existing mapping file in the search directories
    pub fn find_config_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
        search_dirs
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file())
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(mut self, env: &impl EnvProvider) -> Result<Self> {
        if let Some(timeout) = env.get("XML_TO_CSV_TIMEOUT_SECS") {
            let seconds: u64 = timeout
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    ConvertError::Config(format!(
                        "Invalid XML_TO_CSV_TIMEOUT_SECS value: {}",
                        timeout
                    ))
                })?;
            self.deadline = Duration::from_secs(seconds);
        }

        if let Some(delimiter) = env.get("XML_TO_CSV_DELIMITER") {
            self.delimiter = parse_delimiter(&delimiter).ok_or_else(|| {
                ConvertError::Config(format!(
                    "Invalid XML_TO_CSV_DELIMITER value: {:?}",
                    delimiter
                ))
            })?;
        }

        if let Some(label) = env.get("XML_TO_CSV_ENCODING") {
            self.encoding = Some(encoding_for_label(&label).ok_or_else(|| {
                ConvertError::Config(format!("Unknown XML_TO_CSV_ENCODING value: {}", label))
            })?);
        }

        if let Some(output_dir) = env.get("XML_TO_CSV_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(output_dir);
        }

        if let Some(threads) = env.get("XML_TO_CSV_THREADS") {
            self.max_concurrent_extractions = threads
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConvertError::Config(format!("Invalid XML_TO_CSV_THREADS value: {}", threads))
                })?;
        }

        Ok(self)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            deadline: self.deadline,
            max_concurrent_extractions: self.max_concurrent_extractions,
        }
    }

    /// Configured encoding, or the one the platform policy prefers
    pub fn output_encoding(&self, policy: &dyn PlatformPolicy) -> &'static Encoding {
        self.encoding.unwrap_or_else(|| policy.output_encoding())
    }

    /// Mapping file to load, if any
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

/// A delimiter is one ASCII character other than a quote or line break; `\t` means tab
fn parse_delimiter(value: &str) -> Option<u8> {
    if value == "\\t" {
        return Some(b'\t');
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() && !matches!(*byte, b'"' | b'\n' | b'\r') => Some(*byte),
        _ => None,
    }
}
