use std::path::PathBuf;

use thiserror::Error;

/// Main application error type that encompasses all terminal failure modes
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input discovery failed: {path} - {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output file: {path} - {source}")]
    OutputCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write header row: {0}")]
    HeaderWrite(#[source] csv::Error),

    #[error("Failed to write row {row}: {source}")]
    RowWrite {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to flush output: {0}")]
    Flush(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

impl ConvertError {
    /// Process exit code for this failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Discovery { .. } => 2,
            ConvertError::OutputCreation { .. } => 3,
            ConvertError::HeaderWrite(_) | ConvertError::RowWrite { .. } | ConvertError::Flush(_) => 4,
            ConvertError::Config(_) => 5,
            ConvertError::Concurrency { .. } => 6,
        }
    }
}

/// Per-file extraction failures. These never leave the task that produced them.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Cannot read {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed XML in {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// Field-mapping configuration file errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<CatalogError> for ConvertError {
    fn from(err: CatalogError) -> Self {
        ConvertError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Extraction result type alias
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let discovery = ConvertError::Discovery {
            path: PathBuf::from("data"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let creation = ConvertError::OutputCreation {
            path: PathBuf::from("result.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let config = ConvertError::Config("bad delimiter".to_string());
        let concurrency = ConvertError::Concurrency {
            details: "join".to_string(),
        };

        let codes = [
            discovery.exit_code(),
            creation.exit_code(),
            config.exit_code(),
            concurrency.exit_code(),
        ];
        assert_eq!(codes, [2, 3, 5, 6]);
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_display_includes_path() {
        let error = ConvertError::OutputCreation {
            path: PathBuf::from("/readonly/result.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = error.to_string();
        assert!(display.contains("Cannot create output file"));
        assert!(display.contains("result.csv"));
    }

    #[test]
    fn test_error_source_chain() {
        let error = ConvertError::Discovery {
            path: PathBuf::from("data"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "File not found"),
        };

        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "File not found");
    }

    #[test]
    fn test_catalog_error_conversion() {
        let catalog_error = CatalogError::Read {
            path: PathBuf::from("xml_to_csv_cfg"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not utf-8"),
        };
        let error: ConvertError = catalog_error.into();

        match error {
            ConvertError::Config(message) => assert!(message.contains("xml_to_csv_cfg")),
            _ => panic!("Expected ConvertError::Config"),
        }
    }
}
