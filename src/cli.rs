use clap::Parser;
use std::path::PathBuf;

/// Directory scanned for input documents when none is given
pub const DEFAULT_DATA_DIR: &str = "data";

/// Extract repeated records from XML documents into one delimited table
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-to-csv")]
#[command(about = "Extract repeated records from XML documents into a single delimited table")]
#[command(version)]
pub struct Cli {
    /// Directory containing the XML documents
    #[arg(default_value = DEFAULT_DATA_DIR, help = "Directory with *.xml documents")]
    pub data_dir: PathBuf,

    /// Field mapping file (source=column per line)
    #[arg(help = "Field mapping file [default: xml_to_csv_cfg or .xml_to_csv_cfg]")]
    pub config_file: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["xml-to-csv"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("data"));
        assert_eq!(cli.config_file, None);
    }

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["xml-to-csv", "/tmp/in", "mapping.cfg"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/in"));
        assert_eq!(cli.config_file, Some(PathBuf::from("mapping.cfg")));
    }

    #[test]
    fn test_no_flags_accepted() {
        assert!(Cli::try_parse_from(["xml-to-csv", "--threads", "4"]).is_err());
        assert!(Cli::try_parse_from(["xml-to-csv", "a", "b", "c"]).is_err());
    }
}
