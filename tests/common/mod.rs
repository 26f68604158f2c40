#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use xml_to_csv::RunConfig;

/// Scratch layout: `<root>/data` for inputs, `<root>/out` for results
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        std::fs::create_dir_all(root.path().join("out")).unwrap();
        Self { root }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn write_document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("xml_to_csv_cfg");
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            data_dir: self.data_dir(),
            config_file: None,
            output_dir: self.output_dir(),
            deadline: Duration::from_secs(30),
            ..RunConfig::default()
        }
    }

    /// Result files written so far
    pub fn results(&self) -> Vec<PathBuf> {
        list_results(&self.output_dir())
    }
}

pub fn list_results(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("result_") && n.ends_with(".csv"))
        })
        .collect();
    found.sort();
    found
}

/// A customs declaration with one goods item per entry, namespaced like real exports
pub fn declaration(items: &[&[(&str, &str)]]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ESADout_CU:ESADout_CU xmlns:ESADout_CU="urn:customs.ru:Information:CustomsDocuments:ESADout_CU:5.14.3"
                       xmlns:catESAD_cu="urn:customs.ru:CUESADCommonAggregateTypesCust:5.14.3">
  <ESADout_CU:ESADout_CUGoodsShipment>
"#,
    );
    for item in items {
        xml.push_str("    <ESADout_CU:ESADout_CUGoods>\n");
        for (tag, value) in item.iter() {
            xml.push_str(&format!(
                "      <catESAD_cu:{tag}>{value}</catESAD_cu:{tag}>\n"
            ));
        }
        xml.push_str("    </ESADout_CU:ESADout_CUGoods>\n");
    }
    xml.push_str("  </ESADout_CU:ESADout_CUGoodsShipment>\n</ESADout_CU:ESADout_CU>\n");
    xml
}

/// Every row of a delimited file, header included
pub fn read_rows(path: &Path, delimiter: u8) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect()
}
