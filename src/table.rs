//! Header unification and delimited serialization.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, TimeZone};
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info};

use crate::catalog::FieldCatalog;
use crate::error::{ConvertError, Result};
use crate::extractor::Record;
use crate::platform::TranscodingWriter;

/// Field delimiter used unless configured otherwise
pub const DEFAULT_DELIMITER: u8 = b';';

/// Final output columns: catalog order first, then keys only records carry, in first-seen order
pub fn column_set(records: &[Record], catalog: &FieldCatalog) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns = Vec::new();

    let catalog_columns = catalog.columns().iter().map(String::as_str);
    let record_columns = records.iter().flat_map(|record| record.columns());

    for column in catalog_columns.chain(record_columns) {
        if seen.insert(column) {
            columns.push(column.to_string());
        }
    }
    columns
}

/// Name of the result file for a run started at `now`
pub fn output_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("result_{}.csv", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Shape of a written table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
}

/// Writes a record set as a header row plus one row per record
#[derive(Debug, Clone, Copy)]
pub struct TableWriter {
    delimiter: u8,
    encoding: &'static Encoding,
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER, UTF_8)
    }
}

impl TableWriter {
    pub fn new(delimiter: u8, encoding: &'static Encoding) -> Self {
        Self {
            delimiter,
            encoding,
        }
    }

    /// Create `path` and write the table into it.
    ///
    /// A failed row leaves the partially written file in place.
    pub fn write_file(
        &self,
        records: &[Record],
        catalog: &FieldCatalog,
        path: &Path,
    ) -> Result<TableSummary> {
        let file = File::create(path).map_err(|source| ConvertError::OutputCreation {
            path: path.to_path_buf(),
            source,
        })?;

        let summary = self.write_to(records, catalog, BufWriter::new(file))?;
        info!(
            path = %path.display(),
            rows = summary.rows,
            columns = summary.columns,
            encoding = self.encoding.name(),
            "wrote table"
        );
        Ok(summary)
    }

    /// Write the table into any sink
    pub fn write_to<W: Write>(
        &self,
        records: &[Record],
        catalog: &FieldCatalog,
        sink: W,
    ) -> Result<TableSummary> {
        let columns = column_set(records, catalog);
        debug!(columns = columns.len(), "derived column set");

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(TranscodingWriter::new(sink, self.encoding));

        writer
            .write_record(&columns)
            .map_err(ConvertError::HeaderWrite)?;

        for (index, record) in records.iter().enumerate() {
            let row = columns
                .iter()
                .map(|column| record.get(column).unwrap_or_default());
            writer
                .write_record(row)
                .map_err(|source| ConvertError::RowWrite {
                    row: index + 1,
                    source,
                })?;
        }

        let transcoder = writer
            .into_inner()
            .map_err(|e| ConvertError::Flush(e.into_error()))?;
        transcoder.finish().map_err(ConvertError::Flush)?;

        Ok(TableSummary {
            rows: records.len(),
            columns: columns.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use std::io;
    use tempfile::TempDir;

    fn catalog() -> FieldCatalog {
        FieldCatalog::from_pairs("Goods", [("Number", "num"), ("Name", "name")])
    }

    fn record(fields: &[(&str, &str)]) -> Record {
        fields.iter().copied().collect()
    }

    fn write_string(records: &[Record], catalog: &FieldCatalog) -> String {
        let mut buffer = Vec::new();
        TableWriter::default()
            .write_to(records, catalog, &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_column_set_catalog_first_then_extras() {
        let records = vec![
            record(&[("extra2", "a"), ("num", "1")]),
            record(&[("extra1", "b"), ("extra2", "c")]),
        ];
        let columns = column_set(&records, &catalog());
        assert_eq!(columns, vec!["num", "name", "extra2", "extra1"]);
    }

    #[test]
    fn test_column_set_covers_every_record_key() {
        let records = vec![record(&[("z", "1")]), record(&[("num", "2"), ("y", "3")])];
        let columns = column_set(&records, &catalog());

        for r in &records {
            for key in r.columns() {
                assert!(columns.iter().any(|c| c == key));
            }
        }
        let unique: HashSet<&String> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
    }

    #[test]
    fn test_missing_cells_are_empty() {
        let records = vec![record(&[("name", "Bolt")]), record(&[("num", "7")])];
        let output = write_string(&records, &catalog());
        assert_eq!(output, "num;name\n;Bolt\n7;\n");
    }

    #[test]
    fn test_quoting_of_special_values() {
        let records = vec![record(&[("num", "1;2"), ("name", "say \"hi\"\nbye")])];
        let output = write_string(&records, &catalog());
        assert_eq!(output, "num;name\n\"1;2\";\"say \"\"hi\"\"\nbye\"\n");
    }

    #[test]
    fn test_values_survive_a_reader() {
        let values = ["plain", "semi;colon", "quote\"inside", "multi\nline", "comma,ok", ""];
        let records: Vec<Record> = values
            .iter()
            .map(|&value| record(&[("num", "1"), ("name", value)]))
            .collect();
        let output = write_string(&records, &catalog());

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_reader(output.as_bytes());
        let read_back: Vec<String> = reader
            .records()
            .map(|row| row.unwrap()[1].to_string())
            .collect();
        assert_eq!(read_back, values);
    }

    #[test]
    fn test_legacy_encoding_output() {
        let catalog = FieldCatalog::from_pairs("Goods", [("Name", "Название")]);
        let records = vec![record(&[("Название", "Болт")])];
        let mut buffer = Vec::new();
        TableWriter::new(b';', encoding_rs::WINDOWS_1251)
            .write_to(&records, &catalog, &mut buffer)
            .unwrap();

        let (decoded, _, had_errors) = encoding_rs::WINDOWS_1251.decode(&buffer);
        assert!(!had_errors);
        assert_eq!(decoded, "Название\nБолт\n");
        assert!(std::str::from_utf8(&buffer).is_err());
    }

    #[test]
    fn test_output_creation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("result.csv");
        let result = TableWriter::default().write_file(&[], &catalog(), &path);
        assert!(matches!(result, Err(ConvertError::OutputCreation { .. })));
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_surfaces() {
        let records = vec![record(&[("num", "1")])];
        let result = TableWriter::default().write_to(&records, &catalog(), FailingSink);
        assert!(matches!(
            result,
            Err(ConvertError::HeaderWrite(_) | ConvertError::RowWrite { .. } | ConvertError::Flush(_))
        ));
    }

    #[test]
    fn test_output_file_name_format() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 3)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap();
        assert_eq!(output_file_name(&now), "result_2024-03-09_07-05-03.csv");
    }
}
