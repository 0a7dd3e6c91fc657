use crate::config::ColumnMapping;
use crate::error::{PipelineError, Result};
use crate::types::{NormalizedSeries, RawTable, Record};
use crate::util::{clean_label, parse_f64_with, parse_timestamp_safe};
use chrono::Datelike;
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub invalid_timestamps: usize,
    pub missing_values: usize,
}

impl LoadReport {
    pub fn dropped_rows(&self) -> usize {
        self.invalid_timestamps + self.missing_values
    }
}

/// Column positions resolved against a table's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub timestamp: usize,
    pub value: usize,
    /// `(field, position)`; optional columns absent from the upload are skipped.
    pub categorical: Vec<(String, usize)>,
}

pub fn read_table(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).map_err(|source| PipelineError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    read_table_from_reader(file)
}

/// Read a CSV export. Ragged rows are kept as-is; a row the CSV layer cannot
/// decode is kept as an empty row so normalization accounts for it.
pub fn read_table_from_reader<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(|c| c.to_string()).collect()),
            Err(e) => {
                debug!("Row {} could not be decoded: {}", idx + 1, e);
                rows.push(Vec::new());
            }
        }
    }
    Ok(RawTable::new(headers, rows))
}

/// Fail with [`PipelineError::Schema`] unless both required columns exist.
pub fn check_schema(table: &RawTable, mapping: &ColumnMapping) -> Result<ResolvedColumns> {
    let timestamp = table.column_index(&mapping.timestamp);
    let value = table.column_index(&mapping.value);

    let (timestamp, value) = match (timestamp, value) {
        (Some(t), Some(v)) => (t, v),
        (t, v) => {
            let mut missing = Vec::new();
            if t.is_none() {
                missing.push(mapping.timestamp.clone());
            }
            if v.is_none() {
                missing.push(mapping.value.clone());
            }
            return Err(PipelineError::Schema { missing });
        }
    };

    let categorical = mapping
        .categorical
        .iter()
        .filter_map(|c| table.column_index(&c.source).map(|idx| (c.field.clone(), idx)))
        .collect();

    Ok(ResolvedColumns {
        timestamp,
        value,
        categorical,
    })
}

/// Validate, coerce and enrich every row. Rows with an unparseable timestamp
/// or a missing value are dropped and counted; order is preserved.
pub fn normalize(table: &RawTable, mapping: &ColumnMapping) -> Result<(NormalizedSeries, LoadReport)> {
    let cols = check_schema(table, mapping)?;
    let mut report = LoadReport {
        total_rows: table.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let ds = match parse_timestamp_safe(table.cell(row, cols.timestamp)) {
            Some(ds) => ds,
            None => {
                debug!("Row {} dropped: invalid timestamp", row + 1);
                report.invalid_timestamps += 1;
                continue;
            }
        };
        let cell = table.cell(row, cols.value);
        let value = match parse_f64_with(cell, mapping.decimal_separator) {
            Some(v) => v,
            None => {
                debug!("Row {} dropped: missing value", row + 1);
                report.missing_values += 1;
                continue;
            }
        };

        let attributes: BTreeMap<String, String> = cols
            .categorical
            .iter()
            .filter_map(|(field, idx)| clean_label(table.cell(row, *idx)).map(|v| (field.clone(), v)))
            .collect();

        records.push(Record {
            ds,
            value,
            month: ds.month(),
            weekday: ds.weekday(),
            year: ds.year(),
            attributes,
        });
    }

    report.kept_rows = records.len();
    info!(
        "Normalized {} of {} rows ({} invalid timestamps, {} missing values)",
        report.kept_rows, report.total_rows, report.invalid_timestamps, report.missing_values
    );
    Ok((NormalizedSeries::new(records), report))
}

pub fn load_and_clean(path: &Path, mapping: &ColumnMapping) -> Result<(NormalizedSeries, LoadReport)> {
    let table = read_table(path)?;
    normalize(&table, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn revenue_mapping() -> ColumnMapping {
        ColumnMapping::new("Date", "Revenue").with_categorical("Location", "location")
    }

    fn table(csv_text: &str) -> RawTable {
        read_table_from_reader(csv_text.as_bytes()).unwrap()
    }

    #[test]
    fn test_normalize_drops_invalid_rows() {
        let t = table(
            "Date,Revenue\n2024-01-05,100\n2024-01-12,200\n2024-02-03,NaN\nbad-date,50\n",
        );
        let (series, report) = normalize(&t, &revenue_mapping()).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.invalid_timestamps, 1);
        assert_eq!(report.missing_values, 1);
        assert_eq!(series.len(), report.total_rows - report.dropped_rows());
        assert_eq!(series.records[0].value, 100.0);
        assert_eq!(series.records[1].value, 200.0);
    }

    #[test]
    fn test_normalize_derives_calendar_fields() {
        let t = table("Date,Revenue\n2024-01-05,100\n");
        let (series, _) = normalize(&t, &revenue_mapping()).unwrap();
        let r = &series.records[0];
        assert_eq!(r.month, 1);
        assert_eq!(r.weekday, Weekday::Fri);
        assert_eq!(r.year, 2024);
    }

    #[test]
    fn test_normalize_keeps_rows_missing_optional_fields() {
        let t = table("Date,Revenue,Location\n2024-01-05,100,\n2024-01-06,50,Norte\n2024-01-07,75\n");
        let (series, report) = normalize(&t, &revenue_mapping()).unwrap();
        assert_eq!(report.kept_rows, 3);
        assert_eq!(series.records[0].attribute("location"), None);
        assert_eq!(series.records[1].attribute("location"), Some("Norte"));
        assert_eq!(series.records[2].attribute("location"), None);
    }

    #[test]
    fn test_normalize_without_optional_column_in_upload() {
        let t = table("Date,Revenue\n2024-01-05,100\n");
        let (series, _) = normalize(&t, &revenue_mapping()).unwrap();
        assert!(series.records[0].attributes.is_empty());
    }

    #[test]
    fn test_missing_value_column_is_schema_error() {
        let t = table("Date,Amount\n2024-01-05,100\n");
        let err = normalize(&t, &revenue_mapping()).unwrap_err();
        match err {
            PipelineError::Schema { missing } => assert_eq!(missing, vec!["Revenue".to_string()]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_both_columns_lists_both() {
        let t = table("When,Amount\n2024-01-05,100\n");
        let err = check_schema(&t, &revenue_mapping()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { ref missing } if missing.len() == 2));
    }

    #[test]
    fn test_headers_are_trimmed() {
        let t = table(" Date , Revenue \n2024-01-05,100\n");
        let cols = check_schema(&t, &revenue_mapping()).unwrap();
        assert_eq!((cols.timestamp, cols.value), (0, 1));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let t = table("Date,Revenue,Location\n2024-03-01,10,A\n2024-01-01,20,B\nx,1,C\n");
        let first = normalize(&t, &revenue_mapping()).unwrap();
        let second = normalize(&t, &revenue_mapping()).unwrap();
        assert_eq!(first, second);
        // Original row order, not date order.
        assert_eq!(first.0.records[0].month, 3);
    }

    #[test]
    fn test_services_headers() {
        let t = table(
            "FECHA,VALOR SERVICIO ($),SEDE,MANICURISTA\n2024-05-04,\"$45,000\",Norte,Ana\n",
        );
        let mapping = crate::config::AnalysisProfile::preset("services").unwrap().mapping;
        let (series, _) = normalize(&t, &mapping).unwrap();
        assert_eq!(series.records[0].value, 45000.0);
        assert_eq!(series.records[0].attribute("sede"), Some("Norte"));
        assert_eq!(series.records[0].attribute("manicurista"), Some("Ana"));
    }

    #[test]
    fn test_normalize_keeps_spreadsheet_timestamp_shapes() {
        let t = table(
            "Date,Revenue\n2024-01-05 14:30,10\n2024-01-05 14:30:00.250,20\n05/01/2024 14:30:00,30\n",
        );
        let (series, report) = normalize(&t, &revenue_mapping()).unwrap();
        assert_eq!(report.invalid_timestamps, 0);
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|r| r.weekday == Weekday::Fri));
    }

    #[test]
    fn test_normalize_keeps_scientific_notation_values() {
        let t = table("Date,Revenue\n2024-01-05,1.5E+04\n2024-01-06,2.5e3\n");
        let (series, report) = normalize(&t, &revenue_mapping()).unwrap();
        assert_eq!(report.missing_values, 0);
        assert_eq!(series.values(), vec![15000.0, 2500.0]);
    }

    #[test]
    fn test_normalize_with_decimal_comma_mapping() {
        let t = table("FECHA,VALOR\n2024-05-04,45.000\n2024-05-05,\"1.234,50\"\n");
        let mapping = ColumnMapping::new("FECHA", "VALOR")
            .with_decimal_separator(crate::util::DecimalSeparator::Comma);
        let (series, _) = normalize(&t, &mapping).unwrap();
        assert_eq!(series.values(), vec![45000.0, 1234.5]);
    }

    #[test]
    fn test_load_and_clean_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Revenue").unwrap();
        writeln!(file, "2024-01-05,100").unwrap();
        writeln!(file, "2024-01-06,").unwrap();
        let (series, report) = load_and_clean(file.path(), &revenue_mapping()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(report.missing_values, 1);
    }

    #[test]
    fn test_read_table_missing_file() {
        let err = read_table(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::FileRead { .. }));
    }
}
