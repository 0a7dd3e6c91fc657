use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// Weekday buckets in canonical order, Monday first.
pub const CANONICAL_WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Uploaded table before any validation: a header row plus string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `(row, col)`; ragged rows yield `None` for missing trailing cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One validated row with its derived calendar fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub ds: NaiveDateTime,
    pub value: f64,
    pub month: u32,
    pub weekday: Weekday,
    pub year: i32,
    /// Present categorical values keyed by internal field name.
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn attribute(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).map(|s| s.as_str())
    }

    pub fn date(&self) -> NaiveDate {
        self.ds.date()
    }
}

/// Records that survived normalization, in original row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub records: Vec<Record>,
}

impl NormalizedSeries {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }

    /// Two-column `(date, value)` projection handed to a forecaster.
    pub fn history(&self) -> Vec<(NaiveDate, f64)> {
        self.records.iter().map(|r| (r.date(), r.value)).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date()).max()
    }
}

/// Categorical equality constraints combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    constraints: BTreeMap<String, String>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `field` to `value`; `None` clears any constraint on it.
    pub fn with(mut self, field: &str, value: Option<&str>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.constraints.insert(field.to_string(), v.to_string());
            }
            None => {
                self.constraints.remove(field);
            }
        }
    }

    pub fn constraint(&self, field: &str) -> Option<&str> {
        self.constraints.get(field).map(|s| s.as_str())
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.constraints
            .iter()
            .all(|(field, wanted)| record.attribute(field) == Some(wanted.as_str()))
    }
}

/// Mean value per observed month (1..=12). Absent months have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub means: BTreeMap<u32, f64>,
}

impl MonthlySummary {
    pub fn get(&self, month: u32) -> Option<f64> {
        self.means.get(&month).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }
}

/// Mean value per weekday, always seven buckets Monday through Sunday.
/// `None` marks a weekday with no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdaySummary {
    pub buckets: Vec<(Weekday, Option<f64>)>,
}

impl Default for WeekdaySummary {
    fn default() -> Self {
        Self {
            buckets: CANONICAL_WEEK.iter().map(|d| (*d, None)).collect(),
        }
    }
}

impl WeekdaySummary {
    pub fn get(&self, day: Weekday) -> Option<f64> {
        self.buckets
            .iter()
            .find(|(d, _)| *d == day)
            .and_then(|(_, v)| *v)
    }

    pub fn has_data(&self) -> bool {
        self.buckets.iter().any(|(_, v)| v.is_some())
    }
}

/// One future (or fitted) period produced by an external forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(with = "ymd")]
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastTable {
    pub points: Vec<ForecastPoint>,
}

/// The two message strings handed to the commentary service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPayload {
    system: String,
    user: String,
}

impl ReportPayload {
    pub fn new(system: String, user: String) -> Self {
        Self { system, user }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

mod ymd {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        crate::util::parse_timestamp_safe(Some(&raw))
            .map(|dt| dt.date())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
    }
}

// Display rows, pre-formatted for table previews and CSV exports.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "AvgValue")]
    #[tabled(rename = "AvgValue")]
    pub avg_value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WeekdayRow {
    #[serde(rename = "Weekday")]
    #[tabled(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "AvgValue")]
    #[tabled(rename = "AvgValue")]
    pub avg_value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TimelineRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StatRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Statistic")]
    #[tabled(rename = "Statistic")]
    pub statistic: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PreviewRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Weekday")]
    #[tabled(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Attributes")]
    #[tabled(rename = "Attributes")]
    pub attributes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, attrs: &[(&str, &str)]) -> Record {
        let ds = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Record {
            ds,
            value: 10.0,
            month: 1,
            weekday: Weekday::Mon,
            year: 2024,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_raw_table_trims_headers_and_handles_ragged_rows() {
        let table = RawTable::new(
            vec![" Date ".to_string(), "Revenue".to_string()],
            vec![vec!["2024-01-01".to_string()]],
        );
        assert_eq!(table.column_index("Date"), Some(0));
        assert_eq!(table.cell(0, 0), Some("2024-01-01"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(3, 0), None);
    }

    #[test]
    fn test_filter_selection_set_and_clear() {
        let mut sel = FilterSelection::new().with("sede", Some("Norte"));
        assert_eq!(sel.constraint("sede"), Some("Norte"));
        sel.set("sede", None);
        assert!(sel.is_unconstrained());
    }

    #[test]
    fn test_filter_selection_requires_all_constraints() {
        let sel = FilterSelection::new()
            .with("sede", Some("Norte"))
            .with("manicurista", Some("Ana"));
        assert!(sel.matches(&record(1, &[("sede", "Norte"), ("manicurista", "Ana")])));
        assert!(!sel.matches(&record(1, &[("sede", "Norte"), ("manicurista", "Eva")])));
        assert!(!sel.matches(&record(1, &[("sede", "Norte")])));
    }

    #[test]
    fn test_weekday_summary_default_is_seven_empty_buckets() {
        let summary = WeekdaySummary::default();
        assert_eq!(summary.buckets.len(), 7);
        assert_eq!(summary.buckets[0].0, Weekday::Mon);
        assert_eq!(summary.buckets[6].0, Weekday::Sun);
        assert!(!summary.has_data());
    }

    #[test]
    fn test_series_last_date() {
        let series = NormalizedSeries::new(vec![record(9, &[]), record(3, &[])]);
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 9));
        assert_eq!(series.history().len(), 2);
    }

    #[test]
    fn test_forecast_point_serializes_plain_date() {
        let point = ForecastPoint {
            ds: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            yhat: 1.5,
            yhat_lower: 1.0,
            yhat_upper: 2.0,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("\"ds\":\"2024-03-01\""));
    }
}
