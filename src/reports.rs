use crate::types::{
    MonthRow, MonthlySummary, NormalizedSeries, PreviewRow, StatRow, TimelineRow, WeekdayRow,
    WeekdaySummary, CANONICAL_WEEK,
};
use crate::util::{format_int, format_number, mean, quantile_sorted, sample_std, weekday_name};
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Placeholder rendered for a weekday bucket without records.
pub const NO_DATA: &str = "no data";

/// Mean value per observed month. Months without records are omitted.
pub fn monthly_means(series: &NormalizedSeries) -> MonthlySummary {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for r in series.iter() {
        groups.entry(r.month).or_default().push(r.value);
    }
    let means = groups
        .into_iter()
        .filter_map(|(month, values)| mean(&values).map(|m| (month, m)))
        .collect();
    MonthlySummary { means }
}

/// Mean value per weekday, reindexed Monday through Sunday.
pub fn weekday_means(series: &NormalizedSeries) -> WeekdaySummary {
    let mut groups: HashMap<Weekday, Vec<f64>> = HashMap::new();
    for r in series.iter() {
        groups.entry(r.weekday).or_default().push(r.value);
    }
    let buckets = CANONICAL_WEEK
        .iter()
        .map(|day| (*day, groups.get(day).and_then(|v| mean(v))))
        .collect();
    WeekdaySummary { buckets }
}

/// Total value per calendar day, ascending by date.
pub fn daily_timeline(series: &NormalizedSeries) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in series.iter() {
        *days.entry(r.date()).or_insert(0.0) += r.value;
    }
    days.into_iter().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimestampStats {
    pub count: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub field: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: usize,
}

/// Column-wise descriptive statistics of one (possibly filtered) view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub value: ValueStats,
    pub timestamp: TimestampStats,
    pub categories: Vec<CategoryStats>,
}

pub fn describe(series: &NormalizedSeries, fields: &[&str]) -> DescriptiveStats {
    let mut sorted = series.values();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let value = ValueStats {
        count: sorted.len(),
        mean: mean(&series.values()),
        std: sample_std(&series.values()),
        min: sorted.first().copied(),
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted.last().copied(),
    };

    let timestamp = TimestampStats {
        count: series.len(),
        first: series.iter().map(|r| r.ds).min(),
        last: series.iter().map(|r| r.ds).max(),
    };

    let categories = fields
        .iter()
        .map(|field| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for v in series.iter().filter_map(|r| r.attribute(field)) {
                *counts.entry(v).or_insert(0) += 1;
            }
            // BTreeMap iterates ascending, so the first maximum is the
            // smallest label among ties.
            let top = counts
                .iter()
                .fold(None::<(&str, usize)>, |best, (k, c)| match best {
                    Some((_, bc)) if bc >= *c => best,
                    _ => Some((*k, *c)),
                });
            CategoryStats {
                field: field.to_string(),
                count: counts.values().sum(),
                unique: counts.len(),
                top: top.map(|(k, _)| k.to_string()),
                freq: top.map(|(_, c)| c).unwrap_or(0),
            }
        })
        .collect();

    DescriptiveStats {
        value,
        timestamp,
        categories,
    }
}

/// Everything derived from one filtered view, recomputed per filter change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeasonalReport {
    pub monthly: MonthlySummary,
    pub weekday: WeekdaySummary,
    pub timeline: Vec<(NaiveDate, f64)>,
    pub stats: DescriptiveStats,
}

pub fn summarize(series: &NormalizedSeries, fields: &[&str]) -> SeasonalReport {
    SeasonalReport {
        monthly: monthly_means(series),
        weekday: weekday_means(series),
        timeline: daily_timeline(series),
        stats: describe(series, fields),
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format_number(x, 2))
        .unwrap_or_else(|| NO_DATA.to_string())
}

pub fn month_rows(summary: &MonthlySummary) -> Vec<MonthRow> {
    summary
        .means
        .iter()
        .map(|(month, avg)| MonthRow {
            month: *month,
            avg_value: format_number(*avg, 2),
        })
        .collect()
}

pub fn weekday_rows(summary: &WeekdaySummary) -> Vec<WeekdayRow> {
    summary
        .buckets
        .iter()
        .map(|(day, avg)| WeekdayRow {
            weekday: weekday_name(*day).to_string(),
            avg_value: fmt_opt(*avg),
        })
        .collect()
}

pub fn timeline_rows(timeline: &[(NaiveDate, f64)]) -> Vec<TimelineRow> {
    timeline
        .iter()
        .map(|(date, total)| TimelineRow {
            date: date.format("%Y-%m-%d").to_string(),
            total: format_number(*total, 2),
        })
        .collect()
}

/// First `limit` records as display rows, for a data preview.
pub fn preview_rows(series: &NormalizedSeries, limit: usize) -> Vec<PreviewRow> {
    series
        .iter()
        .take(limit)
        .map(|r| PreviewRow {
            date: r.ds.format("%Y-%m-%d %H:%M").to_string(),
            value: format_number(r.value, 2),
            weekday: weekday_name(r.weekday).to_string(),
            attributes: r
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

pub fn stat_rows(stats: &DescriptiveStats, value_label: &str, timestamp_label: &str) -> Vec<StatRow> {
    let row = |column: &str, statistic: &str, value: String| StatRow {
        column: column.to_string(),
        statistic: statistic.to_string(),
        value,
    };
    let v = &stats.value;
    let mut rows = vec![
        row(value_label, "count", format_int(v.count as u64)),
        row(value_label, "mean", fmt_opt(v.mean)),
        row(value_label, "std", fmt_opt(v.std)),
        row(value_label, "min", fmt_opt(v.min)),
        row(value_label, "25%", fmt_opt(v.q25)),
        row(value_label, "50%", fmt_opt(v.median)),
        row(value_label, "75%", fmt_opt(v.q75)),
        row(value_label, "max", fmt_opt(v.max)),
    ];

    let ts = &stats.timestamp;
    let fmt_ts = |t: Option<NaiveDateTime>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| NO_DATA.to_string())
    };
    rows.push(row(timestamp_label, "count", format_int(ts.count as u64)));
    rows.push(row(timestamp_label, "first", fmt_ts(ts.first)));
    rows.push(row(timestamp_label, "last", fmt_ts(ts.last)));

    for c in &stats.categories {
        rows.push(row(&c.field, "count", format_int(c.count as u64)));
        rows.push(row(&c.field, "unique", format_int(c.unique as u64)));
        rows.push(row(
            &c.field,
            "top",
            c.top.clone().unwrap_or_else(|| NO_DATA.to_string()),
        ));
        rows.push(row(&c.field, "freq", format_int(c.freq as u64)));
    }
    rows
}
