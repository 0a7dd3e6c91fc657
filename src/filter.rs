use crate::types::{FilterSelection, NormalizedSeries};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Records matching every constraint in `selection`, in series order.
/// An empty result is valid.
pub fn apply_filter(series: &NormalizedSeries, selection: &FilterSelection) -> NormalizedSeries {
    if selection.is_unconstrained() {
        return series.clone();
    }
    let records: Vec<_> = series
        .iter()
        .filter(|r| selection.matches(r))
        .cloned()
        .collect();
    if records.is_empty() {
        warn!("Filter {:?} matched no records", selection);
    } else {
        debug!("Filter kept {} of {} records", records.len(), series.len());
    }
    NormalizedSeries::new(records)
}

/// Sorted distinct values of a categorical field, for populating a selector.
pub fn selector_options(series: &NormalizedSeries, field: &str) -> Vec<String> {
    let set: BTreeSet<&str> = series.iter().filter_map(|r| r.attribute(field)).collect();
    set.into_iter().map(|s| s.to_string()).collect()
}

/// What a typed selector answer means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorChoice<'a> {
    All,
    Value(&'a str),
    Invalid,
}

/// Resolve a selector answer: `0`, a blank line or `all_label` clear the
/// constraint; `1..=n` or an exact option name pick a value.
pub fn resolve_selector_choice<'a>(
    choice: &str,
    options: &'a [String],
    all_label: &str,
) -> SelectorChoice<'a> {
    let choice = choice.trim();
    if choice.is_empty() || choice.eq_ignore_ascii_case(all_label) {
        return SelectorChoice::All;
    }
    if let Ok(n) = choice.parse::<usize>() {
        return match n {
            0 => SelectorChoice::All,
            n => options
                .get(n - 1)
                .map(|o| SelectorChoice::Value(o.as_str()))
                .unwrap_or(SelectorChoice::Invalid),
        };
    }
    options
        .iter()
        .find(|o| o.as_str() == choice)
        .map(|o| SelectorChoice::Value(o.as_str()))
        .unwrap_or(SelectorChoice::Invalid)
}
