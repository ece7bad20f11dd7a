use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entities::record::{Record, RecordField};

pub const TOP_N: usize = 10;

const UNKNOWN_LABEL: &str = "unknown";
const OTHER_LABEL: &str = "other";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub event_types: Vec<String>,
    pub disease_areas: Vec<String>,
    pub companies: Vec<String>,
}

/// Frequency summary of a snapshot. Maps keep their ranking order when serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub by_event_type: IndexMap<String, usize>,
    pub top_companies: IndexMap<String, usize>,
    pub top_disease_areas: IndexMap<String, usize>,
}

/// Non-empty values of `field`, deduplicated and sorted ascending.
pub fn distinct_values(records: &[Record], field: RecordField) -> Vec<String> {
    records
        .iter()
        .map(|record| record.get(field))
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn filter_options(records: &[Record]) -> FilterOptions {
    FilterOptions {
        event_types: distinct_values(records, RecordField::EventType),
        disease_areas: distinct_values(records, RecordField::DiseaseArea),
        companies: distinct_values(records, RecordField::Company),
    }
}

/// Counts per value in first-encounter order; empty values are counted under `fallback`.
fn frequencies(records: &[Record], field: RecordField, fallback: &str) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in records {
        let value = record.get(field);
        let key = if value.is_empty() { fallback } else { value };
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Highest counts first; equal counts keep first-encounter order.
fn top_n(counts: IndexMap<String, usize>, n: usize) -> IndexMap<String, usize> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    entries.into_iter().collect()
}

pub fn stats(records: &[Record]) -> Stats {
    Stats {
        total: records.len(),
        by_event_type: frequencies(records, RecordField::EventType, UNKNOWN_LABEL),
        top_companies: top_n(
            frequencies(records, RecordField::Company, UNKNOWN_LABEL),
            TOP_N,
        ),
        top_disease_areas: top_n(
            frequencies(records, RecordField::DiseaseArea, OTHER_LABEL),
            TOP_N,
        ),
    }
}
