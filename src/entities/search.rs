use serde::{Deserialize, Serialize};

use crate::entities::record::{Record, RecordField};

/// Fields scanned by the free-text keyword.
const KEYWORD_FIELDS: [RecordField; 7] = [
    RecordField::DrugName,
    RecordField::CommonName,
    RecordField::Indication,
    RecordField::Company,
    RecordField::DiseaseArea,
    RecordField::Title,
    RecordField::Content,
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub q: Option<String>,
    pub event_type: Option<String>,
    pub disease_area: Option<String>,
    pub company: Option<String>,
}

impl<K, V> FromIterator<(K, V)> for SearchFilters
where
    K: AsRef<str>,
    V: Into<String>,
{
    /// Builds filters from raw query pairs. A repeated key keeps its last value; unknown
    /// keys are ignored.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "q" => &mut filters.q,
                "event_type" => &mut filters.event_type,
                "disease_area" => &mut filters.disease_area,
                "company" => &mut filters.company,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        filters
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: usize,
    pub results: Vec<Record>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

struct Predicate<'a> {
    keyword: Option<String>,
    exact: Vec<(RecordField, &'a str)>,
}

impl<'a> Predicate<'a> {
    fn new(filters: &'a SearchFilters) -> Self {
        let exact = [
            (RecordField::EventType, filters.event_type.as_ref()),
            (RecordField::DiseaseArea, filters.disease_area.as_ref()),
            (RecordField::Company, filters.company.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| non_empty(value).map(|v| (field, v)))
        .collect();

        Self {
            keyword: non_empty(filters.q.as_ref()).map(str::to_lowercase),
            exact,
        }
    }

    fn matches(&self, record: &Record) -> bool {
        if let Some(keyword) = self.keyword.as_deref() {
            let hit = KEYWORD_FIELDS
                .iter()
                .any(|field| record.get(*field).to_lowercase().contains(keyword));
            if !hit {
                return false;
            }
        }
        self.exact
            .iter()
            .all(|(field, value)| record.get(*field) == *value)
    }
}

/// Filters `records` by keyword and exact-match categories, keeping their order.
pub fn search(records: &[Record], filters: &SearchFilters) -> SearchResults {
    let predicate = Predicate::new(filters);
    let results: Vec<Record> = records
        .iter()
        .filter(|record| predicate.matches(record))
        .cloned()
        .collect();
    SearchResults {
        total: results.len(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, event_type: &str, company: &str, datetime: &str, title: &str) -> Record {
        Record {
            id: id.into(),
            event_type: event_type.into(),
            company: company.into(),
            datetime: datetime.into(),
            title: title.into(),
            ..Record::default()
        }
    }

    fn fixture() -> Vec<Record> {
        vec![
            record("1", "approval", "Acme", "2024-01-02", "Acme wins approval"),
            record("2", "trial", "Acme", "2024-01-01", "Phase 3 trial readout"),
        ]
    }

    fn ids(results: &SearchResults) -> Vec<&str> {
        results.results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn company_filter_keeps_snapshot_order() {
        let filters = SearchFilters {
            company: Some("Acme".into()),
            ..SearchFilters::default()
        };
        let out = search(&fixture(), &filters);
        assert_eq!(out.total, 2);
        assert_eq!(ids(&out), vec!["1", "2"]);
    }

    #[test]
    fn keyword_matches_searched_fields_only() {
        let filters = SearchFilters {
            q: Some("trial".into()),
            ..SearchFilters::default()
        };
        let out = search(&fixture(), &filters);
        assert_eq!(out.total, 1);
        assert_eq!(ids(&out), vec!["2"]);

        // event_type is not a keyword field
        let mut records = fixture();
        records[1].title = "Readout".into();
        assert_eq!(search(&records, &filters).total, 0);
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let mut records = fixture();
        records[0].drug_name = "Aspirin".into();
        let upper = search(
            &records,
            &SearchFilters {
                q: Some("ASPIRIN".into()),
                ..SearchFilters::default()
            },
        );
        let lower = search(
            &records,
            &SearchFilters {
                q: Some("aspirin".into()),
                ..SearchFilters::default()
            },
        );
        assert_eq!(ids(&upper), vec!["1"]);
        assert_eq!(ids(&upper), ids(&lower));
    }

    #[test]
    fn keyword_lowercases_non_ascii_text() {
        let mut records = fixture();
        records[0].content = "ÉTUDE de phase 3".into();
        let out = search(
            &records,
            &SearchFilters {
                q: Some("étude".into()),
                ..SearchFilters::default()
            },
        );
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn filters_are_exact_and_combined_with_and() {
        let filters = SearchFilters {
            q: Some("acme".into()),
            event_type: Some("trial".into()),
            ..SearchFilters::default()
        };
        assert_eq!(ids(&search(&fixture(), &filters)), vec!["2"]);

        let partial = SearchFilters {
            company: Some("Acm".into()),
            ..SearchFilters::default()
        };
        assert_eq!(search(&fixture(), &partial).total, 0);
    }

    #[test]
    fn extra_filter_narrows_results() {
        let mut records = fixture();
        records[0].disease_area = "oncology".into();
        records[1].disease_area = "cardiology".into();
        records.push(record("3", "filing", "Beta", "2023-12-01", "Acme partnership"));
        records[2].disease_area = "oncology".into();

        let base = SearchFilters {
            q: Some("acme".into()),
            ..SearchFilters::default()
        };
        let narrowed = SearchFilters {
            disease_area: Some("oncology".into()),
            ..base.clone()
        };
        let wide = search(&records, &base);
        let narrow = search(&records, &narrowed);

        assert_eq!(ids(&wide), vec!["1", "2", "3"]);
        assert_eq!(ids(&narrow), vec!["1", "3"]);
        assert!(narrow.results.iter().all(|r| wide.results.contains(r)));
        assert!(narrow.total < wide.total);
    }

    #[test]
    fn repeated_query_keys_keep_last_value() {
        let filters: SearchFilters = [
            ("company", "Beta"),
            ("company", "Acme"),
            ("page", "2"),
            ("q", "trial"),
        ]
        .into_iter()
        .collect();
        assert_eq!(filters.company.as_deref(), Some("Acme"));
        assert_eq!(filters.q.as_deref(), Some("trial"));
        assert_eq!(filters.event_type, None);
        assert_eq!(ids(&search(&fixture(), &filters)), vec!["2"]);
    }

    #[test]
    fn empty_values_are_treated_as_absent() {
        let filters = SearchFilters {
            q: Some(String::new()),
            event_type: Some(String::new()),
            disease_area: None,
            company: Some(String::new()),
        };
        assert_eq!(search(&fixture(), &filters).total, 2);
    }

    #[test]
    fn unknown_filter_value_yields_no_results() {
        let filters = SearchFilters {
            event_type: Some("withdrawal".into()),
            ..SearchFilters::default()
        };
        let out = search(&fixture(), &filters);
        assert_eq!(out.total, 0);
        assert!(out.results.is_empty());
    }

    #[test]
    fn empty_snapshot_returns_nothing() {
        let out = search(&[], &SearchFilters::default());
        assert_eq!(out.total, 0);
    }
}
