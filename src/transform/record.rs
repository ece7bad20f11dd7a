use crate::entities::record::{Record, RecordField};
use crate::sources::RawDocument;
use crate::utils::serde::StringOrVec;

/// Upstream field consulted for each record field. Company and drug name prefer the
/// curated `normalized_*` value and fall back to the raw one.
fn source_fields(field: RecordField) -> (&'static str, Option<&'static str>) {
    match field {
        RecordField::Company => ("normalized_company_name", Some("companies")),
        RecordField::DrugName => ("normalized_drug_name", Some("drug_name")),
        other => (other.as_str(), None),
    }
}

fn resolve<'a>(doc: &'a RawDocument, field: RecordField) -> Option<&'a StringOrVec> {
    let (primary, fallback) = source_fields(field);
    let preferred = doc.field(primary).filter(|value| !value.is_empty());
    match fallback {
        Some(fallback) => preferred.or_else(|| doc.field(fallback)),
        None => preferred,
    }
}

pub(crate) fn normalize(doc: &RawDocument) -> Record {
    let mut record = Record {
        id: doc.id.clone(),
        ..Record::default()
    };
    for field in RecordField::ALL {
        if field == RecordField::Id {
            continue;
        }
        *record.get_mut(field) = resolve(doc, field)
            .map(StringOrVec::first_or_empty)
            .unwrap_or_default();
    }
    record
}

/// Normalizes every document that is not soft-deleted, keeping source order.
pub(crate) fn normalize_all(docs: &[RawDocument]) -> Vec<Record> {
    docs.iter().filter(|doc| !doc.deleted).map(normalize).collect()
}
