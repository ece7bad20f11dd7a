use serde::{Deserialize, Serialize};

/// One pipeline event (approval, trial readout, filing, ...) flattened to plain strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub event_type: String,
    pub disease_area: String,
    pub company: String,
    pub drug_name: String,
    pub common_name: String,
    pub indication: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub datetime: String,
    pub apply_category: String,
    pub approval_category: String,
    pub code: String,
    pub target: String,
    pub drug_function: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Id,
    EventType,
    DiseaseArea,
    Company,
    DrugName,
    CommonName,
    Indication,
    Title,
    Content,
    Source,
    Url,
    Datetime,
    ApplyCategory,
    ApprovalCategory,
    Code,
    Target,
    DrugFunction,
}

impl RecordField {
    pub const ALL: [RecordField; 17] = [
        Self::Id,
        Self::EventType,
        Self::DiseaseArea,
        Self::Company,
        Self::DrugName,
        Self::CommonName,
        Self::Indication,
        Self::Title,
        Self::Content,
        Self::Source,
        Self::Url,
        Self::Datetime,
        Self::ApplyCategory,
        Self::ApprovalCategory,
        Self::Code,
        Self::Target,
        Self::DrugFunction,
    ];

    /// Field name as it appears in JSON output and in upstream documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::EventType => "event_type",
            Self::DiseaseArea => "disease_area",
            Self::Company => "company",
            Self::DrugName => "drug_name",
            Self::CommonName => "common_name",
            Self::Indication => "indication",
            Self::Title => "title",
            Self::Content => "content",
            Self::Source => "source",
            Self::Url => "url",
            Self::Datetime => "datetime",
            Self::ApplyCategory => "apply_category",
            Self::ApprovalCategory => "approval_category",
            Self::Code => "code",
            Self::Target => "target",
            Self::DrugFunction => "drug_function",
        }
    }
}

impl Record {
    pub fn get(&self, field: RecordField) -> &str {
        match field {
            RecordField::Id => &self.id,
            RecordField::EventType => &self.event_type,
            RecordField::DiseaseArea => &self.disease_area,
            RecordField::Company => &self.company,
            RecordField::DrugName => &self.drug_name,
            RecordField::CommonName => &self.common_name,
            RecordField::Indication => &self.indication,
            RecordField::Title => &self.title,
            RecordField::Content => &self.content,
            RecordField::Source => &self.source,
            RecordField::Url => &self.url,
            RecordField::Datetime => &self.datetime,
            RecordField::ApplyCategory => &self.apply_category,
            RecordField::ApprovalCategory => &self.approval_category,
            RecordField::Code => &self.code,
            RecordField::Target => &self.target,
            RecordField::DrugFunction => &self.drug_function,
        }
    }

    pub(crate) fn get_mut(&mut self, field: RecordField) -> &mut String {
        match field {
            RecordField::Id => &mut self.id,
            RecordField::EventType => &mut self.event_type,
            RecordField::DiseaseArea => &mut self.disease_area,
            RecordField::Company => &mut self.company,
            RecordField::DrugName => &mut self.drug_name,
            RecordField::CommonName => &mut self.common_name,
            RecordField::Indication => &mut self.indication,
            RecordField::Title => &mut self.title,
            RecordField::Content => &mut self.content,
            RecordField::Source => &mut self.source,
            RecordField::Url => &mut self.url,
            RecordField::Datetime => &mut self.datetime,
            RecordField::ApplyCategory => &mut self.apply_category,
            RecordField::ApprovalCategory => &mut self.approval_category,
            RecordField::Code => &mut self.code,
            RecordField::Target => &mut self.target,
            RecordField::DrugFunction => &mut self.drug_function,
        }
    }
}
