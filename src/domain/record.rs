//! Inspection records and their structured payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::timestamp;

/// Accepts either a single string or a list of strings.
///
/// A single string is split on commas, which is how the frontend joins
/// multiple inspector names before sending them.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?
        .map(OneOrMany::into_vec)
        .unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            OneOrMany::One(s) => s.split(',').map(str::to_string).collect(),
            OneOrMany::Many(v) => v,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Header data of an inspection: when, where, who.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    /// Inspection date as `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present_pharmacist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_reason: Option<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inspector_name: Vec<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub work_place: Vec<String>,
}

impl BasicData {
    /// Decode the stored column. An empty column is the empty value.
    pub fn from_column(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }

    pub fn to_column(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parsed inspection date, if present and well formed.
    pub fn inspection_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(date) = self.date.as_deref().filter(|d| !d.trim().is_empty()) {
            if self.inspection_date().is_none() {
                return Err(format!("date must be YYYY-MM-DD, got {}", date));
            }
        }
        Ok(())
    }
}

/// Violations found during an inspection, keyed by checklist section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InspectionResults(BTreeMap<String, Vec<String>>);

impl<'de> Deserialize<'de> for InspectionResults {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Option<OneOrManyStrict>>>::deserialize(deserializer)?;
        let sections = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(section, items)| {
                let items = items.map(OneOrManyStrict::into_vec).unwrap_or_default();
                (section, items)
            })
            .collect();
        Ok(InspectionResults(sections))
    }
}

// Violation texts may contain commas, so a lone string is kept whole.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrManyStrict {
    One(String),
    Many(Vec<String>),
}

impl OneOrManyStrict {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrManyStrict::One(s) if s.trim().is_empty() => Vec::new(),
            OneOrManyStrict::One(s) => vec![s],
            OneOrManyStrict::Many(v) => v,
        }
    }
}

impl InspectionResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_column(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }

    pub fn to_column(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn with_section(mut self, section: impl Into<String>, violations: Vec<String>) -> Self {
        self.0.insert(section.into(), violations);
        self
    }

    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Every violation text across all sections.
    pub fn violations(&self) -> impl Iterator<Item = &str> {
        self.0.values().flatten().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fields supplied when creating a record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub serial_number: String,
    pub basic_data: BasicData,
    pub inspection_results: InspectionResults,
    pub recommendations: Option<String>,
    pub created_by: String,
}

/// Partial update of a record. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    pub serial_number: Option<String>,
    pub basic_data: Option<BasicData>,
    pub inspection_results: Option<InspectionResults>,
    /// An empty string clears the recommendations.
    pub recommendations: Option<String>,
}

/// One inspection with its outcome.
///
/// Serializes to the camelCase projection used in API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    pub id: String,
    pub serial_number: String,
    pub basic_data: BasicData,
    pub inspection_results: InspectionResults,
    pub recommendations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
}

impl InspectionRecord {
    pub fn new(new: NewRecord) -> Self {
        let now = timestamp::now();
        Self {
            id: Uuid::new_v4().to_string(),
            serial_number: new.serial_number,
            basic_data: new.basic_data,
            inspection_results: new.inspection_results,
            recommendations: normalize_text(new.recommendations),
            created_at: now,
            created_by: new.created_by,
            updated_at: now,
        }
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn apply(&mut self, update: RecordUpdate) {
        if let Some(serial_number) = update.serial_number {
            self.serial_number = serial_number;
        }
        if let Some(basic_data) = update.basic_data {
            self.basic_data = basic_data;
        }
        if let Some(results) = update.inspection_results {
            self.inspection_results = results;
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations = normalize_text(Some(recommendations));
        }
        self.updated_at = timestamp::touch(&self.created_at);
    }
}

fn normalize_text(text: Option<String>) -> Option<String> {
    text.filter(|s| !s.trim().is_empty())
}
