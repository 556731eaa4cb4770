//! Record search filters.

use chrono::NaiveDate;

use super::record::InspectionRecord;

/// Conjunction of optional filters over inspection records.
///
/// Text filters are case-insensitive substring matches; blank values are
/// treated as absent. Date bounds are inclusive and apply to
/// `basicData.date`; a record without a parseable date never satisfies a
/// date bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub institution_name: Option<String>,
    pub location: Option<String>,
    pub pharmacist_name: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub violations_text: Option<String>,
    pub work_entities: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &InspectionRecord) -> bool {
        let basic = &record.basic_data;

        if !field_matches(basic.institution_name.as_deref(), self.institution_name.as_deref()) {
            return false;
        }
        if !field_matches(basic.inspection_location.as_deref(), self.location.as_deref()) {
            return false;
        }
        if !field_matches(basic.present_pharmacist.as_deref(), self.pharmacist_name.as_deref()) {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = basic.inspection_date() else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        if let Some(needle) = normalized(self.violations_text.as_deref()) {
            if !record
                .inspection_results
                .violations()
                .any(|v| contains_ci(v, &needle))
            {
                return false;
            }
        }

        if let Some(needle) = normalized(self.work_entities.as_deref()) {
            if !basic.work_place.iter().any(|w| contains_ci(w, &needle)) {
                return false;
            }
        }

        true
    }
}

fn normalized(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn field_matches(value: Option<&str>, filter: Option<&str>) -> bool {
    match normalized(filter) {
        None => true,
        Some(needle) => value.is_some_and(|v| contains_ci(v, &needle)),
    }
}

fn contains_ci(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
