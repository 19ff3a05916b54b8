//! Core checklist types for qualitycheck.
//!
//! A submission records one [`ItemResult`] per inspection point for a single
//! serial number. Stored, it becomes a batch of [`ChecklistRow`]s that share
//! serial, inspector, timestamp and the derived rejection flag.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::photo::LabelPhoto;

/// Outcome of a single inspection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The item meets the standard.
    Conforming,
    /// The item fails the standard; rejects the whole unit.
    NonConforming,
    /// The item does not apply to this unit.
    NotApplicable,
}

impl Status {
    /// Canonical textual form, as written to stores.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conforming => "conforming",
            Self::NonConforming => "non_conforming",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "conforming" | "c" | "ok" | "pass" => Ok(Self::Conforming),
            "non_conforming" | "nonconforming" | "nc" | "fail" => Ok(Self::NonConforming),
            "not_applicable" | "na" | "n/a" => Ok(Self::NotApplicable),
            _ => Err(Error::incomplete(format!("unknown status '{s}'"))),
        }
    }
}

/// The inspector's verdict on one checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Pass/fail outcome.
    pub status: Status,
    /// Free-text observations, empty when none.
    #[serde(default)]
    pub notes: String,
}

impl ItemResult {
    /// A result with no notes.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            notes: String::new(),
        }
    }

    /// Attach notes to the result.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// A proposed checklist for one unit, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Serial number of the inspected unit.
    pub serial: String,
    /// Result per item name.
    pub results: HashMap<String, ItemResult>,
    /// Photo of the unit's label, if one was taken.
    pub photo: Option<LabelPhoto>,
    /// Whether this resubmits a previously inspected serial.
    pub is_reinspection: bool,
}

impl Submission {
    /// Start a first-time inspection of `serial`.
    #[must_use]
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            results: HashMap::new(),
            photo: None,
            is_reinspection: false,
        }
    }

    /// Start a reinspection of `serial`.
    #[must_use]
    pub fn reinspection(serial: impl Into<String>) -> Self {
        Self {
            is_reinspection: true,
            ..Self::new(serial)
        }
    }

    /// Record a result for `item`.
    #[must_use]
    pub fn with_result(mut self, item: impl Into<String>, result: ItemResult) -> Self {
        self.results.insert(item.into(), result);
        self
    }

    /// Attach the label photo.
    #[must_use]
    pub fn with_photo(mut self, photo: LabelPhoto) -> Self {
        self.photo = Some(photo);
        self
    }

    /// Whether any recorded item is non-conforming.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.results
            .values()
            .any(|result| result.status == Status::NonConforming)
    }
}

/// One stored (serial, item) result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistRow {
    /// Serial number of the inspected unit.
    pub serial: String,
    /// Inspection point name.
    pub item: String,
    /// Outcome for this item.
    pub status: Status,
    /// Free-text observations.
    pub notes: String,
    /// Inspector who submitted the batch.
    pub inspector: String,
    /// Submission time in the plant's fixed timezone.
    pub timestamp: DateTime<FixedOffset>,
    /// True iff any row in the same batch is non-conforming.
    pub rejected: bool,
    /// True iff the batch was a reinspection.
    pub is_reinspection: bool,
    /// Label photo, only on the photo item's row.
    #[serde(skip)]
    pub label_photo: Option<LabelPhoto>,
}

impl ChecklistRow {
    /// Civil date of the submission in its own timezone.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Whether this row and `other` belong to the same submission batch.
    #[must_use]
    pub fn same_batch(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.timestamp == other.timestamp
            && self.inspector == other.inspector
            && self.is_reinspection == other.is_reinspection
    }

    /// Whether the row carries a photo.
    #[must_use]
    pub fn has_photo(&self) -> bool {
        self.label_photo.is_some()
    }
}

/// Parse a boolean written by any of the stores.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_at(serial: &str, rfc3339: &str) -> ChecklistRow {
        ChecklistRow {
            serial: serial.to_string(),
            item: "Solder".to_string(),
            status: Status::Conforming,
            notes: String::new(),
            inspector: "joao".to_string(),
            timestamp: DateTime::parse_from_rfc3339(rfc3339).unwrap(),
            rejected: false,
            is_reinspection: false,
            label_photo: None,
        }
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Conforming.to_string(), "conforming");
        assert_eq!(Status::NonConforming.to_string(), "non_conforming");
        assert_eq!(Status::NotApplicable.to_string(), "not_applicable");
    }

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!("ok".parse::<Status>().unwrap(), Status::Conforming);
        assert_eq!("NC".parse::<Status>().unwrap(), Status::NonConforming);
        assert_eq!("non-conforming".parse::<Status>().unwrap(), Status::NonConforming);
        assert_eq!("N/A".parse::<Status>().unwrap(), Status::NotApplicable);
        assert_eq!(
            "not applicable".parse::<Status>().unwrap(),
            Status::NotApplicable
        );
    }

    #[test]
    fn test_status_parse_unknown() {
        let err = "maybe".parse::<Status>().unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&Status::NonConforming).unwrap();
        assert_eq!(json, "\"non_conforming\"");
    }

    #[test]
    fn test_submission_is_rejected() {
        let submission = Submission::new("SN1")
            .with_result("Label", ItemResult::new(Status::Conforming))
            .with_result("Solder", ItemResult::new(Status::NonConforming))
            .with_result("Paint", ItemResult::new(Status::NotApplicable));
        assert!(submission.is_rejected());

        let clean = Submission::new("SN2")
            .with_result("Label", ItemResult::new(Status::Conforming))
            .with_result("Paint", ItemResult::new(Status::NotApplicable));
        assert!(!clean.is_rejected());
    }

    #[test]
    fn test_reinspection_constructor() {
        let submission = Submission::reinspection("SN9");
        assert!(submission.is_reinspection);
        assert_eq!(submission.serial, "SN9");
        assert!(submission.results.is_empty());
    }

    #[test]
    fn test_item_result_with_notes() {
        let result = ItemResult::new(Status::NonConforming).with_notes("cold joint");
        assert_eq!(result.notes, "cold joint");
    }

    #[test]
    fn test_row_date_uses_own_offset() {
        // 02:30 UTC on the 15th, but the civil date at UTC-3 is the 14th
        let row = row_at("SN1", "2024-03-14T23:30:00-03:00");
        assert_eq!(row.date(), NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
    }

    #[test]
    fn test_same_batch() {
        let a = row_at("SN1", "2024-03-14T10:00:00-03:00");
        let mut b = a.clone();
        b.item = "Paint".to_string();
        assert!(a.same_batch(&b));

        let later = row_at("SN1", "2024-03-14T11:00:00-03:00");
        assert!(!a.same_batch(&later));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
