//! Checklist validation and aggregation.
//!
//! [`submit`] turns a [`Submission`] into a stored batch of rows after
//! checking completeness, the photo policy and the duplicate-serial rule.
//! [`find_pending_reinspection`] derives which units still wait for a
//! reinspection from the stored rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use tracing::{debug, info};

use crate::checklist::{ChecklistRow, Submission};
use crate::config::ChecklistConfig;
use crate::context::AppContext;
use crate::error::{Error, Result};

/// Validate and store `submission`, stamped with the current time.
///
/// Returns the stored rows, one per configured item in checklist order.
///
/// # Errors
///
/// - [`Error::IncompleteSubmission`] for a blank serial, a serial not matching
///   the configured pattern, or missing or unknown items
/// - [`Error::MissingPhoto`] when the photo policy requires one
/// - [`Error::NotInspected`] when reinspecting a serial with no rows
/// - [`Error::NotRejected`] when reinspecting a serial never rejected
/// - [`Error::DuplicateSerial`] when a first inspection repeats a serial
/// - storage errors from the configured backend
pub fn submit(ctx: &mut AppContext, submission: Submission) -> Result<Vec<ChecklistRow>> {
    let now = Utc::now().with_timezone(&ctx.config.timezone());
    submit_at(ctx, submission, now)
}

/// Like [`submit`], with an explicit submission time.
///
/// # Errors
///
/// Same as [`submit`].
pub fn submit_at(
    ctx: &mut AppContext,
    submission: Submission,
    timestamp: DateTime<FixedOffset>,
) -> Result<Vec<ChecklistRow>> {
    let checklist = &ctx.config.checklist;
    let serial = validate(checklist, &submission)?;

    if submission.is_reinspection {
        let previous = ctx.store.query_by_serial(&serial)?;
        if previous.is_empty() {
            return Err(Error::NotInspected { serial });
        }
        if !previous.iter().any(|row| row.rejected) {
            return Err(Error::NotRejected { serial });
        }
    } else if ctx.store.contains_serial(&serial)? {
        return Err(Error::DuplicateSerial { serial });
    }

    let rows = build_rows(checklist, &serial, submission, ctx.inspector.name(), timestamp);
    ctx.store.insert_batch(&rows)?;

    info!(
        serial = %serial,
        inspector = %ctx.inspector,
        rejected = rows.first().is_some_and(|row| row.rejected),
        reinspection = rows.first().is_some_and(|row| row.is_reinspection),
        "Checklist submitted"
    );
    Ok(rows)
}

/// Check a submission against the checklist and return its trimmed serial.
fn validate(checklist: &ChecklistConfig, submission: &Submission) -> Result<String> {
    let serial = submission.serial.trim();
    if serial.is_empty() {
        return Err(Error::incomplete("serial number is required"));
    }

    if let Some(pattern) = &checklist.serial_pattern {
        let re = Regex::new(pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid regex pattern: {e}"),
        })?;
        if !re.is_match(serial) {
            return Err(Error::incomplete(format!(
                "serial '{serial}' does not match pattern {pattern}"
            )));
        }
    }

    let missing: Vec<&str> = checklist
        .items
        .iter()
        .filter(|item| !submission.results.contains_key(item.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::incomplete(format!(
            "no result for {}",
            missing.join(", ")
        )));
    }

    let mut unknown: Vec<&str> = submission
        .results
        .keys()
        .filter(|item| !checklist.items.contains(*item))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(Error::incomplete(format!(
            "unknown checklist item {}",
            unknown.join(", ")
        )));
    }

    if submission.photo.is_none()
        && checklist
            .photo_policy
            .requires_photo(submission.is_reinspection)
    {
        return Err(Error::MissingPhoto {
            item: checklist.photo_item.clone(),
        });
    }

    Ok(serial.to_string())
}

fn build_rows(
    checklist: &ChecklistConfig,
    serial: &str,
    mut submission: Submission,
    inspector: &str,
    timestamp: DateTime<FixedOffset>,
) -> Vec<ChecklistRow> {
    let rejected = submission.is_rejected();
    let mut photo = submission.photo.take();

    let rows: Vec<ChecklistRow> = checklist
        .items
        .iter()
        .filter_map(|item| {
            let result = submission.results.remove(item)?;
            let label_photo = if *item == checklist.photo_item {
                photo.take()
            } else {
                None
            };
            Some(ChecklistRow {
                serial: serial.to_string(),
                item: item.clone(),
                status: result.status,
                notes: result.notes,
                inspector: inspector.to_string(),
                timestamp,
                rejected,
                is_reinspection: submission.is_reinspection,
                label_photo,
            })
        })
        .collect();

    if photo.is_some() {
        debug!(
            serial,
            photo_item = %checklist.photo_item,
            "Photo item is not on the checklist, photo discarded"
        );
    }
    rows
}

/// The most recent batch of each serial, keyed by serial.
///
/// Batches are identified from consecutive rows sharing serial, timestamp,
/// inspector and reinspection flag, with each item appearing once; every
/// store appends a batch in one piece. On equal timestamps the batch
/// appended last wins.
#[must_use]
pub fn latest_batches(rows: &[ChecklistRow]) -> BTreeMap<&str, Vec<&ChecklistRow>> {
    let mut latest: BTreeMap<&str, Vec<&ChecklistRow>> = BTreeMap::new();

    for batch in batches(rows) {
        let Some(&head) = batch.first() else { continue };
        let newer = match latest.get(head.serial.as_str()).and_then(|b| b.first()) {
            Some(current) => head.timestamp >= current.timestamp,
            None => true,
        };
        if newer {
            latest.insert(head.serial.as_str(), batch);
        }
    }
    latest
}

/// Split rows into submission batches, preserving order.
///
/// A repeated item starts a new batch even when the batch key matches.
fn batches(rows: &[ChecklistRow]) -> Vec<Vec<&ChecklistRow>> {
    let mut out: Vec<Vec<&ChecklistRow>> = Vec::new();
    for row in rows {
        let continues = out.last().is_some_and(|batch| {
            batch.first().is_some_and(|head| head.same_batch(row))
                && batch.iter().all(|seen| seen.item != row.item)
        });
        match out.last_mut() {
            Some(batch) if continues => batch.push(row),
            _ => out.push(vec![row]),
        }
    }
    out
}

/// Serials whose latest batch was rejected and was not itself a reinspection.
#[must_use]
pub fn find_pending_reinspection(rows: &[ChecklistRow]) -> BTreeSet<String> {
    latest_batches(rows)
        .into_iter()
        .filter(|(_, batch)| {
            batch
                .first()
                .is_some_and(|head| head.rejected && !head.is_reinspection)
        })
        .map(|(serial, _)| serial.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{ItemResult, Status};
    use crate::config::{Backend, Config, PhotoPolicy};
    use crate::identity::Inspector;
    use crate::photo::LabelPhoto;
    use crate::report;
    use crate::storage::{MemoryStore, RowStore};

    const ITEMS: [&str; 5] = ["Label", "Drum + Screw", "Solder", "Paint", "ABS Rubber"];

    fn context() -> AppContext {
        let mut config = Config::default();
        config.storage.backend = Backend::Memory;
        AppContext::new(config, Inspector::for_tests("joao"), Box::new(MemoryStore::new()))
    }

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn photo() -> LabelPhoto {
        LabelPhoto::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3]).unwrap()
    }

    fn all_conforming(serial: &str) -> Submission {
        ITEMS.iter().fold(Submission::new(serial), |sub, item| {
            sub.with_result(*item, ItemResult::new(Status::Conforming))
        })
    }

    fn with_status(mut sub: Submission, item: &str, status: Status) -> Submission {
        sub.results.insert(item.to_string(), ItemResult::new(status));
        sub
    }

    #[test]
    fn test_submit_builds_rows_in_checklist_order() {
        let mut ctx = context();
        let sub = all_conforming("SN1").with_photo(photo());

        let rows = submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap();

        let items: Vec<&str> = rows.iter().map(|row| row.item.as_str()).collect();
        assert_eq!(items, ITEMS);
        assert!(rows.iter().all(|row| row.inspector == "joao" && row.serial == "SN1"));
        assert_eq!(rows[0].label_photo, Some(photo()));
        assert!(rows[1..].iter().all(|row| row.label_photo.is_none()));
    }

    #[test]
    fn test_rejected_iff_any_non_conforming() {
        let mut ctx = context();
        let sub = with_status(all_conforming("SN1"), "Drum + Screw", Status::NonConforming);
        let sub = with_status(sub, "Solder", Status::NotApplicable).with_photo(photo());

        let rows = submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap();
        assert!(rows.iter().all(|row| row.rejected));

        let sub = with_status(all_conforming("SN2"), "Paint", Status::NotApplicable).with_photo(photo());
        let rows = submit_at(&mut ctx, sub, at("2024-05-01T08:10:00-03:00")).unwrap();
        assert!(rows.iter().all(|row| !row.rejected));
    }

    #[test]
    fn test_duplicate_serial_accepted_once() {
        let mut ctx = context();
        let first = submit_at(
            &mut ctx,
            all_conforming("SN1").with_photo(photo()),
            at("2024-05-01T08:00:00-03:00"),
        );
        let second = submit_at(
            &mut ctx,
            all_conforming("SN1").with_photo(photo()),
            at("2024-05-01T09:00:00-03:00"),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::DuplicateSerial { serial }) if serial == "SN1"));
        assert_eq!(ctx.store.query_all().unwrap().len(), 5);
    }

    #[test]
    fn test_serial_is_trimmed() {
        let mut ctx = context();
        submit_at(
            &mut ctx,
            all_conforming("  SN1 ").with_photo(photo()),
            at("2024-05-01T08:00:00-03:00"),
        )
        .unwrap();

        let err = submit_at(
            &mut ctx,
            all_conforming("SN1").with_photo(photo()),
            at("2024-05-01T09:00:00-03:00"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateSerial { .. }));
    }

    #[test]
    fn test_blank_serial() {
        let mut ctx = context();
        let err = submit_at(&mut ctx, all_conforming("   "), at("2024-05-01T08:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::IncompleteSubmission { .. }));
    }

    #[test]
    fn test_missing_item() {
        let mut ctx = context();
        let mut sub = all_conforming("SN1").with_photo(photo());
        sub.results.remove("Paint");

        let err = submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::IncompleteSubmission { .. }));
        assert!(err.to_string().contains("Paint"));
        assert!(ctx.store.query_all().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_item() {
        let mut ctx = context();
        let sub = all_conforming("SN1")
            .with_photo(photo())
            .with_result("Screen", ItemResult::new(Status::Conforming));

        let err = submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap_err();
        assert!(err.to_string().contains("Screen"));
    }

    #[test]
    fn test_serial_pattern() {
        let mut ctx = context();
        ctx.config.checklist.serial_pattern = Some(r"^SN\d+$".to_string());

        let err = submit_at(
            &mut ctx,
            all_conforming("XX1").with_photo(photo()),
            at("2024-05-01T08:00:00-03:00"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::IncompleteSubmission { .. }));

        assert!(submit_at(
            &mut ctx,
            all_conforming("SN7").with_photo(photo()),
            at("2024-05-01T08:00:00-03:00"),
        )
        .is_ok());
    }

    #[test]
    fn test_photo_required_on_first_inspection() {
        let mut ctx = context();
        let err = submit_at(&mut ctx, all_conforming("SN1"), at("2024-05-01T08:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::MissingPhoto { item } if item == "Label"));
    }

    #[test]
    fn test_photo_policies() {
        let mut ctx = context();
        ctx.config.checklist.photo_policy = PhotoPolicy::Never;
        let rows = submit_at(&mut ctx, all_conforming("SN1"), at("2024-05-01T08:00:00-03:00")).unwrap();
        assert!(rows.iter().all(|row| row.label_photo.is_none()));

        ctx.config.checklist.photo_policy = PhotoPolicy::Always;
        let mut reinspect = all_conforming("SN1");
        reinspect.is_reinspection = true;
        let err = submit_at(&mut ctx, reinspect, at("2024-05-01T09:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::MissingPhoto { .. }));
    }

    #[test]
    fn test_reinspection_bypasses_duplicate_check() {
        let mut ctx = context();
        let sub = with_status(all_conforming("SN1"), "Solder", Status::NonConforming).with_photo(photo());
        submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap();

        let mut again = all_conforming("SN1");
        again.is_reinspection = true;
        let rows = submit_at(&mut ctx, again, at("2024-05-01T10:00:00-03:00")).unwrap();

        assert!(rows.iter().all(|row| row.is_reinspection && !row.rejected));
        assert_eq!(ctx.store.query_by_serial("SN1").unwrap().len(), 10);
    }

    #[test]
    fn test_reinspection_of_unknown_serial() {
        let mut ctx = context();
        let mut sub = all_conforming("SN404");
        sub.is_reinspection = true;

        let err = submit_at(&mut ctx, sub, at("2024-05-01T08:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::NotInspected { .. }));
    }

    #[test]
    fn test_reinspection_of_approved_serial() {
        let mut ctx = context();
        submit_at(
            &mut ctx,
            all_conforming("SN1").with_photo(photo()),
            at("2024-05-01T08:00:00-03:00"),
        )
        .unwrap();

        let mut sub = ITEMS.iter().fold(Submission::new("SN1"), |sub, item| {
            sub.with_result(*item, ItemResult::new(Status::NonConforming))
        });
        sub.is_reinspection = true;

        let err = submit_at(&mut ctx, sub, at("2024-05-01T09:00:00-03:00")).unwrap_err();
        assert!(matches!(err, Error::NotRejected { serial } if serial == "SN1"));
        assert_eq!(ctx.store.query_by_serial("SN1").unwrap().len(), 5);
        assert!(find_pending_reinspection(&ctx.store.query_all().unwrap()).is_empty());
    }

    #[test]
    fn test_submit_uses_configured_offset() {
        let mut ctx = context();
        ctx.config.locale.utc_offset_minutes = 60;
        let rows = submit(&mut ctx, all_conforming("SN1").with_photo(photo())).unwrap();
        assert_eq!(rows[0].timestamp.offset().local_minus_utc(), 3600);
    }

    fn stored(serial: &str, rfc3339: &str, rejected: bool, reinspection: bool) -> Vec<ChecklistRow> {
        let failing: &[&str] = if rejected { &["Solder"] } else { &[] };
        crate::storage::test_support::batch(serial, rfc3339, failing, reinspection)
    }

    #[test]
    fn test_pending_reinspection_latest_batch_governs() {
        let mut rows = Vec::new();
        // fixed by a later approving reinspection
        rows.extend(stored("A", "2024-05-01T08:00:00-03:00", true, false));
        rows.extend(stored("A", "2024-05-01T10:00:00-03:00", false, true));
        // rejected once
        rows.extend(stored("B", "2024-05-01T08:30:00-03:00", true, false));
        // rejected twice, never reinspected
        rows.extend(stored("C", "2024-05-01T08:00:00-03:00", true, false));
        rows.extend(stored("C", "2024-05-01T09:00:00-03:00", true, false));
        // approved
        rows.extend(stored("D", "2024-05-01T08:00:00-03:00", false, false));

        let pending = find_pending_reinspection(&rows);
        assert_eq!(pending.into_iter().collect::<Vec<_>>(), ["B", "C"]);
    }

    #[test]
    fn test_pending_uses_timestamp_not_insertion_order() {
        let mut rows = stored("A", "2024-05-01T10:00:00-03:00", false, true);
        rows.extend(stored("A", "2024-05-01T08:00:00-03:00", true, false));

        assert!(find_pending_reinspection(&rows).is_empty());
    }

    #[test]
    fn test_latest_batch_tie_goes_to_last_appended() {
        let mut rows = stored("A", "2024-05-01T08:00:00-03:00", false, true);
        rows.extend(stored("A", "2024-05-01T08:00:00-03:00", true, false));

        let latest = latest_batches(&rows);
        assert_eq!(latest["A"].len(), 5);
        assert!(latest["A"][0].rejected);
        assert!(find_pending_reinspection(&rows).contains("A"));
    }

    #[test]
    fn test_identical_batch_keys_stay_separate() {
        let mut rows = stored("A", "2024-05-01T08:00:00-03:00", true, false);
        rows.extend(stored("A", "2024-05-01T09:00:00-03:00", true, true));
        rows.extend(stored("A", "2024-05-01T09:00:00-03:00", false, true));

        assert_eq!(batches(&rows).len(), 3);
        let latest = latest_batches(&rows);
        assert_eq!(latest["A"].len(), 5);
        assert!(latest["A"].iter().all(|row| !row.rejected));
        assert!(std::ptr::eq(latest["A"][0], &rows[10]));
    }

    #[test]
    fn test_pending_empty() {
        assert!(find_pending_reinspection(&[]).is_empty());
        assert!(latest_batches(&[]).is_empty());
    }

    #[test]
    fn test_end_to_end_sn100() {
        let mut ctx = context();
        submit(&mut ctx, all_conforming("SN100").with_photo(photo())).unwrap();

        let rows = ctx.store.query_all().unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| !row.rejected));

        let summary = report::summary(&rows, None);
        assert_eq!(summary.total_units, 1);
        assert_eq!(summary.approved_units, 1);
        assert_eq!(summary.rejected_units, 0);
        assert!((summary.approval_pct - 100.0).abs() < f64::EPSILON);
    }
}
