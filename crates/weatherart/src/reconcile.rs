//! Post-upload reconciliation.
//!
//! The TV's upload call does not reliably return an identifier: it may hang
//! past any reasonable bound, fail, or succeed silently. This module owns
//! the decision logic that follows an upload attempt: bound the upload,
//! diff the before/after catalog snapshots, score candidates by whatever
//! timestamp-like field the TV populated, then select the winner and
//! remember it for the next run.

use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::art::{ArtError, ArtItem, ArtSession};

/// Timestamp-bearing fields checked for recency, in priority order.
///
/// The order is a contract: changing it changes tie-break outcomes on real
/// catalogs, where different firmware revisions populate different fields.
const RECENCY_FIELDS: [&str; 5] = [
    "date",
    "create_time",
    "added_time",
    "timestamp",
    "content_time",
];

/// Datetime formats tried against string-valued recency fields, in order.
const RECENCY_FORMATS: [&str; 2] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Result of a bounded upload attempt.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The TV acknowledged the upload with a content id. Authoritative.
    Confirmed(String),
    /// The upload failed outright before the bound elapsed.
    Failed(ArtError),
    /// The bound elapsed; the upload may still have succeeded.
    TimedOut,
}

impl UploadOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UploadOutcome::TimedOut)
    }
}

/// Run an upload without ever blocking the caller past `timeout`.
///
/// The upload runs on its own task. On timeout the task is dropped rather
/// than cancelled: forcing the TV session down mid-transfer risks leaving
/// the device in a half-written state, so the task is left to finish (or
/// hang) on its own and its eventual result is discarded.
pub async fn upload_with_timeout(
    session: Arc<dyn ArtSession>,
    path: PathBuf,
    matte: String,
    timeout: Duration,
) -> UploadOutcome {
    let handle = tokio::spawn(async move { session.upload(&path, &matte).await });
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(content_id))) => UploadOutcome::Confirmed(content_id),
        Ok(Ok(Err(e))) => UploadOutcome::Failed(e),
        Ok(Err(join_err)) => {
            UploadOutcome::Failed(ArtError::Device(format!("upload task failed: {join_err}")))
        }
        Err(_) => UploadOutcome::TimedOut,
    }
}

/// Items of `after` whose content id does not appear in `before`, in the
/// order `after` lists them. An empty `before` makes everything new.
pub fn new_items(before: &[ArtItem], after: &[ArtItem]) -> Vec<ArtItem> {
    let before_ids: std::collections::HashSet<&str> =
        before.iter().map(|i| i.content_id.as_str()).collect();
    after
        .iter()
        .filter(|item| !before_ids.contains(item.content_id.as_str()))
        .cloned()
        .collect()
}

/// Content id of the most recent item, by heuristic recency score.
///
/// Ties keep catalog order (stable sort), so among equally scored items the
/// earliest listed wins. Empty input yields `None`.
pub fn pick_latest(items: &[ArtItem]) -> Option<String> {
    let mut scored: Vec<(f64, &ArtItem)> =
        items.iter().map(|item| (recency_score(item), item)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.first().map(|(_, item)| item.content_id.clone())
}

/// Epoch-seconds recency score; 0 means "unknown recency".
fn recency_score(item: &ArtItem) -> f64 {
    for field in RECENCY_FIELDS {
        match item.field(field) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64() {
                    return v;
                }
            }
            Some(Value::String(raw)) => {
                for format in RECENCY_FORMATS {
                    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
                        return local_epoch(parsed) as f64;
                    }
                }
            }
            _ => {}
        }
    }
    0.0
}

/// Epoch seconds of a wall-clock datetime with no offset.
///
/// Catalog date strings are local time: the TV stamps `image_date` from the
/// uploader's clock. Scoring them as UTC would skew them against numeric
/// epoch fields by the host's UTC offset. A time skipped by a DST jump
/// falls back to the UTC reading.
fn local_epoch(naive: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

/// Determine the uploaded artwork's content id.
///
/// A confirmed upload is authoritative and skips the second listing
/// entirely. Otherwise a fresh snapshot is diffed against `before` and the
/// latest new item wins; when the diff finds nothing, the full after
/// snapshot is scored as a fallback. The two candidate sets are never
/// merged: the new-items winner always takes priority. Either way, an id
/// that was already present before the upload cannot be the new artwork,
/// so such a winner is discarded rather than selected.
pub async fn resolve_content_id(
    session: &dyn ArtSession,
    before: &[ArtItem],
    outcome: UploadOutcome,
    category: Option<&str>,
) -> crate::art::Result<Option<String>> {
    if let UploadOutcome::Confirmed(content_id) = outcome {
        return Ok(Some(content_id));
    }

    let before_ids: std::collections::HashSet<&str> =
        before.iter().map(|i| i.content_id.as_str()).collect();
    let after = session.available(category).await?;
    let fresh = new_items(before, &after);
    let candidate = pick_latest(&fresh)
        .or_else(|| pick_latest(&after))
        .filter(|id| !before_ids.contains(id.as_str()));
    Ok(candidate)
}

/// Show the identified artwork and retire the previous one.
///
/// Persisting the id and deleting the stale artwork are best-effort: their
/// failures are logged and swallowed, since the selection itself already
/// succeeded.
pub async fn finalize_selection(
    session: &dyn ArtSession,
    store: &LastIdStore,
    content_id: &str,
    category: Option<&str>,
    previous: Option<&str>,
) -> crate::art::Result<()> {
    session.select_image(content_id, category).await?;
    store.save(content_id);

    if let Some(last_id) = previous {
        if last_id != content_id {
            log::info!("Removing previously uploaded image: {last_id}");
            if let Err(e) = session.delete(last_id).await {
                log::warn!("Could not delete previous image: {e}");
            }
        }
    }
    Ok(())
}

/// Durable record of the content id selected by the previous run.
#[derive(Debug, Clone)]
pub struct LastIdStore {
    path: PathBuf,
}

impl LastIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously selected id; a missing or empty file is "no prior id".
    pub fn load(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let trimmed = contents.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Overwrite the stored id. Write failures are logged, never raised.
    pub fn save(&self, content_id: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create {}: {e}", parent.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, content_id) {
            log::warn!("Could not persist last content id: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> ArtItem {
        ArtItem::from_value(&value).unwrap()
    }

    #[test]
    fn disjoint_snapshots_make_everything_new() {
        let before = vec![item(json!({"content_id": "a"}))];
        let after = vec![
            item(json!({"content_id": "b"})),
            item(json!({"content_id": "c"})),
        ];
        let fresh = new_items(&before, &after);
        let ids: Vec<_> = fresh.iter().map(|i| i.content_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn subset_snapshots_yield_nothing_new() {
        let before = vec![
            item(json!({"content_id": "a"})),
            item(json!({"content_id": "b"})),
        ];
        let after = vec![item(json!({"content_id": "a"}))];
        assert!(new_items(&before, &after).is_empty());
    }

    #[test]
    fn empty_before_makes_every_item_new() {
        let after = vec![
            item(json!({"content_id": "a"})),
            item(json!({"content_id": "b"})),
        ];
        assert_eq!(new_items(&[], &after).len(), 2);
    }

    #[test]
    fn pick_latest_of_empty_is_none() {
        assert_eq!(pick_latest(&[]), None);
    }

    #[test]
    fn pick_latest_is_stable_on_ties() {
        let items = vec![
            item(json!({"content_id": "first"})),
            item(json!({"content_id": "second"})),
            item(json!({"content_id": "third"})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("first"));
    }

    #[test]
    fn pick_latest_prefers_higher_scores() {
        let items = vec![
            item(json!({"content_id": "old", "date": "2026:01:01 08:00:00"})),
            item(json!({"content_id": "new", "date": "2026:01:02 09:00:00"})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("new"));
    }

    #[test]
    fn string_dates_and_numeric_timestamps_share_a_scale() {
        // 1735689600 is 2025-01-01T00:00:00Z; the colon-format date is a
        // year later and must win.
        let items = vec![
            item(json!({"content_id": "numeric", "timestamp": 1735689600})),
            item(json!({"content_id": "string", "date": "2026:01:01 12:00:00"})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("string"));
    }

    #[test]
    fn string_dates_are_scored_as_local_instants() {
        std::env::set_var("TZ", "Australia/Sydney");
        // 2026:01:01 20:00:00 in Sydney (UTC+11) is 1767258000; a numeric
        // field five hours later must win. Scoring the string as UTC would
        // inflate it by the offset and flip the winner.
        let items = vec![
            item(json!({"content_id": "string-dated", "date": "2026:01:01 20:00:00"})),
            item(json!({"content_id": "numeric", "timestamp": 1767258000i64 + 5 * 3600})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("numeric"));
    }

    #[test]
    fn hyphen_format_is_the_second_choice() {
        let items = vec![
            item(json!({"content_id": "a", "date": "2026-01-01 08:00:00"})),
            item(json!({"content_id": "b", "date": "2026:01:02 08:00:00"})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("b"));
    }

    #[test]
    fn unparseable_fields_fall_through_in_priority_order() {
        // `date` is junk but `timestamp` is usable; the later timestamp wins.
        let items = vec![
            item(json!({"content_id": "junk", "date": "not a date", "timestamp": 100})),
            item(json!({"content_id": "later", "timestamp": 200})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("later"));
    }

    #[test]
    fn first_populated_field_wins_over_later_fields() {
        // `date` beats `timestamp` even when `timestamp` is larger.
        let items = vec![
            item(json!({
                "content_id": "dated",
                "date": "2026:01:01 00:00:00",
                "timestamp": 99999999999i64
            })),
            item(json!({"content_id": "stamped", "timestamp": 1735689600})),
        ];
        assert_eq!(pick_latest(&items).as_deref(), Some("dated"));
    }

    #[test]
    fn last_id_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LastIdStore::new(dir.path().join("last_uploaded_id.txt"));
        assert_eq!(store.load(), None);

        store.save("x2");
        // A fresh store over the same path sees the persisted value.
        let fresh = LastIdStore::new(store.path());
        assert_eq!(fresh.load().as_deref(), Some("x2"));

        std::fs::remove_file(store.path()).unwrap();
        assert_eq!(fresh.load(), None);
    }

    #[test]
    fn whitespace_only_file_is_no_prior_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_uploaded_id.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(LastIdStore::new(path).load(), None);
    }
}
