//! Reconciliation scenario tests.
//!
//! Drives the bounded upload and the post-upload state machine against a
//! scripted in-memory session, covering the confirmed, timed-out, and
//! unresolved paths end to end.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weatherart::art::{ArtError, ArtItem, ArtSession};
use weatherart::reconcile::{
    finalize_selection, resolve_content_id, upload_with_timeout, LastIdStore, UploadOutcome,
};

/// What the scripted upload should do.
#[derive(Debug, Clone)]
enum UploadScript {
    Confirm(&'static str),
    Fail,
    Hang,
}

/// An in-memory session with a fixed catalog and a scripted upload.
struct ScriptedSession {
    catalog: Vec<ArtItem>,
    upload: UploadScript,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSession {
    fn new(catalog: Vec<ArtItem>, upload: UploadScript) -> Self {
        Self {
            catalog,
            upload,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_named(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(name))
            .count()
    }
}

#[async_trait]
impl ArtSession for ScriptedSession {
    async fn available(&self, _category: Option<&str>) -> Result<Vec<ArtItem>, ArtError> {
        self.record("available");
        Ok(self.catalog.clone())
    }

    async fn upload(&self, _path: &Path, _matte: &str) -> Result<String, ArtError> {
        self.record("upload");
        match &self.upload {
            UploadScript::Confirm(id) => Ok(id.to_string()),
            UploadScript::Fail => Err(ArtError::Device("mid-transfer failure".into())),
            UploadScript::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    async fn select_image(
        &self,
        content_id: &str,
        _category: Option<&str>,
    ) -> Result<(), ArtError> {
        self.record(format!("select:{content_id}"));
        Ok(())
    }

    async fn delete(&self, content_id: &str) -> Result<(), ArtError> {
        self.record(format!("delete:{content_id}"));
        Ok(())
    }

    async fn delete_list(&self, content_ids: &[String]) -> Result<(), ArtError> {
        self.record(format!("delete_list:{}", content_ids.join(",")));
        Ok(())
    }

    async fn close(&self) -> Result<(), ArtError> {
        self.record("close");
        Ok(())
    }
}

fn item(value: serde_json::Value) -> ArtItem {
    ArtItem::from_value(&value).expect("valid catalog item")
}

fn upload_timeout() -> Duration {
    Duration::from_millis(50)
}

#[tokio::test]
async fn confirmed_upload_never_lists_again() {
    let session = Arc::new(ScriptedSession::new(
        vec![item(json!({"content_id": "x1"}))],
        UploadScript::Confirm("abc123"),
    ));

    let before = session.available(None).await.unwrap();
    assert_eq!(session.calls_named("available"), 1);

    let outcome = upload_with_timeout(
        session.clone(),
        PathBuf::from("/tmp/art.png"),
        "none".to_string(),
        upload_timeout(),
    )
    .await;
    assert!(matches!(&outcome, UploadOutcome::Confirmed(id) if id == "abc123"));

    let resolved = resolve_content_id(session.as_ref(), &before, outcome, None)
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("abc123"));

    // The before-snapshot listing stays the only one.
    assert_eq!(session.calls_named("available"), 1);
}

#[tokio::test]
async fn timed_out_upload_resolves_via_snapshot_diff() {
    let before = vec![item(json!({"content_id": "x1"}))];
    let session = Arc::new(ScriptedSession::new(
        vec![
            item(json!({"content_id": "x1"})),
            item(json!({"content_id": "x2", "date": "2026:01:02 09:00:00"})),
        ],
        UploadScript::Hang,
    ));

    let outcome = upload_with_timeout(
        session.clone(),
        PathBuf::from("/tmp/art.png"),
        "none".to_string(),
        upload_timeout(),
    )
    .await;
    assert!(outcome.is_timeout());

    let resolved = resolve_content_id(session.as_ref(), &before, outcome, None)
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("x2"));
}

#[tokio::test]
async fn identical_snapshots_stay_unresolved() {
    let before = vec![item(json!({"content_id": "x1", "date": "2026:01:01 08:00:00"}))];
    let session = Arc::new(ScriptedSession::new(before.clone(), UploadScript::Hang));

    let outcome = upload_with_timeout(
        session.clone(),
        PathBuf::from("/tmp/art.png"),
        "none".to_string(),
        upload_timeout(),
    )
    .await;
    assert!(outcome.is_timeout());

    let resolved = resolve_content_id(session.as_ref(), &before, outcome, None)
        .await
        .unwrap();
    assert_eq!(resolved, None);

    // No select or delete was ever issued.
    assert_eq!(session.calls_named("select"), 0);
    assert_eq!(session.calls_named("delete"), 0);
}

#[tokio::test]
async fn failed_upload_still_resolves_from_snapshots() {
    let before = vec![item(json!({"content_id": "x1"}))];
    let session = Arc::new(ScriptedSession::new(
        vec![
            item(json!({"content_id": "x1"})),
            item(json!({"content_id": "x9"})),
        ],
        UploadScript::Fail,
    ));

    let outcome = upload_with_timeout(
        session.clone(),
        PathBuf::from("/tmp/art.png"),
        "none".to_string(),
        upload_timeout(),
    )
    .await;
    assert!(matches!(outcome, UploadOutcome::Failed(_)));

    let resolved = resolve_content_id(session.as_ref(), &before, outcome, None)
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("x9"));
}

#[tokio::test]
async fn finalize_selects_persists_and_retires_the_old_artwork() {
    let dir = tempfile::tempdir().unwrap();
    let store = LastIdStore::new(dir.path().join("last_uploaded_id.txt"));
    store.save("old-id");

    let session = ScriptedSession::new(Vec::new(), UploadScript::Confirm("unused"));
    finalize_selection(&session, &store, "x2", Some("MY-C0002"), Some("old-id"))
        .await
        .unwrap();

    assert_eq!(store.load().as_deref(), Some("x2"));
    assert_eq!(session.calls(), vec!["select:x2", "delete:old-id"]);
}

#[tokio::test]
async fn finalize_keeps_an_unchanged_previous_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = LastIdStore::new(dir.path().join("last_uploaded_id.txt"));

    let session = ScriptedSession::new(Vec::new(), UploadScript::Confirm("unused"));
    finalize_selection(&session, &store, "x2", None, Some("x2"))
        .await
        .unwrap();

    assert_eq!(session.calls(), vec!["select:x2"]);
}

#[tokio::test]
async fn detached_upload_keeps_running_after_timeout() {
    let session = Arc::new(ScriptedSession::new(Vec::new(), UploadScript::Hang));

    let outcome = upload_with_timeout(
        session.clone(),
        PathBuf::from("/tmp/art.png"),
        "none".to_string(),
        upload_timeout(),
    )
    .await;
    assert!(outcome.is_timeout());

    // The worker started and was abandoned, not cancelled before launch.
    assert_eq!(session.calls_named("upload"), 1);
}
