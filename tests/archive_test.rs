//! `.guideme` export and import

mod common;

use std::sync::Arc;

use chrono::Utc;
use guideme::archive::{export_entry, export_session, import, to_pretty_json, GuideArchive, ImportError};
use guideme::guide::{GuideSession, Step, StepAction};
use guideme::storage::MemoryStore;
use guideme::synth::SelectorBundle;

fn finished_session() -> GuideSession {
    let steps = vec![
        Step::new("Click \"Edit profile\"", StepAction::Click)
            .with_bundle(SelectorBundle {
                aria_label: Some("Edit profile".into()),
                text_content: Some("Edit".into()),
                tag_name: Some("button".into()),
                ..Default::default()
            })
            .on_page("https://example.com/profile"),
        Step::new("Type your name", StepAction::Type)
            .with_value("Ada")
            .with_bundle(SelectorBundle {
                name: Some("display_name".into()),
                tag_name: Some("input".into()),
                ..Default::default()
            }),
        Step::new("Click \"Save\"", StepAction::Click).with_bundle(SelectorBundle {
            data_test_id: Some("save-profile".into()),
            ..Default::default()
        }),
    ];
    let mut session = GuideSession::new("update my display name", vec![]);
    session.all_steps_for_saving = steps;
    session.start_url = Some("https://example.com/profile".into());
    session
}

#[test]
fn test_round_trip_keeps_steps_and_verifies() {
    let session = finished_session();
    let exported = export_session(&session, "Update display name", Utc::now());
    let raw = to_pretty_json(&exported).unwrap();

    let imported = import(&raw).unwrap();
    assert!(imported.checksum_ok);
    assert!(imported.warnings.is_empty(), "{:?}", imported.warnings);

    let restored = imported.session();
    assert_eq!(restored.steps.len(), session.all_steps_for_saving.len());
    for (a, b) in restored.steps.iter().zip(&session.all_steps_for_saving) {
        assert_eq!(a.description, b.description);
        assert_eq!(a.action, b.action);
    }
    assert_eq!(restored.steps[1].value.as_deref(), Some("Ada"));

    let again = export_entry(&imported.entry, Utc::now());
    let primaries = |doc: &guideme::archive::ArchiveDocument| -> Vec<(String, String)> {
        doc.steps
            .iter()
            .map(|s| {
                let t = s.target.as_ref().expect("target");
                (t.primary.kind.clone(), t.primary.value.clone())
            })
            .collect()
    };
    assert_eq!(primaries(&again), primaries(&exported));
    assert_eq!(
        primaries(&exported)[2],
        ("testid".to_string(), "save-profile".to_string())
    );
}

#[test]
fn test_missing_format_names_the_identifier() {
    let session = finished_session();
    let exported = export_session(&session, "Update display name", Utc::now());
    let mut value = serde_json::to_value(&exported).unwrap();
    value.as_object_mut().unwrap().remove("format");

    let err = import(&value.to_string()).unwrap_err();
    assert_eq!(err, ImportError::MissingFormat);
    assert!(err.to_string().contains("\"guideme\""));
}

#[tokio::test]
async fn test_failed_import_leaves_archive_untouched() {
    let archive = GuideArchive::new(Arc::new(MemoryStore::new()));
    let result = archive.import_document(r#"{"version": "1.0", "steps": []}"#).await;
    assert!(result.is_err());
    assert!(archive.list().await.unwrap().is_empty());

    let result = archive.import_document(r#"{"format": "guideme", "version": "2.0"}"#).await;
    assert!(matches!(
        result,
        Err(guideme::GuideError::Import(ImportError::UnsupportedVersion { .. }))
    ));
    assert!(archive.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_saved_guide_exports_and_reimports_alongside() {
    let archive = GuideArchive::new(Arc::new(MemoryStore::new()));
    let session = finished_session();
    let saved = archive
        .save(
            "Update display name",
            &session.original_task,
            session.all_steps_for_saving.clone(),
            session.start_url.clone(),
        )
        .await
        .unwrap();

    let document = archive.export_entry(&saved.id).await.unwrap();
    assert_eq!(document.metadata.name, "Update display name");
    assert!(document.checksum.starts_with("sha256:"));

    let imported = archive
        .import_document(&to_pretty_json(&document).unwrap())
        .await
        .unwrap();
    assert_ne!(imported.entry.id, saved.id, "clashing id replaced");
    assert_eq!(archive.list().await.unwrap().len(), 2);
}
