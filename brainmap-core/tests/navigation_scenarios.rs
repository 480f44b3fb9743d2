//! End-to-end navigation scenarios over a persisted playbook collection.

use std::time::{Duration, Instant};

use brainmap_core::codec::decode_playbooks;
use brainmap_core::{
    BrainmapError, ImportMode, JsonFileRepository, NavOutcome, NavigationEngine, PlaybookStore,
    Target, ValidationError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/incidents.json");
const CAPACITY: u32 = 200;

fn fixture_store() -> PlaybookStore {
    let mut store = PlaybookStore::new(CAPACITY);
    store.import_json(FIXTURE, ImportMode::Replace).unwrap();
    store
}

fn open(store: &PlaybookStore, title: &str) -> NavigationEngine {
    let mut engine = NavigationEngine::default();
    engine.show_panel(store.find_by_title(title).unwrap());
    engine
}

#[test]
fn phishing_attachment_condition_lands_on_persistence_scan() {
    let store = fixture_store();
    let mut engine = open(&store, "Phishing");
    let now = Instant::now();

    // Move to the second step and take its first branch.
    assert_eq!(
        engine.resolve(&store, Some("step:2"), None, None, now),
        NavOutcome::InPage { step: 1 }
    );
    let outcome = engine.follow_condition(&store, 0, now);
    assert!(matches!(outcome, NavOutcome::Switching { step: 2, .. }));

    engine.tick(now + Duration::from_secs(1));
    let (playbook, step) = engine.current(&store).unwrap();
    assert_eq!(playbook.title, "Malware Attack");
    assert_eq!(playbook.index, 100);
    assert_eq!(step, 2);
    assert_eq!(playbook.steps[step].title, "Scan for persistence mechanisms");
}

#[test]
fn step_four_on_six_step_playbook_stays_in_page() {
    let store = fixture_store();
    let mut engine = open(&store, "Phishing");
    let now = Instant::now();

    assert_eq!(store.find_by_title("Phishing").unwrap().steps.len(), 6);
    assert_eq!(
        engine.resolve(&store, Some("step:4"), None, None, now),
        NavOutcome::InPage { step: 3 }
    );
    assert!(!engine.is_navigating());
    let (playbook, step) = engine.current(&store).unwrap();
    assert_eq!(playbook.title, "Phishing");
    assert_eq!(step, 3);
}

#[test]
fn legacy_next_condition_is_normalized_to_following_step() {
    let store = fixture_store();
    let phishing = store.find_by_title("Phishing").unwrap();
    assert_eq!(phishing.steps[1].conditions[2].target, Target::Step(2));

    let mut engine = open(&store, "Phishing");
    let now = Instant::now();
    engine.resolve_target(&store, &Target::Step(1), now);
    assert_eq!(
        engine.follow_condition(&store, 2, now),
        NavOutcome::InPage { step: 2 }
    );
}

#[test]
fn link_without_target_step_lands_on_first_step() {
    let store = fixture_store();
    let mut engine = open(&store, "Phishing");
    let now = Instant::now();

    engine.resolve_target(&store, &Target::Step(3), now);
    let outcome = engine.follow_link(&store, 0, now);
    assert!(matches!(
        outcome,
        NavOutcome::Switching { ref playbook, step: 0, .. } if playbook == "Data Exfiltration"
    ));
}

#[test]
fn import_with_missing_title_leaves_store_unchanged() {
    let mut store = fixture_store();
    let before = store.all().to_vec();

    let bad = r##"[
      { "title": "Ransomware", "index": 45, "color": "#8E44AD", "steps": [ { "title": "Disconnect" } ] },
      { "index": 46, "color": "#8E44AD", "steps": [ { "title": "Orphan" } ] }
    ]"##;

    for mode in [ImportMode::Replace, ImportMode::Merge] {
        let err = store.import_json(bad, mode).unwrap_err();
        assert!(matches!(
            err,
            BrainmapError::Validation(ValidationError::Malformed { position: 1, .. })
        ));
        assert_eq!(store.all(), before.as_slice());
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    let mut store = fixture_store();
    let err = store
        .import_json("[{\"title\": \"x\",", ImportMode::Replace)
        .unwrap_err();
    assert!(matches!(err, BrainmapError::Parse(_)));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn save_load_roundtrip_through_file() {
    let dir = TempDir::new().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("playbooks.json"), true);

    let mut store = fixture_store();
    store.save(&repo).await.unwrap();

    let mut reloaded = PlaybookStore::new(CAPACITY);
    assert!(reloaded.load(&repo).await.unwrap());
    assert_eq!(reloaded.all(), store.all());

    // saving the reloaded collection again is stable
    reloaded.save(&repo).await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("playbooks.json")).unwrap();
    assert_eq!(decode_playbooks(&on_disk, CAPACITY).unwrap(), store.all());
}

#[test]
fn broken_reference_is_ignored_by_viewer_and_reported_to_editor() {
    let mut store = fixture_store();
    store.remove(150).unwrap();

    let issues = store.audit_links();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].playbook, "Phishing");
    assert_eq!(issues[0].step, 4);

    let mut engine = open(&store, "Phishing");
    let now = Instant::now();
    engine.resolve_target(&store, &Target::Step(3), now);
    let outcome = engine.follow_link(&store, 0, now);
    assert!(matches!(outcome, NavOutcome::Ignored(_)));
    assert_eq!(engine.view().unwrap().playbook, "Phishing");
    assert!(!engine.is_navigating());
}
