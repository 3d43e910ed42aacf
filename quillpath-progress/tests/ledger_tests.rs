use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quillpath_curriculum::{CategoryGate, Curriculum, CurriculumConfig, Level, XpCurve};
use quillpath_progress::{MutationOutcome, ProgressLedger, ProgressPatch, PROGRESS_KEY};
use quillpath_storage::{MemoryStorage, Storage};
use quillpath_sync::{ConnectivityFlag, RemoteStore, SyncConfig, SyncReconciler, SyncResult};
use quillpath_types::{Category, LevelId};
use serde_json::{Map, Value};
use std::sync::Arc;

// ── Helpers ─────────────────────────────────────────────────────

struct NullRemote;

#[async_trait]
impl RemoteStore for NullRemote {
    async fn save(&self, _learner_id: &str, _document: &Value) -> SyncResult<()> {
        Ok(())
    }

    async fn save_partial(&self, _learner_id: &str, _fields: &Map<String, Value>) -> SyncResult<()> {
        Ok(())
    }

    async fn load(&self, _learner_id: &str) -> SyncResult<Option<Value>> {
        Ok(None)
    }
}

fn ledger_on(curriculum: Curriculum, storage: MemoryStorage) -> ProgressLedger {
    let storage: Arc<dyn Storage> = Arc::new(storage);
    let reconciler = SyncReconciler::new(
        "progress",
        "learner-1",
        Arc::new(NullRemote),
        Arc::new(ConnectivityFlag::new(false)),
        storage.clone(),
        SyncConfig::default(),
    );
    ProgressLedger::load(Arc::new(curriculum), storage, reconciler)
}

fn ledger() -> ProgressLedger {
    ledger_on(Curriculum::standard(), MemoryStorage::new())
}

/// Two-category curriculum where `a` gates category sequencing at 70%.
fn gated_curriculum() -> Curriculum {
    Curriculum::new(CurriculumConfig {
        default_level: LevelId::new("a"),
        levels: vec![
            Level::new("a", Category::Mechanics, 1, 1),
            Level::new("a2", Category::Mechanics, 2, 2).requires("a"),
            Level::new("b", Category::Sequencing, 2, 1).requires("a2"),
        ],
        gates: vec![CategoryGate {
            category: Category::Sequencing,
            gate_level: LevelId::new("a"),
            threshold: 70,
        }],
        xp_curve: XpCurve::default(),
    })
    .unwrap()
}

// ── End-to-end ──────────────────────────────────────────────────

#[test]
fn finishing_entry_level_advances_learner() {
    let ledger = ledger();
    assert_eq!(ledger.current_level().as_str(), "mechanics-1");
    assert_eq!(ledger.progress_of("mechanics-1"), 0);

    let outcome = ledger.update_category_progress("mechanics-1", 100);
    let report = outcome.report().unwrap();
    assert_eq!(report.completed, vec![LevelId::new("mechanics-1")]);
    assert_eq!(report.advanced_to, Some(LevelId::new("mechanics-2")));

    let state = ledger.snapshot();
    assert!(state.is_completed("mechanics-1"));
    assert_eq!(state.progress_of("mechanics-1"), 100);
    assert_eq!(state.current_level_id.as_str(), "mechanics-2");
    assert!(state.is_unlocked("mechanics-2"));
    assert_eq!(state.progress_of("mechanics-2"), 0);
    assert!(ledger.is_dirty());
}

#[test]
fn partial_progress_does_not_complete() {
    let ledger = ledger();
    assert!(ledger.update_category_progress("mechanics-1", 60).is_applied());
    assert!(!ledger.is_level_completed("mechanics-1"));
    assert_eq!(ledger.current_level().as_str(), "mechanics-1");
}

// ── Monotonicity ────────────────────────────────────────────────

#[test]
fn lower_progress_is_ignored() {
    let ledger = ledger();
    ledger.update_category_progress("mechanics-1", 50);
    assert_eq!(ledger.update_category_progress("mechanics-1", 30), MutationOutcome::Unchanged);
    assert_eq!(ledger.update_category_progress("mechanics-1", 50), MutationOutcome::Unchanged);
    assert_eq!(ledger.progress_of("mechanics-1"), 50);
}

#[test]
fn progress_above_hundred_is_clamped() {
    let ledger = ledger();
    ledger.update_category_progress("mechanics-2", 250);
    assert_eq!(ledger.progress_of("mechanics-2"), 100);
}

proptest! {
    #[test]
    fn stored_progress_never_decreases(values in proptest::collection::vec(0u8..=100, 1..40)) {
        let ledger = ledger();
        let mut previous = 0;
        for value in values {
            ledger.update_category_progress("mechanics-2", value);
            let stored = ledger.progress_of("mechanics-2");
            prop_assert!(stored >= previous);
            prop_assert_eq!(stored, previous.max(value));
            previous = stored;
        }
    }
}

// ── Idempotence ─────────────────────────────────────────────────

#[test]
fn complete_level_twice_matches_once() {
    let ledger = ledger();
    assert!(ledger.complete_level("mechanics-1").is_applied());
    let once = ledger.snapshot();
    assert_eq!(ledger.complete_level("mechanics-1"), MutationOutcome::Unchanged);
    assert_eq!(ledger.snapshot(), once);
}

#[test]
fn unlock_level_twice_matches_once() {
    let ledger = ledger();
    assert!(ledger.unlock_level("voice-1").is_applied());
    let once = ledger.snapshot();
    assert_eq!(ledger.unlock_level("voice-1"), MutationOutcome::Unchanged);
    assert_eq!(ledger.snapshot(), once);
}

#[test]
fn unlock_achievement_twice_returns_none() {
    let ledger = ledger();
    let first = ledger.unlock_achievement("project-started").unwrap();
    assert_eq!(first.title, "Blank Page Beaten");
    let once = ledger.snapshot();
    assert!(ledger.unlock_achievement("project-started").is_none());
    assert_eq!(ledger.snapshot(), once);
}

#[test]
fn unknown_ids_are_not_found() {
    let ledger = ledger();
    assert_eq!(ledger.complete_level("nope"), MutationOutcome::UnknownLevel);
    assert_eq!(ledger.unlock_level("nope"), MutationOutcome::UnknownLevel);
    assert_eq!(ledger.update_category_progress("nope", 10), MutationOutcome::UnknownLevel);
    assert!(ledger.unlock_achievement("nope").is_none());
    assert!(!ledger.is_dirty());
}

#[test]
fn unchanged_progress_is_a_fixed_point() {
    let ledger = ledger();
    ledger.update_category_progress("mechanics-1", 100);
    let settled = ledger.snapshot();
    for _ in 0..3 {
        assert_eq!(ledger.update_category_progress("mechanics-1", 100), MutationOutcome::Unchanged);
    }
    assert_eq!(ledger.snapshot(), settled);
}

// ── Unlock rules ────────────────────────────────────────────────

#[test]
fn category_gate_respects_threshold() {
    let ledger = ledger_on(gated_curriculum(), MemoryStorage::new());
    ledger.update_category_progress("a", 69);
    assert!(!ledger.is_level_unlocked("b"));
    let outcome = ledger.update_category_progress("a", 70);
    assert!(ledger.is_level_unlocked("b"));
    assert_eq!(outcome.report().unwrap().unlocked, vec![LevelId::new("b")]);
    // Unlocking a category does not move the learner.
    assert_eq!(ledger.current_level().as_str(), "a");
}

#[test]
fn standard_gate_unlocks_sequencing_entry() {
    let ledger = ledger();
    ledger.update_category_progress("mechanics-2", 70);
    assert!(ledger.is_level_unlocked("sequencing-1"));
    assert!(!ledger.is_level_unlocked("voice-1"));
}

#[test]
fn completing_other_level_does_not_advance() {
    let ledger = ledger();
    ledger.unlock_level("mechanics-2");
    let outcome = ledger.complete_level("mechanics-2");
    assert!(outcome.is_applied());
    assert_eq!(ledger.current_level().as_str(), "mechanics-1");
    assert_eq!(ledger.progress_of("mechanics-2"), 100);
}

#[test]
fn advancing_onto_finished_level_cascades() {
    let ledger = ledger();
    // Progress recorded on the successor before it was reached.
    ledger.update_category_progress("mechanics-2", 100);
    ledger.update_category_progress("mechanics-1", 100);
    let state = ledger.snapshot();
    assert!(state.is_completed("mechanics-2"));
    assert_eq!(state.current_level_id.as_str(), "mechanics-3");
}

#[test]
fn advances_onto_successor_opened_by_gate() {
    let ledger = ledger();
    ledger.complete_level("mechanics-1");
    ledger.complete_level("mechanics-2");
    // mechanics-2 at 100 already opened sequencing-1.
    assert!(ledger.is_level_unlocked("sequencing-1"));
    assert_eq!(ledger.current_level().as_str(), "mechanics-3");

    let outcome = ledger.complete_level("mechanics-3");
    assert_eq!(outcome.report().unwrap().advanced_to, Some(LevelId::new("sequencing-1")));
    assert_eq!(ledger.current_level().as_str(), "sequencing-1");
}

#[test]
fn last_level_completes_without_successor() {
    let ledger = ledger();
    ledger.set_progress(ProgressPatch {
        current_level_id: Some(LevelId::new("voice-3")),
        ..ProgressPatch::default()
    });
    let outcome = ledger.update_category_progress("voice-3", 100);
    assert_eq!(outcome.report().unwrap().advanced_to, None);
    assert_eq!(ledger.current_level().as_str(), "voice-3");
    assert!(ledger.is_level_completed("voice-3"));
}

// ── Score, streak, achievements ─────────────────────────────────

#[test]
fn score_accumulates_and_drives_rank() {
    let ledger = ledger();
    assert_eq!(ledger.rank(), 1);
    ledger.add_score(60);
    ledger.add_score(60);
    assert_eq!(ledger.snapshot().total_score, 120);
    assert_eq!(ledger.rank(), 2);
    assert_eq!(ledger.add_score(0), MutationOutcome::Unchanged);
}

#[test]
fn first_completion_awards_achievement() {
    let ledger = ledger();
    let outcome = ledger.complete_level("mechanics-1");
    assert_eq!(outcome.report().unwrap().achievements, vec!["first-steps".to_string()]);
    assert!(ledger.snapshot().has_achievement("first-steps"));
    // Already earned: explicit unlock is a no-op.
    assert!(ledger.unlock_achievement("first-steps").is_none());
}

#[test]
fn daily_activity_tracks_streak() {
    let ledger = ledger();
    let day = |d| NaiveDate::from_ymd_opt(2026, 5, d).unwrap();
    ledger.record_daily_activity(day(1));
    ledger.record_daily_activity(day(2));
    assert_eq!(ledger.record_daily_activity(day(2)), MutationOutcome::Unchanged);
    ledger.record_daily_activity(day(3));
    assert_eq!(ledger.snapshot().daily_streak, 3);

    ledger.record_daily_activity(day(6));
    assert_eq!(ledger.snapshot().daily_streak, 1);
}

#[test]
fn week_streak_awards_achievement() {
    let ledger = ledger();
    for _ in 0..7 {
        ledger.increment_streak();
    }
    assert_eq!(ledger.snapshot().daily_streak, 7);
    assert!(ledger.snapshot().has_achievement("week-streak"));
}

// ── Bulk restore & reset ────────────────────────────────────────

#[test]
fn set_progress_merges_and_restores_invariants() {
    let ledger = ledger();
    let outcome = ledger.set_progress(ProgressPatch {
        current_level_id: Some(LevelId::new("sequencing-1")),
        unlocked_levels: Some(Default::default()),
        total_score: Some(500),
        ..ProgressPatch::default()
    });
    assert!(outcome.is_applied());
    let state = ledger.snapshot();
    assert_eq!(state.total_score, 500);
    assert!(state.is_unlocked("mechanics-1"));
    assert!(state.is_unlocked("sequencing-1"));
    assert!(ledger.reconciler().envelope().full_required);
}

#[test]
fn empty_patch_is_a_noop() {
    let ledger = ledger();
    assert_eq!(ledger.set_progress(ProgressPatch::default()), MutationOutcome::Unchanged);
    assert!(!ledger.is_dirty());
}

#[test]
fn reset_returns_to_defaults() {
    let ledger = ledger();
    ledger.update_category_progress("mechanics-1", 100);
    ledger.add_score(40);
    ledger.reset_progress();
    let state = ledger.snapshot();
    assert_eq!(state.current_level_id.as_str(), "mechanics-1");
    assert!(state.completed_levels.is_empty());
    assert_eq!(state.total_score, 0);
}

// ── Persistence ─────────────────────────────────────────────────

#[test]
fn state_survives_reload() {
    let storage = MemoryStorage::new();
    let first = ledger_on(Curriculum::standard(), storage.clone());
    first.update_category_progress("mechanics-1", 100);
    first.add_score(25);
    let before = first.snapshot();

    let second = ledger_on(Curriculum::standard(), storage);
    assert!(second.restored_from_storage());
    assert_eq!(second.snapshot(), before);
}

#[test]
fn corrupt_state_falls_back_to_defaults() {
    let storage = MemoryStorage::new();
    storage.set(PROGRESS_KEY, "{\"version\":1,\"data\":{\"current_level_id\":");
    let ledger = ledger_on(Curriculum::standard(), storage);
    assert!(!ledger.restored_from_storage());
    assert_eq!(ledger.current_level().as_str(), "mechanics-1");
    assert!(ledger.is_level_unlocked("mechanics-1"));
}
