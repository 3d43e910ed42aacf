use pretty_assertions::assert_eq;
use quillpath_types::{Category, LevelId, ProgressField, ProgressState};

// ── Initial state ───────────────────────────────────────────────

#[test]
fn initial_state_unlocks_entry_level() {
    let state = ProgressState::initial(LevelId::new("mechanics-1"));
    assert_eq!(state.current_level_id.as_str(), "mechanics-1");
    assert!(state.is_unlocked("mechanics-1"));
    assert!(!state.is_completed("mechanics-1"));
    assert_eq!(state.progress_of("mechanics-1"), 0);
    assert_eq!(state.total_score, 0);
    assert_eq!(state.daily_streak, 0);
    assert!(state.achievements.is_empty());
}

#[test]
fn progress_of_unknown_level_is_zero() {
    let state = ProgressState::initial(LevelId::new("mechanics-1"));
    assert_eq!(state.progress_of("voice-3"), 0);
}

// ── Serialization ───────────────────────────────────────────────

#[test]
fn serde_roundtrip_is_field_for_field() {
    let mut state = ProgressState::initial(LevelId::new("mechanics-1"));
    state.level_progress.insert(LevelId::new("mechanics-1"), 100);
    state.completed_levels.insert(LevelId::new("mechanics-1"));
    state.unlocked_levels.insert(LevelId::new("mechanics-2"));
    state.current_level_id = LevelId::new("mechanics-2");
    state.total_score = 340;
    state.daily_streak = 4;
    state.last_active_on = chrono::NaiveDate::from_ymd_opt(2026, 3, 14);

    let json = serde_json::to_string(&state).unwrap();
    let back: ProgressState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}

#[test]
fn missing_collections_default_to_empty() {
    let json = r#"{"current_level_id":"mechanics-1","last_updated":"2026-01-01T00:00:00Z"}"#;
    let state: ProgressState = serde_json::from_str(json).unwrap();
    assert!(state.level_progress.is_empty());
    assert!(state.unlocked_levels.is_empty());
    assert_eq!(state.total_score, 0);
}

#[test]
fn field_names_match_serialized_keys() {
    let state = ProgressState::initial(LevelId::new("mechanics-1"));
    let value = serde_json::to_value(&state).unwrap();
    let object = value.as_object().unwrap();
    for field in ProgressField::ALL {
        assert!(object.contains_key(field.as_str()), "missing key {field}");
    }
    assert_eq!(object.len(), ProgressField::ALL.len());
}

// ── Identifiers ─────────────────────────────────────────────────

#[test]
fn level_id_serializes_as_plain_string() {
    let id = LevelId::new("voice-2");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"voice-2\"");
    assert_eq!(id.to_string(), "voice-2");
}

#[test]
fn categories_are_ordered_by_curriculum() {
    assert!(Category::Mechanics < Category::Sequencing);
    assert!(Category::Sequencing < Category::Voice);
    assert_eq!(Category::first(), Category::Mechanics);
    assert_eq!(serde_json::to_string(&Category::Voice).unwrap(), "\"voice\"");
}
