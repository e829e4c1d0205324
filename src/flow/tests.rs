//! Tests for the flow session store

use super::*;
use crate::photos::{test_png, PhotoAttachmentCache, PhotoSource};
use crate::validation::Field;
use tempfile::TempDir;

fn new_store(kind: FlowKind) -> (FlowSessionStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let cache = PhotoAttachmentCache::new(temp_dir.path().join("photos"));
    (FlowSessionStore::new(kind, cache), temp_dir)
}

fn photo() -> PhotoSource {
    PhotoSource::Bytes {
        data: test_png(10, 10),
        file_name: Some("pet.png".to_string()),
    }
}

fn description_update() -> FlowUpdate {
    FlowUpdate::default()
        .species("Dog")
        .breed("Beagle")
        .gender(AnimalGender::Male)
        .age("4")
        .coordinates("52.2297", "21.0122")
}

fn contact_update() -> FlowUpdate {
    FlowUpdate::default()
        .phone("+48 123 456 789")
        .email("owner@example.com")
}

/// Walk a missing-pet store up to the contact step
fn store_on_contact() -> (FlowSessionStore, TempDir) {
    let (mut store, dir) = new_store(FlowKind::Missing);
    store.advance(FlowStep::Microchip).unwrap();
    store.attach_photo(photo()).unwrap();
    store.advance(FlowStep::Photo).unwrap();
    store.update(description_update()).unwrap();
    store.advance(FlowStep::Description).unwrap();
    (store, dir)
}

// ─── Advance ────────────────────────────────────────────────────────────────

#[test]
fn test_advance_moves_exactly_one_step() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    assert_eq!(store.current_step(), FlowStep::Microchip);

    let outcome = store.advance(FlowStep::Microchip).unwrap();
    assert_eq!(outcome, AdvanceOutcome::Moved(FlowStep::Photo));
    assert_eq!(store.current_step(), FlowStep::Photo);

    store.attach_photo(photo()).unwrap();
    assert_eq!(
        store.advance(FlowStep::Photo).unwrap(),
        AdvanceOutcome::Moved(FlowStep::Description)
    );

    store.update(description_update()).unwrap();
    assert_eq!(
        store.advance(FlowStep::Description).unwrap(),
        AdvanceOutcome::Moved(FlowStep::Contact)
    );
}

#[test]
fn test_advance_from_contact_is_ready_to_submit() {
    let (mut store, _dir) = store_on_contact();
    store.update(contact_update()).unwrap();

    assert_eq!(
        store.advance(FlowStep::Contact).unwrap(),
        AdvanceOutcome::ReadyToSubmit
    );
    assert_eq!(store.current_step(), FlowStep::Contact);
}

#[test]
fn test_advance_invalid_keeps_step_and_reports_fields() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    store.advance(FlowStep::Microchip).unwrap();

    let err = store.advance(FlowStep::Photo).unwrap_err();
    match err {
        FlowError::Validation(result) => assert_eq!(result.fields(), vec![Field::Photo]),
        other => panic!("Expected validation error, got {other:?}"),
    }
    assert_eq!(store.current_step(), FlowStep::Photo);
    assert!(store.errors().error(Field::Photo).is_some());
}

#[test]
fn test_advance_invalid_emits_toast() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    let mut notices = store.notices();
    store
        .update(FlowUpdate::default().microchip("1234567890123456789"))
        .unwrap();

    assert!(store.advance(FlowStep::Microchip).is_err());
    let FlowNotice::Toast(message) = notices.try_recv().unwrap();
    assert!(message.contains("15"));
}

#[test]
fn test_advance_rejects_stale_step() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    let err = store.advance(FlowStep::Photo).unwrap_err();
    assert!(matches!(
        err,
        FlowError::StepMismatch {
            requested: FlowStep::Photo,
            current: FlowStep::Microchip
        }
    ));
    assert_eq!(store.current_step(), FlowStep::Microchip);
}

#[test]
fn test_completed_flow_rejects_transitions() {
    let (mut store, _dir) = store_on_contact();
    store.update(contact_update()).unwrap();
    store.mark_submitted("654321");

    assert!(store.state().is_completed());
    assert!(matches!(
        store.advance(FlowStep::Completed),
        Err(FlowError::Completed)
    ));
    assert!(matches!(store.retreat(), Err(FlowError::Completed)));
    assert!(matches!(
        store.update(FlowUpdate::default().phone("1234567")),
        Err(FlowError::Completed)
    ));
    assert_eq!(store.state().management_password.as_deref(), Some("654321"));
}

// ─── Update ─────────────────────────────────────────────────────────────────

#[test]
fn test_update_never_changes_step() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    store.update(description_update()).unwrap();
    store.update(contact_update()).unwrap();
    assert_eq!(store.current_step(), FlowStep::Microchip);
    assert_eq!(store.state().animal_species.as_deref(), Some("Dog"));
    assert_eq!(store.state().contact.email, "owner@example.com");
}

#[test]
fn test_species_change_clears_breed_and_error() {
    let (mut store, _dir) = store_on_contact();
    store.retreat().unwrap();
    store.update(FlowUpdate::default().breed("  ")).unwrap();
    assert!(store.advance(FlowStep::Description).is_err());
    assert!(store.errors().error(Field::AnimalBreed).is_some());

    store.update(FlowUpdate::default().species("Cat")).unwrap();
    assert!(store.state().animal_breed.is_none());
    assert!(store.errors().error(Field::AnimalBreed).is_none());
}

#[test]
fn test_same_species_keeps_breed() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    store.update(description_update()).unwrap();
    store.update(FlowUpdate::default().species("Dog")).unwrap();
    assert_eq!(store.state().animal_breed.as_deref(), Some("Beagle"));
}

#[test]
fn test_update_clears_touched_field_errors() {
    let (mut store, _dir) = store_on_contact();
    assert!(store.advance(FlowStep::Contact).is_err());
    assert_eq!(store.errors().fields(), vec![Field::Phone, Field::Email]);

    store.update(FlowUpdate::default().phone("123")).unwrap();
    assert_eq!(store.errors().fields(), vec![Field::Email]);
}

#[test]
fn test_blank_reward_is_absent() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    store.update(FlowUpdate::default().reward("  ")).unwrap();
    assert!(store.state().contact.reward_description.is_none());

    store.update(FlowUpdate::default().reward("100 EUR")).unwrap();
    assert_eq!(
        store.state().contact.reward_description.as_deref(),
        Some("100 EUR")
    );
}

// ─── Retreat / Clear ────────────────────────────────────────────────────────

#[test]
fn test_retreat_preserves_later_data() {
    let (mut store, _dir) = store_on_contact();
    store.update(contact_update()).unwrap();

    assert_eq!(
        store.retreat().unwrap(),
        RetreatOutcome::Moved(FlowStep::Description)
    );
    assert_eq!(store.retreat().unwrap(), RetreatOutcome::Moved(FlowStep::Photo));
    assert_eq!(store.state().contact.phone, "+48 123 456 789");
    assert!(store.photo().is_some());

    // Forward again without re-entering anything
    store.advance(FlowStep::Photo).unwrap();
    store.advance(FlowStep::Description).unwrap();
    assert_eq!(
        store.advance(FlowStep::Contact).unwrap(),
        AdvanceOutcome::ReadyToSubmit
    );
}

#[test]
fn test_retreat_from_first_step_exits_and_clears() {
    let (mut store, _dir) = new_store(FlowKind::Found);
    let meta = store.attach_photo(photo()).unwrap();
    store.update(description_update()).unwrap();

    assert_eq!(store.retreat().unwrap(), RetreatOutcome::Exited);
    assert_eq!(store.state(), &FlowState::new(FlowKind::Found));
    assert!(!meta.cached_location.exists());
}

#[test]
fn test_clear_twice_is_idempotent() {
    let (mut store, _dir) = store_on_contact();
    let photo_path = store.photo().unwrap().cached_location.clone();

    store.clear();
    let first = store.snapshot();
    store.clear();
    let second = store.snapshot();

    assert_eq!(first, second);
    assert_eq!(first.state, FlowState::new(FlowKind::Missing));
    assert!(first.photo.is_none());
    assert!(first.errors.is_valid());
    assert!(!photo_path.exists());
}

#[test]
fn test_clear_bumps_generation() {
    let (mut store, _dir) = store_on_contact();
    let before = store.generation();
    store.update(FlowUpdate::default().email("a@b.co")).unwrap();
    assert_eq!(store.generation(), before);

    store.clear();
    assert_eq!(store.generation(), before + 1);
}

#[test]
fn test_clear_after_completion_reopens() {
    let (mut store, _dir) = store_on_contact();
    store.mark_submitted("654321");
    store.clear();
    assert_eq!(store.current_step(), FlowStep::Microchip);
    assert!(store.state().management_password.is_none());
}

// ─── Photo ──────────────────────────────────────────────────────────────────

#[test]
fn test_attach_photo_replaces_previous() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    let first = store.attach_photo(photo()).unwrap();
    let second = store.attach_photo(photo()).unwrap();

    assert_eq!(store.state().photo_attachment, Some(second.id));
    assert!(!first.cached_location.exists());
    assert!(second.cached_location.exists());
}

#[test]
fn test_remove_photo_blocks_photo_step() {
    let (mut store, _dir) = new_store(FlowKind::Found);
    let meta = store.attach_photo(photo()).unwrap();

    let removed = store.remove_photo().unwrap();
    assert_eq!(removed.map(|m| m.id), Some(meta.id));
    assert!(store.photo().is_none());
    assert!(store.remove_photo().unwrap().is_none());
    assert!(store.advance(FlowStep::Photo).is_err());
}

// ─── Subscription ───────────────────────────────────────────────────────────

#[test]
fn test_subscribers_see_each_mutation() {
    let (mut store, _dir) = new_store(FlowKind::Missing);
    let mut rx = store.subscribe();
    assert!(!rx.has_changed().unwrap());

    store.update(FlowUpdate::default().microchip("123")).unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().state.microchip_number, "123");

    store.advance(FlowStep::Microchip).unwrap();
    assert_eq!(rx.borrow_and_update().state.current_step, FlowStep::Photo);
}
