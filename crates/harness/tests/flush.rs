use std::sync::Arc;

use tillsync_core::{EntityId, EntityRow, FeedbackRecord, FieldValue, MutationRecord};
use tillsync_engine::{
    BlockReason, FlushOptions, FlushOutcome, ObserverRegistry, OutboxConfig, OutboxQueue,
    SyncEngine, FEEDBACK_TABLE, PRODUCTS_TABLE,
};
use tillsync_harness::{AuthScript, MemoryRemote, ScriptedAuth, SharedSession, TestDevice, Toggle};
use tillsync_storage::{ScopedStore, SqliteStore};

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn offline_flush_leaves_queue_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);
    let changes_before = device.observer.queue_changes().len();

    device.connectivity.set_online(false);
    let outcome = device.flush();

    assert_eq!(outcome, FlushOutcome::default());
    assert_eq!(device.engine.count(), 1);
    assert_eq!(device.remote.upsert_calls(), 0);
    assert_eq!(
        device.observer.queue_changes().len(),
        changes_before,
        "an offline flush must not rewrite the queue"
    );
    Ok(())
}

#[test]
fn empty_queue_flush_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let outcome = device.flush();

    assert_eq!(outcome, FlushOutcome::default());
    assert_eq!(device.remote.upsert_calls(), 0);
    assert_eq!(device.remote.update_calls(), 0);
    Ok(())
}

// ============================================================================
// Authentication gate
// ============================================================================

#[test]
fn missing_session_blocks_and_retains_everything() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);
    device.queue_upsert("Filter Papers", 320);

    device.auth.set(AuthScript::NoSession);
    let outcome = device.flush();

    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.blocked, Some(BlockReason::NoSession));
    assert_eq!(device.engine.count(), 2);
    assert_eq!(device.remote.upsert_calls(), 0);

    // Every record is annotated with why nothing is syncing.
    for mutation in device.engine.current_queue() {
        let failure = mutation.failure.expect("annotated");
        assert!(failure.last_error.contains("no sign-in session"));
    }
    Ok(())
}

#[test]
fn expired_session_blocks_with_expired_reason() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);

    device.auth.set(AuthScript::Expired);
    let outcome = device.flush();

    assert_eq!(outcome.blocked, Some(BlockReason::Expired));
    assert_eq!(device.engine.count(), 1);
    let failure = device.engine.current_queue()[0].failure.clone().expect("annotated");
    assert!(failure.last_error.contains("owner@shop.example"));
    Ok(())
}

#[test]
fn unreachable_verification_blocks_with_no_network() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);

    device.auth.set(AuthScript::Offline);
    let outcome = device.flush();

    assert_eq!(outcome.blocked, Some(BlockReason::NoNetwork));
    assert_eq!(device.engine.count(), 1);
    Ok(())
}

#[test]
fn blocked_records_sync_fine_after_reauth() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p1 = device.queue_upsert("Espresso Beans", 1450);

    device.auth.set(AuthScript::Expired);
    assert_eq!(device.flush().blocked, Some(BlockReason::Expired));

    device.auth.set(AuthScript::Live);
    let outcome = device.flush();

    assert_eq!(outcome, FlushOutcome { processed: 1, failed: 0, blocked: None });
    assert_eq!(device.engine.count(), 0);
    assert!(device.remote.row(PRODUCTS_TABLE, p1).is_some());
    Ok(())
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn partial_failure_retains_only_the_failed_record() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p_a = device.queue_upsert("First", 100);
    let p_b = device.queue_upsert("Second", 200);
    let p_c = device.queue_upsert("Third", 300);

    device.remote.reject_writes_to(p_b);
    let outcome = device.flush();

    assert_eq!(outcome, FlushOutcome { processed: 2, failed: 1, blocked: None });

    let queue = device.engine.current_queue();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].record.entity_id(), p_b);
    let failure = queue[0].failure.clone().expect("failure meta populated");
    assert!(failure.last_error.contains("rejected"));
    assert!(failure.last_attempt_at > 0);

    assert!(device.remote.row(PRODUCTS_TABLE, p_a).is_some());
    assert!(device.remote.row(PRODUCTS_TABLE, p_b).is_none());
    assert!(device.remote.row(PRODUCTS_TABLE, p_c).is_some());
    Ok(())
}

#[test]
fn upsert_archive_setfield_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p1 = EntityId::new();
    let p2 = EntityId::new();

    device.queue_upsert_with_id(p1, "Espresso Beans", 1450);
    device.queue_archive(p2);
    device.queue_set_field(p1, "stock", FieldValue::Integer(5));

    device.remote.reject_writes_to(p2);
    let outcome = device.flush();

    assert_eq!(outcome, FlushOutcome { processed: 2, failed: 1, blocked: None });

    let queue = device.engine.current_queue();
    assert_eq!(queue.len(), 1);
    assert!(matches!(
        queue[0].record,
        MutationRecord::ArchiveEntity { entity_id, .. } if entity_id == p2
    ));
    assert!(queue[0].failure.is_some());

    let row = device.remote.row(PRODUCTS_TABLE, p1).expect("p1 upserted");
    assert_eq!(row.get("name"), Some(&FieldValue::Text("Espresso Beans".into())));
    assert_eq!(row.get("stock"), Some(&FieldValue::Integer(5)));
    assert!(device.remote.row(PRODUCTS_TABLE, p2).is_none());
    Ok(())
}

#[test]
fn replay_is_idempotent_per_entity() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p1 = EntityId::new();

    device.queue_upsert_with_id(p1, "Espresso Beans", 1450);
    assert_eq!(device.flush().processed, 1);

    // The same mutation queued again (crash-before-ack replay) converges to
    // the same single remote row.
    device.queue_upsert_with_id(p1, "Espresso Beans", 1450);
    assert_eq!(device.flush().processed, 1);

    assert_eq!(device.remote.upsert_calls(), 2);
    assert_eq!(device.remote.row_count(PRODUCTS_TABLE), 1);
    Ok(())
}

#[test]
fn archive_stamps_soft_delete_fields() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p1 = device.queue_upsert("Espresso Beans", 1450);
    device.queue_archive(p1);

    assert_eq!(device.flush().processed, 2);

    let row = device.remote.row(PRODUCTS_TABLE, p1).expect("row exists");
    assert_eq!(row.get("archived"), Some(&FieldValue::Boolean(true)));
    assert!(matches!(row.get("archived_at"), Some(FieldValue::Timestamp(ms)) if *ms > 0));
    Ok(())
}

#[test]
fn failed_record_recovers_on_a_later_flush() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    let p1 = device.queue_upsert("Espresso Beans", 1450);

    device.remote.reject_writes_to(p1);
    assert_eq!(device.flush(), FlushOutcome { processed: 0, failed: 1, blocked: None });
    assert_eq!(device.engine.failed_records().len(), 1);

    device.remote.allow_writes_to(p1);
    assert_eq!(device.flush(), FlushOutcome { processed: 1, failed: 0, blocked: None });
    assert_eq!(device.engine.count(), 0);
    assert!(device.remote.row(PRODUCTS_TABLE, p1).is_some());
    Ok(())
}

#[test]
fn filtered_records_are_retained_unattempted() -> Result<(), Box<dyn std::error::Error>> {
    let session = SharedSession::new();
    session.sign_in("b1", "u1");
    let auth = ScriptedAuth::live("owner@shop.example");
    let remote = MemoryRemote::new();
    let observers = ObserverRegistry::new();
    let outbox = OutboxQueue::new(
        OutboxConfig::inventory(),
        ScopedStore::new(SqliteStore::open_in_memory()?),
        Arc::new(session.clone()),
        observers.clone(),
    );
    let mut engine = SyncEngine::new(
        outbox,
        Box::new(auth),
        Box::new(remote.clone()),
        Box::new(Toggle::online()),
        observers,
    )
    .with_record_filter(Box::new(|m| {
        !matches!(m.record, MutationRecord::ArchiveEntity { .. })
    }));

    let p1 = EntityId::new();
    let p2 = EntityId::new();
    engine.enqueue(MutationRecord::upsert(
        EntityRow::new(p1).with_field("name", FieldValue::Text("Espresso Beans".into())),
    ));
    engine.enqueue(MutationRecord::archive(p2));

    let outcome = engine.flush(FlushOptions::default());

    assert_eq!(outcome, FlushOutcome { processed: 1, failed: 1, blocked: None });
    let queue = engine.current_queue();
    assert_eq!(queue.len(), 1);
    assert!(matches!(queue[0].record, MutationRecord::ArchiveEntity { .. }));
    assert!(queue[0].failure.is_none(), "skipped records are retained unchanged");
    assert_eq!(remote.update_calls(), 0, "skipped records are never attempted");
    Ok(())
}

#[test]
fn feedback_queue_replays_into_feedback_table() -> Result<(), Box<dyn std::error::Error>> {
    let session = SharedSession::new();
    session.sign_in("b1", "u1");
    let remote = MemoryRemote::new();
    let observers = ObserverRegistry::new();
    let outbox = OutboxQueue::new(
        OutboxConfig::feedback(),
        ScopedStore::new(SqliteStore::open_in_memory()?),
        Arc::new(session.clone()),
        observers.clone(),
    );
    let mut engine: SyncEngine<FeedbackRecord> = SyncEngine::new(
        outbox,
        Box::new(ScriptedAuth::live("owner@shop.example")),
        Box::new(remote.clone()),
        Box::new(Toggle::online()),
        observers,
    );

    engine.enqueue(FeedbackRecord::submit("receipt printer jams", Some(2)));
    engine.enqueue(FeedbackRecord::submit("love the new layout", Some(5)));

    let outcome = engine.flush(FlushOptions { silent: true });

    assert_eq!(outcome, FlushOutcome { processed: 2, failed: 0, blocked: None });
    assert_eq!(remote.row_count(FEEDBACK_TABLE), 2);
    assert_eq!(engine.count(), 0);
    Ok(())
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn flush_fires_queue_change_and_optional_summary() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);

    let changes_before = device.observer.queue_changes().len();
    let outcome = device.flush();

    assert_eq!(outcome.processed, 1);
    let changes = device.observer.queue_changes();
    assert_eq!(changes.len(), changes_before + 1);
    assert_eq!(changes.last().map(|(_, len)| *len), Some(0));
    assert_eq!(device.observer.flush_summaries(), vec![outcome]);
    Ok(())
}

#[test]
fn silent_flush_skips_the_summary() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);

    let outcome = device.flush_silent();

    assert_eq!(outcome.processed, 1);
    assert!(device.observer.flush_summaries().is_empty());
    Ok(())
}

#[test]
fn blocked_flush_notifies_queue_change_but_no_summary() -> Result<(), Box<dyn std::error::Error>> {
    let mut device = TestDevice::signed_in("b1", "u1")?;
    device.queue_upsert("Espresso Beans", 1450);

    device.auth.set(AuthScript::NoSession);
    let changes_before = device.observer.queue_changes().len();
    let outcome = device.flush();

    assert_eq!(outcome.blocked, Some(BlockReason::NoSession));
    // Annotation is a queue mutation, so badges refresh...
    assert_eq!(device.observer.queue_changes().len(), changes_before + 1);
    // ...but the caller surfaces the block through the outcome, not a summary.
    assert!(device.observer.flush_summaries().is_empty());
    Ok(())
}
