//! End-to-end journal scenarios over the in-memory feed and channel.

use cipherlog::feed::{FeedLog, ReadQuery};
use cipherlog::{AuthorId, JournalError, Payload, PersistenceId, Window, WireRecord};
use cipherlog_core::chunk_record;
use cipherlog_testkit::{event_record, large_payload, TestNetwork};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pid(id: &str) -> PersistenceId {
    PersistenceId::new(id)
}

fn author(id: &str) -> AuthorId {
    AuthorId::new(id)
}

#[tokio::test]
async fn plaintext_entity_round_trip() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    alice
        .persist(event_record("order-1", 1, json!({"total": 10})))
        .await
        .unwrap();
    alice
        .persist(event_record("order-1", 2, json!({"total": 20})))
        .await
        .unwrap();

    let events = alice
        .events_by_persistence_id(None, &pid("order-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence_nr, 1);
    assert_eq!(events[0].payload, Payload::Plain(json!({"total": 10})));
    assert!(!events[1].encrypted);
}

#[tokio::test]
async fn set_key_encrypts_everything_that_follows() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 2, json!({"note": "attack at dawn"})))
        .await
        .unwrap();

    // On the wire both records are opaque strings.
    let raw = network.feed.read(ReadQuery::all()).await.unwrap();
    assert_eq!(raw.len(), 2);
    for keyed in &raw {
        assert!(keyed.record.encrypted);
        let text = keyed.record.payload.as_str().expect("string ciphertext");
        assert!(!text.contains("attack at dawn"));
    }

    // The writer reads both back decrypted.
    let events = alice
        .events_by_persistence_id(None, &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].payload, Payload::Plain(json!({"note": "attack at dawn"})));
    assert!(!events[1].encrypted);
}

#[tokio::test]
async fn oversized_payload_chunks_on_the_wire_and_reassembles_on_read() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    let payload = large_payload(22_000);
    alice
        .persist(WireRecord::event(pid("vault-1"), 2, "doc.Saved", payload.clone()))
        .await
        .unwrap();

    let raw = network.feed.read(ReadQuery::all()).await.unwrap();
    let parts: Vec<_> = raw
        .iter()
        .filter(|keyed| keyed.record.sequence_nr == 2)
        .collect();
    assert!(parts.len() > 1, "expected multiple parts, got {}", parts.len());
    for (i, keyed) in parts.iter().enumerate() {
        assert_eq!(keyed.record.part, Some(i as u32 + 1));
        assert_eq!(keyed.record.of, Some(parts.len() as u32));
        assert!(
            keyed.record.serialized_len() <= alice.config().max_record_size,
            "part exceeds the record ceiling"
        );
    }

    let events = alice
        .events_by_persistence_id(None, &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].payload, Payload::Plain(payload));
}

#[tokio::test]
async fn rotation_mid_stream_reads_through_both_intervals() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 2, json!({"n": 2})))
        .await
        .unwrap();
    alice
        .persist(WireRecord::set_key(pid("vault-1"), 3))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 4, json!({"n": 4})))
        .await
        .unwrap();

    let events = alice
        .events_by_persistence_id(None, &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[1].payload, Payload::Plain(json!({"n": 2})));
    assert_eq!(events[3].payload, Payload::Plain(json!({"n": 4})));
}

#[tokio::test]
async fn grant_lets_a_reader_decrypt_from_the_beginning() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let bob = network.journal("@bob");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 2, json!({"n": 2})))
        .await
        .unwrap();
    alice
        .persist(WireRecord::grant(pid("vault-1"), 3, author("@bob")))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 4, json!({"n": 4})))
        .await
        .unwrap();

    let events = bob
        .events_by_persistence_id(Some(&author("@alice")), &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[1].payload, Payload::Plain(json!({"n": 2})));
    assert_eq!(events[3].payload, Payload::Plain(json!({"n": 4})));
}

#[tokio::test]
async fn revoke_rotates_and_cuts_off_at_the_revoking_record() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let bob = network.journal("@bob");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(WireRecord::grant(pid("vault-1"), 2, author("@bob")))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 3, json!({"n": 3})))
        .await
        .unwrap();
    alice
        .persist(WireRecord::revoke(pid("vault-1"), 4, author("@bob")))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 5, json!({"n": 5})))
        .await
        .unwrap();

    // Bob decrypts everything strictly before the rotation point.
    let events = bob
        .events_by_persistence_id(Some(&author("@alice")), &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    let seqs: Vec<_> = events.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    // Alice still reads the whole stream.
    let events = alice
        .events_by_persistence_id(None, &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 5);
    assert_eq!(events[4].payload, Payload::Plain(json!({"n": 5})));

    // The raw records past the rotation exist for everyone.
    assert_eq!(
        bob.highest_sequence_number(Some(&author("@alice")), &pid("vault-1"))
            .await
            .unwrap(),
        5
    );
}

#[tokio::test]
async fn reader_without_keys_sees_nothing() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let carol = network.journal("@carol");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 2, json!({"n": 2})))
        .await
        .unwrap();

    let events = carol
        .events_by_persistence_id(Some(&author("@alice")), &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert!(events.is_empty());

    // The stream still advances the raw high-water mark.
    assert_eq!(
        carol
            .highest_sequence_number(Some(&author("@alice")), &pid("vault-1"))
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn enumeration_suppresses_encrypted_entities_without_keys() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let bob = network.journal("@bob");
    let carol = network.journal("@carol");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(event_record("note-1", 1, json!({"text": "public"})))
        .await
        .unwrap();
    alice
        .persist(WireRecord::grant(pid("vault-1"), 2, author("@bob")))
        .await
        .unwrap();

    // Carol sees only the plaintext entity.
    let ids = carol
        .persistence_ids_for_author(&author("@alice"), Window::all())
        .await
        .unwrap();
    assert_eq!(ids, vec![pid("note-1")]);
    let authors = carol
        .authors_for_persistence_id(&pid("vault-1"), Window::all())
        .await
        .unwrap();
    assert!(authors.is_empty());

    // Bob was granted vault-1 and sees both.
    let ids = bob
        .persistence_ids_for_author(&author("@alice"), Window::all())
        .await
        .unwrap();
    assert_eq!(ids, vec![pid("note-1"), pid("vault-1")]);

    // Alice always sees her own entities.
    let ids = alice.current_persistence_ids(Window::all()).await.unwrap();
    assert_eq!(ids, vec![pid("note-1"), pid("vault-1")]);

    // all_authors counts alice for carol because of the plaintext entity.
    let authors = carol.all_authors(Window::all()).await.unwrap();
    assert_eq!(authors, vec![author("@alice")]);
}

#[tokio::test]
async fn enumeration_windows_slice_in_order() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    for i in 1..=5 {
        alice
            .persist(event_record(&format!("entity-{i}"), 1, json!({})))
            .await
            .unwrap();
    }

    let ids = alice
        .current_persistence_ids(Window::range(1, 3))
        .await
        .unwrap();
    assert_eq!(ids, vec![pid("entity-2"), pid("entity-3")]);

    let ids = alice
        .current_persistence_ids(Window::range(4, 100))
        .await
        .unwrap();
    assert_eq!(ids, vec![pid("entity-5")]);
}

#[tokio::test]
async fn distribution_failure_reports_progress_and_retry_completes() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let bob = network.journal("@bob");

    // Five rotations build a key history longer than one share message.
    for seq in 1..=5 {
        alice
            .persist(WireRecord::set_key(pid("vault-1"), seq))
            .await
            .unwrap();
    }
    alice
        .persist(event_record("vault-1", 6, json!({"n": 6})))
        .await
        .unwrap();

    // The grant needs two share messages; fail the second one.
    network.channel.fail_after(network.channel.sent_count() + 1);
    let grant = WireRecord::grant(pid("vault-1"), 7, author("@bob"));
    let err = alice.persist(grant.clone()).await.unwrap_err();
    match err {
        JournalError::Distribution { sent, total, .. } => {
            assert_eq!(sent, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected distribution error, got {other}"),
    }

    // Retrying the same operation converges: appends and key merges are
    // idempotent.
    network.channel.heal();
    alice.persist(grant).await.unwrap();

    let events = bob
        .events_by_persistence_id(Some(&author("@alice")), &pid("vault-1"), 1, u64::MAX)
        .await
        .unwrap();
    assert_eq!(events.len(), 7);
}

#[tokio::test]
async fn incomplete_part_runs_are_dropped_not_surfaced() {
    init_tracing();
    let network = TestNetwork::new();
    let mallory = author("@mallory");
    let reader = network.journal("@reader");

    // Replicate only the tail parts of a chunked event, then a complete
    // small event at the next sequence number.
    let oversized = WireRecord::event(pid("doc-1"), 1, "doc.Saved", large_payload(20_000));
    let parts = chunk_record(&oversized, 7200).unwrap();
    assert!(parts.len() > 1);
    for part in parts.into_iter().skip(1) {
        network.feed.append(&mallory, part).await.unwrap();
    }
    network
        .feed
        .append(
            &mallory,
            WireRecord::event(pid("doc-1"), 2, "doc.Saved", json!({"ok": true})),
        )
        .await
        .unwrap();

    let events = reader
        .events_by_persistence_id(Some(&mallory), &pid("doc-1"), 1, u64::MAX)
        .await
        .unwrap();
    let seqs: Vec<_> = events.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(seqs, vec![2]);
}

#[tokio::test]
async fn highest_sequence_number_is_zero_for_unknown_streams() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    assert_eq!(
        alice
            .highest_sequence_number(None, &pid("nothing"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn follow_persistence_ids_sees_backlog_then_live_appends() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    alice
        .persist(event_record("order-1", 1, json!({})))
        .await
        .unwrap();

    let mut ids = alice.follow_persistence_ids();
    assert_eq!(ids.recv().await, Some(pid("order-1")));

    alice
        .persist(event_record("order-2", 1, json!({})))
        .await
        .unwrap();
    assert_eq!(ids.recv().await, Some(pid("order-2")));
}

#[tokio::test]
async fn follow_events_sees_backlog_then_live_appends_decrypted() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let bob = network.journal("@bob");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();
    alice
        .persist(WireRecord::grant(pid("vault-1"), 2, author("@bob")))
        .await
        .unwrap();
    alice
        .persist(event_record("vault-1", 3, json!({"n": 3})))
        .await
        .unwrap();

    let mut events = bob
        .follow_events_by_persistence_id(Some(&author("@alice")), &pid("vault-1"), 1)
        .await
        .unwrap();

    // Backlog arrives first, in sequence order.
    assert_eq!(events.recv().await.unwrap().sequence_nr, 1);
    assert_eq!(events.recv().await.unwrap().sequence_nr, 2);
    let third = events.recv().await.unwrap();
    assert_eq!(third.sequence_nr, 3);
    assert_eq!(third.payload, Payload::Plain(json!({"n": 3})));

    // A live oversized append lands as one reassembled, decrypted event.
    let payload = large_payload(20_000);
    alice
        .persist(WireRecord::event(pid("vault-1"), 4, "doc.Saved", payload.clone()))
        .await
        .unwrap();
    let fourth = events.recv().await.unwrap();
    assert_eq!(fourth.sequence_nr, 4);
    assert_eq!(fourth.payload, Payload::Plain(payload));
    assert!(!fourth.encrypted);
}

#[tokio::test]
async fn malformed_control_record_is_rejected_before_any_append() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");

    // A grant with no recipient.
    let mut record = event_record("vault-1", 1, json!(null));
    record.manifest = cipherlog::core::MANIFEST_ADD_USER.to_string();

    let err = alice.persist(record).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(_)));

    // Nothing reached the feed or the private channel.
    let raw = network.feed.read(ReadQuery::all()).await.unwrap();
    assert!(raw.is_empty());
    assert_eq!(network.channel.sent_count(), 0);
}

#[tokio::test]
async fn follow_authors_filters_on_held_keys() {
    init_tracing();
    let network = TestNetwork::new();
    let alice = network.journal("@alice");
    let carol = network.journal("@carol");

    alice
        .persist(WireRecord::set_key(pid("vault-1"), 1))
        .await
        .unwrap();

    let mut authors = carol.follow_authors().await.unwrap();

    // A plaintext entity from a new author is visible immediately.
    let bob = network.journal("@bob");
    bob.persist(event_record("note-1", 1, json!({})))
        .await
        .unwrap();
    assert_eq!(authors.recv().await, Some(author("@bob")));
}
