use voice_bridge::mailbox::{MAILBOX_SIZE, TEXT_CAPACITY, VOICE_ID_CAPACITY};
use voice_bridge::{ConsumerEndpoint, Job, ProducerEndpoint};

use tempfile::tempdir;

#[test]
fn job_travels_from_producer_to_consumer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("EC_DATA_POOL_01_v1");
    let host = ProducerEndpoint::open_or_create(&path);
    let worker = ConsumerEndpoint::open(&path);
    assert!(host.is_connected() && worker.is_connected());

    assert!(host.send("Hello world", "2", 1.0));
    assert!(host.has_pending_job());

    let job = worker.check_for_job().expect("job should be waiting");
    assert_eq!(
        job,
        Job {
            text: "Hello world".to_string(),
            voice_id: "2".to_string(),
            speed: 1.0,
        }
    );
    assert!(!host.has_pending_job());
    assert_eq!(worker.check_for_job(), None);
}

#[test]
fn second_send_while_pending_leaves_payload_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let host = ProducerEndpoint::open_or_create(&path);

    assert!(host.send("first", "1", 0.8));
    let before = std::fs::read(&path).unwrap();

    assert!(!host.send("second, much longer text", "3", 2.0));
    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after);

    let job = ConsumerEndpoint::open(&path).check_for_job().unwrap();
    assert_eq!(job.text, "first");
    assert_eq!(job.speed, 0.8);
}

#[test]
fn oversized_fields_are_truncated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let host = ProducerEndpoint::open_or_create(&path);
    let worker = ConsumerEndpoint::open(&path);

    let text = "a".repeat(TEXT_CAPACITY + 100);
    let voice = "v".repeat(VOICE_ID_CAPACITY * 2);
    assert!(host.send(&text, &voice, 1.0));

    let job = worker.check_for_job().unwrap();
    assert_eq!(job.text.len(), TEXT_CAPACITY - 1);
    assert_eq!(job.voice_id.len(), VOICE_ID_CAPACITY - 1);
}

#[test]
fn shorter_job_does_not_inherit_previous_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let host = ProducerEndpoint::open_or_create(&path);
    let worker = ConsumerEndpoint::open(&path);

    assert!(host.send("a rather long sentence", "4", 1.0));
    worker.check_for_job().unwrap();
    assert!(host.send("short", "1", 1.5));

    let job = worker.check_for_job().unwrap();
    assert_eq!(job.text, "short");
    assert_eq!(job.voice_id, "1");
    assert_eq!(job.speed, 1.5);
}

#[test]
fn speed_is_stored_verbatim() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let host = ProducerEndpoint::open_or_create(&path);
    let worker = ConsumerEndpoint::open(&path);

    for speed in [0.0f32, -3.25, 17.5, f32::MAX] {
        assert!(host.send("x", "1", speed));
        assert_eq!(worker.check_for_job().unwrap().speed, speed);
    }
}

#[test]
fn segment_has_wire_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let _host = ProducerEndpoint::open_or_create(&path);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), MAILBOX_SIZE as u64);
}

#[test]
fn worker_never_initialises_segment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mailbox");
    let host = ProducerEndpoint::open_or_create(&path);
    assert!(host.send("pending", "2", 1.0));

    // A second consumer attaching must not clear the pending job.
    let _late = ConsumerEndpoint::open(&path);
    assert!(host.has_pending_job());
}
