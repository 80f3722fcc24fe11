//! End-to-end decision scenarios against the public filter API.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_dedup::infrastructure::mocks::MockClock;
use tracing_dedup::{
    FilterKey, FilterMode, LogFilter, RecordRegistry, ShardedKeyStore, Thresholds, Verdict,
};

fn filter(mode: FilterMode) -> (LogFilter<Arc<ShardedKeyStore>>, Arc<MockClock>) {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let registry = RecordRegistry::new(Arc::new(ShardedKeyStore::new()), clock.clone());
    let filter = LogFilter::new(registry, Thresholds::default(), mode);
    filter.init().expect("in-memory store always initializes");
    (filter, clock)
}

#[test]
fn test_first_occurrence_allowed_second_suppressed() {
    let (filter, _clock) = filter(FilterMode::Filtering);

    assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Suppress);
    assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Suppress);
}

#[test]
fn test_keys_are_independent() {
    let (filter, _clock) = filter(FilterMode::Filtering);

    assert_eq!(filter.decide(b"INFO:a\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:b\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"WARN:a\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:a\n"), Verdict::Suppress);
    assert_eq!(filter.key_count(), 3);
}

#[test]
fn test_composed_keys_match_raw_keys() {
    let (filter, _clock) = filter(FilterMode::Filtering);

    let composed = FilterKey::compose("INFO", "hello");
    assert_eq!(composed.as_bytes(), b"INFO:hello\n");

    assert_eq!(filter.decide(composed.as_bytes()), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Suppress);
}

#[test]
fn test_massive_transition_in_filtering_mode() {
    let (filter, clock) = filter(FilterMode::Filtering);
    let key = b"ERROR:retrying connection\n";

    assert_eq!(filter.decide(key), Verdict::Allow);
    for _ in 2..=59 {
        clock.advance(Duration::from_millis(100));
        assert_eq!(filter.decide(key), Verdict::Suppress);
    }

    // 60th occurrence within the window: the single transition notice
    assert_eq!(filter.decide(key), Verdict::Allow);
    assert_eq!(filter.metrics().massive_transitions(), 1);

    for _ in 0..100 {
        clock.advance(Duration::from_secs(10));
        assert_eq!(filter.decide(key), Verdict::Suppress);
    }
    assert_eq!(filter.metrics().massive_transitions(), 1);
}

#[test]
fn test_epoch_reset_after_massive() {
    let (filter, clock) = filter(FilterMode::Filtering);
    let key = b"WARN:queue full\n";

    for _ in 0..70 {
        filter.decide(key);
    }
    assert_eq!(filter.decide(key), Verdict::Suppress);

    clock.advance(Duration::from_secs(3600));
    assert_eq!(filter.decide(key), Verdict::Allow);
    assert_eq!(filter.metrics().epoch_resets(), 1);

    // Counters restarted: an ordinary duplicate again
    assert_eq!(filter.decide(key), Verdict::Suppress);
    filter.registry().for_each(|_key, record| {
        assert_eq!(record.total_count(), 2);
        assert!(!record.is_massive());
    });
}

#[test]
fn test_duplicate_allowed_again_after_epoch() {
    let (filter, clock) = filter(FilterMode::Filtering);
    let key = b"INFO:daily report\n";

    assert_eq!(filter.decide(key), Verdict::Allow);
    clock.advance(Duration::from_secs(3599));
    assert_eq!(filter.decide(key), Verdict::Suppress);
    clock.advance(Duration::from_secs(1));
    assert_eq!(filter.decide(key), Verdict::Allow);
}

#[test]
fn test_plain_mode_sixty_occurrences() {
    let (filter, _clock) = filter(FilterMode::Plain);
    let key = b"INFO:x\n";

    let verdicts: Vec<Verdict> = (0..61).map(|_| filter.decide(key)).collect();

    assert!(verdicts[..60].iter().all(|v| *v == Verdict::Allow));
    assert_eq!(verdicts[60], Verdict::Suppress);
}

#[test]
fn test_plain_mode_slow_repeats_never_massive() {
    let (filter, clock) = filter(FilterMode::Plain);
    let key = b"INFO:heartbeat\n";

    // One per second never fills a 60-second window past 60
    for _ in 0..59 {
        assert_eq!(filter.decide(key), Verdict::Allow);
        clock.advance(Duration::from_secs(1));
    }
    clock.advance(Duration::from_secs(60));
    for _ in 0..59 {
        assert_eq!(filter.decide(key), Verdict::Allow);
    }
    assert_eq!(filter.metrics().massive_transitions(), 0);
}

#[test]
fn test_switch_to_plain_keeps_massive_state() {
    let (filter, clock) = filter(FilterMode::Filtering);
    let noisy = b"ERROR:disk failure\n";
    let quiet = b"INFO:started\n";

    filter.decide(quiet);
    for _ in 0..60 {
        filter.decide(noisy);
    }

    filter.set_mode(FilterMode::Plain);
    clock.advance(Duration::from_secs(90));

    assert_eq!(filter.decide(quiet), Verdict::Allow);
    assert_eq!(filter.decide(quiet), Verdict::Allow);
    assert_eq!(filter.decide(noisy), Verdict::Suppress);

    // The massive state ends with the epoch
    clock.advance(Duration::from_secs(3600));
    assert_eq!(filter.decide(noisy), Verdict::Allow);
}

#[test]
fn test_empty_and_uninitialized_inputs_are_allowed() {
    let (filter, _clock) = filter(FilterMode::Filtering);
    assert_eq!(filter.decide(b""), Verdict::Allow);

    filter.decide(b"INFO:seen\n");
    filter.teardown();
    assert_eq!(filter.decide(b"INFO:seen\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:seen\n"), Verdict::Allow);
    assert_eq!(filter.key_count(), 0);
}

#[test]
fn test_keys_are_case_and_length_sensitive() {
    let (filter, _clock) = filter(FilterMode::Filtering);

    assert_eq!(filter.decide(b"INFO:Hello\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:hello"), Verdict::Allow);
    assert_eq!(filter.decide(b"INFO:hello\n\n"), Verdict::Allow);
}

#[test]
fn test_custom_thresholds() {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let registry = RecordRegistry::new(Arc::new(ShardedKeyStore::new()), clock.clone());
    let thresholds =
        Thresholds::new(Duration::from_secs(10), 5, Duration::from_secs(60)).unwrap();
    let filter = LogFilter::new(registry, thresholds, FilterMode::Plain);
    filter.init().unwrap();

    let key = b"DEBUG:poll\n";
    for _ in 0..5 {
        assert_eq!(filter.decide(key), Verdict::Allow);
    }
    assert_eq!(filter.decide(key), Verdict::Suppress);

    clock.advance(Duration::from_secs(60));
    assert_eq!(filter.decide(key), Verdict::Allow);
}
