use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use tracing_dedup::infrastructure::mocks::{MockCaptureLayer, MockClock};
use tracing_dedup::{
    DedupLayer, FilterMode, LogFilter, RecordRegistry, ShardedKeyStore, Thresholds,
};

fn filtering_layer() -> (DedupLayer, Arc<MockClock>) {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let layer = DedupLayer::builder()
        .with_mode(FilterMode::Filtering)
        .with_clock(clock.clone())
        .build()
        .unwrap();
    (layer, clock)
}

#[test]
fn test_dedup_layer_integration() {
    let capture = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..10 {
            info!("test event");
        }
    });

    assert_eq!(capture.count(), 1);
}

#[test]
fn test_different_call_sites_share_a_key() {
    let capture = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        info!("service started");
        info!("service started");
        info!("{} started", "service");
    });

    assert_eq!(capture.count(), 1);
}

#[test]
fn test_levels_are_part_of_the_key() {
    let capture = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..3 {
            debug!("same text");
            info!("same text");
            warn!("same text");
            error!("same text");
        }
    });

    assert_eq!(capture.count(), 4);
}

#[test]
fn test_formatted_values_are_part_of_the_key() {
    let capture = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        for id in [1, 2, 1, 3, 2] {
            warn!("job {} failed", id);
        }
        for code in [500, 503, 500] {
            error!(code, "upstream error");
        }
    });

    assert_eq!(
        capture.messages(),
        vec![
            "job 1 failed",
            "job 2 failed",
            "job 3 failed",
            "upstream error code=500",
            "upstream error code=503",
        ]
    );
}

#[test]
fn test_epoch_rollover_through_layer() {
    let capture = MockCaptureLayer::new();
    let (dedup, clock) = filtering_layer();

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        info!("hourly");
        info!("hourly");
        clock.advance(Duration::from_secs(3600));
        info!("hourly");
    });

    assert_eq!(capture.count_message("hourly"), 2);
}

#[test]
fn test_one_filter_for_several_outputs() {
    let console = MockCaptureLayer::new();
    let file = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let outputs = console.clone().and_then(file.clone()).with_filter(dedup.clone());
    let subscriber = tracing_subscriber::registry().with(outputs);

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..5 {
            warn!("written everywhere or nowhere");
        }
    });

    assert_eq!(console.count(), 1);
    assert_eq!(file.count(), 1);
    // One decision per event, not one per output
    assert_eq!(dedup.metrics().snapshot().total_events(), 5);
}

#[test]
fn test_massive_notice_in_plain_mode() {
    let capture = MockCaptureLayer::new();
    let clock = Arc::new(MockClock::new(Instant::now()));
    let dedup = DedupLayer::builder()
        .with_clock(clock.clone())
        .with_massive_threshold(5)
        .build()
        .unwrap();

    let subscriber =
        tracing_subscriber::registry().with(capture.clone().with_filter(dedup.clone()));

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..20 {
            error!("connection refused");
        }
        info!("other work");
        info!("other work");
    });

    assert_eq!(capture.count_message("connection refused"), 5);
    assert_eq!(capture.count_message("other work"), 2);
    assert_eq!(dedup.metrics().massive_transitions(), 1);
}

#[test]
fn test_custom_filter_with_layer() {
    let capture = MockCaptureLayer::new();
    let clock = Arc::new(MockClock::new(Instant::now()));
    let registry = RecordRegistry::new(Arc::new(ShardedKeyStore::with_max_keys(10)), clock);
    let filter = LogFilter::new(registry, Thresholds::default(), FilterMode::Filtering);
    let dedup = DedupLayer::with_filter(filter.clone()).unwrap();
    assert!(filter.is_initialized());

    let subscriber = tracing_subscriber::registry().with(capture.clone().with_filter(dedup));

    tracing::subscriber::with_default(subscriber, || {
        info!("shared state");
        info!("shared state");
    });

    assert_eq!(capture.count(), 1);
    assert_eq!(filter.key_count(), 1);
    assert_eq!(filter.metrics().duplicates_suppressed(), 1);
}

#[test]
fn test_teardown_disables_filtering() {
    let capture = MockCaptureLayer::new();
    let (dedup, _clock) = filtering_layer();

    let subscriber =
        tracing_subscriber::registry().with(capture.clone().with_filter(dedup.clone()));

    tracing::subscriber::with_default(subscriber, || {
        info!("repeat");
        info!("repeat");
        dedup.filter().teardown();
        info!("repeat");
        info!("repeat");
    });

    assert_eq!(capture.count_message("repeat"), 3);
}
