use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use opsview::entities;
use opsview::{
    DataRecord, EventSource, FixedClock, IdSequence, NotificationCenter, NotificationConfig,
    RecordFeed, Schedule, Severity, SimulatedSource, SummarySpec, Ticker, ViewConfig,
    ViewController, ViewError,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap()
}

fn wait_for_ticks(feed: &RecordFeed, ticks: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while feed.ticks() < ticks {
        assert!(Instant::now() < deadline, "feed did not tick in time");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn view_drains_simulated_claims_into_its_store() {
    let clock = FixedClock::new(start());
    let center = Arc::new(NotificationCenter::new(
        clock.clone(),
        NotificationConfig::default(),
    ));
    let mut view = ViewController::new(
        "claims",
        entities::claim(),
        ViewConfig::default(),
        Arc::new(clock.clone()),
    )
    .with_notifier(center.clone())
    .with_summary(SummarySpec::value("claims_received").breakdown("insurer"))
    .unwrap();

    let feed = RecordFeed::start(
        SimulatedSource::claims_feed(IdSequence::new("nova")),
        Schedule::Fixed(Duration::from_millis(5)),
        Arc::new(clock.clone()),
    );
    wait_for_ticks(&feed, 3);
    view.drain_feed(&feed);
    feed.cancel();

    assert!(view.store().len() >= 3);
    assert_eq!(view.summary().count, view.store().len());
    let visible = center.visible();
    assert!(!visible.is_empty());
    assert!(visible.iter().all(|note| note.severity == Severity::Info));
    assert!(visible.iter().all(|note| note.source.as_deref() == Some("nova")));
}

#[test]
fn rejected_feed_records_are_skipped() {
    let clock = FixedClock::new(start());
    let mut view = ViewController::new(
        "issues",
        entities::issue(),
        ViewConfig::default(),
        Arc::new(clock.clone()),
    );

    let polls = Arc::new(AtomicUsize::new(0));
    let polls_source = Arc::clone(&polls);
    let source = SimulatedSource::new("slack", move |now| {
        let poll = polls_source.fetch_add(1, Ordering::SeqCst);
        let mut batch = vec![
            DataRecord::new("fixed", entities::ISSUE, now)
                .with_category("status", "open")
                .with_category("priority", "high"),
        ];
        batch.push(
            DataRecord::new(format!("issue-{poll}"), entities::ISSUE, now)
                .with_category("status", "blocked")
                .with_category("priority", "high"),
        );
        batch
    });
    let feed = RecordFeed::start(
        source,
        Schedule::Fixed(Duration::from_millis(5)),
        Arc::new(clock),
    );
    wait_for_ticks(&feed, 2);
    let appended = view.drain_feed(&feed);
    feed.cancel();

    assert_eq!(appended, 1);
    assert_eq!(view.store().len(), 1);
    assert!(view.store().contains("fixed"));
}

#[test]
fn failing_sources_raise_error_notifications() {
    struct Offline;
    impl EventSource for Offline {
        fn id(&self) -> &str {
            "fireflies"
        }
        fn poll(&mut self, _now: DateTime<Utc>) -> Result<Vec<DataRecord>, ViewError> {
            Err(ViewError::Configuration("token expired".to_string()))
        }
    }

    let clock = FixedClock::new(start());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut view = ViewController::new(
        "calendar",
        entities::calendar_event(),
        ViewConfig::default(),
        Arc::new(clock.clone()),
    )
    .with_notifier(Arc::new(
        move |message: &str, severity: Severity, _source: Option<&str>| {
            sink.lock().unwrap().push((message.to_string(), severity));
        },
    ));

    let feed = RecordFeed::start(
        Offline,
        Schedule::Fixed(Duration::from_millis(5)),
        Arc::new(clock),
    );
    wait_for_ticks(&feed, 1);
    view.drain_feed(&feed);
    feed.cancel();

    assert!(view.store().is_empty());
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|(message, severity)| {
        *severity == Severity::Error && message.contains("token expired")
    }));
}

#[test]
fn ticker_teardown_stops_callbacks() {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_tick = Arc::clone(&fired);
    let ticker = Ticker::start(
        Schedule::Jittered {
            base: Duration::from_millis(2),
            jitter: Duration::from_millis(3),
        },
        move || {
            fired_tick.fetch_add(1, Ordering::SeqCst);
        },
    );
    let deadline = Instant::now() + Duration::from_secs(5);
    while ticker.fired() < 2 {
        assert!(Instant::now() < deadline, "ticker did not fire in time");
        thread::sleep(Duration::from_millis(2));
    }
    drop(ticker);
    let after_drop = fired.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), after_drop);
}
