//! Background event feeds and timed status transitions.
//!
//! Timers are owned handles: dropping a `Ticker` (or the `RecordFeed` built on
//! it) stops and joins its thread, so nothing fires once teardown returns.
//! Feeds never touch a store directly; they hand batches to the owning view
//! over a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::constants::entities::{
    AVERAGE_PROCESSING_TIME, CLAIMS_PROCESSED, CLAIMS_RECEIVED, INSURER, STATUS,
};
use crate::constants::feeds::{CLAIMS_FEED_ID, INVESTIGATION_TIMEOUT_SECS};
use crate::data::{DataRecord, RecordPatch};
use crate::entities::{CLAIM, INSURERS};
use crate::errors::ViewError;
use crate::store::IdSequence;
use crate::types::{FacetValue, FieldName};

/// Delay between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    Fixed(Duration),
    /// `base` plus a uniformly drawn extra delay in `[0, jitter]`.
    Jittered { base: Duration, jitter: Duration },
}

impl Schedule {
    pub fn next_delay(&self) -> Duration {
        match *self {
            Schedule::Fixed(delay) => delay,
            Schedule::Jittered { base, jitter } => {
                if jitter.is_zero() {
                    return base;
                }
                let extra = rand::rng().random_range(0..=jitter.as_millis() as u64);
                base + Duration::from_millis(extra)
            }
        }
    }
}

/// Cancelable periodic timer running `on_tick` on a background thread.
pub struct Ticker {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    fired: Arc<AtomicUsize>,
}

impl Ticker {
    pub fn start<F>(schedule: Schedule, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_thread = Arc::clone(&fired);
        let handle = thread::spawn(move || {
            loop {
                match stopped.recv_timeout(schedule.next_delay()) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        on_tick();
                        fired_thread.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        });
        Self {
            stop: Some(stop),
            handle: Some(handle),
            fired,
        }
    }

    /// Number of completed ticks.
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::Relaxed)
    }

    /// Stop the timer; returns after the worker thread has exited.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// External source of new records (chat bot, claims pipeline, ...).
pub trait EventSource: Send {
    fn id(&self) -> &str;
    /// Fetch records produced since the previous poll.
    fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<DataRecord>, ViewError>;
}

type Generator = Box<dyn FnMut(DateTime<Utc>) -> Vec<DataRecord> + Send>;

/// Event source backed by a generator closure.
pub struct SimulatedSource {
    id: String,
    generator: Generator,
}

impl SimulatedSource {
    pub fn new<F>(id: impl Into<String>, generator: F) -> Self
    where
        F: FnMut(DateTime<Utc>) -> Vec<DataRecord> + Send + 'static,
    {
        Self {
            id: id.into(),
            generator: Box::new(generator),
        }
    }

    /// One claims record per poll for a random insurer.
    pub fn claims_feed(mut ids: IdSequence) -> Self {
        Self::new(CLAIMS_FEED_ID, move |now| {
            let mut rng = rand::rng();
            let insurer = INSURERS[rng.random_range(0..INSURERS.len())];
            let received = f64::from(rng.random_range(50u32..=500));
            let processed = (received * rng.random_range(0.6..=1.0)).floor();
            let record = DataRecord::new(ids.next_id(), CLAIM, now)
                .with_category(INSURER, insurer)
                .with_number(CLAIMS_RECEIVED, received)
                .with_number(CLAIMS_PROCESSED, processed)
                .with_number(
                    AVERAGE_PROCESSING_TIME,
                    f64::from(rng.random_range(1u32..=10)),
                );
            vec![record]
        })
    }
}

impl EventSource for SimulatedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<DataRecord>, ViewError> {
        Ok((self.generator)(now))
    }
}

/// Outcome of one poll, delivered to the owning view.
#[derive(Debug)]
pub struct FeedBatch {
    pub source: String,
    pub result: Result<Vec<DataRecord>, ViewError>,
}

/// An `EventSource` polled on a `Ticker`, with results queued for the view.
pub struct RecordFeed {
    ticker: Ticker,
    receiver: mpsc::Receiver<FeedBatch>,
}

impl RecordFeed {
    pub fn start<S>(mut source: S, schedule: Schedule, clock: Arc<dyn Clock>) -> Self
    where
        S: EventSource + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let ticker = Ticker::start(schedule, move || {
            let result = source.poll(clock.now());
            match &result {
                Ok(records) if records.is_empty() => return,
                Ok(records) => debug!(source = source.id(), count = records.len(), "feed produced records"),
                Err(err) => warn!(source = source.id(), error = %err, "feed poll failed"),
            }
            let _ = sender.send(FeedBatch {
                source: source.id().to_string(),
                result,
            });
        });
        Self { ticker, receiver }
    }

    /// Take every batch queued so far without blocking.
    pub fn drain(&self) -> Vec<FeedBatch> {
        self.receiver.try_iter().collect()
    }

    /// Block up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FeedBatch> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn ticks(&self) -> usize {
        self.ticker.fired()
    }

    /// Stop polling; batches already queued are discarded.
    pub fn cancel(self) {
        self.ticker.cancel();
    }
}

/// Moves records whose `field` has been `from` for longer than `after` to `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusTimeoutRule {
    pub field: FieldName,
    pub from: FacetValue,
    pub to: FacetValue,
    pub after: chrono::Duration,
}

impl StatusTimeoutRule {
    pub fn new(
        field: impl Into<FieldName>,
        from: impl Into<FacetValue>,
        to: impl Into<FacetValue>,
        after: chrono::Duration,
    ) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
            after,
        }
    }

    /// Errors left under investigation are resolved after two minutes.
    pub fn investigation_timeout() -> Self {
        Self::new(
            STATUS,
            "investigating",
            "resolved",
            chrono::Duration::seconds(INVESTIGATION_TIMEOUT_SECS),
        )
    }

    /// The record's timestamp marks when it entered its current status.
    pub fn is_due(&self, record: &DataRecord, now: DateTime<Utc>) -> bool {
        record.category(&self.field) == Some(self.from.as_str())
            && now - record.timestamp > self.after
    }

    pub fn patch(&self) -> RecordPatch {
        RecordPatch::new().category(self.field.clone(), self.to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[test]
    fn fixed_schedule_has_constant_delay() {
        let schedule = Schedule::Fixed(Duration::from_millis(30));
        assert_eq!(schedule.next_delay(), Duration::from_millis(30));
    }

    #[test]
    fn jittered_schedule_stays_in_range() {
        let schedule = Schedule::Jittered {
            base: Duration::from_millis(100),
            jitter: Duration::from_millis(50),
        };
        for _ in 0..50 {
            let delay = schedule.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn cancelled_ticker_never_fires_again() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_tick = Arc::clone(&count);
        let ticker = Ticker::start(Schedule::Fixed(Duration::from_millis(5)), move || {
            count_tick.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(60));
        ticker.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        assert!(after_cancel > 0);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn dropping_ticker_stops_it() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_tick = Arc::clone(&count);
        {
            let _ticker = Ticker::start(Schedule::Fixed(Duration::from_secs(60)), move || {
                count_tick.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn record_feed_delivers_batches() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let feed = RecordFeed::start(
            SimulatedSource::claims_feed(IdSequence::new("claim")),
            Schedule::Fixed(Duration::from_millis(5)),
            Arc::new(clock),
        );
        let batch = feed
            .recv_timeout(Duration::from_secs(5))
            .expect("feed should deliver a batch");
        assert_eq!(batch.source, CLAIMS_FEED_ID);
        let records = batch.result.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity, CLAIM);
        assert!(crate::entities::claim().validate(&records[0]).is_ok());
        feed.cancel();
    }

    #[test]
    fn failing_sources_are_reported_not_fatal() {
        struct Broken;
        impl EventSource for Broken {
            fn id(&self) -> &str {
                "broken"
            }
            fn poll(&mut self, _now: DateTime<Utc>) -> Result<Vec<DataRecord>, ViewError> {
                Err(ViewError::Configuration("offline".to_string()))
            }
        }
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let feed = RecordFeed::start(
            Broken,
            Schedule::Fixed(Duration::from_millis(5)),
            Arc::new(clock),
        );
        let batch = feed.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(batch.result.is_err());
    }

    #[test]
    fn empty_polls_are_not_queued() {
        let polls = Arc::new(Mutex::new(0usize));
        let polls_source = Arc::clone(&polls);
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let feed = RecordFeed::start(
            SimulatedSource::new("quiet", move |_now| {
                *polls_source.lock().unwrap() += 1;
                Vec::new()
            }),
            Schedule::Fixed(Duration::from_millis(5)),
            Arc::new(clock),
        );
        thread::sleep(Duration::from_millis(50));
        assert!(feed.drain().is_empty());
        feed.cancel();
        assert!(*polls.lock().unwrap() > 0);
    }

    #[test]
    fn status_timeout_rule_checks_age_and_status() {
        let rule = StatusTimeoutRule::investigation_timeout();
        let opened = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let record = DataRecord::new("err-1", "error_report", opened)
            .with_category(STATUS, "investigating");
        assert!(!rule.is_due(&record, opened + chrono::Duration::seconds(120)));
        assert!(rule.is_due(&record, opened + chrono::Duration::seconds(121)));

        let resolved = record.clone().with_category(STATUS, "resolved");
        assert!(!rule.is_due(&resolved, opened + chrono::Duration::hours(1)));
        assert_eq!(
            rule.patch().categorical.get(STATUS).map(String::as_str),
            Some("resolved")
        );
    }
}
