// ── Temperature series feed ──
//
// Polls raw or hourly readings for a date range and publishes them aligned
// onto the requested sensors. Re-alignment is skipped when neither the
// response nor the sensor list changed since the last applied attempt.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use sensorhub_api::HubClient;
use sensorhub_api::types::TemperatureReadingJson;
use tracing::{debug, trace};

use crate::aligner::align;
use crate::convert::readings_from_wire;
use crate::equality::Published;
use crate::error::CoreError;
use crate::model::{AlignedEntry, ReadingPoint};
use crate::poll::{PollController, PollOutcome};
use crate::stream::Snapshots;
use crate::subscription::{Lifecycle, Running, Subscription, SyncContext};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range from optional endpoints, as a form would hold them. `None`
    /// when either end is missing or the order is wrong.
    pub fn from_parts(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        Self::new(start?, end?)
    }

    pub fn start(self) -> NaiveDate {
        self.start
    }

    pub fn end(self) -> NaiveDate {
        self.end
    }

    fn wire(self) -> (String, String) {
        (
            self.start.format(DATE_FORMAT).to_string(),
            self.end.format(DATE_FORMAT).to_string(),
        )
    }
}

/// What the series shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingsQuery {
    /// `None` while the range is incomplete or invalid; no request is made.
    pub range: Option<DateRange>,
    /// Hourly averages instead of raw readings.
    pub hourly: bool,
    /// Columns of the aligned output, in order.
    pub sensors: Vec<String>,
}

impl ReadingsQuery {
    pub fn new(range: Option<DateRange>, sensors: Vec<String>) -> Self {
        Self {
            range,
            hourly: false,
            sensors,
        }
    }

    #[must_use]
    pub fn hourly(mut self, hourly: bool) -> Self {
        self.hourly = hourly;
        self
    }

    fn sensors_key(&self) -> String {
        self.sensors.join("|")
    }
}

// ── Feed ─────────────────────────────────────────────────────────────

pub struct TemperatureSeries {
    feed: Arc<SeriesFeed>,
    lifecycle: Lifecycle,
}

struct SeriesFeed {
    ctx: SyncContext,
    published: Published<Vec<AlignedEntry>>,
    query: Mutex<ReadingsQuery>,
    dedup: Mutex<Dedup>,
}

/// Fingerprint of the last applied attempt.
struct Dedup {
    response_hash: Option<u64>,
    sensors_key: String,
    /// Next attempt aligns unconditionally (set on query change).
    force: bool,
}

struct Fetched {
    query: ReadingsQuery,
    hash: u64,
    points: Vec<ReadingPoint>,
}

impl TemperatureSeries {
    pub(crate) fn new(ctx: SyncContext, query: ReadingsQuery) -> Self {
        Self {
            feed: Arc::new(SeriesFeed {
                ctx,
                published: Published::new(Vec::new()),
                query: Mutex::new(query),
                dedup: Mutex::new(Dedup {
                    response_hash: None,
                    sensors_key: String::new(),
                    force: true,
                }),
            }),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn query(&self) -> ReadingsQuery {
        self.feed.query.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Change the query. The next attempt re-aligns unconditionally; when
    /// running, that attempt starts now and supersedes any in flight.
    pub fn set_query(&self, query: ReadingsQuery) {
        {
            let mut current = self.feed.query.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == query {
                return;
            }
            *current = query;
        }
        self.feed.dedup().force = true;

        if let Some(poll) = self.lifecycle.poll() {
            let feed = Arc::clone(&self.feed);
            tokio::spawn(async move {
                feed.refresh(&poll).await;
            });
        }
    }

    /// Run one attempt now.
    pub async fn refresh_now(&self) -> PollOutcome {
        let poll = self.lifecycle.controller("series", &self.feed.ctx.cancel);
        self.feed.refresh(&poll).await
    }

    pub fn snapshot(&self) -> Arc<Vec<AlignedEntry>> {
        self.feed.published.current()
    }

    pub fn version(&self) -> u64 {
        self.feed.published.version()
    }

    pub fn snapshots(&self) -> Snapshots<Vec<AlignedEntry>> {
        self.feed.published.snapshots()
    }
}

impl Subscription for TemperatureSeries {
    fn start(&self) {
        let mut running = Running::new("series", &self.feed.ctx.cancel);

        let feed = Arc::clone(&self.feed);
        let poll = Arc::clone(running.poll());
        running.track(tokio::spawn(async move {
            feed.refresh(&poll).await;
        }));

        let feed = Arc::clone(&self.feed);
        let weak = Arc::downgrade(running.poll());
        running
            .poll()
            .every(self.feed.ctx.config.readings_poll_interval, move || {
                let feed = Arc::clone(&feed);
                let weak = weak.clone();
                async move {
                    if let Some(poll) = weak.upgrade() {
                        feed.refresh(&poll).await;
                    }
                }
            });

        self.lifecycle.replace(running);
    }

    fn stop(&self) {
        self.lifecycle.clear();
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for TemperatureSeries {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SeriesFeed {
    fn dedup(&self) -> MutexGuard<'_, Dedup> {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self, poll: &PollController) -> PollOutcome {
        let query = self.query.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if query.range.is_none() {
            trace!("no valid date range, series attempt skipped");
            return PollOutcome::Skipped;
        }
        let client = Arc::clone(&self.ctx.client);
        let mut current = true;
        let outcome = poll
            .attempt(
                |_| async move { fetch(&client, query).await },
                |fetched| current = self.apply(fetched),
            )
            .await;
        match outcome {
            PollOutcome::Applied if !current => PollOutcome::Superseded,
            other => other,
        }
    }

    /// Returns `false` when the result belongs to a query that has since
    /// been replaced.
    fn apply(&self, fetched: Fetched) -> bool {
        {
            let current = self.query.lock().unwrap_or_else(PoisonError::into_inner);
            if *current != fetched.query {
                trace!("series result for an older query dropped");
                return false;
            }
        }

        let key = fetched.query.sensors_key();
        let mut dedup = self.dedup();
        if !dedup.force && dedup.response_hash == Some(fetched.hash) && dedup.sensors_key == key {
            trace!("series response unchanged, alignment skipped");
            return true;
        }

        let rows = align(&fetched.points, &fetched.query.sensors);
        let changed = self.published.offer(rows);
        debug!(changed, readings = fetched.points.len(), "series aligned");

        dedup.response_hash = Some(fetched.hash);
        dedup.sensors_key = key;
        dedup.force = false;
        true
    }
}

async fn fetch(client: &HubClient, query: ReadingsQuery) -> Result<Fetched, CoreError> {
    let wire = fetch_wire(client, &query).await?;
    let hash = content_hash(&wire)?;
    let points = readings_from_wire(wire)?;
    Ok(Fetched {
        query,
        hash,
        points,
    })
}

async fn fetch_wire(
    client: &HubClient,
    query: &ReadingsQuery,
) -> Result<Vec<TemperatureReadingJson>, CoreError> {
    let Some(range) = query.range else {
        return Err(CoreError::Config {
            message: "a date range with start <= end is required".into(),
        });
    };
    let (start, end) = range.wire();
    let wire = if query.hourly {
        client.hourly_readings_between(&start, &end).await?
    } else {
        client.readings_between(&start, &end).await?
    };
    Ok(wire)
}

/// Hash of the response as the server sent it.
fn content_hash(wire: &[TemperatureReadingJson]) -> Result<u64, CoreError> {
    let text = serde_json::to_string(wire).map_err(|e| CoreError::Internal(e.to_string()))?;
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Fetch and align once, outside any feed.
pub async fn fetch_aligned(
    client: &HubClient,
    query: &ReadingsQuery,
) -> Result<Vec<AlignedEntry>, CoreError> {
    let wire = fetch_wire(client, query).await?;
    let points = readings_from_wire(wire)?;
    Ok(align(&points, &query.sensors))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn range_requires_both_ends_in_order() {
        assert!(DateRange::from_parts(Some(date("2024-01-01")), None).is_none());
        assert!(DateRange::from_parts(None, Some(date("2024-01-01"))).is_none());
        assert!(DateRange::from_parts(Some(date("2024-01-02")), Some(date("2024-01-01"))).is_none());

        let same_day = DateRange::from_parts(Some(date("2024-01-01")), Some(date("2024-01-01")));
        assert!(same_day.is_some());
    }

    #[test]
    fn range_wire_form() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-31")).unwrap();
        assert_eq!(range.wire(), ("2024-01-01".to_owned(), "2024-01-31".to_owned()));
    }

    #[test]
    fn sensors_key_joins_in_order() {
        let q = ReadingsQuery::new(None, vec!["Up".into(), "Down".into()]);
        assert_eq!(q.sensors_key(), "Up|Down");
        assert!(!q.hourly);
        assert!(q.hourly(true).hourly);
    }

    #[test]
    fn content_hash_tracks_response_text() {
        let a = vec![TemperatureReadingJson {
            id: Some(1),
            sensor_name: "Up".into(),
            temperature: 20.5,
            time: "2024-01-01 10:00:00".into(),
        }];
        let mut b = a.clone();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
        b[0].temperature = 20.6;
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}
