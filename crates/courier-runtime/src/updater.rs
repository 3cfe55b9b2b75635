//! Update ingestion.
//!
//! The [`Updater`] feeds the dispatcher queue in one of two ways:
//!
//! - **Polling**: a background task repeatedly calls
//!   [`UpdateSource::get_updates`] and queues every update of a batch in
//!   order. The offset then moves to one past the highest id seen, which
//!   acknowledges the batch upstream. It never moves backwards.
//! - **Push**: [`Updater::push`] and [`Updater::push_json`] queue a single
//!   update immediately. The webhook server and host applications use this.
//!
//! A failed fetch is reported to the dispatcher as an ingestion failure and
//! retried after an exponential backoff, or after the delay the API asked
//! for. The offset is left untouched so nothing is skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use courier_core::{
    ApiError, ApiResult, BoxedUpdateSink, BoxedUpdateSource, GetUpdates, SinkClosed, Update,
    UpdateSink, UpdateSource,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{BackoffConfig, PollingConfig};
use crate::error::{UpdaterError, UpdaterResult};

/// Exponential backoff between failed fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl Backoff {
    /// Returns the delay following `current`, never more than `max`.
    pub fn next(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(scaled).map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Parameters of the polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingOptions {
    pub limit: u32,
    /// Long-poll timeout in seconds.
    pub timeout: u32,
    pub allowed_updates: Vec<String>,
    /// Skip everything queued upstream before the loop starts.
    pub drop_pending_updates: bool,
    pub backoff: Backoff,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollingOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            limit: config.limit,
            timeout: config.timeout_secs,
            allowed_updates: config.allowed_updates.clone(),
            drop_pending_updates: config.drop_pending_updates,
            backoff: Backoff::from(&config.backoff),
        }
    }
}

struct Polling {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns update ingestion for one dispatcher.
pub struct Updater {
    sink: BoxedUpdateSink,
    offset: AtomicI64,
    polling: Mutex<Option<Polling>>,
}

impl Updater {
    /// Creates an updater that queues into `sink`.
    pub fn new(sink: BoxedUpdateSink) -> Self {
        Self {
            sink,
            offset: AtomicI64::new(0),
            polling: Mutex::new(None),
        }
    }

    /// The identifier of the first update not yet acknowledged.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Queues one pushed update.
    pub fn push(&self, update: Update) -> UpdaterResult<()> {
        trace!(update_id = update.id, kind = update.kind_name(), "Update pushed");
        self.sink
            .push_update(update)
            .map_err(|SinkClosed| UpdaterError::QueueClosed)
    }

    /// Decodes one update from a JSON payload and queues it.
    ///
    /// Returns the update id.
    pub fn push_json(&self, payload: &[u8]) -> UpdaterResult<i64> {
        let update: Update = serde_json::from_slice(payload)?;
        let id = update.id;
        self.push(update)?;
        Ok(id)
    }

    /// Returns `true` while the polling task runs.
    pub fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }

    /// Spawns the polling loop. Returns `false` if it was already running.
    pub fn start_polling(self: &Arc<Self>, source: BoxedUpdateSource, options: PollingOptions) -> bool {
        let mut polling = self.polling.lock();
        if polling.as_ref().is_some_and(|p| !p.task.is_finished()) {
            warn!("Polling already running");
            return false;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).poll(source, options, token.clone()));
        *polling = Some(Polling { token, task });
        true
    }

    /// Stops polling.
    ///
    /// Cancellation is checked between iterations: a fetch in flight
    /// completes (or times out) and its batch is queued before the loop
    /// exits.
    pub async fn stop(&self) {
        let polling = self.polling.lock().take();
        let Some(Polling { token, task }) = polling else {
            return;
        };
        token.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "Polling task terminated abnormally");
        }
    }

    /// Moves the offset past `max_id`. Never moves it backwards.
    fn acknowledge(&self, max_id: i64) -> i64 {
        let next = max_id.saturating_add(1);
        let previous = self.offset.fetch_max(next, Ordering::SeqCst);
        previous.max(next)
    }

    /// Acknowledges everything queued upstream without processing it.
    async fn skip_pending(&self, source: &dyn UpdateSource, options: &PollingOptions) -> ApiResult<Option<i64>> {
        // A negative offset asks for the most recent update only.
        let params = GetUpdates {
            offset: -1,
            limit: 1,
            timeout: 0,
            allowed_updates: options.allowed_updates.clone(),
        };
        let batch = source.get_updates(&params).await?;
        Ok(batch.iter().map(|u| u.id).max().map(|id| self.acknowledge(id)))
    }

    async fn poll(self: Arc<Self>, source: BoxedUpdateSource, options: PollingOptions, token: CancellationToken) {
        info!(offset = self.offset(), timeout = options.timeout, "Polling started");

        if options.drop_pending_updates {
            match self.skip_pending(source.as_ref(), &options).await {
                Ok(Some(offset)) => info!(offset, "Dropped pending updates"),
                Ok(None) => debug!("No pending updates to drop"),
                Err(e) => warn!(error = %e, "Failed to drop pending updates"),
            }
        }

        let mut delay = options.backoff.initial;
        let mut params = GetUpdates {
            offset: self.offset(),
            limit: options.limit,
            timeout: options.timeout,
            allowed_updates: options.allowed_updates.clone(),
        };

        while !token.is_cancelled() {
            params.offset = self.offset();
            let result = source.get_updates(&params).await;

            match result {
                Ok(batch) => {
                    delay = options.backoff.initial;
                    let Some(max_id) = batch.iter().map(|u| u.id).max() else {
                        trace!("Empty batch");
                        continue;
                    };
                    let count = batch.len();
                    for update in batch {
                        if self.sink.push_update(update).is_err() {
                            warn!("Dispatcher queue closed, polling stops");
                            return;
                        }
                    }
                    let offset = self.acknowledge(max_id);
                    debug!(count, offset, "Batch queued");
                }
                Err(err) => {
                    let wait = match &err {
                        ApiError::RetryAfter(secs) => Duration::from_secs(*secs),
                        _ => {
                            let wait = delay;
                            delay = options.backoff.next(delay);
                            wait
                        }
                    };
                    warn!(error = %err, retry_in = ?wait, "Fetching updates failed");
                    if self.sink.push_failure(err).is_err() {
                        warn!("Dispatcher queue closed, polling stops");
                        return;
                    }
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
        info!(offset = self.offset(), "Polling stopped");
    }
}

/// Lets push transports hand updates to the updater directly.
impl UpdateSink for Updater {
    fn push_update(&self, update: Update) -> Result<(), SinkClosed> {
        self.push(update).map_err(|_| SinkClosed)
    }

    fn push_failure(&self, error: ApiError) -> Result<(), SinkClosed> {
        self.sink.push_failure(error)
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("offset", &self.offset())
            .field("polling", &self.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::UpdateKind;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<ApiResult<Vec<Update>>>>,
        requests: Mutex<Vec<GetUpdates>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<ApiResult<Vec<i64>>>) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|step| step.map(|ids| ids.into_iter().map(update).collect()))
                .collect();
            Arc::new(Self {
                script: Mutex::new(script),
                requests: Mutex::default(),
            })
        }

        fn offsets(&self) -> Vec<i64> {
            self.requests.lock().iter().map(|r| r.offset).collect()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn get_updates(&self, params: &GetUpdates) -> ApiResult<Vec<Update>> {
            self.requests.lock().push(params.clone());
            let step = self.script.lock().pop_front();
            match step {
                Some(step) => step,
                None => {
                    // Behaves like a long poll with nothing to deliver.
                    tokio::time::sleep(Duration::from_secs(u64::from(params.timeout))).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<i64>>,
        failures: Mutex<Vec<String>>,
        closed: bool,
    }

    impl UpdateSink for RecordingSink {
        fn push_update(&self, update: Update) -> Result<(), SinkClosed> {
            if self.closed {
                return Err(SinkClosed);
            }
            self.updates.lock().push(update.id);
            Ok(())
        }

        fn push_failure(&self, error: ApiError) -> Result<(), SinkClosed> {
            self.failures.lock().push(error.to_string());
            Ok(())
        }
    }

    fn update(id: i64) -> Update {
        Update::new(id, UpdateKind::Unknown(serde_json::json!({})))
    }

    fn updater() -> (Arc<Updater>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (Arc::new(Updater::new(sink.clone())), sink)
    }

    async fn wait_for_requests(source: &ScriptedSource, n: usize) {
        for _ in 0..10_000 {
            if source.requests.lock().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("source saw {} requests, wanted {n}", source.requests.lock().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_moves_past_highest_id() {
        let (updater, sink) = updater();
        let source = ScriptedSource::new(vec![Ok(vec![5, 6, 9]), Ok(vec![])]);
        assert!(updater.start_polling(source.clone(), PollingOptions::default()));

        wait_for_requests(&source, 3).await;
        updater.stop().await;

        assert_eq!(*sink.updates.lock(), vec![5, 6, 9]);
        assert_eq!(updater.offset(), 10);
        assert_eq!(source.offsets(), vec![0, 10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_never_decreases() {
        let (updater, _sink) = updater();
        let source = ScriptedSource::new(vec![Ok(vec![12]), Ok(vec![3])]);
        updater.start_polling(source.clone(), PollingOptions::default());

        wait_for_requests(&source, 3).await;
        updater.stop().await;

        assert_eq!(updater.offset(), 13);
        assert_eq!(source.offsets(), vec![0, 13, 13]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reported_and_retried() {
        let (updater, sink) = updater();
        let source = ScriptedSource::new(vec![
            Err(ApiError::Timeout),
            Err(ApiError::transport("connection reset")),
            Ok(vec![3]),
        ]);
        let start = Instant::now();
        updater.start_polling(source.clone(), PollingOptions::default());

        wait_for_requests(&source, 4).await;
        updater.stop().await;

        assert_eq!(sink.failures.lock().len(), 2);
        assert_eq!(*sink.updates.lock(), vec![3]);
        assert_eq!(source.offsets(), vec![0, 0, 0, 4]);
        // 500ms, then 1s.
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_honored() {
        let (updater, _sink) = updater();
        let source = ScriptedSource::new(vec![Err(ApiError::RetryAfter(7)), Ok(vec![1])]);
        let start = Instant::now();
        updater.start_polling(source.clone(), PollingOptions::default());

        wait_for_requests(&source, 2).await;
        assert!(start.elapsed() >= Duration::from_secs(7));
        updater.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_pending_updates() {
        let (updater, sink) = updater();
        let source = ScriptedSource::new(vec![Ok(vec![41]), Ok(vec![42])]);
        let options = PollingOptions {
            drop_pending_updates: true,
            ..Default::default()
        };
        updater.start_polling(source.clone(), options);

        wait_for_requests(&source, 3).await;
        updater.stop().await;

        assert_eq!(source.offsets(), vec![-1, 42, 43]);
        assert_eq!(*sink.updates.lock(), vec![42]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_restart() {
        let (updater, _sink) = updater();
        let source = ScriptedSource::new(vec![]);
        assert!(updater.start_polling(source.clone(), PollingOptions::default()));
        assert!(!updater.start_polling(source.clone(), PollingOptions::default()));
        wait_for_requests(&source, 1).await;

        updater.stop().await;
        assert!(!updater.is_polling());
        assert!(updater.start_polling(source.clone(), PollingOptions::default()));
        updater.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_fetch_in_flight_finish() {
        struct SlowSource;

        #[async_trait]
        impl UpdateSource for SlowSource {
            async fn get_updates(&self, _params: &GetUpdates) -> ApiResult<Vec<Update>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![update(8)])
            }
        }

        let (updater, sink) = updater();
        updater.start_polling(Arc::new(SlowSource), PollingOptions::default());
        tokio::time::sleep(Duration::from_secs(1)).await;

        updater.stop().await;
        assert_eq!(*sink.updates.lock(), vec![8]);
        assert_eq!(updater.offset(), 9);
    }

    #[tokio::test]
    async fn test_polling_ends_when_queue_closes() {
        let sink = Arc::new(RecordingSink {
            closed: true,
            ..Default::default()
        });
        let updater = Arc::new(Updater::new(sink));
        let source = ScriptedSource::new(vec![Ok(vec![1])]);
        updater.start_polling(source, PollingOptions::default());

        for _ in 0..100 {
            if !updater.is_polling() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!updater.is_polling());
        assert_eq!(updater.offset(), 0);
    }

    #[test]
    fn test_push_json() {
        let (updater, sink) = updater();
        let id = updater
            .push_json(br#"{"update_id": 77, "something_new": {"x": 1}}"#)
            .unwrap();
        assert_eq!(id, 77);
        assert_eq!(*sink.updates.lock(), vec![77]);

        assert!(matches!(
            updater.push_json(b"not json"),
            Err(UpdaterError::Decode(_))
        ));
    }

    #[test]
    fn test_push_into_closed_queue() {
        let updater = Updater::new(Arc::new(RecordingSink {
            closed: true,
            ..Default::default()
        }));
        assert!(matches!(updater.push(update(1)), Err(UpdaterError::QueueClosed)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
            multiplier: 2.0,
        };
        let d1 = backoff.next(backoff.initial);
        let d2 = backoff.next(d1);
        assert_eq!(d1, Duration::from_millis(200));
        assert_eq!(d2, Duration::from_millis(350));
    }

    #[test]
    fn test_backoff_saturates_on_huge_multiplier() {
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 1e30,
        };
        assert_eq!(backoff.next(backoff.initial), Duration::from_secs(30));
        assert_eq!(backoff.next(Duration::MAX), Duration::from_secs(30));

        let infinite = Backoff {
            multiplier: f64::INFINITY,
            ..backoff
        };
        assert_eq!(infinite.next(Duration::from_secs(1)), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_multiplier_keeps_polling_alive() {
        let (updater, sink) = updater();
        let source = ScriptedSource::new(vec![
            Err(ApiError::Timeout),
            Err(ApiError::Timeout),
            Ok(vec![4]),
        ]);
        let options = PollingOptions {
            backoff: Backoff {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(1),
                multiplier: 1e30,
            },
            ..Default::default()
        };
        updater.start_polling(source.clone(), options);

        wait_for_requests(&source, 4).await;
        assert!(updater.is_polling());
        updater.stop().await;
        assert_eq!(*sink.updates.lock(), vec![4]);
    }
}
