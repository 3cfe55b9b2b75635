//! The update dispatcher.
//!
//! The [`Dispatcher`] owns the handler registry, the optional error handler
//! and an unbounded FIFO queue. Producers push through a
//! [`DispatcherHandle`]; a single consumption loop, started with
//! [`Dispatcher::start`], takes one update at a time and routes it:
//!
//! 1. Groups are visited in registration order
//! 2. Inside a group, the first handler whose `matches` is `true` runs and
//!    is awaited to completion; the rest of the group is skipped
//! 3. Every group is offered the update, whatever happened in earlier groups
//!
//! Each `matches` and `handle` call is isolated: an error or a panic becomes
//! a [`Failure`] for the error handler and routing moves on.
//!
//! ```rust,ignore
//! use courier_framework::{Dispatcher, TextHandler};
//!
//! let dispatcher = Arc::new(Dispatcher::new(bot));
//! dispatcher.register(TextHandler::new(|ctx, input| async move {
//!     ctx.reply(&input.text).await?;
//!     Ok(())
//! }));
//! dispatcher.register_error_handler(|_bot, failure| async move {
//!     tracing::warn!(%failure, "Update failed");
//! });
//! dispatcher.start();
//! dispatcher.enqueue(update);
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use courier_core::{ApiError, BoxedBot, SinkClosed, Update, UpdateSink};
use futures::FutureExt;
use futures::future::{BoxFuture, Ready, ready};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use crate::context::Context;
use crate::error::{DispatchError, Failure, panic_message};
use crate::handler::{BoxedHandler, Handler};
use crate::registry::HandlerRegistry;

/// The single error handler of a dispatcher.
pub type ErrorHandler = Arc<dyn Fn(BoxedBot, Arc<Failure>) -> BoxFuture<'static, ()> + Send + Sync>;

/// An item waiting in the dispatcher queue.
#[derive(Debug)]
pub enum Incoming {
    Update(Update),
    /// A failure reported by ingestion, routed to the error handler in
    /// queue order.
    Failure(Failure),
}

/// Which handler took an update in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledBy {
    pub group: String,
    pub handler: String,
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub update_id: i64,
    /// One entry per group in which a handler ran, in routing order.
    pub handled: Vec<HandledBy>,
    /// Number of failures forwarded to the error path.
    pub failures: usize,
}

impl DispatchReport {
    /// Returns `true` if any handler ran.
    pub fn is_handled(&self) -> bool {
        !self.handled.is_empty()
    }
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Routes updates to handlers.
pub struct Dispatcher {
    bot: BoxedBot,
    registry: RwLock<HandlerRegistry>,
    error_handler: RwLock<Option<ErrorHandler>>,
    tx: mpsc::UnboundedSender<Incoming>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>>,
    running: Mutex<Option<Running>>,
}

impl Dispatcher {
    /// Creates a dispatcher whose handlers talk through `bot`.
    pub fn new(bot: BoxedBot) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bot,
            registry: RwLock::new(HandlerRegistry::new()),
            error_handler: RwLock::new(None),
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            running: Mutex::new(None),
        }
    }

    /// Returns the bot handed to handlers.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Appends a handler to its group.
    pub fn register<H: Handler + 'static>(&self, handler: H) {
        self.register_boxed(Arc::new(handler));
    }

    /// Appends an already shared handler to its group.
    pub fn register_boxed(&self, handler: BoxedHandler) {
        debug!(group = handler.group(), handler = handler.name(), "Registering handler");
        self.registry.write().register(handler);
    }

    /// Sets the error handler, replacing any previous one.
    pub fn register_error_handler<F, Fut>(&self, f: F)
    where
        F: Fn(BoxedBot, Arc<Failure>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: ErrorHandler = Arc::new(move |bot, failure| Box::pin(f(bot, failure)));
        *self.error_handler.write() = Some(handler);
    }

    /// Returns a snapshot of the registry.
    pub fn registry(&self) -> HandlerRegistry {
        self.registry.read().clone()
    }

    /// Returns a producer handle for the queue.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            tx: self.tx.clone(),
        }
    }

    /// Queues an update. Never blocks.
    pub fn enqueue(&self, update: Update) {
        // The receiver lives as long as `self`, so sending cannot fail here.
        let _ = self.tx.send(Incoming::Update(update));
    }

    /// Returns `true` while the consumption loop runs.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Spawns the consumption loop. Returns `false` if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            warn!("Dispatcher already running");
            return false;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).consume(token.clone()));
        *running = Some(Running { token, task });
        info!("Dispatcher started");
        true
    }

    /// Stops the consumption loop after the update in progress.
    ///
    /// Queued updates stay in the queue and are consumed after the next
    /// [`start`](Self::start).
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(Running { token, task }) = running else {
            return;
        };
        token.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "Dispatcher loop terminated abnormally");
        }
        info!("Dispatcher stopped");
    }

    async fn consume(self: Arc<Self>, token: CancellationToken) {
        let mut rx = self.rx.lock().await;
        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = rx.recv() => item,
            };
            match item {
                Some(Incoming::Update(update)) => {
                    self.process_update(update).await;
                }
                Some(Incoming::Failure(failure)) => {
                    self.report(Arc::new(failure)).await;
                }
                None => break,
            }
        }
        trace!("Consumption loop exited");
    }

    /// Runs one dispatch pass for `update`.
    pub async fn process_update(&self, update: Update) -> DispatchReport {
        let update = Arc::new(update);
        let span = span!(
            Level::DEBUG,
            "dispatch",
            update_id = update.id,
            kind = update.kind_name()
        );

        async {
            let registry = self.registry();
            let mut report = DispatchReport {
                update_id: update.id,
                ..Default::default()
            };

            for group in registry.groups() {
                let mut panicked = Vec::new();
                let matched = group.find_match(&update, |handler, message| {
                    panicked.push(DispatchError::Panicked {
                        handler: handler.name().to_string(),
                        message,
                    });
                });
                let matched = matched.cloned();

                for error in panicked {
                    report.failures += 1;
                    self.fail(&update, group.tag(), error).await;
                }

                let Some(handler) = matched else {
                    trace!(group = group.tag(), "No handler matched");
                    continue;
                };

                debug!(group = group.tag(), handler = handler.name(), "Handler matched");
                report.handled.push(HandledBy {
                    group: group.tag().to_string(),
                    handler: handler.name().to_string(),
                });

                let ctx = Context::new(Arc::clone(&self.bot), Arc::clone(&update));
                let outcome = AssertUnwindSafe(handler.handle(ctx)).catch_unwind().await;
                let error = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(source)) => DispatchError::Handler {
                        handler: handler.name().to_string(),
                        source,
                    },
                    Err(payload) => DispatchError::Panicked {
                        handler: handler.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    },
                };
                report.failures += 1;
                self.fail(&update, group.tag(), error).await;
            }

            if !report.is_handled() {
                trace!("Update not handled by any group");
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn fail(&self, update: &Arc<Update>, group: &str, error: DispatchError) {
        self.report(Arc::new(Failure {
            update: Some(Arc::clone(update)),
            group: Some(group.to_string()),
            error,
        }))
        .await;
    }

    /// Hands a failure to the error handler, or logs it when there is none.
    async fn report(&self, failure: Arc<Failure>) {
        let handler = self.error_handler.read().clone();
        let Some(handler) = handler else {
            error!(failure = %failure, "Unhandled failure (no error handler registered)");
            return;
        };

        let call = handler(Arc::clone(&self.bot), Arc::clone(&failure));
        if let Err(payload) = AssertUnwindSafe(call).catch_unwind().await {
            error!(
                failure = %failure,
                panic = %panic_message(payload.as_ref()),
                "Error handler panicked"
            );
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot", &self.bot.id())
            .field("registry", &*self.registry.read())
            .field("has_error_handler", &self.error_handler.read().is_some())
            .finish()
    }
}

/// Clonable producer side of the dispatcher queue.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Incoming>,
}

impl DispatcherHandle {
    /// Queues an update.
    pub fn enqueue(&self, update: Update) -> Result<(), SinkClosed> {
        self.tx.send(Incoming::Update(update)).map_err(|_| SinkClosed)
    }

    /// Queues an ingestion failure.
    pub fn enqueue_failure(&self, failure: Failure) -> Result<(), SinkClosed> {
        self.tx.send(Incoming::Failure(failure)).map_err(|_| SinkClosed)
    }

    /// Returns `true` once the dispatcher has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl UpdateSink for DispatcherHandle {
    fn push_update(&self, update: Update) -> Result<(), SinkClosed> {
        self.enqueue(update)
    }

    fn push_failure(&self, error: ApiError) -> Result<(), SinkClosed> {
        self.enqueue_failure(Failure::ingestion(error))
    }
}

/// Lets ingestion be composed with tower middleware.
impl Service<Update> for DispatcherHandle {
    type Response = ();
    type Error = SinkClosed;
    type Future = Ready<Result<(), SinkClosed>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        if self.tx.is_closed() {
            Poll::Ready(Err(SinkClosed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, update: Update) -> Self::Future {
        ready(self.enqueue(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::{CommandHandler, GenericHandler, TextHandler};
    use crate::testing::{MockBot, text_update};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn counter_handler(counter: &Arc<AtomicUsize>, add: usize) -> GenericHandler {
        let counter = Arc::clone(counter);
        GenericHandler::new(move |_ctx, _u| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(add, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn explode() -> crate::error::HandlerResult {
        panic!("kaboom")
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {expected}, got {}",
            counter.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_first_match_per_group() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(MockBot::new());
        dispatcher.register(counter_handler(&counter, 1));
        dispatcher.register(counter_handler(&counter, 10));

        let report = dispatcher.process_update(text_update(1, 1, "hi")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(report.handled.len(), 1);
    }

    #[tokio::test]
    async fn test_every_group_is_offered_the_update() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(MockBot::new());
        dispatcher.register(counter_handler(&counter, 1).group("a"));
        dispatcher.register(
            TextHandler::new(|_ctx, _t| async { Ok(()) })
                .contains("nope")
                .group("b"),
        );
        dispatcher.register(counter_handler(&counter, 10).group("c"));

        let report = dispatcher.process_update(text_update(1, 1, "hi")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        let groups: Vec<_> = report.handled.iter().map(|h| h.group.as_str()).collect();
        assert_eq!(groups, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_failure_isolation_and_error_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(MockBot::new());

        dispatcher.register(
            GenericHandler::new(|_ctx, _u| async { Err(HandlerError::other("boom")) }).group("a"),
        );
        dispatcher.register(
            GenericHandler::new(|_ctx, _u| explode()).group("b"),
        );
        dispatcher.register(counter_handler(&counter, 1).group("c"));

        let sink = Arc::clone(&failures);
        dispatcher.register_error_handler(move |_bot, failure| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push((failure.group.clone(), failure.error.to_string()));
            }
        });

        let report = dispatcher.process_update(text_update(1, 1, "hi")).await;
        assert_eq!(report.failures, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let failures = failures.lock();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0.as_deref(), Some("a"));
        assert!(failures[0].1.contains("boom"));
        assert_eq!(failures[1].0.as_deref(), Some("b"));
        assert!(failures[1].1.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_panicking_error_handler_does_not_stop_dispatch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(MockBot::new());
        dispatcher.register(
            GenericHandler::new(|_ctx, _u| async { Err(HandlerError::other("x")) }).group("a"),
        );
        dispatcher.register(counter_handler(&counter, 1).group("b"));
        dispatcher.register_error_handler(|_bot, _failure| async {
            panic!("handler bug");
        });

        dispatcher.process_update(text_update(1, 1, "hi")).await;
        dispatcher.process_update(text_update(2, 1, "hi")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loop_consumes_in_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let done = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::new(MockBot::new()));

        let (sink, finished) = (Arc::clone(&seen), Arc::clone(&done));
        dispatcher.register(GenericHandler::new(move |_ctx, update| {
            let (sink, finished) = (Arc::clone(&sink), Arc::clone(&finished));
            async move {
                sink.lock().push(update.id);
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        for id in [5, 6, 9] {
            dispatcher.enqueue(text_update(id, 1, "x"));
        }
        assert!(dispatcher.start());
        assert!(!dispatcher.start());
        wait_for(&done, 3).await;
        dispatcher.stop().await;

        assert_eq!(*seen.lock(), vec![5, 6, 9]);
    }

    #[tokio::test]
    async fn test_stop_retains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::new(MockBot::new()));
        dispatcher.register(counter_handler(&counter, 1));

        dispatcher.start();
        dispatcher.enqueue(text_update(1, 1, "x"));
        wait_for(&counter, 1).await;
        dispatcher.stop().await;
        assert!(!dispatcher.is_running());

        let handle = dispatcher.handle();
        handle.enqueue(text_update(2, 1, "x")).unwrap();
        handle.enqueue(text_update(3, 1, "x")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        dispatcher.start();
        wait_for(&counter, 3).await;
        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_ingestion_failures_reach_error_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::new(MockBot::new()));
        let sink = Arc::clone(&seen);
        dispatcher.register_error_handler(move |_bot, failure| {
            let sink = Arc::clone(&sink);
            async move {
                if failure.is_ingestion() {
                    sink.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        dispatcher.start();
        dispatcher.handle().push_failure(ApiError::Timeout).unwrap();
        wait_for(&seen, 1).await;
        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_handle_as_tower_service() {
        let dispatcher = Arc::new(Dispatcher::new(MockBot::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            CommandHandler::new(["ping"], {
                let counter = Arc::clone(&counter);
                move |_ctx, _cmd| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
            }),
        );
        dispatcher.start();

        dispatcher
            .handle()
            .oneshot(text_update(1, 1, "/ping"))
            .await
            .unwrap();
        wait_for(&counter, 1).await;
        dispatcher.stop().await;
    }

    #[test]
    fn test_handle_reports_closed_sink() {
        let dispatcher = Dispatcher::new(MockBot::new());
        let handle = dispatcher.handle();
        drop(dispatcher);
        assert!(handle.is_closed());
        assert_eq!(handle.enqueue(text_update(1, 1, "x")), Err(SinkClosed));
    }
}
