//! Runtime orchestration.
//!
//! [`CourierRuntime`] wires a bot, a dispatcher and an updater together
//! according to [`CourierConfig`], and runs them until shutdown.
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("courier.toml")
//!     .build()?;
//! runtime.register(CommandHandler::new(["start"], |ctx, _| async move {
//!     ctx.reply("hi").await?;
//!     Ok(())
//! }));
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::{BoxedBot, BoxedUpdateSource, Update, WebhookParams};
use courier_framework::{ChainStore, Dispatcher, Failure, Handler};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, CourierConfig, UpdaterMode, validate_config};
use crate::error::{RuntimeError, RuntimeResult, UpdaterError};
use crate::logging;
use crate::updater::{PollingOptions, Updater};

#[cfg(feature = "http-server")]
use courier_core::BoxedUpdateSink;
#[cfg(feature = "http-server")]
use courier_transport::{WebhookHandle, WebhookServer, WebhookServerConfig};

/// A bot process: configuration, dispatcher and update ingestion.
pub struct CourierRuntime {
    config: CourierConfig,
    bot: BoxedBot,
    source: Option<BoxedUpdateSource>,
    dispatcher: Arc<Dispatcher>,
    updater: Arc<Updater>,
    running: AtomicBool,
    #[cfg(feature = "http-server")]
    webhook: tokio::sync::Mutex<Option<WebhookHandle>>,
}

impl CourierRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Assembles a runtime from explicit parts.
    ///
    /// `source` is needed for polling only.
    pub fn new(config: CourierConfig, bot: BoxedBot, source: Option<BoxedUpdateSource>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(bot.clone()));
        let updater = Arc::new(Updater::new(Arc::new(dispatcher.handle())));
        debug!(bot = bot.id(), mode = %config.updater.mode, "Runtime assembled");

        Self {
            config,
            bot,
            source,
            dispatcher,
            updater,
            running: AtomicBool::new(false),
            #[cfg(feature = "http-server")]
            webhook: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn updater(&self) -> &Arc<Updater> {
        &self.updater
    }

    /// Registers a handler with the dispatcher.
    pub fn register<H: Handler + 'static>(&self, handler: H) {
        self.dispatcher.register(handler);
    }

    /// Replaces the error handler.
    pub fn register_error_handler<F, Fut>(&self, f: F)
    where
        F: Fn(BoxedBot, Arc<Failure>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.register_error_handler(f);
    }

    /// Creates a conversation store with the configured limits.
    ///
    /// Hand the same store to several conversation handlers to share state.
    pub fn new_chain_store(&self) -> ChainStore {
        let conversation = &self.config.conversation;
        ChainStore::with_limits(conversation.ttl(), conversation.max_entries)
    }

    /// Queues an update that arrived outside the configured ingestion.
    pub fn enqueue_external_event(&self, update: Update) -> RuntimeResult<()> {
        Ok(self.updater.push(update)?)
    }

    /// Decodes and queues a JSON-encoded update. Returns its id.
    pub fn enqueue_external_json(&self, payload: &[u8]) -> RuntimeResult<i64> {
        Ok(self.updater.push_json(payload)?)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the dispatcher and the configured ingestion.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!(bot = self.bot.id(), mode = %self.config.updater.mode, "Starting Courier runtime");
        self.dispatcher.start();

        let started = match self.config.updater.mode {
            UpdaterMode::Polling => self.start_polling().await,
            UpdaterMode::Webhook => self.start_webhook().await,
        };
        if let Err(e) = started {
            error!(error = %e, "Failed to start update ingestion");
            self.shutdown_components().await;
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        info!("Runtime started");
        Ok(())
    }

    async fn start_polling(&self) -> RuntimeResult<()> {
        let source = self.source.clone().ok_or(UpdaterError::NoSource)?;
        // getUpdates is refused while a webhook is set.
        if let Err(e) = self.bot.delete_webhook(false).await {
            warn!(error = %e, "Failed to remove webhook before polling");
        }
        self.updater
            .start_polling(source, PollingOptions::from(&self.config.updater.polling));
        Ok(())
    }

    async fn start_webhook(&self) -> RuntimeResult<()> {
        let webhook = &self.config.updater.webhook;

        #[cfg(feature = "http-server")]
        {
            let server_config = WebhookServerConfig {
                listen: webhook.listen.clone(),
                path: webhook.path.clone(),
                secret_token: webhook.secret_token.clone(),
            };
            let sink: BoxedUpdateSink = self.updater.clone();
            let handle = WebhookServer::bind(&server_config, sink)
                .await
                .map_err(|e| RuntimeError::Webhook(e.to_string()))?;
            *self.webhook.lock().await = Some(handle);
        }
        #[cfg(not(feature = "http-server"))]
        {
            info!("No webhook server built in, updates must be pushed with enqueue_external_event");
        }

        if let Some(url) = &webhook.public_url {
            let polling = &self.config.updater.polling;
            let params = WebhookParams {
                url: url.clone(),
                secret_token: webhook.secret_token.clone(),
                max_connections: webhook.max_connections,
                allowed_updates: (!polling.allowed_updates.is_empty())
                    .then(|| polling.allowed_updates.clone()),
                drop_pending_updates: polling.drop_pending_updates,
            };
            self.bot.set_webhook(&params).await?;
            info!(url = %url, "Webhook registered");
        }
        Ok(())
    }

    /// Stops ingestion first, then the dispatcher.
    ///
    /// Updates still queued are kept and processed after the next start.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return Ok(());
        }
        info!("Stopping Courier runtime");
        self.shutdown_components().await;
        info!("Runtime stopped");
        Ok(())
    }

    async fn shutdown_components(&self) {
        self.updater.stop().await;
        #[cfg(feature = "http-server")]
        if let Some(handle) = self.webhook.lock().await.take() {
            handle.shutdown().await;
        }
        self.dispatcher.stop().await;
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        info!("Courier runtime is now running");
        shutdown.await;
        self.stop().await
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("bot", &self.bot.id())
            .field("mode", &self.config.updater.mode)
            .field("running", &self.is_running())
            .field("dispatcher", &self.dispatcher)
            .field("updater", &self.updater)
            .finish()
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => on_ctrl_c(result),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                on_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    on_ctrl_c(tokio::signal::ctrl_c().await);
}

fn on_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`CourierRuntime`].
///
/// Without an explicit bot, the `http-client` feature builds one from the
/// `[bot]` section; that client also serves as the polling source.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<CourierConfig>,
    bot: Option<BoxedBot>,
    source: Option<BoxedUpdateSource>,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            bot: None,
            source: None,
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges values below files and the environment.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Uses `config` as is, skipping files and the environment.
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn bot(mut self, bot: BoxedBot) -> Self {
        self.bot = Some(bot);
        self
    }

    /// Sets the polling source.
    pub fn source(mut self, source: BoxedUpdateSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Whether to install the global log subscriber (default: yes).
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        validate_config(&config)?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let (bot, source) = match self.bot {
            Some(bot) => (bot, self.source),
            None => default_bot(&config, self.source)?,
        };
        Ok(CourierRuntime::new(config, bot, source))
    }
}

#[cfg(feature = "http-client")]
fn default_bot(
    config: &CourierConfig,
    source: Option<BoxedUpdateSource>,
) -> RuntimeResult<(BoxedBot, Option<BoxedUpdateSource>)> {
    use courier_transport::HttpBotApi;

    if config.bot.token.is_empty() {
        return Err(RuntimeError::NoBot("bot.token is empty".into()));
    }
    let api = Arc::new(
        HttpBotApi::builder(config.bot.token.clone())
            .api_url(config.bot.api_url.clone())
            .request_timeout(config.bot.request_timeout())
            .build()?,
    );
    let fallback: BoxedUpdateSource = api.clone();
    let bot: BoxedBot = api;
    Ok((bot, Some(source.unwrap_or(fallback))))
}

#[cfg(not(feature = "http-client"))]
fn default_bot(
    _config: &CourierConfig,
    _source: Option<BoxedUpdateSource>,
) -> RuntimeResult<(BoxedBot, Option<BoxedUpdateSource>)> {
    Err(RuntimeError::NoBot(
        "supply one with RuntimeBuilder::bot or enable the http-client feature".into(),
    ))
}
