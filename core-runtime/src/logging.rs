//! # Logging & Tracing Infrastructure
//!
//! Provides structured logging with `tracing` crate, supporting:
//! - JSON and pretty-print output formats
//! - Module-level filtering
//! - PII redaction helpers (tokens, emails)
//! - Integration with host logging via `LoggerSink`
//! - An explicit per-client logger capability ([`ClientLogger`])
//!
//! ## Overview
//!
//! Library code instruments itself with `tracing` macros and never installs a
//! subscriber. Hosts that want console output call [`init_logging`] once.
//!
//! Diagnostics that a host must be able to observe without a global
//! subscriber (failed requests, failed refreshes) go through a
//! [`ClientLogger`] handed to each client at construction. It emits the
//! matching `tracing` event under the calling crate's target and forwards the
//! same entry to the injected sink. When the global sink layer holds that same
//! sink, the entry is delivered once.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{LoggingConfig, LogFormat, init_logging};
//! use bridge_traits::time::LogLevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug);
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!("Application started");
//! }
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Minimum log level
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_graph=debug,core_auth=trace")
    pub filter: Option<String>,
    /// Optional logger sink for forwarding logs to host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Enable span contexts
    pub enable_spans: bool,
    /// Display target module in logs
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
        }
    }
}

impl LoggingConfig {
    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set minimum log level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set custom filter string
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set logger sink for host integration
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enable or disable span contexts
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    /// Enable or disable target display
    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Initialize the global logging subscriber
///
/// Optional; meant for host binaries. Subsequent calls return an error.
///
/// # Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - The filter string is invalid
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone());
    let registry = tracing_subscriber::registry().with(filter).with(sink_layer);

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.display_target)
                    .with_span_events(if config.enable_spans {
                        tracing_subscriber::fmt::format::FmtSpan::ACTIVE
                    } else {
                        tracing_subscriber::fmt::format::FmtSpan::NONE
                    })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans)
                    .with_target(config.display_target)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(config.display_target)
                    .with_writer(io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let base_level = config.level.as_str().to_ascii_lowercase();

    let filter_string = if let Some(custom_filter) = &config.filter {
        custom_filter.clone()
    } else {
        // Our crates at the requested level, transport dependencies at warn
        [
            "core_runtime",
            "core_auth",
            "core_graph",
            "core_service",
            "provider_onedrive",
            "provider_sharepoint",
            "bridge_desktop",
        ]
        .iter()
        .map(|krate| format!("{}={}", krate, base_level))
        .chain(["h2=warn", "hyper=warn", "reqwest=warn"].map(String::from))
        .collect::<Vec<_>>()
        .join(",")
    };

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Explicit logger capability handed to each client at construction.
///
/// Cloning is cheap; clones share the same sink.
#[derive(Clone, Default)]
pub struct ClientLogger {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl fmt::Debug for ClientLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientLogger")
            .field("sink", &self.sink.as_ref().map(|_| "LoggerSink { ... }"))
            .finish()
    }
}

impl ClientLogger {
    pub fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }

    pub fn with_sink(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Logger that only emits `tracing` events
    pub fn tracing_only() -> Self {
        Self { sink: None }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit the entry as a `tracing` event and forward it to the sink.
    ///
    /// Sink failures are reported through `tracing` and otherwise ignored.
    pub async fn emit(&self, entry: LogEntry) {
        let Some(sink) = self
            .sink
            .as_ref()
            .filter(|sink| entry.level >= sink.min_level())
        else {
            emit_tracing_event(&entry);
            return;
        };

        // the sink layer skips this event when it shares our sink
        DELIVERED_TO.with(|delivered| delivered.set(sink_address(sink)));
        emit_tracing_event(&entry);
        DELIVERED_TO.with(|delivered| delivered.set(0));

        if let Err(err) = sink.log(entry).await {
            tracing::warn!(error = %err, "LoggerSink rejected log entry");
        }
    }

    pub async fn error(&self, target: &str, message: &str, fields: &[(&str, String)]) {
        self.emit(build_entry(LogLevel::Error, target, message, fields))
            .await;
    }

    pub async fn warn(&self, target: &str, message: &str, fields: &[(&str, String)]) {
        self.emit(build_entry(LogLevel::Warn, target, message, fields))
            .await;
    }

    pub async fn info(&self, target: &str, message: &str, fields: &[(&str, String)]) {
        self.emit(build_entry(LogLevel::Info, target, message, fields))
            .await;
    }
}

fn build_entry(level: LogLevel, target: &str, message: &str, fields: &[(&str, String)]) -> LogEntry {
    fields
        .iter()
        .fold(LogEntry::new(level, target, message), |entry, (key, value)| {
            entry.with_field(*key, value.clone())
        })
}

thread_local! {
    /// Sink a [`ClientLogger`] is delivering the current event to, or 0
    static DELIVERED_TO: Cell<usize> = const { Cell::new(0) };
}

fn sink_address(sink: &Arc<dyn LoggerSink>) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}

/// Field carrying the full [`LogEntry`] target on client logger events
const COMPONENT_FIELD: &str = "component";

macro_rules! client_event {
    ($target:literal, $entry:expr) => {{
        let entry: &LogEntry = $entry;
        let component = entry.target.as_str();
        let fields = &entry.fields;
        match entry.level {
            LogLevel::Trace => tracing::trace!(target: $target, component, ?fields, "{}", entry.message),
            LogLevel::Debug => tracing::debug!(target: $target, component, ?fields, "{}", entry.message),
            LogLevel::Info => tracing::info!(target: $target, component, ?fields, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(target: $target, component, ?fields, "{}", entry.message),
            LogLevel::Error => tracing::error!(target: $target, component, ?fields, "{}", entry.message),
        }
    }};
}

/// Emit under the calling crate's target so per-crate filters apply.
fn emit_tracing_event(entry: &LogEntry) {
    let krate = entry
        .target
        .split_once("::")
        .map_or(entry.target.as_str(), |(krate, _)| krate);

    match krate {
        "core_auth" => client_event!("core_auth", entry),
        "core_graph" => client_event!("core_graph", entry),
        "core_service" => client_event!("core_service", entry),
        "provider_onedrive" => client_event!("provider_onedrive", entry),
        "provider_sharepoint" => client_event!("provider_sharepoint", entry),
        "bridge_desktop" => client_event!("bridge_desktop", entry),
        _ => client_event!("core_runtime", entry),
    }
}

/// Layer that forwards events to a `LoggerSink` implementation.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());

        if level < sink.min_level() {
            return;
        }

        if DELIVERED_TO.with(Cell::get) == sink_address(sink) {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let target = visitor
            .fields
            .remove(COMPONENT_FIELD)
            .unwrap_or_else(|| metadata.target().to_string());

        let mut entry = LogEntry::new(level, target, message);

        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }

        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        let sink = Arc::clone(sink);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        if let Err(err) = futures::executor::block_on(async move { sink.log(entry).await }) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Helper function to redact sensitive field values
///
/// ```ignore
/// use tracing::info;
/// use core_runtime::logging::redact_if_sensitive;
///
/// info!(email = %redact_if_sensitive("email", "a@b.com"), "Revoking permission");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const SENSITIVE_FIELDS: &[&str] = &[
        "token",
        "access_token",
        "refresh_token",
        "password",
        "secret",
        "api_key",
        "authorization",
        "bearer",
        "code",
    ];

    let field_lower = field_name.to_lowercase();
    if SENSITIVE_FIELDS.iter().any(|&f| field_lower.contains(f)) {
        "[REDACTED]".to_string()
    } else if value.contains('@') && value.contains('.') {
        // Likely an email - redact domain but keep first char
        let first = value
            .split('@')
            .next()
            .and_then(|local| local.chars().next())
            .map(String::from)
            .unwrap_or_default();
        format!("{}***@[REDACTED]", first)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as SinkResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Trace
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LoggerSink for FailingSink {
        async fn log(&self, _entry: LogEntry) -> SinkResult<()> {
            Err(BridgeError::OperationFailed("sink offline".to_string()))
        }
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_graph=trace")
            .with_spans(false)
            .with_target(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter, Some("core_graph=trace".to_string()));
        assert!(!config.enable_spans);
        assert!(config.display_target);
    }

    #[test]
    fn test_build_filter() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("core_graph=debug"));
        assert!(rendered.contains("reqwest=warn"));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("core_auth=trace,core_graph=debug");
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("core_auth=trace"));
    }

    #[tokio::test]
    async fn test_client_logger_forwards_fields() {
        let sink = Arc::new(TestLoggerSink::default());
        let logger = ClientLogger::with_sink(sink.clone());

        logger
            .error(
                "core_graph::api",
                "Request failed",
                &[("status", "500".to_string()), ("url", "https://x".to_string())],
            )
            .await;

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].target, "core_graph::api");
        assert_eq!(entries[0].field("status"), Some("500"));
        assert_eq!(entries[0].field("url"), Some("https://x"));
    }

    #[tokio::test]
    async fn test_client_logger_respects_sink_level() {
        #[derive(Default)]
        struct ErrorsOnly(Mutex<usize>);

        #[async_trait]
        impl LoggerSink for ErrorsOnly {
            async fn log(&self, _entry: LogEntry) -> SinkResult<()> {
                *self.0.lock().unwrap() += 1;
                Ok(())
            }

            fn min_level(&self) -> LogLevel {
                LogLevel::Error
            }
        }

        let sink = Arc::new(ErrorsOnly::default());
        let logger = ClientLogger::with_sink(sink.clone());

        logger.info("test", "ignored", &[]).await;
        logger.error("test", "kept", &[]).await;

        assert_eq!(*sink.0.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_logger_survives_sink_failure() {
        let logger = ClientLogger::with_sink(Arc::new(FailingSink));
        logger.error("test", "still returns", &[]).await;

        let silent = ClientLogger::tracing_only();
        assert!(!silent.has_sink());
        silent.warn("test", "no sink", &[]).await;
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let layer = LoggerSinkLayer::new(Some(trait_sink));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "test.target", item = "abc", "hello world");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "test.target");
        assert_eq!(entry.message, "hello world");
        assert_eq!(entry.field("item"), Some("abc"));
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_client_logger_and_layer_deliver_once_to_shared_sink() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber =
            tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink.clone())));
        let _guard = tracing::subscriber::set_default(subscriber);

        ClientLogger::with_sink(trait_sink)
            .error("core_graph::api", "Request failed", &[("status", "500".to_string())])
            .await;
        settle().await;

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_graph::api");
        assert_eq!(entries[0].field("status"), Some("500"));
    }

    #[tokio::test]
    async fn test_layer_still_delivers_to_its_own_sink() {
        let layer_sink = Arc::new(TestLoggerSink::default());
        let client_sink = Arc::new(TestLoggerSink::default());
        let layer_trait_sink: Arc<dyn LoggerSink> = layer_sink.clone();
        let subscriber =
            tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(layer_trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        ClientLogger::with_sink(client_sink.clone())
            .warn("core_auth::token_store", "Refresh failed", &[])
            .await;
        settle().await;

        assert_eq!(client_sink.entries.lock().unwrap().len(), 1);
        let entries = layer_sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_auth::token_store");
        assert_eq!(entries[0].message, "Refresh failed");
    }

    #[tokio::test]
    async fn test_tracing_only_logger_reaches_layer_with_caller_target() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber =
            tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        ClientLogger::tracing_only()
            .error("core_graph::api", "Request failed", &[])
            .await;
        settle().await;

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].target, "core_graph::api");
        assert_eq!(entries[0].field("component"), None);
    }

    #[test]
    fn test_client_events_use_the_calling_crate_target() {
        let filter = EnvFilter::try_new("core_graph=off,core_runtime=trace").unwrap();
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let entry = LogEntry::new(LogLevel::Error, "core_graph::api", "filtered");
        emit_tracing_event(&entry);
        let entry = LogEntry::new(LogLevel::Error, "elsewhere", "kept");
        emit_tracing_event(&entry);

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("access_token", "secret123"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("auth_code", "M.abc"), "[REDACTED]");

        let redacted = redact_if_sensitive("email", "user@example.com");
        assert!(redacted.starts_with('u'));
        assert!(redacted.contains("[REDACTED]"));

        assert_eq!(redact_if_sensitive("item_id", "01ABC"), "01ABC");
    }

    #[test]
    fn test_redact_email_with_multibyte_first_char() {
        assert_eq!(
            redact_if_sensitive("email", "élodie@example.com"),
            "é***@[REDACTED]"
        );
        assert_eq!(redact_if_sensitive("email", "@example.com"), "***@[REDACTED]");
    }
}
