//! Ready-made subscriber: level filter, console and file output, dedup.
//!
//! ```text
//! registry
//!   └─ reloadable LevelFilter      (set_level)
//!   └─ console ─┬─ with_filter(DedupLayer)   (set_mode)
//!      file ────┘
//! ```
//!
//! Both outputs sit behind a single `DedupLayer`, so every event gets exactly
//! one decision and is either written everywhere or nowhere. The console uses
//! ANSI level colors, the file never does.

use crate::application::ports::Clock;
use crate::domain::mode::FilterMode;
use crate::domain::policy::Thresholds;
use crate::infrastructure::layer::{BuildError, DedupLayer};

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::dispatcher::{self, Dispatch, SetGlobalDefaultError};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt as fmt_layer, reload, Layer, Registry};

/// Error returned when the logging front end cannot be set up or adjusted.
#[derive(Debug)]
pub enum LoggingError {
    /// The log file could not be opened for appending
    OpenFile {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// The dedup layer could not be built
    Build(BuildError),
    /// A global subscriber is already installed
    AlreadyInstalled(SetGlobalDefaultError),
    /// The level filter could not be changed
    Reload(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::OpenFile { path, source } => {
                write!(f, "failed to open log file {}: {}", path.display(), source)
            }
            LoggingError::Build(e) => write!(f, "failed to build log filter: {}", e),
            LoggingError::AlreadyInstalled(e) => write!(f, "{}", e),
            LoggingError::Reload(reason) => write!(f, "failed to change log level: {}", reason),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::OpenFile { source, .. } => Some(source),
            LoggingError::Build(e) => Some(e),
            LoggingError::AlreadyInstalled(e) => Some(e),
            LoggingError::Reload(_) => None,
        }
    }
}

impl From<BuildError> for LoggingError {
    fn from(e: BuildError) -> Self {
        LoggingError::Build(e)
    }
}

impl From<SetGlobalDefaultError> for LoggingError {
    fn from(e: SetGlobalDefaultError) -> Self {
        LoggingError::AlreadyInstalled(e)
    }
}

/// Configuration for the ready-made subscriber.
///
/// # Example
///
/// ```no_run
/// use tracing_dedup::{FilterMode, LoggingConfig};
///
/// let logging = LoggingConfig::new()
///     .with_level(tracing::Level::DEBUG)
///     .with_mode(FilterMode::Filtering)
///     .with_file("app.log")
///     .init()
///     .expect("logging setup failed");
///
/// tracing::info!("ready");
/// tracing::info!("ready"); // dropped, already seen this epoch
///
/// logging.shutdown();
/// ```
#[derive(Clone)]
pub struct LoggingConfig {
    level: Level,
    mode: FilterMode,
    file: Option<PathBuf>,
    console: bool,
    ansi: bool,
    thresholds: Thresholds,
    max_keys: Option<usize>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            mode: FilterMode::Plain,
            file: None,
            console: true,
            ansi: true,
            thresholds: Thresholds::default(),
            max_keys: None,
            clock: None,
        }
    }
}

impl LoggingConfig {
    /// Create a config with defaults: INFO level, plain mode, console only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop events below this level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the initial filter mode.
    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Also append every written event to this file, without colors.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable console output. Default: enabled.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Enable or disable ANSI level colors on the console. Default: enabled.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Set the dedup thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Cap the number of tracked keys. Default: unlimited.
    ///
    /// The initialization message does not take a slot. When the cap is hit,
    /// new keys pass unfiltered and a single warning is logged; see
    /// [`DedupLayerBuilder::with_max_keys`](crate::DedupLayerBuilder::with_max_keys)
    /// for when a scoped subscriber delays it.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Set a custom clock for the dedup filter (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assemble the subscriber without installing it.
    ///
    /// Logs the initialization message through the new subscriber before
    /// returning.
    ///
    /// # Errors
    /// Returns `LoggingError` if the log file cannot be opened or the dedup
    /// layer cannot be built.
    pub fn subscriber(self) -> Result<(Dispatch, LoggingHandle), LoggingError> {
        let file = match &self.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LoggingError::OpenFile {
                        path: path.clone(),
                        source,
                    })?;
                Some(file)
            }
            None => None,
        };

        let mut builder = DedupLayer::builder()
            .with_mode(self.mode)
            .with_thresholds(self.thresholds);
        if let Some(max_keys) = self.max_keys {
            builder = builder.with_max_keys(max_keys);
        }
        if let Some(clock) = self.clock.clone() {
            builder = builder.with_clock(clock);
        }
        let dedup = builder.build()?;

        let (level_filter, level_handle) =
            reload::Layer::<LevelFilter, Registry>::new(LevelFilter::from_level(self.level));

        let console = self.console.then(|| {
            fmt_layer::layer()
                .with_writer(io::stdout)
                .with_ansi(self.ansi)
                .with_file(true)
                .with_line_number(true)
        });
        let file_output = file.map(|file| {
            fmt_layer::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
        });

        // Option has its own and_then, so name the trait method explicitly
        let outputs = Layer::and_then(console, file_output);
        let subscriber = tracing_subscriber::registry()
            .with(level_filter)
            .with(outputs.with_filter(dedup.clone()));
        let dispatch = Dispatch::new(subscriber);

        let handle = LoggingHandle {
            level: level_handle,
            dedup,
            file: self.file,
        };

        dispatcher::with_default(&dispatch, || {
            tracing::info!(
                target: crate::LOG_TARGET,
                "Log system initialized successfully (level={}, mode={}, file={})",
                self.level,
                self.mode,
                handle.file_name(),
            );
        });

        Ok((dispatch, handle))
    }

    /// Assemble the subscriber and install it as the global default.
    ///
    /// # Errors
    /// Returns `LoggingError::AlreadyInstalled` if a global subscriber exists,
    /// or any error from [`subscriber`](Self::subscriber).
    pub fn init(self) -> Result<LoggingHandle, LoggingError> {
        let (dispatch, handle) = self.subscriber()?;
        dispatcher::set_global_default(dispatch)?;
        Ok(handle)
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("level", &self.level)
            .field("mode", &self.mode)
            .field("file", &self.file)
            .field("console", &self.console)
            .field("ansi", &self.ansi)
            .field("thresholds", &self.thresholds)
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

/// Runtime controls for a subscriber built from [`LoggingConfig`].
#[derive(Clone)]
pub struct LoggingHandle {
    level: reload::Handle<LevelFilter, Registry>,
    dedup: DedupLayer,
    file: Option<PathBuf>,
}

impl LoggingHandle {
    /// Change the minimum level. Takes effect for all threads immediately.
    ///
    /// # Errors
    /// Returns `LoggingError::Reload` if the subscriber has been dropped.
    pub fn set_level(&self, level: Level) -> Result<(), LoggingError> {
        self.set_level_filter(LevelFilter::from_level(level))
    }

    /// Current minimum level, or `None` once the subscriber is gone.
    pub fn level(&self) -> Option<LevelFilter> {
        self.level.clone_current()
    }

    /// Switch the filter mode. Tracked keys keep their state.
    pub fn set_mode(&self, mode: FilterMode) {
        self.dedup.set_mode(mode);
    }

    /// Current filter mode.
    pub fn mode(&self) -> FilterMode {
        self.dedup.mode()
    }

    /// The dedup layer shared by all outputs.
    pub fn filter(&self) -> &DedupLayer {
        &self.dedup
    }

    /// Path of the log file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Stop logging and release all tracked keys.
    ///
    /// Every later event is dropped, including ones already in flight on
    /// other threads once they reach the level check.
    pub fn shutdown(&self) {
        if let Err(error) = self.set_level_filter(LevelFilter::OFF) {
            tracing::debug!(
                target: crate::LOG_TARGET,
                %error,
                "log level already gone at shutdown"
            );
        }
        self.dedup.filter().teardown();
    }

    fn set_level_filter(&self, filter: LevelFilter) -> Result<(), LoggingError> {
        self.level
            .modify(|current| *current = filter)
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }

    fn file_name(&self) -> String {
        match &self.file {
            Some(path) => path.display().to_string(),
            None => "stdout".to_string(),
        }
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("level", &self.level())
            .field("dedup", &self.dedup)
            .field("file", &self.file)
            .finish()
    }
}
