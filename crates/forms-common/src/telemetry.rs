//! Tracing setup for the forms runtime.
//!
//! Native builds log through a compact `tracing-subscriber` console layer,
//! the browser worker build logs through `tracing-wasm` to the devtools console.
//!
//! # Usage
//!
//! ```ignore
//! use forms_common::telemetry::{self, TelemetryConfig};
//! use forms_common::LogLevel;
//!
//! telemetry::init(TelemetryConfig::for_level("rule-engine-worker", LogLevel::default()));
//!
//! // later, once the form page names a level
//! telemetry::set_level(LogLevel::from_url(&context_url));
//! ```

use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Registry, reload};

use crate::LogLevel;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for labeling (e.g., "rule-engine-worker")
    pub service_name: String,
    /// Console log level, overridden by `RUST_LOG` on native builds
    pub level: LogLevel,
}

impl TelemetryConfig {
    /// Load config from the environment.
    ///
    /// - `RUST_LOG`: Standard env filter (optional, overrides the level)
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let level = if cfg!(debug_assertions) {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };

        Self {
            service_name: service_name.into(),
            level,
        }
    }

    pub fn for_level(service_name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            service_name: service_name.into(),
            level,
        }
    }
}

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Set when the level is ours to change, i.e. not pinned by `RUST_LOG`.
static LEVEL: OnceLock<LevelHandle> = OnceLock::new();

/// Initialize tracing for this process or worker.
///
/// Safe to call more than once; only the first call installs a subscriber.
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub fn init(config: TelemetryConfig) {
    use tracing_subscriber::{EnvFilter, Layer};

    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = env_filter.is_some();
    let start = if pinned {
        LevelFilter::TRACE
    } else {
        config.level.to_filter()
    };
    let (level_layer, handle) = reload::Layer::new(start);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter.unwrap_or_else(|| EnvFilter::new("trace")));

    let installed = tracing_subscriber::registry()
        .with(level_layer)
        .with(console_layer)
        .try_init();
    finish_init(&config, installed, (!pinned).then_some(handle));
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub fn init(config: TelemetryConfig) {
    let (level_layer, handle) = reload::Layer::new(config.level.to_filter());

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::TRACE)
            .build(),
    );

    let installed = tracing_subscriber::registry()
        .with(level_layer)
        .with(wasm_layer)
        .try_init();
    finish_init(&config, installed, Some(handle));
}

fn finish_init(
    config: &TelemetryConfig,
    installed: Result<(), TryInitError>,
    handle: Option<LevelHandle>,
) {
    match installed {
        Ok(()) => {
            if let Some(handle) = handle {
                let _ = LEVEL.set(handle);
            }
            tracing::debug!(
                service = %config.service_name,
                level = %config.level,
                "telemetry initialized"
            );
        }
        Err(e) => tracing::debug!(
            service = %config.service_name,
            error = %e,
            "telemetry already initialized"
        ),
    }
}

/// Change the console level after `init`, e.g. once a page names one.
///
/// Does nothing when `RUST_LOG` fixed the filter or `init` never ran.
pub fn set_level(level: LogLevel) {
    let Some(handle) = LEVEL.get() else {
        return;
    };
    match handle.modify(|filter| *filter = level.to_filter()) {
        Ok(()) => tracing::debug!(%level, "log level changed"),
        Err(e) => tracing::warn!(error = %e, "failed to change log level"),
    }
}

/// The console level currently applied, if it can still be changed.
pub fn current_level() -> Option<LevelFilter> {
    LEVEL.get()?.clone_current()
}
