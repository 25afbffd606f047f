//! Logging infrastructure - structured tracing for spec building and calls
//!
//! Design: `tracing` events with an `event` field per kind, zero-cost when
//! disabled. The call path only emits `trace` events.

use crate::abi::Placement;
use crate::config::{Config, LogSettings};
use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::{debug, trace, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize logging from `FASTFFI_*` environment variables
///
/// Log variables are honored even when another `FASTFFI_*` variable is
/// invalid; that error is reported once the subscriber is up.
pub fn init() {
    init_with(&LogSettings::from_env());
    if let Err(err) = Config::from_env() {
        warn!(event = "config_error", error = %err, "ignoring invalid environment configuration");
    }
}

/// Initialize logging with explicit settings; later calls are no-ops
pub fn init_with(settings: &LogSettings) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("fastffi={}", settings.level)));

        // Another subscriber may already be installed by the host
        let _ = tracing_subscriber::registry()
            .with(fmt_layer(settings))
            .with(env_filter)
            .try_init();
    });
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn fmt_layer(settings: &LogSettings) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if settings.spans {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match &settings.file {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let prefix = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "fastffi.log".to_string());
            let appender = tracing_appender::rolling::daily(directory, prefix);

            if settings.json {
                fmt::layer()
                    .json()
                    .with_writer(appender)
                    .with_span_events(span_events)
                    .boxed()
            } else {
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(appender)
                    .with_span_events(span_events)
                    .boxed()
            }
        }
        None if settings.json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(span_events)
            .boxed(),
        None => fmt::layer()
            .with_writer(io::stderr)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions))
            .boxed(),
    }
}

/// Log a completed spec build
pub fn log_spec_built(descriptor: &str, int_regs: usize, float_regs: usize, stack: usize, has_return: bool) {
    debug!(
        event = "spec_built",
        descriptor,
        int_regs,
        float_regs,
        stack_slots = stack,
        has_return,
        "call spec built"
    );
}

/// Log where one field was placed
#[inline]
pub fn log_field_placed(descriptor: &str, field: &str, placement: Placement) {
    trace!(
        event = "field_placed",
        descriptor,
        field,
        placement = %placement,
        "field placed"
    );
}

/// Log a spec cache lookup
#[inline]
pub fn log_cache_lookup(descriptor: &str, target: usize, hit: bool) {
    trace!(
        event = "spec_cache",
        descriptor,
        function = target,
        hit,
        "spec cache lookup"
    );
}

/// Log entry into a native call
#[inline]
pub fn log_native_call(descriptor: &str, target: usize, base: usize) {
    trace!(
        event = "native_call",
        descriptor,
        function = target,
        base,
        "entering native call"
    );
}

/// Log a checked-mode rejection
pub fn log_validation_failure(descriptor: &str, reason: &str) {
    warn!(
        event = "validation_failure",
        descriptor,
        reason,
        "argument block rejected before native call"
    );
}
