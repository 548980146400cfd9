/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("deploy", "Uploading {} to {}", artifact, region);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

/// Macro for prefixed debug logging to stderr, gated on the `SKIFF_DEBUG`
/// environment variable (set by the global `d`/`debug` CLI flag).
#[macro_export]
macro_rules! log_debug {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::env::var_os("SKIFF_DEBUG").is_some() {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

pub mod core;
pub mod output;
pub mod plugins;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `skiff::engine` instead of `skiff::core::engine`
pub use crate::core::*;
