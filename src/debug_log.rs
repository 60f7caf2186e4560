//! Compile-time gated debug logging utilities for the engine.

/// Emit engine debug logs only when the `chain_debug_logs` Cargo feature is
/// enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments.
#[macro_export]
macro_rules! chain_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "chain_debug_logs")]
        {
            eprintln!($($arg)*);
        }
        #[cfg(not(feature = "chain_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
