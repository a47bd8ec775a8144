#![forbid(unsafe_code)]

//! Logging shims for the core primitives.
//!
//! With the `tracing` feature enabled the scheduler and poll primitives emit
//! `trace`/`debug` events through the `tracing` crate. Without it the macros
//! expand to nothing so hosts that embed only the contracts pay no cost.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op debug macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op warn macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }
}
