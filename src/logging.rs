//! Crate-internal logging macros.
//!
//! `error!`, `warn!`, `info!`, `debug!` and `trace!` forward to `tracing` under the
//! `registry_watcher` target when the `tracing` feature is on. Without it the arguments are only
//! borrowed, so call sites keep compiling and cost nothing at runtime.
//!
//! `report!` logs a categorized error (see `WatcherError::category` and friends) at `error`
//! level together with any extra fields.
//!
//! Call sites stick to the `field = value, ..., "message"` form so that both expansions accept
//! them.

pub(crate) const TARGET: &str = "registry_watcher";

#[cfg(feature = "tracing")]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: $crate::logging::TARGET, $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {
        $crate::__log_consume!($($arg)*)
    };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { __log!(error, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { __log!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { __log!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { __log!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { __log!(trace, $($arg)*) };
}

/// `report!(err, field = value, ..., "message")` logs `err` with its category.
macro_rules! report {
    ($err:expr, $($rest:tt)*) => {{
        let err = &$err;
        error!(category = err.category(), error = %err, $($rest)*)
    }};
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __log_consume {
    ($field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_consume!($($rest)*); }
    };
    ($field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_consume!($($rest)*); }
    };
    ($field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_consume!($($rest)*); }
    };
    ($lit:literal $($rest:tt)*) => {
        $crate::__log_consume!($($rest)*)
    };
    () => {};
}
