//! Domain-tagged logging macros.
//!
//! Every log line emitted by the runtime carries a `domain` field so
//! operators can filter the stream by subsystem. The domains in use:
//!
//! * `sys` - lifecycle, signals, task supervision
//! * `conn` - listener and per-connection handling
//! * `proc` - event processing and rule execution
//! * `store` - work item storage and journaling
//! * `conf` - configuration loading and validation
//!
//! The macros are deliberately thin: they forward to `tracing` and only
//! inject the domain, so all the usual field syntax keeps working.

macro_rules! wr_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! wr_error {
    ($domain:ident, $($field:tt)*) => {
        wr_log!(error, $domain, $($field)*)
    };
}

macro_rules! wr_warn {
    ($domain:ident, $($field:tt)*) => {
        wr_log!(warn, $domain, $($field)*)
    };
}

macro_rules! wr_info {
    ($domain:ident, $($field:tt)*) => {
        wr_log!(info, $domain, $($field)*)
    };
}

macro_rules! wr_debug {
    ($domain:ident, $($field:tt)*) => {
        wr_log!(debug, $domain, $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! wr_trace {
    ($domain:ident, $($field:tt)*) => {
        wr_log!(trace, $domain, $($field)*)
    };
}
