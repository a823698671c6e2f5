//! Internal logging macros. Every event is emitted under the `event_watcher` target.
//!
//! With the `tracing` feature off, a call expands to code that only borrows its field
//! expressions, so call sites compile the same way in both configurations.

macro_rules! error {
    ($($arg:tt)*) => { __log!(error, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { __log!(warn, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { __log!(info, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { __log!(debug, $($arg)*) };
}

macro_rules! trace {
    ($($arg:tt)*) => { __log!(trace, $($arg)*) };
}

#[cfg(feature = "tracing")]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "event_watcher", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {{
        __consume!($($arg)*);
    }};
}

#[cfg(not(feature = "tracing"))]
macro_rules! __consume {
    () => {};
    ($field:ident = % $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $(__consume!($($rest)*);)?
    };
    ($field:ident = ? $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $(__consume!($($rest)*);)?
    };
    ($field:ident = $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $(__consume!($($rest)*);)?
    };
    (% $field:ident $(, $($rest:tt)*)?) => {
        let _ = &$field;
        $(__consume!($($rest)*);)?
    };
    (? $field:ident $(, $($rest:tt)*)?) => {
        let _ = &$field;
        $(__consume!($($rest)*);)?
    };
    ($field:ident $(, $($rest:tt)*)?) => {
        let _ = &$field;
        $(__consume!($($rest)*);)?
    };
    ($message:literal $(, $arg:expr)* $(,)?) => {
        $(let _ = &$arg;)*
    };
}
