#[cfg(feature = "logging")]
macro_rules! trace {
    ($($arg:tt)+) => (
        log::trace!(target: "appsync-ws-client", $($arg)+)
    )
}

#[cfg(not(feature = "logging"))]
macro_rules! trace {
    ($($t:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! warning {
    ($($arg:tt)+) => (
        log::warn!(target: "appsync-ws-client", $($arg)+)
    )
}

#[cfg(not(feature = "logging"))]
macro_rules! warning {
    ($($t:tt)*) => {};
}

pub(crate) use trace;
pub(crate) use warning;
