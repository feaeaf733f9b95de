//! Injected logging capability.
//!
//! # Design
//! Components that log hold a [`Logger`] instead of writing to whatever
//! subscriber happens to be global when an event fires. A `Logger` wraps a
//! `tracing::Dispatch`; events are emitted inside [`Logger::in_scope`] so they
//! reach the injected dispatcher, which lets tests capture or silence a single
//! component.

use std::fmt;

use tracing::dispatcher::{self, Dispatch};
use tracing::subscriber::NoSubscriber;

/// Cloneable handle to the dispatcher a component logs through.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Capture the dispatcher that is the default at the time of the call.
    pub fn current() -> Self {
        Self {
            dispatch: dispatcher::get_default(Dispatch::clone),
        }
    }

    /// A logger that drops every event.
    pub fn silent() -> Self {
        Self {
            dispatch: Dispatch::new(NoSubscriber::default()),
        }
    }

    /// Run `f` with this logger's dispatcher as the default.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// Subscriber that writes formatted events into a buffer tests can read.
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::dispatcher::Dispatch;

    use super::Logger;

    #[derive(Clone, Default)]
    pub(crate) struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub(crate) fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn capturing_logger() -> (Logger, Captured) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (Logger::new(Dispatch::new(subscriber)), captured)
    }
}
