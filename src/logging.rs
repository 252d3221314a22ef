//! A logger capability, injected into components rather than reached for as a global singleton
//! (Design Notes §9, "Global logger").

use std::sync::Arc;

/// Structured logging sink used by the index, match engine, executor, and join callback.
///
/// Implementations are free to forward to whatever global sink a binary has installed (see
/// [`EnvLogger`]), but every core component receives its `Logger` as an explicit constructor
/// argument, so tests can substitute a recording implementation without touching process-wide
/// state.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to the `log` crate's facade macros. This is the default used by the builder and the
/// CLI driver, which installs `env_logger` as the process-wide sink once, in `main`.
#[derive(Default)]
pub struct EnvLogger;

impl Logger for EnvLogger {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Returns the default logger, shared across the builder's stages.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(EnvLogger)
}

#[cfg(test)]
/// A logger that records messages for assertions, instead of forwarding anywhere.
pub struct RecordingLogger {
    pub debug: std::sync::Mutex<Vec<String>>,
    pub warn: std::sync::Mutex<Vec<String>>,
    pub error: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl Default for RecordingLogger {
    fn default() -> Self {
        Self {
            debug: std::sync::Mutex::new(Vec::new()),
            warn: std::sync::Mutex::new(Vec::new()),
            error: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl Logger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.debug.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warn.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.error.lock().unwrap().push(message.to_string());
    }
}
