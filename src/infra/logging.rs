//! Explicit logger handle injected into components.
//!
//! The binary initializes `env_logger` once at startup and creates a root
//! [`Logger`]. Each component receives its own handle (via [`Logger::child`])
//! instead of reaching for a process-wide "current logger". Records still flow
//! through the `log` facade, tagged with an explicit target and, when set, a
//! session id so interleaved runs stay distinguishable.

use std::fmt;

/// Cloneable logging handle bound to a target and optional session id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Logger {
    target: String,
    session: Option<String>,
}

impl Logger {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            session: None,
        }
    }

    /// Derive a handle for a sub-component, keeping the session id.
    #[must_use]
    pub fn child(&self, component: &str) -> Self {
        Self {
            target: format!("{}::{component}", self.target),
            session: self.session.clone(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn log(&self, level: log::Level, message: impl fmt::Display) {
        match &self.session {
            Some(session) => {
                log::log!(target: self.target.as_str(), level, "[{session}] {message}");
            }
            None => log::log!(target: self.target.as_str(), level, "{message}"),
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(log::Level::Error, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(log::Level::Warn, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(log::Level::Info, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(log::Level::Debug, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("sifen")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_extends_target_and_keeps_session() {
        let root = Logger::new("sifen").with_session("run-7");
        let child = root.child("lote");
        assert_eq!(child.target(), "sifen::lote");
        assert_eq!(child.session(), Some("run-7"));
    }
}
