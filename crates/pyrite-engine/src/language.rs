//! Language provider: engine factories with lifecycle management.
//!
//! A `ScriptLanguage` describes one scripting language and mints engines
//! for it. [`PythonLanguage`] owns the cleanup coordinator its engines are
//! registered with; dropping an engine hands its session back for
//! reclamation, and shutting the language down stops the coordinator.

use pyrite_types::ScriptResult;

use crate::cleanup::{CleanupConfig, CleanupCoordinator};
use crate::engine::PyEngine;
use crate::session::SessionConfig;

/// A scripting language the host can mint engines for.
pub trait ScriptLanguage {
    type Engine;

    /// Human-readable language name.
    fn name(&self) -> &str;

    /// File extensions (without the dot) this language claims.
    fn extensions(&self) -> &[&str];

    /// Mint a fresh engine with its own interpreter session.
    fn engine(&self) -> ScriptResult<Self::Engine>;
}

/// The Python language provider.
pub struct PythonLanguage {
    coordinator: CleanupCoordinator,
    session_config: SessionConfig,
}

impl PythonLanguage {
    /// A provider with default session and cleanup configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default(), CleanupConfig::default())
    }

    /// A provider with explicit session and cleanup configuration.
    pub fn with_config(session_config: SessionConfig, cleanup_config: CleanupConfig) -> Self {
        Self {
            coordinator: CleanupCoordinator::new(cleanup_config),
            session_config,
        }
    }

    /// The coordinator tracking this provider's engines.
    pub fn coordinator(&self) -> &CleanupCoordinator {
        &self.coordinator
    }

    /// Stop tracking and reclaiming engines. Best-effort; engines already
    /// minted keep working.
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}

impl Default for PythonLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptLanguage for PythonLanguage {
    type Engine = PyEngine;

    fn name(&self) -> &str {
        "Python"
    }

    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn engine(&self) -> ScriptResult<PyEngine> {
        let engine = PyEngine::with_config(&self.session_config)?;
        self.coordinator.register(&engine);
        Ok(engine)
    }
}

impl std::fmt::Debug for PythonLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonLanguage")
            .field("name", &self.name())
            .field("tracked", &self.coordinator.tracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_identity() {
        let lang = PythonLanguage::new();
        assert_eq!(lang.name(), "Python");
        assert_eq!(lang.extensions(), ["py"]);
    }
}
