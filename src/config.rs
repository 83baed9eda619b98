//! Engine-wide configuration: locale, collation mode and cooperative
//! cancellation. Built with the small builder-method style the teacher uses
//! for its own connection/session configs rather than a field-by-field
//! constructor.

use std::fmt;
use std::sync::Arc;

/// Runtime options that influence execution but not query semantics proper.
#[derive(Clone)]
pub struct EngineConfig {
    pub default_locale: String,
    pub case_insensitive_collation: bool,
    cancellation: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("default_locale", &self.default_locale)
            .field("case_insensitive_collation", &self.case_insensitive_collation)
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_locale: "en".to_string(),
            case_insensitive_collation: false,
            cancellation: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig::default()
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn with_case_insensitive_collation(mut self, enabled: bool) -> Self {
        self.case_insensitive_collation = enabled;
        self
    }

    /// Installs a callback polled between execution stages; returning `true`
    /// aborts the query with [`crate::error::EngineError::Cancelled`].
    pub fn with_cancellation(mut self, callback: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cancellation = Some(Arc::new(callback));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(|f| f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_never_cancelled() {
        let config = EngineConfig::new();
        assert!(!config.is_cancelled());
    }

    #[test]
    fn cancellation_callback_is_consulted() {
        let config = EngineConfig::new().with_cancellation(|| true);
        assert!(config.is_cancelled());
    }

    #[test]
    fn builder_methods_chain() {
        let config = EngineConfig::new().with_locale("fr").with_case_insensitive_collation(true);
        assert_eq!(config.default_locale, "fr");
        assert!(config.case_insensitive_collation);
    }
}
