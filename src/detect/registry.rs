use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::PoseEstimate;
use crate::frame::Frame;

use super::backend::{ExtractorError, PoseBackend};

/// Thread-safe registry of pose backends.
///
/// Backends are wrapped in `Mutex` because `PoseBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn PoseBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: PoseBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn PoseBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn PoseBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Warm up the default backend.
    pub fn warm_up(&self) -> Result<(), ExtractorError> {
        let backend = self.require_default()?;
        let mut guard = backend
            .lock()
            .map_err(|_| ExtractorError::Inference("backend lock poisoned".to_string()))?;
        guard.warm_up()
    }

    /// Run detection on the default backend.
    pub fn detect(&self, frame: &Frame) -> Result<PoseEstimate, ExtractorError> {
        let backend = self.require_default()?;
        let mut guard = backend
            .lock()
            .map_err(|_| ExtractorError::Inference("backend lock poisoned".to_string()))?;
        guard.detect(frame)
    }

    fn require_default(&self) -> Result<Arc<Mutex<dyn PoseBackend>>, ExtractorError> {
        self.default_backend()
            .ok_or_else(|| ExtractorError::Inference("no pose backend registered".to_string()))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;

    struct FailingBackend;

    impl PoseBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<PoseEstimate, ExtractorError> {
            Err(ExtractorError::Inference("boom".to_string()))
        }
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::default());
        registry.register(FailingBackend);

        assert_eq!(registry.default_name(), Some("stub"));
        assert_eq!(registry.list(), vec!["failing", "stub"]);
        assert!(registry.set_default("missing").is_err());
    }

    #[test]
    fn detect_uses_selected_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::default());
        registry.register(FailingBackend);
        registry.set_default("failing")?;

        let frame = Frame::new(1, vec![0u8; 12], 2, 2)?;
        assert!(registry.detect(&frame).is_err());
        Ok(())
    }

    #[test]
    fn empty_registry_reports_error() -> Result<()> {
        let registry = BackendRegistry::new();
        let frame = Frame::new(1, vec![0u8; 12], 2, 2)?;
        assert!(matches!(
            registry.detect(&frame),
            Err(ExtractorError::Inference(_))
        ));
        Ok(())
    }
}
