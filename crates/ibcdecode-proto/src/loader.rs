//! Loads the type-registry artifact from disk.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use ibcdecode_core::decoder::{DecoderLoader, PayloadDecoder};
use ibcdecode_core::error::LoadError;

use crate::decoder::AnyDecoder;
use crate::registry::TypeRegistry;

/// [`DecoderLoader`] for a YAML registry file.
#[derive(Debug, Clone)]
pub struct RegistryLoader {
    path: PathBuf,
}

impl RegistryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and parse the artifact into a registry.
    pub fn load_registry(&self) -> Result<TypeRegistry, LoadError> {
        let path = self.describe();
        let yaml = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound { path: path.clone() }
            } else {
                LoadError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let registry = TypeRegistry::from_yaml(&yaml).map_err(|e| LoadError::Malformed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if registry.is_empty() {
            return Err(LoadError::Malformed {
                path,
                reason: "no types registered".into(),
            });
        }
        Ok(registry)
    }
}

impl DecoderLoader for RegistryLoader {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Arc<dyn PayloadDecoder>, LoadError> {
        let registry = self.load_registry()?;
        info!(
            path = %self.describe(),
            types = registry.len(),
            "type registry loaded"
        );
        Ok(Arc::new(AnyDecoder::new(registry)))
    }
}
