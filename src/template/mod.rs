//! Object templates for MySQL clusters
//!
//! Each derived object (read-write Service, read-only Service, StatefulSet) is
//! described by a YAML template rendered with minijinja and deserialized into
//! the matching `k8s-openapi` type. The built-in templates are compiled into
//! the binary; a directory can override any of them by file name.

mod context;
mod renderer;

pub use context::{ObjectNames, RenderContext};
pub use renderer::TemplateRenderer;

use crate::error::{OperatorError, Result};
use std::collections::BTreeMap;
use std::path::Path;

const SERVICE_TEMPLATE: &str = include_str!("../../templates/cluster-service.yaml");
const READ_SERVICE_TEMPLATE: &str = include_str!("../../templates/cluster-service-read.yaml");
const STATEFUL_SET_TEMPLATE: &str = include_str!("../../templates/cluster-statefulset.yaml");

/// Logical identifier of an object template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateId {
    /// Read-write Service
    Service,
    /// Read-only Service
    ReadService,
    /// StatefulSet running the MySQL instances
    StatefulSet,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [
        TemplateId::Service,
        TemplateId::ReadService,
        TemplateId::StatefulSet,
    ];

    /// File name of the template, used both as its name in the engine and
    /// when loading overrides from a directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateId::Service => "cluster-service.yaml",
            TemplateId::ReadService => "cluster-service-read.yaml",
            TemplateId::StatefulSet => "cluster-statefulset.yaml",
        }
    }

    fn builtin_source(&self) -> &'static str {
        match self {
            TemplateId::Service => SERVICE_TEMPLATE,
            TemplateId::ReadService => READ_SERVICE_TEMPLATE,
            TemplateId::StatefulSet => STATEFUL_SET_TEMPLATE,
        }
    }
}

/// Mapping from template identifier to template source
#[derive(Debug, Clone)]
pub struct TemplateSet {
    sources: BTreeMap<TemplateId, String>,
}

impl TemplateSet {
    /// The templates shipped with the operator
    pub fn builtin() -> Self {
        let sources = TemplateId::ALL
            .iter()
            .map(|id| (*id, id.builtin_source().to_string()))
            .collect();
        Self { sources }
    }

    /// Built-in templates, overridden by any matching file found in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut set = Self::builtin();
        for id in TemplateId::ALL {
            let path = dir.join(id.file_name());
            if !path.exists() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| {
                OperatorError::Configuration(format!(
                    "failed to read template {}: {}",
                    path.display(),
                    e
                ))
            })?;
            set = set.with_source(id, source);
        }
        Ok(set)
    }

    /// Replace the source of one template
    pub fn with_source(mut self, id: TemplateId, source: impl Into<String>) -> Self {
        self.sources.insert(id, source.into());
        self
    }

    pub fn source(&self, id: TemplateId) -> &str {
        self.sources.get(&id).map(String::as_str).unwrap_or_default()
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}
