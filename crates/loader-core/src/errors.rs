//! Load error taxonomy.
//!
//! Absence is an ordinary outcome inside the engine (`Ok(None)`); it only
//! becomes [`LoadError::NotFound`] at the outermost boundary where a caller
//! required a result. Redefinition rejection is reported as `false` and never
//! appears here.

#[derive(Debug)]
pub enum LoadError {
    /// No stage and no generation hook produced the unit.
    NotFound { name: String },

    /// The name is deny-listed. Reported before any cache or delegate is consulted.
    Forbidden { name: String },

    /// A transformer rejected the unit; definition was aborted.
    Transform {
        name: String,
        source: anyhow::Error,
    },

    /// The unit was located but its bytes could not be read.
    Io {
        name: String,
        /// Container path of the unreadable resource.
        path: String,
        source: std::io::Error,
    },

    /// The synthetic-generation hook failed.
    Generation {
        name: String,
        source: anyhow::Error,
    },
}

impl LoadError {
    /// Logical name the error refers to.
    pub fn name(&self) -> &str {
        match self {
            LoadError::NotFound { name }
            | LoadError::Forbidden { name }
            | LoadError::Transform { name, .. }
            | LoadError::Io { name, .. }
            | LoadError::Generation { name, .. } => name,
        }
    }

    /// True for outcomes that only mean "not here": delegation moves on to
    /// the next stage instead of propagating them.
    pub fn is_miss(&self) -> bool {
        matches!(self, LoadError::NotFound { .. } | LoadError::Forbidden { .. })
    }

    pub(crate) fn not_found(name: &str) -> Self {
        LoadError::NotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn forbidden(name: &str) -> Self {
        LoadError::Forbidden {
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::NotFound { name } => write!(f, "unit not found: {}", name),
            LoadError::Forbidden { name } => write!(f, "unit is forbidden: {}", name),
            LoadError::Transform { name, source } => {
                write!(f, "failed to transform unit {}: {}", name, source)
            }
            LoadError::Io { name, path, source } => {
                write!(f, "failed to read unit {} from {}: {}", name, path, source)
            }
            LoadError::Generation { name, source } => {
                write!(f, "failed to generate unit {}: {}", name, source)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Transform { source, .. } | LoadError::Generation { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}
