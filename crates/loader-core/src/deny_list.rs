//! Deny-list of logical names that must never resolve.
//!
//! Loaded once from one or more sources in properties format (only keys
//! matter: `name`, `name=...` or `name: ...`; `#` and `!` start comments)
//! and injected into coordinators. A source that fails to read is skipped
//! with a warning; loading never fails.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};
use unit_loader_types::LoaderConfig;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DenyList {
    names: HashSet<String>,
}

impl DenyList {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn from_names<I, S>(names: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    /// Union of every readable source.
    pub fn load<I, R>(sources: I) -> Arc<Self>
    where
        I: IntoIterator<Item = R>,
        R: Read,
    {
        let mut names = HashSet::new();
        for (i, mut source) in sources.into_iter().enumerate() {
            let mut text = String::new();
            if let Err(e) = source.read_to_string(&mut text) {
                warn!(source = i, error = %e, "failed to read deny-list source, skipping it");
                continue;
            }
            names.extend(parse_keys(&text));
        }
        debug!(count = names.len(), "deny-list loaded");
        Arc::new(Self { names })
    }

    /// Like [`DenyList::load`], but empty when `nothing_forbidden` is set.
    pub fn load_with_config<I, R>(config: &LoaderConfig, sources: I) -> Arc<Self>
    where
        I: IntoIterator<Item = R>,
        R: Read,
    {
        if config.nothing_forbidden {
            debug!("deny-list disabled by configuration");
            return Self::empty();
        }
        Self::load(sources)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_keys(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            return None;
        }
        let end = line
            .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
            .unwrap_or(line.len());
        let key = &line[..end];
        (!key.is_empty()).then(|| key.to_string())
    })
}
