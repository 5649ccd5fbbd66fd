//! Container metadata (`META-INF/MANIFEST.MF`).
//!
//! The manifest is a list of `Key: Value` sections separated by blank lines.
//! The first section holds the main attributes; every later section is keyed
//! by its `Name` attribute (`com/example/` for a package) and overrides the
//! main attributes for that package. A line starting with a single space
//! continues the previous value.

use serde::Serialize;
use std::collections::HashMap;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const SPEC_TITLE: &str = "specification-title";
const SPEC_VERSION: &str = "specification-version";
const SPEC_VENDOR: &str = "specification-vendor";
const IMPL_TITLE: &str = "implementation-title";
const IMPL_VERSION: &str = "implementation-version";
const IMPL_VENDOR: &str = "implementation-vendor";
const SEALED: &str = "sealed";

type Attributes = HashMap<String, String>;

/// Parsed manifest attributes. Keys are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    entries: HashMap<String, Attributes>,
}

/// Package attributes as recorded at first definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub spec_title: Option<String>,
    pub spec_version: Option<String>,
    pub spec_vendor: Option<String>,
    pub impl_title: Option<String>,
    pub impl_version: Option<String>,
    pub impl_vendor: Option<String>,
    /// Identity of the container the package is sealed to, if sealed.
    pub seal_base: Option<String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Attributes> = vec![Attributes::new()];
        let mut last_key: Option<String> = None;

        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                if sections.last().is_some_and(|s| !s.is_empty()) {
                    sections.push(Attributes::new());
                }
                last_key = None;
                continue;
            }
            let Some(current) = sections.last_mut() else {
                continue;
            };
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some(value) = last_key.as_ref().and_then(|k| current.get_mut(k)) {
                    value.push_str(continuation);
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase();
                current.insert(key.clone(), value.trim().to_string());
                last_key = Some(key);
            }
        }

        let mut iter = sections.into_iter();
        let main = iter.next().unwrap_or_default();
        let entries = iter
            .filter_map(|mut section| section.remove("name").map(|name| (name, section)))
            .collect();
        Self { main, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.entries.is_empty()
    }

    /// Attribute value for `key`, preferring the section named `entry`.
    pub fn attribute(&self, entry: &str, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .get(entry)
            .and_then(|section| section.get(&key))
            .or_else(|| self.main.get(&key))
            .map(String::as_str)
    }

    /// Package attributes for `package` (dotted), sealed to `container_url`
    /// when the effective `Sealed` attribute is `true`.
    pub fn package_info(&self, package: &str, container_url: &str) -> PackageInfo {
        let entry = unit_loader_types::names::package_path(package);
        let get = |key: &str| self.attribute(&entry, key).map(str::to_string);
        let sealed = self
            .attribute(&entry, SEALED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        PackageInfo {
            name: package.to_string(),
            spec_title: get(SPEC_TITLE),
            spec_version: get(SPEC_VERSION),
            spec_vendor: get(SPEC_VENDOR),
            impl_title: get(IMPL_TITLE),
            impl_version: get(IMPL_VERSION),
            impl_vendor: get(IMPL_VENDOR),
            seal_base: sealed.then(|| container_url.to_string()),
        }
    }
}
