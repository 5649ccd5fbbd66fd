//! Conversions between logical unit names and container paths.
//!
//! A logical name such as `com.example.Widget` lives at
//! `com/example/Widget<suffix>` inside a container. The directory part of a
//! path (`com/example`) is what the package index is keyed on.

/// Container path of a logical unit name.
pub fn unit_path(name: &str, suffix: &str) -> String {
    let mut path = name.replace('.', "/");
    path.push_str(suffix);
    path
}

/// Package part of a logical name (`a.b.C` -> `a.b`), if any.
pub fn package_name(name: &str) -> Option<&str> {
    name.rfind('.').map(|idx| &name[..idx]).filter(|p| !p.is_empty())
}

/// Directory path of a package, with trailing slash (`a.b` -> `a/b/`).
pub fn package_path(package: &str) -> String {
    let mut path = package.replace('.', "/");
    path.push('/');
    path
}

/// Normalize a slash-separated path: collapse empty and `.` segments and
/// resolve `..`. Returns `None` when the path escapes its root. A leading
/// slash is preserved.
pub fn normalize_path(path: &str) -> Option<String> {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    let mut normalized = segments.join("/");
    if path.ends_with('/') && !normalized.is_empty() {
        normalized.push('/');
    }
    if absolute {
        normalized.insert(0, '/');
    }
    Some(normalized)
}

/// Directory prefix used as the package index key.
///
/// Root-level paths (`Widget.unit`, `/Widget.unit`) have no prefix and
/// return `None`, as do paths that escape the root.
pub fn index_prefix(path: &str) -> Option<String> {
    let normalized = normalize_path(path)?;
    let relative = normalized.trim_start_matches('/');
    match relative.rfind('/') {
        Some(idx) if idx > 0 => Some(relative[..idx].to_string()),
        _ => None,
    }
}

/// Every ancestor directory of a resource path, deepest first.
///
/// `a/b/C.unit` yields `a/b` and `a`.
pub fn ancestor_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = index_prefix(path);
    while let Some(prefix) = current {
        current = prefix.rfind('/').map(|idx| prefix[..idx].to_string());
        prefixes.push(prefix);
    }
    prefixes
}

/// Logical name of a changed binary-unit path, or `None` for other files.
///
/// The suffix is removed, then the first matching strip prefix, then path
/// separators become dots and any leading dot is dropped.
pub fn unit_name_from_path(path: &str, suffix: &str, strip_prefixes: &[String]) -> Option<String> {
    let stem = path.strip_suffix(suffix)?;
    let stem = stem.trim_start_matches('/');
    let stem = strip_prefixes
        .iter()
        .find_map(|prefix| stem.strip_prefix(prefix.trim_start_matches('/')))
        .unwrap_or(stem);
    let name: String = stem
        .chars()
        .map(|c| if c == '/' || c == '\\' { '.' } else { c })
        .collect();
    let name = name.trim_start_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
