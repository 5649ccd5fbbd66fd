//! Container and coordinator fixtures.

use std::path::Path;
use std::sync::Arc;
use unit_loader::{Coordinator, DirContainer, MemoryContainer, SearchOrder};

/// `(path, bytes)` pairs for units named `name` with bytes `name@tag`.
#[allow(dead_code)]
pub fn unit_entries(names: &[&str], tag: &str) -> Vec<(String, Vec<u8>)> {
    names
        .iter()
        .map(|name| {
            (
                format!("{}.unit", name.replace('.', "/")),
                format!("{}@{}", name, tag).into_bytes(),
            )
        })
        .collect()
}

/// In-memory container holding `name@tag` for every unit name.
#[allow(dead_code)]
pub fn mem_container(url: &str, names: &[&str], tag: &str) -> Arc<MemoryContainer> {
    let container = MemoryContainer::new(url);
    for (path, bytes) in unit_entries(names, tag) {
        container.insert(path, bytes);
    }
    Arc::new(container)
}

/// Directory container populated with `name@tag` files under `root`.
#[allow(dead_code)]
pub fn dir_container(root: &Path, names: &[&str], tag: &str) -> anyhow::Result<Arc<DirContainer>> {
    for (path, bytes) in unit_entries(names, tag) {
        let file = root.join(&path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, bytes)?;
    }
    Ok(Arc::new(DirContainer::new(root)))
}

/// Coordinator over a single in-memory container named after `key`,
/// returned together with that container.
#[allow(dead_code)]
pub fn simple_coordinator(key: &str, search: SearchOrder, names: &[&str]) -> (Arc<Coordinator>, Arc<MemoryContainer>) {
    let units = mem_container(&format!("mem:{}", key), names, key);
    let coordinator = Coordinator::builder(key)
        .search_order(search)
        .container(units.clone())
        .build();
    (coordinator, units)
}
