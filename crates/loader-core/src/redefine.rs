//! Live redefinition of already-defined units after their container changed.
//!
//! Evaluation is conservative: a changed unit that this coordinator never
//! defined rejects the whole batch, as does any failure to read new bytes.

use std::sync::Arc;
use tracing::{debug, warn};
use unit_loader_types::names::unit_name_from_path;

use crate::container::Container;
use crate::delegation::{Coordinator, UnitLoader};
use crate::unit::DefinedUnit;

/// Low-level collaborator that swaps the bytes of live units.
pub trait Redefiner: Send + Sync {
    fn can_redefine(&self) -> bool;

    /// Apply every `(unit, new bytes)` pair or none of them.
    fn redefine_batch(&self, batch: &[(Arc<DefinedUnit>, Vec<u8>)]) -> bool;
}

/// Paths that changed inside one container.
#[derive(Clone)]
pub struct ChangeNotification {
    pub container: Arc<dyn Container>,
    pub paths: Vec<String>,
}

impl ChangeNotification {
    pub fn new<I, S>(container: Arc<dyn Container>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Debug for ChangeNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotification")
            .field("container", self.container.id())
            .field("paths", &self.paths)
            .finish()
    }
}

impl Coordinator {
    /// Whether the changed units could be redefined in place. `true` also
    /// covers notifications that do not concern this coordinator.
    pub fn redefine(&self, notification: &ChangeNotification) -> bool {
        if notification.paths.is_empty() {
            return true;
        }
        let container_id = notification.container.id();
        if !self.engine().contains_container(container_id) {
            return true;
        }

        let suffix = &self.config().unit_suffix;
        let unit_paths: Vec<&String> = notification.paths.iter().filter(|p| p.ends_with(suffix.as_str())).collect();
        if unit_paths.is_empty() {
            return true;
        }

        let Some(redefiner) = self.redefiner().filter(|r| r.can_redefine()) else {
            debug!(loader = %self.key(), container = %container_id, "redefinition unavailable");
            return false;
        };

        let mut batch = Vec::new();
        for path in unit_paths {
            let Some(name) = unit_name_from_path(path, suffix, &self.config().strip_prefixes) else {
                continue;
            };
            match self.find_loaded(&name) {
                Some(unit) if unit.defined_by() == self.id() => {
                    let Some(resource) = notification.container.get_resource(path) else {
                        warn!(loader = %self.key(), path = %path, "changed unit disappeared from container");
                        return false;
                    };
                    match resource.read() {
                        Ok(bytes) => batch.push((unit, bytes)),
                        Err(e) => {
                            warn!(loader = %self.key(), path = %path, error = %e, "failed to read changed unit");
                            return false;
                        }
                    }
                }
                Some(_) => {
                    debug!(loader = %self.key(), name = %name, "skipping unit defined elsewhere");
                }
                None => {
                    debug!(loader = %self.key(), name = %name, "changed unit was never defined here");
                    return false;
                }
            }
        }

        if batch.is_empty() {
            return true;
        }
        let accepted = redefiner.redefine_batch(&batch);
        debug!(loader = %self.key(), units = batch.len(), accepted, "submitted redefinition batch");
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        disabled: bool,
        reject: bool,
        batches: Mutex<Vec<Vec<(String, Vec<u8>)>>>,
    }

    impl Redefiner for Recording {
        fn can_redefine(&self) -> bool {
            !self.disabled
        }

        fn redefine_batch(&self, batch: &[(Arc<DefinedUnit>, Vec<u8>)]) -> bool {
            self.batches
                .lock()
                .push(batch.iter().map(|(u, b)| (u.name().to_string(), b.clone())).collect());
            !self.reject
        }
    }

    fn setup(redefiner: Arc<Recording>) -> (Arc<MemoryContainer>, Arc<Coordinator>) {
        let container = Arc::new(
            MemoryContainer::new("mem:app")
                .with_entry("app/A.unit", b"a1")
                .with_entry("app/B.unit", b"b1"),
        );
        let coordinator = Coordinator::builder("app")
            .container(container.clone())
            .redefiner(redefiner)
            .build();
        (container, coordinator)
    }

    #[test]
    fn test_redefines_defined_units() -> anyhow::Result<()> {
        let redefiner = Arc::new(Recording::default());
        let (container, coordinator) = setup(redefiner.clone());
        coordinator.load("app.A")?;
        container.insert("app/A.unit", b"a2");

        let change = ChangeNotification::new(container.clone(), ["app/A.unit", "app/readme.txt"]);
        assert!(coordinator.redefine(&change));

        let batches = redefiner.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![("app.A".to_string(), b"a2".to_vec())]);
        Ok(())
    }

    #[test]
    fn test_never_defined_unit_rejects() -> anyhow::Result<()> {
        let redefiner = Arc::new(Recording::default());
        let (container, coordinator) = setup(redefiner.clone());
        coordinator.load("app.A")?;

        let change = ChangeNotification::new(container.clone(), ["app/A.unit", "app/B.unit"]);
        assert!(!coordinator.redefine(&change));
        assert!(redefiner.batches.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_unrelated_container_is_trivial_success() {
        let redefiner = Arc::new(Recording::default());
        let (_container, coordinator) = setup(redefiner.clone());
        let other: Arc<dyn Container> = Arc::new(MemoryContainer::new("mem:other"));

        assert!(coordinator.redefine(&ChangeNotification::new(other, ["app/A.unit"])));
        assert!(redefiner.batches.lock().is_empty());
    }

    #[test]
    fn test_non_unit_paths_and_empty_notification() {
        let redefiner = Arc::new(Recording { disabled: true, ..Recording::default() });
        let (container, coordinator) = setup(redefiner);

        assert!(coordinator.redefine(&ChangeNotification::new(container.clone(), Vec::<String>::new())));
        assert!(coordinator.redefine(&ChangeNotification::new(container, ["META-INF/MANIFEST.MF"])));
    }

    #[test]
    fn test_unavailable_redefiner_rejects() -> anyhow::Result<()> {
        let redefiner = Arc::new(Recording { disabled: true, ..Recording::default() });
        let (container, coordinator) = setup(redefiner);
        coordinator.load("app.A")?;
        assert!(!coordinator.redefine(&ChangeNotification::new(container, ["app/A.unit"])));
        Ok(())
    }

    #[test]
    fn test_read_failure_aborts_batch() -> anyhow::Result<()> {
        let redefiner = Arc::new(Recording::default());
        let (container, coordinator) = setup(redefiner.clone());
        coordinator.load("app.A")?;
        coordinator.load("app.B")?;
        container.insert_unreadable("app/B.unit");

        let change = ChangeNotification::new(container.clone(), ["app/A.unit", "app/B.unit"]);
        assert!(!coordinator.redefine(&change));
        assert!(redefiner.batches.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_collaborator_rejection_propagates() -> anyhow::Result<()> {
        let redefiner = Arc::new(Recording { reject: true, ..Recording::default() });
        let (container, coordinator) = setup(redefiner.clone());
        coordinator.load("app.B")?;

        assert!(!coordinator.redefine(&ChangeNotification::new(container, ["app/B.unit"])));
        assert_eq!(redefiner.batches.lock().len(), 1);
        Ok(())
    }

    #[test]
    fn test_delegated_units_are_skipped() -> anyhow::Result<()> {
        let shared = Arc::new(MemoryContainer::new("mem:shared").with_entry("lib/C.unit", b"c1"));
        let parent = Coordinator::builder("parent").container(shared.clone()).build();
        let redefiner = Arc::new(Recording::default());
        let child = Coordinator::builder("child")
            .parent(parent)
            .container(shared.clone())
            .redefiner(redefiner.clone())
            .build();
        child.load("lib.C")?;

        assert!(child.redefine(&ChangeNotification::new(shared, ["lib/C.unit"])));
        assert!(redefiner.batches.lock().is_empty());
        Ok(())
    }
}
