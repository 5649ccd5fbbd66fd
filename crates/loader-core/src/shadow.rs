//! Shadow mirrors: throwaway coordinators that replay a live coordinator's
//! delegation topology but keep their own defined-unit registry.
//!
//! A mirror shares the live engine (containers, caches, index) and answers
//! resource queries by asking the live coordinator. Only definition is
//! duplicated: mirrors never transform, never generate, never write to the
//! precompiled cache, and have independent per-name locks.

use std::sync::Arc;
use tracing::debug;

use crate::delegation::{Coordinator, UnitLoader};

/// Mirror of `loader` if it can be mirrored, otherwise the loader itself.
fn mirror_or_share(loader: &Arc<dyn UnitLoader>) -> Arc<dyn UnitLoader> {
    loader.mirror().unwrap_or_else(|| loader.clone())
}

pub(crate) fn mirror_coordinator(live: &Arc<Coordinator>) -> Arc<Coordinator> {
    let parent = live.parent().map(mirror_or_share);
    let before = live.before_delegates().iter().map(mirror_or_share).collect();
    let after = live.after_delegates().iter().map(mirror_or_share).collect();

    let mirror = Coordinator::new_mirror(live, parent, before, after);
    debug!(loader = %live.key(), live = %live.id(), mirror = %mirror.id(), "created shadow mirror");
    mirror
}
