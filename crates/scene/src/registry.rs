use std::collections::HashMap;
use std::sync::Arc;

use foundation::math::{Ecef, Quat, Vec3};
use parking_lot::RwLock;

use crate::entity::{EntityId, EntityKind};

/// Direct mutation pushed to a rendered object, bypassing the store.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleUpdate {
    /// Model transform. `None` components keep their current value.
    Transform {
        translation: Option<Ecef>,
        rotation: Option<Quat>,
        scale: Option<Vec3>,
    },
    /// Polygon outline.
    Positions(Vec<Ecef>),
    /// Point-like entities (camera placement, sight line).
    Placement { position: Ecef, target: Ecef },
    Visibility(bool),
}

/// A rendering-engine object owned by the rendering layer.
///
/// Implementations mutate the engine object in place; they must tolerate
/// updates that do not apply to them.
pub trait RenderHandle {
    fn apply(&self, update: &HandleUpdate);
}

pub type SharedHandle = Arc<dyn RenderHandle + Send + Sync>;

/// Side table from `(kind, id)` to the handle currently rendering it.
///
/// A cache, never a source of truth: the store owns durable state, and
/// handles stay owned by the rendering layer. Register and unregister are
/// idempotent so mount/unmount can repeat freely.
pub struct ObjectRegistry {
    handles: RwLock<HashMap<(EntityKind, EntityId), SharedHandle>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` if no handle was registered for the key before.
    pub fn register(&self, kind: EntityKind, id: EntityId, handle: SharedHandle) -> bool {
        let fresh = self.handles.write().insert((kind, id.clone()), handle).is_none();
        if fresh {
            tracing::trace!(%kind, %id, "registry: handle registered");
        }
        fresh
    }

    /// Returns `true` if a handle was removed.
    pub fn unregister(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.handles.write().remove(&(kind, id.clone())).is_some()
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<SharedHandle> {
        self.handles.read().get(&(kind, id.clone())).cloned()
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.handles.read().contains_key(&(kind, id.clone()))
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Pushes `update` to the rendered object, if any.
    ///
    /// The handle is called outside the lock, so it may itself use the registry.
    pub fn apply(&self, kind: EntityKind, id: &EntityId, update: &HandleUpdate) -> bool {
        match self.get(kind, id) {
            Some(handle) => {
                handle.apply(update);
                true
            }
            None => false,
        }
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("handles", &self.len())
            .finish()
    }
}

/// Handle that records every update it receives. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingHandle {
    updates: parking_lot::Mutex<Vec<HandleUpdate>>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<HandleUpdate> {
        self.updates.lock().clone()
    }

    pub fn last(&self) -> Option<HandleUpdate> {
        self.updates.lock().last().cloned()
    }
}

impl RenderHandle for RecordingHandle {
    fn apply(&self, update: &HandleUpdate) {
        self.updates.lock().push(update.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_are_idempotent() {
        let registry = ObjectRegistry::new();
        let id = EntityId::from("a");
        let handle: SharedHandle = Arc::new(RecordingHandle::new());

        assert!(registry.register(EntityKind::ProjectObject, id.clone(), handle.clone()));
        assert!(!registry.register(EntityKind::ProjectObject, id.clone(), handle));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(EntityKind::ProjectObject, &id));
        assert!(!registry.unregister(EntityKind::ProjectObject, &id));
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_include_kind() {
        let registry = ObjectRegistry::new();
        let id = EntityId::from("shared");
        registry.register(EntityKind::StartingPoint, id.clone(), Arc::new(RecordingHandle::new()));
        assert!(registry.contains(EntityKind::StartingPoint, &id));
        assert!(!registry.contains(EntityKind::VisualAxis, &id));
    }

    #[test]
    fn apply_reaches_registered_handle() {
        let registry = ObjectRegistry::new();
        let id = EntityId::from("obj");
        let handle = Arc::new(RecordingHandle::new());
        registry.register(EntityKind::ProjectObject, id.clone(), handle.clone());

        let update = HandleUpdate::Visibility(false);
        assert!(registry.apply(EntityKind::ProjectObject, &id, &update));
        assert!(!registry.apply(EntityKind::ProjectObject, &EntityId::from("other"), &update));
        assert_eq!(handle.updates(), vec![update]);
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        let registry = Arc::new(ObjectRegistry::new());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let r = registry.clone();
                std::thread::spawn(move || {
                    let id = EntityId::from(format!("e{i}"));
                    r.register(EntityKind::VisualAxis, id.clone(), Arc::new(RecordingHandle::new()));
                    r.register(EntityKind::VisualAxis, id, Arc::new(RecordingHandle::new()));
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(registry.len(), 4);
    }
}
