use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use foundation::math::{Ecef, Quat};
use picking::{Camera, InputSurface, PickError, Picker, TerrainSurface};
use runtime::{CancelToken, Debouncer};
use scene::{
    ClippingPolygon, EntityId, EntityKind, HandleUpdate, ObjectRegistry, ProjectObject, ProjectObjectPatch,
    SceneEntity, SceneStore, SelectedObject, StartingPoint, StoreError, VisualAxis,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::transform::{TransformEdit, TransformError, ui_mirror};

#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    Pick(PickError),
    Store(StoreError),
    /// A clipping polygon needs at least three points.
    RingTooShort { points: usize },
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::Pick(e) => write!(f, "{e}"),
            EditorError::Store(e) => write!(f, "{e}"),
            EditorError::RingTooShort { points } => {
                write!(f, "clipping polygon needs at least 3 points, got {points}")
            }
        }
    }
}

impl std::error::Error for EditorError {}

impl From<PickError> for EditorError {
    fn from(e: PickError) -> Self {
        EditorError::Pick(e)
    }
}

impl From<StoreError> for EditorError {
    fn from(e: StoreError) -> Self {
        EditorError::Store(e)
    }
}

impl EditorError {
    /// The user cancelled the interaction. Expected, not a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, EditorError::Pick(PickError::Aborted))
    }
}

/// Scene editor core: the store with its history, the render-handle
/// registry, picking-driven creation and debounced transform edits.
///
/// Transform edits reach the registry immediately and the store once input
/// has been quiet for `debounce_quiet_ms`. Anything that needs durable state
/// before then (undo, redo, saving) flushes first.
pub struct Editor {
    config: EditorConfig,
    store: SceneStore,
    registry: Arc<ObjectRegistry>,
    picker: Arc<Picker>,
    transforms: Debouncer<EntityId, ProjectObjectPatch>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        input: Arc<InputSurface>,
        camera: Arc<dyn Camera>,
        terrain: Arc<dyn TerrainSurface>,
    ) -> Self {
        let picker = Arc::new(Picker::new(input, camera, terrain).with_max_level(config.terrain_max_level));
        Self {
            store: SceneStore::with_limits(config.history_limit, config.event_retention),
            registry: Arc::new(ObjectRegistry::new()),
            transforms: Debouncer::new(config.debounce_quiet()),
            picker,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &SceneStore {
        &self.store
    }

    /// Direct store access. Bypasses pending transform edits.
    pub fn store_mut(&mut self) -> &mut SceneStore {
        &mut self.store
    }

    pub fn registry(&self) -> Arc<ObjectRegistry> {
        self.registry.clone()
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    /// Starts a polygon pick. The returned future owns everything it needs,
    /// so the editor stays usable (reads, commits, settling) until the user
    /// closes the ring; hand the result to [`Editor::create_clipping_polygon`].
    pub fn pick_ring(&self, cancel: &CancelToken) -> impl Future<Output = Result<Vec<Ecef>, PickError>> + use<> {
        let picker = Arc::clone(&self.picker);
        let cancel = cancel.clone();
        async move { picker.pick_polygon(&cancel).await }
    }

    /// Picks a position, then the point it looks at. Used for starting
    /// points and visual axes.
    pub fn pick_placement(&self, cancel: &CancelToken) -> impl Future<Output = Result<(Ecef, Ecef), PickError>> + use<> {
        let picker = Arc::clone(&self.picker);
        let cancel = cancel.clone();
        async move {
            let position = picker.pick_point(&cancel).await?;
            let target = picker.pick_point(&cancel).await?;
            Ok((position, target))
        }
    }

    pub fn create_clipping_polygon(&mut self, ring: Vec<Ecef>) -> Result<EntityId, EditorError> {
        if ring.len() < ClippingPolygon::MIN_POINTS {
            return Err(EditorError::RingTooShort { points: ring.len() });
        }
        let name = format!("Clipping polygon {}", self.store.clipping_polygons().len() + 1);
        let id = self.store.create(ClippingPolygon::new(name, ring))?;
        info!(%id, "editor: clipping polygon created");
        Ok(id)
    }

    pub fn create_starting_point(&mut self, position: Ecef, target: Ecef) -> Result<EntityId, EditorError> {
        let name = format!("Starting point {}", self.store.starting_points().len() + 1);
        let id = self.store.create(StartingPoint::new(name, position, target))?;
        info!(%id, "editor: starting point created");
        Ok(id)
    }

    pub fn create_visual_axis(&mut self, position: Ecef, target: Ecef) -> Result<EntityId, EditorError> {
        let name = format!("Visual axis {}", self.store.visual_axes().len() + 1);
        let id = self.store.create(VisualAxis::new(name, position, target))?;
        info!(%id, "editor: visual axis created");
        Ok(id)
    }

    pub fn add_blank_project_object(&mut self, name: impl Into<String>) -> Result<EntityId, EditorError> {
        let object = ProjectObject::blank(name).with_ui_epsg(self.config.default_ui_epsg.clone());
        Ok(self.store.create(object)?)
    }

    /// Adds an imported model placed at `translation` with `rotation`.
    ///
    /// The UI mirror fields are derived in the default display projection;
    /// if that fails the blank defaults stay.
    pub fn import_project_object(
        &mut self,
        name: impl Into<String>,
        file_content: Bytes,
        placement: Option<(Ecef, Quat)>,
    ) -> Result<EntityId, EditorError> {
        let mut object =
            ProjectObject::imported(name, file_content).with_ui_epsg(self.config.default_ui_epsg.clone());
        if let Some((translation, rotation)) = placement {
            object.translation = translation;
            object.rotation = rotation;
            match ui_mirror(&object, &self.config.default_ui_epsg) {
                Ok(mirror) => object.apply(mirror),
                Err(e) => warn!(error = %e, "editor: could not derive display transform for import"),
            }
        }
        let bytes = object.file_content.len();
        let id = self.store.create(object)?;
        info!(%id, bytes, "editor: project object imported");
        Ok(id)
    }

    /// Project object state as the user currently sees it: store state with
    /// pending edits applied.
    pub fn project_object_preview(&self, id: &EntityId) -> Option<ProjectObject> {
        let mut object = self.store.get::<ProjectObject>(id)?.clone();
        if let Some(pending) = self.transforms.pending(id) {
            object.apply(pending.clone());
        }
        Some(object)
    }

    /// Applies one keystroke-level transform edit.
    ///
    /// The rendered handle is updated at once; the store is updated after the
    /// quiet period. Returns `Ok(false)` if the object does not exist. An error
    /// means the ECEF part was suppressed; the typed text is still queued.
    pub fn edit_transform(&mut self, id: &EntityId, edit: TransformEdit) -> Result<bool, TransformError> {
        let Some(current) = self.project_object_preview(id) else {
            debug!(%id, "editor: transform edit for missing object ignored");
            return Ok(false);
        };
        let outcome = edit.evaluate(&current);
        if let Some(update) = &outcome.handle_update {
            self.registry.apply(EntityKind::ProjectObject, id, update);
        }
        if !outcome.patch.is_empty() {
            self.transforms.push(id.clone(), outcome.patch, Instant::now());
        }
        match outcome.error {
            Some(e) => {
                warn!(%id, field = ?edit.field(), error = %e, "editor: transform edit suppressed");
                Err(e)
            }
            None => Ok(true),
        }
    }

    pub fn has_pending_transforms(&self) -> bool {
        !self.transforms.is_empty()
    }

    pub fn next_commit_deadline(&self) -> Option<Instant> {
        self.transforms.deadline()
    }

    /// Commits pending edits whose quiet period has elapsed at `now`.
    /// Returns the number of store updates made.
    pub fn commit_due(&mut self, now: Instant) -> usize {
        let due = self.transforms.take_due(now);
        self.commit(due)
    }

    /// Commits every pending edit now.
    pub fn flush_transforms(&mut self) -> usize {
        let pending = self.transforms.flush();
        self.commit(pending)
    }

    /// Waits for the quiet period to elapse, then commits.
    pub async fn settle(&mut self) -> usize {
        if let Some(deadline) = self.transforms.deadline() {
            tokio::time::sleep_until(deadline).await;
        }
        self.commit_due(Instant::now())
    }

    fn commit(&mut self, patches: Vec<(EntityId, ProjectObjectPatch)>) -> usize {
        let mut committed = 0;
        for (id, patch) in patches {
            if self.store.update::<ProjectObject>(&id, patch) {
                committed += 1;
            }
        }
        if committed > 0 {
            debug!(committed, "editor: transform edits committed");
        }
        committed
    }

    pub fn update<T: SceneEntity>(&mut self, id: &EntityId, patch: T::Patch) -> bool {
        self.store.update::<T>(id, patch)
    }

    /// Deletes the entity. Pending transform edits for it are dropped.
    pub fn delete<T: SceneEntity>(&mut self, id: &EntityId) -> bool {
        if T::KIND == EntityKind::ProjectObject && self.transforms.cancel(id).is_some() {
            debug!(%id, "editor: pending transform dropped with deleted object");
        }
        self.store.delete::<T>(id)
    }

    pub fn toggle_visibility(&mut self, kind: EntityKind, id: &EntityId) -> bool {
        if !self.store.toggle_visibility(kind, id) {
            return false;
        }
        if let Some(visible) = self.visibility_of(kind, id) {
            self.registry.apply(kind, id, &HandleUpdate::Visibility(visible));
        }
        true
    }

    fn visibility_of(&self, kind: EntityKind, id: &EntityId) -> Option<bool> {
        match kind {
            EntityKind::ClippingPolygon => self.store.get::<ClippingPolygon>(id).map(|e| e.visible),
            EntityKind::ProjectObject => self.store.get::<ProjectObject>(id).map(|e| e.visible),
            EntityKind::StartingPoint => self.store.get::<StartingPoint>(id).map(|e| e.visible),
            EntityKind::VisualAxis => self.store.get::<VisualAxis>(id).map(|e| e.visible),
        }
    }

    pub fn set_selected_object(&mut self, selected: Option<SelectedObject>) {
        self.store.set_selected_object(selected);
    }

    pub fn can_undo(&self) -> bool {
        self.has_pending_transforms() || self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.has_pending_transforms() && self.store.can_redo()
    }

    /// Flushes pending edits, then steps back one snapshot.
    pub fn undo(&mut self) -> bool {
        self.flush_transforms();
        let undone = self.store.undo();
        if undone {
            self.sync_registry();
        }
        undone
    }

    /// Flushes pending edits, then steps forward one snapshot.
    pub fn redo(&mut self) -> bool {
        self.flush_transforms();
        let redone = self.store.redo();
        if redone {
            self.sync_registry();
        }
        redone
    }

    /// Pushes store state to every registered handle. Returns how many
    /// handles were updated.
    pub fn sync_registry(&self) -> usize {
        let mut synced = 0;
        let collections = self.store.collections();
        for o in &collections.project_objects {
            let update = HandleUpdate::Transform {
                translation: Some(o.translation),
                rotation: Some(o.rotation),
                scale: Some(o.scale),
            };
            synced += self.sync_one(EntityKind::ProjectObject, &o.id, update, o.visible);
        }
        for p in &collections.clipping_polygons {
            let update = HandleUpdate::Positions(p.positions.clone());
            synced += self.sync_one(EntityKind::ClippingPolygon, &p.id, update, p.visible);
        }
        for s in &collections.starting_points {
            let update = HandleUpdate::Placement {
                position: s.position,
                target: s.target,
            };
            synced += self.sync_one(EntityKind::StartingPoint, &s.id, update, s.visible);
        }
        for a in &collections.visual_axes {
            let update = HandleUpdate::Placement {
                position: a.position,
                target: a.target,
            };
            synced += self.sync_one(EntityKind::VisualAxis, &a.id, update, a.visible);
        }
        synced
    }

    fn sync_one(&self, kind: EntityKind, id: &EntityId, update: HandleUpdate, visible: bool) -> usize {
        if !self.registry.apply(kind, id, &update) {
            return 0;
        }
        self.registry.apply(kind, id, &HandleUpdate::Visibility(visible));
        1
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("pending_transforms", &self.transforms.len())
            .finish()
    }
}
