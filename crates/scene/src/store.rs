use std::collections::HashSet;
use std::fmt;

use runtime::{Event, EventBus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{ClippingPolygon, ProjectObject, StartingPoint, VisualAxis};
use crate::entity::{EntityId, EntityKind, SceneEntity};
use crate::history::{History, Snapshot};
use crate::selection::{self, SelectedEntity, SelectedObject};

/// The four live entity collections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneCollections {
    #[serde(default)]
    pub clipping_polygons: Vec<ClippingPolygon>,
    #[serde(default)]
    pub project_objects: Vec<ProjectObject>,
    #[serde(default)]
    pub starting_points: Vec<StartingPoint>,
    #[serde(default)]
    pub visual_axes: Vec<VisualAxis>,
}

impl SceneCollections {
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::ClippingPolygon => self.clipping_polygons.len(),
            EntityKind::ProjectObject => self.project_objects.len(),
            EntityKind::StartingPoint => self.starting_points.len(),
            EntityKind::VisualAxis => self.visual_axes.len(),
        }
    }

    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Change notification emitted by [`SceneStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Set { kind: EntityKind, count: usize },
    Created { kind: EntityKind, id: EntityId },
    Updated { kind: EntityKind, id: EntityId },
    Deleted { kind: EntityKind, id: EntityId },
    SelectionChanged(Option<SelectedObject>),
    /// Undo or redo restored the snapshot at `index`.
    Restored { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateId { kind: EntityKind, id: EntityId },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateId { kind, id } => write!(f, "duplicate {kind} id: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

fn check_unique<T: SceneEntity>(list: &[T]) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(list.len());
    for entity in list {
        if !seen.insert(entity.id()) {
            return Err(StoreError::DuplicateId {
                kind: T::KIND,
                id: entity.id().clone(),
            });
        }
    }
    Ok(())
}

/// Authoritative scene state: entity collections, selection cursor and the
/// undo/redo history over both.
///
/// Every successful `set`/`create`/`update`/`delete` records exactly one
/// history snapshot. Missing ids make `update`/`delete` a silent no-op
/// (`false`), since an in-flight edit may target an entity that was deleted
/// meanwhile. Selection changes are not recorded, but undo/redo restore the
/// selection stored with each snapshot.
#[derive(Debug, Default)]
pub struct SceneStore {
    collections: SceneCollections,
    selected: Option<SelectedObject>,
    history: History,
    events: EventBus<StoreEvent>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping at most `event_retention` undrained change events.
    pub fn with_limits(history_limit: Option<usize>, event_retention: usize) -> Self {
        Self {
            history: History::new(history_limit),
            events: EventBus::with_retention(event_retention),
            ..Self::default()
        }
    }

    pub fn collections(&self) -> &SceneCollections {
        &self.collections
    }

    pub fn clipping_polygons(&self) -> &[ClippingPolygon] {
        &self.collections.clipping_polygons
    }

    pub fn project_objects(&self) -> &[ProjectObject] {
        &self.collections.project_objects
    }

    pub fn starting_points(&self) -> &[StartingPoint] {
        &self.collections.starting_points
    }

    pub fn visual_axes(&self) -> &[VisualAxis] {
        &self.collections.visual_axes
    }

    pub fn all<T: SceneEntity>(&self) -> &[T] {
        T::collection(&self.collections)
    }

    pub fn get<T: SceneEntity>(&self, id: &EntityId) -> Option<&T> {
        self.all::<T>().iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        match kind {
            EntityKind::ClippingPolygon => self.get::<ClippingPolygon>(id).is_some(),
            EntityKind::ProjectObject => self.get::<ProjectObject>(id).is_some(),
            EntityKind::StartingPoint => self.get::<StartingPoint>(id).is_some(),
            EntityKind::VisualAxis => self.get::<VisualAxis>(id).is_some(),
        }
    }

    /// Replaces the whole collection of `T`.
    pub fn set<T: SceneEntity>(&mut self, list: Vec<T>) -> Result<(), StoreError> {
        check_unique(&list)?;
        let count = list.len();
        *T::collection_mut(&mut self.collections) = list;
        debug!(kind = %T::KIND, count, "store: set collection");
        self.events.emit(StoreEvent::Set { kind: T::KIND, count });
        self.take_snapshot();
        Ok(())
    }

    /// Replaces all four collections at once (scene load). One snapshot.
    pub fn load(&mut self, collections: SceneCollections) -> Result<(), StoreError> {
        check_unique(&collections.clipping_polygons)?;
        check_unique(&collections.project_objects)?;
        check_unique(&collections.starting_points)?;
        check_unique(&collections.visual_axes)?;
        self.collections = collections;
        for kind in EntityKind::ALL {
            let count = self.collections.count(kind);
            self.events.emit(StoreEvent::Set { kind, count });
        }
        debug!(total = self.collections.total(), "store: scene loaded");
        self.take_snapshot();
        Ok(())
    }

    /// Appends `entity`, selects it and records a snapshot.
    pub fn create<T: SceneEntity>(&mut self, entity: T) -> Result<EntityId, StoreError> {
        let id = entity.id().clone();
        if self.get::<T>(&id).is_some() {
            return Err(StoreError::DuplicateId { kind: T::KIND, id });
        }
        let selection = entity.selection();
        T::collection_mut(&mut self.collections).push(entity);
        debug!(kind = %T::KIND, %id, "store: created");
        self.events.emit(StoreEvent::Created {
            kind: T::KIND,
            id: id.clone(),
        });
        self.select(Some(selection));
        self.take_snapshot();
        Ok(id)
    }

    /// Shallow-merges `patch` into the entity with `id`.
    ///
    /// Returns `false` (and records nothing) if no such entity exists.
    pub fn update<T: SceneEntity>(&mut self, id: &EntityId, patch: T::Patch) -> bool {
        let Some(entity) = T::collection_mut(&mut self.collections)
            .iter_mut()
            .find(|e| e.id() == id)
        else {
            debug!(kind = %T::KIND, %id, "store: update of missing entity ignored");
            return false;
        };
        entity.apply(patch);
        self.events.emit(StoreEvent::Updated {
            kind: T::KIND,
            id: id.clone(),
        });
        self.take_snapshot();
        true
    }

    /// Removes the entity with `id`. Returns `false` if it was not present.
    pub fn delete<T: SceneEntity>(&mut self, id: &EntityId) -> bool {
        let list = T::collection_mut(&mut self.collections);
        let Some(pos) = list.iter().position(|e| e.id() == id) else {
            debug!(kind = %T::KIND, %id, "store: delete of missing entity ignored");
            return false;
        };
        list.remove(pos);
        debug!(kind = %T::KIND, %id, "store: deleted");
        self.events.emit(StoreEvent::Deleted {
            kind: T::KIND,
            id: id.clone(),
        });
        self.take_snapshot();
        true
    }

    /// Flips `visible` on the entity. One snapshot, `false` if missing.
    pub fn toggle_visibility(&mut self, kind: EntityKind, id: &EntityId) -> bool {
        match kind {
            EntityKind::ClippingPolygon => self.toggle::<ClippingPolygon>(id),
            EntityKind::ProjectObject => self.toggle::<ProjectObject>(id),
            EntityKind::StartingPoint => self.toggle::<StartingPoint>(id),
            EntityKind::VisualAxis => self.toggle::<VisualAxis>(id),
        }
    }

    fn toggle<T: SceneEntity>(&mut self, id: &EntityId) -> bool {
        let Some(entity) = T::collection_mut(&mut self.collections)
            .iter_mut()
            .find(|e| e.id() == id)
        else {
            return false;
        };
        let visible = !entity.visible();
        entity.set_visible(visible);
        debug!(kind = %T::KIND, %id, visible, "store: visibility toggled");
        self.events.emit(StoreEvent::Updated {
            kind: T::KIND,
            id: id.clone(),
        });
        self.take_snapshot();
        true
    }

    pub fn selected_object(&self) -> Option<&SelectedObject> {
        self.selected.as_ref()
    }

    /// The selection resolved against the live collections.
    pub fn selected(&self) -> Option<SelectedEntity<'_>> {
        self.selected
            .as_ref()
            .and_then(|s| selection::resolve(s, &self.collections))
    }

    /// Moves the selection cursor. Not recorded in history.
    pub fn set_selected_object(&mut self, selected: Option<SelectedObject>) {
        self.select(selected);
    }

    fn select(&mut self, selected: Option<SelectedObject>) {
        if self.selected == selected {
            return;
        }
        self.selected = selected.clone();
        self.events.emit(StoreEvent::SelectionChanged(selected));
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the previous snapshot. `false` at the start of history.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        debug!(index = self.history.index(), "store: undo");
        self.restore(snapshot);
        true
    }

    /// Restores the next snapshot. `false` at the end of history.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        debug!(index = self.history.index(), "store: redo");
        self.restore(snapshot);
        true
    }

    pub fn events(&self) -> &EventBus<StoreEvent> {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event<StoreEvent>> {
        self.events.drain()
    }

    fn take_snapshot(&mut self) {
        self.history.record(Snapshot {
            collections: self.collections.clone(),
            selected: self.selected.clone(),
        });
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.collections = snapshot.collections;
        self.selected = snapshot.selected;
        self.events.emit(StoreEvent::Restored {
            index: self.history.index(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ClippingPolygonPatch, PlacementPatch, ProjectObjectPatch};
    use foundation::math::Ecef;
    use pretty_assertions::assert_eq;

    fn triangle() -> ClippingPolygon {
        ClippingPolygon::new(
            "clip",
            vec![
                Ecef::new(0.0, 0.0, 0.0),
                Ecef::new(1.0, 0.0, 0.0),
                Ecef::new(1.0, 1.0, 0.0),
            ],
        )
    }

    #[test]
    fn create_undo_redo_polygon() {
        let mut store = SceneStore::new();
        let poly = triangle();
        let id = store.create(poly.clone()).unwrap();

        assert_eq!(store.clipping_polygons().len(), 1);
        assert_eq!(
            store.selected_object(),
            Some(&SelectedObject::entity(EntityKind::ClippingPolygon, id.clone()))
        );
        assert_eq!(store.selected(), Some(SelectedEntity::ClippingPolygon(&poly)));
        assert_eq!(store.history().index(), 1);

        assert!(store.undo());
        assert!(store.clipping_polygons().is_empty());
        assert_eq!(store.history().index(), 0);
        assert_eq!(store.selected(), None);

        assert!(store.redo());
        assert_eq!(store.clipping_polygons(), &[poly]);
        assert_eq!(store.history().index(), 1);
    }

    #[test]
    fn update_of_missing_id_is_silent_noop() {
        let mut store = SceneStore::new();
        let changed = store.update::<ProjectObject>(
            &EntityId::from("missing-id"),
            ProjectObjectPatch {
                name: Some("x".to_string()),
                ..Default::default()
            },
        );
        assert!(!changed);
        assert!(store.project_objects().is_empty());
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history().index(), 0);
        assert!(store.events().is_empty());
    }

    #[test]
    fn delete_of_missing_id_records_nothing() {
        let mut store = SceneStore::new();
        assert!(!store.delete::<VisualAxis>(&EntityId::from("gone")));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn live_edits_do_not_leak_into_snapshots() {
        let mut store = SceneStore::new();
        let id = store.create(triangle()).unwrap();
        assert!(store.update::<ClippingPolygon>(
            &id,
            ClippingPolygonPatch {
                positions: Some(vec![Ecef::new(9.0, 9.0, 9.0); 3]),
                ..Default::default()
            },
        ));

        store.undo();
        assert_eq!(store.clipping_polygons()[0].positions, triangle().positions);

        // Mutate the restored state and make sure the stored entry is untouched.
        store.update::<ClippingPolygon>(
            &id,
            ClippingPolygonPatch {
                name: Some("renamed".to_string()),
                ..Default::default()
            },
        );
        let first = &store.history().entries()[1];
        assert_eq!(first.collections.clipping_polygons[0].name, "clip");
    }

    #[test]
    fn new_mutation_after_undo_truncates_redo() {
        let mut store = SceneStore::new();
        for i in 0..4 {
            store
                .create(StartingPoint::new(format!("p{i}"), Ecef::default(), Ecef::default()))
                .unwrap();
        }
        store.undo();
        store.undo();
        assert_eq!(store.history().index(), 2);
        assert!(store.can_redo());

        store
            .create(VisualAxis::new("axis", Ecef::default(), Ecef::default()))
            .unwrap();
        assert_eq!(store.history().index(), 3);
        assert_eq!(store.history().len(), 4);
        assert!(!store.can_redo());
        assert!(!store.redo());
    }

    #[test]
    fn selection_changes_are_not_recorded_but_restored() {
        let mut store = SceneStore::new();
        let a = store.create(triangle()).unwrap();
        let b = store.create(triangle()).unwrap();
        let len = store.history().len();

        store.set_selected_object(Some(SelectedObject::entity(EntityKind::ClippingPolygon, a.clone())));
        assert_eq!(store.history().len(), len);

        store.undo();
        assert_eq!(
            store.selected_object(),
            Some(&SelectedObject::entity(EntityKind::ClippingPolygon, a))
        );
        store.redo();
        assert_eq!(
            store.selected_object(),
            Some(&SelectedObject::entity(EntityKind::ClippingPolygon, b))
        );
    }

    #[test]
    fn selection_of_deleted_entity_resolves_to_none() {
        let mut store = SceneStore::new();
        let id = store.create(ProjectObject::blank("obj")).unwrap();
        assert!(store.delete::<ProjectObject>(&id));
        assert!(store.selected_object().is_some());
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn set_replaces_collection_and_rejects_duplicates() {
        let mut store = SceneStore::new();
        let p = StartingPoint::new("a", Ecef::default(), Ecef::default());
        store.set(vec![p.clone()]).unwrap();
        assert_eq!(store.starting_points().len(), 1);
        assert_eq!(store.history().index(), 1);

        let err = store.set(vec![p.clone(), p.clone()]).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateId {
                kind: EntityKind::StartingPoint,
                id: p.id.clone()
            }
        );
        assert_eq!(store.history().index(), 1);
        assert!(store.create(p).is_err());
    }

    #[test]
    fn toggle_visibility_records_one_snapshot() {
        let mut store = SceneStore::new();
        let id = store
            .create(VisualAxis::new("axis", Ecef::default(), Ecef::default()))
            .unwrap();
        assert!(store.toggle_visibility(EntityKind::VisualAxis, &id));
        assert!(!store.visual_axes()[0].visible);
        assert_eq!(store.history().index(), 2);
        assert!(!store.toggle_visibility(EntityKind::StartingPoint, &id));
        assert_eq!(store.history().index(), 2);
    }

    #[test]
    fn events_describe_mutations_in_order() {
        let mut store = SceneStore::new();
        let id = store
            .create(StartingPoint::new("cam", Ecef::default(), Ecef::default()))
            .unwrap();
        store.update::<StartingPoint>(
            &id,
            PlacementPatch {
                target: Some(Ecef::new(1.0, 2.0, 3.0)),
                ..Default::default()
            },
        );
        store.undo();

        let payloads: Vec<StoreEvent> = store.drain_events().into_iter().map(|e| e.payload).collect();
        assert_eq!(
            payloads,
            vec![
                StoreEvent::Created {
                    kind: EntityKind::StartingPoint,
                    id: id.clone()
                },
                StoreEvent::SelectionChanged(Some(SelectedObject::entity(
                    EntityKind::StartingPoint,
                    id.clone()
                ))),
                StoreEvent::Updated {
                    kind: EntityKind::StartingPoint,
                    id
                },
                StoreEvent::Restored { index: 1 },
            ]
        );
    }

    #[test]
    fn undrained_events_stay_bounded() {
        let mut store = SceneStore::with_limits(Some(5), 64);
        let id = store.create(triangle()).unwrap();
        for _ in 0..10_000 {
            store.toggle_visibility(EntityKind::ClippingPolygon, &id);
        }
        assert_eq!(store.history().len(), 5);
        assert_eq!(store.events().len(), 64);
        assert_eq!(store.events().cursor(), 10_002);
        assert_eq!(
            store.events().events().last().map(|e| &e.payload),
            Some(&StoreEvent::Updated {
                kind: EntityKind::ClippingPolygon,
                id
            })
        );
    }

    #[test]
    fn load_replaces_everything_with_one_snapshot() {
        let mut store = SceneStore::new();
        let mut collections = SceneCollections::default();
        collections.clipping_polygons.push(triangle());
        collections.project_objects.push(ProjectObject::blank("obj"));
        store.load(collections.clone()).unwrap();
        assert_eq!(store.collections(), &collections);
        assert_eq!(store.history().index(), 1);
        assert_eq!(store.collections().total(), 2);
    }
}
