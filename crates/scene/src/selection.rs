use serde::{Deserialize, Serialize};

use crate::entities::{ClippingPolygon, ProjectObject, StartingPoint, VisualAxis};
use crate::entity::{EntityId, EntityKind, SceneEntity, Tile3dFeature};
use crate::store::SceneCollections;

/// Reference to the selected object. Never an owning copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectedObject {
    Entity { kind: EntityKind, id: EntityId },
    Tile3d(Tile3dFeature),
}

impl SelectedObject {
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        SelectedObject::Entity { kind, id }
    }

    pub fn refers_to(&self, kind: EntityKind, id: &EntityId) -> bool {
        matches!(self, SelectedObject::Entity { kind: k, id: i } if *k == kind && i == id)
    }
}

/// A selection resolved against the live collections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectedEntity<'a> {
    ClippingPolygon(&'a ClippingPolygon),
    ProjectObject(&'a ProjectObject),
    StartingPoint(&'a StartingPoint),
    VisualAxis(&'a VisualAxis),
    Tile3d(&'a Tile3dFeature),
}

fn find<'a, T: SceneEntity>(collections: &'a SceneCollections, id: &EntityId) -> Option<&'a T> {
    T::collection(collections).iter().find(|e| e.id() == id)
}

/// Resolves `selected`; a reference to a deleted entity yields `None`.
pub fn resolve<'a>(
    selected: &'a SelectedObject,
    collections: &'a SceneCollections,
) -> Option<SelectedEntity<'a>> {
    match selected {
        SelectedObject::Tile3d(feature) => Some(SelectedEntity::Tile3d(feature)),
        SelectedObject::Entity { kind, id } => match kind {
            EntityKind::ClippingPolygon => find(collections, id).map(SelectedEntity::ClippingPolygon),
            EntityKind::ProjectObject => find(collections, id).map(SelectedEntity::ProjectObject),
            EntityKind::StartingPoint => find(collections, id).map(SelectedEntity::StartingPoint),
            EntityKind::VisualAxis => find(collections, id).map(SelectedEntity::VisualAxis),
        },
    }
}
