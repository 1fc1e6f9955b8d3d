use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::selection::SelectedObject;
use crate::store::SceneCollections;

/// Opaque, generator-assigned entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// A fresh random (v4) identifier. Never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The mutable entity kinds held by the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ClippingPolygon,
    ProjectObject,
    StartingPoint,
    VisualAxis,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::ClippingPolygon,
        EntityKind::ProjectObject,
        EntityKind::StartingPoint,
        EntityKind::VisualAxis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::ClippingPolygon => "clipping_polygon",
            EntityKind::ProjectObject => "project_object",
            EntityKind::StartingPoint => "starting_point",
            EntityKind::VisualAxis => "visual_axis",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature of a rendered 3D tileset.
///
/// Never materialized in the store; selection carries the feature id and the
/// attribute map the rendering layer reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile3dFeature {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Common surface of every store-held entity kind.
///
/// The store is generic over this trait so each kind gets the same
/// `set`/`create`/`update`/`delete` contract.
pub trait SceneEntity: Clone + fmt::Debug {
    /// Partial change applied by `update`.
    type Patch: runtime::Coalesce + Clone + fmt::Debug + Default;

    const KIND: EntityKind;

    fn id(&self) -> &EntityId;
    fn name(&self) -> &str;
    fn visible(&self) -> bool;
    fn set_visible(&mut self, visible: bool);

    /// Shallow merge: every field present in `patch` replaces the current value.
    fn apply(&mut self, patch: Self::Patch);

    fn collection(collections: &SceneCollections) -> &Vec<Self>;
    fn collection_mut(collections: &mut SceneCollections) -> &mut Vec<Self>;

    fn selection(&self) -> SelectedObject {
        SelectedObject::Entity {
            kind: Self::KIND,
            id: self.id().clone(),
        }
    }
}
