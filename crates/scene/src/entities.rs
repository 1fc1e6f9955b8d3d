//! The four mutable scene entity kinds and their partial-update patches.

use std::collections::BTreeMap;

use bytes::Bytes;
use foundation::math::{Ecef, Quat, Vec3};
use runtime::Coalesce;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind, SceneEntity};
use crate::store::SceneCollections;

pub const DEFAULT_UI_EPSG: &str = "EPSG:4326";

fn merge<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

fn assign<T>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

/// Closed ring of ECEF points masking terrain and tiles.
///
/// The ring is implicitly closed; the last point is not repeated. Point order
/// defines the winding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingPolygon {
    pub id: EntityId,
    pub name: String,
    pub visible: bool,
    pub positions: Vec<Ecef>,
    pub affects_terrain: bool,
}

impl ClippingPolygon {
    pub const MIN_POINTS: usize = 3;

    pub fn new(name: impl Into<String>, positions: Vec<Ecef>) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            visible: true,
            positions,
            affects_terrain: true,
        }
    }

    pub fn is_closed_ring(&self) -> bool {
        self.positions.len() >= Self::MIN_POINTS
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClippingPolygonPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub positions: Option<Vec<Ecef>>,
    pub affects_terrain: Option<bool>,
}

impl Coalesce for ClippingPolygonPatch {
    fn coalesce(&mut self, newer: Self) {
        merge(&mut self.name, newer.name);
        merge(&mut self.visible, newer.visible);
        merge(&mut self.positions, newer.positions);
        merge(&mut self.affects_terrain, newer.affects_terrain);
    }
}

impl SceneEntity for ClippingPolygon {
    type Patch = ClippingPolygonPatch;
    const KIND: EntityKind = EntityKind::ClippingPolygon;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn apply(&mut self, patch: Self::Patch) {
        assign(&mut self.name, patch.name);
        assign(&mut self.visible, patch.visible);
        assign(&mut self.positions, patch.positions);
        assign(&mut self.affects_terrain, patch.affects_terrain);
    }

    fn collection(collections: &SceneCollections) -> &Vec<Self> {
        &collections.clipping_polygons
    }

    fn collection_mut(collections: &mut SceneCollections) -> &mut Vec<Self> {
        &mut collections.clipping_polygons
    }
}

/// An imported (or blank) model placed in ECEF space.
///
/// `ui_*` fields cache what the user last typed, in the display projection
/// `ui_epsg` and HPR degrees, so text fields do not have to be re-derived from
/// the ECEF transform on every keystroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectObject {
    pub id: EntityId,
    pub name: String,
    pub visible: bool,
    pub translation: Ecef,
    pub rotation: Quat,
    pub scale: Vec3,
    pub ui_translation: [String; 3],
    pub ui_rotation: [String; 3],
    pub ui_scale: [String; 3],
    pub ui_epsg: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Opaque model payload. Immutable once imported.
    #[serde(default)]
    pub file_content: Bytes,
}

impl ProjectObject {
    /// Identity transform, no payload.
    pub fn blank(name: impl Into<String>) -> Self {
        let zero = || ["0".to_string(), "0".to_string(), "0".to_string()];
        Self {
            id: EntityId::generate(),
            name: name.into(),
            visible: true,
            translation: Ecef::default(),
            rotation: Quat::IDENTITY,
            scale: Vec3::new(1.0, 1.0, 1.0),
            ui_translation: zero(),
            ui_rotation: zero(),
            ui_scale: ["1".to_string(), "1".to_string(), "1".to_string()],
            ui_epsg: DEFAULT_UI_EPSG.to_string(),
            attributes: BTreeMap::new(),
            file_content: Bytes::new(),
        }
    }

    pub fn imported(name: impl Into<String>, file_content: Bytes) -> Self {
        Self {
            file_content,
            ..Self::blank(name)
        }
    }

    pub fn with_ui_epsg(mut self, code: impl Into<String>) -> Self {
        self.ui_epsg = code.into();
        self
    }
}

/// Partial change to a [`ProjectObject`]. `file_content` is not patchable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectObjectPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub translation: Option<Ecef>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    pub ui_translation: Option<[String; 3]>,
    pub ui_rotation: Option<[String; 3]>,
    pub ui_scale: Option<[String; 3]>,
    pub ui_epsg: Option<String>,
    pub attributes: Option<BTreeMap<String, String>>,
}

impl ProjectObjectPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Coalesce for ProjectObjectPatch {
    fn coalesce(&mut self, newer: Self) {
        merge(&mut self.name, newer.name);
        merge(&mut self.visible, newer.visible);
        merge(&mut self.translation, newer.translation);
        merge(&mut self.rotation, newer.rotation);
        merge(&mut self.scale, newer.scale);
        merge(&mut self.ui_translation, newer.ui_translation);
        merge(&mut self.ui_rotation, newer.ui_rotation);
        merge(&mut self.ui_scale, newer.ui_scale);
        merge(&mut self.ui_epsg, newer.ui_epsg);
        merge(&mut self.attributes, newer.attributes);
    }
}

impl SceneEntity for ProjectObject {
    type Patch = ProjectObjectPatch;
    const KIND: EntityKind = EntityKind::ProjectObject;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn apply(&mut self, patch: Self::Patch) {
        assign(&mut self.name, patch.name);
        assign(&mut self.visible, patch.visible);
        assign(&mut self.translation, patch.translation);
        assign(&mut self.rotation, patch.rotation);
        assign(&mut self.scale, patch.scale);
        assign(&mut self.ui_translation, patch.ui_translation);
        assign(&mut self.ui_rotation, patch.ui_rotation);
        assign(&mut self.ui_scale, patch.ui_scale);
        assign(&mut self.ui_epsg, patch.ui_epsg);
        assign(&mut self.attributes, patch.attributes);
    }

    fn collection(collections: &SceneCollections) -> &Vec<Self> {
        &collections.project_objects
    }

    fn collection_mut(collections: &mut SceneCollections) -> &mut Vec<Self> {
        &mut collections.project_objects
    }
}

/// Camera placement used for fly-to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingPoint {
    pub id: EntityId,
    pub name: String,
    pub visible: bool,
    pub position: Ecef,
    pub target: Ecef,
}

impl StartingPoint {
    pub fn new(name: impl Into<String>, position: Ecef, target: Ecef) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            visible: true,
            position,
            target,
        }
    }
}

/// Sight line rendered as a frustum from `position` towards `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAxis {
    pub id: EntityId,
    pub name: String,
    pub visible: bool,
    pub position: Ecef,
    pub target: Ecef,
}

impl VisualAxis {
    pub fn new(name: impl Into<String>, position: Ecef, target: Ecef) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            visible: true,
            position,
            target,
        }
    }
}

/// Partial change shared by [`StartingPoint`] and [`VisualAxis`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlacementPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub position: Option<Ecef>,
    pub target: Option<Ecef>,
}

impl Coalesce for PlacementPatch {
    fn coalesce(&mut self, newer: Self) {
        merge(&mut self.name, newer.name);
        merge(&mut self.visible, newer.visible);
        merge(&mut self.position, newer.position);
        merge(&mut self.target, newer.target);
    }
}

macro_rules! placement_entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl SceneEntity for $ty {
            type Patch = PlacementPatch;
            const KIND: EntityKind = $kind;

            fn id(&self) -> &EntityId {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn visible(&self) -> bool {
                self.visible
            }

            fn set_visible(&mut self, visible: bool) {
                self.visible = visible;
            }

            fn apply(&mut self, patch: Self::Patch) {
                assign(&mut self.name, patch.name);
                assign(&mut self.visible, patch.visible);
                assign(&mut self.position, patch.position);
                assign(&mut self.target, patch.target);
            }

            fn collection(collections: &SceneCollections) -> &Vec<Self> {
                &collections.$field
            }

            fn collection_mut(collections: &mut SceneCollections) -> &mut Vec<Self> {
                &mut collections.$field
            }
        }
    };
}

placement_entity!(StartingPoint, EntityKind::StartingPoint, starting_points);
placement_entity!(VisualAxis, EntityKind::VisualAxis, visual_axes);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn patch_apply_is_shallow_merge() {
        let mut p = ProjectObject::blank("house");
        let before = p.clone();
        p.apply(ProjectObjectPatch {
            name: Some("barn".to_string()),
            translation: Some(Ecef::new(1.0, 2.0, 3.0)),
            ..Default::default()
        });
        assert_eq!(p.name, "barn");
        assert_eq!(p.translation, Ecef::new(1.0, 2.0, 3.0));
        assert_eq!(p.rotation, before.rotation);
        assert_eq!(p.ui_epsg, before.ui_epsg);
        assert_eq!(p.id, before.id);
    }

    #[test]
    fn newer_patch_fields_win_when_coalescing() {
        let mut a = ProjectObjectPatch {
            translation: Some(Ecef::new(1.0, 0.0, 0.0)),
            scale: Some(Vec3::new(2.0, 2.0, 2.0)),
            ..Default::default()
        };
        a.coalesce(ProjectObjectPatch {
            translation: Some(Ecef::new(5.0, 0.0, 0.0)),
            ..Default::default()
        });
        assert_eq!(a.translation, Some(Ecef::new(5.0, 0.0, 0.0)));
        assert_eq!(a.scale, Some(Vec3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn imported_object_keeps_payload() {
        let o = ProjectObject::imported("model", Bytes::from_static(b"glTF"));
        assert_eq!(&o.file_content[..], b"glTF");
        assert_eq!(o.scale, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(o.ui_epsg, DEFAULT_UI_EPSG);
    }

    #[test]
    fn placement_patch_updates_target_only() {
        let mut s = StartingPoint::new("view", Ecef::new(1.0, 0.0, 0.0), Ecef::new(2.0, 0.0, 0.0));
        s.apply(PlacementPatch {
            target: Some(Ecef::new(3.0, 0.0, 0.0)),
            ..Default::default()
        });
        assert_eq!(s.position, Ecef::new(1.0, 0.0, 0.0));
        assert_eq!(s.target, Ecef::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn polygon_ring_needs_three_points() {
        let mut poly = ClippingPolygon::new("clip", vec![Ecef::default(); 2]);
        assert!(!poly.is_closed_ring());
        poly.positions.push(Ecef::new(1.0, 1.0, 0.0));
        assert!(poly.is_closed_ring());
    }
}
