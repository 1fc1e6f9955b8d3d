//! Keystroke-level transform edits for project objects.
//!
//! Text typed into the translation, rotation and scale fields is parsed,
//! converted into ECEF through the coordinate pipeline and turned into a
//! [`ProjectObjectPatch`] plus an immediate [`HandleUpdate`]. The typed text is
//! always kept; the ECEF part is dropped when conversion fails, so non-finite
//! values never reach entity state.

use std::fmt;

use foundation::math::{
    Crs, Ecef, FrameError, Hpr, HprDegrees, ProjectionError, Quat, Vec3, orientation_ecef_to_local_hpr,
    orientation_local_hpr_to_ecef,
};
use scene::{HandleUpdate, ProjectObject, ProjectObjectPatch};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransformField {
    Translation,
    Rotation,
    Scale,
}

impl fmt::Display for TransformField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformField::Translation => f.write_str("translation"),
            TransformField::Rotation => f.write_str("rotation"),
            TransformField::Scale => f.write_str("scale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    Parse {
        field: TransformField,
        axis: usize,
        text: String,
    },
    Projection(ProjectionError),
    Frame(FrameError),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Parse { field, axis, text } => {
                write!(f, "{field} component {axis} is not a number: {text:?}")
            }
            TransformError::Projection(e) => write!(f, "{e}"),
            TransformError::Frame(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransformError {}

impl From<ProjectionError> for TransformError {
    fn from(e: ProjectionError) -> Self {
        TransformError::Projection(e)
    }
}

impl From<FrameError> for TransformError {
    fn from(e: FrameError) -> Self {
        TransformError::Frame(e)
    }
}

/// One edit coming from the transform panel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformEdit {
    /// Position in the object's display projection.
    Translation([String; 3]),
    /// Heading, pitch, roll in degrees, relative to the local frame at the
    /// object's position.
    Rotation([String; 3]),
    Scale([String; 3]),
    /// Switches the display projection, re-expressing the current position.
    Epsg(String),
}

/// Result of evaluating an edit against the current object state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformOutcome {
    pub patch: ProjectObjectPatch,
    /// Immediate visual update, `None` when nothing could be converted.
    pub handle_update: Option<HandleUpdate>,
    pub error: Option<TransformError>,
}

fn parse3(field: TransformField, text: &[String; 3]) -> Result<[f64; 3], TransformError> {
    let mut out = [0.0; 3];
    for (axis, (slot, raw)) in out.iter_mut().zip(text).enumerate() {
        *slot = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TransformError::Parse {
                field,
                axis,
                text: raw.clone(),
            })?;
    }
    Ok(out)
}

fn trim_number(v: f64, decimals: usize) -> String {
    let s = format!("{v:.decimals$}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    };
    if s == "-0" { "0".to_string() } else { s }
}

/// Display text for a position expressed in `crs`.
pub fn format_position(crs: Crs, p: [f64; 3]) -> [String; 3] {
    let horizontal = if crs.is_geographic() { 9 } else { 3 };
    [
        trim_number(p[0], horizontal),
        trim_number(p[1], horizontal),
        trim_number(p[2], 3),
    ]
}

pub fn format_hpr(hpr: HprDegrees) -> [String; 3] {
    [
        trim_number(hpr.heading, 6),
        trim_number(hpr.pitch, 6),
        trim_number(hpr.roll, 6),
    ]
}

pub fn format_scale(scale: Vec3) -> [String; 3] {
    [trim_number(scale.x, 6), trim_number(scale.y, 6), trim_number(scale.z, 6)]
}

/// Derives the UI mirror fields of `object` from its ECEF transform in `code`.
///
/// Used when an object arrives without typed text (import, projection switch).
pub fn ui_mirror(object: &ProjectObject, code: &str) -> Result<ProjectObjectPatch, TransformError> {
    let crs = Crs::from_code(code)?;
    let position = crs.inverse(object.translation)?;
    let hpr = orientation_ecef_to_local_hpr(object.rotation, object.translation)?;
    Ok(ProjectObjectPatch {
        ui_translation: Some(format_position(crs, position)),
        ui_rotation: Some(format_hpr(hpr.to_degrees())),
        ui_scale: Some(format_scale(object.scale)),
        ui_epsg: Some(crs.code()),
        ..Default::default()
    })
}

fn rotation_at(ui_rotation: &[String; 3], origin: Ecef) -> Result<Quat, TransformError> {
    let [h, p, r] = parse3(TransformField::Rotation, ui_rotation)?;
    let hpr = Hpr::from_degrees(HprDegrees::new(h, p, r));
    Ok(orientation_local_hpr_to_ecef(hpr, origin)?)
}

impl TransformEdit {
    pub fn field(&self) -> Option<TransformField> {
        match self {
            TransformEdit::Translation(_) => Some(TransformField::Translation),
            TransformEdit::Rotation(_) => Some(TransformField::Rotation),
            TransformEdit::Scale(_) => Some(TransformField::Scale),
            TransformEdit::Epsg(_) => None,
        }
    }

    /// Evaluates the edit against `current` (store state with any pending
    /// edits already applied).
    pub fn evaluate(&self, current: &ProjectObject) -> TransformOutcome {
        let mut out = TransformOutcome::default();
        match self {
            TransformEdit::Translation(text) => {
                out.patch.ui_translation = Some(text.clone());
                let converted = parse3(TransformField::Translation, text).and_then(|p| {
                    let crs = Crs::from_code(&current.ui_epsg)?;
                    Ok(crs.forward(p)?)
                });
                match converted {
                    Ok(translation) => {
                        out.patch.translation = Some(translation);
                        // Keep the typed local orientation at the new position.
                        let rotation = rotation_at(&current.ui_rotation, translation).ok();
                        out.patch.rotation = rotation;
                        out.handle_update = Some(HandleUpdate::Transform {
                            translation: Some(translation),
                            rotation,
                            scale: None,
                        });
                    }
                    Err(e) => out.error = Some(e),
                }
            }
            TransformEdit::Rotation(text) => {
                out.patch.ui_rotation = Some(text.clone());
                match rotation_at(text, current.translation) {
                    Ok(rotation) => {
                        out.patch.rotation = Some(rotation);
                        out.handle_update = Some(HandleUpdate::Transform {
                            translation: None,
                            rotation: Some(rotation),
                            scale: None,
                        });
                    }
                    Err(e) => out.error = Some(e),
                }
            }
            TransformEdit::Scale(text) => {
                out.patch.ui_scale = Some(text.clone());
                match parse3(TransformField::Scale, text) {
                    Ok([x, y, z]) => {
                        let scale = Vec3::new(x, y, z);
                        out.patch.scale = Some(scale);
                        out.handle_update = Some(HandleUpdate::Transform {
                            translation: None,
                            rotation: None,
                            scale: Some(scale),
                        });
                    }
                    Err(e) => out.error = Some(e),
                }
            }
            TransformEdit::Epsg(code) => {
                let reexpressed = Crs::from_code(code).and_then(|crs| {
                    let p = crs.inverse(current.translation)?;
                    Ok((crs, p))
                });
                match reexpressed {
                    Ok((crs, p)) => {
                        out.patch.ui_epsg = Some(crs.code());
                        out.patch.ui_translation = Some(format_position(crs, p));
                    }
                    Err(e) => out.error = Some(e.into()),
                }
            }
        }
        out
    }
}
