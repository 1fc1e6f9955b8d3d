//! Orientation conversion between ECEF quaternions and local heading/pitch/roll.
//!
//! HPR is relative to the East-North-Up frame at an origin on (or above) the
//! ellipsoid. The rotation order matches Cesium's `HeadingPitchRoll`:
//! `q = Rz(-heading) * Ry(-pitch) * Rx(roll)`, so a heading of zero keeps the
//! model x-axis pointing east and positive heading turns clockwise seen from above.
//!
//! Near `pitch = ±90°` heading and roll share an axis and cannot be recovered
//! independently; conversions there are lossy but still produce a valid rotation.

use serde::{Deserialize, Serialize};

use super::{Ecef, Quat, Vec3, ecef_to_geodetic, enu_basis};

/// Origins closer than this to the Earth's center have no usable surface normal.
pub const DEGENERATE_ORIGIN_EPSILON_M: f64 = 1e-6;

/// Heading, pitch and roll in radians.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hpr {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Hpr {
    pub fn new(heading: f64, pitch: f64, roll: f64) -> Self {
        Self {
            heading,
            pitch,
            roll,
        }
    }

    pub fn from_degrees(deg: HprDegrees) -> Self {
        Self::new(
            deg.heading.to_radians(),
            deg.pitch.to_radians(),
            deg.roll.to_radians(),
        )
    }

    pub fn to_degrees(self) -> HprDegrees {
        HprDegrees::new(
            self.heading.to_degrees(),
            self.pitch.to_degrees(),
            self.roll.to_degrees(),
        )
    }

    pub fn is_finite(self) -> bool {
        self.heading.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

/// Heading, pitch and roll in degrees, as exchanged with the UI.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HprDegrees {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl HprDegrees {
    pub fn new(heading: f64, pitch: f64, roll: f64) -> Self {
        Self {
            heading,
            pitch,
            roll,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FrameError {
    /// The origin is at (or numerically at) the Earth's center.
    DegenerateOrigin { magnitude: f64 },
    /// A quaternion with zero length cannot describe a rotation.
    ZeroQuaternion,
    /// Position and target coincide, so there is no viewing direction.
    ZeroDirection,
    NonFinite,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::DegenerateOrigin { magnitude } => {
                write!(f, "local frame undefined at origin (|origin|={magnitude} m)")
            }
            FrameError::ZeroQuaternion => write!(f, "zero-length quaternion"),
            FrameError::ZeroDirection => write!(f, "position and target coincide"),
            FrameError::NonFinite => write!(f, "non-finite orientation input"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Rotation from the local ENU frame at `origin` into ECEF.
pub fn local_to_ecef_rotation(origin: Ecef) -> Result<Quat, FrameError> {
    if !origin.is_finite() {
        return Err(FrameError::NonFinite);
    }
    let magnitude = origin.magnitude();
    if magnitude < DEGENERATE_ORIGIN_EPSILON_M {
        return Err(FrameError::DegenerateOrigin { magnitude });
    }
    let geo = ecef_to_geodetic(origin);
    Quat::from_rotation(&enu_basis(geo)).ok_or(FrameError::NonFinite)
}

pub fn quat_from_hpr(hpr: Hpr) -> Quat {
    let roll = Quat::from_axis_angle(Vec3::X, hpr.roll);
    let pitch = Quat::from_axis_angle(Vec3::Y, -hpr.pitch);
    let heading = Quat::from_axis_angle(Vec3::Z, -hpr.heading);
    heading.mul(pitch.mul(roll))
}

/// Decomposes a unit quaternion into HPR. Heading and roll are in `(-π, π]`.
pub fn hpr_from_quat(q: Quat) -> Hpr {
    let test = 2.0 * (q.w * q.y - q.z * q.x);
    let denominator_roll = 1.0 - 2.0 * (q.x * q.x + q.y * q.y);
    let numerator_roll = 2.0 * (q.w * q.x + q.y * q.z);
    let denominator_heading = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
    let numerator_heading = 2.0 * (q.w * q.z + q.x * q.y);

    Hpr::new(
        -numerator_heading.atan2(denominator_heading),
        -test.clamp(-1.0, 1.0).asin(),
        numerator_roll.atan2(denominator_roll),
    )
}

/// `ecefToLocal ∘ q_ecef`, decomposed into HPR at `origin`.
pub fn orientation_ecef_to_local_hpr(q_ecef: Quat, origin: Ecef) -> Result<Hpr, FrameError> {
    if !q_ecef.is_finite() {
        return Err(FrameError::NonFinite);
    }
    let q_ecef = q_ecef.normalize().ok_or(FrameError::ZeroQuaternion)?;
    let local_to_ecef = local_to_ecef_rotation(origin)?;
    let local = local_to_ecef.conjugate().mul(q_ecef);
    Ok(hpr_from_quat(local))
}

/// `localToEcef ∘ quatFromHpr(hpr)` at `origin`.
pub fn orientation_local_hpr_to_ecef(hpr: Hpr, origin: Ecef) -> Result<Quat, FrameError> {
    if !hpr.is_finite() {
        return Err(FrameError::NonFinite);
    }
    let local_to_ecef = local_to_ecef_rotation(origin)?;
    local_to_ecef
        .mul(quat_from_hpr(hpr))
        .normalize()
        .ok_or(FrameError::ZeroQuaternion)
}

/// Heading and pitch (roll zero) that turn the local x-axis at `position` towards `target`.
pub fn look_at_hpr(position: Ecef, target: Ecef) -> Result<Hpr, FrameError> {
    if !position.is_finite() || !target.is_finite() {
        return Err(FrameError::NonFinite);
    }
    let magnitude = position.magnitude();
    if magnitude < DEGENERATE_ORIGIN_EPSILON_M {
        return Err(FrameError::DegenerateOrigin { magnitude });
    }
    let dir = (target.to_vec3() - position.to_vec3())
        .normalize()
        .ok_or(FrameError::ZeroDirection)?;
    let local = enu_basis(ecef_to_geodetic(position)).transpose().mul_vec(dir);
    Ok(Hpr::new(
        (-local.y).atan2(local.x),
        local.z.clamp(-1.0, 1.0).asin(),
        0.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        FrameError, Hpr, HprDegrees, look_at_hpr, orientation_ecef_to_local_hpr,
        orientation_local_hpr_to_ecef, quat_from_hpr,
    };
    use crate::math::{Ecef, Geodetic, Quat, Vec3, enu_basis, geodetic_to_ecef};

    fn angle_diff_deg(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    fn assert_hpr_close(a: HprDegrees, b: HprDegrees, eps: f64) {
        let dh = angle_diff_deg(a.heading, b.heading);
        let dp = (a.pitch - b.pitch).abs();
        let dr = angle_diff_deg(a.roll, b.roll);
        assert!(
            dh <= eps && dp <= eps && dr <= eps,
            "expected {a:?} ~= {b:?} (dh={dh} dp={dp} dr={dr})"
        );
    }

    #[test]
    fn hpr_round_trip_across_origins() {
        let origins = [
            geodetic_to_ecef(Geodetic::from_degrees(46.95, 7.44, 540.0)),
            geodetic_to_ecef(Geodetic::from_degrees(-33.86, 151.21, 0.0)),
            geodetic_to_ecef(Geodetic::from_degrees(89.9, -45.0, 10.0)),
            geodetic_to_ecef(Geodetic::from_degrees(0.0, 180.0, -20.0)),
            Ecef::new(0.0, 0.0, 6_356_752.0),
            Ecef::new(1.0, 2.0, 3.0),
        ];
        let angles = [
            HprDegrees::new(0.0, 0.0, 0.0),
            HprDegrees::new(45.0, 10.0, -5.0),
            HprDegrees::new(-170.0, -88.5, 120.0),
            HprDegrees::new(179.5, 88.9, -179.0),
            HprDegrees::new(90.0, -45.0, 60.0),
        ];

        for origin in origins {
            for hpr in angles {
                let q = orientation_local_hpr_to_ecef(Hpr::from_degrees(hpr), origin).unwrap();
                let back = orientation_ecef_to_local_hpr(q, origin).unwrap().to_degrees();
                assert_hpr_close(back, hpr, 1e-4);
            }
        }
    }

    #[test]
    fn zero_hpr_is_the_enu_frame() {
        let geo = Geodetic::from_degrees(30.0, 60.0, 0.0);
        let origin = geodetic_to_ecef(geo);
        let q = orientation_local_hpr_to_ecef(Hpr::default(), origin).unwrap();
        let east = enu_basis(geo).column(0);
        assert!((q.rotate(Vec3::X) - east).length() < 1e-12);
    }

    #[test]
    fn degenerate_origin_is_reported() {
        let err = orientation_ecef_to_local_hpr(Quat::IDENTITY, Ecef::new(0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, FrameError::DegenerateOrigin { .. }));
        assert!(orientation_local_hpr_to_ecef(Hpr::default(), Ecef::new(1e-9, 0.0, 0.0)).is_err());
    }

    #[test]
    fn zero_quaternion_is_reported() {
        let origin = Ecef::new(6_378_137.0, 0.0, 0.0);
        let err = orientation_ecef_to_local_hpr(Quat::new(0.0, 0.0, 0.0, 0.0), origin).unwrap_err();
        assert_eq!(err, FrameError::ZeroQuaternion);
    }

    #[test]
    fn gimbal_region_still_yields_the_same_rotation() {
        let origin = geodetic_to_ecef(Geodetic::from_degrees(10.0, 20.0, 0.0));
        let q = orientation_local_hpr_to_ecef(
            Hpr::from_degrees(HprDegrees::new(30.0, 90.0, 15.0)),
            origin,
        )
        .unwrap();
        let hpr = orientation_ecef_to_local_hpr(q, origin).unwrap();
        let q_back = orientation_local_hpr_to_ecef(hpr, origin).unwrap();
        assert!(q.same_rotation(q_back, 1e-9));
    }

    #[test]
    fn look_at_points_the_x_axis_at_the_target() {
        let geo = Geodetic::from_degrees(46.0, 8.0, 500.0);
        let position = geodetic_to_ecef(geo);
        let target = geodetic_to_ecef(Geodetic::from_degrees(46.01, 8.02, 200.0));
        let hpr = look_at_hpr(position, target).unwrap();
        assert_eq!(hpr.roll, 0.0);

        let local_forward = quat_from_hpr(hpr).rotate(Vec3::X);
        let ecef_forward = enu_basis(geo).mul_vec(local_forward);
        let expected = (target.to_vec3() - position.to_vec3()).normalize().unwrap();
        assert!((ecef_forward - expected).length() < 1e-9);
        assert_eq!(look_at_hpr(position, position), Err(FrameError::ZeroDirection));
    }
}
