//! Catalog of named coordinate reference systems and conversion to/from ECEF.
//!
//! Conventions:
//! - `project_forward(code, p)` converts CRS coordinates into ECEF meters.
//! - `project_inverse(code, p)` converts ECEF meters into CRS coordinates.
//! - Geographic systems use `[lon_deg, lat_deg, ellipsoidal_height_m]`.
//! - Projected systems use `[easting_m, northing_m, ellipsoidal_height_m]`; the
//!   height is relative to the datum ellipsoid of the system.

use super::somerc::{SwissObliqueMercator, ch1903_to_wgs84_ecef, wgs84_ecef_to_ch1903};
use super::tmerc::TransverseMercator;
use super::{Ecef, Geodetic, WGS84_A, ecef_to_geodetic, geodetic_to_ecef};

/// Largest latitude representable in Web Mercator (degrees).
pub const WEB_MERCATOR_MAX_LAT_DEG: f64 = 85.051_128_779_806_59;

/// UTM is only evaluated within this many degrees of the zone's central meridian.
const UTM_MAX_DLON_DEG: f64 = 60.0;

/// Swiss grids are only evaluated within this many degrees of Bern.
const SWISS_MAX_DLON_DEG: f64 = 60.0;

/// Projected input must map back onto itself within this distance (meters).
const REPROJECTION_TOLERANCE_M: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The code parsed but is not in the catalog.
    UnknownCrs(String),
    /// The code is not of the form `EPSG:nnnn`.
    InvalidCode(String),
    NonFiniteInput,
    OutOfDomain(String),
    NonFiniteResult,
}

impl std::fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionError::UnknownCrs(code) => write!(f, "unknown coordinate system: {code}"),
            ProjectionError::InvalidCode(code) => write!(f, "invalid EPSG code: {code:?}"),
            ProjectionError::NonFiniteInput => write!(f, "coordinate is not finite"),
            ProjectionError::OutOfDomain(msg) => write!(f, "coordinate out of domain: {msg}"),
            ProjectionError::NonFiniteResult => write!(f, "conversion produced a non-finite value"),
        }
    }
}

impl std::error::Error for ProjectionError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// EPSG:4978.
    Ecef,
    /// EPSG:4326 and EPSG:4979 (lon/lat/height on WGS84).
    Geographic { code: u32 },
    /// EPSG:3857.
    WebMercator,
    /// EPSG:326zz (north) / EPSG:327zz (south).
    Utm { zone: u8, north: bool },
    /// EPSG:2056.
    Lv95,
    /// EPSG:21781.
    Lv03,
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsInfo {
    pub code: String,
    pub name: String,
}

impl Crs {
    /// Parses `EPSG:nnnn` (case-insensitive) or a bare `nnnn`.
    pub fn from_code(code: &str) -> Result<Self, ProjectionError> {
        let trimmed = code.trim();
        let digits = match trimmed.split_once(':') {
            Some((authority, digits)) if authority.eq_ignore_ascii_case("epsg") => digits,
            Some(_) => return Err(ProjectionError::InvalidCode(code.to_string())),
            None => trimmed,
        };
        let n: u32 = digits
            .trim()
            .parse()
            .map_err(|_| ProjectionError::InvalidCode(code.to_string()))?;
        Self::from_epsg(n).ok_or_else(|| ProjectionError::UnknownCrs(format!("EPSG:{n}")))
    }

    pub fn from_epsg(n: u32) -> Option<Self> {
        match n {
            4978 => Some(Crs::Ecef),
            4326 | 4979 => Some(Crs::Geographic { code: n }),
            3857 => Some(Crs::WebMercator),
            32601..=32660 => Some(Crs::Utm {
                zone: (n - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Crs::Utm {
                zone: (n - 32700) as u8,
                north: false,
            }),
            2056 => Some(Crs::Lv95),
            21781 => Some(Crs::Lv03),
            _ => None,
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Ecef => 4978,
            Crs::Geographic { code } => *code,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, north: true } => 32600 + u32::from(*zone),
            Crs::Utm { zone, north: false } => 32700 + u32::from(*zone),
            Crs::Lv95 => 2056,
            Crs::Lv03 => 21781,
        }
    }

    pub fn code(&self) -> String {
        format!("EPSG:{}", self.epsg())
    }

    pub fn name(&self) -> String {
        match self {
            Crs::Ecef => "WGS 84 (geocentric)".to_string(),
            Crs::Geographic { code: 4326 } => "WGS 84".to_string(),
            Crs::Geographic { .. } => "WGS 84 (3D)".to_string(),
            Crs::WebMercator => "WGS 84 / Pseudo-Mercator".to_string(),
            Crs::Utm { zone, north } => {
                format!("WGS 84 / UTM zone {zone}{}", if *north { "N" } else { "S" })
            }
            Crs::Lv95 => "CH1903+ / LV95".to_string(),
            Crs::Lv03 => "CH1903 / LV03".to_string(),
        }
    }

    /// True for systems whose first two axes are angles in degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic { .. })
    }

    /// CRS coordinates to ECEF.
    pub fn forward(&self, p: [f64; 3]) -> Result<Ecef, ProjectionError> {
        if p.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFiniteInput);
        }
        let [x, y, z] = p;
        let ecef = match self {
            Crs::Ecef => Ecef::new(x, y, z),
            Crs::Geographic { .. } => {
                check_lon_lat(x, y)?;
                geodetic_to_ecef(Geodetic::from_degrees(y, x, z))
            }
            Crs::WebMercator => {
                let limit = std::f64::consts::PI * WGS84_A;
                if x.abs() > limit * (1.0 + 1e-12) {
                    return Err(ProjectionError::OutOfDomain(format!(
                        "web mercator x={x} beyond ±{limit}"
                    )));
                }
                if y.abs() > limit {
                    return Err(ProjectionError::OutOfDomain(format!(
                        "web mercator y={y} beyond ±{limit}"
                    )));
                }
                let lon = x / WGS84_A;
                let lat = 2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2;
                if lat.to_degrees().abs() > WEB_MERCATOR_MAX_LAT_DEG {
                    return Err(ProjectionError::OutOfDomain(format!(
                        "latitude {} beyond web mercator limit",
                        lat.to_degrees()
                    )));
                }
                geodetic_to_ecef(Geodetic::new(lat, lon, z))
            }
            Crs::Utm { zone, north } => {
                let tm = TransverseMercator::utm(*zone, *north);
                let (lat, lon) = tm.inverse(x, y);
                check_recovered(lat, lon, tm.lon0_rad, UTM_MAX_DLON_DEG)?;
                check_reprojection((x, y), tm.forward(lat, lon))?;
                geodetic_to_ecef(Geodetic::new(lat, lon, z))
            }
            Crs::Lv95 | Crs::Lv03 => {
                let swiss = self.swiss();
                let (lat, lon) = swiss.inverse(x, y).ok_or(ProjectionError::NonFiniteResult)?;
                check_recovered(lat, lon, swiss.lon0_rad(), SWISS_MAX_DLON_DEG)?;
                check_reprojection((x, y), swiss.forward(lat, lon))?;
                ch1903_to_wgs84_ecef(Geodetic::new(lat, lon, z))
            }
        };
        if ecef.is_finite() {
            Ok(ecef)
        } else {
            Err(ProjectionError::NonFiniteResult)
        }
    }

    /// ECEF to CRS coordinates.
    pub fn inverse(&self, ecef: Ecef) -> Result<[f64; 3], ProjectionError> {
        if !ecef.is_finite() {
            return Err(ProjectionError::NonFiniteInput);
        }
        let out = match self {
            Crs::Ecef => ecef.as_array(),
            Crs::Geographic { .. } => {
                let geo = checked_geodetic(ecef)?;
                [geo.lon_rad.to_degrees(), geo.lat_rad.to_degrees(), geo.alt_m]
            }
            Crs::WebMercator => {
                let geo = checked_geodetic(ecef)?;
                if geo.lat_rad.to_degrees().abs() > WEB_MERCATOR_MAX_LAT_DEG {
                    return Err(ProjectionError::OutOfDomain(format!(
                        "latitude {} beyond web mercator limit",
                        geo.lat_rad.to_degrees()
                    )));
                }
                let y = WGS84_A
                    * (std::f64::consts::FRAC_PI_4 + geo.lat_rad / 2.0)
                        .tan()
                        .ln();
                [WGS84_A * geo.lon_rad, y, geo.alt_m]
            }
            Crs::Utm { zone, north } => {
                let geo = checked_geodetic(ecef)?;
                let tm = TransverseMercator::utm(*zone, *north);
                let dlon = wrap_angle(geo.lon_rad - tm.lon0_rad).to_degrees();
                if dlon.abs() > UTM_MAX_DLON_DEG {
                    return Err(ProjectionError::OutOfDomain(format!(
                        "longitude {dlon}° from the central meridian of zone {zone}"
                    )));
                }
                let (e, n) = tm.forward(geo.lat_rad, tm.lon0_rad + dlon.to_radians());
                [e, n, geo.alt_m]
            }
            Crs::Lv95 | Crs::Lv03 => {
                if ecef.magnitude() < 1.0 {
                    return Err(ProjectionError::OutOfDomain(
                        "point at the Earth's center".to_string(),
                    ));
                }
                let geo = wgs84_ecef_to_ch1903(ecef);
                let (e, n) = self.swiss().forward(geo.lat_rad, geo.lon_rad);
                [e, n, geo.alt_m]
            }
        };
        if out.iter().all(|v| v.is_finite()) {
            Ok(out)
        } else {
            Err(ProjectionError::NonFiniteResult)
        }
    }

    fn swiss(&self) -> SwissObliqueMercator {
        match self {
            Crs::Lv03 => SwissObliqueMercator::lv03(),
            _ => SwissObliqueMercator::lv95(),
        }
    }
}

fn check_lon_lat(lon_deg: f64, lat_deg: f64) -> Result<(), ProjectionError> {
    if lat_deg.abs() > 90.0 {
        return Err(ProjectionError::OutOfDomain(format!(
            "latitude {lat_deg} outside [-90, 90]"
        )));
    }
    if lon_deg.abs() > 180.0 {
        return Err(ProjectionError::OutOfDomain(format!(
            "longitude {lon_deg} outside [-180, 180]"
        )));
    }
    Ok(())
}

/// Latitude/longitude recovered from projected coordinates must lie on the
/// ellipsoid and within `max_dlon_deg` of the central meridian.
fn check_recovered(lat_rad: f64, lon_rad: f64, lon0_rad: f64, max_dlon_deg: f64) -> Result<(), ProjectionError> {
    if !lat_rad.is_finite() || !lon_rad.is_finite() {
        return Err(ProjectionError::NonFiniteResult);
    }
    let lat = lat_rad.to_degrees();
    if lat.abs() > 90.0 {
        return Err(ProjectionError::OutOfDomain(format!("latitude {lat} outside [-90, 90]")));
    }
    let dlon = wrap_angle(lon_rad - lon0_rad).to_degrees();
    if dlon.abs() > max_dlon_deg {
        return Err(ProjectionError::OutOfDomain(format!(
            "longitude {dlon}° from the central meridian"
        )));
    }
    Ok(())
}

/// Rejects coordinates the projection cannot reproduce, e.g. eastings that
/// wrap around the projected cylinder.
fn check_reprojection(input: (f64, f64), reprojected: (f64, f64)) -> Result<(), ProjectionError> {
    let de = (reprojected.0 - input.0).abs();
    let dn = (reprojected.1 - input.1).abs();
    if de.is_finite() && dn.is_finite() && de <= REPROJECTION_TOLERANCE_M && dn <= REPROJECTION_TOLERANCE_M {
        return Ok(());
    }
    Err(ProjectionError::OutOfDomain(format!(
        "({}, {}) lies outside the projected area",
        input.0, input.1
    )))
}

fn checked_geodetic(ecef: Ecef) -> Result<Geodetic, ProjectionError> {
    if ecef.magnitude() < 1.0 {
        return Err(ProjectionError::OutOfDomain(
            "point at the Earth's center".to_string(),
        ));
    }
    Ok(ecef_to_geodetic(ecef))
}

fn wrap_angle(rad: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut a = rad.rem_euclid(two_pi);
    if a > std::f64::consts::PI {
        a -= two_pi;
    }
    a
}

/// All systems in the catalog, in EPSG code order.
pub fn catalog() -> Vec<CrsInfo> {
    let mut codes: Vec<u32> = vec![2056, 3857, 4326, 4978, 4979, 21781];
    codes.extend(32601..=32660);
    codes.extend(32701..=32760);
    codes.sort_unstable();
    codes
        .into_iter()
        .filter_map(Crs::from_epsg)
        .map(|crs| CrsInfo {
            code: crs.code(),
            name: crs.name(),
        })
        .collect()
}

/// Converts `p` from the system named by `code` into ECEF.
pub fn project_forward(code: &str, p: [f64; 3]) -> Result<[f64; 3], ProjectionError> {
    Crs::from_code(code)?.forward(p).map(Ecef::as_array)
}

/// Converts ECEF `p` into the system named by `code`.
pub fn project_inverse(code: &str, p: [f64; 3]) -> Result<[f64; 3], ProjectionError> {
    Crs::from_code(code)?.inverse(Ecef::from_array(p))
}
