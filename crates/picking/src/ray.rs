use foundation::math::{Ecef, Ellipsoid, Vec3};

/// Half-line in ECEF. `direction` is unit length.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Ecef,
    pub direction: Vec3,
}

impl Ray {
    /// `None` for a zero or non-finite direction.
    pub fn new(origin: Ecef, direction: Vec3) -> Option<Self> {
        let direction = direction.normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f64) -> Ecef {
        Ecef::from(self.origin.to_vec3() + self.direction.scale(t))
    }
}

/// Nearest forward intersection of `ray` with `ellipsoid` (centered at the
/// ECEF origin, radii a, a, b).
pub fn intersect_ellipsoid(ray: &Ray, ellipsoid: Ellipsoid) -> Option<Ecef> {
    let inv_a2 = 1.0 / (ellipsoid.a * ellipsoid.a);
    let inv_b2 = 1.0 / (ellipsoid.b() * ellipsoid.b());
    let o = ray.origin;
    let d = ray.direction;

    let qa = (d.x * d.x + d.y * d.y) * inv_a2 + d.z * d.z * inv_b2;
    if qa.abs() < 1e-18 {
        return None;
    }
    let qb = 2.0 * ((o.x * d.x + o.y * d.y) * inv_a2 + o.z * d.z * inv_b2);
    let qc = (o.x * o.x + o.y * o.y) * inv_a2 + o.z * o.z * inv_b2 - 1.0;

    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return None;
    }
    let sdisc = disc.sqrt();
    let t0 = (-qb - sdisc) / (2.0 * qa);
    let t1 = (-qb + sdisc) / (2.0 * qa);

    // Nearest positive hit; an origin inside the ellipsoid hits from within.
    let t = if t0 > 0.0 {
        t0
    } else if t1 > 0.0 {
        t1
    } else {
        return None;
    };
    let hit = ray.at(t);
    hit.is_finite().then_some(hit)
}

/// Source of picking rays.
pub trait Camera: Send + Sync {
    fn position(&self) -> Ecef;

    /// Ray through the pixel at `(x, y)` (origin top-left). `None` when the
    /// pixel is outside the viewport.
    fn ray_from_pixel(&self, x: f64, y: f64) -> Option<Ray>;
}

/// Pinhole camera with a vertical field of view.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Ecef,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f64,
    pub width: f64,
    pub height: f64,
}

impl PerspectiveCamera {
    pub const DEFAULT_FOV_Y_DEG: f64 = 45.0;

    /// Camera at `position` looking at `target`, with the local vertical as up.
    /// Looking straight along the vertical falls back to +Z, or +X when the
    /// view is along the Z axis.
    pub fn looking_at(position: Ecef, target: Ecef, width: f64, height: f64) -> Option<Self> {
        let forward = (target.to_vec3() - position.to_vec3()).normalize()?;
        let radial = position.to_vec3().normalize().unwrap_or(Vec3::Z);
        let up = [radial, Vec3::Z, Vec3::X]
            .into_iter()
            .find(|candidate| forward.cross(*candidate).length() >= 1e-9)?;
        Some(Self {
            position,
            forward,
            up,
            fov_y_rad: Self::DEFAULT_FOV_Y_DEG.to_radians(),
            width,
            height,
        })
    }
}

impl Camera for PerspectiveCamera {
    fn position(&self) -> Ecef {
        self.position
    }

    fn ray_from_pixel(&self, x: f64, y: f64) -> Option<Ray> {
        if self.width <= 1.0 || self.height <= 1.0 {
            return None;
        }
        if !(0.0..=self.width).contains(&x) || !(0.0..=self.height).contains(&y) {
            return None;
        }
        let aspect = self.width / self.height;
        let tan = (0.5 * self.fov_y_rad).tan();

        let right = self.forward.cross(self.up).normalize()?;
        let up = right.cross(self.forward);

        let ndc_x = (2.0 * (x / self.width) - 1.0) * aspect;
        let ndc_y = 1.0 - 2.0 * (y / self.height);
        let dir = self.forward + right.scale(ndc_x * tan) + up.scale(ndc_y * tan);
        Ray::new(self.position, dir)
    }
}
