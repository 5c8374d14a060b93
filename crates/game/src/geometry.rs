use glam::Vec2;

/// Side length of the square, toroidal playfield.
pub const WORLD_SIZE: f32 = 800.0;

pub const WORLD_CENTER: Vec2 = Vec2::new(WORLD_SIZE / 2.0, WORLD_SIZE / 2.0);

/// Unit vector for a heading in radians, where 0 points up the screen and
/// angles grow clockwise.
#[inline]
pub fn heading(direction: f32) -> Vec2 {
    let (sin, cos) = direction.sin_cos();
    Vec2::new(sin, -cos)
}

/// Wraps a position back onto the playfield.
#[inline]
pub fn wrap(position: Vec2) -> Vec2 {
    Vec2::new(
        position.x.rem_euclid(WORLD_SIZE),
        position.y.rem_euclid(WORLD_SIZE),
    )
}

pub fn normalize_angle(angle: f32) -> f32 {
    angle.rem_euclid(std::f32::consts::TAU)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarCoordinate {
    pub angle: f32,
    pub radius: f32,
}

impl PolarCoordinate {
    pub fn new(angle: f32, radius: f32) -> Self {
        Self { angle, radius }
    }

    /// Cartesian offset of this coordinate relative to a heading.
    pub fn offset_from(&self, direction: f32) -> Vec2 {
        heading(direction + self.angle) * self.radius
    }
}

#[inline]
pub fn to_array(v: Vec2) -> [f32; 2] {
    [v.x, v.y]
}

#[inline]
pub fn from_array(a: [f32; 2]) -> Vec2 {
    Vec2::new(a[0], a[1])
}
