//! Physical constants.

/// Mean Earth radius (m)
pub const EARTH_RADIUS_M: f64 = 6_371_008.7714;

/// Standard gravity (m s⁻²)
pub const GRAVITY: f64 = 9.80665;

/// Earth's angular velocity (rad s⁻¹)
pub const OMEGA: f64 = 7.292e-5;

/// Rd / cp for dry air
pub const KAPPA: f64 = 0.2857;

/// Reference pressure for potential temperature (hPa)
pub const P0_HPA: f64 = 1000.0;

/// Rd / Rv
pub const EPSILON: f64 = 0.622;

pub const ZERO_CELSIUS: f64 = 273.15;

/// Pressure level of the equivalent potential temperature maps (hPa)
pub const THETAE_LEVEL_HPA: f64 = 850.0;

/// Band around zero treated as noise in accumulated differences
pub const INCREMENT_NOISE: f32 = 0.5;
