//! Fixed-point and toroidal grid math for deterministic simulation.
//!
//! Unit speeds and movement progress use fixed-point arithmetic so that
//! every peer computes bit-identical results. Floating-point operations
//! can produce different results on different CPUs.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-written fixed-point values in data files.
///
/// Data files write speeds as decimal numbers (`walk_speed: 0.25`); they
/// are converted once at load time and never touch the simulation as floats.
pub mod fixed_decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a decimal number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize from a decimal number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(Fixed::from_num(value))
    }
}

/// Shortest signed offset from `from` to `to` on a ring of `size` cells.
///
/// Ties (exactly half the ring away) resolve to the positive direction.
#[must_use]
pub fn wrapped_delta(from: i32, to: i32, size: i32) -> i32 {
    debug_assert!(size > 0);
    let mut d = (to - from).rem_euclid(size);
    if d > size / 2 {
        d -= size;
    }
    d
}

/// Chebyshev distance between two cells of a torus.
#[must_use]
pub fn torus_distance(ax: i32, ay: i32, bx: i32, by: i32, w: i32, h: i32) -> i32 {
    let dx = wrapped_delta(ax, bx, w).abs();
    let dy = wrapped_delta(ay, by, h).abs();
    dx.max(dy)
}

/// Squared euclidean distance between two cells of a torus.
#[must_use]
pub fn torus_distance_squared(ax: i32, ay: i32, bx: i32, by: i32, w: i32, h: i32) -> i32 {
    let dx = wrapped_delta(ax, bx, w);
    let dy = wrapped_delta(ay, by, h);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_wrapped_delta_takes_short_way() {
        assert_eq!(wrapped_delta(1, 3, 64), 2);
        assert_eq!(wrapped_delta(1, 63, 64), -2);
        assert_eq!(wrapped_delta(62, 1, 64), 3);
        assert_eq!(wrapped_delta(5, 5, 64), 0);
        assert_eq!(wrapped_delta(0, 32, 64), 32);
    }

    #[test]
    fn test_torus_distance() {
        assert_eq!(torus_distance(0, 0, 63, 63, 64, 64), 1);
        assert_eq!(torus_distance(10, 10, 14, 12, 64, 64), 4);
        assert_eq!(torus_distance_squared(0, 0, 63, 2, 64, 64), 5);
    }

    #[test]
    fn test_fixed_accumulates_exactly() {
        let speed = Fixed::from_num(1) / Fixed::from_num(4);
        let mut delta = Fixed::ZERO;
        for _ in 0..4 {
            delta += speed;
        }
        assert_eq!(delta, Fixed::ONE);
    }
}
