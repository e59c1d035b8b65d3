use std::fmt;

/// Converts a tolerance given in parts per million into daltons at `mass`.
///
/// ```
/// use mass_dawg::dawg::ppm_to_da;
///
/// assert!((ppm_to_da(1000.0, 10) - 0.01).abs() < 1e-12);
/// ```
#[inline]
pub fn ppm_to_da(mass: f64, ppm: u32) -> f64 {
    (f64::from(ppm) / 1_000_000.0) * mass
}

/// Largest mass magnitude that [`MassPair::quantize`] maps to a distinct
/// bucket under `epsilon`.
///
/// Beyond `2^53` buckets the grid is coarser than one bucket per `epsilon`,
/// and the integer cast would eventually saturate.
#[inline]
pub(crate) fn max_keyable_mass(epsilon: f64) -> f64 {
    epsilon * (1u64 << f64::MANTISSA_DIGITS) as f64
}

/// The singly and doubly charged mass of one fragment ion.
///
/// Every edge in the graph is labeled with one of these. Equality during
/// construction is approximate (see [`MassPair::approx_eq`]); hashing goes
/// through [`MassPair::quantize`] so that floats never have to implement
/// `Eq` or `Hash` themselves.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassPair {
    /// Mass assuming a singly charged fragment.
    pub singly: f64,
    /// Mass assuming a doubly charged fragment.
    pub doubly: f64,
}

impl MassPair {
    /// Creates a new mass pair.
    #[inline]
    pub fn new(singly: f64, doubly: f64) -> Self {
        MassPair { singly, doubly }
    }

    /// True if both masses are within `epsilon` of the other pair's masses.
    #[inline]
    pub fn approx_eq(&self, other: &MassPair, epsilon: f64) -> bool {
        (self.singly - other.singly).abs() <= epsilon
            && (self.doubly - other.doubly).abs() <= epsilon
    }

    /// Buckets both masses onto an integer grid with step `epsilon`.
    ///
    /// Ordering of the buckets follows the ordering of the masses, so sorting
    /// quantized pairs sorts by singly mass, then doubly mass. Masses in one
    /// bucket are always within `epsilon` of each other, but two masses
    /// within `epsilon` may straddle a bucket boundary and get different
    /// buckets. Nodes keyed this way are then simply not merged.
    ///
    /// Exact only for masses up to `max_keyable_mass(epsilon)` in magnitude.
    #[inline]
    pub(crate) fn quantize(&self, epsilon: f64) -> (i64, i64) {
        (
            (self.singly / epsilon).round() as i64,
            (self.doubly / epsilon).round() as i64,
        )
    }

    /// The tolerance window around the singly charged mass.
    #[inline]
    pub fn singly_window(&self, ppm: u32) -> MassWindow {
        MassWindow::around(self.singly, ppm)
    }

    /// The tolerance window around the doubly charged mass.
    #[inline]
    pub fn doubly_window(&self, ppm: u32) -> MassWindow {
        MassWindow::around(self.doubly, ppm)
    }
}

impl From<(f64, f64)> for MassPair {
    fn from((singly, doubly): (f64, f64)) -> Self {
        MassPair::new(singly, doubly)
    }
}

impl fmt::Display for MassPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{singly: {}, doubly: {}}}", self.singly, self.doubly)
    }
}

/// A closed interval `[lower, upper]` of accepted masses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassWindow {
    /// Smallest accepted mass.
    pub lower: f64,
    /// Largest accepted mass.
    pub upper: f64,
}

impl MassWindow {
    /// The window `mass ± ppm_to_da(mass, ppm)`.
    #[inline]
    pub fn around(mass: f64, ppm: u32) -> Self {
        let tol = ppm_to_da(mass, ppm);
        MassWindow {
            lower: mass - tol,
            upper: mass + tol,
        }
    }

    /// True if `value` lies inside the window. Both bounds are inclusive.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ppm_scales_with_mass() {
        assert!((ppm_to_da(500.0, 20) - 0.01).abs() < 1e-12);
        assert_eq!(ppm_to_da(500.0, 0), 0.0);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mass = 1000.0;
        let window = MassWindow::around(mass, 10);
        let tol = ppm_to_da(mass, 10);
        assert!(window.contains(mass + tol));
        assert!(window.contains(mass - tol));
        assert!(!window.contains(mass + tol + 1e-6));
        assert!(!window.contains(mass - tol - 1e-6));
    }

    #[test]
    fn zero_ppm_accepts_only_the_mass_itself() {
        let window = MassWindow::around(321.5, 0);
        assert!(window.contains(321.5));
        assert!(!window.contains(321.500_000_1));
    }

    #[test]
    fn approx_eq_uses_both_masses() {
        let a = MassPair::new(100.1, 50.55);
        assert!(a.approx_eq(&MassPair::new(100.100_05, 50.55), 1e-4));
        assert!(!a.approx_eq(&MassPair::new(100.1, 50.56), 1e-4));
    }

    #[test]
    fn keyable_range_scales_with_epsilon() {
        assert!(max_keyable_mass(1e-4) > 1e11);
        assert!(max_keyable_mass(1e-300) < 1e-280);
        let big = max_keyable_mass(1e-4);
        let (a, _) = MassPair::new(big, 0.0).quantize(1e-4);
        let (b, _) = MassPair::new(big - 1e-3, 0.0).quantize(1e-4);
        assert!(a > b);
    }

    #[test]
    fn quantize_buckets_close_masses_together() {
        let a = MassPair::new(200.2, 100.1);
        let b = MassPair::new(200.200_001, 100.100_001);
        assert_eq!(a.quantize(1e-4), b.quantize(1e-4));
        assert!(a.quantize(1e-4) < MassPair::new(200.3, 0.0).quantize(1e-4));
    }

    #[test]
    fn display_matches_dump_format() {
        assert_eq!(
            MassPair::new(100.5, 50.75).to_string(),
            "{singly: 100.5, doubly: 50.75}"
        );
    }
}
