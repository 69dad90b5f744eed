// Linear domain -> range mapping used for volume and playback-rate normalisation

/// A linear map from `[domain.0, domain.1]` onto `[range.0, range.1]`.
///
/// With `clamp` set the input is saturated to the domain first, so the output
/// never leaves the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
    clamp: bool,
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64), clamp: bool) -> Self {
        LinearScale { domain, range, clamp }
    }

    /// Identity map over `[lo, hi]`, clamped.
    pub fn clamped_identity(lo: f64, hi: f64) -> Self {
        Self::new((lo, hi), (lo, hi), true)
    }

    pub fn apply(&self, input: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;

        // Degenerate domain maps everything to the middle of the range
        let mut t = if d1 == d0 { 0.5 } else { (input - d0) / (d1 - d0) };
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }

        r0 + t * (r1 - r0)
    }

    /// Same scale with a new output range.
    pub fn with_range(self, range: (f64, f64)) -> Self {
        LinearScale { range, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_clamps_to_bounds() {
        let rate = LinearScale::clamped_identity(0.75, 2.0);
        assert_eq!(rate.apply(1.25), 1.25);
        assert_eq!(rate.apply(0.1), 0.75);
        assert_eq!(rate.apply(9.0), 2.0);
    }

    #[test]
    fn rescales_into_wider_range() {
        let volume = LinearScale::new((0.0, 1.0), (0.0, 100.0), true);
        assert_eq!(volume.apply(0.5), 50.0);
        assert_eq!(volume.apply(-1.0), 0.0);
        assert_eq!(volume.apply(2.0), 100.0);
    }

    #[test]
    fn unclamped_extrapolates() {
        let scale = LinearScale::new((0.0, 1.0), (0.0, 10.0), false);
        assert_eq!(scale.apply(2.0), 20.0);
    }

    #[test]
    fn with_range_keeps_domain() {
        let volume = LinearScale::new((0.0, 1.0), (0.0, 100.0), true).with_range((0.0, 40.0));
        assert_eq!(volume.apply(1.0), 40.0);
        assert_eq!(volume.apply(0.5), 20.0);
    }

    #[test]
    fn zero_width_domain_returns_midpoint() {
        let scale = LinearScale::new((1.0, 1.0), (0.0, 100.0), true);
        assert_eq!(scale.apply(7.0), 50.0);
    }
}
