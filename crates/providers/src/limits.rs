//! Result-count limit parsing and clamping.

/// Inclusive bounds plus the value used when no usable limit was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBounds {
    pub min: u32,
    pub max: u32,
    pub fallback: u32,
}

/// Bounds applied to provider activity listings.
pub const ACTIVITY_LIMITS: LimitBounds = LimitBounds::new(1, 200, 10);

impl LimitBounds {
    pub const fn new(min: u32, max: u32, fallback: u32) -> Self {
        Self { min, max, fallback }
    }

    /// Same bounds with a different fallback.
    pub const fn with_fallback(self, fallback: u32) -> Self {
        Self { fallback, ..self }
    }

    /// Clamp `value` into `[min, max]`, using the fallback when absent.
    ///
    /// The fallback is clamped too, so the result is always in range.
    pub fn resolve(&self, value: Option<i64>) -> u32 {
        let (min, max) = (i64::from(self.min), i64::from(self.max.max(self.min)));
        let value = value.unwrap_or(i64::from(self.fallback));
        value.clamp(min, max) as u32
    }
}

/// Parse a raw limit the way query strings and env vars deliver it.
///
/// Any finite number is accepted and truncated toward zero; anything else
/// (empty, non-numeric, `inf`, `NaN`) yields `None`.
pub fn parse_limit(raw: &str) -> Option<i64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_clamps() {
        let bounds = LimitBounds::new(1, 50, 5);
        assert_eq!(bounds.resolve(Some(0)), 1);
        assert_eq!(bounds.resolve(Some(-12)), 1);
        assert_eq!(bounds.resolve(Some(20)), 20);
        assert_eq!(bounds.resolve(Some(51)), 50);
        assert_eq!(bounds.resolve(Some(i64::MAX)), 50);
        assert_eq!(bounds.resolve(None), 5);
    }

    #[test]
    fn test_resolve_always_in_bounds() {
        for (min, max, fallback) in [(1, 50, 5), (1, 200, 10), (3, 7, 100), (10, 20, 0)] {
            let bounds = LimitBounds::new(min, max, fallback);
            for value in [None, Some(i64::MIN), Some(-1), Some(0), Some(6), Some(199), Some(i64::MAX)] {
                let resolved = bounds.resolve(value);
                assert!(
                    resolved >= min && resolved <= max,
                    "{resolved} outside [{min}, {max}] for {value:?}"
                );
            }
        }
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("15"), Some(15));
        assert_eq!(parse_limit(" 12.9 "), Some(12));
        assert_eq!(parse_limit("-3"), Some(-3));
        assert_eq!(parse_limit("abc"), None);
        assert_eq!(parse_limit(""), None);
        assert_eq!(parse_limit("inf"), None);
        assert_eq!(parse_limit("NaN"), None);
    }

    #[test]
    fn test_non_numeric_yields_fallback() {
        assert_eq!(ACTIVITY_LIMITS.resolve(parse_limit("lots")), 10);
        assert_eq!(ACTIVITY_LIMITS.resolve(parse_limit("500")), 200);
    }
}
