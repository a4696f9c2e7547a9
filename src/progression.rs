//! Level progression derived from accumulated lightning.

/// Lightning required to hold each level, indexed by level (0..=9).
pub const LEVEL_THRESHOLDS: [i32; 10] = [0, 0, 300, 800, 1500, 3000, 5000, 8000, 15000, 30000];

/// Highest level whose threshold the given lightning total meets.
///
/// Monotonic in `lightning`: since lightning only ever accumulates, the
/// derived level never decreases across calls.
pub fn level_for_lightning(lightning: i32) -> i32 {
    let mut level = 0;
    for (candidate, &threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
        if lightning >= threshold {
            level = candidate as i32;
        } else {
            break;
        }
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_lightning_is_level_one() {
        // Levels 0 and 1 share a zero threshold, so every account
        // qualifies for level 1 immediately.
        assert_eq!(level_for_lightning(0), 1);
    }

    #[test]
    fn test_exact_thresholds() {
        assert_eq!(level_for_lightning(300), 2);
        assert_eq!(level_for_lightning(800), 3);
        assert_eq!(level_for_lightning(1500), 4);
        assert_eq!(level_for_lightning(3000), 5);
        assert_eq!(level_for_lightning(5000), 6);
        assert_eq!(level_for_lightning(8000), 7);
        assert_eq!(level_for_lightning(15000), 8);
        assert_eq!(level_for_lightning(30000), 9);
    }

    #[test]
    fn test_below_threshold_stays_down() {
        assert_eq!(level_for_lightning(299), 1);
        assert_eq!(level_for_lightning(799), 2);
        assert_eq!(level_for_lightning(29999), 8);
    }

    #[test]
    fn test_cap_at_level_nine() {
        assert_eq!(level_for_lightning(30001), 9);
        assert_eq!(level_for_lightning(i32::MAX), 9);
    }

    #[test]
    fn test_monotonic_over_range() {
        let mut previous = level_for_lightning(0);
        for lightning in (0..35_000).step_by(7) {
            let level = level_for_lightning(lightning);
            assert!(level >= previous, "level dropped at lightning={}", lightning);
            previous = level;
        }
    }
}
