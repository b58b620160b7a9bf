// Interval transition model
// Log likelihoods of melodic intervals measured over a corpus of folk tunes

/// Log likelihood assigned to any interval wider than an octave
pub const OUT_OF_RANGE_LIKELIHOOD: f64 = -10.0;

/// Intervals -12..=-1 then 1..=12 semitones
const DESCENDING: [f64; 12] = [
    -4.862729914, // -12
    -6.616962671, // -11
    -5.195117404, // -10
    -4.389511542, // -9
    -4.529393252, // -8
    -3.385424236, // -7
    -5.954093232, // -6
    -2.853697858, // -5
    -2.898438133, // -4
    -2.61756944,  // -3
    -2.462423203, // -2
    -3.598778811, // -1
];

const ASCENDING: [f64; 12] = [
    -3.523344336, // 1
    -2.222813183, // 2
    -2.558428021, // 3
    -2.819645063, // 4
    -2.527086002, // 5
    -5.272730177, // 6
    -3.444736763, // 7
    -4.710698161, // 8
    -4.995631992, // 9
    -5.795059625, // 10
    -7.371974346, // 11
    -5.636881433, // 12
];

/// Log likelihood of moving by `interval` semitones
///
/// Unison is not a transition and has no entry; it scores like any
/// out-of-range interval if asked for.
pub fn interval_likelihood(interval: i32) -> f64 {
    match interval {
        -12..=-1 => DESCENDING[(interval + 12) as usize],
        1..=12 => ASCENDING[(interval - 1) as usize],
        _ => OUT_OF_RANGE_LIKELIHOOD,
    }
}

/// Log likelihood of the transition from pitch `from` to pitch `to`
pub fn transition_likelihood(from: u8, to: u8) -> f64 {
    interval_likelihood(to as i32 - from as i32)
}

/// Stand-in average used while a contour has no changes yet:
/// treated as a single whole-tone step up, the most likely interval
pub fn no_change_likelihood() -> f64 {
    interval_likelihood(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_intervals() {
        assert!((interval_likelihood(2) - -2.222813183).abs() < 1e-12);
        assert!((interval_likelihood(-2) - -2.462423203).abs() < 1e-12);
        assert!((interval_likelihood(12) - -5.636881433).abs() < 1e-12);
        assert!((interval_likelihood(-12) - -4.862729914).abs() < 1e-12);
        assert!((interval_likelihood(-1) - -3.598778811).abs() < 1e-12);
        assert!((interval_likelihood(1) - -3.523344336).abs() < 1e-12);
    }

    #[test]
    fn test_wide_intervals_score_minus_ten() {
        assert_eq!(interval_likelihood(13), OUT_OF_RANGE_LIKELIHOOD);
        assert_eq!(interval_likelihood(-13), OUT_OF_RANGE_LIKELIHOOD);
        assert_eq!(interval_likelihood(40), OUT_OF_RANGE_LIKELIHOOD);
    }

    #[test]
    fn test_whole_tone_up_is_most_likely() {
        let best = (-12..=12)
            .filter(|&i| i != 0)
            .map(interval_likelihood)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best, no_change_likelihood());
    }

    #[test]
    fn test_transition_direction() {
        assert_eq!(transition_likelihood(60, 67), interval_likelihood(7));
        assert_eq!(transition_likelihood(67, 60), interval_likelihood(-7));
        assert_ne!(transition_likelihood(60, 67), transition_likelihood(67, 60));
    }
}
