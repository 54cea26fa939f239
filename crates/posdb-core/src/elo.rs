//! Logistic Elo model helpers.

/// Upper bound reported by [`elo_error_99pct`].
pub const MAX_ELO_ERROR: f64 = 400.0;

/// z-score for a two-sided 99% confidence interval.
const Z_99: f64 = 2.58;

/// Expected score for a player `elo_diff` points stronger than the opponent.
pub fn expected_performance(elo_diff: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-elo_diff / 400.0))
}

pub fn expected_performance_from_ratings(white_elo: f64, black_elo: f64) -> f64 {
    expected_performance(white_elo - black_elo)
}

/// Inverse of [`expected_performance`]. Infinite at 0 and 1.
pub fn elo_from_performance(perf: f64) -> f64 {
    -400.0 * ((1.0 - perf) / perf).log10()
}

/// Performance re-centered around the expectation implied by the rating gap.
///
/// Reads 0.5 when `perf == expected_perf`, above when the side outperformed
/// its rating and below when it underperformed.
pub fn adjusted_performance(perf: f64, expected_perf: f64) -> f64 {
    expected_performance(elo_from_performance(perf) - elo_from_performance(expected_perf))
}

/// 99% confidence half-width, in Elo, of a performance measured over
/// `wins + draws + losses` games.
///
/// s(p) = sqrt([p(1 - p) - draw_ratio / 4] / (N - 1))
/// error = 1600 * z * s(p) / ln(10)
pub fn elo_error_99pct(wins: u64, draws: u64, losses: u64) -> f64 {
    let total = (wins + draws + losses) as f64;
    if total < 2.0 {
        return MAX_ELO_ERROR;
    }

    let draw_ratio = draws as f64 / total;
    let perf = (wins as f64 + draws as f64 * 0.5) / total;
    let variance = (perf * (1.0 - perf) - draw_ratio / 4.0) / (total - 1.0);
    if variance.is_nan() || variance < -1e-12 {
        return MAX_ELO_ERROR;
    }

    let s = variance.max(0.0).sqrt();
    let error = 1600.0 * Z_99 * s / std::f64::consts::LN_10;
    error.min(MAX_ELO_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_performance_symmetry() {
        assert_eq!(expected_performance(0.0), 0.5);
        for diff in [1.0, 35.0, 200.0, 400.0, 1234.5] {
            let sum = expected_performance(diff) + expected_performance(-diff);
            assert!((sum - 1.0).abs() < 1e-12, "diff {diff}: {sum}");
        }
        assert!((expected_performance(400.0) - 10.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_elo_from_performance_inverts() {
        for diff in [-300.0, -50.0, 0.0, 120.0, 500.0] {
            let back = elo_from_performance(expected_performance(diff));
            assert!((back - diff).abs() < 1e-9);
        }
    }

    #[test]
    fn test_adjusted_performance_centered() {
        let expected = expected_performance(150.0);
        assert!((adjusted_performance(expected, expected) - 0.5).abs() < 1e-12);
        assert!(adjusted_performance(expected + 0.05, expected) > 0.5);
        assert!(adjusted_performance(expected - 0.05, expected) < 0.5);
        assert_eq!(adjusted_performance(1.0, expected), 1.0);
        assert_eq!(adjusted_performance(0.0, expected), 0.0);
    }

    #[test]
    fn test_elo_error_small_samples() {
        assert_eq!(elo_error_99pct(0, 0, 0), MAX_ELO_ERROR);
        assert_eq!(elo_error_99pct(1, 0, 0), MAX_ELO_ERROR);
        assert_eq!(elo_error_99pct(0, 1, 0), MAX_ELO_ERROR);
    }

    #[test]
    fn test_elo_error_range() {
        for w in 0..12u64 {
            for d in 0..12u64 {
                for l in 0..12u64 {
                    if w + d + l < 2 {
                        continue;
                    }
                    let e = elo_error_99pct(w, d, l);
                    assert!((0.0..=MAX_ELO_ERROR).contains(&e), "{w}/{d}/{l}: {e}");
                }
            }
        }
    }

    #[test]
    fn test_elo_error_shrinks_with_sample_size() {
        let small = elo_error_99pct(30, 40, 30);
        let large = elo_error_99pct(3000, 4000, 3000);
        assert!(large < small);
        assert!(large > 0.0);
    }
}
