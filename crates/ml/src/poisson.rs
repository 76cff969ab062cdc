//! Poisson scoreline model.
//!
//! Each side's goal count is an independent Poisson variable whose mean is the
//! side's expected goals. Outcome probabilities are accumulated over the
//! `0..=MAX_GOALS` scoreline grid and renormalized to compensate for the
//! truncated tail.

use matchcast_models::OutcomeProbabilities;
use serde::{Deserialize, Serialize};

/// Per-side goal cutoff. Omitted mass is below 0.1% for xG up to 3.5.
pub const MAX_GOALS: usize = 8;

/// Goal line reported alongside the three-way probabilities.
pub const DEFAULT_GOAL_LINE: f64 = 2.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScorelineForecast {
    pub probabilities: OutcomeProbabilities,
    pub over25: u8,
}

/// P(X = k) for X ~ Poisson(lambda), evaluated in log space.
///
/// A non-positive (or NaN) rate is a point mass at zero goals.
pub fn poisson_pmf(lambda: f64, k: usize) -> f64 {
    pmf_table(lambda, k)[k]
}

/// PMF values for `0..=max_k`, sharing one running log-factorial.
#[allow(clippy::cast_precision_loss)]
fn pmf_table(lambda: f64, max_k: usize) -> Vec<f64> {
    if lambda.is_nan() || lambda <= 0.0 {
        let mut table = vec![0.0; max_k + 1];
        table[0] = 1.0;
        return table;
    }

    let log_lambda = lambda.ln();
    let mut log_factorial = 0.0;
    (0..=max_k)
        .map(|k| {
            if k > 0 {
                log_factorial += (k as f64).ln();
            }
            (-lambda + k as f64 * log_lambda - log_factorial).exp()
        })
        .collect()
}

/// Home/draw/away percentages for the given expected goals.
pub fn probabilities(home_xg: f64, away_xg: f64) -> OutcomeProbabilities {
    let home = pmf_table(home_xg, MAX_GOALS);
    let away = pmf_table(away_xg, MAX_GOALS);

    let (mut home_win, mut draw, mut away_win) = (0.0, 0.0, 0.0);
    for (h, p_home) in home.iter().enumerate() {
        for (a, p_away) in away.iter().enumerate() {
            let p = p_home * p_away;
            match h.cmp(&a) {
                std::cmp::Ordering::Greater => home_win += p,
                std::cmp::Ordering::Equal => draw += p,
                std::cmp::Ordering::Less => away_win += p,
            }
        }
    }

    let [home_win, draw, away_win] = to_percentages([home_win, draw, away_win]);
    OutcomeProbabilities { home_win, draw, away_win }
}

/// Probability (percent) that total goals exceed `line`, e.g. 2.5.
///
/// Total goals of two independent Poisson sides is Poisson(home + away).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn over_line_probability(home_xg: f64, away_xg: f64, line: f64) -> u8 {
    let total_rate = home_xg.max(0.0) + away_xg.max(0.0);
    let threshold = line.max(0.0).floor() as usize;
    let at_or_under: f64 = pmf_table(total_rate, threshold).iter().sum();
    ((1.0 - at_or_under).clamp(0.0, 1.0) * 100.0).round() as u8
}

pub fn forecast(home_xg: f64, away_xg: f64) -> ScorelineForecast {
    let forecast = ScorelineForecast {
        probabilities: probabilities(home_xg, away_xg),
        over25: over_line_probability(home_xg, away_xg, DEFAULT_GOAL_LINE),
    };
    tracing::debug!(
        home_xg,
        away_xg,
        home = forecast.probabilities.home_win,
        draw = forecast.probabilities.draw,
        away = forecast.probabilities.away_win,
        "poisson forecast"
    );
    forecast
}

/// Shares closer than this are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// Normalizes raw `[home, draw, away]` masses into integer percentages
/// summing to exactly 100.
///
/// The rounding remainder goes to the largest component. Among tied largest
/// components a surplus goes to draw, then home, then away, and a deficit is
/// taken in the reverse order, so the winner of the raw shares under the
/// draw > home > away tie-break is still the winner after rounding.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percentages(raw: [f64; 3]) -> [u8; 3] {
    let total: f64 = raw.iter().sum();
    let shares = raw.map(|p| p / total * 100.0);
    let mut rounded = shares.map(|p| p.round() as i32);

    let remainder = 100 - rounded.iter().sum::<i32>();
    if remainder != 0 {
        let order = if remainder > 0 { [1, 0, 2] } else { [2, 0, 1] };
        let top = shares.iter().copied().fold(f64::MIN, f64::max);
        let target = order
            .into_iter()
            .find(|&i| top - shares[i] <= TIE_EPSILON)
            .unwrap_or(0);
        rounded[target] += remainder;
    }

    rounded.map(|p| p.clamp(0, 100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchcast_models::Outcome;
    use proptest::prelude::*;

    #[test]
    fn test_reference_probabilities() {
        let p = probabilities(1.5, 1.1);
        assert_eq!(p, OutcomeProbabilities { home_win: 46, draw: 26, away_win: 28 });
        assert_eq!(p.predicted_winner(), Outcome::Home);
    }

    #[test]
    fn test_even_match_keeps_home_tie_break() {
        // Raw home and away shares are equal and both round up, one point is
        // taken back from away
        let p = probabilities(1.0, 1.0);
        assert_eq!(p, OutcomeProbabilities { home_win: 35, draw: 31, away_win: 34 });
        assert_eq!(p.predicted_winner(), Outcome::Home);

        let p = probabilities(2.0, 2.0);
        assert_eq!(p, OutcomeProbabilities { home_win: 40, draw: 21, away_win: 39 });
        assert_eq!(p.predicted_winner(), Outcome::Home);

        // No remainder: the tie stands and home wins it
        let p = probabilities(1.5, 1.5);
        assert_eq!(p, OutcomeProbabilities { home_win: 38, draw: 24, away_win: 38 });
        assert_eq!(p.predicted_winner(), Outcome::Home);
    }

    #[test]
    fn test_extreme_mismatch() {
        let p = probabilities(6.0, 0.1);
        assert!(p.home_win > 90);
        assert_eq!(p.total(), 100);

        let reversed = probabilities(0.1, 6.0);
        assert!(reversed.away_win > 90);
    }

    #[test]
    fn test_degenerate_rates() {
        // Zero expected goals means that side never scores
        let p = probabilities(0.0, 1.2);
        assert_eq!(p.home_win, 0);
        assert_eq!(p.draw, 30);
        assert_eq!(p.away_win, 70);

        let p = probabilities(0.0, -1.0);
        assert_eq!(p, OutcomeProbabilities { home_win: 0, draw: 100, away_win: 0 });

        let p = probabilities(f64::NAN, 1.0);
        assert_eq!(p.total(), 100);
    }

    #[test]
    fn test_pmf_values() {
        assert!((poisson_pmf(1.0, 0) - (-1.0f64).exp()).abs() < 1e-12);
        assert!((poisson_pmf(2.0, 3) - 0.180_447_044_315_483_6).abs() < 1e-12);
        assert_eq!(poisson_pmf(0.0, 0), 1.0);
        assert_eq!(poisson_pmf(0.0, 2), 0.0);
        // Large k stays finite in log space
        assert!(poisson_pmf(30.0, 170).is_finite());
    }

    #[test]
    fn test_over_line_probability() {
        assert_eq!(over_line_probability(1.5, 1.1, 2.5), 48);
        assert_eq!(over_line_probability(0.0, 0.0, 2.5), 0);
        assert!(over_line_probability(4.0, 3.0, 2.5) > 95);
        assert!(over_line_probability(1.5, 1.1, 3.5) < over_line_probability(1.5, 1.1, 2.5));
    }

    #[test]
    fn test_forecast_combines_both_markets() {
        let f = forecast(1.5, 1.1);
        assert_eq!(f.probabilities, probabilities(1.5, 1.1));
        assert_eq!(f.over25, 48);
    }

    #[test]
    fn test_remainder_goes_to_largest() {
        // 33.4 / 33.3 / 33.3 rounds to 99
        assert_eq!(to_percentages([33.4, 33.3, 33.3]), [34, 33, 33]);
        // 34.6 / 30.8 / 34.6 rounds to 101, away gives the point back
        assert_eq!(to_percentages([34.6, 30.8, 34.6]), [35, 31, 34]);
        // 34.4 / 31.2 / 34.4 rounds to 99, home takes the point
        assert_eq!(to_percentages([34.4, 31.2, 34.4]), [35, 31, 34]);
        // A surplus shared by draw and home goes to draw
        assert_eq!(to_percentages([40.4, 40.4, 19.2]), [40, 41, 19]);
        // A deficit shared by draw and away comes out of away
        assert_eq!(to_percentages([19.0, 40.5, 40.5]), [19, 41, 40]);
    }

    proptest! {
        #[test]
        fn prop_equal_rates_pick_home_or_draw(xg in 0.1f64..6.0) {
            let winner = probabilities(xg, xg).predicted_winner();
            prop_assert_ne!(winner, Outcome::Away);
        }
    }

    proptest! {
        #[test]
        fn prop_probabilities_sum_to_100(home in 0.1f64..6.0, away in 0.1f64..6.0) {
            let p = probabilities(home, away);
            prop_assert_eq!(p.total(), 100);
            prop_assert!(p.home_win <= 100 && p.draw <= 100 && p.away_win <= 100);
        }

        #[test]
        fn prop_swapping_sides_mirrors_result(home in 0.1f64..6.0, away in 0.1f64..6.0) {
            let p = probabilities(home, away);
            let q = probabilities(away, home);
            prop_assert!(p.home_win.abs_diff(q.away_win) <= 1);
            prop_assert!(p.away_win.abs_diff(q.home_win) <= 1);
        }

        #[test]
        fn prop_stronger_attack_never_lowers_home_chances(
            home in 0.1f64..5.0,
            away in 0.1f64..6.0,
            bump in 0.5f64..1.0,
        ) {
            let base = probabilities(home, away);
            let stronger = probabilities(home + bump, away);
            prop_assert!(stronger.home_win + 1 >= base.home_win);
        }
    }
}
