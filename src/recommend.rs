//! Winner selection and recommendation
//!
//! Candidates are the statistically significant non-control variants with a
//! positive lift. Ties on improvement break toward the larger sample size,
//! then the lexicographically smaller variant id, so the outcome is fully
//! deterministic.

use std::cmp::Ordering;

use crate::experiment::{Recommendation, VariantResult};

/// Derive a recommendation from analyzed variant results.
///
/// Returns the recommended action and the winning variant id, if any:
/// - no significant positive candidate → `Inconclusive`, no winner
/// - best candidate under `minimum_sample_size` → `ContinueTesting`
/// - otherwise → `AdoptWinner` with the candidate's id
#[must_use]
pub fn pick_winner(
    results: &[VariantResult],
    control_id: &str,
    primary_metric: &str,
    minimum_sample_size: u64,
) -> (Recommendation, Option<String>) {
    let mut candidates: Vec<&VariantResult> = results
        .iter()
        .filter(|r| r.variant_id() != control_id && r.is_significant() && r.improvement() > 0.0)
        .collect();

    candidates.sort_by(|a, b| {
        b.improvement()
            .partial_cmp(&a.improvement())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.sample_size(primary_metric).cmp(&a.sample_size(primary_metric)))
            .then_with(|| a.variant_id().cmp(b.variant_id()))
    });

    let Some(best) = candidates.first() else {
        return (Recommendation::Inconclusive, None);
    };

    if best.sample_size(primary_metric) < minimum_sample_size {
        return (Recommendation::ContinueTesting, None);
    }

    (Recommendation::AdoptWinner, Some(best.variant_id().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Comparison;

    const METRIC: &str = "conversion";

    fn result_with(
        variant_id: &str,
        samples: u64,
        improvement: f64,
        is_significant: bool,
    ) -> VariantResult {
        let mut result = VariantResult::new("exp-1", variant_id);
        for _ in 0..samples {
            result.record(METRIC, 0.0);
        }
        result.apply_comparison(&Comparison {
            z_score: 3.0,
            p_value: if is_significant { 0.001 } else { 0.4 },
            effect_size: 0.2,
            improvement,
            confidence_interval: (0.0, 1.0),
            is_significant,
        });
        result
    }

    #[test]
    fn no_significant_candidate_is_inconclusive() {
        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v1", 500, 12.0, false),
        ];
        let (rec, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(rec, Recommendation::Inconclusive);
        assert!(winner.is_none());
    }

    #[test]
    fn significant_control_never_wins() {
        // The control can be flagged significant by a symmetric comparison;
        // it must never be a candidate.
        let results = vec![
            result_with("control", 500, 20.0, true),
            result_with("v1", 500, 1.0, false),
        ];
        let (rec, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(rec, Recommendation::Inconclusive);
        assert!(winner.is_none());
    }

    #[test]
    fn negative_lift_is_not_a_candidate() {
        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v1", 500, -8.0, true),
        ];
        let (rec, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(rec, Recommendation::Inconclusive);
        assert!(winner.is_none());
    }

    #[test]
    fn best_improvement_wins() {
        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v1", 500, 8.0, true),
            result_with("v2", 500, 15.0, true),
        ];
        let (rec, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(rec, Recommendation::AdoptWinner);
        assert_eq!(winner.as_deref(), Some("v2"));
    }

    #[test]
    fn undersized_winner_means_continue_testing() {
        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v1", 40, 15.0, true),
        ];
        let (rec, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(rec, Recommendation::ContinueTesting);
        assert!(winner.is_none());
    }

    #[test]
    fn tie_breaks_on_sample_size_then_id() {
        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v1", 200, 10.0, true),
            result_with("v2", 400, 10.0, true),
        ];
        let (_, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(winner.as_deref(), Some("v2"), "larger sample size wins the tie");

        let results = vec![
            result_with("control", 500, 0.0, false),
            result_with("v9", 300, 10.0, true),
            result_with("v2", 300, 10.0, true),
        ];
        let (_, winner) = pick_winner(&results, "control", METRIC, 100);
        assert_eq!(winner.as_deref(), Some("v2"), "smaller id wins the residual tie");
    }
}
