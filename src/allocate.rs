//! Deterministic, sticky variant allocation
//!
//! A visitor's bucket is a stable hash of `(experiment_id, visitor_id)`
//! reduced into `0..10_000`, compared against cumulative traffic-split
//! boundaries scaled to the same range. The hash is SHA-256, so buckets
//! are uniform and survive process restarts: repeated calls always land
//! on the same variant even before the assignment is persisted.

use sha2::{Digest, Sha256};

use crate::experiment::Variant;

/// Number of hash buckets; split percentages are scaled by 100 to match.
pub const BUCKETS: u32 = 10_000;

/// Stable bucket in `0..10_000` for a visitor within an experiment.
#[must_use]
pub fn bucket_of(experiment_id: &str, visitor_id: &str) -> u16 {
    let mut hasher = Sha256::new();
    hasher.update(experiment_id.as_bytes());
    hasher.update(b":");
    hasher.update(visitor_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(BUCKETS)) as u16
}

/// Map a bucket onto a variant via cumulative split boundaries.
///
/// `split` is aligned 1:1 with `variants` (validated at creation). Float
/// residue in the final boundary is absorbed by the last variant.
#[must_use]
pub fn choose_variant<'a>(bucket: u16, variants: &'a [Variant], split: &[f64]) -> Option<&'a Variant> {
    let mut cumulative = 0.0;
    for (variant, percent) in variants.iter().zip(split) {
        cumulative += percent;
        let boundary = (cumulative * 100.0).round() as u32;
        if u32::from(bucket) < boundary {
            return Some(variant);
        }
    }
    variants.last()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fifty_fifty() -> (Vec<Variant>, Vec<f64>) {
        (
            vec![
                Variant::new("control", "a", true, 50.0),
                Variant::new("v1", "b", false, 50.0),
            ],
            vec![50.0, 50.0],
        )
    }

    #[test]
    fn bucket_is_deterministic() {
        let a = bucket_of("exp-1", "visitor-7");
        let b = bucket_of("exp-1", "visitor-7");
        assert_eq!(a, b);
        assert!(u32::from(a) < BUCKETS);
    }

    #[test]
    fn bucket_depends_on_both_ids() {
        // A visitor lands in different buckets in different experiments.
        let buckets: Vec<u16> = (0..10)
            .map(|i| bucket_of(&format!("exp-{i}"), "visitor-7"))
            .collect();
        let distinct: std::collections::HashSet<_> = buckets.iter().collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn boundary_mapping_matches_split() {
        let (variants, split) = fifty_fifty();
        assert_eq!(choose_variant(0, &variants, &split).unwrap().id(), "control");
        assert_eq!(choose_variant(4999, &variants, &split).unwrap().id(), "control");
        assert_eq!(choose_variant(5000, &variants, &split).unwrap().id(), "v1");
        assert_eq!(choose_variant(9999, &variants, &split).unwrap().id(), "v1");
    }

    #[test]
    fn uneven_split_boundaries() {
        let variants = vec![
            Variant::new("control", "a", true, 90.0),
            Variant::new("v1", "b", false, 10.0),
        ];
        let split = vec![90.0, 10.0];
        assert_eq!(choose_variant(8999, &variants, &split).unwrap().id(), "control");
        assert_eq!(choose_variant(9000, &variants, &split).unwrap().id(), "v1");
    }

    #[test]
    fn float_residue_falls_to_last_variant() {
        let variants = vec![
            Variant::new("a", "a", true, 100.0 / 3.0),
            Variant::new("b", "b", false, 100.0 / 3.0),
            Variant::new("c", "c", false, 100.0 / 3.0),
        ];
        let split: Vec<f64> = variants.iter().map(Variant::traffic_percent).collect();
        assert_eq!(choose_variant(9999, &variants, &split).unwrap().id(), "c");
    }

    #[test]
    fn population_converges_to_split() {
        let (variants, split) = fifty_fifty();
        let mut control = 0u32;
        for i in 0..10_000 {
            let bucket = bucket_of("exp-conv", &format!("visitor-{i}"));
            if choose_variant(bucket, &variants, &split).unwrap().id() == "control" {
                control += 1;
            }
        }
        // Within ±3% of the configured 50%.
        assert!((4700..=5300).contains(&control), "control count: {control}");
    }
}
