//! Per-product rating statistics.
//!
//! Statistics are derived data: they are always recomputed from the full set of
//! published reviews, never adjusted incrementally. [`RatingCounts`] accumulates
//! ratings page by page; [`ProductStatistics`] is the persisted record and
//! [`RatingSummary`] the shape served to clients.
//!
//! # Rounding
//!
//! Averages and percentages are rounded half-away-from-zero to two decimal
//! places. Rounding is done on the exact integer ratio rather than on an
//! intermediate float, so `17 / 5` is exactly `3.4` and `1 / 8` is `0.13`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest valid rating.
pub const MIN_RATING: u8 = 1;

/// Highest valid rating.
pub const MAX_RATING: u8 = 5;

/// Rating value → number of reviews with that rating. Keys 1..=5 always present.
pub type Distribution = BTreeMap<u8, u64>;

/// Rating value → share of reviews in percent. Keys 1..=5 always present.
pub type PercentageDistribution = BTreeMap<u8, f64>;

/// Whether a rating lies in `1..=5`.
#[must_use]
pub const fn is_valid_rating(rating: u8) -> bool {
    rating >= MIN_RATING && rating <= MAX_RATING
}

/// Round `numerator / denominator` half-away-from-zero to two decimals.
///
/// Both operands are non-negative, so half-away-from-zero is half-up.
/// Returns `0.0` when the denominator is zero.
#[must_use]
pub fn round_ratio_2dp(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);
    // hundredths, rounded: floor((2·n·100 + d) / 2d)
    let hundredths = (numerator * 200 + denominator) / (denominator * 2);
    #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
    let value = hundredths as f64 / 100.0;
    value
}

/// Running tally of ratings 1..=5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingCounts {
    counts: [u64; 5],
}

impl RatingCounts {
    /// Record one rating.
    ///
    /// Returns `false` (and records nothing) when the rating is outside 1..=5.
    pub fn record(&mut self, rating: u8) -> bool {
        if !is_valid_rating(rating) {
            return false;
        }
        self.counts[usize::from(rating - MIN_RATING)] += 1;
        true
    }

    /// Number of reviews with the given rating.
    #[must_use]
    pub fn get(&self, rating: u8) -> u64 {
        if is_valid_rating(rating) {
            self.counts[usize::from(rating - MIN_RATING)]
        } else {
            0
        }
    }

    /// Total number of recorded ratings.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sum of `rating · count` over all ratings.
    #[must_use]
    pub fn weighted_sum(&self) -> u64 {
        (MIN_RATING..=MAX_RATING).map(|r| u64::from(r) * self.get(r)).sum()
    }

    /// Distribution map with every key present.
    #[must_use]
    pub fn distribution(&self) -> Distribution {
        (MIN_RATING..=MAX_RATING).map(|r| (r, self.get(r))).collect()
    }

    /// Percentage map with every key present; all zero when empty.
    #[must_use]
    pub fn percentages(&self) -> PercentageDistribution {
        let total = self.total();
        (MIN_RATING..=MAX_RATING)
            .map(|r| (r, round_ratio_2dp(self.get(r) * 100, total)))
            .collect()
    }

    /// Mean rating rounded to two decimals; `0.0` when empty.
    #[must_use]
    pub fn average(&self) -> f64 {
        round_ratio_2dp(self.weighted_sum(), self.total())
    }

    /// Client-facing summary of these counts.
    #[must_use]
    pub fn summary(&self) -> RatingSummary {
        RatingSummary {
            average: self.average(),
            count: self.total(),
            distribution: self.distribution(),
            percentage_distribution: self.percentages(),
        }
    }
}

/// Rating summary as returned by the read API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean rating, two decimals
    pub average: f64,
    /// Number of published reviews
    pub count: u64,
    /// Count per rating value
    pub distribution: Distribution,
    /// Percent per rating value, two decimals
    pub percentage_distribution: PercentageDistribution,
}

impl RatingSummary {
    /// The summary served when no statistics record exists.
    #[must_use]
    pub fn zeroed() -> Self {
        RatingCounts::default().summary()
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Persisted statistics record for one product.
///
/// A record exists iff a recompute has completed for the product. A product
/// with no published reviews has a zeroed record, which is different from
/// having no record at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStatistics {
    /// Primary key
    pub product_id: String,
    /// Number of published reviews
    pub rating_count: u64,
    /// Mean rating, two decimals; 0 when the count is 0
    pub average_rating: f64,
    /// Count per rating value
    pub rating_distribution: Distribution,
    /// Percent per rating value
    pub percentage_distribution: PercentageDistribution,
    /// When this record was computed; upserts are last-writer-wins on this
    pub last_calculated_at: DateTime<Utc>,
}

impl ProductStatistics {
    /// Build a record from a completed tally.
    #[must_use]
    pub fn from_counts(
        product_id: impl Into<String>,
        counts: &RatingCounts,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            rating_count: counts.total(),
            average_rating: counts.average(),
            rating_distribution: counts.distribution(),
            percentage_distribution: counts.percentages(),
            last_calculated_at: calculated_at,
        }
    }

    /// A zeroed record: the product has no published reviews.
    #[must_use]
    pub fn zeroed(product_id: impl Into<String>, calculated_at: DateTime<Utc>) -> Self {
        Self::from_counts(product_id, &RatingCounts::default(), calculated_at)
    }

    /// Client-facing view of this record.
    ///
    /// Missing distribution keys (from records written by older code) are
    /// filled with zero.
    #[must_use]
    pub fn summary(&self) -> RatingSummary {
        let mut distribution = self.rating_distribution.clone();
        let mut percentages = self.percentage_distribution.clone();
        for rating in MIN_RATING..=MAX_RATING {
            distribution.entry(rating).or_insert(0);
            percentages.entry(rating).or_insert(0.0);
        }
        RatingSummary {
            average: self.average_rating,
            count: self.rating_count,
            distribution,
            percentage_distribution: percentages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts_of(ratings: &[u8]) -> RatingCounts {
        let mut counts = RatingCounts::default();
        for r in ratings {
            counts.record(*r);
        }
        counts
    }

    #[test]
    fn five_mixed_ratings() {
        let summary = counts_of(&[5, 4, 4, 3, 1]).summary();

        assert_eq!(summary.count, 5);
        assert_eq!(summary.average, 3.4);
        assert_eq!(
            summary.distribution,
            BTreeMap::from([(1, 1), (2, 0), (3, 1), (4, 2), (5, 1)])
        );
        assert_eq!(
            summary.percentage_distribution,
            BTreeMap::from([(1, 20.0), (2, 0.0), (3, 20.0), (4, 40.0), (5, 20.0)])
        );
    }

    #[test]
    fn one_four_star_removed() {
        let summary = counts_of(&[5, 4, 3, 1]).summary();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.average, 3.25);
        assert_eq!(
            summary.percentage_distribution,
            BTreeMap::from([(1, 25.0), (2, 0.0), (3, 25.0), (4, 25.0), (5, 25.0)])
        );
    }

    #[test]
    fn empty_counts_are_zeroed() {
        let summary = RatingSummary::zeroed();

        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.distribution.len(), 5);
        assert!(summary.distribution.values().all(|v| *v == 0));
        assert_eq!(summary.percentage_distribution.len(), 5);
        assert!(summary.percentage_distribution.values().all(|v| *v == 0.0));
    }

    #[test]
    fn out_of_range_ratings_are_skipped() {
        let mut counts = RatingCounts::default();
        assert!(!counts.record(0));
        assert!(!counts.record(6));
        assert!(counts.record(5));
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn rounding_is_half_up_on_exact_ratio() {
        // 1/8 = 0.125 → 0.13, which naive float rounding can miss
        assert_eq!(round_ratio_2dp(1, 8), 0.13);
        assert_eq!(round_ratio_2dp(2, 3), 0.67);
        assert_eq!(round_ratio_2dp(1, 3), 0.33);
        assert_eq!(round_ratio_2dp(0, 7), 0.0);
        assert_eq!(round_ratio_2dp(5, 0), 0.0);
    }

    #[test]
    fn thirds_do_not_need_to_sum_to_hundred() {
        let pct = counts_of(&[1, 2, 3]).percentages();
        let sum: f64 = pct.values().sum();
        assert!((sum - 100.0).abs() <= 0.05);
        assert_eq!(pct[&1], 33.33);
    }

    #[test]
    fn statistics_summary_fills_missing_keys() {
        let mut stats = ProductStatistics::zeroed("p-1", Utc::now());
        stats.rating_distribution.remove(&3);
        stats.percentage_distribution.remove(&3);

        let summary = stats.summary();
        assert_eq!(summary.distribution[&3], 0);
        assert_eq!(summary.percentage_distribution[&3], 0.0);
    }

    #[test]
    fn distribution_serializes_with_string_keys() {
        let json = serde_json::to_value(counts_of(&[5]).summary()).unwrap();
        assert_eq!(json["distribution"]["5"], 1);
        assert_eq!(json["percentage_distribution"]["5"], 100.0);
    }

    proptest! {
        #[test]
        fn count_equals_sum_of_distribution(ratings in prop::collection::vec(1u8..=5, 0..500)) {
            let counts = counts_of(&ratings);
            let summary = counts.summary();

            prop_assert_eq!(summary.count, ratings.len() as u64);
            prop_assert_eq!(summary.distribution.values().sum::<u64>(), summary.count);
            prop_assert_eq!(summary.distribution.len(), 5);
            prop_assert_eq!(summary.percentage_distribution.len(), 5);
        }

        #[test]
        fn average_matches_weighted_mean(ratings in prop::collection::vec(1u8..=5, 1..500)) {
            let summary = counts_of(&ratings).summary();
            let exact = ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64;

            prop_assert!((summary.average - exact).abs() <= 0.005 + 1e-9);
            prop_assert!((1.0..=5.0).contains(&summary.average));
        }

        #[test]
        fn percentages_stay_within_drift(ratings in prop::collection::vec(1u8..=5, 1..500)) {
            let summary = counts_of(&ratings).summary();
            let sum: f64 = summary.percentage_distribution.values().sum();

            prop_assert!((sum - 100.0).abs() <= 0.05 + 1e-9);
            prop_assert!(summary.percentage_distribution.values().all(|p| (0.0..=100.0).contains(p)));
        }
    }
}
