//! Reward points program.
//!
//! A tier unlocks a fixed discount once the balance reaches its threshold.
//! Thresholds are inclusive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Points that correspond to one currency unit of discount headroom.
pub const POINTS_PER_CURRENCY_UNIT: u32 = 10;

/// A discount unlocked at a point threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardTier {
    pub label: String,
    pub threshold: u32,
    /// Discount in currency units
    pub discount_value: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    #[error("Reward tiers must have strictly increasing thresholds ({0} follows {1})")]
    Unordered(u32, u32),

    #[error("Reward tier '{0}' has a negative discount")]
    NegativeDiscount(String),
}

/// Ascending table of reward tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<RewardTier>", into = "Vec<RewardTier>")]
pub struct RewardTable {
    tiers: Vec<RewardTier>,
}

impl RewardTable {
    /// Build a table, rejecting unordered thresholds.
    pub fn new(tiers: Vec<RewardTier>) -> Result<Self, RewardError> {
        for pair in tiers.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(RewardError::Unordered(pair[1].threshold, pair[0].threshold));
            }
        }
        if let Some(tier) = tiers.iter().find(|t| t.discount_value < 0.0) {
            return Err(RewardError::NegativeDiscount(tier.label.clone()));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }

    /// Highest tier whose threshold is at most `points`.
    pub fn get_highest_reward(&self, points: u32) -> Option<&RewardTier> {
        self.tiers.iter().rev().find(|t| t.threshold <= points)
    }

    /// Lowest tier not yet reached, with the points still missing.
    pub fn next_reward(&self, points: u32) -> Option<(&RewardTier, u32)> {
        self.tiers
            .iter()
            .find(|t| t.threshold > points)
            .map(|t| (t, t.threshold - points))
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        let tier = |threshold: u32| RewardTier {
            label: format!("R$ {} off", threshold / POINTS_PER_CURRENCY_UNIT),
            threshold,
            discount_value: f64::from(threshold / POINTS_PER_CURRENCY_UNIT),
        };
        Self {
            tiers: vec![tier(100), tier(250), tier(500), tier(1000)],
        }
    }
}

impl TryFrom<Vec<RewardTier>> for RewardTable {
    type Error = RewardError;

    fn try_from(tiers: Vec<RewardTier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<RewardTable> for Vec<RewardTier> {
    fn from(table: RewardTable) -> Self {
        table.tiers
    }
}

/// Display heuristic: 10 points are worth about one currency unit.
pub fn points_to_currency(points: u32) -> f64 {
    f64::from(points) / f64::from(POINTS_PER_CURRENCY_UNIT)
}
