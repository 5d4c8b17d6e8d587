//! Vial inventory models.

use serde::{Deserialize, Serialize};

/// Supported vial capacities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub enum VialSize {
    Mg40,
    Mg60,
    Mg90,
}

impl VialSize {
    /// Total capacity in mg.
    pub fn total_mg(&self) -> u32 {
        match self {
            VialSize::Mg40 => 40,
            VialSize::Mg60 => 60,
            VialSize::Mg90 => 90,
        }
    }
}

impl TryFrom<u32> for VialSize {
    type Error = String;

    fn try_from(mg: u32) -> Result<Self, Self::Error> {
        match mg {
            40 => Ok(VialSize::Mg40),
            60 => Ok(VialSize::Mg60),
            90 => Ok(VialSize::Mg90),
            other => Err(format!("Unsupported vial size: {} mg", other)),
        }
    }
}

impl From<VialSize> for u32 {
    fn from(size: VialSize) -> u32 {
        size.total_mg()
    }
}

/// A purchased vial of injectable medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vial {
    pub vial_id: String,
    /// Purchase date (YYYY-MM-DD)
    pub purchase_date: String,
    pub size: VialSize,
    /// Purchase cost
    pub cost: f64,
    /// Milligrams already sold; only ever increases
    pub sold_mg: f64,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Vial {
    pub fn new(purchase_date: String, size: VialSize, cost: f64) -> Self {
        Self {
            vial_id: uuid::Uuid::new_v4().to_string(),
            purchase_date,
            size,
            cost,
            sold_mg: 0.0,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn total_mg(&self) -> f64 {
        f64::from(self.size.total_mg())
    }

    pub fn remaining_mg(&self) -> f64 {
        (self.total_mg() - self.sold_mg).max(0.0)
    }

    /// Whether `mg` more can be sold from this vial.
    pub fn can_sell(&self, mg: f64) -> bool {
        mg > 0.0 && mg <= self.remaining_mg() + f64::EPSILON
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_mg() <= f64::EPSILON
    }

    /// Cost per mg, for margin reports.
    pub fn cost_per_mg(&self) -> f64 {
        self.cost / self.total_mg()
    }
}
