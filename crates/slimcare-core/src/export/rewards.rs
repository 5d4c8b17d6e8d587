//! Outstanding reward points across patients.

use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::{Database, DbResult};
use crate::metrics::round2;
use crate::models::Patient;
use crate::rewards::{points_to_currency, RewardTable};

/// Points held by each patient and what they could redeem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardsReport {
    pub generated_at: String,
    pub total_points: u64,
    /// Currency value of all outstanding points
    pub total_value: f64,
    /// Patients able to redeem at least one tier
    pub redeemable_patients: usize,
    pub rows: Vec<RewardsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardsRow {
    pub patient_id: String,
    pub full_name: String,
    pub points: u32,
    pub value: f64,
    pub highest_reward: Option<String>,
    pub points_to_next: Option<u32>,
}

impl RewardsReport {
    /// Build the report for patients holding points, highest balance first.
    pub fn from_patients(patients: &[Patient], tiers: &RewardTable) -> Self {
        let mut rows: Vec<RewardsRow> = patients
            .iter()
            .filter(|p| p.points > 0)
            .map(|p| RewardsRow {
                patient_id: p.local_id.clone(),
                full_name: p.full_name.clone(),
                points: p.points,
                value: points_to_currency(p.points),
                highest_reward: tiers.get_highest_reward(p.points).map(|t| t.label.clone()),
                points_to_next: tiers.next_reward(p.points).map(|(_, missing)| missing),
            })
            .collect();
        rows.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.full_name.cmp(&b.full_name)));

        let total_points: u64 = rows.iter().map(|r| u64::from(r.points)).sum();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_points,
            total_value: round2(rows.iter().map(|r| r.value).sum()),
            redeemable_patients: rows.iter().filter(|r| r.highest_reward.is_some()).count(),
            rows,
        }
    }

    pub fn generate(db: &Database, tiers: &RewardTable) -> DbResult<Self> {
        Ok(Self::from_patients(&db.list_patients()?, tiers))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from("patient_id,full_name,points,value,highest_reward,points_to_next\n");
        for row in &self.rows {
            csv.push_str(&format!(
                "{},{},{},{:.2},{},{}\n",
                escape_csv(&row.patient_id),
                escape_csv(&row.full_name),
                row.points,
                row.value,
                escape_csv(row.highest_reward.as_deref().unwrap_or("")),
                row.points_to_next.map(|p| p.to_string()).unwrap_or_default(),
            ));
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(name: &str, points: u32) -> Patient {
        let mut p = Patient::new(name.into(), 165.0, 80.0, "2024-01-10".into());
        p.points = points;
        p
    }

    #[test]
    fn test_report_totals_and_order() {
        let patients = vec![patient("Ana", 120), patient("Bia", 0), patient("Caio", 1200)];
        let report = RewardsReport::from_patients(&patients, &RewardTable::default());

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].full_name, "Caio");
        assert_eq!(report.rows[0].highest_reward.as_deref(), Some("R$ 100 off"));
        assert_eq!(report.rows[0].points_to_next, None);
        assert_eq!(report.rows[1].points_to_next, Some(130));
        assert_eq!(report.total_points, 1320);
        assert_eq!(report.total_value, 132.0);
        assert_eq!(report.redeemable_patients, 2);
    }

    #[test]
    fn test_csv_escapes_names() {
        let patients = vec![patient("Silva, Ana", 50)];
        let csv = RewardsReport::from_patients(&patients, &RewardTable::default()).to_csv();
        assert!(csv.contains("\"Silva, Ana\",50,5.00,,50"));
    }
}
