//! Evolution (bioimpedance snapshot) database operations.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::{Bioimpedance, Evolution};

impl Database {
    /// Insert an evolution snapshot.
    pub fn insert_evolution(&self, evolution: &Evolution) -> DbResult<()> {
        let metrics = serde_json::to_string(&evolution.metrics)?;
        self.conn.execute(
            r#"
            INSERT INTO evolutions (evolution_id, patient_id, date, metrics, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                evolution.evolution_id,
                evolution.patient_id,
                evolution.date,
                metrics,
                evolution.notes,
                evolution.created_at,
            ],
        )?;
        Ok(())
    }

    /// Evolutions of a patient, oldest first.
    pub fn list_evolutions(&self, patient_id: &str) -> DbResult<Vec<Evolution>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT evolution_id, patient_id, date, metrics, notes, created_at
            FROM evolutions WHERE patient_id = ?
            ORDER BY date, created_at
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut evolutions = Vec::new();
        for row in rows {
            let (evolution_id, patient_id, date, metrics_json, notes, created_at) = row?;
            let metrics: Bioimpedance = serde_json::from_str(&metrics_json)?;
            evolutions.push(Evolution {
                evolution_id,
                patient_id,
                date,
                metrics,
                notes,
                created_at,
            });
        }
        Ok(evolutions)
    }

    /// Delete an evolution. Returns false if none matched.
    pub fn delete_evolution(&self, evolution_id: &str) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM evolutions WHERE evolution_id = ?", [evolution_id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    #[test]
    fn test_evolutions_roundtrip_in_date_order() {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana".into(), 165.0, 82.0, "2024-01-10".into());
        db.insert_patient(&patient).unwrap();

        let later = Evolution::new(
            patient.local_id.clone(),
            "2024-03-01".into(),
            Bioimpedance {
                weight_kg: Some(76.4),
                fat_percentage: Some(29.1),
                ..Default::default()
            },
        );
        let mut earlier = Evolution::new(patient.local_id.clone(), "2024-02-01".into(), Bioimpedance::default());
        earlier.notes = Some("Baseline".into());

        db.insert_evolution(&later).unwrap();
        db.insert_evolution(&earlier).unwrap();

        let stored = db.list_evolutions(&patient.local_id).unwrap();
        assert_eq!(stored, vec![earlier.clone(), later]);

        assert!(db.delete_evolution(&earlier.evolution_id).unwrap());
        assert!(!db.delete_evolution(&earlier.evolution_id).unwrap());
    }
}
