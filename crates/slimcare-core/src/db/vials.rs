//! Vial inventory database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Vial, VialSize};

const VIAL_COLUMNS: &str = "vial_id, purchase_date, total_mg, cost, sold_mg, notes, created_at";

impl Database {
    /// Register a purchased vial.
    pub fn insert_vial(&self, vial: &Vial) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO vials (vial_id, purchase_date, total_mg, cost, sold_mg, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                vial.vial_id,
                vial.purchase_date,
                vial.size.total_mg(),
                vial.cost,
                vial.sold_mg,
                vial.notes,
                vial.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a vial by ID.
    pub fn get_vial(&self, vial_id: &str) -> DbResult<Option<Vial>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM vials WHERE vial_id = ?", VIAL_COLUMNS),
                [vial_id],
                vial_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All vials, newest purchase first. `in_stock_only` hides depleted vials.
    pub fn list_vials(&self, in_stock_only: bool) -> DbResult<Vec<Vial>> {
        let filter = if in_stock_only { "WHERE sold_mg < total_mg" } else { "" };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM vials {} ORDER BY purchase_date DESC, created_at DESC",
            VIAL_COLUMNS, filter
        ))?;
        let rows = stmt.query_map([], vial_row)?;

        let mut vials = Vec::new();
        for row in rows {
            vials.push(row?.try_into()?);
        }
        Ok(vials)
    }

    /// Draw `mg` from a vial. Fails without changes if the vial lacks stock.
    /// Returns the updated vial.
    pub fn record_vial_sale(&self, vial_id: &str, mg: f64) -> DbResult<Vial> {
        if !(mg.is_finite() && mg > 0.0) {
            return Err(DbError::Constraint(format!("Invalid sale amount: {} mg", mg)));
        }

        let rows_affected = self.conn.execute(
            "UPDATE vials SET sold_mg = sold_mg + ?2 WHERE vial_id = ?1 AND sold_mg + ?2 <= total_mg",
            params![vial_id, mg],
        )?;

        let vial = self
            .get_vial(vial_id)?
            .ok_or_else(|| DbError::NotFound(vial_id.to_string()))?;
        if rows_affected == 0 {
            return Err(DbError::Constraint(format!(
                "Vial {} has {} mg left, cannot sell {} mg",
                vial_id,
                vial.remaining_mg(),
                mg
            )));
        }
        Ok(vial)
    }
}

/// Intermediate row struct for database mapping.
struct VialRow {
    vial_id: String,
    purchase_date: String,
    total_mg: u32,
    cost: f64,
    sold_mg: f64,
    notes: Option<String>,
    created_at: String,
}

fn vial_row(row: &Row<'_>) -> rusqlite::Result<VialRow> {
    Ok(VialRow {
        vial_id: row.get(0)?,
        purchase_date: row.get(1)?,
        total_mg: row.get(2)?,
        cost: row.get(3)?,
        sold_mg: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl TryFrom<VialRow> for Vial {
    type Error = DbError;

    fn try_from(row: VialRow) -> Result<Self, Self::Error> {
        let size = VialSize::try_from(row.total_mg).map_err(DbError::Constraint)?;
        Ok(Vial {
            vial_id: row.vial_id,
            purchase_date: row.purchase_date,
            size,
            cost: row.cost,
            sold_mg: row.sold_mg,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}
