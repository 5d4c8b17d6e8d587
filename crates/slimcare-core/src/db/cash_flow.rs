//! Cash flow database operations.
//!
//! Sales are income entries carrying the sale columns; there is no separate
//! sales table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{CashFlowEntry, FlowKind, PaymentMethod, SaleDetails};

const ENTRY_COLUMNS: &str = r#"
    entry_id, kind, description, amount, date, due_date, paid_at, payment_method,
    is_sale, sale_patient_id, sale_vial_id, sale_mg, created_at
"#;

/// Inclusive date range filter for cash flow queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Period {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Period {
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }
}

impl Database {
    /// Insert a cash flow entry.
    pub fn insert_cash_flow_entry(&self, entry: &CashFlowEntry) -> DbResult<()> {
        let sale = entry.sale.as_ref();
        self.conn.execute(
            r#"
            INSERT INTO cash_flow (
                entry_id, kind, description, amount, date, due_date, paid_at, payment_method,
                is_sale, sale_patient_id, sale_vial_id, sale_mg, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                entry.entry_id,
                entry.kind.as_str(),
                entry.description,
                entry.amount,
                entry.date,
                entry.due_date,
                entry.paid_at,
                entry.payment_method.map(|m| m.as_str()),
                sale.is_some(),
                sale.and_then(|s| s.patient_id.as_deref()),
                sale.and_then(|s| s.vial_id.as_deref()),
                sale.and_then(|s| s.mg),
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get an entry by ID.
    pub fn get_cash_flow_entry(&self, entry_id: &str) -> DbResult<Option<CashFlowEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM cash_flow WHERE entry_id = ?", ENTRY_COLUMNS),
                [entry_id],
                entry_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Entries whose date falls in `period`, ordered by date.
    pub fn list_cash_flow(&self, period: &Period) -> DbResult<Vec<CashFlowEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM cash_flow
            WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
            ORDER BY date, created_at
            "#,
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![period.from, period.to], entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Sales made to a patient, newest first.
    pub fn list_sales_for_patient(&self, patient_id: &str) -> DbResult<Vec<CashFlowEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM cash_flow WHERE is_sale = 1 AND sale_patient_id = ? ORDER BY date DESC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Record payment of an entry.
    pub fn mark_entry_paid(
        &self,
        entry_id: &str,
        paid_at: &str,
        method: Option<PaymentMethod>,
    ) -> DbResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE cash_flow SET paid_at = ?2, payment_method = COALESCE(?3, payment_method)
            WHERE entry_id = ?1
            "#,
            params![entry_id, paid_at, method.map(|m| m.as_str())],
        )?;
        if rows == 0 {
            return Err(DbError::NotFound(entry_id.to_string()));
        }
        Ok(())
    }

    /// Delete an entry. Returns false if none matched.
    pub fn delete_cash_flow_entry(&self, entry_id: &str) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM cash_flow WHERE entry_id = ?", [entry_id])?;
        Ok(rows > 0)
    }
}

/// Intermediate row struct for database mapping.
struct EntryRow {
    entry_id: String,
    kind: String,
    description: String,
    amount: f64,
    date: String,
    due_date: Option<String>,
    paid_at: Option<String>,
    payment_method: Option<String>,
    is_sale: bool,
    sale_patient_id: Option<String>,
    sale_vial_id: Option<String>,
    sale_mg: Option<f64>,
    created_at: String,
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        entry_id: row.get(0)?,
        kind: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        date: row.get(4)?,
        due_date: row.get(5)?,
        paid_at: row.get(6)?,
        payment_method: row.get(7)?,
        is_sale: row.get(8)?,
        sale_patient_id: row.get(9)?,
        sale_vial_id: row.get(10)?,
        sale_mg: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl TryFrom<EntryRow> for CashFlowEntry {
    type Error = DbError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let kind = FlowKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown cash flow kind: {}", row.kind)))?;
        let payment_method = row
            .payment_method
            .map(|m| {
                PaymentMethod::parse(&m)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown payment method: {}", m)))
            })
            .transpose()?;
        let sale = row.is_sale.then(|| SaleDetails {
            patient_id: row.sale_patient_id,
            vial_id: row.sale_vial_id,
            mg: row.sale_mg,
        });

        Ok(CashFlowEntry {
            entry_id: row.entry_id,
            kind,
            description: row.description,
            amount: row.amount,
            date: row.date,
            due_date: row.due_date,
            paid_at: row.paid_at,
            payment_method,
            sale,
            created_at: row.created_at,
        })
    }
}
