//! Period financial report.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::{Database, DbResult, Period};
use crate::metrics::round2;
use crate::models::{CashFlowEntry, FlowKind, PaymentMethod, PaymentStatus};

/// Cash flow of a period with totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialReport {
    pub metadata: ReportMetadata,
    pub summary: FinancialSummary,
    pub rows: Vec<FinancialRow>,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    /// Inclusive start of the period, if bounded
    pub from: Option<String>,
    /// Inclusive end of the period, if bounded
    pub to: Option<String>,
    /// Day payment statuses were resolved against
    pub as_of: String,
    pub generated_at: String,
}

/// Totals over every entry in the period, paid or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    /// Unpaid income not yet due
    pub receivable_pending: f64,
    /// Unpaid income past due
    pub receivable_overdue: f64,
    /// Unpaid expenses, due or not
    pub payable_open: f64,
    pub sales: usize,
    pub sold_mg: f64,
}

/// One cash flow entry as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialRow {
    pub entry_id: String,
    pub date: String,
    pub kind: FlowKind,
    pub description: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub patient_id: Option<String>,
    pub mg: Option<f64>,
}

impl FinancialReport {
    /// Build a report from entries, resolving payment status against `today`.
    pub fn from_entries(entries: &[CashFlowEntry], period: &Period, today: NaiveDate) -> Self {
        let mut summary = FinancialSummary::default();
        let mut rows = Vec::with_capacity(entries.len());

        for entry in entries {
            let status = entry.status(today);
            match entry.kind {
                FlowKind::Income => {
                    summary.income += entry.amount;
                    match status {
                        PaymentStatus::Pending => summary.receivable_pending += entry.amount,
                        PaymentStatus::Overdue => summary.receivable_overdue += entry.amount,
                        PaymentStatus::Paid => {}
                    }
                }
                FlowKind::Expense => {
                    summary.expense += entry.amount;
                    if status != PaymentStatus::Paid {
                        summary.payable_open += entry.amount;
                    }
                }
            }

            let sale = entry.sale.as_ref();
            if let Some(sale) = sale {
                summary.sales += 1;
                summary.sold_mg += sale.mg.unwrap_or(0.0);
            }

            rows.push(FinancialRow {
                entry_id: entry.entry_id.clone(),
                date: entry.date.clone(),
                kind: entry.kind,
                description: entry.description.clone(),
                amount: entry.amount,
                status,
                payment_method: entry.payment_method,
                patient_id: sale.and_then(|s| s.patient_id.clone()),
                mg: sale.and_then(|s| s.mg),
            });
        }

        summary.income = round2(summary.income);
        summary.expense = round2(summary.expense);
        summary.balance = round2(summary.income - summary.expense);
        summary.receivable_pending = round2(summary.receivable_pending);
        summary.receivable_overdue = round2(summary.receivable_overdue);
        summary.payable_open = round2(summary.payable_open);
        summary.sold_mg = round2(summary.sold_mg);

        Self {
            metadata: ReportMetadata {
                from: period.from.clone(),
                to: period.to.clone(),
                as_of: crate::models::format_date(today),
                generated_at: chrono::Utc::now().to_rfc3339(),
            },
            summary,
            rows,
        }
    }

    /// Load the period's entries and build the report.
    pub fn generate(db: &Database, period: &Period, today: NaiveDate) -> DbResult<Self> {
        let entries = db.list_cash_flow(period)?;
        tracing::debug!(entries = entries.len(), "Building financial report");
        Ok(Self::from_entries(&entries, period, today))
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export rows to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("entry_id,date,kind,description,amount,status,payment_method,patient_id,mg\n");

        for row in &self.rows {
            csv.push_str(&format!(
                "{},{},{},{},{:.2},{},{},{},{}\n",
                escape_csv(&row.entry_id),
                escape_csv(&row.date),
                row.kind.as_str(),
                escape_csv(&row.description),
                row.amount,
                row.status.as_str(),
                row.payment_method.map(|m| m.as_str()).unwrap_or(""),
                escape_csv(row.patient_id.as_deref().unwrap_or("")),
                row.mg.map(|mg| mg.to_string()).unwrap_or_default(),
            ));
        }

        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SaleDetails;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entries() -> Vec<CashFlowEntry> {
        let mut sale = CashFlowEntry::new(FlowKind::Income, "Sale, 10 mg".into(), 450.0, "2024-01-05".into());
        sale.sale = Some(SaleDetails {
            patient_id: Some("p1".into()),
            vial_id: Some("v1".into()),
            mg: Some(10.0),
        });
        sale.paid_at = Some("2024-01-05".into());
        sale.payment_method = Some(PaymentMethod::Pix);

        let mut late = CashFlowEntry::new(FlowKind::Income, "Consult".into(), 200.0, "2024-01-02".into());
        late.due_date = Some("2024-01-08".into());

        let upcoming = CashFlowEntry::new(FlowKind::Income, "Consult".into(), 150.0, "2024-01-20".into());
        let rent = CashFlowEntry::new(FlowKind::Expense, "Rent".into(), 500.0, "2024-01-15".into());

        vec![sale, late, upcoming, rent]
    }

    #[test]
    fn test_summary_totals() {
        let report = FinancialReport::from_entries(&entries(), &Period::default(), day(2024, 1, 10));
        let summary = &report.summary;

        assert_eq!(summary.income, 800.0);
        assert_eq!(summary.expense, 500.0);
        assert_eq!(summary.balance, 300.0);
        assert_eq!(summary.receivable_overdue, 200.0);
        assert_eq!(summary.receivable_pending, 150.0);
        assert_eq!(summary.payable_open, 500.0);
        assert_eq!(summary.sales, 1);
        assert_eq!(summary.sold_mg, 10.0);
        assert_eq!(report.metadata.as_of, "2024-01-10");
    }

    #[test]
    fn test_csv_output() {
        let report = FinancialReport::from_entries(&entries(), &Period::default(), day(2024, 1, 10));
        let csv = report.to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("entry_id,date,kind"));
        assert!(lines[1].contains("\"Sale, 10 mg\""));
        assert!(lines[1].contains(",entrada,"));
        assert!(lines[1].contains(",pago,pix,p1,10"));
        assert!(lines[2].contains(",vencido,"));
        assert!(lines[4].contains(",saida,"));
    }

    #[test]
    fn test_generate_from_database() {
        let db = Database::open_in_memory().unwrap();
        for entry in entries() {
            if entry.sale.is_none() {
                db.insert_cash_flow_entry(&entry).unwrap();
            }
        }

        let report = FinancialReport::generate(
            &db,
            &Period::between("2024-01-01", "2024-01-16"),
            day(2024, 1, 10),
        )
        .unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.summary.balance, -300.0);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"receivable_overdue\": 200.0"));
    }
}
