//! Cash-flow and sale models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse_date;

/// Direction of a cash-flow entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlowKind {
    #[serde(rename = "entrada")]
    Income,
    #[serde(rename = "saida")]
    Expense,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Income => "entrada",
            FlowKind::Expense => "saida",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entrada" => Some(FlowKind::Income),
            "saida" => Some(FlowKind::Expense),
            _ => None,
        }
    }
}

/// Payment status derived at read time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    #[serde(rename = "pago")]
    Paid,
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "vencido")]
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "pago",
            PaymentStatus::Pending => "pendente",
            PaymentStatus::Overdue => "vencido",
        }
    }
}

/// How an entry was (or will be) settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "pix")]
    Pix,
    #[serde(rename = "dinheiro")]
    Cash,
    #[serde(rename = "cartao")]
    Card,
    #[serde(rename = "transferencia")]
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Cash => "dinheiro",
            PaymentMethod::Card => "cartao",
            PaymentMethod::Transfer => "transferencia",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pix" => Some(PaymentMethod::Pix),
            "dinheiro" => Some(PaymentMethod::Cash),
            "cartao" => Some(PaymentMethod::Card),
            "transferencia" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

/// Sale details attached to an income entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleDetails {
    pub patient_id: Option<String>,
    /// Vial the milligrams were drawn from
    pub vial_id: Option<String>,
    pub mg: Option<f64>,
}

/// A financial record. Sales are income entries carrying [`SaleDetails`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashFlowEntry {
    pub entry_id: String,
    pub kind: FlowKind,
    pub description: String,
    pub amount: f64,
    /// Competence date (YYYY-MM-DD)
    pub date: String,
    /// Due date; entries without one are due on `date`
    pub due_date: Option<String>,
    /// Settlement date; None while unpaid
    pub paid_at: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub sale: Option<SaleDetails>,
    pub created_at: String,
}

impl CashFlowEntry {
    pub fn new(kind: FlowKind, description: String, amount: f64, date: String) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            kind,
            description,
            amount,
            date,
            due_date: None,
            paid_at: None,
            payment_method: None,
            sale: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_sale(&self) -> bool {
        self.sale.is_some()
    }

    /// Status of this entry as of `today`.
    pub fn status(&self, today: NaiveDate) -> PaymentStatus {
        let due = self.due_date.as_deref().unwrap_or(&self.date);
        resolve_payment_status(self.paid_at.is_some(), due, today)
    }

    /// Amount with sign applied: income positive, expense negative.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            FlowKind::Income => self.amount,
            FlowKind::Expense => -self.amount,
        }
    }
}

/// Derive payment status: paid wins, then a past due date means overdue.
/// An unparseable due date never marks an entry overdue.
pub fn resolve_payment_status(paid: bool, due_date: &str, today: NaiveDate) -> PaymentStatus {
    if paid {
        return PaymentStatus::Paid;
    }
    match parse_date(due_date) {
        Some(due) if due < today => PaymentStatus::Overdue,
        _ => PaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_payment_status() {
        let today = day(2024, 1, 10);
        assert_eq!(resolve_payment_status(true, "2023-12-01", today), PaymentStatus::Paid);
        assert_eq!(resolve_payment_status(false, "2024-01-09", today), PaymentStatus::Overdue);
        assert_eq!(resolve_payment_status(false, "2024-01-10", today), PaymentStatus::Pending);
        assert_eq!(resolve_payment_status(false, "not a date", today), PaymentStatus::Pending);
    }

    #[test]
    fn test_entry_status_falls_back_to_date() {
        let mut entry = CashFlowEntry::new(FlowKind::Expense, "Rent".into(), 2500.0, "2024-01-05".into());
        assert_eq!(entry.status(day(2024, 1, 10)), PaymentStatus::Overdue);

        entry.due_date = Some("2024-01-15".into());
        assert_eq!(entry.status(day(2024, 1, 10)), PaymentStatus::Pending);
        assert_eq!(entry.signed_amount(), -2500.0);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&FlowKind::Income).unwrap(), "\"entrada\"");
        assert_eq!(serde_json::to_string(&PaymentStatus::Overdue).unwrap(), "\"vencido\"");
        assert_eq!(PaymentMethod::parse("cartao"), Some(PaymentMethod::Card));
        assert_eq!(FlowKind::parse("saida"), Some(FlowKind::Expense));
    }
}
