//! Clinic workflows on top of the database.
//!
//! [`Clinic`] ties the pure schedule, lifecycle and reward logic to
//! persistence. Every operation either completes all of its writes or leaves
//! the stored state as it was.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ClinicConfig;
use crate::db::{AdministrationStamp, Database, DbError, Period};
use crate::metrics::{bmi_from_cm, goal_progress, weight_loss_kg};
use crate::models::{
    format_date, Bioimpedance, CashFlowEntry, Dose, Evolution, FlowKind, Patient, PatientRecord,
    PaymentMethod, PaymentStatus, SaleDetails, TreatmentStatus, Vial, VialSize,
};
use crate::rewards::RewardTier;
use crate::schedule::{
    classify_dose, lifecycle, resolve_dose_status, DoseDisplay, DoseStatus,
};
use crate::validation::{schemas, ValidationErrors};

/// Clinic workflow errors.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vial {vial_id} has {remaining_mg} mg left, requested {requested_mg} mg")]
    InsufficientStock {
        vial_id: String,
        remaining_mg: f64,
        requested_mg: f64,
    },

    #[error("No reward available for {points} points")]
    NoRewardAvailable { points: u32 },

    #[error("Treatment of patient {0} is not active")]
    InactiveTreatment(String),
}

impl From<rusqlite::Error> for ClinicError {
    fn from(e: rusqlite::Error) -> Self {
        ClinicError::Db(e.into())
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;

/// Enrollment data for a new patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<String>,
    pub height_cm: f64,
    pub initial_weight_kg: f64,
    #[serde(default)]
    pub desired_weight_kg: Option<f64>,
    pub first_dose_date: String,
    #[serde(default)]
    pub default_dose_mg: Option<f64>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewPatient {
    fn into_patient(self) -> Patient {
        let mut patient = Patient::new(
            self.full_name.trim().to_string(),
            self.height_cm,
            self.initial_weight_kg,
            self.first_dose_date.trim().to_string(),
        );
        patient.birth_date = self.birth_date;
        patient.desired_weight_kg = self.desired_weight_kg;
        patient.default_dose_mg = self.default_dose_mg;
        patient.phone = self.phone;
        patient.notes = self.notes;
        patient
    }
}

/// Values recorded when a dose is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdministerDose {
    pub administered_mg: Option<f64>,
    pub weight_kg: Option<f64>,
    /// Time of day, HH:MM
    pub time: Option<String>,
}

/// Result of administering a dose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdministeredDose {
    pub dose: Dose,
    /// Points balance after the award
    pub points: u32,
}

/// A medication sale drawn from a vial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSale {
    pub patient_id: Option<String>,
    pub vial_id: String,
    pub mg: f64,
    pub amount: f64,
    pub date: String,
    pub due_date: Option<String>,
    /// Set when the sale is paid on the spot
    pub payment_method: Option<PaymentMethod>,
}

/// Outcome of a reward redemption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Redemption {
    pub tier: RewardTier,
    pub remaining_points: u32,
}

/// Who is looking at the data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessLevel {
    /// Patient portal restricted to a single record
    Portal { patient_id: String },
    Staff,
}

/// A pending dose with its patient and display status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardDose {
    pub patient_id: String,
    pub patient_name: String,
    pub dose: Dose,
    pub display: DoseDisplay,
}

/// Clinic overview for a given day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub active_patients: usize,
    pub overdue_doses: usize,
    pub overdue: Vec<DashboardDose>,
    pub upcoming: Vec<DashboardDose>,
    pub stock_remaining_mg: f64,
    pub receivable_pending: f64,
    pub receivable_overdue: f64,
}

/// Derived progress figures for one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub patient_id: String,
    pub full_name: String,
    pub treatment_status: TreatmentStatus,
    pub current_weight_kg: f64,
    pub bmi: Option<f64>,
    pub weight_loss_kg: f64,
    pub goal_progress: Option<f64>,
    pub administered_doses: usize,
    pub pending_doses: usize,
    pub points: u32,
    pub highest_reward: Option<RewardTier>,
    /// Next tier and the points still missing
    pub next_reward: Option<(RewardTier, u32)>,
}

/// Clinic workflows bound to a database and configuration.
pub struct Clinic<'a> {
    db: &'a Database,
    config: &'a ClinicConfig,
}

impl<'a> Clinic<'a> {
    pub fn new(db: &'a Database, config: &'a ClinicConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &ClinicConfig {
        self.config
    }

    /// Enroll a patient and store the generated schedule.
    pub fn enroll_patient(&self, new_patient: NewPatient) -> ClinicResult<PatientRecord> {
        let patient = new_patient.into_patient();
        let mut record = lifecycle::start_treatment(patient, &self.config.schedule.rule())?;
        self.db
            .insert_patient_with_doses(&record.patient, &mut record.doses)?;

        tracing::info!(
            patient_id = %record.patient.local_id,
            doses = record.doses.len(),
            "Enrolled patient"
        );
        Ok(record)
    }

    /// Validate a submitted enrollment form, then enroll.
    pub fn enroll_patient_from_form(&self, form: &Value) -> ClinicResult<PatientRecord> {
        schemas::patient_enrollment().validate(form)?;
        let new_patient: NewPatient = serde_json::from_value(strip_blank_fields(form))
            .map_err(|e| ValidationErrors::single("form", e.to_string()))?;
        self.enroll_patient(new_patient)
    }

    /// Load a patient with doses and evolutions.
    pub fn get_record(&self, patient_id: &str) -> ClinicResult<PatientRecord> {
        let patient = self.require_patient(patient_id)?;
        let doses = self.db.list_doses(patient_id)?;
        let mut record = PatientRecord::new(patient, doses);
        record.evolutions = self.db.list_evolutions(patient_id)?;
        Ok(record)
    }

    /// Progress figures for a patient.
    pub fn patient_summary(&self, patient_id: &str) -> ClinicResult<PatientSummary> {
        let record = self.get_record(patient_id)?;
        let patient = &record.patient;
        let current = record.current_weight_kg();
        let tiers = &self.config.rewards.tiers;

        Ok(PatientSummary {
            patient_id: patient.local_id.clone(),
            full_name: patient.full_name.clone(),
            treatment_status: patient.treatment_status,
            current_weight_kg: current,
            bmi: bmi_from_cm(current, patient.height_cm),
            weight_loss_kg: weight_loss_kg(patient.initial_weight_kg, current),
            goal_progress: patient
                .desired_weight_kg
                .and_then(|desired| goal_progress(patient.initial_weight_kg, current, desired)),
            administered_doses: record.administered_count(),
            pending_doses: record.doses.len() - record.administered_count(),
            points: patient.points,
            highest_reward: tiers.get_highest_reward(patient.points).cloned(),
            next_reward: tiers
                .next_reward(patient.points)
                .map(|(tier, missing)| (tier.clone(), missing)),
        })
    }

    /// Mark a dose administered, stamp its BMI and award points.
    pub fn administer_dose(
        &self,
        patient_id: &str,
        dose_id: &str,
        input: AdministerDose,
    ) -> ClinicResult<AdministeredDose> {
        let patient = self.require_patient(patient_id)?;
        if !patient.treatment_status.is_active() {
            return Err(ClinicError::InactiveTreatment(patient_id.to_string()));
        }
        if self.db.get_dose(patient_id, dose_id)?.is_none() {
            return Err(ClinicError::NotFound(format!("dose {}", dose_id)));
        }

        let stamp = AdministrationStamp {
            administered_mg: input.administered_mg.or(patient.default_dose_mg),
            weight_kg: input.weight_kg,
            bmi: input
                .weight_kg
                .and_then(|w| bmi_from_cm(w, patient.height_cm)),
            time: input.time,
        };

        let tx = self.db.begin()?;
        self.db.mark_dose_administered(dose_id, &stamp)?;
        let points = self
            .db
            .add_points(patient_id, i64::from(self.config.rewards.points_per_dose))?;
        tx.commit()?;

        let dose = self
            .db
            .get_dose(patient_id, dose_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("dose {}", dose_id)))?;

        tracing::info!(patient_id, dose_id, points, "Dose administered");
        Ok(AdministeredDose { dose, points })
    }

    /// Store a bioimpedance snapshot.
    pub fn record_evolution(
        &self,
        patient_id: &str,
        date: NaiveDate,
        metrics: Bioimpedance,
        notes: Option<String>,
    ) -> ClinicResult<Evolution> {
        let patient = self.require_patient(patient_id)?;

        let mut metrics = metrics;
        if metrics.bmi.is_none() {
            metrics.bmi = metrics
                .weight_kg
                .and_then(|w| bmi_from_cm(w, patient.height_cm));
        }
        let mut evolution = Evolution::new(patient.local_id, format_date(date), metrics);
        evolution.notes = notes;
        self.db.insert_evolution(&evolution)?;

        tracing::debug!(patient_id, date = %evolution.date, "Recorded evolution");
        Ok(evolution)
    }

    /// Close an active treatment with a reason.
    pub fn terminate_treatment(
        &self,
        patient_id: &str,
        reason: &str,
        target: TreatmentStatus,
        date: NaiveDate,
    ) -> ClinicResult<Patient> {
        let mut patient = self.require_patient(patient_id)?;
        lifecycle::terminate(&mut patient, reason, target, date)?;
        self.db.update_patient(&mut patient)?;

        tracing::info!(patient_id, status = %target, "Treatment terminated");
        Ok(patient)
    }

    /// Reactivate a terminated treatment.
    ///
    /// Administered doses stay. Pending doses are replaced by a fresh schedule
    /// starting at `anchor`, or at `today` when no anchor is given.
    pub fn reactivate_treatment(
        &self,
        patient_id: &str,
        anchor: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ClinicResult<PatientRecord> {
        let mut record = self.get_record(patient_id)?;
        let anchor = anchor.unwrap_or(today);
        let outcome = lifecycle::reactivate(&mut record, anchor, &self.config.schedule.rule())?;

        let scheduled = outcome.scheduled.clone();
        let deleted = self
            .db
            .save_reactivation(&mut record.patient, &mut record.doses[scheduled])?;

        tracing::info!(
            patient_id,
            anchor = %format_date(anchor),
            discarded = deleted,
            scheduled = outcome.scheduled.len(),
            "Treatment reactivated"
        );
        Ok(record)
    }

    /// Overview of active treatments, stock and receivables on `today`.
    pub fn dashboard(&self, today: NaiveDate) -> ClinicResult<Dashboard> {
        let active_patients = self.db.list_patients_by_status(TreatmentStatus::Active)?.len();
        let window = self.config.schedule.upcoming_window_days;

        let mut overdue = Vec::new();
        let mut upcoming = Vec::new();
        for pending in self.db.list_pending_doses_for_active_patients()? {
            let status = classify_dose(&pending.dose, today);
            let in_window = pending
                .dose
                .scheduled_date()
                .map(|date| (0..=window).contains(&(date - today).num_days()))
                .unwrap_or(false);
            if status != DoseStatus::Overdue && !in_window {
                continue;
            }

            let entry = DashboardDose {
                display: resolve_dose_status(&pending.dose, today),
                patient_id: pending.patient_id,
                patient_name: pending.patient_name,
                dose: pending.dose,
            };
            if status == DoseStatus::Overdue {
                overdue.push(entry);
            } else {
                upcoming.push(entry);
            }
        }

        let stock_remaining_mg: f64 = self
            .db
            .list_vials(true)?
            .iter()
            .map(Vial::remaining_mg)
            .sum();

        let mut receivable_pending = 0.0;
        let mut receivable_overdue = 0.0;
        for entry in self.db.list_cash_flow(&Period::default())? {
            if entry.kind != FlowKind::Income {
                continue;
            }
            match entry.status(today) {
                PaymentStatus::Pending => receivable_pending += entry.amount,
                PaymentStatus::Overdue => receivable_overdue += entry.amount,
                PaymentStatus::Paid => {}
            }
        }

        Ok(Dashboard {
            active_patients,
            overdue_doses: overdue.len(),
            overdue,
            upcoming,
            stock_remaining_mg,
            receivable_pending,
            receivable_overdue,
        })
    }

    /// Redeem the highest reward the patient's points reach.
    pub fn redeem_reward(&self, patient_id: &str) -> ClinicResult<Redemption> {
        let patient = self.require_patient(patient_id)?;
        let tier = self
            .config
            .rewards
            .tiers
            .get_highest_reward(patient.points)
            .cloned()
            .ok_or(ClinicError::NoRewardAvailable {
                points: patient.points,
            })?;

        let remaining_points = self
            .db
            .add_points(patient_id, -i64::from(tier.threshold))?;

        tracing::info!(patient_id, reward = %tier.label, remaining_points, "Reward redeemed");
        Ok(Redemption {
            tier,
            remaining_points,
        })
    }

    /// Register a purchased vial.
    pub fn register_vial(&self, purchase_date: NaiveDate, size: VialSize, cost: f64) -> ClinicResult<Vial> {
        if !(cost.is_finite() && cost >= 0.0) {
            return Err(ValidationErrors::single("cost", "Must be at least 0").into());
        }
        let vial = Vial::new(format_date(purchase_date), size, cost);
        let mut expense = CashFlowEntry::new(
            FlowKind::Expense,
            format!("Vial purchase ({} mg)", size.total_mg()),
            cost,
            vial.purchase_date.clone(),
        );
        expense.paid_at = Some(vial.purchase_date.clone());

        let tx = self.db.begin()?;
        self.db.insert_vial(&vial)?;
        self.db.insert_cash_flow_entry(&expense)?;
        tx.commit()?;

        tracing::info!(vial_id = %vial.vial_id, total_mg = size.total_mg(), "Vial registered");
        Ok(vial)
    }

    /// Validate a vial purchase form, then register.
    pub fn register_vial_from_form(&self, form: &Value) -> ClinicResult<Vial> {
        schemas::vial_purchase().validate(form)?;
        let date = form_date(form, "purchase_date")?;
        let total_mg = form
            .get("total_mg")
            .and_then(Value::as_u64)
            .and_then(|mg| u32::try_from(mg).ok())
            .ok_or_else(|| ValidationErrors::single("total_mg", "Must be an integer"))?;
        let size = VialSize::try_from(total_mg)
            .map_err(|e| ValidationErrors::single("total_mg", e))?;
        let cost = form.get("cost").and_then(Value::as_f64).unwrap_or(0.0);
        self.register_vial(date, size, cost)
    }

    /// Sell medication from a vial, creating the matching income entry.
    pub fn record_sale(&self, sale: NewSale) -> ClinicResult<CashFlowEntry> {
        if let Some(patient_id) = &sale.patient_id {
            self.require_patient(patient_id)?;
        }
        let vial = self
            .db
            .get_vial(&sale.vial_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("vial {}", sale.vial_id)))?;
        if !vial.can_sell(sale.mg) {
            tracing::warn!(vial_id = %vial.vial_id, requested_mg = sale.mg, "Sale exceeds stock");
            let remaining_mg = vial.remaining_mg();
            return Err(ClinicError::InsufficientStock {
                vial_id: vial.vial_id,
                remaining_mg,
                requested_mg: sale.mg,
            });
        }

        let mut entry = CashFlowEntry::new(
            FlowKind::Income,
            format!("Sale of {} mg", sale.mg),
            sale.amount,
            sale.date.clone(),
        );
        entry.due_date = sale.due_date;
        if sale.payment_method.is_some() {
            entry.paid_at = Some(sale.date);
            entry.payment_method = sale.payment_method;
        }
        entry.sale = Some(SaleDetails {
            patient_id: sale.patient_id,
            vial_id: Some(vial.vial_id.clone()),
            mg: Some(sale.mg),
        });

        let tx = self.db.begin()?;
        self.db.record_vial_sale(&vial.vial_id, sale.mg)?;
        self.db.insert_cash_flow_entry(&entry)?;
        tx.commit()?;

        tracing::info!(entry_id = %entry.entry_id, vial_id = %vial.vial_id, mg = sale.mg, "Sale recorded");
        Ok(entry)
    }

    /// Record an expense.
    pub fn record_expense(
        &self,
        description: &str,
        amount: f64,
        date: NaiveDate,
        due_date: Option<NaiveDate>,
    ) -> ClinicResult<CashFlowEntry> {
        let mut entry = CashFlowEntry::new(
            FlowKind::Expense,
            description.trim().to_string(),
            amount,
            format_date(date),
        );
        entry.due_date = due_date.map(format_date);
        self.record_entry(entry)
    }

    /// Validate a cash-flow form, then record it.
    pub fn record_entry_from_form(&self, form: &Value) -> ClinicResult<CashFlowEntry> {
        schemas::cash_flow_entry().validate(form)?;
        let kind = form
            .get("kind")
            .and_then(Value::as_str)
            .and_then(FlowKind::parse)
            .ok_or_else(|| ValidationErrors::single("kind", "Required"))?;
        let description = form
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let amount = form.get("amount").and_then(Value::as_f64).unwrap_or(0.0);

        let mut entry = CashFlowEntry::new(kind, description, amount, format_date(form_date(form, "date")?));
        entry.due_date = optional_text(form, "due_date");
        entry.payment_method = optional_text(form, "payment_method")
            .as_deref()
            .and_then(PaymentMethod::parse);
        self.record_entry(entry)
    }

    /// Store a prepared cash-flow entry.
    pub fn record_entry(&self, entry: CashFlowEntry) -> ClinicResult<CashFlowEntry> {
        if !(entry.amount.is_finite() && entry.amount > 0.0) {
            return Err(ValidationErrors::single("amount", "Must be greater than 0").into());
        }
        if entry.description.trim().is_empty() {
            return Err(ValidationErrors::single("description", "Required").into());
        }
        self.db.insert_cash_flow_entry(&entry)?;
        tracing::debug!(entry_id = %entry.entry_id, kind = entry.kind.as_str(), "Cash flow entry recorded");
        Ok(entry)
    }

    /// Record payment of an entry.
    pub fn mark_entry_paid(
        &self,
        entry_id: &str,
        paid_at: NaiveDate,
        method: Option<PaymentMethod>,
    ) -> ClinicResult<CashFlowEntry> {
        self.db.mark_entry_paid(entry_id, &format_date(paid_at), method)?;
        self.db
            .get_cash_flow_entry(entry_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("entry {}", entry_id)))
    }

    /// Resolve what an authenticated user may see.
    pub fn access_for(&self, user_id: &str) -> ClinicResult<AccessLevel> {
        Ok(match self.db.get_portal_patient_id(user_id)? {
            Some(patient_id) => AccessLevel::Portal { patient_id },
            None => AccessLevel::Staff,
        })
    }

    fn require_patient(&self, patient_id: &str) -> ClinicResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", patient_id)))
    }
}

/// Drop blank string fields so optional values deserialize as `None`.
fn strip_blank_fields(form: &Value) -> Value {
    match form {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !matches!(v, Value::String(s) if s.trim().is_empty()))
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn optional_text(form: &Value, field: &str) -> Option<String> {
    form.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn form_date(form: &Value, field: &str) -> Result<NaiveDate, ValidationErrors> {
    optional_text(form, field)
        .as_deref()
        .and_then(crate::models::parse_date)
        .ok_or_else(|| ValidationErrors::single(field, "Invalid date"))
}
