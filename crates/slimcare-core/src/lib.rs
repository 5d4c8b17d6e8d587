//! SlimCare Core Library
//!
//! Local-first management for a weight-loss clinic: patients, dose schedules,
//! treatment lifecycle, bioimpedance evolution, vial stock, cash flow and
//! reward points.
//!
//! # Architecture
//!
//! ```text
//!   Enrollment form ──► Validation ──► start_treatment ──► Schedule (N doses)
//!                                                               │
//!                                    ┌──────────────────────────┤
//!                                    ▼                          ▼
//!                            administer_dose            read-time status
//!                          (BMI stamp + points)     (overdue / upcoming / ...)
//!                                    │
//!          terminate ◄── active ──► reactivate (keep administered,
//!                                               regenerate pending)
//!
//!   Vials ──► record_sale ──► cash flow (income) ──► Financial report
//! ```
//!
//! # Core Principle
//!
//! **Derived state is never stored.** Dose status, payment status and reward
//! tiers are computed when read, from stored facts and the current date.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with optimistic patient versioning
//! - [`models`]: Domain types (Patient, Dose, Evolution, Vial, CashFlowEntry)
//! - [`metrics`]: BMI and weight progress
//! - [`schedule`]: Dose generation, status resolution and treatment lifecycle
//! - [`rewards`]: Reward tier table
//! - [`clinic`]: Workflows tying the above to persistence
//! - [`export`]: Financial and rewards reports
//! - [`validation`], [`settings`], [`config`], [`logging`]: supporting layers

pub mod clinic;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod rewards;
pub mod schedule;
pub mod settings;
pub mod validation;

// Re-export commonly used types
pub use clinic::{AccessLevel, Clinic, ClinicError, NewPatient, NewSale};
pub use config::{load_config, ClinicConfig};
pub use db::Database;
pub use models::{
    Bioimpedance, CashFlowEntry, Dose, Evolution, Patient, PatientRecord, TreatmentStatus, Vial,
    VialSize,
};
pub use rewards::{RewardTable, RewardTier};
pub use schedule::{generate_schedule, resolve_dose_status, DoseStatus, ScheduleRule};
pub use settings::{Customization, SettingsContext};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SlimCareError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Field errors as a JSON object
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Record changed since it was read: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for SlimCareError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(id) => SlimCareError::NotFound(id),
            db::DbError::Conflict { id, .. } => SlimCareError::Conflict(id),
            other => SlimCareError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ClinicError> for SlimCareError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::Db(e) => e.into(),
            ClinicError::NotFound(what) => SlimCareError::NotFound(what),
            ClinicError::Validation(errors) => match serde_json::to_string(&errors.fields) {
                Ok(json) => SlimCareError::ValidationFailed(json),
                Err(_) => SlimCareError::InvalidInput(errors.to_string()),
            },
            other => SlimCareError::InvalidInput(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SlimCareError {
    fn from(e: serde_json::Error) -> Self {
        SlimCareError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for SlimCareError {
    fn from(e: config::ConfigError) -> Self {
        SlimCareError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SlimCareError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        SlimCareError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_ffi_date(field: &str, value: &str) -> Result<NaiveDate, SlimCareError> {
    models::parse_date(value)
        .ok_or_else(|| SlimCareError::InvalidInput(format!("{}: expected YYYY-MM-DD, got {:?}", field, value)))
}

fn parse_payment_method(method: Option<&str>) -> Result<Option<models::PaymentMethod>, SlimCareError> {
    method
        .map(|m| {
            models::PaymentMethod::parse(m)
                .ok_or_else(|| SlimCareError::InvalidInput(format!("Unknown payment method: {}", m)))
        })
        .transpose()
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default configuration.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<SlimCareCore>, SlimCareError> {
    let db = Database::open(&path)?;
    SlimCareCore::build(db, ClinicConfig::default())
}

/// Load a TOML configuration file and open the database it names.
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<SlimCareCore>, SlimCareError> {
    let config = load_config(&config_path)?;
    logging::init_logging(&config.logging.level);
    let db = Database::open(&config.database.path)?;
    SlimCareCore::build(db, config)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<SlimCareCore>, SlimCareError> {
    let db = Database::open_in_memory()?;
    SlimCareCore::build(db, ClinicConfig::default())
}

/// Install the tracing subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging(level: String) -> bool {
    logging::init_logging(&level)
}

/// BMI rounded to two decimals, or nothing for a non-positive height or weight.
#[uniffi::export]
pub fn calculate_bmi(weight_kg: f64, height_m: f64) -> Option<f64> {
    metrics::calculate_bmi(weight_kg, height_m)
}

/// Highest default reward tier reached by `points`.
#[uniffi::export]
pub fn highest_reward(points: u32) -> Option<FfiRewardTier> {
    RewardTable::default()
        .get_highest_reward(points)
        .cloned()
        .map(Into::into)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic handle for FFI.
#[derive(uniffi::Object)]
pub struct SlimCareCore {
    db: Arc<Mutex<Database>>,
    config: ClinicConfig,
    settings: SettingsContext,
}

impl SlimCareCore {
    fn build(db: Database, config: ClinicConfig) -> Result<Arc<Self>, SlimCareError> {
        let settings = SettingsContext::new(db.load_customization()?);
        Ok(Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            settings,
        }))
    }

    /// Shared customization context for in-process subscribers.
    pub fn settings(&self) -> &SettingsContext {
        &self.settings
    }
}

#[uniffi::export]
impl SlimCareCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Enroll a patient and generate the schedule.
    pub fn enroll_patient(&self, patient: FfiNewPatient) -> Result<FfiPatientRecord, SlimCareError> {
        let db = self.db.lock()?;
        let record = Clinic::new(&db, &self.config).enroll_patient(patient.into())?;
        Ok(FfiPatientRecord::from_record(record, schedule::today()))
    }

    /// Enroll from a submitted form (JSON object).
    pub fn enroll_patient_form(&self, form_json: String) -> Result<FfiPatientRecord, SlimCareError> {
        let form: serde_json::Value = serde_json::from_str(&form_json)?;
        let db = self.db.lock()?;
        let record = Clinic::new(&db, &self.config).enroll_patient_from_form(&form)?;
        Ok(FfiPatientRecord::from_record(record, schedule::today()))
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: String) -> Result<Option<FfiPatient>, SlimCareError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&local_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Patient with doses, statuses resolved for today.
    pub fn get_patient_record(&self, local_id: String) -> Result<FfiPatientRecord, SlimCareError> {
        let db = self.db.lock()?;
        let record = Clinic::new(&db, &self.config).get_record(&local_id)?;
        Ok(FfiPatientRecord::from_record(record, schedule::today()))
    }

    /// Progress summary as JSON.
    pub fn patient_summary_json(&self, local_id: String) -> Result<String, SlimCareError> {
        let db = self.db.lock()?;
        let summary = Clinic::new(&db, &self.config).patient_summary(&local_id)?;
        Ok(serde_json::to_string(&summary)?)
    }

    /// Search patients by name, tolerating small typos.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, SlimCareError> {
        let db = self.db.lock()?;
        let patients = db.search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Update editable patient fields. Fails with `Conflict` on a stale version.
    pub fn update_patient(&self, patient: FfiPatient) -> Result<FfiPatient, SlimCareError> {
        let db = self.db.lock()?;
        let mut stored = db
            .get_patient(&patient.local_id)?
            .ok_or_else(|| SlimCareError::NotFound(patient.local_id.clone()))?;
        stored.version = patient.version;
        stored.full_name = patient.full_name;
        stored.birth_date = patient.birth_date;
        stored.height_cm = patient.height_cm;
        stored.desired_weight_kg = patient.desired_weight_kg;
        stored.default_dose_mg = patient.default_dose_mg;
        stored.phone = patient.phone;
        stored.notes = patient.notes;
        db.update_patient(&mut stored)?;
        Ok(stored.into())
    }

    /// Link an authenticated user to a patient's portal.
    pub fn link_portal_user(&self, user_id: String, patient_id: String) -> Result<(), SlimCareError> {
        let db = self.db.lock()?;
        db.link_portal_user(&user_id, &patient_id)?;
        Ok(())
    }

    /// What an authenticated user may see.
    pub fn access_for(&self, user_id: String) -> Result<FfiAccessLevel, SlimCareError> {
        let db = self.db.lock()?;
        let access = Clinic::new(&db, &self.config).access_for(&user_id)?;
        Ok(access.into())
    }

    // =========================================================================
    // Treatment Operations
    // =========================================================================

    /// Administer a pending dose.
    pub fn administer_dose(
        &self,
        patient_id: String,
        dose_id: String,
        administered_mg: Option<f64>,
        weight_kg: Option<f64>,
        time: Option<String>,
    ) -> Result<FfiDose, SlimCareError> {
        let db = self.db.lock()?;
        let input = clinic::AdministerDose {
            administered_mg,
            weight_kg,
            time,
        };
        let result = Clinic::new(&db, &self.config).administer_dose(&patient_id, &dose_id, input)?;
        Ok(FfiDose::from_dose(result.dose, schedule::today()))
    }

    /// Record a bioimpedance evaluation.
    pub fn record_evolution(
        &self,
        patient_id: String,
        date: String,
        metrics: FfiBioimpedance,
        notes: Option<String>,
    ) -> Result<String, SlimCareError> {
        let date = parse_ffi_date("date", &date)?;
        let db = self.db.lock()?;
        let evolution =
            Clinic::new(&db, &self.config).record_evolution(&patient_id, date, metrics.into(), notes)?;
        Ok(evolution.evolution_id)
    }

    /// Close an active treatment. `target` is completed, abandoned or non-payment.
    pub fn terminate_treatment(
        &self,
        patient_id: String,
        reason: String,
        target: String,
        date: String,
    ) -> Result<FfiPatient, SlimCareError> {
        let target = TreatmentStatus::parse(&target)
            .ok_or_else(|| SlimCareError::InvalidInput(format!("Unknown treatment status: {}", target)))?;
        let date = parse_ffi_date("date", &date)?;
        let db = self.db.lock()?;
        let patient =
            Clinic::new(&db, &self.config).terminate_treatment(&patient_id, &reason, target, date)?;
        Ok(patient.into())
    }

    /// Reactivate a treatment, rescheduling pending doses from `anchor` (default today).
    pub fn reactivate_treatment(
        &self,
        patient_id: String,
        anchor: Option<String>,
    ) -> Result<FfiPatientRecord, SlimCareError> {
        let anchor = anchor
            .as_deref()
            .map(|a| parse_ffi_date("anchor", a))
            .transpose()?;
        let today = schedule::today();
        let db = self.db.lock()?;
        let record = Clinic::new(&db, &self.config).reactivate_treatment(&patient_id, anchor, today)?;
        Ok(FfiPatientRecord::from_record(record, today))
    }

    /// Redeem the highest reward reached. Returns the remaining points.
    pub fn redeem_reward(&self, patient_id: String) -> Result<u32, SlimCareError> {
        let db = self.db.lock()?;
        let redemption = Clinic::new(&db, &self.config).redeem_reward(&patient_id)?;
        Ok(redemption.remaining_points)
    }

    /// Dashboard for today as JSON.
    pub fn dashboard_json(&self) -> Result<String, SlimCareError> {
        let db = self.db.lock()?;
        let dashboard = Clinic::new(&db, &self.config).dashboard(schedule::today())?;
        Ok(serde_json::to_string(&dashboard)?)
    }

    // =========================================================================
    // Inventory & Cash Flow Operations
    // =========================================================================

    /// Register a purchased vial of 40, 60 or 90 mg.
    pub fn register_vial(&self, purchase_date: String, total_mg: u32, cost: f64) -> Result<String, SlimCareError> {
        let date = parse_ffi_date("purchase_date", &purchase_date)?;
        let size = VialSize::try_from(total_mg).map_err(SlimCareError::InvalidInput)?;
        let db = self.db.lock()?;
        let vial = Clinic::new(&db, &self.config).register_vial(date, size, cost)?;
        Ok(vial.vial_id)
    }

    /// Sell medication from a vial. Returns the income entry ID.
    pub fn record_sale(&self, sale: FfiSale) -> Result<String, SlimCareError> {
        parse_ffi_date("date", &sale.date)?;
        let payment_method = parse_payment_method(sale.payment_method.as_deref())?;
        let db = self.db.lock()?;
        let entry = Clinic::new(&db, &self.config).record_sale(NewSale {
            patient_id: sale.patient_id,
            vial_id: sale.vial_id,
            mg: sale.mg,
            amount: sale.amount,
            date: sale.date,
            due_date: sale.due_date,
            payment_method,
        })?;
        Ok(entry.entry_id)
    }

    /// Record a cash flow entry from a submitted form (JSON object).
    pub fn record_entry_form(&self, form_json: String) -> Result<String, SlimCareError> {
        let form: serde_json::Value = serde_json::from_str(&form_json)?;
        let db = self.db.lock()?;
        let entry = Clinic::new(&db, &self.config).record_entry_from_form(&form)?;
        Ok(entry.entry_id)
    }

    /// Mark an entry paid on `paid_at`.
    pub fn mark_entry_paid(
        &self,
        entry_id: String,
        paid_at: String,
        payment_method: Option<String>,
    ) -> Result<(), SlimCareError> {
        let paid_at = parse_ffi_date("paid_at", &paid_at)?;
        let method = parse_payment_method(payment_method.as_deref())?;
        let db = self.db.lock()?;
        Clinic::new(&db, &self.config).mark_entry_paid(&entry_id, paid_at, method)?;
        Ok(())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Financial report for an optional date range, as JSON.
    pub fn export_financial_json(&self, from: Option<String>, to: Option<String>) -> Result<String, SlimCareError> {
        let db = self.db.lock()?;
        let period = db::Period { from, to };
        let report = export::FinancialReport::generate(&db, &period, schedule::today())?;
        Ok(report.to_json()?)
    }

    /// Financial report rows as CSV.
    pub fn export_financial_csv(&self, from: Option<String>, to: Option<String>) -> Result<String, SlimCareError> {
        let db = self.db.lock()?;
        let period = db::Period { from, to };
        let report = export::FinancialReport::generate(&db, &period, schedule::today())?;
        Ok(report.to_csv())
    }

    /// Outstanding reward points as JSON.
    pub fn export_rewards_json(&self) -> Result<String, SlimCareError> {
        let db = self.db.lock()?;
        let report = export::RewardsReport::generate(&db, &self.config.rewards.tiers)?;
        Ok(report.to_json()?)
    }

    // =========================================================================
    // Customization
    // =========================================================================

    pub fn get_customization(&self) -> FfiCustomization {
        self.settings.get().into()
    }

    /// Persist new branding and notify subscribers.
    pub fn set_customization(&self, customization: FfiCustomization) -> Result<(), SlimCareError> {
        let customization: Customization = customization.into();
        let db = self.db.lock()?;
        db.save_customization(&customization)?;
        drop(db);
        self.settings.set(customization);
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe enrollment input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub full_name: String,
    pub birth_date: Option<String>,
    pub height_cm: f64,
    pub initial_weight_kg: f64,
    pub desired_weight_kg: Option<f64>,
    pub first_dose_date: String,
    pub default_dose_mg: Option<f64>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl From<FfiNewPatient> for NewPatient {
    fn from(p: FfiNewPatient) -> Self {
        NewPatient {
            full_name: p.full_name,
            birth_date: p.birth_date,
            height_cm: p.height_cm,
            initial_weight_kg: p.initial_weight_kg,
            desired_weight_kg: p.desired_weight_kg,
            first_dose_date: p.first_dose_date,
            default_dose_mg: p.default_dose_mg,
            phone: p.phone,
            notes: p.notes,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub local_id: String,
    pub full_name: String,
    pub birth_date: Option<String>,
    pub height_cm: f64,
    pub initial_weight_kg: f64,
    pub desired_weight_kg: Option<f64>,
    pub first_dose_date: String,
    pub default_dose_mg: Option<f64>,
    pub points: u32,
    pub treatment_status: String,
    pub termination_date: Option<String>,
    pub termination_reason: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub version: i64,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        let (termination_date, termination_reason) = match patient.termination {
            Some(t) => (Some(t.date), Some(t.reason)),
            None => (None, None),
        };
        Self {
            local_id: patient.local_id,
            full_name: patient.full_name,
            birth_date: patient.birth_date,
            height_cm: patient.height_cm,
            initial_weight_kg: patient.initial_weight_kg,
            desired_weight_kg: patient.desired_weight_kg,
            first_dose_date: patient.first_dose_date,
            default_dose_mg: patient.default_dose_mg,
            points: patient.points,
            treatment_status: patient.treatment_status.as_str().to_string(),
            termination_date,
            termination_reason,
            phone: patient.phone,
            notes: patient.notes,
            version: patient.version,
        }
    }
}

/// FFI-safe dose with its display status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDose {
    pub dose_id: Option<String>,
    pub dose_number: u32,
    pub date: String,
    pub time: Option<String>,
    pub administered: bool,
    pub administered_mg: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub status: String,
    pub status_label: String,
}

impl FfiDose {
    fn from_dose(dose: Dose, today: NaiveDate) -> Self {
        let display = resolve_dose_status(&dose, today);
        Self {
            administered: dose.is_administered(),
            dose_id: dose.dose_id,
            dose_number: dose.dose_number,
            date: dose.date,
            time: dose.time,
            administered_mg: dose.administered_mg,
            weight_kg: dose.weight_kg,
            bmi: dose.bmi,
            status: display.status.as_str().to_string(),
            status_label: display.label,
        }
    }
}

/// FFI-safe patient record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRecord {
    pub patient: FfiPatient,
    pub doses: Vec<FfiDose>,
    pub overdue_count: u32,
}

impl FfiPatientRecord {
    fn from_record(record: PatientRecord, today: NaiveDate) -> Self {
        let overdue_count = schedule::count_overdue(&record.doses, today) as u32;
        Self {
            patient: record.patient.into(),
            doses: record
                .doses
                .into_iter()
                .map(|d| FfiDose::from_dose(d, today))
                .collect(),
            overdue_count,
        }
    }
}

/// FFI-safe bioimpedance metrics.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiBioimpedance {
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub fat_percentage: Option<f64>,
    pub muscle_percentage: Option<f64>,
    pub water_percentage: Option<f64>,
    pub visceral_fat: Option<f64>,
    pub basal_metabolism_kcal: Option<f64>,
    pub metabolic_age: Option<f64>,
    pub bone_mass_kg: Option<f64>,
    pub protein_percentage: Option<f64>,
}

impl From<FfiBioimpedance> for Bioimpedance {
    fn from(m: FfiBioimpedance) -> Self {
        Bioimpedance {
            weight_kg: m.weight_kg,
            bmi: m.bmi,
            fat_percentage: m.fat_percentage,
            muscle_percentage: m.muscle_percentage,
            water_percentage: m.water_percentage,
            visceral_fat: m.visceral_fat,
            basal_metabolism_kcal: m.basal_metabolism_kcal,
            metabolic_age: m.metabolic_age,
            bone_mass_kg: m.bone_mass_kg,
            protein_percentage: m.protein_percentage,
        }
    }
}

/// FFI-safe sale input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSale {
    pub patient_id: Option<String>,
    pub vial_id: String,
    pub mg: f64,
    pub amount: f64,
    pub date: String,
    pub due_date: Option<String>,
    /// pix, dinheiro, cartao or transferencia; set when paid on the spot
    pub payment_method: Option<String>,
}

/// FFI-safe reward tier.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRewardTier {
    pub label: String,
    pub threshold: u32,
    pub discount_value: f64,
}

impl From<RewardTier> for FfiRewardTier {
    fn from(tier: RewardTier) -> Self {
        Self {
            label: tier.label,
            threshold: tier.threshold,
            discount_value: tier.discount_value,
        }
    }
}

/// FFI-safe access level.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum FfiAccessLevel {
    Portal { patient_id: String },
    Staff,
}

impl From<AccessLevel> for FfiAccessLevel {
    fn from(access: AccessLevel) -> Self {
        match access {
            AccessLevel::Portal { patient_id } => FfiAccessLevel::Portal { patient_id },
            AccessLevel::Staff => FfiAccessLevel::Staff,
        }
    }
}

/// FFI-safe clinic branding.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCustomization {
    pub clinic_name: String,
    pub logo_data_uri: Option<String>,
    pub accent_color: String,
}

impl From<Customization> for FfiCustomization {
    fn from(c: Customization) -> Self {
        Self {
            clinic_name: c.clinic_name,
            logo_data_uri: c.logo_data_uri,
            accent_color: c.accent_color,
        }
    }
}

impl From<FfiCustomization> for Customization {
    fn from(c: FfiCustomization) -> Self {
        Customization {
            clinic_name: c.clinic_name,
            logo_data_uri: c.logo_data_uri,
            accent_color: c.accent_color,
        }
    }
}
