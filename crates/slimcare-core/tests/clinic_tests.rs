//! Clinic workflow integration tests against a real SQLite file.

use anyhow::Result;
use chrono::NaiveDate;

use slimcare_core::clinic::{AdministerDose, Clinic, ClinicError, NewPatient, NewSale};
use slimcare_core::config::ClinicConfig;
use slimcare_core::db::{Database, DbError, Period};
use slimcare_core::export::{FinancialReport, RewardsReport};
use slimcare_core::models::{
    Bioimpedance, CashFlowEntry, FlowKind, PaymentMethod, TreatmentStatus, VialSize,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_patient(name: &str, first_dose: &str) -> NewPatient {
    NewPatient {
        full_name: name.into(),
        birth_date: Some("1985-04-12".into()),
        height_cm: 165.0,
        initial_weight_kg: 82.0,
        desired_weight_kg: Some(70.0),
        first_dose_date: first_dose.into(),
        default_dose_mg: Some(2.5),
        phone: None,
        notes: None,
    }
}

#[test]
fn test_reactivation_preserves_administered_history() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("clinic.db"))?;
    let mut config = ClinicConfig::default();
    config.schedule.dose_count = 5;
    let clinic = Clinic::new(&db, &config);

    let record = clinic.enroll_patient(new_patient("Ana Souza", "2024-01-01"))?;
    let patient_id = record.patient.local_id.clone();
    for (i, dose) in record.doses.iter().take(3).enumerate() {
        clinic.administer_dose(
            &patient_id,
            dose.dose_id.as_deref().unwrap(),
            AdministerDose {
                administered_mg: Some(2.5),
                weight_kg: Some(81.0 - i as f64),
                time: Some("09:00".into()),
            },
        )?;
    }
    let before = clinic.get_record(&patient_id)?;
    let administered: Vec<_> = before.doses.iter().filter(|d| d.is_administered()).cloned().collect();
    let old_pending: Vec<String> = before
        .doses
        .iter()
        .filter(|d| d.is_pending())
        .filter_map(|d| d.dose_id.clone())
        .collect();
    assert_eq!(administered.len(), 3);
    assert_eq!(old_pending.len(), 2);

    clinic.terminate_treatment(&patient_id, "Travelling", TreatmentStatus::Abandoned, day(2024, 1, 20))?;
    clinic.reactivate_treatment(&patient_id, Some(day(2024, 3, 1)), day(2024, 3, 10))?;

    // Reopen from disk to check what was persisted
    drop(db);
    let db = Database::open(dir.path().join("clinic.db"))?;
    let clinic = Clinic::new(&db, &config);
    let after = clinic.get_record(&patient_id)?;

    assert_eq!(after.patient.treatment_status, TreatmentStatus::Active);
    assert!(after.patient.termination.is_none());
    assert_eq!(&after.doses[..3], administered.as_slice());

    let fresh = &after.doses[3..];
    assert_eq!(fresh.len(), 5);
    assert!(fresh.iter().all(|d| d.is_pending()));
    assert!(fresh
        .iter()
        .all(|d| !old_pending.contains(d.dose_id.as_ref().unwrap())));
    assert_eq!(fresh[0].dose_number, 4);
    assert_eq!(fresh[0].date, "2024-03-01");
    assert_eq!(fresh[1].date, "2024-03-08");

    // Three doses at 10 points each
    assert_eq!(after.patient.points, 30);
    Ok(())
}

#[test]
fn test_concurrent_edits_do_not_overwrite() -> Result<()> {
    let db = Database::open_in_memory()?;
    let config = ClinicConfig::default();
    let clinic = Clinic::new(&db, &config);
    let record = clinic.enroll_patient(new_patient("Ana", "2024-01-01"))?;

    let mut desk = db.get_patient(&record.patient.local_id)?.unwrap();
    let mut nurse = desk.clone();

    desk.phone = Some("11988887777".into());
    db.update_patient(&mut desk)?;

    nurse.notes = Some("Mild nausea".into());
    let err = db.update_patient(&mut nurse).unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // Termination goes through the same version check
    clinic.terminate_treatment(&record.patient.local_id, "Done", TreatmentStatus::Completed, day(2024, 2, 1))?;
    let stored = db.get_patient(&record.patient.local_id)?.unwrap();
    assert_eq!(stored.phone.as_deref(), Some("11988887777"));
    assert_eq!(stored.notes, None);
    assert_eq!(stored.version, 2);
    Ok(())
}

#[test]
fn test_dashboard() -> Result<()> {
    let db = Database::open_in_memory()?;
    let config = ClinicConfig::default();
    let clinic = Clinic::new(&db, &config);
    let today = day(2024, 1, 10);

    // Doses on 01-01, 01-08, 01-15, 01-22
    let active = clinic.enroll_patient(new_patient("Ana", "2024-01-01"))?;
    let stopped = clinic.enroll_patient(new_patient("Bia", "2024-01-01"))?;
    clinic.terminate_treatment(&stopped.patient.local_id, "Moved", TreatmentStatus::Abandoned, day(2024, 1, 2))?;

    let vial = clinic.register_vial(day(2024, 1, 2), VialSize::Mg60, 1800.0)?;
    clinic.record_sale(NewSale {
        patient_id: Some(active.patient.local_id.clone()),
        vial_id: vial.vial_id.clone(),
        mg: 20.0,
        amount: 900.0,
        date: "2024-01-08".into(),
        due_date: Some("2024-01-20".into()),
        payment_method: None,
    })?;
    clinic.record_entry(CashFlowEntry::new(
        FlowKind::Income,
        "Consultation".into(),
        200.0,
        "2024-01-05".into(),
    ))?;

    let dashboard = clinic.dashboard(today)?;
    assert_eq!(dashboard.active_patients, 1);
    assert_eq!(dashboard.overdue_doses, 2);
    assert!(dashboard.overdue.iter().all(|d| d.patient_name == "Ana"));
    assert_eq!(dashboard.upcoming.len(), 1);
    assert_eq!(dashboard.upcoming[0].dose.date, "2024-01-15");
    assert_eq!(dashboard.upcoming[0].display.label, "Due in 5 days");
    assert_eq!(dashboard.stock_remaining_mg, 40.0);
    assert_eq!(dashboard.receivable_pending, 900.0);
    assert_eq!(dashboard.receivable_overdue, 200.0);
    Ok(())
}

#[test]
fn test_sales_and_financial_report() -> Result<()> {
    let db = Database::open_in_memory()?;
    let config = ClinicConfig::default();
    let clinic = Clinic::new(&db, &config);
    let patient = clinic.enroll_patient(new_patient("Ana", "2024-01-01"))?.patient;

    let vial = clinic.register_vial(day(2024, 1, 2), VialSize::Mg40, 1200.0)?;
    let sale = clinic.record_sale(NewSale {
        patient_id: Some(patient.local_id.clone()),
        vial_id: vial.vial_id.clone(),
        mg: 10.0,
        amount: 450.0,
        date: "2024-01-05".into(),
        due_date: None,
        payment_method: None,
    })?;
    clinic.mark_entry_paid(&sale.entry_id, day(2024, 1, 6), Some(PaymentMethod::Card))?;

    let too_much = clinic.record_sale(NewSale {
        patient_id: None,
        vial_id: vial.vial_id.clone(),
        mg: 31.0,
        amount: 1000.0,
        date: "2024-01-07".into(),
        due_date: None,
        payment_method: None,
    });
    assert!(matches!(too_much, Err(ClinicError::InsufficientStock { .. })));

    clinic.record_expense("Rent", 800.0, day(2024, 1, 10), Some(day(2024, 1, 15)))?;

    let report = FinancialReport::generate(&db, &Period::between("2024-01-01", "2024-01-31"), day(2024, 1, 20))?;
    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.summary.income, 450.0);
    assert_eq!(report.summary.expense, 2000.0);
    assert_eq!(report.summary.balance, -1550.0);
    assert_eq!(report.summary.sales, 1);
    assert_eq!(report.summary.sold_mg, 10.0);
    assert_eq!(report.summary.payable_open, 800.0);
    assert!(report.to_csv().contains(",pago,cartao,"));

    assert_eq!(db.list_sales_for_patient(&patient.local_id)?.len(), 1);
    Ok(())
}

#[test]
fn test_points_and_rewards_report() -> Result<()> {
    let db = Database::open_in_memory()?;
    let mut config = ClinicConfig::default();
    config.rewards.points_per_dose = 50;
    let clinic = Clinic::new(&db, &config);

    let record = clinic.enroll_patient(new_patient("Ana", "2024-01-01"))?;
    let patient_id = record.patient.local_id.clone();
    for dose in &record.doses {
        clinic.administer_dose(&patient_id, dose.dose_id.as_deref().unwrap(), AdministerDose::default())?;
    }

    let summary = clinic.patient_summary(&patient_id)?;
    assert_eq!(summary.points, 200);
    assert_eq!(summary.highest_reward.as_ref().map(|t| t.threshold), Some(100));
    assert_eq!(summary.next_reward.as_ref().map(|(_, missing)| *missing), Some(50));
    assert_eq!(summary.pending_doses, 0);

    let report = RewardsReport::generate(&db, &config.rewards.tiers)?;
    assert_eq!(report.total_points, 200);
    assert_eq!(report.redeemable_patients, 1);

    let redemption = clinic.redeem_reward(&patient_id)?;
    assert_eq!(redemption.remaining_points, 100);
    Ok(())
}

#[test]
fn test_evolution_drives_current_weight() -> Result<()> {
    let db = Database::open_in_memory()?;
    let config = ClinicConfig::default();
    let clinic = Clinic::new(&db, &config);
    let record = clinic.enroll_patient(new_patient("Ana", "2024-01-01"))?;
    let patient_id = record.patient.local_id.clone();

    let evolution = clinic.record_evolution(
        &patient_id,
        day(2024, 2, 1),
        Bioimpedance {
            weight_kg: Some(76.0),
            fat_percentage: Some(30.5),
            ..Default::default()
        },
        Some("Monthly check".into()),
    )?;
    // 76 / 1.65² rounded
    assert_eq!(evolution.metrics.bmi, Some(27.92));

    let summary = clinic.patient_summary(&patient_id)?;
    assert_eq!(summary.current_weight_kg, 76.0);
    assert_eq!(summary.weight_loss_kg, 6.0);
    assert_eq!(summary.goal_progress, Some(50.0));
    Ok(())
}

#[test]
fn test_missing_records() {
    let db = Database::open_in_memory().unwrap();
    let config = ClinicConfig::default();
    let clinic = Clinic::new(&db, &config);

    assert!(matches!(clinic.get_record("nobody"), Err(ClinicError::NotFound(_))));
    assert!(matches!(
        clinic.reactivate_treatment("nobody", None, day(2024, 1, 1)),
        Err(ClinicError::NotFound(_))
    ));
    assert!(matches!(
        clinic.mark_entry_paid("nothing", day(2024, 1, 1), None),
        Err(ClinicError::Db(DbError::NotFound(_)))
    ));
}

#[test]
fn test_config_file_drives_schedule() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("clinic.db");
    let config_path = dir.path().join("slimcare.toml");
    std::fs::write(
        &config_path,
        format!(
            "[database]\npath = {:?}\n\n[schedule]\ndose_count = 3\ncadence_days = 14\n",
            db_path.display().to_string()
        ),
    )?;

    let config = slimcare_core::config::load_config(&config_path)?;
    let db = Database::open(&config.database.path)?;
    let clinic = Clinic::new(&db, &config);
    let record = clinic.enroll_patient(new_patient("Ana", "2024-01-10"))?;

    let dates: Vec<&str> = record.doses.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-01-10", "2024-01-24", "2024-02-07"]);
    assert!(db_path.exists());
    Ok(())
}
