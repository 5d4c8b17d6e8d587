//! Body-mass and weight-progress utilities.
//!
//! Every function returns `None` instead of NaN or infinity so that an unknown
//! height never leaks a bogus value into stored records.

/// Placeholder shown when a metric cannot be computed.
pub const PLACEHOLDER: &str = "—";

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Body-mass index: weight / height², rounded to two decimals.
///
/// Returns `None` when height or weight is non-positive or non-finite.
pub fn calculate_bmi(weight_kg: f64, height_m: f64) -> Option<f64> {
    if !weight_kg.is_finite() || !height_m.is_finite() {
        return None;
    }
    if height_m <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    let bmi = round2(weight_kg / (height_m * height_m));
    bmi.is_finite().then_some(bmi)
}

/// BMI for a height stored in centimetres.
pub fn bmi_from_cm(weight_kg: f64, height_cm: f64) -> Option<f64> {
    calculate_bmi(weight_kg, height_cm / 100.0)
}

/// Two-decimal display form, or the placeholder when unknown.
pub fn format_bmi(bmi: Option<f64>) -> String {
    match bmi {
        Some(value) => format!("{:.2}", value),
        None => PLACEHOLDER.to_string(),
    }
}

/// Kilograms lost since enrollment (negative when weight was gained).
pub fn weight_loss_kg(initial_kg: f64, current_kg: f64) -> f64 {
    round2(initial_kg - current_kg)
}

/// Percentage of the way from the initial to the desired weight, clamped to 0..=100.
pub fn goal_progress(initial_kg: f64, current_kg: f64, desired_kg: f64) -> Option<f64> {
    let target_loss = initial_kg - desired_kg;
    if !target_loss.is_finite() || target_loss <= 0.0 {
        return None;
    }
    let progress = (initial_kg - current_kg) / target_loss * 100.0;
    Some(round2(progress.clamp(0.0, 100.0)))
}
