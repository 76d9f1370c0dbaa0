//! Volume and weight projections
//!
//! Goal volumes and infusion rates for a target, step-wise advancement of the
//! infusion rate, and the weight change a sustained energy balance implies.

use serde::{Deserialize, Serialize};

use super::CalculationError;

/// Energy content of one kilogram of body weight
pub const KCAL_PER_KG: f64 = 7700.0;

/// Longest advancement plan accepted
pub const MAX_PROGRESSION_STEPS: u32 = 1000;

/// One step of an infusion-rate advancement plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionStep {
    pub step: u32,
    pub start_hour: f64,     // hours since the start of the plan
    pub rate_ml_h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightProjection {
    pub days: u32,
    pub daily_balance_kcal: f64,
    pub weight_change_kg: f64,
}

/// Daily volume that delivers `target_kcal`
pub fn goal_volume(target_kcal: f64, kcal_per_ml: f64) -> Result<f64, CalculationError> {
    if kcal_per_ml <= 0.0 {
        return Err(CalculationError::InvalidInput(
            "energy density must be positive".to_string(),
        ));
    }
    Ok(target_kcal / kcal_per_ml)
}

/// Continuous rate for `volume_ml` over `hours`
pub fn infusion_rate(volume_ml: f64, hours: f64) -> Result<f64, CalculationError> {
    if hours <= 0.0 || hours > 24.0 {
        return Err(CalculationError::InvalidInput(format!(
            "infusion hours must be in (0, 24], got {}",
            hours
        )));
    }
    Ok(volume_ml / hours)
}

/// Advances from `start_rate` by `increment` every `step_hours` until
/// `goal_rate` is reached. The last step is clamped to the goal.
pub fn progression_plan(
    start_rate: f64,
    goal_rate: f64,
    increment: f64,
    step_hours: f64,
) -> Result<Vec<ProgressionStep>, CalculationError> {
    if start_rate <= 0.0 || goal_rate <= 0.0 {
        return Err(CalculationError::InvalidInput("rates must be positive".to_string()));
    }
    if increment <= 0.0 || step_hours <= 0.0 {
        return Err(CalculationError::InvalidInput(
            "increment and step interval must be positive".to_string(),
        ));
    }

    let start = start_rate.min(goal_rate);
    let steps = ((goal_rate - start) / increment).ceil();
    if steps > MAX_PROGRESSION_STEPS as f64 {
        return Err(CalculationError::InvalidInput(format!(
            "increment {} needs more than {} steps to reach {} ml/h",
            increment, MAX_PROGRESSION_STEPS, goal_rate
        )));
    }

    let plan = (0..=steps as u32)
        .map(|step| ProgressionStep {
            step,
            start_hour: step as f64 * step_hours,
            rate_ml_h: (start + step as f64 * increment).min(goal_rate),
        })
        .collect();
    Ok(plan)
}

/// Hours until the plan reaches its final rate
pub fn hours_to_goal(plan: &[ProgressionStep]) -> f64 {
    plan.last().map_or(0.0, |s| s.start_hour)
}

/// Weight change after `days` of a constant energy balance
pub fn project_weight_change(daily_intake_kcal: f64, daily_expenditure_kcal: f64, days: u32) -> WeightProjection {
    let daily_balance_kcal = daily_intake_kcal - daily_expenditure_kcal;
    WeightProjection {
        days,
        daily_balance_kcal,
        weight_change_kg: daily_balance_kcal * days as f64 / KCAL_PER_KG,
    }
}
