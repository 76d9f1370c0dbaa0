//! Bedside nutrition arithmetic
//!
//! Anthropometrics, energy and protein requirements, and the daily totals a
//! prescription delivers. Everything here is a pure function of its inputs.

pub mod cost;
pub mod predictive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nutrition::{CatalogSnapshot, Prescription};

#[derive(Debug, Error, PartialEq)]
pub enum CalculationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// WHO adult BMI bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    ObesityClass1,
    ObesityClass2,
    ObesityClass3,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        match bmi {
            b if b < 18.5 => BmiCategory::Underweight,
            b if b < 25.0 => BmiCategory::Normal,
            b if b < 30.0 => BmiCategory::Overweight,
            b if b < 35.0 => BmiCategory::ObesityClass1,
            b if b < 40.0 => BmiCategory::ObesityClass2,
            _ => BmiCategory::ObesityClass3,
        }
    }

    pub fn is_obese(&self) -> bool {
        matches!(
            self,
            BmiCategory::ObesityClass1 | BmiCategory::ObesityClass2 | BmiCategory::ObesityClass3
        )
    }
}

/// Clinical condition driving the stress factor and recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    None,
    Surgery,
    Sepsis,
    Trauma,
    Burns,
    Cancer,
    Diabetes,
    RenalFailure,
    Dialysis,
    LiverDisease,
    Malabsorption,
    PressureInjury,
}

impl Condition {
    /// Multiplier applied to basal energy for metabolic stress
    pub fn stress_factor(&self) -> f64 {
        match self {
            Condition::Surgery => 1.2,
            Condition::Sepsis => 1.4,
            Condition::Trauma => 1.35,
            Condition::Burns => 1.8,
            Condition::Cancer => 1.2,
            Condition::PressureInjury => 1.15,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Bedridden,
    Ambulatory,
    Active,
}

impl ActivityLevel {
    pub fn factor(&self) -> f64 {
        match self {
            ActivityLevel::Bedridden => 1.2,
            ActivityLevel::Ambulatory => 1.3,
            ActivityLevel::Active => 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub sex: Sex,
    pub age_years: f64,
    pub weight_kg: f64,
    pub height_cm: f64,
    #[serde(default = "default_activity")]
    pub activity: ActivityLevel,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub albumin_g_dl: Option<f64>,
}

impl PatientProfile {
    pub fn validate(&self) -> Result<(), CalculationError> {
        positive("weight", self.weight_kg)?;
        positive("height", self.height_cm)?;
        positive("age", self.age_years)?;
        Ok(())
    }

    /// Largest stress factor among the listed conditions
    pub fn stress_factor(&self) -> f64 {
        self.conditions
            .iter()
            .map(Condition::stress_factor)
            .fold(1.0, f64::max)
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }
}

/// Daily targets for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionalRequirements {
    pub bmi: f64,
    pub bmi_category: BmiCategory,
    pub reference_weight_kg: f64,   // adjusted weight when obese
    pub basal_energy_kcal: f64,
    pub total_energy_kcal: f64,
    pub protein_g: f64,
    pub fluid_ml: f64,
}

/// What a prescription delivers per day at full schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionTotals {
    pub formula_volume_ml: f64,
    pub free_water_ml: f64,
    pub kcal: f64,
    pub protein_g: f64,
    pub daily_cost: f64,
}

pub fn bmi(weight_kg: f64, height_cm: f64) -> Result<f64, CalculationError> {
    positive("weight", weight_kg)?;
    positive("height", height_cm)?;
    let meters = height_cm / 100.0;
    Ok(weight_kg / (meters * meters))
}

/// Ideal weight at a BMI of 22
pub fn ideal_body_weight(height_cm: f64) -> Result<f64, CalculationError> {
    positive("height", height_cm)?;
    let meters = height_cm / 100.0;
    Ok(22.0 * meters * meters)
}

/// Ideal weight plus a quarter of the excess
pub fn adjusted_body_weight(weight_kg: f64, height_cm: f64) -> Result<f64, CalculationError> {
    let ideal = ideal_body_weight(height_cm)?;
    positive("weight", weight_kg)?;
    Ok(ideal + 0.25 * (weight_kg - ideal))
}

/// Harris-Benedict basal energy expenditure in kcal/day
pub fn harris_benedict(
    sex: Sex,
    weight_kg: f64,
    height_cm: f64,
    age_years: f64,
) -> Result<f64, CalculationError> {
    positive("weight", weight_kg)?;
    positive("height", height_cm)?;
    positive("age", age_years)?;
    let bee = match sex {
        Sex::Male => 66.47 + 13.75 * weight_kg + 5.003 * height_cm - 6.755 * age_years,
        Sex::Female => 655.1 + 9.563 * weight_kg + 1.850 * height_cm - 4.676 * age_years,
    };
    Ok(bee)
}

pub fn total_energy_expenditure(basal_kcal: f64, activity_factor: f64, stress_factor: f64) -> f64 {
    basal_kcal * activity_factor * stress_factor
}

/// Pocket formula: kcal per kg of body weight
pub fn energy_by_weight(weight_kg: f64, kcal_per_kg: f64) -> f64 {
    weight_kg * kcal_per_kg
}

pub fn protein_requirement(weight_kg: f64, grams_per_kg: f64) -> f64 {
    weight_kg * grams_per_kg
}

pub fn fluid_requirement(weight_kg: f64, ml_per_kg: f64) -> f64 {
    weight_kg * ml_per_kg
}

/// Protein target in g/kg for the patient's worst condition
pub fn protein_factor(profile: &PatientProfile) -> f64 {
    let mut factor: f64 = 1.0;
    for condition in &profile.conditions {
        let f = match condition {
            Condition::Burns => 2.0,
            Condition::Sepsis | Condition::Trauma => 1.5,
            Condition::Dialysis => 1.3,
            Condition::Surgery | Condition::Cancer | Condition::PressureInjury => 1.3,
            Condition::RenalFailure => 0.8,
            _ => 1.0,
        };
        factor = factor.max(f);
    }
    // renal failure without dialysis caps protein
    if profile.has(Condition::RenalFailure) && !profile.has(Condition::Dialysis) {
        factor = factor.min(0.8);
    }
    factor
}

/// Rolls anthropometrics, energy, protein and fluid targets into one estimate
pub fn estimate_requirements(profile: &PatientProfile) -> Result<NutritionalRequirements, CalculationError> {
    profile.validate()?;

    let bmi = bmi(profile.weight_kg, profile.height_cm)?;
    let bmi_category = BmiCategory::from_bmi(bmi);
    let reference_weight_kg = if bmi_category.is_obese() {
        adjusted_body_weight(profile.weight_kg, profile.height_cm)?
    } else {
        profile.weight_kg
    };

    let basal_energy_kcal = harris_benedict(
        profile.sex,
        reference_weight_kg,
        profile.height_cm,
        profile.age_years,
    )?;
    let total_energy_kcal = total_energy_expenditure(
        basal_energy_kcal,
        profile.activity.factor(),
        profile.stress_factor(),
    );
    let fluid_per_kg = if profile.age_years >= 65.0 { 30.0 } else { 35.0 };

    Ok(NutritionalRequirements {
        bmi,
        bmi_category,
        reference_weight_kg,
        basal_energy_kcal,
        total_energy_kcal,
        protein_g: protein_requirement(reference_weight_kg, protein_factor(profile)),
        fluid_ml: fluid_requirement(reference_weight_kg, fluid_per_kg),
    })
}

/// Daily delivery of a prescription with every scheduled time administered.
/// Lines whose product is missing from the catalog contribute volume only.
pub fn prescription_totals(prescription: &Prescription, snapshot: &CatalogSnapshot) -> NutritionTotals {
    let mut totals = NutritionTotals::default();

    for line in &prescription.formulas {
        let volume = line.volume * line.times.len() as f64;
        totals.formula_volume_ml += volume;
        if let Some(formula) = snapshot.formula(&line.formula_id) {
            totals.kcal += volume * formula.kcal_per_ml;
            totals.protein_g += volume * formula.protein_per_ml;
            totals.daily_cost += volume * formula.unit_price;
        }
    }

    for line in &prescription.modules {
        let amount = line.amount * line.times.len() as f64;
        if let Some(module) = snapshot.module(&line.module_id) {
            totals.kcal += amount * module.kcal_per_unit;
            totals.protein_g += amount * module.protein_per_unit;
            totals.daily_cost += amount * module.unit_price;
        }
    }

    if let Some(hydration) = &prescription.hydration {
        totals.free_water_ml += hydration.volume * hydration.times.len() as f64;
    }

    totals
}

/// Percentage of `target` reached by `delivered`
pub fn goal_adequacy(delivered: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    delivered / target * 100.0
}

fn positive(field: &str, value: f64) -> Result<(), CalculationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CalculationError::InvalidInput(format!(
            "{} must be positive, got {}",
            field, value
        )))
    }
}

fn default_activity() -> ActivityLevel {
    ActivityLevel::Bedridden
}
