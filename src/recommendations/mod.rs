//! Formula and target recommendations
//!
//! Two engines over the same [`PatientProfile`]:
//! - [`recommend`]: clinical rules mapping conditions to targets and a formula family
//! - [`similarity`]: nearest-neighbour lookup over a small set of historical cases

pub mod similarity;

use serde::{Deserialize, Serialize};

use crate::calculations::{
    bmi, protein_factor, BmiCategory, CalculationError, Condition, PatientProfile,
};
use crate::nutrition::{Formula, FormulaCategory};

/// Albumin below this marks likely protein depletion (g/dl)
const LOW_ALBUMIN: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kcal_per_kg: f64,
    pub protein_g_per_kg: f64,
    pub category: FormulaCategory,
    pub rationale: Vec<String>,
}

/// Applies the clinical rules to a patient profile
pub fn recommend(profile: &PatientProfile) -> Result<Recommendation, CalculationError> {
    profile.validate()?;
    let mut rationale = Vec::new();

    let category_bmi = BmiCategory::from_bmi(bmi(profile.weight_kg, profile.height_cm)?);
    let mut kcal_per_kg: f64 = match category_bmi {
        BmiCategory::Underweight => {
            rationale.push("underweight: energy target raised for repletion".to_string());
            35.0
        }
        c if c.is_obese() => {
            rationale.push("obesity: hypocaloric target on actual weight".to_string());
            14.0
        }
        _ => 25.0,
    };

    if profile.has(Condition::Burns) || profile.has(Condition::Sepsis) || profile.has(Condition::Trauma) {
        kcal_per_kg = kcal_per_kg.max(30.0);
        rationale.push("hypermetabolic condition".to_string());
    }

    let mut protein_g_per_kg = protein_factor(profile);
    if let Some(albumin) = profile.albumin_g_dl {
        if albumin < LOW_ALBUMIN && !profile.has(Condition::RenalFailure) {
            protein_g_per_kg = protein_g_per_kg.max(1.5);
            rationale.push(format!("albumin {:.1} g/dl below {:.1}", albumin, LOW_ALBUMIN));
        }
    }

    let category = choose_category(profile, protein_g_per_kg, &mut rationale);

    Ok(Recommendation {
        kcal_per_kg,
        protein_g_per_kg,
        category,
        rationale,
    })
}

fn choose_category(profile: &PatientProfile, protein_g_per_kg: f64, rationale: &mut Vec<String>) -> FormulaCategory {
    let (category, reason) = if profile.has(Condition::RenalFailure) && !profile.has(Condition::Dialysis) {
        (FormulaCategory::Renal, "renal failure without dialysis")
    } else if profile.has(Condition::LiverDisease) {
        (FormulaCategory::Hepatic, "liver disease")
    } else if profile.has(Condition::Malabsorption) {
        (FormulaCategory::PeptideBased, "malabsorption")
    } else if profile.has(Condition::Diabetes) {
        (FormulaCategory::Diabetic, "diabetes")
    } else if protein_g_per_kg >= 1.5 {
        (FormulaCategory::HighProtein, "protein target at or above 1.5 g/kg")
    } else {
        (FormulaCategory::Standard, "no condition-specific need")
    };
    rationale.push(format!("{:?} formula: {}", category, reason));
    category
}

/// Active formulas of the recommended family, falling back to standard ones
pub fn match_formulas<'a>(recommendation: &Recommendation, formulas: &'a [Formula]) -> Vec<&'a Formula> {
    let of = |category: FormulaCategory| -> Vec<&'a Formula> {
        formulas
            .iter()
            .filter(|f| f.is_active && f.category == category)
            .collect()
    };
    let matched = of(recommendation.category);
    if matched.is_empty() {
        of(FormulaCategory::Standard)
    } else {
        matched
    }
}
