use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::calculations::{bmi, CalculationError, PatientProfile};
use crate::nutrition::FormulaCategory;

/// A past patient with a good outcome on a known regimen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalCase {
    pub id: &'static str,
    pub age_years: f64,
    pub bmi: f64,
    pub albumin_g_dl: f64,
    pub stress_factor: f64,
    pub kcal_per_kg: f64,
    pub protein_g_per_kg: f64,
    pub category: FormulaCategory,
}

const HISTORICAL_CASES: [HistoricalCase; 6] = [
    HistoricalCase { id: "hc-01", age_years: 72.0, bmi: 19.5, albumin_g_dl: 2.8, stress_factor: 1.0, kcal_per_kg: 30.0, protein_g_per_kg: 1.2, category: FormulaCategory::Standard },
    HistoricalCase { id: "hc-02", age_years: 55.0, bmi: 27.0, albumin_g_dl: 3.5, stress_factor: 1.4, kcal_per_kg: 25.0, protein_g_per_kg: 1.5, category: FormulaCategory::HighProtein },
    HistoricalCase { id: "hc-03", age_years: 63.0, bmi: 31.0, albumin_g_dl: 3.8, stress_factor: 1.0, kcal_per_kg: 22.0, protein_g_per_kg: 1.0, category: FormulaCategory::Diabetic },
    HistoricalCase { id: "hc-04", age_years: 34.0, bmi: 23.0, albumin_g_dl: 3.2, stress_factor: 1.8, kcal_per_kg: 35.0, protein_g_per_kg: 2.0, category: FormulaCategory::HighProtein },
    HistoricalCase { id: "hc-05", age_years: 80.0, bmi: 17.5, albumin_g_dl: 2.5, stress_factor: 1.15, kcal_per_kg: 32.0, protein_g_per_kg: 1.5, category: FormulaCategory::EnergyDense },
    HistoricalCase { id: "hc-06", age_years: 48.0, bmi: 24.0, albumin_g_dl: 3.9, stress_factor: 1.2, kcal_per_kg: 25.0, protein_g_per_kg: 1.3, category: FormulaCategory::PeptideBased },
];

// (range used to normalise, weight) per feature
const AGE: (f64, f64) = (60.0, 1.0);
const BMI: (f64, f64) = (20.0, 1.5);
const ALBUMIN: (f64, f64) = (2.0, 1.0);
const STRESS: (f64, f64) = (0.8, 2.0);

/// Albumin assumed when the profile has no lab value
const DEFAULT_ALBUMIN: f64 = 3.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCase {
    pub case_id: String,
    pub distance: f64,
    pub category: FormulaCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlRecommendation {
    pub kcal_per_kg: f64,
    pub protein_g_per_kg: f64,
    pub category: FormulaCategory,
    pub confidence: f64,          // 0-1, share of neighbour weight behind the category
    pub neighbours: Vec<String>,
}

pub fn historical_cases() -> &'static [HistoricalCase] {
    &HISTORICAL_CASES
}

struct Features {
    age: f64,
    bmi: f64,
    albumin: f64,
    stress: f64,
}

impl Features {
    fn of(profile: &PatientProfile) -> Result<Self, CalculationError> {
        Ok(Features {
            age: profile.age_years,
            bmi: bmi(profile.weight_kg, profile.height_cm)?,
            albumin: profile.albumin_g_dl.unwrap_or(DEFAULT_ALBUMIN),
            stress: profile.stress_factor(),
        })
    }

    fn distance(&self, case: &HistoricalCase) -> f64 {
        let term = |a: f64, b: f64, (range, weight): (f64, f64)| weight * ((a - b) / range).powi(2);
        (term(self.age, case.age_years, AGE)
            + term(self.bmi, case.bmi, BMI)
            + term(self.albumin, case.albumin_g_dl, ALBUMIN)
            + term(self.stress, case.stress_factor, STRESS))
        .sqrt()
    }
}

/// The `k` historical cases closest to the profile, nearest first
pub fn similar_cases(profile: &PatientProfile, k: usize) -> Result<Vec<SimilarCase>, CalculationError> {
    profile.validate()?;
    let features = Features::of(profile)?;
    let mut cases: Vec<SimilarCase> = HISTORICAL_CASES
        .iter()
        .map(|case| SimilarCase {
            case_id: case.id.to_string(),
            distance: features.distance(case),
            category: case.category,
        })
        .collect();
    cases.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    cases.truncate(k.max(1));
    Ok(cases)
}

/// Inverse-distance weighted targets over the three nearest cases
pub fn ml_recommendation(profile: &PatientProfile) -> Result<MlRecommendation, CalculationError> {
    let neighbours = similar_cases(profile, 3)?;

    let mut total_weight = 0.0;
    let mut kcal = 0.0;
    let mut protein = 0.0;
    let mut votes: HashMap<FormulaCategory, f64> = HashMap::new();

    for neighbour in &neighbours {
        let Some(case) = HISTORICAL_CASES.iter().find(|c| c.id == neighbour.case_id) else {
            continue;
        };
        let weight = 1.0 / (neighbour.distance + 1e-6);
        total_weight += weight;
        kcal += weight * case.kcal_per_kg;
        protein += weight * case.protein_g_per_kg;
        *votes.entry(case.category).or_insert(0.0) += weight;
    }

    // ties resolve to the nearest neighbour's category
    let mut category = neighbours
        .first()
        .map_or(FormulaCategory::Standard, |n| n.category);
    let mut best = votes.get(&category).copied().unwrap_or(0.0);
    for neighbour in &neighbours {
        let weight = votes.get(&neighbour.category).copied().unwrap_or(0.0);
        if weight > best {
            best = weight;
            category = neighbour.category;
        }
    }

    Ok(MlRecommendation {
        kcal_per_kg: kcal / total_weight,
        protein_g_per_kg: protein / total_weight,
        category,
        confidence: best / total_weight,
        neighbours: neighbours.into_iter().map(|n| n.case_id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::{ActivityLevel, Condition, Sex};

    fn burned_young_adult() -> PatientProfile {
        PatientProfile {
            sex: Sex::Male,
            age_years: 35.0,
            weight_kg: 70.0,
            height_cm: 175.0,
            activity: ActivityLevel::Bedridden,
            conditions: vec![Condition::Burns],
            albumin_g_dl: Some(3.2),
        }
    }

    #[test]
    fn test_nearest_case_first() {
        let cases = similar_cases(&burned_young_adult(), 2).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].case_id, "hc-04");
        assert!(cases[0].distance <= cases[1].distance);
    }

    #[test]
    fn test_weighted_recommendation_stays_within_neighbour_range() {
        let rec = ml_recommendation(&burned_young_adult()).unwrap();
        assert_eq!(rec.neighbours.len(), 3);
        assert_eq!(rec.neighbours[0], "hc-04");
        assert_eq!(rec.category, FormulaCategory::HighProtein);
        assert!(rec.kcal_per_kg >= 25.0 && rec.kcal_per_kg <= 35.0);
        assert!(rec.confidence > 0.5 && rec.confidence <= 1.0);
    }

    #[test]
    fn test_exact_match_dominates() {
        let mut profile = burned_young_adult();
        profile.age_years = 72.0;
        profile.conditions = vec![];
        profile.albumin_g_dl = Some(2.8);
        // bmi 19.5 at 175 cm
        profile.weight_kg = 19.5 * 1.75 * 1.75;

        let rec = ml_recommendation(&profile).unwrap();
        assert_eq!(rec.neighbours[0], "hc-01");
        assert!((rec.kcal_per_kg - 30.0).abs() < 0.01);
    }
}
