//! Cost-effectiveness of formulas

use serde::{Deserialize, Serialize};

use crate::nutrition::Formula;

/// Daily cost of meeting an energy target with one formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaCostAnalysis {
    pub formula_id: String,
    pub formula_name: String,
    pub daily_volume_ml: f64,
    pub daily_cost: f64,
    pub daily_protein_g: f64,
    pub cost_per_1000_kcal: f64,
    pub cost_per_gram_protein: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Savings {
    pub daily: f64,
    pub total: f64,
    pub percent: f64,
}

/// `None` for formulas without energy
pub fn cost_per_1000_kcal(formula: &Formula) -> Option<f64> {
    if formula.kcal_per_ml <= 0.0 {
        return None;
    }
    Some(formula.unit_price / formula.kcal_per_ml * 1000.0)
}

pub fn cost_per_gram_protein(formula: &Formula) -> Option<f64> {
    if formula.protein_per_ml <= 0.0 {
        return None;
    }
    Some(formula.unit_price / formula.protein_per_ml)
}

pub fn analyze(formula: &Formula, target_kcal: f64) -> Option<FormulaCostAnalysis> {
    let per_1000 = cost_per_1000_kcal(formula)?;
    let daily_volume_ml = target_kcal / formula.kcal_per_ml;
    Some(FormulaCostAnalysis {
        formula_id: formula.id.clone(),
        formula_name: formula.name.clone(),
        daily_volume_ml,
        daily_cost: daily_volume_ml * formula.unit_price,
        daily_protein_g: daily_volume_ml * formula.protein_per_ml,
        cost_per_1000_kcal: per_1000,
        cost_per_gram_protein: cost_per_gram_protein(formula),
    })
}

/// Active formulas able to meet `target_kcal`, cheapest daily cost first.
/// Formulas without energy density are left out.
pub fn rank_formulas(formulas: &[Formula], target_kcal: f64) -> Vec<FormulaCostAnalysis> {
    let mut ranked: Vec<FormulaCostAnalysis> = formulas
        .iter()
        .filter(|f| f.is_active)
        .filter_map(|f| analyze(f, target_kcal))
        .collect();
    ranked.sort_by(|a, b| {
        a.daily_cost
            .total_cmp(&b.daily_cost)
            .then_with(|| a.formula_name.cmp(&b.formula_name))
    });
    ranked
}

/// What switching from `current` to `alternative` saves over `days`
pub fn savings(current: &FormulaCostAnalysis, alternative: &FormulaCostAnalysis, days: u32) -> Savings {
    let daily = current.daily_cost - alternative.daily_cost;
    let percent = if current.daily_cost > 0.0 {
        daily / current.daily_cost * 100.0
    } else {
        0.0
    };
    Savings {
        daily,
        total: daily * days as f64,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::BillingUnit;

    fn formula(id: &str, price: f64, kcal: f64, protein: f64) -> Formula {
        Formula {
            id: id.to_string(),
            name: id.to_string(),
            billing_unit: BillingUnit::Ml,
            unit_price: price,
            presentations: vec![1000.0],
            kcal_per_ml: kcal,
            protein_per_ml: protein,
            category: Default::default(),
            is_active: true,
        }
    }

    #[test]
    fn test_unit_costs() {
        let f = formula("std", 0.02, 1.0, 0.04);
        assert!((cost_per_1000_kcal(&f).unwrap() - 20.0).abs() < 1e-9);
        assert!((cost_per_gram_protein(&f).unwrap() - 0.5).abs() < 1e-9);
        assert!(cost_per_1000_kcal(&formula("water", 0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_ranking_prefers_cheaper_daily_cost() {
        let formulas = vec![
            formula("dense", 0.04, 2.0, 0.09),
            formula("std", 0.025, 1.0, 0.04),
            formula("empty", 0.01, 0.0, 0.0),
        ];
        let ranked = rank_formulas(&formulas, 2000.0);
        let ids: Vec<&str> = ranked.iter().map(|r| r.formula_id.as_str()).collect();
        assert_eq!(ids, vec!["dense", "std"]);
        assert!((ranked[0].daily_volume_ml - 1000.0).abs() < 1e-9);
        assert!((ranked[0].daily_cost - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_savings() {
        let current = analyze(&formula("std", 0.025, 1.0, 0.04), 2000.0).unwrap();
        let cheaper = analyze(&formula("dense", 0.04, 2.0, 0.09), 2000.0).unwrap();
        let s = savings(&current, &cheaper, 7);
        assert!((s.daily - 10.0).abs() < 1e-9);
        assert!((s.total - 70.0).abs() < 1e-9);
        assert!((s.percent - 20.0).abs() < 1e-9);
    }
}
