//! Dashboard figures
//!
//! Ward census, requisition cost breakdowns and distribution statistics for
//! the reporting pages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::nutrition::{Prescription, TherapyType};
use crate::requisition::{ProductKind, RequisitionData};

/// Active prescriptions in one ward on one day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardCensus {
    pub ward: String,
    pub patients: usize,
    pub enteral: usize,
    pub parenteral: usize,
    pub oral: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionSummary {
    pub formula_cost: f64,
    pub module_cost: f64,
    pub supply_cost: f64,
    pub total_cost: f64,
    pub patients: usize,
    pub products: usize,
}

/// Summary statistics for a dashboard series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub count: usize,
    pub percentiles: HashMap<String, f64>,
}

/// Census per ward, wards in name order
pub fn ward_census(prescriptions: &[Prescription], day: NaiveDate) -> Vec<WardCensus> {
    let mut wards: BTreeMap<&str, (WardCensus, Vec<&str>)> = BTreeMap::new();

    for rx in prescriptions
        .iter()
        .filter(|rx| rx.is_active() && rx.overlaps(day, day))
    {
        let (census, patients) = wards.entry(rx.ward.as_str()).or_insert_with(|| {
            (
                WardCensus {
                    ward: rx.ward.clone(),
                    ..WardCensus::default()
                },
                Vec::new(),
            )
        });
        match rx.therapy_type {
            TherapyType::Enteral => census.enteral += 1,
            TherapyType::Parenteral => census.parenteral += 1,
            TherapyType::Oral => census.oral += 1,
        }
        if !patients.contains(&rx.patient_id.as_str()) {
            patients.push(rx.patient_id.as_str());
        }
    }

    wards
        .into_values()
        .map(|(mut census, patients)| {
            census.patients = patients.len();
            census
        })
        .collect()
}

pub fn requisition_summary(data: &RequisitionData) -> RequisitionSummary {
    let mut summary = RequisitionSummary {
        products: data.consolidated.len(),
        ..RequisitionSummary::default()
    };
    for item in &data.consolidated {
        match item.kind {
            ProductKind::Formula => summary.formula_cost += item.subtotal,
            ProductKind::Module => summary.module_cost += item.subtotal,
            ProductKind::Supply => summary.supply_cost += item.subtotal,
        }
        summary.total_cost += item.subtotal;
    }

    let mut patients: Vec<&str> = data.diet_map.iter().map(|r| r.patient_id.as_str()).collect();
    patients.sort_unstable();
    patients.dedup();
    summary.patients = patients.len();

    summary
}

/// `None` for an empty series
pub fn distribution_stats(values: &[f64]) -> Option<DistributionStats> {
    if values.is_empty() {
        return None;
    }

    let mut values = values.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let min = values[0];
    let max = values[count - 1];
    let mean = values.iter().sum::<f64>() / count as f64;

    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };

    let var_sum: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    let stddev = (var_sum / count as f64).sqrt();

    let mut percentiles = HashMap::new();
    for p in [10, 25, 75, 90] {
        let idx = (p as f64 / 100.0 * (count as f64 - 1.0)).round() as usize;
        percentiles.insert(format!("p{}", p), values[idx]);
    }

    Some(DistributionStats {
        min,
        max,
        mean,
        median,
        stddev,
        count,
        percentiles,
    })
}
