use serde::{Deserialize, Serialize};
use std::fmt;

use super::Prescription;

/// Unit a catalog product is billed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BillingUnit {
    Ml,
    Unit,
    Other(String),
}

impl BillingUnit {
    pub fn label(&self) -> &str {
        match self {
            BillingUnit::Ml => "ml",
            BillingUnit::Unit => "unit",
            BillingUnit::Other(label) => label,
        }
    }

    /// Formulas in these units are billed by whole presentation bags
    pub fn bills_by_bag(&self) -> bool {
        matches!(self, BillingUnit::Ml | BillingUnit::Unit)
    }
}

impl Default for BillingUnit {
    fn default() -> Self {
        BillingUnit::Ml
    }
}

impl From<String> for BillingUnit {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "ml" => BillingUnit::Ml,
            "unit" => BillingUnit::Unit,
            _ => BillingUnit::Other(value),
        }
    }
}

impl From<BillingUnit> for String {
    fn from(unit: BillingUnit) -> Self {
        unit.label().to_string()
    }
}

impl fmt::Display for BillingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clinical family a formula belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaCategory {
    #[default]
    Standard,
    HighProtein,
    Diabetic,
    Renal,
    Hepatic,
    PeptideBased,
    EnergyDense,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub billing_unit: BillingUnit,
    #[serde(default)]
    pub unit_price: f64,
    /// Standard package sizes in ml
    #[serde(default)]
    pub presentations: Vec<f64>,
    #[serde(default)]
    pub kcal_per_ml: f64,
    #[serde(default)]
    pub protein_per_ml: f64,   // grams
    #[serde(default)]
    pub category: FormulaCategory,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Formula {
    /// Bag size used for billing: the first positive presentation
    pub fn bag_size(&self) -> Option<f64> {
        self.presentations.iter().copied().find(|size| *size > 0.0)
    }
}

/// Modular supplements (protein powders, fibre, thickeners)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub name: String,
    #[serde(default = "unit_billing")]
    pub billing_unit: BillingUnit,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub kcal_per_unit: f64,
    #[serde(default)]
    pub protein_per_unit: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyType {
    Bottle,
    Set,
    Other,
}

/// Consumables (bottles, infusion sets) billed alongside the therapy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supply {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub supply_type: SupplyType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub unit_price: f64,
}

/// Everything one generation pass reads: prescriptions plus the catalogs
/// they point into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub formulas: Vec<Formula>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub supplies: Vec<Supply>,
}

impl CatalogSnapshot {
    pub fn formula(&self, id: &str) -> Option<&Formula> {
        self.formulas.iter().find(|f| f.id == id)
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn prescription(&self, id: &str) -> Option<&Prescription> {
        self.prescriptions.iter().find(|p| p.id == id)
    }
}

fn default_true() -> bool {
    true
}

fn unit_billing() -> BillingUnit {
    BillingUnit::Unit
}
