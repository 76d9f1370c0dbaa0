//! Nutrition therapy domain types
//!
//! Prescriptions and the catalogs they reference. Every record here is
//! owned by the caller and treated as read-only by the rest of the crate.

pub mod catalog;
pub mod schedule;

pub use catalog::{BillingUnit, CatalogSnapshot, Formula, FormulaCategory, Module, Supply, SupplyType};
pub use schedule::{schedule_position, sort_by_schedule, SCHEDULE_TIMES};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    Active,
    Suspended,
    Completed,
}

/// Route of the nutrition therapy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TherapyType {
    Enteral,
    Parenteral,
    Oral,
}

impl TherapyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TherapyType::Enteral => "enteral",
            TherapyType::Parenteral => "parenteral",
            TherapyType::Oral => "oral",
        }
    }
}

/// Open systems are filled by hand into bottles; closed systems come pre-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemType {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfusionMode {
    Pump,
    Gravity,
}

impl InfusionMode {
    /// Name fragments used to find the matching infusion set in the supply catalog
    pub fn supply_keywords(&self) -> &'static [&'static str] {
        match self {
            InfusionMode::Pump => &["pump", "bomba"],
            InfusionMode::Gravity => &["gravity", "gravit"],
        }
    }
}

/// One formula administered at a set of times-of-day
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaLine {
    pub formula_id: String,
    #[serde(default)]
    pub formula_name: Option<String>,
    pub volume: f64,             // ml per administration
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub rate: Option<f64>,       // ml/h when infused
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLine {
    pub module_id: String,
    #[serde(default)]
    pub module_name: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub times: Vec<String>,
}

/// Free water flushes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hydration {
    pub volume: f64,
    #[serde(default)]
    pub times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub bed: String,
    pub ward: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub status: PrescriptionStatus,
    pub therapy_type: TherapyType,
    pub system_type: SystemType,
    #[serde(default)]
    pub infusion_mode: Option<InfusionMode>,
    #[serde(default)]
    pub formulas: Vec<FormulaLine>,
    #[serde(default)]
    pub modules: Vec<ModuleLine>,
    #[serde(default)]
    pub hydration: Option<Hydration>,
}

impl Prescription {
    pub fn is_active(&self) -> bool {
        self.status == PrescriptionStatus::Active
    }

    /// Whether the prescription runs on any day in `[from, to]`.
    /// A missing end date means the prescription is open-ended.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && self.end_date.map_or(true, |end| end >= from)
    }

    pub fn in_ward(&self, unit_name: &str) -> bool {
        unit_name == ALL_UNITS || self.ward == unit_name
    }
}

/// Ward filter sentinel meaning "every ward"
pub const ALL_UNITS: &str = "all";

#[cfg(test)]
mod tests {
    use super::*;

    fn prescription(start: NaiveDate, end: Option<NaiveDate>) -> Prescription {
        Prescription {
            id: "rx-1".to_string(),
            patient_id: "p-1".to_string(),
            patient_name: "Ana".to_string(),
            bed: "01".to_string(),
            ward: "ICU".to_string(),
            start_date: start,
            end_date: end,
            status: PrescriptionStatus::Active,
            therapy_type: TherapyType::Enteral,
            system_type: SystemType::Closed,
            infusion_mode: None,
            formulas: vec![],
            modules: vec![],
            hydration: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_open_ended_prescription_overlaps_future_ranges() {
        let rx = prescription(day(1), None);
        assert!(rx.overlaps(day(20), day(25)));
        let feb = |d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap();
        assert!(!rx.overlaps(feb(20), feb(29)));
    }

    #[test]
    fn test_ended_prescription_excluded_after_end() {
        let rx = prescription(day(1), Some(day(5)));
        assert!(rx.overlaps(day(5), day(8)));
        assert!(!rx.overlaps(day(6), day(8)));
    }

    #[test]
    fn test_ward_filter() {
        let rx = prescription(day(1), None);
        assert!(rx.in_ward("ICU"));
        assert!(rx.in_ward(ALL_UNITS));
        assert!(!rx.in_ward("Pediatrics"));
    }

    #[test]
    fn test_deserializes_camel_case_snapshot_row() {
        let json = r#"{
            "id": "rx-9", "patientId": "p-9", "patientName": "Bruno",
            "bed": "12", "ward": "Clinic", "startDate": "2024-03-01",
            "status": "active", "therapyType": "enteral", "systemType": "open",
            "infusionMode": "gravity",
            "formulas": [{"formulaId": "f-1", "volume": 250, "times": ["09:00"]}]
        }"#;
        let rx: Prescription = serde_json::from_str(json).unwrap();
        assert_eq!(rx.infusion_mode, Some(InfusionMode::Gravity));
        assert_eq!(rx.formulas[0].volume, 250.0);
        assert!(rx.end_date.is_none());
        assert!(rx.hydration.is_none());
    }
}
