//! Billing requisitions
//!
//! Turns a snapshot of active prescriptions into:
//! - a per-patient diet map (what is administered, and when)
//! - a consolidated billing list (quantities and costs per product)
//!
//! for a ward, a date range and a subset of the daily schedule.

mod consolidation;
pub mod supplies;

pub use consolidation::Consolidation;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::nutrition::{
    sort_by_schedule, CatalogSnapshot, Prescription, SystemType, TherapyType,
};

const SECONDS_PER_DAY: i64 = 86_400;
const WATER_LABEL: &str = "Water";
const UNKNOWN_FORMULA: &str = "Unknown formula";
const UNKNOWN_MODULE: &str = "Unknown module";

#[derive(Debug, Error)]
pub enum RequisitionError {
    #[error("end date {end} precedes start date {start}")]
    InvalidDateRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// What a diet-map row administers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Formula,
    Water,
    Module,
    Supplement,
}

impl ItemType {
    /// Ordering of rows belonging to the same patient
    pub fn sort_order(&self) -> u8 {
        match self {
            ItemType::Formula => 0,
            ItemType::Water => 1,
            ItemType::Module => 2,
            ItemType::Supplement => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Formula,
    Module,
    Supply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietMapItem {
    pub patient_id: String,
    pub patient_name: String,
    pub bed: String,
    pub ward: String,
    pub item_type: ItemType,
    pub product_name: String,
    pub route: TherapyType,
    pub quantity: f64,           // per administration
    pub unit: String,
    pub rate: Option<f64>,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedItem {
    pub product_id: String,
    pub product_name: String,
    pub kind: ProductKind,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub subtotal: f64,
}

/// Names printed in the signature area of the requisition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureBlock {
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub received_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionOptions {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// Ward name, or `"all"`
    pub unit_name: String,
    pub selected_times: Vec<String>,
    #[serde(default)]
    pub signatures: SignatureBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionData {
    pub diet_map: Vec<DietMapItem>,
    pub consolidated: Vec<ConsolidatedItem>,
    pub total_cost: f64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub unit_name: String,
    pub selected_times: Vec<String>,
    pub day_diff: u32,
    pub signatures: SignatureBlock,
    pub printed_at: DateTime<Utc>,
}

/// Builds the requisition for `options` over `snapshot`, stamped with the current time.
pub fn generate_requisition_data(
    options: &RequisitionOptions,
    snapshot: &CatalogSnapshot,
) -> Result<RequisitionData, RequisitionError> {
    generate_requisition_data_at(options, snapshot, Utc::now())
}

/// Same as [`generate_requisition_data`] with an explicit print timestamp.
#[instrument(skip_all, fields(unit = %options.unit_name, times = options.selected_times.len()))]
pub fn generate_requisition_data_at(
    options: &RequisitionOptions,
    snapshot: &CatalogSnapshot,
    printed_at: DateTime<Utc>,
) -> Result<RequisitionData, RequisitionError> {
    if options.end_date < options.start_date {
        return Err(RequisitionError::InvalidDateRange {
            start: options.start_date,
            end: options.end_date,
        });
    }

    let day_diff = day_diff(options.start_date, options.end_date);
    let first_day = options.start_date.date();
    let last_day = options.end_date.date();
    let selected: HashSet<&str> = options.selected_times.iter().map(String::as_str).collect();

    let mut diet_map = Vec::new();
    let mut consolidation = Consolidation::new();

    let in_scope = snapshot.prescriptions.iter().filter(|rx| {
        rx.is_active() && rx.in_ward(&options.unit_name) && rx.overlaps(first_day, last_day)
    });

    for rx in in_scope {
        let mut pass = PrescriptionPass {
            rx,
            snapshot,
            selected: &selected,
            day_diff: day_diff as f64,
            daily_bottles: 0,
        };
        pass.formulas(&mut diet_map, &mut consolidation);
        pass.modules(&mut diet_map, &mut consolidation);
        pass.hydration(&mut diet_map);
        if !selected.is_empty() {
            pass.supplies(&mut consolidation);
        }
    }

    diet_map.sort_by(compare_diet_rows);

    let mut consolidated = consolidation.into_items();
    consolidated.sort_by(|a, b| {
        locale_cmp(&a.product_name, &b.product_name).then_with(|| a.product_id.cmp(&b.product_id))
    });
    let total_cost = consolidated.iter().map(|item| item.subtotal).sum();

    info!(
        rows = diet_map.len(),
        products = consolidated.len(),
        day_diff,
        "requisition generated"
    );

    Ok(RequisitionData {
        diet_map,
        consolidated,
        total_cost,
        start_date: options.start_date,
        end_date: options.end_date,
        unit_name: options.unit_name.clone(),
        selected_times: options.selected_times.clone(),
        day_diff,
        signatures: options.signatures.clone(),
        printed_at,
    })
}

/// Number of days every quantity is multiplied by: whole days between the
/// two instants, rounded up, never below one.
pub fn day_diff(start: NaiveDateTime, end: NaiveDateTime) -> u32 {
    let seconds = (end - start).num_seconds().max(0);
    let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    days.max(1) as u32
}

/// Whole bags needed for `volume`, never rounding down a partial bag
pub fn bags_needed(volume: f64, bag_size: f64) -> f64 {
    // absorb float noise such as 1000.0000000001 before rounding up
    (volume / bag_size - 1e-9).ceil().max(0.0)
}

/// Times of `line_times` that were selected, in schedule order
fn matched_times(line_times: &[String], selected: &HashSet<&str>) -> Vec<String> {
    let mut matched: Vec<String> = line_times
        .iter()
        .filter(|t| selected.contains(t.as_str()))
        .cloned()
        .collect();
    sort_by_schedule(&mut matched);
    matched.dedup();
    matched
}

/// Lowercased text with diacritics removed, so `Óleo` sorts with `oleo`
fn collation_key(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Accent- and case-insensitive comparison with an exact tie-break
fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn compare_diet_rows(a: &DietMapItem, b: &DietMapItem) -> Ordering {
    locale_cmp(&a.ward, &b.ward)
        .then_with(|| locale_cmp(&a.bed, &b.bed))
        .then_with(|| locale_cmp(&a.patient_name, &b.patient_name))
        .then_with(|| a.patient_id.cmp(&b.patient_id))
        .then_with(|| a.item_type.sort_order().cmp(&b.item_type.sort_order()))
}

/// Per-prescription state of one generation pass
struct PrescriptionPass<'a> {
    rx: &'a Prescription,
    snapshot: &'a CatalogSnapshot,
    selected: &'a HashSet<&'a str>,
    day_diff: f64,
    daily_bottles: u32,
}

impl<'a> PrescriptionPass<'a> {
    fn row(&self, item_type: ItemType, product_name: String, quantity: f64, unit: &str) -> DietMapItem {
        DietMapItem {
            patient_id: self.rx.patient_id.clone(),
            patient_name: self.rx.patient_name.clone(),
            bed: self.rx.bed.clone(),
            ward: self.rx.ward.clone(),
            item_type,
            product_name,
            route: self.rx.therapy_type,
            quantity,
            unit: unit.to_string(),
            rate: None,
            times: Vec::new(),
        }
    }

    fn count_bottles(&mut self, administrations: usize) {
        if self.rx.system_type == SystemType::Open {
            self.daily_bottles += administrations as u32;
        }
    }

    fn formulas(&mut self, diet_map: &mut Vec<DietMapItem>, consolidation: &mut Consolidation) {
        let item_type = match self.rx.therapy_type {
            TherapyType::Oral => ItemType::Supplement,
            _ => ItemType::Formula,
        };

        let rx = self.rx;
        for line in &rx.formulas {
            let times = matched_times(&line.times, self.selected);
            if times.is_empty() {
                continue;
            }

            let formula = self.snapshot.formula(&line.formula_id);
            if formula.is_none() {
                warn!(
                    prescription = %self.rx.id,
                    formula = %line.formula_id,
                    "formula missing from catalog, billed at zero"
                );
            }
            let name = formula
                .map(|f| f.name.clone())
                .or_else(|| line.formula_name.clone())
                .unwrap_or_else(|| UNKNOWN_FORMULA.to_string());

            let administrations = times.len();
            let mut row = self.row(item_type, name.clone(), line.volume, "ml");
            row.rate = line.rate;
            row.times = times;
            diet_map.push(row);

            let daily_volume = line.volume * administrations as f64;
            let bag = formula
                .filter(|f| f.billing_unit.bills_by_bag())
                .and_then(|f| f.bag_size().map(|size| (f, size)));

            match bag {
                Some((f, size)) => {
                    let bags = bags_needed(daily_volume, size) * self.day_diff;
                    consolidation.add(
                        ProductKind::Formula,
                        &f.id,
                        &name,
                        &format!("bag {} ml", size),
                        f.unit_price * size,
                        bags,
                    );
                }
                None => {
                    let (unit, price) = formula
                        .map(|f| (f.billing_unit.label().to_string(), f.unit_price))
                        .unwrap_or_else(|| ("ml".to_string(), 0.0));
                    consolidation.add(
                        ProductKind::Formula,
                        &line.formula_id,
                        &name,
                        &unit,
                        price,
                        daily_volume * self.day_diff,
                    );
                }
            }

            self.count_bottles(administrations);
        }
    }

    fn modules(&mut self, diet_map: &mut Vec<DietMapItem>, consolidation: &mut Consolidation) {
        let rx = self.rx;
        for line in &rx.modules {
            let times = matched_times(&line.times, self.selected);
            if times.is_empty() {
                continue;
            }

            let module = self.snapshot.module(&line.module_id);
            if module.is_none() {
                warn!(
                    prescription = %self.rx.id,
                    module = %line.module_id,
                    "module missing from catalog, billed at zero"
                );
            }
            let name = module
                .map(|m| m.name.clone())
                .or_else(|| line.module_name.clone())
                .unwrap_or_else(|| UNKNOWN_MODULE.to_string());
            let unit = module
                .map(|m| m.billing_unit.label().to_string())
                .or_else(|| line.unit.clone())
                .unwrap_or_else(|| "unit".to_string());
            let row_unit = line.unit.clone().unwrap_or_else(|| unit.clone());

            let administrations = times.len() as f64;
            let mut row = self.row(ItemType::Module, name.clone(), line.amount, &row_unit);
            row.times = times;
            diet_map.push(row);

            consolidation.add(
                ProductKind::Module,
                &line.module_id,
                &name,
                &unit,
                module.map_or(0.0, |m| m.unit_price),
                line.amount * administrations * self.day_diff,
            );
        }
    }

    /// Water goes on the diet map only; it is never billed.
    fn hydration(&mut self, diet_map: &mut Vec<DietMapItem>) {
        let rx = self.rx;
        let Some(hydration) = &rx.hydration else {
            return;
        };
        if hydration.volume <= 0.0 {
            return;
        }
        let times = matched_times(&hydration.times, self.selected);
        if times.is_empty() {
            return;
        }

        let administrations = times.len();
        let mut row = self.row(ItemType::Water, WATER_LABEL.to_string(), hydration.volume, "ml");
        row.times = times;
        diet_map.push(row);

        self.count_bottles(administrations);
    }

    fn supplies(&self, consolidation: &mut Consolidation) {
        let catalog = &self.snapshot.supplies;

        if let Some(mode) = self.rx.infusion_mode {
            match supplies::infusion_set(catalog, mode) {
                Some(set) => consolidation.add(
                    ProductKind::Supply,
                    &set.id,
                    &set.name,
                    "unit",
                    set.unit_price,
                    self.day_diff,
                ),
                None => debug!(prescription = %self.rx.id, ?mode, "no infusion set in catalog"),
            }
        }

        if self.daily_bottles > 0 {
            match supplies::bottle(catalog) {
                Some(bottle) => consolidation.add(
                    ProductKind::Supply,
                    &bottle.id,
                    &bottle.name,
                    "unit",
                    bottle.unit_price,
                    self.daily_bottles as f64 * self.day_diff,
                ),
                None => debug!(prescription = %self.rx.id, "no bottle in catalog"),
            }
        }
    }
}
