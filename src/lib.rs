//! Nutriward: hospital nutrition therapy back office
//!
//! Builds billing requisitions and diet maps from active prescriptions,
//! estimates nutritional requirements, suggests formulas and serves the
//! results over a small HTTP API.

pub mod api;
pub mod cache;
pub mod calculations;
pub mod config;
pub mod error;
pub mod nutrition;
pub mod recommendations;
pub mod reporting;
pub mod requisition;
pub mod store;

pub use cache::TtlCache;
pub use error::{Error, Result};
pub use nutrition::CatalogSnapshot;
pub use requisition::{generate_requisition_data, RequisitionData, RequisitionOptions};
pub use store::SnapshotStore;
