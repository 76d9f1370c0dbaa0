pub mod rest;

pub use rest::{ApiError, ApiResponse, RestApi};
