use thiserror::Error;

use crate::api::ApiError;
use crate::calculations::CalculationError;
use crate::config::ConfigError;
use crate::requisition::RequisitionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Requisition(#[from] RequisitionError),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;
