use thiserror::Error;

use crate::{
    bus::BusError, fleet::FleetError, inspection::InspectionError,
    runtime::RuntimeError,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Container runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("Inspection error: {0}")]
    Inspection(#[from] InspectionError),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
