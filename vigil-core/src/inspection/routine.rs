use async_trait::async_trait;

use vigil_model::{InspectionInputs, InspectionResults};

use super::InspectionError;

/// What one inspection attempt produced.
///
/// Results and error are independent: a routine may return partial results
/// together with the error that kept them partial.
#[derive(Debug)]
pub struct InspectionOutcome {
    pub results: Option<InspectionResults>,
    pub error: Option<InspectionError>,
}

impl InspectionOutcome {
    pub fn success(results: InspectionResults) -> Self {
        Self {
            results: Some(results),
            error: None,
        }
    }

    pub fn failure(error: InspectionError) -> Self {
        Self {
            results: None,
            error: Some(error),
        }
    }

    pub fn partial(results: InspectionResults, error: InspectionError) -> Self {
        Self {
            results: Some(results),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The actual self-check. Only its scheduling is owned by this crate.
#[async_trait]
pub trait InspectionRoutine: Send + Sync {
    async fn inspect(&self, inputs: &InspectionInputs) -> InspectionOutcome;
}
