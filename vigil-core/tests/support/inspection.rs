use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use vigil_core::inspection::{
    ChainClient, InspectionError, InspectionOutcome, InspectionRoutine,
};
use vigil_model::{InspectionInputs, InspectionResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    Fail,
    /// Error together with partial results.
    FailWithResults,
    /// Never completes; only a timeout gets the caller out.
    Hang,
}

/// Inspection routine that plays back a script, repeating the last step
/// once the script runs out.
pub struct ScriptedRoutine {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<InspectionInputs>>,
}

impl ScriptedRoutine {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(Step::Succeed),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new([step])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<InspectionInputs> {
        self.inputs.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = script.pop_front() {
            *last = step;
        }
        *last
    }
}

#[async_trait]
impl InspectionRoutine for ScriptedRoutine {
    async fn inspect(&self, inputs: &InspectionInputs) -> InspectionOutcome {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inputs.lock().unwrap().push(inputs.clone());

        let mut results = InspectionResults::new(inputs.clone());
        results.set_indicator("attempt", attempt as f64);

        match self.next_step() {
            Step::Succeed => InspectionOutcome::success(results),
            Step::Fail => InspectionOutcome::failure(InspectionError::routine(
                format!("scripted failure #{attempt}"),
            )),
            Step::FailWithResults => InspectionOutcome::partial(
                results,
                InspectionError::routine("partial"),
            ),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Chain client answering with a fixed block number or a fixed failure.
pub struct ScriptedChain {
    block: Mutex<Option<u64>>,
    calls: AtomicUsize,
}

impl ScriptedChain {
    pub fn at_block(block: u64) -> Self {
        Self {
            block: Mutex::new(Some(block)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            block: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn block_number(&self) -> Result<u64, InspectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let block = *self.block.lock().unwrap();
        block.ok_or_else(|| InspectionError::Rpc("connection refused".into()))
    }
}
