use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Notify;

use vigil_core::runtime::{
    ContainerHandle, ContainerId, ContainerRuntime, ContainerSpec,
    NetworkAttachment, NetworkId, RuntimeError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    HasImage(String),
    PullImage(String),
    CreateNetwork(String),
    Start(String),
    Attach { container: String, network: String },
    Stop(String),
}

/// In-memory container runtime that records every call.
///
/// Container IDs are `cid-<name>` and network IDs `net-<name>` so tests can
/// predict them.
#[derive(Default)]
pub struct StubRuntime {
    calls: Mutex<Vec<RuntimeCall>>,
    specs: Mutex<Vec<ContainerSpec>>,
    missing_images: Mutex<HashSet<String>>,
    fail_start: Mutex<HashSet<String>>,
    fail_stop: Mutex<HashSet<String>>,
    already_attached: AtomicBool,
    fail_attach: AtomicBool,
    start_gate: Mutex<Option<Arc<Notify>>>,
    start_entered: Notify,
}

pub fn container_id(name: &str) -> ContainerId {
    ContainerId(format!("cid-{name}"))
}

pub fn handle(name: &str, image: &str) -> ContainerHandle {
    ContainerHandle {
        id: container_id(name),
        name: name.to_string(),
        image: image.to_string(),
    }
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    /// Names passed to successful or failed start calls, in order.
    pub fn starts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Start(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Container IDs passed to stop calls, in order.
    pub fn stops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Stop(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn mark_missing(&self, image: &str) {
        self.missing_images.lock().unwrap().insert(image.to_string());
    }

    pub fn fail_start_for(&self, name: &str) {
        self.fail_start.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_stop_for(&self, name: &str) {
        self.fail_stop.lock().unwrap().insert(container_id(name).0);
    }

    pub fn report_already_attached(&self) {
        self.already_attached.store(true, Ordering::SeqCst);
    }

    pub fn fail_attach(&self) {
        self.fail_attach.store(true, Ordering::SeqCst);
    }

    /// Makes every later start call wait until the returned gate is
    /// notified.
    pub fn hold_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a start call is waiting on the gate.
    pub async fn start_held(&self) {
        self.start_entered.notified().await;
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn failed(what: &str) -> RuntimeError {
    RuntimeError::Other(format!("stub failure: {what}"))
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn has_image(&self, image: &str) -> Result<bool, RuntimeError> {
        self.record(RuntimeCall::HasImage(image.to_string()));
        Ok(!self.missing_images.lock().unwrap().contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::PullImage(image.to_string()));
        self.missing_images.lock().unwrap().remove(image);
        Ok(())
    }

    async fn create_public_network(
        &self,
        name: &str,
    ) -> Result<NetworkId, RuntimeError> {
        self.record(RuntimeCall::CreateNetwork(name.to_string()));
        Ok(NetworkId(format!("net-{name}")))
    }

    async fn start_container(
        &self,
        spec: ContainerSpec,
    ) -> Result<ContainerHandle, RuntimeError> {
        self.record(RuntimeCall::Start(spec.name.clone()));
        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.start_entered.notify_one();
            gate.notified().await;
        }
        if self.fail_start.lock().unwrap().contains(&spec.name) {
            return Err(failed("start"));
        }
        let started = handle(&spec.name, &spec.image);
        self.specs.lock().unwrap().push(spec);
        Ok(started)
    }

    async fn attach_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<NetworkAttachment, RuntimeError> {
        self.record(RuntimeCall::Attach {
            container: container.0.clone(),
            network: network.0.clone(),
        });
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(failed("attach"));
        }
        if self.already_attached.load(Ordering::SeqCst) {
            return Ok(NetworkAttachment::AlreadyAttached);
        }
        Ok(NetworkAttachment::Attached)
    }

    async fn stop_container(
        &self,
        container: &ContainerId,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop(container.0.clone()));
        if self.fail_stop.lock().unwrap().contains(&container.0) {
            return Err(failed("stop"));
        }
        Ok(())
    }
}
