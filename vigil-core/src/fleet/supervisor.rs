use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use vigil_model::{AgentDescriptor, AgentPayload, subjects};

use super::{
    ContainerRecord, ContainerRole, FleetError, FleetPolicy, FleetTable,
    InfraContainerSpec, InfrastructureSpec, ResourceLimits,
};
use crate::{
    CoreError,
    bus::{BusError, MessageBus, MessageBusExt, json_handler},
    health::{HealthReport, HealthReporter},
    runtime::{
        ContainerHandle, ContainerRuntime, ContainerSpec, NetworkAttachment,
        NetworkId,
    },
};

const HEALTH_NAME: &str = "fleet";

/// Keeps the set of running agent containers in line with run/stop requests.
pub struct FleetSupervisor {
    table: Mutex<FleetTable>,
    running: AtomicUsize,
    runtime: Arc<dyn ContainerRuntime>,
    bus: Arc<dyn MessageBus>,
    policy: FleetPolicy,
    scanner: ContainerHandle,
    json_rpc: ContainerHandle,
}

impl fmt::Debug for FleetSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table_len = self.table.try_lock().map(|table| table.len()).ok();

        f.debug_struct("FleetSupervisor")
            .field("table_len", &table_len)
            .field("scanner", &self.scanner.name)
            .field("json_rpc", &self.json_rpc.name)
            .field("policy", &self.policy)
            .finish()
    }
}

impl FleetSupervisor {
    /// Builds a supervisor around infrastructure containers that are already
    /// running. Both are recorded in the table under their fixed roles.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        bus: Arc<dyn MessageBus>,
        policy: FleetPolicy,
        scanner: ContainerHandle,
        json_rpc: ContainerHandle,
    ) -> Self {
        let mut table = FleetTable::new();
        table.insert(ContainerRecord::infrastructure(
            scanner.clone(),
            ContainerRole::Scanner,
        ));
        table.insert(ContainerRecord::infrastructure(
            json_rpc.clone(),
            ContainerRole::JsonRpcProxy,
        ));
        let running = AtomicUsize::new(table.len());

        Self {
            table: Mutex::new(table),
            running,
            runtime,
            bus,
            policy,
            scanner,
            json_rpc,
        }
    }

    /// Starts the scanner and JSON-RPC proxy containers, then builds the
    /// supervisor around them.
    pub async fn launch(
        runtime: Arc<dyn ContainerRuntime>,
        bus: Arc<dyn MessageBus>,
        policy: FleetPolicy,
        infra: &InfrastructureSpec,
    ) -> Result<Self, FleetError> {
        let network_id = runtime
            .create_public_network(&infra.network_name)
            .await
            .map_err(|source| FleetError::Network {
                container: infra.network_name.clone(),
                source,
            })?;

        let scanner = start_infrastructure(
            runtime.as_ref(),
            &policy,
            &infra.scanner,
            &network_id,
        )
        .await?;
        let json_rpc = match start_infrastructure(
            runtime.as_ref(),
            &policy,
            &infra.json_rpc_proxy,
            &network_id,
        )
        .await
        {
            Ok(handle) => handle,
            Err(err) => {
                // No supervisor exists yet to stop the scanner on shutdown.
                if let Err(stop_err) = runtime.stop_container(&scanner.id).await {
                    warn!(
                        target: "fleet",
                        container = %scanner.name,
                        container_id = %scanner.id,
                        error = %stop_err,
                        "failed to stop scanner after infrastructure startup failed"
                    );
                }
                return Err(err);
            }
        };

        info!(
            target: "fleet",
            scanner = %scanner.name,
            json_rpc = %json_rpc.name,
            network_id = %network_id,
            "infrastructure containers started"
        );

        Ok(Self::new(runtime, bus, policy, scanner, json_rpc))
    }

    /// Subscribes the run and stop handlers on the supervisor's bus.
    pub async fn register_handlers(self: &Arc<Self>) -> Result<(), BusError> {
        let run = Arc::clone(self);
        self.bus
            .subscribe(
                subjects::AGENTS_RUN,
                json_handler(move |payload: AgentPayload| {
                    let supervisor = Arc::clone(&run);
                    async move {
                        supervisor
                            .handle_agent_run(payload)
                            .await
                            .map_err(CoreError::from)
                    }
                }),
            )
            .await?;

        let stop = Arc::clone(self);
        self.bus
            .subscribe(
                subjects::AGENTS_STOP,
                json_handler(move |payload: AgentPayload| {
                    let supervisor = Arc::clone(&stop);
                    async move {
                        supervisor
                            .handle_agent_stop(payload)
                            .await
                            .map_err(CoreError::from)
                    }
                }),
            )
            .await?;

        Ok(())
    }

    /// Starts every requested agent that is not already running.
    ///
    /// A failed start is logged and skipped; the rest of the batch proceeds.
    /// Agents found in the table are reported as running without a new start.
    pub async fn handle_agent_run(
        &self,
        payload: AgentPayload,
    ) -> Result<(), FleetError> {
        let mut table = self.table.lock().await;
        info!(target: "fleet", agents = payload.len(), "handling agent run request");

        for agent in payload {
            let container = agent.container_name();

            if table.contains(&container) {
                info!(
                    target: "fleet",
                    agent = %agent.id,
                    container = %container,
                    "agent container is already running - skipped"
                );
                self.publish_status(subjects::AGENTS_STATUS_RUNNING, vec![agent])
                    .await;
                continue;
            }

            if let Err(err) = self.start_agent(&mut table, &agent).await {
                error!(
                    target: "fleet",
                    agent = %agent.id,
                    container = %container,
                    error = %err,
                    "failed to start agent"
                );
                continue;
            }

            self.publish_status(subjects::AGENTS_STATUS_RUNNING, vec![agent])
                .await;
        }

        self.running.store(table.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Stops every requested agent that has a running container.
    ///
    /// The first stop failure aborts the request and leaves the table as it
    /// was. Agents without a container, and repeats of an agent already
    /// stopped by this request, are skipped and left out of the published
    /// status batch.
    pub async fn handle_agent_stop(
        &self,
        payload: AgentPayload,
    ) -> Result<(), FleetError> {
        let mut table = self.table.lock().await;
        info!(target: "fleet", agents = payload.len(), "handling agent stop request");

        let mut stopped_ids = HashSet::new();
        let mut stopped_agents = Vec::with_capacity(payload.len());

        for agent in &payload {
            let container = agent.container_name();
            let Some(record) = table.get(&container) else {
                warn!(
                    target: "fleet",
                    agent = %agent.id,
                    container = %container,
                    "container for agent was not found - skipping stop action"
                );
                continue;
            };
            let container_id = record.id().clone();
            if stopped_ids.contains(&container_id) {
                info!(
                    target: "fleet",
                    agent = %agent.id,
                    container = %container,
                    "agent listed twice in stop request - already stopped"
                );
                continue;
            }

            if let Err(source) = self.runtime.stop_container(&container_id).await
            {
                error!(
                    target: "fleet",
                    agent = %agent.id,
                    container = %container,
                    container_id = %container_id,
                    error = %source,
                    "failed to stop agent container - aborting stop request"
                );
                return Err(FleetError::StopContainer {
                    container_id,
                    source,
                });
            }

            info!(
                target: "fleet",
                container = %container,
                container_id = %container_id,
                "stopped agent container"
            );
            stopped_ids.insert(container_id);
            stopped_agents.push(agent.clone());
        }

        table.remove_ids(&stopped_ids);
        self.running.store(table.len(), Ordering::Relaxed);

        if !payload.is_empty() {
            self.publish_status(subjects::AGENTS_STATUS_STOPPED, stopped_agents)
                .await;
        }
        Ok(())
    }

    /// Diagnostic copy of the fleet table.
    pub async fn containers(&self) -> Vec<ContainerRecord> {
        self.table.lock().await.snapshot()
    }

    /// Stops every recorded container, agents before infrastructure.
    ///
    /// Individual failures are logged; the table ends up empty either way.
    pub async fn shutdown(&self) {
        let mut table = self.table.lock().await;
        let records = table.drain();
        self.running.store(0, Ordering::Relaxed);
        info!(target: "fleet", containers = records.len(), "stopping all containers");

        for record in records {
            match self.runtime.stop_container(record.id()).await {
                Ok(()) => debug!(
                    target: "fleet",
                    container = %record.name(),
                    container_id = %record.id(),
                    "container stopped"
                ),
                Err(err) => error!(
                    target: "fleet",
                    container = %record.name(),
                    container_id = %record.id(),
                    error = %err,
                    "failed to stop container during shutdown"
                ),
            }
        }
    }

    async fn start_agent(
        &self,
        table: &mut FleetTable,
        agent: &AgentDescriptor,
    ) -> Result<(), FleetError> {
        let container = agent.container_name();

        ensure_local_image(
            self.runtime.as_ref(),
            &format!("agent {}", agent.id),
            &agent.image,
            self.policy.pull_images,
        )
        .await?;

        let network_id = self
            .runtime
            .create_public_network(&container)
            .await
            .map_err(|source| FleetError::Network {
                container: container.clone(),
                source,
            })?;

        let limits = ResourceLimits::resolve(&self.policy.resources);
        let spec = ContainerSpec {
            name: container.clone(),
            image: agent.image.clone(),
            network_id: network_id.clone(),
            linked_network_ids: Vec::new(),
            env: self.policy.agent_env(agent, &self.json_rpc.name),
            log: self.policy.log.clone(),
            cpu_quota: limits.cpu_quota,
            memory_bytes: limits.memory_bytes,
        };

        let handle = self.runtime.start_container(spec).await.map_err(
            |source| FleetError::StartContainer {
                container: container.clone(),
                source,
            },
        )?;

        if let Err(err) = self.link_infrastructure(&network_id).await {
            // Unlinked agents are never recorded, so none may keep running.
            if let Err(stop_err) = self.runtime.stop_container(&handle.id).await
            {
                warn!(
                    target: "fleet",
                    container = %container,
                    container_id = %handle.id,
                    error = %stop_err,
                    "failed to stop partially started agent container"
                );
            }
            return Err(err);
        }

        info!(
            target: "fleet",
            agent = %agent.id,
            container = %container,
            container_id = %handle.id,
            network_id = %network_id,
            "agent container started"
        );
        table.insert(ContainerRecord::agent(handle, agent.clone(), network_id));
        Ok(())
    }

    async fn link_infrastructure(
        &self,
        network_id: &NetworkId,
    ) -> Result<(), FleetError> {
        for infra in [&self.scanner, &self.json_rpc] {
            match self.runtime.attach_network(&infra.id, network_id).await {
                Ok(NetworkAttachment::Attached) => debug!(
                    target: "fleet",
                    container = %infra.name,
                    network_id = %network_id,
                    "attached infrastructure container"
                ),
                Ok(NetworkAttachment::AlreadyAttached) => info!(
                    target: "fleet",
                    container = %infra.name,
                    network_id = %network_id,
                    "container already attached to network"
                ),
                Err(source) => {
                    return Err(FleetError::AttachNetwork {
                        container_id: infra.id.clone(),
                        network_id: network_id.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    async fn publish_status(&self, subject: &str, agents: AgentPayload) {
        if let Err(err) = self.bus.publish_json(subject, &agents).await {
            warn!(
                target: "fleet",
                subject,
                agents = agents.len(),
                error = %err,
                "failed to publish agent status"
            );
        }
    }
}

impl HealthReporter for FleetSupervisor {
    fn name(&self) -> &str {
        HEALTH_NAME
    }

    fn health(&self) -> Vec<HealthReport> {
        vec![HealthReport::info(
            "containers",
            self.running.load(Ordering::Relaxed).to_string(),
        )]
    }
}

async fn ensure_local_image(
    runtime: &dyn ContainerRuntime,
    label: &str,
    image: &str,
    pull: bool,
) -> Result<(), FleetError> {
    let present = runtime.has_image(image).await.map_err(|source| {
        FleetError::Image {
            label: label.to_string(),
            image: image.to_string(),
            source,
        }
    })?;
    if present {
        return Ok(());
    }

    if !pull {
        return Err(FleetError::ImageNotLocal {
            label: label.to_string(),
            image: image.to_string(),
        });
    }

    info!(target: "fleet", label, image, "pulling missing image");
    runtime
        .pull_image(image)
        .await
        .map_err(|source| FleetError::Image {
            label: label.to_string(),
            image: image.to_string(),
            source,
        })
}

async fn start_infrastructure(
    runtime: &dyn ContainerRuntime,
    policy: &FleetPolicy,
    spec: &InfraContainerSpec,
    network_id: &NetworkId,
) -> Result<ContainerHandle, FleetError> {
    ensure_local_image(runtime, &spec.name, &spec.image, policy.pull_images)
        .await?;

    runtime
        .start_container(ContainerSpec {
            name: spec.name.clone(),
            image: spec.image.clone(),
            network_id: network_id.clone(),
            linked_network_ids: Vec::new(),
            env: spec.env.clone(),
            log: policy.log.clone(),
            cpu_quota: None,
            memory_bytes: None,
        })
        .await
        .map_err(|source| FleetError::StartContainer {
            container: spec.name.clone(),
            source,
        })
}
