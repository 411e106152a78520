//! Composition root: wires runtime, bus, supervisor, scheduler and the HTTP
//! server together and tears them down in order on shutdown.

use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vigil_config::Config;
use vigil_core::{
    bus::{InProcMessageBus, MessageBus},
    fleet::FleetSupervisor,
    inspection::{
        ChainClient, InspectionRoutine, InspectionScheduler, JsonRpcChainClient,
    },
    runtime::{ContainerRuntime, DockerCliRuntime},
};

use crate::{
    probe::RpcProbeInspector,
    server::{AppState, create_app},
};

/// Per-call bound for the probes of the default inspection routine.
pub const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the node until `shutdown` is cancelled, then stops everything it
/// started.
pub async fn run(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let runtime: Arc<dyn ContainerRuntime> =
        Arc::new(DockerCliRuntime::new(config.fleet.docker_bin.clone()));
    let bus = Arc::new(InProcMessageBus::new(shutdown.child_token()));
    let bus_handle: Arc<dyn MessageBus> = bus.clone();

    let supervisor = Arc::new(
        FleetSupervisor::launch(
            runtime,
            Arc::clone(&bus_handle),
            config.fleet_policy(),
            config.infrastructure(),
        )
        .await
        .context("failed to start infrastructure containers")?,
    );
    let scheduler = match start_services(&config, &supervisor, &bus_handle, &shutdown).await {
        Ok(scheduler) => scheduler,
        Err(err) => {
            shutdown.cancel();
            bus.shutdown().await;
            supervisor.shutdown().await;
            error!(error = %err, "node failed to start");
            return Err(err);
        }
    };

    let state = AppState::new(bus_handle)
        .with_reporter(supervisor.clone())
        .with_reporter(scheduler.clone());

    let served = serve(&config.server_addr(), state, shutdown.clone()).await;

    shutdown.cancel();
    bus.shutdown().await;
    scheduler.shutdown().await;
    supervisor.shutdown().await;
    info!("node stopped");

    served
}

/// Subscribes the fleet handlers and starts the inspection scheduler.
async fn start_services(
    config: &Config,
    supervisor: &Arc<FleetSupervisor>,
    bus: &Arc<dyn MessageBus>,
    shutdown: &CancellationToken,
) -> anyhow::Result<Arc<InspectionScheduler>> {
    supervisor
        .register_handlers()
        .await
        .context("failed to subscribe fleet handlers")?;

    let settings = config.inspection_settings();
    let chain: Arc<dyn ChainClient> = Arc::new(
        JsonRpcChainClient::new(
            settings.scan_api_url.clone(),
            settings.probe_timeout,
        )
        .context("failed to build chain rpc client")?,
    );
    let routine: Arc<dyn InspectionRoutine> = Arc::new(
        RpcProbeInspector::new(PROBE_REQUEST_TIMEOUT)
            .context("failed to build inspection routine")?,
    );
    let scheduler = Arc::new(InspectionScheduler::new(
        settings,
        routine,
        chain,
        Arc::clone(bus),
    ));
    scheduler
        .start(shutdown.clone())
        .await
        .context("failed to start inspection scheduler")?;

    Ok(scheduler)
}

async fn serve(
    addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health server to {addr}"))?;
    info!(addr = %addr, "health server listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("health server failed")
}

/// Cancels `shutdown` on Ctrl-C.
pub async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("ctrl-c received, shutting down");
                shutdown.cancel();
            }
            Err(err) => {
                error!(error = %err, "failed to listen for ctrl-c");
                warn!("the node can only be stopped by terminating the process");
            }
        }
    }
}
