//! Docker engine adapter driven through the `docker` CLI.
//!
//! Each operation is first rendered as a [`CommandSpec`] by a pure builder so
//! the exact engine invocation can be asserted in tests without a daemon.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    CommandOutput, CommandSpec, ContainerHandle, ContainerId,
    ContainerRuntime, ContainerSpec, NetworkAttachment, NetworkId,
    RuntimeError, run_spec_with_output,
};

const ALREADY_IN_NETWORK: &str = "already exists in network";
const NETWORK_EXISTS: &str = "already exists";
const NO_SUCH_IMAGE: &str = "no such image";

#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    docker_bin: String,
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliRuntime {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RuntimeError> {
        debug!(target: "runtime::docker", command = %spec, "running docker command");
        run_spec_with_output(spec).await
    }
}

pub fn image_inspect_spec(docker: &str, image: &str) -> CommandSpec {
    CommandSpec::new(docker).args([
        "image",
        "inspect",
        "--format",
        "{{.Id}}",
        image,
    ])
}

pub fn image_pull_spec(docker: &str, image: &str) -> CommandSpec {
    CommandSpec::new(docker).args(["pull", "--quiet", image])
}

pub fn network_create_spec(docker: &str, name: &str) -> CommandSpec {
    CommandSpec::new(docker).args([
        "network", "create", "--driver", "bridge", name,
    ])
}

pub fn network_inspect_spec(docker: &str, name: &str) -> CommandSpec {
    CommandSpec::new(docker).args([
        "network", "inspect", "--format", "{{.Id}}", name,
    ])
}

pub fn network_connect_spec(
    docker: &str,
    network: &NetworkId,
    container: &ContainerId,
) -> CommandSpec {
    CommandSpec::new(docker).args([
        "network",
        "connect",
        network.0.as_str(),
        container.0.as_str(),
    ])
}

pub fn stop_spec(docker: &str, container: &ContainerId) -> CommandSpec {
    CommandSpec::new(docker).args(["stop", container.0.as_str()])
}

/// `docker run` for a detached, self-removing container on its primary network.
pub fn run_container_spec(docker: &str, spec: &ContainerSpec) -> CommandSpec {
    let mut cmd = CommandSpec::new(docker).args([
        "run",
        "--detach",
        "--rm",
        "--name",
        spec.name.as_str(),
        "--network",
        spec.network_id.0.as_str(),
        "--log-driver",
        "json-file",
    ]);

    cmd = cmd
        .arg("--log-opt")
        .arg(format!("max-size={}", spec.log.max_size))
        .arg("--log-opt")
        .arg(format!("max-file={}", spec.log.max_files));

    if let Some(quota) = spec.cpu_quota {
        cmd = cmd.arg("--cpu-quota").arg(quota.to_string());
    }
    if let Some(memory) = spec.memory_bytes {
        cmd = cmd.arg("--memory").arg(format!("{memory}b"));
    }

    for (key, value) in &spec.env {
        cmd = cmd.arg("--env").arg(format!("{key}={value}"));
    }

    cmd.arg(spec.image.as_str())
}

fn first_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn stderr_mentions(output: &CommandOutput, needle: &str) -> bool {
    output.stderr.to_ascii_lowercase().contains(needle)
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn has_image(&self, image: &str) -> Result<bool, RuntimeError> {
        let spec = image_inspect_spec(&self.docker_bin, image);
        let output = self.run(&spec).await?;
        if output.success {
            return Ok(true);
        }
        if stderr_mentions(&output, NO_SUCH_IMAGE) {
            return Ok(false);
        }
        output.into_result(&spec).map(|_| false)
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let spec = image_pull_spec(&self.docker_bin, image);
        self.run(&spec).await?.into_result(&spec)?;
        info!(target: "runtime::docker", image, "pulled image");
        Ok(())
    }

    async fn create_public_network(
        &self,
        name: &str,
    ) -> Result<NetworkId, RuntimeError> {
        let spec = network_create_spec(&self.docker_bin, name);
        let output = self.run(&spec).await?;

        let output = if !output.success && stderr_mentions(&output, NETWORK_EXISTS)
        {
            debug!(target: "runtime::docker", network = name, "network exists - resolving id");
            let inspect = network_inspect_spec(&self.docker_bin, name);
            self.run(&inspect).await?.into_result(&inspect)?
        } else {
            output.into_result(&spec)?
        };

        first_line(&output.stdout).map(NetworkId).ok_or_else(|| {
            RuntimeError::InvalidOutput(format!(
                "no network id returned for '{name}'"
            ))
        })
    }

    async fn start_container(
        &self,
        spec: ContainerSpec,
    ) -> Result<ContainerHandle, RuntimeError> {
        let run = run_container_spec(&self.docker_bin, &spec);
        let output = self.run(&run).await?.into_result(&run)?;

        let id = first_line(&output.stdout).map(ContainerId).ok_or_else(|| {
            RuntimeError::InvalidOutput(format!(
                "no container id returned for '{}'",
                spec.name
            ))
        })?;

        for network in &spec.linked_network_ids {
            self.attach_network(&id, network).await?;
        }

        info!(
            target: "runtime::docker",
            container = %spec.name,
            container_id = %id,
            image = %spec.image,
            "container started"
        );

        Ok(ContainerHandle {
            id,
            name: spec.name,
            image: spec.image,
        })
    }

    async fn attach_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<NetworkAttachment, RuntimeError> {
        let spec = network_connect_spec(&self.docker_bin, network, container);
        let output = self.run(&spec).await?;
        if output.success {
            return Ok(NetworkAttachment::Attached);
        }
        if stderr_mentions(&output, ALREADY_IN_NETWORK) {
            return Ok(NetworkAttachment::AlreadyAttached);
        }
        output
            .into_result(&spec)
            .map(|_| NetworkAttachment::Attached)
    }

    async fn stop_container(
        &self,
        container: &ContainerId,
    ) -> Result<(), RuntimeError> {
        let spec = stop_spec(&self.docker_bin, container);
        self.run(&spec).await?.into_result(&spec)?;
        Ok(())
    }
}
