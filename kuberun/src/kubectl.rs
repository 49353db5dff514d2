use std::{collections::BTreeMap, fmt, path::PathBuf};

use k8s_openapi::api::core::v1::Pod;
use log::{debug, error};

use crate::{
    cluster::{selector_string, AttachOptions, Cluster},
    generate::GeneratedObject,
    process, temp_path, Result,
};

mod name;
pub use name::*;

mod pod_status;
pub use pod_status::*;

/// A failed `kubectl` invocation together with what it printed to stderr.
#[derive(Debug)]
pub struct KubectlError {
    pub error: process::Error,
    pub stderr: String,
}

impl fmt::Display for KubectlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for KubectlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

fn require_success(output: process::Output) -> Result<process::Output, KubectlError> {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    output
        .require_success()
        .map_err(|error| KubectlError { error, stderr })
}

/// Talks to the cluster selected by the kubeconfig, optionally overriding the context.
#[derive(Debug, Clone, Default)]
pub struct Kubectl {
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    pub fn new(context: Option<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            context,
            kubeconfig,
        }
    }

    /// Returns the kubectl command where the cluster selection arguments have already been set.
    fn kubectl(&self) -> process::Command {
        let mut command = process::Command::new("kubectl");
        if let Some(kubeconfig) = self.kubeconfig.as_deref() {
            command = process::args!(command, "--kubeconfig", kubeconfig);
        }
        if let Some(context) = self.context.as_deref() {
            command = process::args!(command, "--context", context);
        }
        command
    }
}

impl Cluster for Kubectl {
    fn create(&self, namespace: &str, object: &GeneratedObject) -> Result<GeneratedObject> {
        let manifest = serde_json::to_vec_pretty(object)?;
        let output = process::args!(
            self.kubectl(),
            "create",
            "--namespace",
            namespace,
            "--output=json",
            "-f",
            "-"
        )
        .output_with_input(manifest.clone())?;

        if log::log_enabled!(log::Level::Error) && !output.status.success() {
            match temp_path::dump_manifest(&manifest) {
                Ok(path) => error!(
                    "{} was rejected, the manifest was written to {}",
                    object.resource_name(),
                    path.display()
                ),
                Err(error) => debug!("failed to write the rejected manifest: {error}"),
            }
        }

        let output = require_success(output)?;
        Ok(object.decode_same_kind(&output.stdout)?)
    }

    fn delete(&self, namespace: &str, object: &GeneratedObject) -> Result<()> {
        let output = process::args!(
            self.kubectl(),
            "delete",
            "--namespace",
            namespace,
            "--ignore-not-found",
            "--wait=false",
            object.resource_name(),
        )
        .try_output()?;
        require_success(output)?;
        Ok(())
    }

    fn pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let output = process::args!(
            self.kubectl(),
            "get",
            "pod",
            "--namespace",
            namespace,
            name,
            "--output=json",
        )
        .try_output()?;
        let output = require_success(output)?;

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn pods(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let output = process::args!(
            self.kubectl(),
            "get",
            "pods",
            "--namespace",
            namespace,
            format!("--selector={}", selector_string(selector)),
            "--output=jsonpath={.items[*].metadata.name}"
        )
        .try_output()?;
        let output = require_success(output)?;

        Ok(std::str::from_utf8(&output.stdout)?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    fn attach(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        options: AttachOptions,
    ) -> Result<()> {
        let mut command = process::args!(
            self.kubectl(),
            "attach",
            "--namespace",
            namespace,
            pod,
            "--container",
            container,
        );
        if options.stdin {
            command = process::args!(command, "--stdin");
        }
        if options.tty {
            command = process::args!(command, "--tty");
        }
        // A tty is handed to kubectl as is, otherwise we relay stdin ourselves.
        command.interact(options.stdin && !options.tty)?;
        Ok(())
    }

    fn follow_logs(&self, namespace: &str, pod: &str, container: &str) -> Result<()> {
        process::args!(
            self.kubectl(),
            "logs",
            "--namespace",
            namespace,
            "--follow",
            pod,
            "--container",
            container,
        )
        .status()?;
        Ok(())
    }
}
