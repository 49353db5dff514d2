//! Waits for the pod of a created workload and connects the terminal to it.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::{
    cluster::{AttachOptions, Cluster},
    error::AttachError,
    generate::GeneratedObject,
    kubectl::{exit_code, readiness, DisplayPodStatus, PodReadiness},
};

/// Set by the Ctrl-C handler installed in `main`.
pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub const POLLING_INTERVAL: Duration = Duration::from_secs(2);

pub struct Deadline(Instant);

impl Deadline {
    /// Create a new deadline that times out after the provided duration.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// If there is enough time to sleep before the deadline, sleeps and returns
    /// Ok. Otherwise, returns Err.
    pub fn sleep(&self, duration: Duration) -> Result<(), ()> {
        if Instant::now() + duration < self.0 {
            thread::sleep(duration);
            Ok(())
        } else {
            Err(())
        }
    }
}

pub struct Attach<'a, C: ?Sized> {
    pub cluster: &'a C,
    pub namespace: &'a str,
    pub options: AttachOptions,
    /// How long to wait for the pod to run.
    pub timeout: Duration,
    pub polling_interval: Duration,
    pub interrupted: &'a AtomicBool,
}

impl<C: Cluster + ?Sized> Attach<'_, C> {
    fn check_interrupted(&self) -> Result<(), AttachError> {
        if self.interrupted.load(Ordering::SeqCst) {
            Err(AttachError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// The pod itself, or the first pod created from the workload's pod template.
    fn resolve_pod(&self, object: &GeneratedObject, deadline: &Deadline) -> Result<String, AttachError> {
        if let GeneratedObject::Pod(_) = object {
            return Ok(object.name().to_owned());
        }

        let Some(selector) = object.pod_selector() else {
            return Err(AttachError::PodUnavailable {
                pod: object.resource_name(),
                status: format!("a {} does not create pods", object.kind()),
            });
        };

        loop {
            self.check_interrupted()?;
            let pods = self
                .cluster
                .pods(self.namespace, selector)
                .map_err(AttachError::Session)?;
            if let Some(pod) = pods.into_iter().next() {
                return Ok(pod);
            }
            debug!("no pods for {} yet", object.resource_name());
            deadline
                .sleep(self.polling_interval)
                .map_err(|_| AttachError::Timeout(format!("a pod of {}", object.resource_name())))?;
        }
    }

    /// Polls until the pod either runs or has already completed.
    fn wait_for_pod(&self, name: &str, deadline: &Deadline) -> Result<PodReadiness, AttachError> {
        info!("Waiting for pod {}/{name} to start running...", self.namespace);

        let mut last_status = None;
        loop {
            self.check_interrupted()?;
            let pod = self
                .cluster
                .pod(self.namespace, name)
                .map_err(AttachError::Session)?;

            let status = DisplayPodStatus(&pod).to_string();
            if last_status.as_ref() != Some(&status) {
                debug!("Pod status: {status}");
                last_status = Some(status);
            }

            match readiness(&pod) {
                PodReadiness::Pending => {}
                PodReadiness::Unavailable => {
                    return Err(AttachError::PodUnavailable {
                        pod: name.to_owned(),
                        status: DisplayPodStatus(&pod).to_string(),
                    })
                }
                ready @ (PodReadiness::Ready | PodReadiness::Completed) => return Ok(ready),
            }

            deadline
                .sleep(self.polling_interval)
                .map_err(|_| AttachError::Timeout(format!("pod {name} to run")))?;
        }
    }

    /// Attaches to a running pod or prints the logs of a completed one, then fails if the
    /// container exited with a non-zero code.
    pub fn run(&self, object: &GeneratedObject) -> Result<(), AttachError> {
        let deadline = Deadline::after(self.timeout);
        let pod = self.resolve_pod(object, &deadline)?;
        let state = self.wait_for_pod(&pod, &deadline)?;
        // Generated pods have a single container named after the object.
        let container = object.name();

        let session = match state {
            PodReadiness::Completed => self.cluster.follow_logs(self.namespace, &pod, container),
            _ => self
                .cluster
                .attach(self.namespace, &pod, container, self.options),
        };
        session.map_err(AttachError::Session)?;
        self.check_interrupted()?;

        let pod_after = self
            .cluster
            .pod(self.namespace, &pod)
            .map_err(AttachError::Session)?;
        match exit_code(&pod_after, container) {
            Some(code) if code != 0 => Err(AttachError::ExitCode { pod, code }),
            _ => Ok(()),
        }
    }
}

/// Deletes the objects in reverse creation order. Failures are only logged.
pub fn cleanup<C: Cluster + ?Sized>(cluster: &C, namespace: &str, objects: &[GeneratedObject]) {
    for object in objects.iter().rev() {
        match cluster.delete(namespace, object) {
            Ok(()) => info!("{} deleted", object.resource_name()),
            Err(error) => warn!("failed to delete {}: {error}", object.resource_name()),
        }
    }
}
