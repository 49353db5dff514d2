use std::fmt;

use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus};

/// Where a pod is in its lifecycle, as far as attaching to it is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodReadiness {
    /// Not running yet, keep waiting.
    Pending,
    /// Running and ready, a session can be attached.
    Ready,
    /// All containers terminated, only the logs are left.
    Completed,
    /// Will not run without intervention, e.g. because it can not be scheduled or its image can
    /// not be pulled.
    Unavailable,
}

fn container_statuses(status: &PodStatus) -> &[ContainerStatus] {
    status.container_statuses.as_deref().unwrap_or_default()
}

pub fn is_unschedulable(status: &PodStatus) -> bool {
    status.reason.as_deref() == Some("Unschedulable")
        || status.conditions.iter().flatten().any(|condition| {
            condition.type_ == "PodScheduled"
                && condition.reason.as_deref() == Some("Unschedulable")
        })
}

pub fn cannot_pull_image(status: &ContainerStatus) -> bool {
    status
        .state
        .as_ref()
        .and_then(|state| state.waiting.as_ref())
        .and_then(|waiting| waiting.reason.as_deref())
        .is_some_and(|reason| {
            matches!(
                reason,
                "ErrImagePull" | "ImagePullBackOff" | "InvalidImageName"
            )
        })
}

fn is_ready(status: &PodStatus) -> bool {
    status.conditions.iter().flatten().any(|condition| {
        condition.type_ == "Ready" && condition.status == "True"
    })
}

pub fn readiness(pod: &Pod) -> PodReadiness {
    let Some(status) = pod.status.as_ref() else {
        return PodReadiness::Pending;
    };

    if is_unschedulable(status) || container_statuses(status).iter().any(cannot_pull_image) {
        return PodReadiness::Unavailable;
    }

    match status.phase.as_deref() {
        Some("Succeeded" | "Failed") => PodReadiness::Completed,
        Some("Running") if is_ready(status) => PodReadiness::Ready,
        Some("Unknown") => PodReadiness::Unavailable,
        _ => PodReadiness::Pending,
    }
}

/// The exit code of the named container if it terminated.
pub fn exit_code(pod: &Pod, container: &str) -> Option<i32> {
    pod.status
        .as_ref()
        .map(container_statuses)
        .unwrap_or_default()
        .iter()
        .find(|status| status.name == container)
        .and_then(|status| status.state.as_ref())
        .and_then(|state| state.terminated.as_ref())
        .map(|terminated| terminated.exit_code)
}

/// Renders the status of a pod in one line, e.g. for an error message.
pub struct DisplayPodStatus<'a>(pub &'a Pod);

impl fmt::Display for DisplayPodStatus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(status) = self.0.status.as_ref() else {
            return f.write_str("unknown");
        };

        f.write_str(status.phase.as_deref().unwrap_or("Unknown"))?;
        if let Some(message) = status.message.as_deref() {
            write!(f, ": {message}")?;
        }

        for condition in status.conditions.iter().flatten() {
            if condition.status == "True" {
                continue;
            }
            write!(f, ", condition {}", condition.type_)?;
            if let Some(reason) = condition.reason.as_deref() {
                write!(f, " {reason}")?;
            }
            if let Some(message) = condition.message.as_deref() {
                write!(f, ": {message}")?;
            }
        }

        for status in container_statuses(status) {
            let state = status.state.as_ref();
            let (state_name, reason, message) = if let Some(waiting) =
                state.and_then(|state| state.waiting.as_ref())
            {
                ("waiting", waiting.reason.as_deref(), waiting.message.as_deref())
            } else if let Some(terminated) = state.and_then(|state| state.terminated.as_ref()) {
                (
                    "terminated",
                    terminated.reason.as_deref(),
                    terminated.message.as_deref(),
                )
            } else {
                ("running", None, None)
            };
            write!(
                f,
                ", container {:?} using image {:?} is {state_name}",
                status.name, status.image
            )?;
            if let Some(reason) = reason {
                write!(f, " because {reason}")?;
            }
            if let Some(message) = message {
                write!(f, ": {message}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStateWaiting, PodCondition,
    };

    use super::*;

    fn pod(phase: &str, conditions: Vec<PodCondition>, containers: Vec<ContainerStatus>) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_owned()),
                conditions: Some(conditions),
                container_statuses: Some(containers),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn condition(type_: &str, status: &str, reason: Option<&str>) -> PodCondition {
        PodCondition {
            type_: type_.to_owned(),
            status: status.to_owned(),
            reason: reason.map(str::to_owned),
            ..Default::default()
        }
    }

    fn container(state: ContainerState) -> ContainerStatus {
        ContainerStatus {
            name: "foo".to_owned(),
            image: "busybox".to_owned(),
            state: Some(state),
            ..Default::default()
        }
    }

    #[test]
    fn readiness_follows_phase_and_conditions() {
        assert_eq!(readiness(&Pod::default()), PodReadiness::Pending);
        assert_eq!(readiness(&pod("Pending", vec![], vec![])), PodReadiness::Pending);
        assert_eq!(
            readiness(&pod("Running", vec![condition("Ready", "False", None)], vec![])),
            PodReadiness::Pending
        );
        assert_eq!(
            readiness(&pod("Running", vec![condition("Ready", "True", None)], vec![])),
            PodReadiness::Ready
        );
        assert_eq!(readiness(&pod("Succeeded", vec![], vec![])), PodReadiness::Completed);
        assert_eq!(readiness(&pod("Failed", vec![], vec![])), PodReadiness::Completed);
    }

    #[test]
    fn unavailable_pods() {
        let unschedulable = pod(
            "Pending",
            vec![condition("PodScheduled", "False", Some("Unschedulable"))],
            vec![],
        );
        assert_eq!(readiness(&unschedulable), PodReadiness::Unavailable);

        let pull_failure = pod(
            "Pending",
            vec![],
            vec![container(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some("ImagePullBackOff".to_owned()),
                    ..Default::default()
                }),
                ..Default::default()
            })],
        );
        assert_eq!(readiness(&pull_failure), PodReadiness::Unavailable);
        assert_eq!(
            DisplayPodStatus(&pull_failure).to_string(),
            "Pending, container \"foo\" using image \"busybox\" is waiting because ImagePullBackOff"
        );
    }

    #[test]
    fn exit_codes() {
        let terminated = pod(
            "Failed",
            vec![],
            vec![container(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code: 3,
                    ..Default::default()
                }),
                ..Default::default()
            })],
        );
        assert_eq!(exit_code(&terminated, "foo"), Some(3));
        assert_eq!(exit_code(&terminated, "bar"), None);
        assert_eq!(exit_code(&Pod::default(), "foo"), None);
    }
}
