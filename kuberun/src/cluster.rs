//! The operations `run` needs from a cluster. [`crate::kubectl::Kubectl`] implements them by
//! shelling out to `kubectl`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;

use crate::{generate::GeneratedObject, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachOptions {
    pub stdin: bool,
    pub tty: bool,
}

pub trait Cluster {
    /// Creates the object and returns it as stored by the server.
    fn create(&self, namespace: &str, object: &GeneratedObject) -> Result<GeneratedObject>;

    fn delete(&self, namespace: &str, object: &GeneratedObject) -> Result<()>;

    fn pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Names of the pods matching all labels in `selector`.
    fn pods(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<String>>;

    /// Connects the terminal to the running container until the session ends.
    fn attach(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        options: AttachOptions,
    ) -> Result<()>;

    fn follow_logs(&self, namespace: &str, pod: &str, container: &str) -> Result<()>;
}

/// Formats `k=v,k=v` for `--selector`.
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
pub mod fake {
    use std::{cell::RefCell, collections::VecDeque};

    use super::*;

    pub const SERVER_ANNOTATION: &str = "kuberun.test/created-by-server";

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Create(String),
        Delete(String),
        Pod(String),
        Pods(String),
        Attach { pod: String, options: AttachOptions },
        FollowLogs(String),
    }

    /// Records calls and answers from canned state. Created objects come back with
    /// [`SERVER_ANNOTATION`] set so tests can tell them apart from locally generated ones.
    #[derive(Default)]
    pub struct FakeCluster {
        pub calls: RefCell<Vec<Call>>,
        /// Resource names, e.g. `service/foo`, whose creation fails.
        pub failing_creates: Vec<String>,
        /// Answers to successive `pod` calls. The last one repeats.
        pub pod_states: RefCell<VecDeque<Pod>>,
        pub pod_names: Vec<String>,
        pub fail_attach: bool,
        pub fail_delete: bool,
    }

    impl FakeCluster {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn creates(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Create(name) => Some(name),
                    _ => None,
                })
                .collect()
        }

        pub fn deletes(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Delete(name) => Some(name),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Cluster for FakeCluster {
        fn create(&self, _: &str, object: &GeneratedObject) -> Result<GeneratedObject> {
            let name = object.resource_name();
            self.record(Call::Create(name.clone()));
            if self.failing_creates.contains(&name) {
                return Err(format!("admission webhook denied {name}").into());
            }
            let mut created = object.clone();
            created.annotate(SERVER_ANNOTATION, "true");
            Ok(created)
        }

        fn delete(&self, _: &str, object: &GeneratedObject) -> Result<()> {
            self.record(Call::Delete(object.resource_name()));
            if self.fail_delete {
                return Err("connection refused".into());
            }
            Ok(())
        }

        fn pod(&self, _: &str, name: &str) -> Result<Pod> {
            self.record(Call::Pod(name.to_owned()));
            let mut states = self.pod_states.borrow_mut();
            let pod = if states.len() > 1 {
                states.pop_front()
            } else {
                states.front().cloned()
            };
            pod.ok_or_else(|| format!("pods \"{name}\" not found").into())
        }

        fn pods(&self, _: &str, selector: &BTreeMap<String, String>) -> Result<Vec<String>> {
            self.record(Call::Pods(selector_string(selector)));
            Ok(self.pod_names.clone())
        }

        fn attach(&self, _: &str, pod: &str, _: &str, options: AttachOptions) -> Result<()> {
            self.record(Call::Attach {
                pod: pod.to_owned(),
                options,
            });
            if self.fail_attach {
                return Err("unable to upgrade connection".into());
            }
            Ok(())
        }

        fn follow_logs(&self, _: &str, pod: &str, _: &str) -> Result<()> {
            self.record(Call::FollowLogs(pod.to_owned()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_strings() {
        assert_eq!(selector_string(&BTreeMap::new()), "");
        assert_eq!(
            selector_string(&BTreeMap::from([
                ("tier".to_owned(), "web".to_owned()),
                ("app".to_owned(), "shop".to_owned()),
            ])),
            "app=shop,tier=web"
        );
    }
}
