use std::{collections::BTreeMap, fmt};

use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        batch::v1::{CronJob, Job},
        core::v1::{Pod, PodTemplateSpec, ReplicationController, Service},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    Resource,
};
use serde::Serialize;
use serde_json::Value;

/// An object produced by a generator, or the same object as returned by the cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedObject {
    Pod(Pod),
    ReplicationController(ReplicationController),
    Deployment(Deployment),
    Job(Job),
    CronJob(CronJob),
    Service(Service),
}

macro_rules! each_object {
    ($object:expr, $inner:ident => $body:expr) => {
        match $object {
            GeneratedObject::Pod($inner) => $body,
            GeneratedObject::ReplicationController($inner) => $body,
            GeneratedObject::Deployment($inner) => $body,
            GeneratedObject::Job($inner) => $body,
            GeneratedObject::CronJob($inner) => $body,
            GeneratedObject::Service($inner) => $body,
        }
    };
}

/// Resource type names as `kubectl` accepts and prints them, e.g. `deployment.apps`.
fn resource_type<K: Resource>() -> String {
    let kind = K::KIND.to_ascii_lowercase();
    if K::GROUP.is_empty() {
        kind
    } else {
        format!("{kind}.{}", K::GROUP)
    }
}

impl GeneratedObject {
    pub fn kind(&self) -> &'static str {
        fn kind<K: Resource>(_: &K) -> &'static str {
            K::KIND
        }
        each_object!(self, object => kind(object))
    }

    pub fn resource_type(&self) -> String {
        fn of<K: Resource>(_: &K) -> String {
            resource_type::<K>()
        }
        each_object!(self, object => of(object))
    }

    /// `<resource type>/<name>`, e.g. `deployment.apps/nginx`.
    pub fn resource_name(&self) -> String {
        format!("{}/{}", self.resource_type(), self.name())
    }

    pub fn metadata(&self) -> &ObjectMeta {
        each_object!(self, object => &object.metadata)
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_object!(self, object => &mut object.metadata)
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn annotate(&mut self, key: &str, value: impl Into<String>) {
        self.metadata_mut()
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_owned(), value.into());
    }

    #[cfg(test)]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// The template of the pods a workload creates. `None` for a bare pod and for services.
    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            GeneratedObject::Pod(_) | GeneratedObject::Service(_) => None,
            GeneratedObject::ReplicationController(rc) => {
                rc.spec.as_ref().and_then(|spec| spec.template.as_ref())
            }
            GeneratedObject::Deployment(deployment) => {
                deployment.spec.as_ref().map(|spec| &spec.template)
            }
            GeneratedObject::Job(job) => job.spec.as_ref().map(|spec| &spec.template),
            GeneratedObject::CronJob(cron_job) => cron_job
                .spec
                .as_ref()
                .and_then(|spec| spec.job_template.spec.as_ref())
                .map(|spec| &spec.template),
        }
    }

    /// Labels that select the pods belonging to this workload.
    pub fn pod_selector(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            GeneratedObject::Pod(pod) => pod.metadata.labels.as_ref(),
            _ => self
                .pod_template()
                .and_then(|template| template.metadata.as_ref())
                .and_then(|metadata| metadata.labels.as_ref()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Decodes `bytes` as an object of the same kind as `self`, e.g. the response to a create
    /// request.
    pub fn decode_same_kind(&self, bytes: &[u8]) -> serde_json::Result<Self> {
        Ok(match self {
            GeneratedObject::Pod(_) => GeneratedObject::Pod(serde_json::from_slice(bytes)?),
            GeneratedObject::ReplicationController(_) => {
                GeneratedObject::ReplicationController(serde_json::from_slice(bytes)?)
            }
            GeneratedObject::Deployment(_) => {
                GeneratedObject::Deployment(serde_json::from_slice(bytes)?)
            }
            GeneratedObject::Job(_) => GeneratedObject::Job(serde_json::from_slice(bytes)?),
            GeneratedObject::CronJob(_) => GeneratedObject::CronJob(serde_json::from_slice(bytes)?),
            GeneratedObject::Service(_) => GeneratedObject::Service(serde_json::from_slice(bytes)?),
        })
    }

    /// Applies a [JSON merge patch](https://www.rfc-editor.org/rfc/rfc7386) to the object. The
    /// result must still be an object of the same kind.
    pub fn apply_merge_patch(&mut self, patch: &Value) -> serde_json::Result<()> {
        let mut value = self.to_json()?;
        merge_patch(&mut value, patch);
        *self = self.decode_same_kind(&serde_json::to_vec(&value)?)?;
        Ok(())
    }
}

impl fmt::Display for GeneratedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
