use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        Container, ContainerPort, EnvVar, Pod, PodSpec, PodTemplateSpec, ResourceRequirements,
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};

use super::{GeneratedObject, Generator, ParamSpec};
use crate::{
    error::GenerationError,
    params::{key, parse_port, GeneratorParams},
    restart::RestartPolicy,
};

/// The parameters every workload generator understands, followed by `extra`.
macro_rules! container_params {
    ($($extra:expr),* $(,)?) => {
        &[
            ParamSpec::optional(key::NAME),
            ParamSpec::optional(key::DEFAULT_NAME),
            ParamSpec::required(key::IMAGE),
            ParamSpec::optional(key::IMAGE_PULL_POLICY),
            ParamSpec::optional(key::LABELS),
            ParamSpec::optional(key::ENV),
            ParamSpec::optional(key::PORT),
            ParamSpec::optional(key::STDIN),
            ParamSpec::optional(key::TTY),
            ParamSpec::optional(key::LEAVE_STDIN_OPEN),
            ParamSpec::optional(key::COMMAND),
            ParamSpec::optional(key::ARGS),
            ParamSpec::optional(key::SERVICE_ACCOUNT),
            ParamSpec::optional(key::REQUESTS),
            ParamSpec::optional(key::LIMITS),
            $($extra),*
        ]
    };
}
pub(super) use container_params;

/// The restart policy parameter, or `default` when absent.
pub(super) fn restart_policy(
    params: &GeneratorParams,
    default: RestartPolicy,
) -> Result<RestartPolicy, GenerationError> {
    match params.string(key::RESTART)? {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|error| GenerationError::invalid(key::RESTART, value, format!("{error}"))),
    }
}

/// Metadata carrying the object name and the labels.
pub(super) fn object_meta(params: &GeneratorParams) -> Result<ObjectMeta, GenerationError> {
    Ok(ObjectMeta {
        name: Some(params.name()?.to_owned()),
        labels: params.map(key::LABELS)?.cloned(),
        ..Default::default()
    })
}

fn resource_list(
    params: &GeneratorParams,
    key: &str,
) -> Result<Option<BTreeMap<String, Quantity>>, GenerationError> {
    Ok(params.map(key)?.map(|resources| {
        resources
            .iter()
            .map(|(name, quantity)| (name.clone(), Quantity(quantity.clone())))
            .collect()
    }))
}

/// The single container of a generated pod. It is named after the object.
pub(super) fn container(params: &GeneratorParams) -> Result<Container, GenerationError> {
    let stdin = params.flag(key::STDIN)?;

    let env = params.pairs(key::ENV)?.map(|pairs| {
        pairs
            .iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect()
    });

    let ports = match params.string(key::PORT)? {
        Some(port) => Some(vec![ContainerPort {
            container_port: parse_port(port)?,
            ..Default::default()
        }]),
        None => None,
    };

    let requests = resource_list(params, key::REQUESTS)?;
    let limits = resource_list(params, key::LIMITS)?;
    let resources = (requests.is_some() || limits.is_some()).then(|| ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    });

    Ok(Container {
        name: params.name()?.to_owned(),
        image: Some(params.required_string(key::IMAGE)?.to_owned()),
        image_pull_policy: params.string(key::IMAGE_PULL_POLICY)?.cloned(),
        args: params.list(key::ARGS)?.cloned(),
        command: params.list(key::COMMAND)?.cloned(),
        env,
        ports,
        resources,
        stdin: Some(stdin),
        // The first attach closes stdin unless it should stay open for later sessions.
        stdin_once: Some(stdin && !params.flag(key::LEAVE_STDIN_OPEN)?),
        tty: Some(params.flag(key::TTY)?),
        ..Default::default()
    })
}

pub(super) fn pod_spec(
    params: &GeneratorParams,
    restart: RestartPolicy,
) -> Result<PodSpec, GenerationError> {
    Ok(PodSpec {
        containers: vec![container(params)?],
        restart_policy: Some(restart.as_str().to_owned()),
        service_account_name: params.string(key::SERVICE_ACCOUNT)?.cloned(),
        dns_policy: Some("ClusterFirst".to_owned()),
        ..Default::default()
    })
}

/// The pod template of a workload. Its pods carry the workload labels.
pub(super) fn pod_template(
    params: &GeneratorParams,
    restart: RestartPolicy,
) -> Result<PodTemplateSpec, GenerationError> {
    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: params.map(key::LABELS)?.cloned(),
            ..Default::default()
        }),
        spec: Some(pod_spec(params, restart)?),
    })
}

/// `run-pod/v1`: a bare pod with any restart policy.
pub struct PodGenerator;

const POD_PARAMS: &[ParamSpec] = container_params![ParamSpec::optional(key::RESTART)];

impl Generator for PodGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        POD_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let restart = restart_policy(params, RestartPolicy::Always)?;
        Ok(GeneratedObject::Pod(Pod {
            metadata: object_meta(params)?,
            spec: Some(pod_spec(params, restart)?),
            ..Default::default()
        }))
    }
}
