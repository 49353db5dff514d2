use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec},
        core::v1::{ReplicationController, ReplicationControllerSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};

use super::{
    pod::{container_params, object_meta, pod_template, restart_policy},
    GeneratedObject, Generator, ParamSpec,
};
use crate::{
    error::GenerationError,
    params::{key, GeneratorParams},
    restart::RestartPolicy,
};

const SCALED_PARAMS: &[ParamSpec] = container_params![
    ParamSpec::optional(key::REPLICAS),
    ParamSpec::optional(key::RESTART),
];

const JOB_PARAMS: &[ParamSpec] = container_params![ParamSpec::optional(key::RESTART)];

const CRON_JOB_PARAMS: &[ParamSpec] = container_params![
    ParamSpec::optional(key::RESTART),
    ParamSpec::required(key::SCHEDULE),
];

fn replicas(params: &GeneratorParams) -> Result<Option<i32>, GenerationError> {
    params
        .int(key::REPLICAS)?
        .map(|&replicas| {
            i32::try_from(replicas)
                .ok()
                .filter(|replicas| *replicas >= 0)
                .ok_or_else(|| {
                    GenerationError::invalid(
                        key::REPLICAS,
                        replicas.to_string(),
                        "expected a non-negative 32 bit integer",
                    )
                })
        })
        .transpose()
}

/// Workloads that keep their pods running only accept `Always`.
fn always_restart(params: &GeneratorParams) -> Result<RestartPolicy, GenerationError> {
    match restart_policy(params, RestartPolicy::Always)? {
        RestartPolicy::Always => Ok(RestartPolicy::Always),
        other => Err(GenerationError::invalid(
            key::RESTART,
            other.as_str(),
            "only Always is supported for this generator",
        )),
    }
}

/// Workloads that run to completion reject `Always`.
fn completion_restart(params: &GeneratorParams) -> Result<RestartPolicy, GenerationError> {
    match restart_policy(params, RestartPolicy::OnFailure)? {
        RestartPolicy::Always => Err(GenerationError::invalid(
            key::RESTART,
            RestartPolicy::Always.as_str(),
            "a job can only restart OnFailure or Never",
        )),
        other => Ok(other),
    }
}

/// `run/v1`
pub struct ReplicationControllerGenerator;

impl Generator for ReplicationControllerGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        SCALED_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let restart = always_restart(params)?;
        let metadata = object_meta(params)?;
        Ok(GeneratedObject::ReplicationController(
            ReplicationController {
                spec: Some(ReplicationControllerSpec {
                    replicas: replicas(params)?,
                    selector: metadata.labels.clone(),
                    template: Some(pod_template(params, restart)?),
                    ..Default::default()
                }),
                metadata,
                ..Default::default()
            },
        ))
    }
}

/// `deployment/apps.v1`
pub struct DeploymentGenerator;

impl Generator for DeploymentGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        SCALED_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let restart = always_restart(params)?;
        let metadata = object_meta(params)?;
        Ok(GeneratedObject::Deployment(Deployment {
            spec: Some(DeploymentSpec {
                replicas: replicas(params)?,
                selector: LabelSelector {
                    match_labels: metadata.labels.clone(),
                    ..Default::default()
                },
                template: pod_template(params, restart)?,
                ..Default::default()
            }),
            metadata,
            ..Default::default()
        }))
    }
}

/// `job/v1`
pub struct JobGenerator;

impl Generator for JobGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        JOB_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let restart = completion_restart(params)?;
        Ok(GeneratedObject::Job(Job {
            metadata: object_meta(params)?,
            spec: Some(JobSpec {
                template: pod_template(params, restart)?,
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

/// `cronjob/v1`
pub struct CronJobGenerator;

impl Generator for CronJobGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        CRON_JOB_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let restart = completion_restart(params)?;
        let metadata = object_meta(params)?;
        Ok(GeneratedObject::CronJob(CronJob {
            spec: Some(CronJobSpec {
                schedule: params.required_string(key::SCHEDULE)?.to_owned(),
                job_template: JobTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: metadata.labels.clone(),
                        ..Default::default()
                    }),
                    spec: Some(JobSpec {
                        template: pod_template(params, restart)?,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            metadata,
            ..Default::default()
        }))
    }
}
