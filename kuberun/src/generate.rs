//! Generators turn a [`GeneratorParams`] map into a typed object. They are looked up by a
//! versioned identifier in a [`Registry`], workloads and services in separate registries.

mod object;
mod pod;
mod service;
mod workload;

use std::collections::BTreeMap;

pub use object::*;
pub use pod::*;
pub use service::*;
pub use workload::*;

use crate::{error::GenerationError, params::GeneratorParams, restart::RestartPolicy};

pub const RUN_POD_V1: &str = "run-pod/v1";
pub const RUN_V1: &str = "run/v1";
pub const DEPLOYMENT_APPS_V1: &str = "deployment/apps.v1";
pub const JOB_V1: &str = "job/v1";
pub const CRONJOB_V1: &str = "cronjob/v1";
pub const SERVICE_V2: &str = "service/v2";

/// Describes one parameter a generator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

pub trait Generator {
    fn params(&self) -> &'static [ParamSpec];

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError>;
}

/// Fails on the first required parameter that is absent.
pub fn validate_params(
    specs: &[ParamSpec],
    params: &GeneratorParams,
) -> Result<(), GenerationError> {
    match specs
        .iter()
        .find(|spec| spec.required && !params.contains(spec.name))
    {
        Some(spec) => Err(GenerationError::MissingParam(spec.name.to_owned())),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct Registry {
    generators: BTreeMap<&'static str, Box<dyn Generator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &'static str, generator: impl Generator + 'static) -> &mut Self {
        self.generators.insert(id, Box::new(generator));
        self
    }

    /// Every workload generator.
    pub fn workloads() -> Self {
        let mut registry = Self::new();
        registry
            .register(RUN_POD_V1, PodGenerator)
            .register(RUN_V1, ReplicationControllerGenerator)
            .register(DEPLOYMENT_APPS_V1, DeploymentGenerator)
            .register(JOB_V1, JobGenerator)
            .register(CRONJOB_V1, CronJobGenerator);
        registry
    }

    /// Every service generator.
    pub fn services() -> Self {
        let mut registry = Self::new();
        registry.register(SERVICE_V2, ServiceGenerator);
        registry
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.generators.keys().copied()
    }

    pub fn lookup(&self, id: &str) -> Result<&dyn Generator, GenerationError> {
        self.generators
            .get(id)
            .map(|generator| generator.as_ref())
            .ok_or_else(|| {
                log::debug!(
                    "available generators: {}",
                    self.ids().collect::<Vec<_>>().join(", ")
                );
                GenerationError::UnknownGenerator(id.to_owned())
            })
    }

    pub fn generate(
        &self,
        id: &str,
        params: &GeneratorParams,
    ) -> Result<GeneratedObject, GenerationError> {
        let generator = self.lookup(id)?;
        validate_params(generator.params(), params)?;
        generator.generate(params)
    }
}

/// Both generator families.
pub struct Generators {
    pub workloads: Registry,
    pub services: Registry,
}

impl Default for Generators {
    fn default() -> Self {
        Self {
            workloads: Registry::workloads(),
            services: Registry::services(),
        }
    }
}

/// The workload generator used when none is given: a `CronJob` when there is a schedule,
/// otherwise the object kind that fits the restart policy.
pub fn default_workload_generator(restart: RestartPolicy, scheduled: bool) -> &'static str {
    if scheduled {
        return CRONJOB_V1;
    }
    match restart {
        RestartPolicy::Always => DEPLOYMENT_APPS_V1,
        RestartPolicy::OnFailure => JOB_V1,
        RestartPolicy::Never => RUN_POD_V1,
    }
}

pub const DEFAULT_SERVICE_GENERATOR: &str = SERVICE_V2;
