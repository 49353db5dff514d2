use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};

use super::{GeneratedObject, Generator, ParamSpec};
use crate::{
    error::GenerationError,
    params::{key, parse_port, GeneratorParams},
};

/// `service/v2`: a `ClusterIP` service in front of the workload, forwarding one port to the same
/// container port.
pub struct ServiceGenerator;

const SERVICE_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional(key::NAME),
    ParamSpec::optional(key::DEFAULT_NAME),
    ParamSpec::required(key::PORT),
    ParamSpec::optional(key::PROTOCOL),
    ParamSpec::required(key::SELECTOR),
    ParamSpec::optional(key::LABELS),
];

impl Generator for ServiceGenerator {
    fn params(&self) -> &'static [ParamSpec] {
        SERVICE_PARAMS
    }

    fn generate(&self, params: &GeneratorParams) -> Result<GeneratedObject, GenerationError> {
        let port = parse_port(params.required_string(key::PORT)?)?;
        let protocol = params
            .string(key::PROTOCOL)?
            .map_or("TCP", String::as_str)
            .to_owned();

        Ok(GeneratedObject::Service(Service {
            metadata: ObjectMeta {
                name: Some(params.name()?.to_owned()),
                labels: params.map(key::LABELS)?.cloned(),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                ports: Some(vec![ServicePort {
                    port,
                    protocol: Some(protocol),
                    target_port: Some(IntOrString::Int(port)),
                    ..Default::default()
                }]),
                selector: params.map(key::SELECTOR)?.cloned(),
                session_affinity: Some("None".to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}
