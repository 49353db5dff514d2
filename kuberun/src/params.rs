//! The flat parameter map that generators consume, and its construction from [`RunOptions`].

use std::collections::BTreeMap;

use container_image_name::ImageNameRef;

use crate::{
    error::GenerationError,
    kubectl::{is_env_var_name, is_label_key, is_label_value, to_rfc_1035_label_lossy},
    options::RunOptions,
    restart::RestartPolicy,
};

pub mod key {
    pub const NAME: &str = "name";
    pub const DEFAULT_NAME: &str = "default-name";
    pub const IMAGE: &str = "image";
    pub const IMAGE_PULL_POLICY: &str = "image-pull-policy";
    pub const REPLICAS: &str = "replicas";
    pub const RESTART: &str = "restart";
    pub const LABELS: &str = "labels";
    pub const SELECTOR: &str = "selector";
    pub const ENV: &str = "env";
    pub const PORT: &str = "port";
    pub const PROTOCOL: &str = "protocol";
    pub const STDIN: &str = "stdin";
    pub const TTY: &str = "tty";
    pub const LEAVE_STDIN_OPEN: &str = "leave-stdin-open";
    pub const COMMAND: &str = "command";
    pub const ARGS: &str = "args";
    pub const SERVICE_ACCOUNT: &str = "serviceaccount";
    pub const REQUESTS: &str = "requests";
    pub const LIMITS: &str = "limits";
    pub const SCHEDULE: &str = "schedule";
}

/// The label every generated workload carries when no labels are given.
pub const DEFAULT_LABEL_KEY: &str = "run";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
    /// Ordered key value pairs, e.g. environment variables.
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::String(_) => "string",
            ParamValue::Int(_) => "integer",
            ParamValue::Bool(_) => "boolean",
            ParamValue::List(_) => "list",
            ParamValue::Pairs(_) => "key value list",
            ParamValue::Map(_) => "map",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorParams(BTreeMap<String, ParamValue>);

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $name(&self, key: &str) -> Result<Option<$ty>, GenerationError> {
            match self.0.get(key) {
                None => Ok(None),
                Some(ParamValue::$variant(value)) => Ok(Some(value)),
                Some(other) => Err(GenerationError::invalid(
                    key,
                    format!("{other:?}"),
                    format!("expected a {}, found a {}", $expected, other.type_name()),
                )),
            }
        }
    };
}

impl GeneratorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    typed_getter!(string, String, &String, "string");
    typed_getter!(int, Int, &i64, "integer");
    typed_getter!(bool, Bool, &bool, "boolean");
    typed_getter!(list, List, &Vec<String>, "list");
    typed_getter!(pairs, Pairs, &Vec<(String, String)>, "key value list");
    typed_getter!(map, Map, &BTreeMap<String, String>, "map");

    pub fn required_string(&self, key: &str) -> Result<&str, GenerationError> {
        self.string(key)?
            .map(String::as_str)
            .ok_or_else(|| GenerationError::MissingParam(key.to_owned()))
    }

    pub fn flag(&self, key: &str) -> Result<bool, GenerationError> {
        Ok(self.bool(key)?.copied().unwrap_or_default())
    }

    /// The explicit `name`, falling back to `default-name`.
    pub fn name(&self) -> Result<&str, GenerationError> {
        match self.string(key::NAME)? {
            Some(name) if !name.is_empty() => Ok(name),
            _ => self
                .string(key::DEFAULT_NAME)?
                .map(String::as_str)
                .ok_or_else(|| GenerationError::MissingParam(key::NAME.to_owned())),
        }
    }
}

/// Parses `k=v,k=v` into a map, validating label syntax.
pub fn parse_labels(value: &str) -> Result<BTreeMap<String, String>, GenerationError> {
    let mut labels = BTreeMap::new();
    for pair in value.split(',') {
        let invalid = |reason: &str| GenerationError::invalid(key::LABELS, pair, reason);
        let Some((key, value)) = pair.split_once('=') else {
            return Err(invalid("expected key=value"));
        };
        if value.contains('=') {
            return Err(invalid("expected key=value"));
        }
        if !is_label_key(key) {
            return Err(invalid("invalid label key"));
        }
        if !is_label_value(value) {
            return Err(invalid("invalid label value"));
        }
        labels.insert(key.to_owned(), value.to_owned());
    }
    Ok(labels)
}

/// Parses `K=V` entries in order. The value may contain `=` and may be empty.
pub fn parse_env(entries: &[String]) -> Result<Vec<(String, String)>, GenerationError> {
    entries
        .iter()
        .map(|entry| {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| GenerationError::invalid(key::ENV, entry, "expected NAME=VALUE"))?;
            if !is_env_var_name(name) {
                return Err(GenerationError::invalid(
                    key::ENV,
                    entry,
                    "invalid environment variable name",
                ));
            }
            Ok((name.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Parses `cpu=100m,memory=64Mi` into resource quantities by resource name.
pub fn parse_resources(
    param: &str,
    value: &str,
) -> Result<BTreeMap<String, String>, GenerationError> {
    value
        .split(',')
        .map(|pair| match pair.split_once('=') {
            Some((name, quantity)) if !name.is_empty() && !quantity.is_empty() => {
                Ok((name.to_owned(), quantity.to_owned()))
            }
            _ => Err(GenerationError::invalid(param, pair, "expected resource=quantity")),
        })
        .collect()
}

pub fn parse_port(value: &str) -> Result<i32, GenerationError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(i32::from(port)),
        _ => Err(GenerationError::invalid(
            key::PORT,
            value,
            "expected a port number between 1 and 65535",
        )),
    }
}

/// Derives an object name from the image, e.g. `nginx` for `docker.io/library/nginx:1.25`.
pub fn default_name_from_image(image: &str) -> Option<String> {
    let image = ImageNameRef::new(image).ok()?;
    to_rfc_1035_label_lossy(image.last_path_component()).map(|name| name.into_owned())
}

/// The labels the workload carries: the explicit ones or `run=<name>`.
pub fn workload_labels(
    options: &RunOptions,
    name: &str,
) -> Result<BTreeMap<String, String>, GenerationError> {
    match options.labels.as_deref() {
        Some(labels) if !labels.is_empty() => parse_labels(labels),
        _ => Ok([(DEFAULT_LABEL_KEY.to_owned(), name.to_owned())].into()),
    }
}

/// Builds the parameters for a workload generator.
pub fn workload_params(
    options: &RunOptions,
    name: &str,
    command: &[String],
    restart: RestartPolicy,
) -> Result<GeneratorParams, GenerationError> {
    let mut params = GeneratorParams::new();

    params
        .insert(key::NAME, ParamValue::String(name.to_owned()))
        .insert(key::IMAGE, ParamValue::String(options.image.clone()))
        .insert(key::REPLICAS, ParamValue::Int(options.replicas.into()))
        .insert(key::RESTART, ParamValue::String(restart.as_str().to_owned()))
        .insert(key::STDIN, ParamValue::Bool(options.stdin))
        .insert(key::TTY, ParamValue::Bool(options.tty))
        .insert(
            key::LEAVE_STDIN_OPEN,
            ParamValue::Bool(options.leave_stdin_open),
        );

    if let Some(default_name) = default_name_from_image(&options.image) {
        params.insert(key::DEFAULT_NAME, ParamValue::String(default_name));
    }

    // Default labels follow the name the object ends up with.
    let label_name = params.name().map_or_else(|_| name.to_owned(), str::to_owned);
    params.insert(
        key::LABELS,
        ParamValue::Map(workload_labels(options, &label_name)?),
    );

    if !options.env.is_empty() {
        params.insert(key::ENV, ParamValue::Pairs(parse_env(&options.env)?));
    }

    if let Some(port) = options.port.as_deref().filter(|port| !port.is_empty()) {
        parse_port(port)?;
        params.insert(key::PORT, ParamValue::String(port.to_owned()));
    }

    if !command.is_empty() {
        let key = if options.command {
            key::COMMAND
        } else {
            key::ARGS
        };
        params.insert(key, ParamValue::List(command.to_vec()));
    }

    let optional_strings = [
        (key::IMAGE_PULL_POLICY, &options.image_pull_policy),
        (key::SERVICE_ACCOUNT, &options.service_account),
        (key::SCHEDULE, &options.schedule),
    ];
    for (key, value) in optional_strings {
        if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
            params.insert(key, ParamValue::String(value.to_owned()));
        }
    }

    for (key, value) in [(key::REQUESTS, &options.requests), (key::LIMITS, &options.limits)] {
        if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
            params.insert(key, ParamValue::Map(parse_resources(key, value)?));
        }
    }

    Ok(params)
}

/// Builds the parameters for the companion service from the workload parameters. The service
/// selects the workload's labels and only carries labels itself when they were given explicitly.
pub fn service_params(
    options: &RunOptions,
    workload: &GeneratorParams,
) -> Result<GeneratorParams, GenerationError> {
    let port = workload.required_string(key::PORT)?;
    let name = workload.name()?;
    let selector = workload
        .map(key::LABELS)?
        .cloned()
        .ok_or_else(|| GenerationError::MissingParam(key::LABELS.to_owned()))?;

    let mut params = GeneratorParams::new();
    params
        .insert(key::NAME, ParamValue::String(name.to_owned()))
        .insert(key::PORT, ParamValue::String(port.to_owned()))
        .insert(key::PROTOCOL, ParamValue::String("TCP".to_owned()))
        .insert(key::SELECTOR, ParamValue::Map(selector));

    if let Some(labels) = options.labels.as_deref().filter(|labels| !labels.is_empty()) {
        params.insert(key::LABELS, ParamValue::Map(parse_labels(labels)?));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RunOptions {
        RunOptions {
            image: "docker.io/library/nginx:1.25".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn env_keeps_order() {
        let env = parse_env(&["a=b".to_owned(), "c=d=e".to_owned(), "EMPTY=".to_owned()]).unwrap();
        assert_eq!(
            env,
            vec![
                ("a".to_owned(), "b".to_owned()),
                ("c".to_owned(), "d=e".to_owned()),
                ("EMPTY".to_owned(), String::new()),
            ]
        );
    }

    #[test]
    fn env_rejects_malformed_entries() {
        assert!(parse_env(&["novalue".to_owned()]).is_err());
        assert!(parse_env(&["=value".to_owned()]).is_err());
        assert!(parse_env(&["1X=value".to_owned()]).is_err());
    }

    #[test]
    fn labels() {
        let labels = parse_labels("app=web,tier=frontend").unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("frontend"));

        assert!(parse_labels("app").is_err());
        assert!(parse_labels("app=a=b").is_err());
        assert!(parse_labels("app=web,").is_err());
        assert!(parse_labels("bad key=x").is_err());
    }

    #[test]
    fn ports() {
        assert_eq!(parse_port("80"), Ok(80));
        assert!(parse_port("0").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn default_name_is_derived_from_image() {
        assert_eq!(
            default_name_from_image("docker.io/library/nginx:1.25").as_deref(),
            Some("nginx")
        );
        assert_eq!(
            default_name_from_image("reg.io/team/my_tool").as_deref(),
            Some("my-tool")
        );
        assert_eq!(default_name_from_image("#"), None);
    }

    #[test]
    fn workload_defaults() {
        let params = workload_params(&options(), "web", &[], RestartPolicy::Always).unwrap();
        assert_eq!(params.name(), Ok("web"));
        assert_eq!(
            params.string(key::DEFAULT_NAME).unwrap().map(String::as_str),
            Some("nginx")
        );
        assert_eq!(params.int(key::REPLICAS), Ok(Some(&1)));
        assert_eq!(
            params.map(key::LABELS).unwrap().cloned(),
            Some(BTreeMap::from([("run".to_owned(), "web".to_owned())]))
        );
        assert!(!params.contains(key::PORT));
        assert!(!params.contains(key::ENV));
        assert!(!params.contains(key::ARGS));
    }

    #[test]
    fn empty_name_labels_follow_default_name() {
        let options = RunOptions {
            port: Some("80".to_owned()),
            ..options()
        };
        let workload = workload_params(&options, "", &[], RestartPolicy::Always).unwrap();
        let expected = BTreeMap::from([("run".to_owned(), "nginx".to_owned())]);
        assert_eq!(workload.name(), Ok("nginx"));
        assert_eq!(workload.map(key::LABELS).unwrap(), Some(&expected));

        let service = service_params(&options, &workload).unwrap();
        assert_eq!(service.name(), Ok("nginx"));
        assert_eq!(service.map(key::SELECTOR).unwrap(), Some(&expected));
    }

    #[test]
    fn command_override_routing() {
        let command = vec!["sleep".to_owned(), "10".to_owned()];
        let params = workload_params(&options(), "web", &command, RestartPolicy::Never).unwrap();
        assert_eq!(params.list(key::ARGS), Ok(Some(&command)));
        assert!(!params.contains(key::COMMAND));

        let options = RunOptions {
            command: true,
            ..options()
        };
        let params = workload_params(&options, "web", &command, RestartPolicy::Never).unwrap();
        assert_eq!(params.list(key::COMMAND), Ok(Some(&command)));
        assert!(!params.contains(key::ARGS));
    }

    #[test]
    fn service_uses_workload_labels_as_selector() {
        let options = RunOptions {
            port: Some("80".to_owned()),
            ..options()
        };
        let workload = workload_params(&options, "foo", &[], RestartPolicy::Always).unwrap();
        let service = service_params(&options, &workload).unwrap();
        assert_eq!(service.name(), Ok("foo"));
        assert_eq!(
            service.map(key::SELECTOR).unwrap().cloned(),
            Some(BTreeMap::from([("run".to_owned(), "foo".to_owned())]))
        );
        assert!(!service.contains(key::LABELS));

        let options = RunOptions {
            labels: Some("app=bar".to_owned()),
            ..options
        };
        let workload = workload_params(&options, "foo", &[], RestartPolicy::Always).unwrap();
        let service = service_params(&options, &workload).unwrap();
        let expected: BTreeMap<String, String> = [("app".to_owned(), "bar".to_owned())].into();
        assert_eq!(service.map(key::SELECTOR).unwrap(), Some(&expected));
        assert_eq!(service.map(key::LABELS).unwrap(), Some(&expected));
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut params = GeneratorParams::new();
        params.insert(key::REPLICAS, ParamValue::String("two".to_owned()));
        assert!(matches!(
            params.int(key::REPLICAS),
            Err(GenerationError::InvalidParam { .. })
        ));
    }
}
