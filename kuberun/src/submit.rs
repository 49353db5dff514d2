//! Drives one `run` invocation from flags to created objects and an optional attached session.

use std::{sync::atomic::AtomicBool, time::Duration};

use log::info;
use serde_json::Value;

use crate::{
    attach::{self, Attach, POLLING_INTERVAL},
    cluster::{AttachOptions, Cluster},
    error::{GenerationError, RunError, SubmissionError, UsageError},
    generate::{
        default_workload_generator, GeneratedObject, Generators, DEFAULT_SERVICE_GENERATOR,
    },
    options::RunOptions,
    params::{key, service_params, workload_params},
    print::Printer,
    restart::RestartPolicy,
    validate::{split_args, validate, validate_restart},
};

pub mod annotation {
    pub const CHANGE_CAUSE: &str = "kubernetes.io/change-cause";
    pub const LAST_APPLIED_CONFIGURATION: &str = "kubectl.kubernetes.io/last-applied-configuration";
}

/// What was typed on the command line besides the flags.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub namespace: &'a str,
    pub args: &'a [String],
    /// Number of positional arguments before `--`, `None` without `--`.
    pub args_len_at_dash: Option<usize>,
    /// Recorded in the change cause annotation with `--record`.
    pub command_line: &'a str,
}

/// The collaborators of a run.
pub struct Runner<'a, C: ?Sized, P: ?Sized> {
    pub cluster: &'a C,
    pub printer: &'a mut P,
    pub generators: &'a Generators,
    pub interrupted: &'a AtomicBool,
    pub polling_interval: Duration,
}

impl<'a, C: Cluster + ?Sized, P: Printer + ?Sized> Runner<'a, C, P> {
    pub fn new(cluster: &'a C, printer: &'a mut P, generators: &'a Generators) -> Self {
        Self {
            cluster,
            printer,
            generators,
            interrupted: &attach::INTERRUPTED,
            polling_interval: POLLING_INTERVAL,
        }
    }

    pub fn run(&mut self, options: &RunOptions, invocation: Invocation<'_>) -> Result<(), RunError> {
        let args = split_args(invocation.args, invocation.args_len_at_dash)?;
        validate(options)?;

        let restart = RestartPolicy::resolve(&options.restart, options.is_interactive())?;
        validate_restart(restart, options.replicas)?;

        let overrides = parse_overrides(options.overrides.as_deref())?;

        let params = workload_params(options, args.name, args.command, restart)?;
        let generator = if options.generator.is_empty() {
            default_workload_generator(restart, options.schedule.is_some())
        } else {
            options.generator.as_str()
        };
        let mut object = self.generators.workloads.generate(generator, &params)?;

        let mut service = if params.contains(key::PORT) {
            let generator = if options.service_generator.is_empty() {
                DEFAULT_SERVICE_GENERATOR
            } else {
                options.service_generator.as_str()
            };
            let params = service_params(options, &params)?;
            Some(self.generators.services.generate(generator, &params)?)
        } else {
            None
        };

        if let Some(overrides) = &overrides {
            object.apply_merge_patch(overrides).map_err(|error| {
                GenerationError::invalid("overrides", overrides.to_string(), error.to_string())
            })?;
        }
        for object in service.iter_mut().chain([&mut object]) {
            annotate(object, options, invocation.command_line)?;
        }

        if options.dry_run {
            if let Some(service) = &service {
                self.print(service, true)?;
            }
            return self.print(&object, true);
        }

        let mut created = Vec::new();
        if let Some(service) = service.take() {
            let service = self.create(invocation.namespace, &service, &created)?;
            created.push(service);
        }
        let object = self.create(invocation.namespace, &object, &created)?;
        created.push(object.clone());

        for object in &created {
            self.print(object, false)?;
        }

        if !options.is_attached() {
            return Ok(());
        }

        let result = Attach {
            cluster: self.cluster,
            namespace: invocation.namespace,
            options: AttachOptions {
                stdin: options.stdin,
                tty: options.tty,
            },
            timeout: options.pod_running_timeout,
            polling_interval: self.polling_interval,
            interrupted: self.interrupted,
        }
        .run(&object);

        if options.rm {
            attach::cleanup(self.cluster, invocation.namespace, &created);
        }

        result.map_err(RunError::from)
    }

    fn create(
        &self,
        namespace: &str,
        object: &GeneratedObject,
        created: &[GeneratedObject],
    ) -> Result<GeneratedObject, SubmissionError> {
        match self.cluster.create(namespace, object) {
            Ok(object) => {
                info!("{} created in namespace {namespace}", object.resource_name());
                Ok(object)
            }
            Err(source) => Err(SubmissionError {
                object: object.resource_name(),
                created: created.iter().map(GeneratedObject::resource_name).collect(),
                source,
            }),
        }
    }

    fn print(&mut self, object: &GeneratedObject, dry_run: bool) -> Result<(), RunError> {
        self.printer.print(object, dry_run).map_err(RunError::Print)
    }
}

fn parse_overrides(overrides: Option<&str>) -> Result<Option<Value>, UsageError> {
    match overrides {
        None | Some("") => Ok(None),
        Some(overrides) => match serde_json::from_str(overrides) {
            Ok(value @ Value::Object(_)) => Ok(Some(value)),
            Ok(_) => Err(UsageError::InvalidOverrides(
                "expected a JSON object".to_owned(),
            )),
            Err(error) => Err(UsageError::InvalidOverrides(error.to_string())),
        },
    }
}

fn annotate(
    object: &mut GeneratedObject,
    options: &RunOptions,
    command_line: &str,
) -> Result<(), GenerationError> {
    if options.record {
        object.annotate(annotation::CHANGE_CAUSE, command_line);
    }
    if options.apply_annotations {
        let configuration = object.to_json().map_err(|error| {
            GenerationError::invalid(
                annotation::LAST_APPLIED_CONFIGURATION,
                object.resource_name(),
                error.to_string(),
            )
        })?;
        object.annotate(annotation::LAST_APPLIED_CONFIGURATION, configuration.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};

    use super::*;
    use crate::{
        cluster::fake::{Call, FakeCluster, SERVER_ANNOTATION},
        print::recording::RecordingPrinter,
    };

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&value| value.to_owned()).collect()
    }

    fn run(
        cluster: &FakeCluster,
        options: &RunOptions,
        args: &[&str],
    ) -> (Result<(), RunError>, RecordingPrinter) {
        let generators = Generators::default();
        let mut printer = RecordingPrinter::default();
        let interrupted = AtomicBool::new(false);
        let args = strings(args);
        let result = Runner {
            cluster,
            printer: &mut printer,
            generators: &generators,
            interrupted: &interrupted,
            polling_interval: Duration::from_millis(1),
        }
        .run(
            options,
            Invocation {
                namespace: "default",
                args: &args,
                args_len_at_dash: None,
                command_line: "kuberun run web --image=nginx --record",
            },
        );
        (result, printer)
    }

    fn nginx() -> RunOptions {
        RunOptions {
            image: "nginx".to_owned(),
            ..Default::default()
        }
    }

    fn with_port() -> RunOptions {
        RunOptions {
            port: Some("80".to_owned()),
            ..nginx()
        }
    }

    fn printed_names(printer: &RecordingPrinter) -> Vec<String> {
        printer
            .printed
            .iter()
            .map(|(object, _)| object.resource_name())
            .collect()
    }

    #[test]
    fn service_is_created_before_the_workload() {
        let cluster = FakeCluster::default();
        let (result, printer) = run(&cluster, &with_port(), &["web"]);
        result.unwrap();

        assert_eq!(
            cluster.creates(),
            vec!["service/web".to_owned(), "deployment.apps/web".to_owned()]
        );
        assert_eq!(printed_names(&printer), cluster.creates());

        let (service, _) = &printer.printed[0];
        let (deployment, _) = &printer.printed[1];
        let GeneratedObject::Service(service) = service else {
            panic!("expected a service");
        };
        assert_eq!(
            service.spec.as_ref().and_then(|spec| spec.selector.as_ref()),
            deployment.pod_selector()
        );
    }

    #[test]
    fn dry_run_creates_nothing_but_prints_both() {
        let cluster = FakeCluster::default();
        let options = RunOptions {
            dry_run: true,
            ..with_port()
        };
        let (result, printer) = run(&cluster, &options, &["web"]);
        result.unwrap();

        assert!(cluster.calls().is_empty());
        assert_eq!(
            printed_names(&printer),
            vec!["service/web".to_owned(), "deployment.apps/web".to_owned()]
        );
        assert!(printer.printed.iter().all(|(_, dry_run)| *dry_run));
    }

    #[test]
    fn no_port_no_service() {
        let cluster = FakeCluster::default();
        let (result, printer) = run(&cluster, &nginx(), &["web"]);
        result.unwrap();
        assert_eq!(cluster.creates(), vec!["deployment.apps/web".to_owned()]);
        assert_eq!(printer.printed.len(), 1);
    }

    #[test]
    fn prints_the_object_returned_by_the_cluster() {
        let cluster = FakeCluster::default();
        let (result, printer) = run(&cluster, &nginx(), &["web"]);
        result.unwrap();
        let (object, dry_run) = &printer.printed[0];
        assert!(!dry_run);
        assert_eq!(object.annotation(SERVER_ANNOTATION), Some("true"));
    }

    #[test]
    fn usage_errors_create_nothing() {
        let cluster = FakeCluster::default();
        let options = RunOptions {
            rm: true,
            ..nginx()
        };
        let (result, printer) = run(&cluster, &options, &["web"]);
        assert!(matches!(
            result,
            Err(RunError::Usage(UsageError::RmRequiresAttach))
        ));
        assert!(cluster.calls().is_empty());
        assert!(printer.printed.is_empty());

        let (result, _) = run(&cluster, &nginx(), &[]);
        assert!(matches!(result, Err(RunError::Usage(UsageError::NameRequired))));
    }

    #[test]
    fn service_failure_aborts_the_run() {
        let cluster = FakeCluster {
            failing_creates: vec!["service/web".to_owned()],
            ..Default::default()
        };
        let (result, printer) = run(&cluster, &with_port(), &["web"]);
        let Err(RunError::Submission(error)) = result else {
            panic!("expected a submission error");
        };
        assert_eq!(error.object, "service/web");
        assert!(error.created.is_empty());
        assert_eq!(cluster.creates(), vec!["service/web".to_owned()]);
        assert!(printer.printed.is_empty());
    }

    #[test]
    fn workload_failure_names_the_created_service() {
        let cluster = FakeCluster {
            failing_creates: vec!["deployment.apps/web".to_owned()],
            ..Default::default()
        };
        let (result, _) = run(&cluster, &with_port(), &["web"]);
        let Err(RunError::Submission(error)) = result else {
            panic!("expected a submission error");
        };
        assert_eq!(error.created, vec!["service/web".to_owned()]);
        assert!(error.to_string().contains("service/web"));
        assert!(cluster.deletes().is_empty());
    }

    #[test]
    fn restart_policy_picks_the_generator() {
        let cases = [
            ("", "deployment.apps/web"),
            ("Always", "deployment.apps/web"),
            ("OnFailure", "job.batch/web"),
            ("Never", "pod/web"),
        ];
        for (restart, expected) in cases {
            let cluster = FakeCluster::default();
            let options = RunOptions {
                restart: restart.to_owned(),
                ..nginx()
            };
            run(&cluster, &options, &["web"]).0.unwrap();
            assert_eq!(cluster.creates(), vec![expected.to_owned()], "{restart}");
        }

        let cluster = FakeCluster::default();
        let options = RunOptions {
            schedule: Some("0 * * * *".to_owned()),
            restart: "OnFailure".to_owned(),
            ..nginx()
        };
        run(&cluster, &options, &["web"]).0.unwrap();
        assert_eq!(cluster.creates(), vec!["cronjob.batch/web".to_owned()]);
    }

    #[test]
    fn unknown_generator() {
        let cluster = FakeCluster::default();
        let options = RunOptions {
            generator: "foo/v9".to_owned(),
            ..nginx()
        };
        let (result, _) = run(&cluster, &options, &["web"]);
        assert!(matches!(
            result,
            Err(RunError::Generation(GenerationError::UnknownGenerator(_)))
        ));
    }

    #[test]
    fn annotations_and_overrides() {
        let cluster = FakeCluster::default();
        let options = RunOptions {
            record: true,
            apply_annotations: true,
            overrides: Some(r#"{"spec":{"replicas":5}}"#.to_owned()),
            ..nginx()
        };
        let (result, printer) = run(&cluster, &options, &["web"]);
        result.unwrap();

        let (object, _) = &printer.printed[0];
        assert_eq!(
            object.annotation(annotation::CHANGE_CAUSE),
            Some("kuberun run web --image=nginx --record")
        );
        let applied: Value = serde_json::from_str(
            object
                .annotation(annotation::LAST_APPLIED_CONFIGURATION)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(applied["spec"]["replicas"], 5);
        let GeneratedObject::Deployment(deployment) = object else {
            panic!("expected a deployment");
        };
        assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(5));
    }

    #[test]
    fn invalid_overrides() {
        let cluster = FakeCluster::default();
        for overrides in ["{", "[1]"] {
            let options = RunOptions {
                overrides: Some(overrides.to_owned()),
                ..nginx()
            };
            let (result, _) = run(&cluster, &options, &["web"]);
            assert!(
                matches!(result, Err(RunError::Usage(UsageError::InvalidOverrides(_)))),
                "{overrides}"
            );
        }
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn attached_run_is_removed_afterwards() {
        let cluster = FakeCluster {
            pod_states: VecDeque::from([Pod {
                status: Some(PodStatus {
                    phase: Some("Succeeded".to_owned()),
                    ..Default::default()
                }),
                ..Default::default()
            }])
            .into(),
            ..Default::default()
        };
        let options = RunOptions {
            stdin: true,
            tty: true,
            rm: true,
            restart: "Never".to_owned(),
            ..nginx()
        };
        let (result, _) = run(&cluster, &options, &["shell"]);
        result.unwrap();
        assert_eq!(cluster.creates(), vec!["pod/shell".to_owned()]);
        assert!(cluster.calls().contains(&Call::FollowLogs("shell".to_owned())));
        assert_eq!(cluster.deletes(), vec!["pod/shell".to_owned()]);
    }

    #[test]
    fn failed_session_still_cleans_up() {
        let cluster = FakeCluster {
            pod_states: VecDeque::from([Pod {
                status: Some(PodStatus {
                    phase: Some("Pending".to_owned()),
                    ..Default::default()
                }),
                ..Default::default()
            }])
            .into(),
            ..Default::default()
        };
        let options = RunOptions {
            attach: true,
            rm: true,
            restart: "Never".to_owned(),
            pod_running_timeout: Duration::ZERO,
            ..with_port()
        };
        let (result, _) = run(&cluster, &options, &["web"]);
        assert!(matches!(
            result,
            Err(RunError::Attach(crate::error::AttachError::Timeout(_)))
        ));
        assert_eq!(
            cluster.deletes(),
            vec!["pod/web".to_owned(), "service/web".to_owned()]
        );
    }

    #[test]
    fn attach_error_wins_over_delete_errors() {
        let cluster = FakeCluster {
            pod_states: VecDeque::from([Pod {
                status: Some(PodStatus {
                    phase: Some("Running".to_owned()),
                    conditions: Some(vec![PodCondition {
                        type_: "Ready".to_owned(),
                        status: "True".to_owned(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }])
            .into(),
            fail_attach: true,
            fail_delete: true,
            ..Default::default()
        };
        let options = RunOptions {
            stdin: true,
            rm: true,
            restart: "Never".to_owned(),
            ..nginx()
        };
        let (result, _) = run(&cluster, &options, &["web"]);
        assert!(matches!(
            result,
            Err(RunError::Attach(crate::error::AttachError::Session(_)))
        ));
        assert!(cluster.calls().contains(&Call::Attach {
            pod: "web".to_owned(),
            options: AttachOptions {
                stdin: true,
                tty: false,
            },
        }));
        assert_eq!(cluster.deletes(), vec!["pod/web".to_owned()]);
    }
}
