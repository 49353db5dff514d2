use std::{io, time::Duration};

use clap::Args;
use constcat::concat;

use super::ClusterArgs;
use crate::{
    generate::{self, Generators},
    options::{RunOptions, DEFAULT_POD_RUNNING_TIMEOUT},
    print::{OutputFormat, WriterPrinter},
    shell_quote::quote_join,
    submit::{Invocation, Runner},
    Result,
};

const DEFAULT_POD_RUNNING_TIMEOUT_SECS: u64 = DEFAULT_POD_RUNNING_TIMEOUT.as_secs();

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The name of the created objects, optionally followed by the arguments of the container.
    #[arg(value_name = "NAME")]
    pub args: Vec<String>,

    /// The command of the container, or its arguments without `--command`.
    #[arg(last = true, value_name = "COMMAND")]
    pub dash_args: Vec<String>,

    /// The container image to run.
    #[arg(long)]
    pub image: Option<String>,

    /// The restart policy: Always, OnFailure or Never. Defaults to OnFailure when attached and to
    /// Always otherwise.
    #[arg(long)]
    pub restart: Option<String>,

    /// Environment variables to set in the container, as NAME=VALUE.
    #[arg(long = "env", value_name = "NAME=VALUE")]
    pub env: Vec<String>,

    /// The port the container exposes. Also creates a service forwarding the same port.
    #[arg(long)]
    pub port: Option<String>,

    /// Number of replicas to create.
    #[arg(long, short = 'r', default_value_t = 1, value_parser = clap::value_parser!(i32).range(0..))]
    pub replicas: i32,

    /// Labels to apply, as key=value,key=value. Defaults to run=NAME.
    #[arg(long, short = 'l')]
    pub labels: Option<String>,

    /// Wait for the pod to run and attach to it.
    #[arg(long, default_value_t)]
    pub attach: bool,

    /// Keep stdin open on the container and attach to it.
    #[arg(long, short = 'i', default_value_t)]
    pub stdin: bool,

    /// Allocate a TTY for the container, requires --stdin.
    #[arg(long, short = 't', default_value_t)]
    pub tty: bool,

    /// Delete the created objects after the attached session ends.
    #[arg(long, default_value_t)]
    pub rm: bool,

    /// Only print the objects that would be created.
    #[arg(long, default_value_t)]
    pub dry_run: bool,

    /// Record the command line in the change cause annotation of the created objects.
    #[arg(long, default_value_t)]
    pub record: bool,

    /// Store the configuration of the created objects in an annotation, for a later
    /// `kubectl apply`.
    #[arg(long, default_value_t)]
    pub save_config: bool,

    #[arg(long, help = concat!(
        "The generator to use: ",
        generate::RUN_POD_V1, ", ",
        generate::RUN_V1, ", ",
        generate::DEPLOYMENT_APPS_V1, ", ",
        generate::JOB_V1, " or ",
        generate::CRONJOB_V1,
        ". Chosen from the restart policy and schedule by default."
    ))]
    pub generator: Option<String>,

    #[arg(long, help = concat!(
        "The generator of the service created for --port. Defaults to ",
        generate::DEFAULT_SERVICE_GENERATOR,
        "."
    ))]
    pub service_generator: Option<String>,

    /// Use the arguments after NAME as the command of the container instead of its arguments.
    #[arg(long = "command", default_value_t)]
    pub use_command: bool,

    /// Run on a cron schedule, e.g. "*/5 * * * *".
    #[arg(long)]
    pub schedule: Option<String>,

    /// Always, IfNotPresent or Never.
    #[arg(long)]
    pub image_pull_policy: Option<String>,

    /// The service account of the pods.
    #[arg(long = "serviceaccount")]
    pub service_account: Option<String>,

    /// Resource requests, e.g. cpu=100m,memory=256Mi.
    #[arg(long)]
    pub requests: Option<String>,

    /// Resource limits, e.g. cpu=200m,memory=512Mi.
    #[arg(long)]
    pub limits: Option<String>,

    /// Keep stdin open after the first attached session ends.
    #[arg(long, default_value_t)]
    pub leave_stdin_open: bool,

    /// A JSON merge patch applied to the generated object.
    #[arg(long)]
    pub overrides: Option<String>,

    /// Seconds to wait for the pod to run before attaching.
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_POD_RUNNING_TIMEOUT_SECS)]
    pub pod_running_timeout: u64,

    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

/// Positional arguments and the index of `--` among them.
fn join_args(args: Vec<String>, dash_args: Vec<String>) -> (Vec<String>, Option<usize>) {
    if dash_args.is_empty() {
        return (args, None);
    }
    let dash = args.len();
    let mut args = args;
    args.extend(dash_args);
    (args, Some(dash))
}

impl RunArgs {
    fn into_parts(self) -> (RunOptions, Vec<String>, Option<usize>, OutputFormat) {
        let (args, args_len_at_dash) = join_args(self.args, self.dash_args);
        let options = RunOptions {
            image: self.image.unwrap_or_default(),
            restart: self.restart.unwrap_or_default(),
            env: self.env,
            port: self.port,
            replicas: self.replicas,
            labels: self.labels,
            attach: self.attach,
            stdin: self.stdin,
            tty: self.tty,
            rm: self.rm,
            dry_run: self.dry_run,
            record: self.record,
            generator: self.generator.unwrap_or_default(),
            service_generator: self.service_generator.unwrap_or_default(),
            apply_annotations: self.save_config,
            command: self.use_command,
            schedule: self.schedule,
            image_pull_policy: self.image_pull_policy,
            service_account: self.service_account,
            requests: self.requests,
            limits: self.limits,
            leave_stdin_open: self.leave_stdin_open,
            overrides: self.overrides,
            pod_running_timeout: Duration::from_secs(self.pod_running_timeout),
        };
        (options, args, args_len_at_dash, self.output)
    }
}

pub fn run(cluster: &ClusterArgs, args: RunArgs) -> Result<()> {
    let (options, args, args_len_at_dash, output) = args.into_parts();

    let command_line = {
        let args: Vec<String> = std::env::args().collect();
        quote_join(args.iter().map(String::as_str))
    };

    let kubectl = cluster.kubectl();
    let generators = Generators::default();
    let mut printer = WriterPrinter::new(output, io::stdout().lock());

    Runner::new(&kubectl, &mut printer, &generators).run(
        &options,
        Invocation {
            namespace: &cluster.namespace,
            args: &args,
            args_len_at_dash,
            command_line: &command_line,
        },
    )?;

    Ok(())
}
