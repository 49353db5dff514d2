use std::time::Duration;

/// Everything `kuberun run` was asked to do, captured once from the command line and passed by
/// reference to every stage afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub image: String,
    /// Raw `--restart` value, empty when not given.
    pub restart: String,
    /// `K=V` entries in the order they were given.
    pub env: Vec<String>,
    pub port: Option<String>,
    pub replicas: i32,
    /// `k=v,k=v`.
    pub labels: Option<String>,
    pub attach: bool,
    pub stdin: bool,
    pub tty: bool,
    pub rm: bool,
    pub dry_run: bool,
    pub record: bool,
    /// Empty selects a generator from the restart policy.
    pub generator: String,
    pub service_generator: String,
    pub apply_annotations: bool,
    /// Use the arguments after NAME as the container command rather than its args.
    pub command: bool,
    pub schedule: Option<String>,
    pub image_pull_policy: Option<String>,
    pub service_account: Option<String>,
    pub requests: Option<String>,
    pub limits: Option<String>,
    pub leave_stdin_open: bool,
    pub overrides: Option<String>,
    pub pod_running_timeout: Duration,
}

pub const DEFAULT_POD_RUNNING_TIMEOUT: Duration = Duration::from_secs(60);

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            image: String::new(),
            restart: String::new(),
            env: Vec::new(),
            port: None,
            replicas: 1,
            labels: None,
            attach: false,
            stdin: false,
            tty: false,
            rm: false,
            dry_run: false,
            record: false,
            generator: String::new(),
            service_generator: String::new(),
            apply_annotations: false,
            command: false,
            schedule: None,
            image_pull_policy: None,
            service_account: None,
            requests: None,
            limits: None,
            leave_stdin_open: false,
            overrides: None,
            pod_running_timeout: DEFAULT_POD_RUNNING_TIMEOUT,
        }
    }
}

impl RunOptions {
    /// The caller expects to exchange I/O with the workload.
    pub fn is_attached(&self) -> bool {
        self.attach || self.stdin || self.tty
    }

    /// Decides the default restart policy.
    pub fn is_interactive(&self) -> bool {
        self.attach || self.stdin
    }
}
