//! Errors surfaced by `kuberun run`, one variant per stage that can fail.

use std::{error::Error, fmt};

use container_image_name::InvalidImageName;

use crate::restart::RestartPolicy;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Inconsistent or malformed flags. Detected before anything is built or created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    NameRequired,
    TooManyNames(Vec<String>),
    ImageRequired,
    InvalidImage(InvalidImageName),
    StdinRequiresSingleReplica(i32),
    RmRequiresAttach,
    DryRunWithAttach,
    TtyRequiresStdin,
    InvalidRestartPolicy(String),
    RestartRequiresSingleReplica {
        policy: RestartPolicy,
        replicas: i32,
    },
    InvalidOverrides(String),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::NameRequired => f.write_str("NAME is required for run"),
            UsageError::TooManyNames(names) => write!(
                f,
                "exactly one NAME is required before `--`, found {}: {names:?}",
                names.len()
            ),
            UsageError::ImageRequired => f.write_str("--image is required"),
            UsageError::InvalidImage(error) => write!(
                f,
                "Invalid image name {:?}: {}",
                error.input, error.reason
            ),
            UsageError::StdinRequiresSingleReplica(replicas) => write!(
                f,
                "stdin requires that replicas is 1, found {replicas}"
            ),
            UsageError::RmRequiresAttach => {
                f.write_str("--rm should only be used for attached containers")
            }
            UsageError::DryRunWithAttach => f.write_str(
                "--dry-run can't be used with attached containers options (--attach, --stdin, or --tty)",
            ),
            UsageError::TtyRequiresStdin => {
                f.write_str("-i/--stdin is required for containers with -t/--tty=true")
            }
            UsageError::InvalidRestartPolicy(value) => write!(
                f,
                "invalid restart policy: {value} (expected one of Always, OnFailure or Never)"
            ),
            UsageError::RestartRequiresSingleReplica { policy, replicas } => write!(
                f,
                "--restart={policy} requires that --replicas=1, found {replicas}"
            ),
            UsageError::InvalidOverrides(message) => {
                write!(f, "--overrides is not valid JSON: {message}")
            }
        }
    }
}

impl Error for UsageError {}

/// Turning parameters into an object failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No generator is registered under the identifier. Points at a wiring defect rather than at
    /// bad user input.
    UnknownGenerator(String),
    MissingParam(String),
    InvalidParam {
        param: String,
        value: String,
        reason: String,
    },
}

impl GenerationError {
    pub fn invalid(
        param: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GenerationError::InvalidParam {
            param: param.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::UnknownGenerator(id) => write!(f, "generator {id:?} not found"),
            GenerationError::MissingParam(param) => {
                write!(f, "missing required parameter {param:?}")
            }
            GenerationError::InvalidParam {
                param,
                value,
                reason,
            } => write!(f, "invalid {param} {value:?}: {reason}"),
        }
    }
}

impl Error for GenerationError {}

/// The cluster rejected a create request.
#[derive(Debug)]
pub struct SubmissionError {
    /// The object that could not be created, e.g. `deployment.apps/nginx`.
    pub object: String,
    /// Objects that were created before the failure and are left in place.
    pub created: Vec<String>,
    pub source: BoxError,
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to create {}: {}", self.object, self.source)?;
        if !self.created.is_empty() {
            write!(
                f,
                " (already created and left in place: {})",
                self.created.join(", ")
            )?;
        }
        Ok(())
    }
}

impl Error for SubmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[derive(Debug)]
pub enum AttachError {
    Timeout(String),
    PodUnavailable { pod: String, status: String },
    Session(BoxError),
    ExitCode { pod: String, code: i32 },
    Interrupted,
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::Timeout(what) => write!(f, "timed out waiting for {what}"),
            AttachError::PodUnavailable { pod, status } => {
                write!(f, "can not attach to pod {pod}: {status}")
            }
            AttachError::Session(error) => write!(f, "attach failed: {error}"),
            AttachError::ExitCode { pod, code } => {
                write!(f, "pod {pod} terminated with exit code {code}")
            }
            AttachError::Interrupted => f.write_str("interrupted"),
        }
    }
}

impl Error for AttachError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttachError::Session(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum RunError {
    Usage(UsageError),
    Generation(GenerationError),
    Submission(SubmissionError),
    Attach(AttachError),
    Print(BoxError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Usage(error) => error.fmt(f),
            RunError::Generation(error) => error.fmt(f),
            RunError::Submission(error) => error.fmt(f),
            RunError::Attach(error) => error.fmt(f),
            RunError::Print(error) => write!(f, "failed to print object: {error}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::Usage(error) => Some(error),
            RunError::Generation(error) => Some(error),
            RunError::Submission(error) => Some(error),
            RunError::Attach(error) => Some(error),
            RunError::Print(error) => Some(error.as_ref()),
        }
    }
}

impl From<UsageError> for RunError {
    fn from(error: UsageError) -> Self {
        RunError::Usage(error)
    }
}

impl From<GenerationError> for RunError {
    fn from(error: GenerationError) -> Self {
        RunError::Generation(error)
    }
}

impl From<SubmissionError> for RunError {
    fn from(error: SubmissionError) -> Self {
        RunError::Submission(error)
    }
}

impl From<AttachError> for RunError {
    fn from(error: AttachError) -> Self {
        RunError::Attach(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_error_lists_created_objects() {
        let error = SubmissionError {
            object: "deployment.apps/web".to_owned(),
            created: vec!["service/web".to_owned()],
            source: "quota exceeded".into(),
        };
        assert_eq!(
            error.to_string(),
            "failed to create deployment.apps/web: quota exceeded (already created and left in place: service/web)"
        );
    }

    #[test]
    fn usage_messages() {
        assert_eq!(
            UsageError::RestartRequiresSingleReplica {
                policy: RestartPolicy::Never,
                replicas: 2
            }
            .to_string(),
            "--restart=Never requires that --replicas=1, found 2"
        );
        assert!(UsageError::TtyRequiresStdin
            .to_string()
            .contains("stdin is required for containers with -t/--tty"));
    }
}
