use std::{fmt, str::FromStr};

use crate::error::UsageError;

/// Whether the kubelet restarts the containers of a pod after they exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

impl RestartPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::Always => "Always",
            RestartPolicy::OnFailure => "OnFailure",
            RestartPolicy::Never => "Never",
        }
    }

    /// Resolves the raw `--restart` value. An explicit value always wins. Without one, interactive
    /// workloads default to `OnFailure` so that a successful exit ends the session instead of
    /// restarting the container, everything else defaults to `Always`.
    pub fn resolve(raw: &str, interactive: bool) -> Result<Self, UsageError> {
        match raw {
            "" if interactive => Ok(RestartPolicy::OnFailure),
            "" => Ok(RestartPolicy::Always),
            value => value.parse(),
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Always" => Ok(RestartPolicy::Always),
            "OnFailure" => Ok(RestartPolicy::OnFailure),
            "Never" => Ok(RestartPolicy::Never),
            other => Err(UsageError::InvalidRestartPolicy(other.to_owned())),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
