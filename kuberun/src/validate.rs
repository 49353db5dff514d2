//! Flag combination checks. They run before any object is built, and the first violated rule is
//! reported.

use container_image_name::ImageNameRef;

use crate::{error::UsageError, options::RunOptions, restart::RestartPolicy};

/// Positional arguments split at the `--` separator.
#[derive(Debug, PartialEq, Eq)]
pub struct SplitArgs<'a> {
    pub name: &'a str,
    /// Overrides the entry command (or its arguments) of the container when non-empty.
    pub command: &'a [String],
}

/// Splits `args` at `args_len_at_dash`, the number of arguments that preceded `--` or `None` when
/// there was no `--`. Without a dash the first argument is the name and the rest is the command.
pub fn split_args(
    args: &[String],
    args_len_at_dash: Option<usize>,
) -> Result<SplitArgs<'_>, UsageError> {
    let dash = args_len_at_dash.map(|dash| dash.min(args.len()));
    let (resources, command) = match dash {
        Some(dash) => args.split_at(dash),
        None if args.is_empty() => (args, &args[..0]),
        None => args.split_at(1),
    };
    match resources {
        [] => Err(UsageError::NameRequired),
        [name] => Ok(SplitArgs {
            name: name.as_str(),
            command,
        }),
        names => Err(UsageError::TooManyNames(names.to_vec())),
    }
}

pub fn validate(options: &RunOptions) -> Result<(), UsageError> {
    if options.image.is_empty() {
        return Err(UsageError::ImageRequired);
    }

    ImageNameRef::new(&options.image).map_err(UsageError::InvalidImage)?;

    if options.stdin && options.replicas != 1 {
        return Err(UsageError::StdinRequiresSingleReplica(options.replicas));
    }

    if options.rm && !(options.attach || options.stdin) {
        return Err(UsageError::RmRequiresAttach);
    }

    if options.is_attached() && options.dry_run {
        return Err(UsageError::DryRunWithAttach);
    }

    if options.tty && !options.stdin {
        return Err(UsageError::TtyRequiresStdin);
    }

    Ok(())
}

/// Only `Always` makes sense for more than one replica, the other policies describe a single run.
pub fn validate_restart(policy: RestartPolicy, replicas: i32) -> Result<(), UsageError> {
    if policy != RestartPolicy::Always && replicas != 1 {
        return Err(UsageError::RestartRequiresSingleReplica { policy, replicas });
    }
    Ok(())
}
