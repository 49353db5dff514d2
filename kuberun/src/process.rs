use std::{
    ffi::OsStr,
    fmt,
    io::{self, Read, Write},
    num::NonZeroI32,
    process,
    thread::{self, JoinHandle},
};

use log::debug;

pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<'a, I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.0.args(args);
        self
    }

    #[cfg(test)]
    pub fn get_args(&self) -> process::CommandArgs<'_> {
        self.0.get_args()
    }

    pub fn try_status(mut self) -> Result<ExitStatus, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}`...", command = &self.0);
        }

        match self.0.status() {
            Ok(status) => Ok(ExitStatus {
                command: self,
                status,
            }),
            Err(error) => Err(Error {
                command: self,
                kind: error.into(),
            }),
        }
    }

    pub fn status(self) -> Result<(), Error> {
        self.try_status().and_then(ExitStatus::require_success)
    }

    pub fn try_output(mut self) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        match self.0.output() {
            Ok(output) => Ok(Output {
                command: self,
                output,
            }),
            Err(error) => Err(Error {
                command: self,
                kind: error.into(),
            }),
        }
    }

    /// Writes `input` to the stdin of the command while capturing its output.
    pub fn output_with_input(mut self, input: Vec<u8>) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}` with input...", command = &self.0);
        }

        let mut child = match self
            .0
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => return Err(self.error(error)),
        };

        let stdin_thread = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || ignore_broken_pipe(stdin.write_all(&input)))
        });

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(error) => return Err(self.error(error)),
        };

        if let Some(stdin_thread) = stdin_thread {
            let written = stdin_thread
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "thread writing to stdin panicked")));
            if let Err(error) = written {
                return Err(self.error(error));
            }
        }

        Ok(Output {
            command: self,
            output,
        })
    }

    /// Runs the command connected to the terminal. When `pipe_stdin` is set, our stdin and stdout
    /// are copied to and from the command by two directional copy loops instead of being
    /// inherited. The command ends the session by closing its stdout.
    pub fn interact(mut self, pipe_stdin: bool) -> Result<(), Error> {
        if !pipe_stdin {
            return self.status();
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("interacting with `{command:?}`...", command = &self.0);
        }

        let mut child = match self
            .0
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => return Err(self.error(error)),
        };

        if let (Some(remote_in), Some(remote_out)) = (child.stdin.take(), child.stdout.take()) {
            match copy_duplex(io::stdin(), remote_in, remote_out, io::stdout()) {
                Ok((downstream, upstream)) => {
                    debug!("received {downstream} bytes");
                    // The upstream copy is blocked on our stdin until the user types again, only
                    // wait for it if it already ended.
                    if upstream.is_finished() {
                        if let Ok(Err(error)) = upstream.join() {
                            debug!("copying stdin failed: {error}");
                        }
                    }
                }
                Err(error) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.error(error));
                }
            }
        }

        match child.wait() {
            Ok(status) => ExitStatus {
                command: self,
                status,
            }
            .require_success(),
            Err(error) => Err(self.error(error)),
        }
    }

    fn error(self, error: io::Error) -> Error {
        Error {
            command: self,
            kind: error.into(),
        }
    }
}

fn ignore_broken_pipe<T: Default>(result: io::Result<T>) -> io::Result<T> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(T::default()),
        other => other,
    }
}

/// Copies `input` to `remote_in` on a separate thread and `remote_out` to `output` on the current
/// one. Returns once `remote_out` is exhausted, with the number of bytes received and the handle
/// of the upstream copy. `remote_in` is closed when `input` ends.
pub fn copy_duplex<I, RI, RO, O>(
    mut input: I,
    mut remote_in: RI,
    mut remote_out: RO,
    mut output: O,
) -> io::Result<(u64, JoinHandle<io::Result<u64>>)>
where
    I: Read + Send + 'static,
    RI: Write + Send + 'static,
    RO: Read,
    O: Write,
{
    let upstream = thread::spawn(move || {
        let copied = ignore_broken_pipe(io::copy(&mut input, &mut remote_in))?;
        ignore_broken_pipe(remote_in.flush())?;
        Ok(copied)
    });

    let downstream = ignore_broken_pipe(io::copy(&mut remote_out, &mut output))?;
    ignore_broken_pipe(output.flush())?;
    Ok((downstream, upstream))
}

#[derive(Debug)]
pub struct ExitStatus {
    command: Command,
    status: process::ExitStatus,
}

impl ExitStatus {
    pub fn require_success(self) -> Result<(), Error> {
        let ExitStatus { command, status } = self;
        if status.success() {
            Ok(())
        } else {
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(status.code().and_then(NonZeroI32::new)),
            })
        }
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        let Output { command, output } = self;
        if output.status.success() {
            Ok(Output { command, output })
        } else {
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(output.status.code().and_then(NonZeroI32::new)),
            })
        }
    }
}

impl std::ops::Deref for Output {
    type Target = process::Output;

    fn deref(&self) -> &Self::Target {
        &self.output
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    NonZeroExitStatus(Option<NonZeroI32>),
    Other(io::Error),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Other(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        match &self.kind {
            ErrorKind::NotFound => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is required but not available on your system, please install it")
            }
            ErrorKind::PermissionDenied => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")
            }
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")
                } else {
                    write!(f, "did not run successfully")
                }
            }
            ErrorKind::Other(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Other(error) => Some(error),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Calls [`Command::args`] on the provided [`Command`] while calling [`std::convert::AsRef::as_ref`]
/// on each argument.
macro_rules! args {
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $program.args([
            $(($arg).as_ref(),)*
        ])
    }
}

pub(crate) use args;
