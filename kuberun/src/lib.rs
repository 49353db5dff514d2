pub(crate) mod attach;
pub(crate) mod cluster;
pub(crate) mod error;
pub(crate) mod generate;
pub(crate) mod kubectl;
pub(crate) mod options;
pub(crate) mod params;
pub(crate) mod print;
pub(crate) mod process;
pub(crate) mod restart;
pub(crate) mod shell_quote;
pub(crate) mod submit;
pub(crate) mod temp_path;
pub(crate) mod validate;

pub mod cli;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;

/// Records Ctrl-C instead of terminating so that an attached session can still clean up after
/// itself. The `kubectl` child shares our process group and receives the signal as well.
pub fn install_interrupt_handler() -> std::result::Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        attach::INTERRUPTED.store(true, std::sync::atomic::Ordering::SeqCst);
    })
}
