use env_logger::Env;

mod archive;
mod batch;
mod error;
mod example;
mod fan_in;
mod index;
mod options;
mod pipeline;
mod worker;

pub use archive::*;
pub use batch::*;
pub use error::*;
pub use example::*;
pub use fan_in::*;
pub use index::*;
pub use options::*;
pub use pipeline::*;
pub use worker::*;

/// Installs the env_logger backend with an `info` default filter. Later calls, or a
/// logger installed by the host program, take precedence.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}
