#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod error;
pub mod input;
pub mod model;
pub mod output;
pub mod probe;
pub mod region;
pub mod server;
pub mod util;

pub use error::{ErrorKind, ProbeError};
pub use model::{ProbeConfig, ProbeResult, Target};
pub use probe::{Prober, RelayProbe};
