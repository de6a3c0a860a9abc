//! Metrics collection for analysis-facility login nodes.
//!
//! Collectors are grouped by source:
//! - `host` — `/proc` resource counters (load, memory, network, disks)
//! - `condor` — batch-scheduler job and queue queries
//! - `sessions` — SSH and Jupyter interactive usage
//!
//! All external access goes through two seams defined in [`traits`]:
//! `FileSystem` for proc/etc files and persisted state, `CommandRunner`
//! for query subprocesses. Production wires in [`RealFs`]/[`RealRunner`];
//! tests script both with the doubles in [`mock`].

pub mod condor;
pub mod host;
pub mod mock;
pub mod sessions;
pub mod traits;

pub use host::CollectError;
pub use host::parser::ParseError;
pub use mock::{MockFs, MockRunner};
pub use traits::{CommandError, CommandRunner, FileSystem, RealFs, RealRunner};
