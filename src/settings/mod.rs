//! Configuration loading and resolution.
//!
//! `load` layers config files, `FRZ__*` environment variables and CLI flags,
//! then resolves the result into a validated [`ResolvedConfig`].

mod loader;
mod raw;
mod resolved;
mod sources;
mod util;

pub use loader::load;
pub use resolved::{InputSource, ResolvedConfig};
