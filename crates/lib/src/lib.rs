//! devcell-lib: project state and container engine plumbing for devcell.
//!
//! - `project`: the on-disk project store, lock and build-record formats, and
//!   the rebuild decision
//! - `platform`: who owns the files we write and where they go
//! - `engine`: the `ContainerEngine` trait and its docker/podman adapter
//! - `cancel` / `prompt`: cancellation shared by engine calls, copies and prompts

pub mod cancel;
pub mod consts;
pub mod engine;
pub mod platform;
pub mod project;
pub mod prompt;
pub mod util;
pub mod version;
