//! Platform-specific behaviour.
//!
//! - `os`: which directory convention applies on this machine
//! - `identity`: who the files we write should belong to
//! - `userfs`: directory resolution and filesystem writes on behalf of that user

pub mod identity;
pub mod os;
pub mod userfs;

pub use identity::{Identity, Owner};
pub use os::Os;
pub use userfs::{UserFs, UserFsError};
