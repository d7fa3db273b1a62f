mod common;
#[cfg(unix)]
mod engine_tests;
mod project_tests;
