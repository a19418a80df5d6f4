//! CLI integration tests. Recipes use the custom backend with `/bin/sh`
//! commands, so these only run on unix.

#![cfg(unix)]

mod common;
mod create_tests;
mod install_tests;
mod lock_tests;
