//! kiln-lib: recipe-driven build and packaging for native projects.
//!
//! A build runs as a fixed pipeline driven by [`orchestrator::Orchestrator`]:
//! - `layout`: establish source, build, generators and package directories
//! - `generate`: resolve requirements against a package index and write
//!   toolchain files for the downstream build tool
//! - `build`: configure and compile through a [`backend::BuildBackend`]
//! - `package`: install the outputs into the package directory atomically

pub mod backend;
pub mod consts;
pub mod execute;
pub mod generate;
pub mod index;
pub mod layout;
pub mod orchestrator;
pub mod package;
pub mod platform;
pub mod recipe;
pub mod resolve;
pub mod settings;
pub mod util;
