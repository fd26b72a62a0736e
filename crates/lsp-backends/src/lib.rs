#![forbid(unsafe_code)]
//! Concrete [`lsp_core::BackendAdapter`] implementations for the Python type-checking LSP
//! servers this harness drives: Pyright, Pyrefly, and ty.
//!
//! Each adapter is a stateless strategy: it knows the command line to spawn the server, the
//! capabilities to advertise, whether it needs a config file or an on-disk document mirror,
//! and (for Pyrefly/ty) how to turn caller-supplied options into that backend's native TOML.

mod config;
mod error;
mod pyrefly;
mod pyright;
mod ty;

pub use config::{kebab_case_keys, write_toml_config};
pub use error::BackendError;
pub use pyrefly::PyreflyBackend;
pub use pyright::PyrightBackend;
pub use ty::TyBackend;
