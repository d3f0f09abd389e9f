//! Core abstractions for the cache-busting script loader.
//!
//! This crate provides the host-independent pieces:
//! - `ModuleIdentity` - Name/version parsed from a resource locator
//! - `LoadRegistry` - Which modules are loaded or in flight
//! - `TokenSource` - Strictly increasing freshness tokens
//! - `LoadPhase` / `LoadObserver` - Per-load lifecycle tracking
//! - `LoaderConfig` - Loader configuration
//! - `LoadError` - Errors surfaced through load rejections

mod config;
mod error;
mod identity;
mod lifecycle;
mod registry;
mod token;

pub use config::*;
pub use error::*;
pub use identity::*;
pub use lifecycle::*;
pub use registry::*;
pub use token::*;
