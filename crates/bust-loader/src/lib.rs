//! Cache-busting script loader.
//!
//! This crate provides:
//! - `Loader` - `load` / `bust` / `no_conflict` over a script host
//! - `ScriptHost` - The seam a document (or anything script-like) implements
//! - `LoadHandle` - Future settling when the injected script loads or fails
//! - `GlobalNamespace` - Shared named bindings for global attachment
//! - `Installer` - Picks one export convention per host and publishes the loader
//! - `MemoryHost` - In-memory host for tests and non-document environments
//!
//! # Example
//!
//! ```ignore
//! use bust_loader::{LoadOptions, Loader, MemoryHost};
//!
//! let host = MemoryHost::new("https://shop.test/")?;
//! let loader = Loader::new(host.clone());
//!
//! let handle = loader.load(
//!     "/modules/cart.v3.js",
//!     LoadOptions::new().on_error(|err, _ctx: Option<&mut ()>| eprintln!("{err}")),
//!     None,
//! );
//! host.settle_loaded(0);
//! futures::executor::block_on(handle)?;
//! ```

mod global;
mod handle;
mod host;
mod loader;
mod memory;
mod packaging;
mod pending;

pub use global::*;
pub use handle::*;
pub use host::*;
pub use loader::*;
pub use memory::*;
pub use packaging::*;

pub use bust_core::{
    LoadError, LoadObserver, LoadPhase, LoaderConfig, ModuleIdentity, RecordingObserver,
};
pub use url::Url;
