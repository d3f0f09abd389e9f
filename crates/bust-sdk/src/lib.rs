//! Public SDK for the cache-busting script loader.
//!
//! This crate re-exports everything a caller needs:
//!
//! ```ignore
//! use bust_sdk::prelude::*;
//!
//! let loader = Loader::with_config(host, LoaderConfig::default());
//! loader
//!     .load(
//!         "/modules/cart.v3.js",
//!         LoadOptions::new().on_error(|err, page: Option<&mut Page>| {
//!             if let Some(page) = page {
//!                 page.show_banner(err);
//!             }
//!         }),
//!         Some(page),
//!     )
//!     .await?;
//! ```

pub use bust_core;
pub use bust_loader;
pub use bust_observability;
pub use bust_web;

/// Prelude for convenient imports.
pub mod prelude {
    pub use bust_core::*;
    pub use bust_loader::*;
    pub use bust_observability::{LoadLogger, LogBuilder, LogEntry};
}
