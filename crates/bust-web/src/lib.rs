//! Browser host for the cache-busting loader.
//!
//! Only builds for `wasm32`. Provides:
//! - `DomHost` - Injects `<script>` elements into the live document
//! - `load` / `bust` / `noConflict` - JS exports returning promises
//!
//! On startup the loader publishes itself through `module.exports`, an AMD
//! `define`, or `window.CacheBuster`, whichever the page offers first.

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod exports;

#[cfg(target_arch = "wasm32")]
pub use dom::DomHost;
#[cfg(target_arch = "wasm32")]
pub use exports::*;
