//! Publishing the loader through whichever module convention the host has.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::global::{GlobalNamespace, GlobalValue};
use crate::loader::Loader;

/// Module mechanisms a host exposes at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Synchronous `module.exports` style export.
    pub module_exports: bool,
    /// Definition-based (`define(...)`) modules.
    pub define: bool,
}

/// How the loader is made available to other code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportConvention {
    /// Assigned as the host module's export.
    ModuleExports,
    /// Registered through the host's `define`.
    Define,
    /// Bound in the global namespace.
    Global,
}

impl ExportConvention {
    /// Pick a convention. Order: module exports, then define, then global.
    pub fn probe(capabilities: HostCapabilities) -> Self {
        if capabilities.module_exports {
            Self::ModuleExports
        } else if capabilities.define {
            Self::Define
        } else {
            Self::Global
        }
    }
}

impl std::fmt::Display for ExportConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModuleExports => write!(f, "module-exports"),
            Self::Define => write!(f, "define"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Environment the loader is published into.
pub trait ModuleHost {
    /// What the environment supports.
    fn capabilities(&self) -> HostCapabilities;

    /// Make `loader` the module's export.
    fn export_module(&mut self, loader: &Loader);

    /// Register `loader` as a named module definition.
    fn define_module(&mut self, name: &str, loader: &Loader);

    /// Bind `loader` in the global namespace.
    fn bind_global(&mut self, name: &str, loader: &Loader);
}

/// Publishes loaders through exactly one convention.
///
/// The convention is probed on first use and reused afterwards, so every
/// install through the same installer takes the same path.
#[derive(Debug, Default)]
pub struct Installer {
    convention: OnceCell<ExportConvention>,
}

impl Installer {
    /// Create an installer that has not probed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The chosen convention, probing `host` if none was chosen yet.
    pub fn convention(&self, host: &dyn ModuleHost) -> ExportConvention {
        *self
            .convention
            .get_or_init(|| ExportConvention::probe(host.capabilities()))
    }

    /// The chosen convention, if probed.
    pub fn chosen(&self) -> Option<ExportConvention> {
        self.convention.get().copied()
    }

    /// Publish `loader` into `host`.
    pub fn install(&self, loader: &Loader, host: &mut dyn ModuleHost) -> ExportConvention {
        let convention = self.convention(host);
        let name = loader.config().global_name.clone();
        match convention {
            ExportConvention::ModuleExports => host.export_module(loader),
            ExportConvention::Define => host.define_module(&name, loader),
            ExportConvention::Global => host.bind_global(&name, loader),
        }
        loader
            .logger()
            .entry(bust_core::LogLevel::Debug, "loader published")
            .field("convention", convention.to_string())
            .field("name", name)
            .emit();
        convention
    }
}

/// Module host kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryModuleHost {
    /// Capabilities reported to the installer.
    pub capabilities: HostCapabilities,
    /// Module export, when published that way.
    pub exported: Option<Loader>,
    /// Named definitions.
    pub definitions: HashMap<String, Loader>,
    /// Global namespace.
    pub globals: GlobalNamespace,
}

impl MemoryModuleHost {
    /// Create a host with the given capabilities.
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }
}

impl ModuleHost for MemoryModuleHost {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn export_module(&mut self, loader: &Loader) {
        self.exported = Some(loader.clone());
    }

    fn define_module(&mut self, name: &str, loader: &Loader) {
        self.definitions.insert(name.to_string(), loader.clone());
    }

    fn bind_global(&mut self, name: &str, loader: &Loader) {
        self.globals.bind(name, GlobalValue::Loader(loader.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryHost;

    fn loader() -> Loader {
        Loader::new(MemoryHost::new("https://shop.test/").unwrap())
    }

    #[test]
    fn test_probe_order() {
        let all = HostCapabilities {
            module_exports: true,
            define: true,
        };
        assert_eq!(ExportConvention::probe(all), ExportConvention::ModuleExports);

        let define_only = HostCapabilities {
            module_exports: false,
            define: true,
        };
        assert_eq!(ExportConvention::probe(define_only), ExportConvention::Define);

        assert_eq!(
            ExportConvention::probe(HostCapabilities::default()),
            ExportConvention::Global
        );
    }

    #[test]
    fn test_install_module_exports_only() {
        let loader = loader();
        let mut host = MemoryModuleHost::new(HostCapabilities {
            module_exports: true,
            define: true,
        });

        let convention = Installer::new().install(&loader, &mut host);

        assert_eq!(convention, ExportConvention::ModuleExports);
        assert!(host.exported.as_ref().unwrap().ptr_eq(&loader));
        assert!(host.definitions.is_empty());
        assert!(!host.globals.contains("CacheBuster"));
    }

    #[test]
    fn test_install_define() {
        let loader = loader();
        let mut host = MemoryModuleHost::new(HostCapabilities {
            module_exports: false,
            define: true,
        });

        Installer::new().install(&loader, &mut host);

        assert!(host.exported.is_none());
        assert!(host.definitions["CacheBuster"].ptr_eq(&loader));
    }

    #[test]
    fn test_install_global_then_no_conflict() {
        let loader = loader();
        let mut host = MemoryModuleHost::default();

        assert_eq!(
            Installer::new().install(&loader, &mut host),
            ExportConvention::Global
        );
        assert!(host.globals.contains("CacheBuster"));

        loader.no_conflict(&host.globals);
        assert!(!host.globals.contains("CacheBuster"));
    }

    #[test]
    fn test_convention_is_cached() {
        let installer = Installer::new();
        assert_eq!(installer.chosen(), None);

        let mut first = MemoryModuleHost::new(HostCapabilities {
            module_exports: false,
            define: true,
        });
        installer.install(&loader(), &mut first);

        // A later host with different capabilities still gets the first choice
        let mut second = MemoryModuleHost::default();
        let loader = loader();
        assert_eq!(installer.install(&loader, &mut second), ExportConvention::Define);
        assert!(second.definitions["CacheBuster"].ptr_eq(&loader));
        assert_eq!(installer.chosen(), Some(ExportConvention::Define));
    }
}
