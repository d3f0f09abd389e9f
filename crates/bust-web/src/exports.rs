//! JavaScript-facing `load`, `bust` and `noConflict`.

use std::cell::RefCell;
use std::rc::Rc;

use bust_loader::{HostCapabilities, Installer, LoadOptions, Loader, ModuleHost};
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use crate::dom::{to_js_error, DomHost};

thread_local! {
    static LOADER: RefCell<Option<Loader>> = const { RefCell::new(None) };
    static INSTANCE: RefCell<Option<JsValue>> = const { RefCell::new(None) };
    static INSTALLER: Installer = Installer::new();
}

/// The page's loader, created on first use.
fn shared_loader() -> Result<Loader, JsValue> {
    LOADER.with(|slot| {
        if let Some(loader) = slot.borrow().as_ref() {
            return Ok(loader.clone());
        }
        let host = DomHost::from_window().map_err(|e| to_js_error(&e))?;
        let loader = Loader::new(host);
        *slot.borrow_mut() = Some(loader.clone());
        Ok(loader)
    })
}

/// The JS object standing for the loader.
fn instance() -> JsValue {
    INSTANCE.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| JsValue::from(CacheBuster { _private: () }))
            .clone()
    })
}

/// Loader object published to the page.
#[wasm_bindgen]
pub struct CacheBuster {
    _private: (),
}

#[wasm_bindgen]
impl CacheBuster {
    /// See [`load`].
    pub fn load(&self, locator: String, options: JsValue, context: JsValue) -> Promise {
        load(locator, options, context)
    }

    /// See [`bust`].
    pub fn bust(&self, locator: String, options: JsValue, context: JsValue) -> Promise {
        bust(locator, options, context)
    }

    /// See [`no_conflict`].
    #[wasm_bindgen(js_name = noConflict)]
    pub fn no_conflict(&self) -> Result<JsValue, JsValue> {
        no_conflict()
    }
}

/// `{ async?: boolean, onError?: (err) => void }`
struct JsLoadOptions {
    is_async: Option<bool>,
    on_error: Option<Function>,
}

impl JsLoadOptions {
    fn from_js(options: &JsValue) -> Self {
        if !options.is_object() {
            return Self {
                is_async: None,
                on_error: None,
            };
        }
        let is_async = Reflect::get(options, &JsValue::from_str("async"))
            .ok()
            .and_then(|v| v.as_bool());
        let on_error = Reflect::get(options, &JsValue::from_str("onError"))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok());
        Self { is_async, on_error }
    }
}

/// Load a script with a cache-busting token. Resolves with `undefined`;
/// rejects with the `Error` that `onError` (called with `context` as
/// `this`) received.
#[wasm_bindgen]
pub fn load(locator: String, options: JsValue, context: JsValue) -> Promise {
    let loader = match shared_loader() {
        Ok(loader) => loader,
        Err(err) => return Promise::reject(&err),
    };
    let options = JsLoadOptions::from_js(&options);
    let context = (!context.is_undefined() && !context.is_null()).then_some(context);

    let rejection: Rc<RefCell<Option<JsValue>>> = Rc::default();
    let mut load_options = LoadOptions::<JsValue>::new();
    if let Some(is_async) = options.is_async {
        load_options = load_options.with_async(is_async);
    }
    if let Some(hook) = options.on_error {
        let rejection = rejection.clone();
        let logger = loader.logger().clone();
        load_options = load_options.on_error(move |error, this| {
            let value = to_js_error(error);
            let this = this.map_or(JsValue::UNDEFINED, |c| c.clone());
            // A throwing hook must not keep the promise from rejecting
            if let Err(thrown) = hook.call1(&this, &value) {
                let mut entry = logger
                    .entry(bust_core::LogLevel::Warn, "onError hook threw")
                    .field("error", format!("{:?}", thrown));
                if let Some(url) = error.url() {
                    entry = entry.url(url);
                }
                entry.emit();
            }
            *rejection.borrow_mut() = Some(value);
        });
    }

    let handle = loader.load(&locator, load_options, context);
    future_to_promise(async move {
        match handle.await {
            Ok(_) => Ok(JsValue::UNDEFINED),
            Err(failure) => Err(rejection
                .borrow_mut()
                .take()
                .unwrap_or_else(|| to_js_error(&failure.error))),
        }
    })
}

/// Alias of [`load`].
#[wasm_bindgen]
pub fn bust(locator: String, options: JsValue, context: JsValue) -> Promise {
    load(locator, options, context)
}

/// Remove the global binding if it is still this loader; return the loader.
#[wasm_bindgen(js_name = noConflict)]
pub fn no_conflict() -> Result<JsValue, JsValue> {
    let loader = shared_loader()?;
    let instance = instance();
    let global = js_sys::global();
    let name = JsValue::from_str(&loader.config().global_name);

    let current = Reflect::get(&global, &name)?;
    if Object::is(&current, &instance) {
        Reflect::delete_property(&global, &name)?;
    }
    Ok(instance)
}

/// Publishes the loader object into the page's globals.
struct WindowModuleHost {
    global: Object,
    instance: JsValue,
}

impl WindowModuleHost {
    fn lookup(&self, key: &str) -> JsValue {
        Reflect::get(&self.global, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
    }

    fn report(loader: &Loader, result: Result<bool, JsValue>, target: &str) {
        if let Err(err) = result {
            loader
                .logger()
                .entry(bust_core::LogLevel::Warn, "failed to publish loader")
                .field("target", target)
                .field("error", format!("{:?}", err))
                .emit();
        }
    }
}

impl ModuleHost for WindowModuleHost {
    fn capabilities(&self) -> HostCapabilities {
        let module = self.lookup("module");
        let module_exports = module.is_object()
            && Reflect::has(&module, &JsValue::from_str("exports")).unwrap_or(false);

        let define = self.lookup("define");
        let define = define.is_function()
            && Reflect::get(&define, &JsValue::from_str("amd"))
                .map(|amd| amd.is_truthy())
                .unwrap_or(false);

        HostCapabilities {
            module_exports,
            define,
        }
    }

    fn export_module(&mut self, loader: &Loader) {
        let module = self.lookup("module");
        let result = Reflect::set(&module, &JsValue::from_str("exports"), &self.instance);
        Self::report(loader, result, "module.exports");
    }

    fn define_module(&mut self, name: &str, loader: &Loader) {
        let Ok(define) = self.lookup("define").dyn_into::<Function>() else {
            return;
        };
        let instance = self.instance.clone();
        let factory = Closure::once_into_js(move || instance);
        let result = define
            .call3(
                &JsValue::UNDEFINED,
                &JsValue::from_str(name),
                &Array::new(),
                &factory,
            )
            .map(|_| true);
        Self::report(loader, result, "define");
    }

    fn bind_global(&mut self, name: &str, loader: &Loader) {
        let result = Reflect::set(&self.global, &JsValue::from_str(name), &self.instance);
        Self::report(loader, result, name);
    }
}

/// Create the loader and publish it when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let loader = shared_loader()?;
    let mut host = WindowModuleHost {
        global: js_sys::global(),
        instance: instance(),
    };
    INSTALLER.with(|installer| installer.install(&loader, &mut host));
    Ok(())
}
