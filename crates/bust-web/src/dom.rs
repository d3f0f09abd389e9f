//! Script injection into a browser document.

use std::cell::RefCell;
use std::rc::Rc;

use bust_core::LoadError;
use bust_loader::{ScriptElement, ScriptHost, Url};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlScriptElement, Node};

/// Convert a JS exception into a host error.
pub(crate) fn host_error(operation: &str, value: JsValue) -> LoadError {
    let detail = value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value));
    LoadError::Host(format!("{}: {}", operation, detail))
}

/// Convert a load error into a JS `Error`.
pub(crate) fn to_js_error(error: &LoadError) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

/// Script host backed by a live `Document`.
///
/// Scripts go into `<head>`, or `<body>` / the root element when the
/// document has no head.
#[derive(Debug, Clone)]
pub struct DomHost {
    document: Document,
}

impl DomHost {
    /// Wrap a document.
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Use the current window's document.
    pub fn from_window() -> Result<Self, LoadError> {
        let window =
            web_sys::window().ok_or_else(|| LoadError::Host("no global window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| LoadError::Host("window has no document".to_string()))?;
        Ok(Self::new(document))
    }

    fn mount_point(&self) -> Result<Node, LoadError> {
        if let Some(head) = self.document.head() {
            return Ok(head.into());
        }
        if let Some(body) = self.document.body() {
            return Ok(body.into());
        }
        self.document
            .document_element()
            .map(Node::from)
            .ok_or_else(|| LoadError::Host("document has no root element".to_string()))
    }
}

impl ScriptHost for DomHost {
    fn base_location(&self) -> Result<Url, LoadError> {
        let base = self
            .document
            .base_uri()
            .map_err(|e| host_error("baseURI", e))?
            .ok_or_else(|| LoadError::Host("document has no base URI".to_string()))?;
        Url::parse(&base).map_err(|e| LoadError::Host(format!("invalid base URI {}: {}", base, e)))
    }

    fn insert(&self, mut element: ScriptElement) -> Result<(), LoadError> {
        let src = element
            .src()
            .cloned()
            .ok_or_else(|| LoadError::Host("script element has no src".to_string()))?;
        let script: HtmlScriptElement = self
            .document
            .create_element("script")
            .map_err(|e| host_error("createElement", e))?
            .dyn_into()
            .map_err(|_| LoadError::Host("created element is not a script".to_string()))?;

        script.set_defer(element.defer);
        script.set_type(&element.content_type);
        script.set_async(element.is_async);

        // Only one of the two events fires; the other closure is never run
        let listener = Rc::new(RefCell::new(element.take_listener()));
        let on_load = {
            let listener = listener.clone();
            Closure::once_into_js(move |_event: web_sys::Event| {
                let taken = listener.borrow_mut().take();
                if let Some(listener) = taken {
                    listener.loaded();
                }
            })
        };
        let on_error = Closure::once_into_js(move |event: web_sys::Event| {
            let taken = listener.borrow_mut().take();
            if let Some(listener) = taken {
                listener.failed(format!("{} event", event.type_()));
            }
        });
        script.set_onload(Some(on_load.unchecked_ref()));
        script.set_onerror(Some(on_error.unchecked_ref()));

        script.set_src(src.as_str());
        self.mount_point()?
            .append_child(&script)
            .map_err(|e| host_error("appendChild", e))?;
        Ok(())
    }
}
