//! End-to-end load scenarios driven through `MemoryHost`.

use std::cell::RefCell;
use std::rc::Rc;

use bust_core::{FixedClock, LogLevel};
use bust_loader::{
    LoadError, LoadHandle, LoadOptions, LoadPhase, Loader, MemoryHost, RecordingObserver,
};
use bust_observability::LoadLogger;
use futures::executor::block_on;

fn token_of(src: &str) -> &str {
    src.split_once("cacheBuster=")
        .map(|(_, token)| token)
        .unwrap_or_default()
}

#[test]
fn first_load_injects_one_tokened_script() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());

    let mut handle = loader.load_default("/modules/bustMe.js");

    let inserted = host.inserted();
    assert_eq!(inserted.len(), 1);
    let src = inserted[0].src.as_str();
    assert!(src.starts_with("https://shop.test/modules/bustMe.js?cacheBuster="));
    let token = token_of(src);
    assert_eq!(token.len(), 13);
    assert!(token.chars().all(|c| c.is_ascii_digit()));

    assert!(handle.try_take().is_none());
    host.settle_loaded(0);
    assert!(block_on(handle).unwrap().is_none());
}

#[test]
fn second_load_after_success_resolves_immediately() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let logger = LoadLogger::new().with_capture();
    let loader = Loader::builder(host.clone())
        .logger(logger.clone())
        .build();

    let first = loader.load_default("/modules/bustMe.js");
    host.settle_loaded(0);
    block_on(first).unwrap();

    let mut second = loader.load_default("/modules/bustMe.js");
    assert_eq!(host.insert_count(), 1);
    assert!(matches!(second.try_take(), Some(Ok(None))));

    let warnings: Vec<_> = logger
        .captured()
        .into_iter()
        .filter(|e| e.level == LogLevel::Warn)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].module.as_deref(), Some("bustMe"));
}

#[test]
fn failure_runs_hook_once_then_rejects_with_same_error() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());
    let seen: Rc<RefCell<Vec<LoadError>>> = Rc::default();

    let sink = seen.clone();
    let handle = loader.load(
        "/x/missing.v2.js",
        LoadOptions::new().on_error(move |err, _: Option<&mut ()>| sink.borrow_mut().push(err.clone())),
        None,
    );
    host.settle_failed(0, "404 Not Found");

    let failure = block_on(handle).unwrap_err();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], failure.error);
    assert!(matches!(
        &failure.error,
        LoadError::LoadFailure { url, reason }
            if url.starts_with("https://shop.test/x/missing.v2.js?cacheBuster=") && reason == "404 Not Found"
    ));
    assert!(!loader.is_loaded("missing"));
}

#[test]
fn tokens_increase_across_injections() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::builder(host.clone())
        .clock(FixedClock::new(1_700_000_000_000))
        .build();

    for _ in 0..3 {
        let handle = loader.load_default("/modules/flaky.js");
        host.settle_failed(host.insert_count() - 1, "reset");
        assert!(block_on(handle).is_err());
    }
    let _ = loader.load_default("/modules/other.js");

    let tokens: Vec<u64> = host
        .inserted()
        .iter()
        .map(|r| token_of(r.src.as_str()).parse().unwrap())
        .collect();
    assert_eq!(tokens.len(), 4);
    assert!(tokens.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn binding_context_reaches_hook_and_comes_back() {
    #[derive(Debug, Default)]
    struct Widget {
        errors: Vec<String>,
    }

    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());

    let handle = loader.load(
        "/widgets/carousel.js",
        LoadOptions::new().on_error(|err, widget: Option<&mut Widget>| {
            if let Some(widget) = widget {
                widget.errors.push(err.to_string());
            }
        }),
        Some(Widget::default()),
    );
    host.settle_failed(0, "parse error");

    let failure = block_on(handle).unwrap_err();
    let widget = failure.context.unwrap();
    assert_eq!(widget.errors.len(), 1);
    assert!(widget.errors[0].ends_with("parse error"));

    let handle = loader.load("/widgets/carousel.js", LoadOptions::new(), Some(Widget::default()));
    host.settle_loaded(1);
    assert!(block_on(handle).unwrap().is_some());
}

#[test]
fn malformed_locator_goes_through_hook() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());
    let hooked = Rc::new(RefCell::new(false));

    let flag = hooked.clone();
    let handle = loader.load(
        "/modules/",
        LoadOptions::new().on_error(move |_, _: Option<&mut ()>| *flag.borrow_mut() = true),
        None,
    );

    let failure = block_on(handle).unwrap_err();
    assert!(*hooked.borrow());
    assert!(matches!(failure.error, LoadError::MalformedLocator { .. }));
    assert_eq!(host.insert_count(), 0);
}

#[test]
fn lifecycle_for_dedup_path() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let observer = RecordingObserver::new();
    let loader = Loader::builder(host.clone())
        .observer(observer.clone())
        .build();

    let first = loader.load_default("/modules/cart.js");
    host.settle_loaded(0);
    block_on(first).unwrap();
    block_on(loader.load_default("/modules/cart.js")).unwrap();

    let phases = observer.phases_for("cart");
    assert_eq!(phases.last(), Some(&LoadPhase::Deduplicated));
    assert_eq!(observer.injection_count(), 1);
}

#[test]
fn log_entries_are_json() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let logger = LoadLogger::new()
        .with_min_level(LogLevel::Debug)
        .with_capture();
    let loader = Loader::builder(host.clone()).logger(logger.clone()).build();

    let handle = loader.load_default("/modules/cart.js");
    host.settle_failed(0, "blocked");
    let _ = block_on(handle);

    let entries = logger.captured();
    let error = entries.iter().find(|e| e.level == LogLevel::Error).unwrap();
    let json: serde_json::Value = serde_json::from_str(&error.to_json()).unwrap();
    assert_eq!(json["module"], "cart");
    assert!(json["error"].as_str().unwrap().contains("blocked"));
    assert!(entries.iter().any(|e| e.level == LogLevel::Debug));
}

#[test]
fn duplicate_load_hands_back_context() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());

    let first = loader.load("/modules/cart.js", LoadOptions::new(), Some("header"));
    assert!(host.settle_last_loaded());
    assert_eq!(block_on(first).unwrap(), Some("header"));

    let mut second = loader.load("/modules/cart.js", LoadOptions::new(), Some("footer"));
    assert_eq!(host.insert_count(), 1);
    assert!(matches!(second.try_take(), Some(Ok(Some("footer")))));
    assert!(!host.settle_last_loaded());
}

#[test]
fn hook_runs_before_handle_sees_rejection() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());
    let slot: Rc<RefCell<Option<LoadHandle<()>>>> = Rc::default();
    let order: Rc<RefCell<Vec<&str>>> = Rc::default();

    let (handle_slot, log) = (slot.clone(), order.clone());
    let handle = loader.load(
        "/modules/cart.js",
        LoadOptions::new().on_error(move |_, _: Option<&mut ()>| {
            let mut handle = handle_slot.borrow_mut();
            if handle.as_mut().unwrap().try_take().is_none() {
                log.borrow_mut().push("hook, handle unsettled");
            }
        }),
        None,
    );
    *slot.borrow_mut() = Some(handle);

    host.settle_failed(0, "timeout");
    let handle = slot.borrow_mut().take().unwrap();
    assert!(block_on(handle).is_err());
    assert_eq!(*order.borrow(), vec!["hook, handle unsettled"]);
}

#[test]
fn discarded_script_abandons_and_retries() {
    let host = MemoryHost::new("https://shop.test/").unwrap();
    let loader = Loader::new(host.clone());

    let first = loader.load_default("/modules/cart.js");
    let joined = loader.load_default("/modules/cart.js");
    assert_eq!(host.unsettled_count(), 1);

    assert!(host.discard(0));
    assert_eq!(host.unsettled_count(), 0);
    for handle in [first, joined] {
        let failure = block_on(handle).unwrap_err();
        assert!(matches!(failure.error, LoadError::Abandoned { .. }));
    }
    assert!(!loader.is_pending("cart"));

    let retry = loader.load_default("/modules/cart.js");
    assert_eq!(host.insert_count(), 2);
    assert_eq!(host.unsettled_count(), 1);
    assert!(host.settle_last_loaded());
    assert!(block_on(retry).is_ok());
    assert!(loader.is_loaded("cart"));
}
