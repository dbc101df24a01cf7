//! Signal Behaviour Tests
//!
//! These tests drive source, pull and push signals through the public API:
//! lazy recomputation, disconnecting, unresolved paths, calling rules and
//! circular dependencies.

use std::sync::{Arc, Mutex};

use serde_json::json;
use trellis_core::{
    Component, ComponentClass, ConnectionState, Error, ErrorKind, Inputs, Loop, Signal, SignalDecl,
    SignalMode, Value,
};

type Log = Arc<Mutex<Vec<Value>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<Value> {
    log.lock().unwrap().clone()
}

/// Read `signal` and append its value. The read may run an evaluator that
/// logs too, so it happens before the log is locked.
fn log_read(log: &Log, signal: &Signal) {
    let value = signal.get().unwrap().unwrap();
    log.lock().unwrap().push(value);
}

fn stringify(inputs: &Inputs<'_>) -> trellis_core::Result<Value> {
    Ok(match inputs.explicit() {
        Some(Value::String(s)) => json!(s),
        Some(other) => json!(other.to_string()),
        None => Value::Null,
    })
}

/// A person whose full name is derived lazily; every evaluation logs `""`.
fn name_class(log: &Log) -> Arc<ComponentClass> {
    let log = Arc::clone(log);
    ComponentClass::builder("Name")
        .signal(
            SignalDecl::input("first_name")
                .with_default(json!("john"))
                .evaluate(stringify),
        )
        .signal(
            SignalDecl::input("last_name")
                .with_default(json!("doe"))
                .evaluate(stringify),
        )
        .signal(
            SignalDecl::pull("full_name", ["first_name", "last_name"]).evaluate(move |inputs| {
                log.lock().unwrap().push(json!(""));
                Ok(json!(format!("{} {}", inputs.str(0)?, inputs.str(1)?)))
            }),
        )
        .build()
        .unwrap()
}

/// A title with a derived length and a push observer logging it.
fn title_class(log: &Log) -> Arc<ComponentClass> {
    let log = Arc::clone(log);
    ComponentClass::builder("Title")
        .signal(SignalDecl::input("title").with_default(json!("")))
        .signal(SignalDecl::pull("title_len", ["title"]).evaluate(|inputs| {
            let title = inputs.str(0)?;
            Ok(json!(title.chars().count()))
        }))
        .signal(SignalDecl::push("show_title", ["title_len"]).evaluate(move |inputs| {
            log.lock().unwrap().push(inputs.value(0)?.clone());
            Ok(Value::Null)
        }))
        .build()
        .unwrap()
}

fn passthrough(inputs: &Inputs<'_>) -> trellis_core::Result<Value> {
    Ok(inputs.get(0).cloned().unwrap_or(Value::Null))
}

fn unconnected_class() -> Arc<ComponentClass> {
    ComponentClass::builder("Unconnected")
        .signal(SignalDecl::input("s0").with_default(json!("")))
        .signal(SignalDecl::pull("s1", ["nope"]).evaluate(passthrough))
        .signal(SignalDecl::pull("s2", ["button.title"]).evaluate(passthrough))
        .signal(SignalDecl::pull("s3", ["s2"]).evaluate(passthrough))
        .signal(SignalDecl::push("s4", ["s3"]).evaluate(passthrough))
        .build()
        .unwrap()
}

fn signal_types_class() -> Arc<ComponentClass> {
    ComponentClass::builder("SignalTypes")
        .signal(SignalDecl::input("s1"))
        .signal(SignalDecl::source("s2"))
        .signal(SignalDecl::pull("s3", ["s2"]).evaluate(passthrough))
        .signal(SignalDecl::push("s4", ["s2"]).evaluate(passthrough))
        .build()
        .unwrap()
}

#[test]
fn pull_signal_recomputes_only_when_read_and_stale() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();
    let full_name = name.signal("full_name").unwrap();

    log_read(&log, &full_name);
    name.signal("first_name").unwrap().set(json!("almar")).unwrap();
    name.signal("last_name").unwrap().set(json!("klein")).unwrap();
    log_read(&log, &full_name);
    name.signal("first_name").unwrap().set(json!("jorik")).unwrap();
    log_read(&log, &full_name);

    assert_eq!(
        entries(&log),
        [json!(""), json!("john doe"), json!(""), json!("almar klein"), json!(""), json!("jorik klein")]
    );
}

#[test]
fn reading_twice_does_not_recompute() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();

    name.get("full_name").unwrap();
    name.get("full_name").unwrap();
    assert_eq!(entries(&log).len(), 1);
}

#[test]
fn disconnected_pull_signal_reconnects_on_read() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();
    let full_name = name.signal("full_name").unwrap();
    let first_name = name.signal("first_name").unwrap();

    log_read(&log, &full_name);

    full_name.disconnect();
    assert!(full_name.not_connected().is_some());
    first_name.call(&[json!("almar")]).unwrap();
    first_name.call(&[json!("jorik")]).unwrap();
    first_name.call(&[json!("jane")]).unwrap();

    log_read(&log, &full_name);
    assert!(full_name.not_connected().is_none());

    assert_eq!(
        entries(&log),
        [json!(""), json!("john doe"), json!(""), json!("jane doe")]
    );
}

#[test]
fn signal_cells_keep_timestamps_and_last_values() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();
    let full_name = name.signal("full_name").unwrap();

    assert_eq!(full_name.timestamp(), 0);
    assert!(full_name.value().is_none());

    full_name.get().unwrap();
    assert!(full_name.timestamp() > 0);
    assert_eq!(full_name.last_timestamp(), 0);
    assert_eq!(full_name.value(), Some(json!("john doe")));
    assert!(full_name.last_value().is_none());

    name.signal("first_name").unwrap().set(json!("jane")).unwrap();
    full_name.get().unwrap();
    assert!(full_name.last_timestamp() > 0);
    assert_eq!(full_name.last_value(), Some(json!("john doe")));

    let cell = full_name.cell();
    assert_eq!(cell.name(), "full_name");
    assert_eq!(cell.value(), Some(&json!("jane doe")));
}

#[test]
fn plain_attributes_coexist_with_protected_signals() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();

    name.set_attr("eggs", json!(2)).unwrap();
    assert_eq!(name.attr("eggs").unwrap().as_value(), Some(&json!(2)));

    let err = name.set_attr("first_name", json!(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Access);
    assert_eq!(name.get("first_name").unwrap(), Some(json!("john")));
}

#[test]
fn signal_names_are_sorted() {
    let log = log();
    let lp = Loop::new();
    let name = Component::new(&name_class(&log), &lp).unwrap();
    assert_eq!(name.signal_names(), ["first_name", "full_name", "last_name"]);
}

#[test]
fn push_signal_runs_on_every_flush_after_a_change() {
    let log = log();
    let lp = Loop::new();
    let foo = Component::new(&title_class(&log), &lp).unwrap();
    let title = foo.signal("title").unwrap();

    lp.iterate().unwrap();
    title.call(&[json!("xx")]).unwrap();
    lp.iterate().unwrap();
    title.call(&[json!("xxxx")]).unwrap();
    lp.iterate().unwrap();

    assert_eq!(entries(&log), [json!(0), json!(2), json!(4)]);
    assert!(foo.signal("show_title").unwrap().not_connected().is_none());
}

#[test]
fn push_signal_batches_changes_until_the_flush() {
    let log = log();
    let lp = Loop::new();
    let foo = Component::new(&title_class(&log), &lp).unwrap();
    let title = foo.signal("title").unwrap();

    lp.iterate().unwrap();
    title.set(json!("a")).unwrap();
    title.set(json!("abc")).unwrap();
    lp.iterate().unwrap();

    assert_eq!(entries(&log), [json!(0), json!(3)]);
}

#[test]
fn disconnected_push_signal_reconnects_at_once() {
    let log = log();
    let lp = Loop::new();
    let s = Component::new(&title_class(&log), &lp).unwrap();
    let show_title = s.signal("show_title").unwrap();
    lp.iterate().unwrap();

    show_title.disconnect();
    assert_eq!(show_title.connection(), ConnectionState::Connected);
    lp.iterate().unwrap();

    s.signal("title").unwrap().set(json!("xx")).unwrap();
    lp.iterate().unwrap();

    assert_eq!(entries(&log), [json!(0), json!(0), json!(2)]);
}

#[test]
fn unconnected_signals_report_why() {
    let lp = Loop::new();
    let s = Component::new(&unconnected_class(), &lp).unwrap();

    assert!(s.signal("s0").unwrap().not_connected().is_none());
    assert_eq!(
        s.signal("s1").unwrap().not_connected().unwrap(),
        "signal 'nope' does not exist."
    );
    assert!(s
        .signal("s2")
        .unwrap()
        .not_connected()
        .unwrap()
        .starts_with("signal 'button.title' does not exist."));
}

#[test]
fn reading_through_an_unconnected_signal_fails() {
    let lp = Loop::new();
    let s = Component::new(&unconnected_class(), &lp).unwrap();

    assert!(s.signal("s2").unwrap().not_connected().is_some());
    assert!(s.signal("s3").unwrap().not_connected().is_none());

    let err = s.get("s2").unwrap_err();
    assert!(matches!(err, Error::Unresolved { .. }));
    assert_eq!(err.kind(), ErrorKind::Resolution);

    let err = s.get("s3").unwrap_err();
    assert!(matches!(err, Error::UpstreamNotConnected { ref upstream, .. } if upstream == "s2"));

    let err = s.get("s4").unwrap_err();
    assert!(matches!(err, Error::UpstreamNotConnected { ref upstream, .. } if upstream == "s3"));
    assert_eq!(err.kind(), ErrorKind::Propagation);
}

#[test]
fn unconnected_push_signal_is_skipped_by_the_loop() {
    let lp = Loop::new();
    let _s = Component::new(&unconnected_class(), &lp).unwrap();

    let report = lp.iterate().unwrap();
    assert_eq!(report.reactions_skipped, 1);
    assert_eq!(report.reactions_run, 0);
}

#[test]
fn assigning_the_missing_attribute_connects_the_path() {
    let lp = Loop::new();
    let s = Component::new(&unconnected_class(), &lp).unwrap();
    let button = Component::new(&title_class(&log()), &lp).unwrap();
    let mut seen = Vec::new();

    s.set_attr("button", &button).unwrap();
    button.signal("title").unwrap().set(json!("ha")).unwrap();
    seen.push(s.get("s4").unwrap().unwrap());

    // Removing the attribute keeps the established binding
    s.del_attr("button").unwrap();
    button.signal("title").unwrap().set(json!("ho")).unwrap();
    seen.push(s.get("s4").unwrap().unwrap());

    // An explicit disconnect breaks it
    s.signal("s2").unwrap().disconnect();
    assert!(s.get("s4").is_err());

    assert_eq!(seen, [json!("ha"), json!("ho")]);
}

#[test]
fn only_inputs_accept_call_arguments() {
    let lp = Loop::new();
    let s = Component::new(&signal_types_class(), &lp).unwrap();
    let (s1, s2, s3, s4) = (
        s.signal("s1").unwrap(),
        s.signal("s2").unwrap(),
        s.signal("s3").unwrap(),
        s.signal("s4").unwrap(),
    );

    s1.call(&[json!("foo")]).unwrap();
    s1.set(json!("foo")).unwrap();
    s2.set(json!("foo")).unwrap();

    let mut failed = Vec::new();
    for signal in [&s2, &s3, &s4] {
        if let Err(err) = signal.call(&[json!("foo")]) {
            assert!(matches!(err, Error::UnsupportedCall { .. }));
            failed.push(signal.name().to_string());
        }
    }
    for signal in [&s3, &s4] {
        if let Err(err) = signal.set(json!("foo")) {
            assert_eq!(err.kind(), ErrorKind::Access);
            failed.push(signal.name().to_string());
        }
    }
    assert_eq!(failed, ["s2", "s3", "s4", "s3", "s4"]);

    assert!(s1.call(&[json!(1), json!(2)]).is_err());
    assert_eq!(s3.mode(), SignalMode::Pull);
}

#[test]
fn inputs_without_default_start_unset() {
    let lp = Loop::new();
    let s = Component::new(&signal_types_class(), &lp).unwrap();
    let s1 = s.signal("s1").unwrap();

    assert_eq!(s1.call(&[]).unwrap(), None);
    s1.call(&[json!("foo")]).unwrap();
    s.signal("s2").unwrap().set(json!("bar")).unwrap();

    assert_eq!(s1.call(&[]).unwrap(), Some(json!("foo")));
    assert_eq!(s.get("s2").unwrap(), Some(json!("bar")));
    assert_eq!(s.get("s3").unwrap(), Some(json!("bar")));
}

fn add_one(inputs: &Inputs<'_>) -> trellis_core::Result<Value> {
    Ok(json!(inputs.i64(0)? + 1))
}

fn circular_class() -> Arc<ComponentClass> {
    circular_class_with(SignalDecl::pull("s3", ["s2"]))
}

fn circular_class_with(s3: SignalDecl) -> Arc<ComponentClass> {
    ComponentClass::builder("Circular")
        .signal(
            SignalDecl::input("s1")
                .with_default(json!(10))
                .depends_on(["s3"])
                .evaluate(|inputs| match inputs.get(0) {
                    Some(v3) if inputs.from_upstream() => {
                        let v3 = v3.as_i64().ok_or_else(|| Error::custom("s3 is not a number"))?;
                        Ok(json!(v3 + 1))
                    }
                    _ => Ok(inputs.explicit().cloned().unwrap_or(Value::Null)),
                }),
        )
        .signal(SignalDecl::pull("s2", ["s1"]).evaluate(add_one))
        .signal(s3.evaluate(add_one))
        .build()
        .unwrap()
}

#[test]
fn three_node_cycle_settles_in_one_pass() {
    let lp = Loop::new();
    let s = Component::new(&circular_class(), &lp).unwrap();
    let read = |name: &str| s.get(name).unwrap().unwrap();

    assert_eq!([read("s1"), read("s2"), read("s3")], [json!(10), json!(11), json!(12)]);

    s.signal("s1").unwrap().call(&[json!(2)]).unwrap();
    assert_eq!([read("s1"), read("s2"), read("s3")], [json!(2), json!(3), json!(4)]);
}

#[test]
fn cycle_with_a_push_member_converges_per_flush() {
    let lp = Loop::new();
    let s = Component::new(&circular_class_with(SignalDecl::push("s3", ["s2"])), &lp).unwrap();
    let signals = ["s1", "s2", "s3"].map(|name| s.signal(name).unwrap());
    let cached = || signals.iter().map(|signal| signal.value()).collect::<Vec<_>>();

    lp.iterate().unwrap();
    assert_eq!(cached(), [Some(json!(10)), Some(json!(11)), Some(json!(12))]);

    signals[0].set(json!(2)).unwrap();
    lp.iterate().unwrap();
    assert_eq!(cached(), [Some(json!(2)), Some(json!(3)), Some(json!(4))]);

    // Settled: nothing left to recompute
    let report = lp.iterate().unwrap();
    assert!(report.is_idle());
    assert_eq!(report.reactions_run, 0);
    assert!(!lp.has_pending());
}

fn temperature_class() -> Arc<ComponentClass> {
    fn converter(offset: i64) -> impl Fn(&Inputs<'_>) -> trellis_core::Result<Value> {
        move |inputs| match inputs.get(0) {
            Some(other) => {
                let other = other.as_i64().ok_or_else(|| Error::custom("not a number"))?;
                Ok(json!(other + offset))
            }
            None => Ok(inputs.explicit().cloned().unwrap_or(Value::Null)),
        }
    }
    ComponentClass::builder("Temperature")
        .signal(
            SignalDecl::input("c")
                .with_default(json!(32))
                .depends_on(["f"])
                .evaluate(converter(-32)),
        )
        .signal(
            SignalDecl::input("f")
                .with_default(json!(0))
                .depends_on(["c"])
                .evaluate(converter(32)),
        )
        .build()
        .unwrap()
}

#[test]
fn two_node_cycle_follows_the_last_write() {
    let lp = Loop::new();
    let s = Component::new(&temperature_class(), &lp).unwrap();
    let read = |name: &str| s.get(name).unwrap().unwrap();

    assert_eq!([read("c"), read("f")], [json!(32), json!(0)]);

    s.signal("c").unwrap().call(&[json!(10)]).unwrap();
    assert_eq!([read("c"), read("f")], [json!(10), json!(42)]);

    s.signal("f").unwrap().call(&[json!(10)]).unwrap();
    assert_eq!([read("c"), read("f")], [json!(-22), json!(10)]);
}
