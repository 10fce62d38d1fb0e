//! Host bridge conversions, seen from the host.

extern crate jscore;

use jscore::runner::bridge::HostObject;
use jscore::{Context, HostValue, JErrorType};

#[test]
fn test_primitives_round_trip() {
    let mut context = Context::new();
    let values = vec![
        HostValue::Undefined,
        HostValue::Null,
        HostValue::Boolean(true),
        HostValue::Number(-0.5),
        HostValue::Number(f64::INFINITY),
        HostValue::from("héllo ✓"),
    ];
    for value in values {
        context.set_global("v", value.clone()).unwrap();
        assert_eq!(context.get_global("v").unwrap(), value);
    }
    context.set_global("v", HostValue::Number(f64::NAN)).unwrap();
    assert!(context.eval("isNaN(v)").unwrap().as_bool().unwrap());
}

#[test]
fn test_objects_convert_structurally() {
    let mut context = Context::new();
    let result = context.eval("({ name: 'box', size: [1, 2], inner: { ok: true } })").unwrap();
    let object = result.as_object().unwrap();
    assert_eq!(object.keys(), vec!["name", "size", "inner"]);
    assert_eq!(object.get("name"), Some(&HostValue::from("box")));
    let size = object.get("size").and_then(|v| v.as_array()).unwrap();
    assert_eq!(size.elements(), &[HostValue::from(1), HostValue::from(2)]);
    let inner = object.get("inner").and_then(|v| v.as_object()).unwrap();
    assert_eq!(inner.get("ok"), Some(&HostValue::Boolean(true)));
}

#[test]
fn test_independent_objects_are_not_equal() {
    let mut context = Context::new();
    let a = context.eval("({})").unwrap();
    let b = context.eval("({})").unwrap();
    assert_ne!(a, b);

    context.eval("var same = {};").unwrap();
    let first = context.get_global("same").unwrap();
    let second = context.get_global("same").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_host_objects_map_back_to_the_same_script_object() {
    let mut context = Context::new();
    let object = context.eval("var original = { n: 1 }; original").unwrap();
    context.set_global("returned", object).unwrap();
    assert_eq!(context.eval("returned === original").unwrap(), HostValue::Boolean(true));
}

#[test]
fn test_host_built_object() {
    let mut context = Context::new();
    let object = HostObject::from_entries(vec![
        ("x", HostValue::from(3)),
        ("y", HostValue::from(4)),
    ]);
    context.set_global("point", HostValue::Object(object)).unwrap();
    assert_eq!(context.eval("Math.hypot(point.x, point.y)").unwrap(), HostValue::Number(5.0));
}

#[test]
fn test_shared_host_children_stay_aliased() {
    let mut context = Context::new();
    let child = HostValue::Object(HostObject::new());
    let pair = HostValue::from(vec![child.clone(), child]);
    context.set_global("pair", pair).unwrap();
    assert_eq!(context.eval("pair[0] === pair[1]").unwrap(), HostValue::Boolean(true));
}

#[test]
fn test_cycles_fail_with_conversion_error() {
    let mut context = Context::new();
    let result = context.eval("var a = {}; a.self = a; a");
    assert_eq!(
        result,
        Err(JErrorType::ConversionError("Converting circular structure".to_string()))
    );
    // Shared but acyclic structure is fine.
    let result = context.eval("var leaf = {}; [leaf, leaf, { inner: leaf }]").unwrap();
    let elements = result.as_array().unwrap().elements().to_vec();
    assert_eq!(elements[0], elements[1]);
}

#[test]
fn test_functions_become_tokens() {
    let mut context = Context::new();
    let value = context.eval("function named() {} named").unwrap();
    let token = value.as_function().unwrap();
    assert_eq!(token.name(), "named");
    assert_eq!(token.realm(), context.id());
    assert!(value.check_cloneable().is_err());
}

#[test]
fn test_display() {
    let mut context = Context::new();
    assert_eq!(context.eval("[1, 'a', null]").unwrap().to_string(), "1,a,");
    assert_eq!(context.eval("1/0").unwrap().to_string(), "Infinity");
    assert_eq!(context.eval("({})").unwrap().to_string(), "[object Object]");
}
