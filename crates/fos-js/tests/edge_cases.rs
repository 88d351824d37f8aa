//! Edge case tests for fos-js
//!
//! Evaluation, error reporting and context lifetime at the boundaries.

use fos_js::*;
use std::cell::RefCell;
use std::rc::Rc;

fn context_with_log() -> (ScriptContext, Rc<RefCell<Vec<ScriptException>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let context = ScriptContext::new(
        11,
        ScriptConfig::default(),
        move |_, e: &ScriptException| sink.borrow_mut().push(e.clone()),
        None,
    )
    .unwrap();
    (context, log)
}

// ============================================================================
// EVALUATION EDGE CASES
// ============================================================================

#[test]
fn test_empty_and_comment_sources() {
    assert_eq!(eval("").unwrap(), JsValue::Undefined);
    assert_eq!(eval("   \n\t  ").unwrap(), JsValue::Undefined);
    assert_eq!(eval("// just a comment").unwrap(), JsValue::Undefined);
    assert_eq!(eval("/* block */").unwrap(), JsValue::Undefined);
}

#[test]
fn test_completion_value_kinds() {
    assert_eq!(eval("var a = 1; var b = 2; a + b").unwrap(), JsValue::Number(3.0));
    assert_eq!(eval("''").unwrap(), JsValue::String(String::new()));
    assert_eq!(eval("null").unwrap(), JsValue::Null);
    assert_eq!(eval("[]").unwrap(), JsValue::Array);
    assert_eq!(eval("({a: {b: 1}})").unwrap(), JsValue::Object);
    assert_eq!(eval("(() => 42)").unwrap(), JsValue::Function);
}

#[test]
fn test_special_numbers() {
    match eval("NaN").unwrap() {
        JsValue::Number(n) => assert!(n.is_nan()),
        other => panic!("Expected NaN, got {other:?}"),
    }
    assert_eq!(eval("-Infinity").unwrap(), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("Number.MAX_SAFE_INTEGER").unwrap(), JsValue::Number(9007199254740991.0));
}

#[test]
fn test_unicode_round_trip() {
    assert_eq!(
        eval("'Hello 世界 🌍'").unwrap(),
        JsValue::String("Hello 世界 🌍".into())
    );
}

#[test]
fn test_lone_surrogate_in_utf16_source() {
    let (context, _) = context_with_log();
    let mut source: Vec<u16> = "'a".encode_utf16().collect();
    source.push(0xD800);
    source.extend("b'".encode_utf16());
    assert_eq!(
        context.evaluate_script_utf16(&source, "test://lone.js", 1).unwrap(),
        JsValue::String("a\u{FFFD}b".into())
    );
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[test]
fn test_syntax_errors_are_reported() {
    let (context, log) = context_with_log();
    for source in ["(1 + 2", "{ var x = 1", "function { }"] {
        assert!(matches!(
            context.evaluate_script(source, "test://syntax.js", 1),
            Err(JsError::Exception(_))
        ));
    }
    let log = log.borrow();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|e| e.name.as_deref() == Some("SyntaxError")));
}

#[test]
fn test_reference_and_type_errors() {
    let (context, log) = context_with_log();
    assert!(context.evaluate_script("undefinedVariable", "a.js", 1).is_err());
    assert!(context.evaluate_script("var x = 5; x()", "b.js", 1).is_err());

    let log = log.borrow();
    assert_eq!(log[0].name.as_deref(), Some("ReferenceError"));
    assert_eq!(log[0].source_url, "a.js");
    assert_eq!(log[1].name.as_deref(), Some("TypeError"));
    assert_eq!(log[1].source_url, "b.js");
}

#[test]
fn test_caught_exception_is_not_reported() {
    let (context, log) = context_with_log();
    let result = context
        .evaluate_script(
            "try { throw new Error('inner') } catch (e) { 'caught: ' + e.message }",
            "test://caught.js",
            1,
        )
        .unwrap();
    assert_eq!(result, JsValue::String("caught: inner".into()));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_exception_display() {
    let (context, _) = context_with_log();
    let Err(JsError::Exception(e)) = context.evaluate_script("throw new RangeError('bad')", "test://r.js", 1) else {
        panic!("Expected exception");
    };
    assert_eq!(e.to_string(), "RangeError: bad (test://r.js)");
}

#[test]
fn test_context_survives_exception() {
    let (context, _) = context_with_log();
    context.evaluate_script("var kept = 'yes'", "one.js", 1).unwrap();
    assert!(context.evaluate_script("throw 1", "two.js", 1).is_err());
    assert_eq!(
        context.evaluate_script("kept", "three.js", 1).unwrap(),
        JsValue::String("yes".into())
    );
}

// ============================================================================
// CONTEXT LIFETIME
// ============================================================================

#[test]
fn test_globals_persist_between_evaluations() {
    let (context, _) = context_with_log();
    context.set_global("flag", &JsValue::Bool(true)).unwrap();
    context.evaluate_script("var total = flag ? 10 : 0", "set.js", 1).unwrap();
    assert_eq!(context.get_global("total").unwrap(), JsValue::Number(10.0));
    assert_eq!(context.get_global("missing").unwrap(), JsValue::Undefined);
}

#[test]
fn test_console_all_levels() {
    let (context, log) = context_with_log();
    context
        .evaluate_script(
            "console.log('log', 1, true, null, undefined); console.info({a: 1}); \
             console.warn([1, 2]); console.error(function f() {}); console.debug('d')",
            "console.js",
            1,
        )
        .unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_console_can_be_left_out() {
    let context = ScriptContext::new(1, ScriptConfig::default().without_console(), |_, _| {}, None).unwrap();
    assert_eq!(
        context.evaluate_script("typeof console", "c.js", 1).unwrap(),
        JsValue::String("undefined".into())
    );
}

#[test]
fn test_drop_without_teardown() {
    let (context, _) = context_with_log();
    context.intern("left behind").unwrap();
    drop(context);
}

// ============================================================================
// STRESS TESTS
// ============================================================================

#[test]
fn test_stress_many_evaluations() {
    let (context, _) = context_with_log();
    for i in 0..100 {
        let result = context.evaluate_script(&format!("{i} + {i}"), "loop.js", 1).unwrap();
        assert_eq!(result, JsValue::Number((i * 2) as f64));
    }
}

#[test]
fn test_stress_large_string() {
    let code = format!("'{}'", "x".repeat(10000));
    match eval(&code).unwrap() {
        JsValue::String(s) => assert_eq!(s.len(), 10000),
        other => panic!("Expected string, got {other:?}"),
    }
}

#[test]
fn test_stress_deep_recursion() {
    let result = eval("function deep(n) { return n <= 0 ? 0 : 1 + deep(n - 1); } deep(100)").unwrap();
    assert_eq!(result, JsValue::Number(100.0));
}

#[test]
fn test_runaway_recursion_is_an_exception() {
    let (context, log) = context_with_log();
    assert!(context.evaluate_script("function f() { return f(); } f()", "deep.js", 1).is_err());
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(context.evaluate_script("2", "after.js", 1).unwrap(), JsValue::Number(2.0));
}

#[test]
fn test_stress_many_interned_strings() {
    let (context, _) = context_with_log();
    for i in 0..500 {
        context.intern(&format!("s{i}")).unwrap();
    }
    assert_eq!(context.interned_count(), 500);
    let strings = context.interned_strings().unwrap();
    assert_eq!(strings.first().map(String::as_str), Some("s0"));
    assert_eq!(strings.last().map(String::as_str), Some("s499"));
    context.teardown();
    assert_eq!(context.interned_count(), 0);
}
