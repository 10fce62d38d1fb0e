//! Language semantics, evaluated end to end through a `Context`.

extern crate jscore;

use jscore::{Context, ContextConfig, HostValue, JErrorType};

/// Run `code` on a fresh context and return its completion value.
fn run_js(code: &str) -> Result<HostValue, JErrorType> {
    Context::new().eval(code)
}

fn number(code: &str) -> f64 {
    match run_js(code) {
        Ok(HostValue::Number(n)) => n,
        other => panic!("expected a number from {:?}, got {:?}", code, other),
    }
}

fn string(code: &str) -> String {
    match run_js(code) {
        Ok(HostValue::String(s)) => s,
        other => panic!("expected a string from {:?}, got {:?}", code, other),
    }
}

fn boolean(code: &str) -> bool {
    match run_js(code) {
        Ok(HostValue::Boolean(b)) => b,
        other => panic!("expected a boolean from {:?}, got {:?}", code, other),
    }
}

// ============================================================================
// Arithmetic and operators
// ============================================================================

#[test]
fn test_ieee_division() {
    assert_eq!(number("1/0"), f64::INFINITY);
    assert_eq!(number("-1/0"), f64::NEG_INFINITY);
    assert!(number("0/0").is_nan());
    assert_eq!(number("7 % 3"), 1.0);
    assert_eq!(number("2 ** 10"), 1024.0);
    assert_eq!(number("2 ** 3 ** 2"), 512.0);
}

#[test]
fn test_precedence() {
    assert_eq!(number("1 + 2 * 3"), 7.0);
    assert_eq!(number("(1 + 2) * 3"), 9.0);
    assert_eq!(number("10 - 4 - 3"), 3.0);
}

#[test]
fn test_plus_concatenates_with_strings() {
    assert_eq!(string("'a' + 'b'"), "ab");
    assert_eq!(string("1 + '2'"), "12");
    assert_eq!(string("'x' + 1 + 2"), "x12");
    assert_eq!(number("1 + 2 + '3' - 1"), 32.0);
    assert_eq!(number("true + 1"), 2.0);
}

#[test]
fn test_equality() {
    assert!(boolean("1 == '1'"));
    assert!(!boolean("1 === '1'"));
    assert!(boolean("null == undefined"));
    assert!(!boolean("null === undefined"));
    assert!(!boolean("NaN == NaN"));
    assert!(!boolean("({}) === ({})"));
    assert!(boolean("var o = {}; var p = o; o === p"));
}

#[test]
fn test_bitwise_and_shift() {
    assert_eq!(number("5 & 3"), 1.0);
    assert_eq!(number("5 | 3"), 7.0);
    assert_eq!(number("5 ^ 3"), 6.0);
    assert_eq!(number("~5"), -6.0);
    assert_eq!(number("1 << 4"), 16.0);
    assert_eq!(number("-16 >> 2"), -4.0);
    assert_eq!(number("-1 >>> 28"), 15.0);
}

#[test]
fn test_numeric_literals() {
    assert_eq!(number("0xff"), 255.0);
    assert_eq!(number("0b101"), 5.0);
    assert_eq!(number("0o17"), 15.0);
    assert_eq!(number("1.5e2"), 150.0);
}

#[test]
fn test_string_escapes() {
    assert_eq!(string(r#""a\nb""#), "a\nb");
    assert_eq!(string(r#""\x41B\u{43}""#), "ABC");
}

#[test]
fn test_logical_and_conditional() {
    assert_eq!(number("0 || 5"), 5.0);
    assert_eq!(number("3 && 4"), 4.0);
    assert_eq!(number("null ?? 8"), 8.0);
    assert_eq!(number("0 ?? 8"), 0.0);
    assert_eq!(string("1 < 2 ? 'yes' : 'no'"), "yes");
}

#[test]
fn test_typeof() {
    assert_eq!(string("typeof 1"), "number");
    assert_eq!(string("typeof 'a'"), "string");
    assert_eq!(string("typeof undefined"), "undefined");
    assert_eq!(string("typeof null"), "object");
    assert_eq!(string("typeof function () {}"), "function");
    assert_eq!(string("typeof notDeclaredAnywhere"), "undefined");
    assert_eq!(string("typeof Worker"), "function");
}

#[test]
fn test_update_and_compound_assignment() {
    assert_eq!(number("var i = 1; i++; i"), 2.0);
    assert_eq!(number("var i = 1; i++"), 1.0);
    assert_eq!(number("var i = 1; ++i"), 2.0);
    assert_eq!(number("var x = 10; x -= 3; x *= 2; x"), 14.0);
    assert_eq!(string("var s = 'a'; s += 'b'; s"), "ab");
    assert_eq!(number("var a = [1]; a[0] += 5; a[0]"), 6.0);
}

#[test]
fn test_comma_void_delete_in() {
    assert_eq!(number("(1, 2, 3)"), 3.0);
    assert_eq!(run_js("void 0").unwrap(), HostValue::Undefined);
    assert!(!boolean("var o = {a: 1}; delete o.a; 'a' in o"));
    assert!(boolean("'x' in {x: undefined}"));
}

// ============================================================================
// Bindings and scopes
// ============================================================================

#[test]
fn test_unbound_identifier_is_reference_error() {
    assert_eq!(
        run_js("doesNotExist"),
        Err(JErrorType::ReferenceError("doesNotExist is not defined".to_string()))
    );
}

#[test]
fn test_let_is_block_scoped_and_var_is_not() {
    assert_eq!(number("var x = 1; { var x = 2; } x"), 2.0);
    assert_eq!(number("let y = 1; { let y = 2; } y"), 1.0);
    assert!(matches!(
        run_js("{ let z = 1; } z"),
        Err(JErrorType::ReferenceError(_))
    ));
}

#[test]
fn test_temporal_dead_zone() {
    assert!(matches!(run_js("x; let x = 1;"), Err(JErrorType::ReferenceError(_))));
}

#[test]
fn test_const_assignment_is_type_error() {
    assert_eq!(
        run_js("const c = 1; c = 2;"),
        Err(JErrorType::TypeError("Assignment to constant variable.".to_string()))
    );
}

#[test]
fn test_hoisting() {
    assert_eq!(number("f(); function f() { return 3; }"), 3.0);
    assert_eq!(run_js("v; var v = 1;").unwrap(), HostValue::Undefined);
}

// ============================================================================
// Functions and closures
// ============================================================================

#[test]
fn test_closures_capture_their_environment() {
    let code = r#"
        function counter() {
            let n = 0;
            return function () { n += 1; return n; };
        }
        var c = counter();
        c(); c();
        c()
    "#;
    assert_eq!(number(code), 3.0);
}

#[test]
fn test_lexical_not_dynamic_scope() {
    let code = r#"
        var x = 'global';
        function read() { return x; }
        function shadow() { var x = 'local'; return read(); }
        shadow()
    "#;
    assert_eq!(string(code), "global");
}

#[test]
fn test_loop_closures_capture_each_iteration() {
    let code = r#"
        var fns = [];
        for (let i = 0; i < 3; i++) { fns.push(function () { return i; }); }
        fns[0]() + fns[1]() + fns[2]()
    "#;
    assert_eq!(number(code), 3.0);
}

#[test]
fn test_arrow_functions_and_default_parameters() {
    assert_eq!(number("const sq = x => x * x; sq(7)"), 49.0);
    assert_eq!(number("const add = (a, b = 10) => { return a + b; }; add(1)"), 11.0);
    assert_eq!(number("function f(a, b) { return b; } f(1) === undefined ? 1 : 0"), 1.0);
}

#[test]
fn test_recursion() {
    assert_eq!(number("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)"), 610.0);
}

#[test]
fn test_call_depth_limit() {
    let config = ContextConfig::default().with_max_call_depth(30);
    let mut context = Context::with_config(config);
    assert_eq!(
        context.eval("function down(n) { return down(n + 1); } down(0)"),
        Err(JErrorType::RangeError("Maximum call stack size exceeded".to_string()))
    );
    // The context stays usable afterwards.
    assert_eq!(context.eval("1 + 1").unwrap(), HostValue::Number(2.0));
}

/// Runs on a thread far smaller than the default: depth is bounded by the
/// configured limit, not by the native stack.
fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(512 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn test_recursion_up_to_the_call_depth_limit() {
    let code = "function r(n) { return n <= 0 ? 0 : 1 + r(n - 1); } ";
    let results = on_small_stack(move || {
        let mut context = Context::new();
        context.eval(code).unwrap();
        // The default limit admits 100 nested calls: r(99) down to r(0).
        (context.eval("r(99)"), context.eval("r(100)"), context.eval("r(99)"))
    });
    assert_eq!(results.0, Ok(HostValue::Number(99.0)));
    assert_eq!(
        results.1,
        Err(JErrorType::RangeError("Maximum call stack size exceeded".to_string()))
    );
    assert_eq!(results.2, Ok(HostValue::Number(99.0)));
}

#[test]
fn test_raised_call_depth_limit_does_not_overflow() {
    let config = ContextConfig::default().with_max_call_depth(1000);
    let result = on_small_stack(move || {
        let mut context = Context::with_config(config);
        context.eval("function r(n) { return n <= 0 ? 0 : 1 + r(n - 1); } r(999)")
    });
    assert_eq!(result, Ok(HostValue::Number(999.0)));
}

#[test]
fn test_calling_a_non_function_is_type_error() {
    assert!(matches!(run_js("var n = 1; n()"), Err(JErrorType::TypeError(_))));
    assert!(matches!(run_js("undefined.x"), Err(JErrorType::TypeError(_))));
}

#[test]
fn test_constructors_and_instanceof() {
    let code = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        var p = new Point(2, 3);
        p.x * p.y
    "#;
    assert_eq!(number(code), 6.0);
    assert!(boolean("function A() {} new A() instanceof A"));
    assert!(boolean("new Error('x') instanceof Error"));
    assert!(boolean("[] instanceof Array"));
}

#[test]
fn test_object_literals() {
    let code = r#"
        var k = 'dyn';
        var v = 5;
        var o = { v, [k]: 1, m() { return this.v; }, 'quoted': 2 };
        o.dyn + o.m() + o.quoted
    "#;
    assert_eq!(number(code), 8.0);
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_sum_over_array() {
    assert_eq!(number("var arr = [1, 2, 3]; let s = 0; for (let i = 0; i < arr.length; i++) s += arr[i]; s"), 6.0);
}

#[test]
fn test_out_of_bounds_index_is_undefined() {
    assert_eq!(run_js("[1, 2][5]").unwrap(), HostValue::Undefined);
    assert_eq!(run_js("[1, 2][-1]").unwrap(), HostValue::Undefined);
}

#[test]
fn test_array_growth_is_bounded() {
    let invalid = Err(JErrorType::RangeError("Invalid array length".to_string()));
    assert_eq!(run_js("var a = []; a[1e9] = 1;"), invalid);
    assert_eq!(run_js("var a = []; a.length = 1e9;"), invalid);
    assert_eq!(number("var a = []; a[99999] = 1; a.length"), 100_000.0);
    assert_eq!(number("var a = [1, 2, 3]; a.length = 1; a.length"), 1.0);
}

#[test]
fn test_astral_characters_index_as_replacement_units() {
    assert_eq!(number("'😀'.length"), 2.0);
    assert_eq!(string("'😀'[0]"), "\u{FFFD}");
    assert_eq!(number("'😀'.charCodeAt(0)"), 55357.0);
    assert_eq!(string("'a😀b'.slice(1, 3)"), "😀");
}

#[test]
fn test_while_do_while_break_continue() {
    assert_eq!(number("var i = 0; while (true) { i++; if (i > 4) break; } i"), 5.0);
    assert_eq!(number("var n = 0; do { n++; } while (n < 3); n"), 3.0);
    assert_eq!(number("var s = 0; for (var i = 0; i < 5; i++) { if (i % 2) continue; s += i; } s"), 6.0);
}

#[test]
fn test_for_in_and_for_of() {
    assert_eq!(string("var ks = ''; for (var k in {a: 1, b: 2}) ks += k; ks"), "ab");
    assert_eq!(string("var is = ''; for (var i in [7, 8]) is += i; is"), "01");
    assert_eq!(number("var t = 0; for (const x of [1, 2, 3]) t += x; t"), 6.0);
    assert_eq!(string("var r = ''; for (const c of 'abc') r = c + r; r"), "cba");
    assert!(matches!(run_js("for (const x of 5) {}"), Err(JErrorType::TypeError(_))));
}

#[test]
fn test_switch() {
    let code = r#"
        function name(n) {
            switch (n) {
                case 1: return 'one';
                case 2:
                case 3: return 'few';
                default: return 'many';
            }
        }
        name(1) + name(3) + name(9)
    "#;
    assert_eq!(string(code), "onefewmany");
    assert_eq!(number("var hits = 0; switch (2) { case 1: hits++; case 2: hits++; case 3: hits++; } hits"), 2.0);
}

#[test]
fn test_try_catch_finally() {
    assert_eq!(string("try { throw new TypeError('bad'); } catch (e) { e.name + ':' + e.message }"), "TypeError:bad");
    assert_eq!(string("try { missing; } catch (e) { e.name }"), "ReferenceError");
    assert_eq!(number("var f = 0; try { throw 1; } catch (e) { f = e; } finally { f += 10; } f"), 11.0);
    assert_eq!(number("function g() { try { return 1; } finally { order = 2; } } var order = 0; g() + order"), 3.0);
}

#[test]
fn test_uncaught_throws_reach_the_host() {
    assert_eq!(run_js("throw new RangeError('r')"), Err(JErrorType::RangeError("r".to_string())));
    assert_eq!(run_js("throw 'plain'"), Err(JErrorType::Uncaught("plain".to_string())));
    assert_eq!(run_js("throw new Error('e')"), Err(JErrorType::Uncaught("Error: e".to_string())));
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_loop_iteration_limit() {
    let config = ContextConfig::default().with_max_loop_iterations(Some(1000));
    let mut context = Context::with_config(config);
    assert!(matches!(context.eval("while (true) {}"), Err(JErrorType::ResourceExceeded(_))));
    // The budget applies per eval call.
    assert_eq!(context.eval("var i = 0; while (i < 900) i++; i").unwrap(), HostValue::Number(900.0));
}

#[test]
fn test_resource_errors_are_not_catchable() {
    let config = ContextConfig::default().with_max_loop_iterations(Some(100));
    let mut context = Context::with_config(config);
    let result = context.eval("try { for (;;) {} } catch (e) { 'caught' }");
    assert!(matches!(result, Err(JErrorType::ResourceExceeded(_))));
}

#[test]
fn test_heap_limit() {
    let config = ContextConfig::default().with_max_heap_cells(Some(200));
    let mut context = Context::with_config(config);
    let result = context.eval("var keep = []; for (var i = 0; i < 1000; i++) keep.push({});");
    assert!(matches!(result, Err(JErrorType::ResourceExceeded(_))));
}

#[test]
fn test_pure_expressions_are_idempotent() {
    let mut context = Context::new();
    context.eval("var base = [1, 2, 3];").unwrap();
    let first = context.eval("base.length * 2 + base[1]").unwrap();
    let second = context.eval("base.length * 2 + base[1]").unwrap();
    assert_eq!(first, second);
    assert_eq!(first, HostValue::Number(8.0));
}

#[test]
fn test_deeply_nested_source_is_syntax_error() {
    let sources = vec![
        format!("{}1{}", "[".repeat(1000), "]".repeat(1000)),
        format!("{}1{}", "(".repeat(5000), ")".repeat(5000)),
        format!("{}1", "-".repeat(10_000)),
        format!("{}1", "a = ".repeat(10_000)),
        format!("{}x;", "if (1) ".repeat(10_000)),
        format!("var o = {}1{};", "{ a: ".repeat(2000), " }".repeat(2000)),
    ];
    for source in sources {
        match run_js(&source) {
            Err(JErrorType::SyntaxError { message, .. }) => {
                assert_eq!(message, "Maximum nesting depth exceeded")
            }
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }
}

#[test]
fn test_nesting_below_the_limit_evaluates() {
    let source = format!("{}1{}{}", "[".repeat(200), "]".repeat(200), "[0]".repeat(200));
    assert_eq!(number(&source), 1.0);
    let source = format!("{}2{}", "(".repeat(200), ")".repeat(200));
    assert_eq!(number(&source), 2.0);
    let source = format!("{}1", "1 + ".repeat(3000));
    assert_eq!(number(&source), 3001.0);
}

#[test]
fn test_overlong_chain_is_syntax_error() {
    let source = format!("{}1", "1 + ".repeat(5000));
    assert!(matches!(run_js(&source), Err(JErrorType::SyntaxError { .. })));
    let source = format!("var o = {{}}; o{}", ".a".repeat(5000));
    assert!(matches!(run_js(&source), Err(JErrorType::SyntaxError { .. })));
}

#[test]
fn test_deep_runtime_structures_fail_to_convert() {
    let mut context = Context::new();
    let result = context.eval("var a = []; for (var i = 0; i < 5000; i++) a = [a]; a");
    assert_eq!(
        result,
        Err(JErrorType::ConversionError("Maximum nesting depth exceeded".to_string()))
    );
    // Stringifying recurses without overflowing the stack.
    assert_eq!(context.eval("String(a)").unwrap(), HostValue::from(""));
}
