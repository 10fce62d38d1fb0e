//! Host-environment globals: encodings, digests, `crypto`, timers and
//! `globalThis`.

extern crate jscore;

use std::time::Duration;

use jscore::{Context, HostValue, JErrorType, WorkerState};

const WAIT: Duration = Duration::from_secs(10);

fn string(context: &mut Context, code: &str) -> String {
    match context.eval(code) {
        Ok(HostValue::String(s)) => s,
        other => panic!("expected a string from {:?}, got {:?}", code, other),
    }
}

fn eval_string(code: &str) -> String {
    string(&mut Context::new(), code)
}

fn eval_bool(code: &str) -> bool {
    match Context::new().eval(code) {
        Ok(HostValue::Boolean(b)) => b,
        other => panic!("expected a boolean from {:?}, got {:?}", code, other),
    }
}

// ============================================================================
// Encodings
// ============================================================================

mod encoding_tests {
    use super::*;

    #[test]
    fn test_base64() {
        assert_eq!(eval_string("btoa('hello')"), "aGVsbG8=");
        assert_eq!(eval_string("atob('aGVsbG8=')"), "hello");
        assert_eq!(eval_string("atob(btoa('héllo ✓'))"), "héllo ✓");
        assert_eq!(eval_string("btoa(12)"), "MTI=");
        assert!(matches!(Context::new().eval("atob('!!!')"), Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_hex() {
        assert_eq!(eval_string("hexEncode('abc')"), "616263");
        assert_eq!(eval_string("hexDecode('616263')"), "abc");
        assert_eq!(eval_string("hexDecode(hexEncode('✓'))"), "✓");
        assert!(matches!(Context::new().eval("hexDecode('zz')"), Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_url_encoding() {
        assert_eq!(eval_string("urlEncode('a b&c=d')"), "a%20b%26c%3Dd");
        assert_eq!(eval_string("urlDecode('a%20b%26c')"), "a b&c");
        assert_eq!(eval_string("urlDecode('100%')"), "100%");
    }

    #[test]
    fn test_uri_functions() {
        assert_eq!(eval_string("encodeURIComponent('a b/c?d=é')"), "a%20b%2Fc%3Fd%3D%C3%A9");
        assert_eq!(eval_string("encodeURI('http://x.org/a b?q=1#top')"), "http://x.org/a%20b?q=1#top");
        assert_eq!(eval_string("decodeURIComponent('%E2%9C%93%20ok')"), "✓ ok");
        assert_eq!(eval_string("decodeURI('a%2Fb')"), "a/b");
    }

    #[test]
    fn test_malformed_uri_throws_uri_error() {
        assert_eq!(
            eval_string("var name; try { decodeURIComponent('%'); } catch (e) { name = e.name; } name"),
            "URIError"
        );
        assert_eq!(
            eval_string("var name; try { decodeURI('%C3'); } catch (e) { name = e.name; } name"),
            "URIError"
        );
    }
}

// ============================================================================
// Digests and CryptoUtils
// ============================================================================

mod crypto_tests {
    use super::*;

    const FOX: &str = "'The quick brown fox jumps over the lazy dog'";

    #[test]
    fn test_digests() {
        assert_eq!(eval_string("md5('abc')"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(eval_string("sha1('abc')"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            eval_string("sha256('abc')"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(eval_string("sha512('abc')").starts_with("ddaf35a193617aba"));
        assert_eq!(eval_string("sha512('abc')").len(), 128);
    }

    #[test]
    fn test_hmacs() {
        assert_eq!(
            eval_string(&format!("hmacMd5('key', {})", FOX)),
            "80070713463e7749b90c2dc24911e275"
        );
        assert_eq!(
            eval_string(&format!("hmacSha1('key', {})", FOX)),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
        assert_eq!(
            eval_string(&format!("hmacSha256('key', {})", FOX)),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_crypto_utils_mirrors_the_globals() {
        assert!(eval_bool("CryptoUtils.md5('abc') === md5('abc')"));
        assert!(eval_bool("CryptoUtils.hmacSha1('k', 'm') === hmacSha1('k', 'm')"));
        assert!(eval_bool("CryptoUtils.base64Decode(CryptoUtils.base64Encode('x')) === 'x'"));
        assert!(eval_bool("CryptoUtils.hexEncode('a') === '61'"));
        assert!(eval_bool("CryptoUtils.urlDecode(CryptoUtils.urlEncode('a b')) === 'a b'"));
    }

    #[test]
    fn test_create_hash_accumulates_updates() {
        assert!(eval_bool(
            "CryptoUtils.createHash('sha256').update('a').update('bc').digest() === sha256('abc')"
        ));
        assert!(eval_bool("CryptoUtils.createHash('MD5').update(42).digest('hex') === md5('42')"));
        assert!(eval_bool(
            "CryptoUtils.createHash('sha1').update('abc').digest('base64') === btoa(sha1('abc'))"
        ));
        assert!(eval_bool("var h = CryptoUtils.createHash('md5'); h.update('x') === h"));
    }

    #[test]
    fn test_create_hmac() {
        assert!(eval_bool(&format!(
            "CryptoUtils.createHmac('sha256', 'key').update({}).digest() === hmacSha256('key', {})",
            FOX, FOX
        )));
        assert!(eval_bool(
            "CryptoUtils.createHmac('md5', 'k').update('m').digest() === hmacMd5('k', 'm')"
        ));
    }

    #[test]
    fn test_unsupported_algorithms_throw() {
        assert_eq!(
            eval_string("var m; try { CryptoUtils.createHash('sha3'); } catch (e) { m = e.message; } m"),
            "Unsupported hash algorithm: sha3"
        );
        assert_eq!(
            eval_string("var m; try { CryptoUtils.createHmac('sha512', 'k'); } catch (e) { m = e.message; } m"),
            "Unsupported HMAC algorithm: sha512"
        );
    }

    #[test]
    fn test_hash_methods_reject_other_receivers() {
        let result = Context::new().eval("var h = CryptoUtils.createHash('md5'); h.digest.call({})");
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_random_uuid() {
        let mut context = Context::new();
        let first = string(&mut context, "crypto.randomUUID()");
        let second = string(&mut context, "crypto.randomUUID()");
        assert_eq!(first.len(), 36);
        assert_eq!(&first[14..15], "4");
        assert_ne!(first, second);
    }

    #[test]
    fn test_get_random_values_fills_in_place() {
        assert!(eval_bool(
            r#"
            var a = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
            var same = crypto.getRandomValues(a) === a;
            same && a.length === 16 && a.every(function (x) { return x >= 0 && x < 256 && Math.floor(x) === x; })
            "#
        ));
        assert!(matches!(
            Context::new().eval("crypto.getRandomValues('abc')"),
            Err(JErrorType::TypeError(_))
        ));
    }

    #[test]
    fn test_crypto_random_range() {
        assert!(eval_bool(
            "var ok = true; for (var i = 0; i < 50; i++) { var r = cryptoRandom(); if (r < 0 || r >= 1) ok = false; } ok"
        ));
    }
}

// ============================================================================
// globalThis
// ============================================================================

mod global_this_tests {
    use super::*;

    #[test]
    fn test_reads_and_writes_global_bindings() {
        let mut context = Context::new();
        context.eval("var declared = 1; globalThis.created = 2;").unwrap();
        assert_eq!(context.eval("globalThis.declared").unwrap(), HostValue::Number(1.0));
        assert_eq!(context.eval("created").unwrap(), HostValue::Number(2.0));
        assert_eq!(context.eval("globalThis['cre' + 'ated']").unwrap(), HostValue::Number(2.0));
        assert_eq!(context.eval("typeof globalThis.missing").unwrap(), HostValue::from("undefined"));
    }

    #[test]
    fn test_sees_built_ins() {
        assert!(eval_bool("globalThis.Math === Math && globalThis.globalThis === globalThis"));
        assert!(eval_bool("'setTimeout' in globalThis && !('missing' in globalThis)"));
        assert!(eval_bool("typeof globalThis.btoa === 'function'"));
    }

    #[test]
    fn test_keys_and_delete() {
        let mut context = Context::new();
        context.eval("var b = 1; var a = 2;").unwrap();
        assert_eq!(context.eval("Object.keys(globalThis).join()").unwrap(), HostValue::from("a,b"));
        assert!(eval_bool("var x = 1; globalThis.hasOwnProperty('x') && !globalThis.hasOwnProperty('Math')"));
        context.eval("delete globalThis.a;").unwrap();
        assert_eq!(context.eval("typeof a").unwrap(), HostValue::from("undefined"));
    }

    #[test]
    fn test_const_bindings_stay_constant() {
        let mut context = Context::new();
        context.eval("const fixed = 1;").unwrap();
        assert!(matches!(
            context.eval("globalThis.fixed = 2;"),
            Err(JErrorType::TypeError(_))
        ));
        assert_eq!(context.eval("fixed").unwrap(), HostValue::Number(1.0));
    }
}

// ============================================================================
// Timers
// ============================================================================

mod timer_tests {
    use super::*;

    #[test]
    fn test_timers_wait_for_the_host() {
        let mut context = Context::new();
        let id = context.eval("var fired = []; setTimeout(function () { fired.push('a'); })").unwrap();
        assert_eq!(id, HostValue::Number(1.0));
        assert_eq!(context.eval("fired.length").unwrap(), HostValue::Number(0.0));
        assert_eq!(context.pending_timers(), 1);
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("fired.join()").unwrap(), HostValue::from("a"));
        assert_eq!(context.pending_timers(), 0);
    }

    #[test]
    fn test_timers_run_in_due_order_with_arguments() {
        let mut context = Context::new();
        context
            .eval(
                r#"
                var order = [];
                function record(label) { order.push(label); }
                setTimeout(record, 30, 'slow');
                setTimeout(record, 0, 'fast');
                setTimeout(record, 0, 'second');
                "#,
            )
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("order.join()").unwrap(), HostValue::from("fast,second,slow"));
    }

    #[test]
    fn test_clear_timeout() {
        let mut context = Context::new();
        context
            .eval("var ran = false; var t = setTimeout(function () { ran = true; }, 0); clearTimeout(t); clearTimeout(999);")
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("ran").unwrap(), HostValue::Boolean(false));
    }

    #[test]
    fn test_interval_repeats_until_cleared() {
        let mut context = Context::new();
        context
            .eval(
                r#"
                var ticks = 0;
                var handle = setInterval(function () {
                    ticks++;
                    if (ticks === 3) clearInterval(handle);
                }, 1);
                "#,
            )
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("ticks").unwrap(), HostValue::Number(3.0));
    }

    #[test]
    fn test_endless_interval_never_goes_idle() {
        let mut context = Context::new();
        context.eval("var n = 0; setInterval(function () { n++; }, 1);").unwrap();
        assert!(!context.run_until_workers_idle(Duration::from_millis(50)).unwrap());
        assert_eq!(context.pending_timers(), 1);
        assert!(context.eval("n > 0").unwrap() == HostValue::Boolean(true));
    }

    #[test]
    fn test_pump_runs_only_due_timers() {
        let mut context = Context::new();
        context
            .eval("var log = []; setTimeout(function () { log.push('now'); }, 0); setTimeout(function () { log.push('later'); }, 60000);")
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(context.pump_worker_events().unwrap(), 1);
        assert_eq!(context.eval("log.join()").unwrap(), HostValue::from("now"));
        assert_eq!(context.pending_timers(), 1);
    }

    #[test]
    fn test_throwing_callback_surfaces_from_the_pump() {
        let mut context = Context::new();
        context.eval("setTimeout(function () { throw new TypeError('late'); });").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            context.pump_worker_events(),
            Err(JErrorType::TypeError("late".to_string()))
        );
        assert_eq!(context.eval("1 + 1").unwrap(), HostValue::Number(2.0));
    }

    #[test]
    fn test_callback_must_be_a_function() {
        let result = Context::new().eval("setTimeout('code', 0)");
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }

    #[test]
    fn test_worker_stays_alive_for_its_timers() {
        let mut context = Context::new();
        context
            .eval(
                r#"
                var got = [];
                var w = new Worker("setTimeout(function () { postMessage('tick'); }, 10);");
                w.onmessage = function (e) { got.push(e.data); };
                "#,
            )
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("got.join()").unwrap(), HostValue::from("tick"));
        let id = context.worker_ids()[0];
        assert_eq!(context.worker_state(id), Some(WorkerState::Finished));
    }

    #[test]
    fn test_worker_interval_and_close() {
        let mut context = Context::new();
        context
            .eval(
                r#"
                var got = [];
                var w = new Worker("var n = 0; setInterval(function () { n++; postMessage(n); if (n === 3) close(); }, 1);");
                w.onmessage = function (e) { got.push(e.data); };
                "#,
            )
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("got.join()").unwrap(), HostValue::from("1,2,3"));
        let id = context.worker_ids()[0];
        assert_eq!(context.worker_state(id), Some(WorkerState::Terminated));
    }

    #[test]
    fn test_worker_sees_global_this() {
        let mut context = Context::new();
        context
            .eval(
                r#"
                var reply;
                var w = new Worker("postMessage(typeof globalThis.postMessage + ',' + sha1('abc').length);");
                w.onmessage = function (e) { reply = e.data; };
                "#,
            )
            .unwrap();
        assert!(context.run_until_workers_idle(WAIT).unwrap());
        assert_eq!(context.eval("reply").unwrap(), HostValue::from("function,40"));
    }
}
