//! Text encodings: `btoa`/`atob`, `hexEncode`/`hexDecode`,
//! `urlEncode`/`urlDecode` and the URI functions.
//!
//! Strings are encoded as their UTF-8 bytes. Decoded bytes that are not
//! valid UTF-8 become U+FFFD, except in the URI decoders, which reject them.

use base64::{engine::general_purpose, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

/// Everything but the characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `encodeURI` also keeps the URI's structural characters.
const URI: &AsciiSet = &URI_COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

/// Register the encoding globals with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let functions: [(&str, NativeFn); 10] = [
        ("btoa", base64_encode),
        ("atob", base64_decode),
        ("hexEncode", hex_encode),
        ("hexDecode", hex_decode),
        ("urlEncode", url_encode),
        ("urlDecode", url_decode),
        ("encodeURIComponent", encode_uri_component),
        ("decodeURIComponent", decode_uri_component),
        ("encodeURI", encode_uri),
        ("decodeURI", decode_uri_component),
    ];
    for (name, function) in functions {
        registry.register_object(BuiltInObject::new(name).with_call(function));
    }
}

/// `String(args[index])`, `"undefined"` when absent.
pub(super) fn string_arg(ctx: &EvalContext, args: &[JsValue], index: usize) -> Result<String, JErrorType> {
    match args.get(index) {
        Some(value) => ctx.to_string(value),
        None => Ok("undefined".to_string()),
    }
}

pub(super) fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub(super) fn base64_encode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(to_base64(string_arg(ctx, &args, 0)?.as_bytes())))
}

pub(super) fn base64_decode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    let bytes = general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| JErrorType::TypeError(format!("The string to be decoded is not correctly encoded: {}", e)))?;
    Ok(JsValue::String(String::from_utf8_lossy(&bytes).into_owned()))
}

pub(super) fn hex_encode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(hex::encode(string_arg(ctx, &args, 0)?)))
}

pub(super) fn hex_decode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    let bytes = hex::decode(input.trim()).map_err(|e| JErrorType::TypeError(format!("Invalid hex string: {}", e)))?;
    Ok(JsValue::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Percent-encodes every byte but ASCII letters and digits.
pub(super) fn url_encode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    Ok(JsValue::String(utf8_percent_encode(&input, NON_ALPHANUMERIC).to_string()))
}

/// Lenient: malformed escapes are kept as they are.
pub(super) fn url_decode(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    Ok(JsValue::String(percent_decode_str(&input).decode_utf8_lossy().into_owned()))
}

fn encode_uri_component(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    Ok(JsValue::String(utf8_percent_encode(&input, URI_COMPONENT).to_string()))
}

fn encode_uri(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    Ok(JsValue::String(utf8_percent_encode(&input, URI).to_string()))
}

/// Strict: a `%` not followed by two hex digits, or escapes that do not form
/// UTF-8, throw a `URIError`. `decodeURI` decodes the same way.
fn decode_uri_component(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, &args, 0)?;
    match strict_percent_decode(&input) {
        Some(decoded) => Ok(JsValue::String(decoded)),
        None => Err(JErrorType::Thrown(ctx.new_error("URIError", "URI malformed")?)),
    }
}

fn strict_percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(input).decode_utf8().ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_decoding_rejects_bad_escapes() {
        assert_eq!(strict_percent_decode("a%20b").as_deref(), Some("a b"));
        assert_eq!(strict_percent_decode("%E2%9C%93").as_deref(), Some("✓"));
        assert_eq!(strict_percent_decode("%"), None);
        assert_eq!(strict_percent_decode("%zz"), None);
        assert_eq!(strict_percent_decode("%FF"), None);
    }

    #[test]
    fn test_uri_sets() {
        let encoded = utf8_percent_encode("a b/c?d=é!", URI_COMPONENT).to_string();
        assert_eq!(encoded, "a%20b%2Fc%3Fd%3D%C3%A9!");
        let encoded = utf8_percent_encode("a b/c?d=é!", URI).to_string();
        assert_eq!(encoded, "a%20b/c?d=%C3%A9!");
    }
}
