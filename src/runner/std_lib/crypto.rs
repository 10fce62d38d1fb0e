//! Hashing, HMAC and randomness: the global digest functions, `CryptoUtils`,
//! `crypto` and `cryptoRandom`.
//!
//! Digests are taken over the UTF-8 bytes of `String(input)` and returned as
//! lowercase hex.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::encoding::{
    base64_decode, base64_encode, hex_decode, hex_encode, string_arg, to_base64, url_decode, url_encode,
};

pub const CLASS_HASH: &str = "Hash";
pub const CLASS_HMAC: &str = "Hmac";

/// Most elements `crypto.getRandomValues` fills in one call.
const MAX_RANDOM_VALUES: usize = 65536;

const SLOT_ALGORITHM: &str = "algorithm";
const SLOT_DATA: &str = "data";
const SLOT_KEY: &str = "key";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(Algorithm::Md5),
            "sha1" => Some(Algorithm::Sha1),
            "sha256" => Some(Algorithm::Sha256),
            "sha512" => Some(Algorithm::Sha512),
            _ => None,
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Algorithm::Md5 => Md5::digest(data).to_vec(),
            Algorithm::Sha1 => Sha1::digest(data).to_vec(),
            Algorithm::Sha256 => Sha256::digest(data).to_vec(),
            Algorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// `None` for SHA-512, which has no HMAC form here.
    fn hmac(self, key: &[u8], data: &[u8]) -> Option<Result<Vec<u8>, JErrorType>> {
        match self {
            Algorithm::Md5 => Some(mac::<Hmac<Md5>>(key, data)),
            Algorithm::Sha1 => Some(mac::<Hmac<Sha1>>(key, data)),
            Algorithm::Sha256 => Some(mac::<Hmac<Sha256>>(key, data)),
            Algorithm::Sha512 => None,
        }
    }
}

fn mac<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, JErrorType> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|e| JErrorType::TypeError(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Register the hashing and randomness globals with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let digests: [(&str, NativeFn); 7] = [
        ("md5", md5_hex),
        ("sha1", sha1_hex),
        ("sha256", sha256_hex),
        ("sha512", sha512_hex),
        ("hmacMd5", hmac_md5_hex),
        ("hmacSha1", hmac_sha1_hex),
        ("hmacSha256", hmac_sha256_hex),
    ];

    let mut utils = BuiltInObject::new("CryptoUtils")
        .add_method("base64Encode", base64_encode)
        .add_method("base64Decode", base64_decode)
        .add_method("hexEncode", hex_encode)
        .add_method("hexDecode", hex_decode)
        .add_method("urlEncode", url_encode)
        .add_method("urlDecode", url_decode)
        .add_method("createHash", create_hash)
        .add_method("createHmac", create_hmac);
    for (name, function) in digests {
        registry.register_object(BuiltInObject::new(name).with_call(function));
        utils = utils.add_method(name, function);
    }
    registry.register_object(utils);

    for class_name in [CLASS_HASH, CLASS_HMAC] {
        registry.register_prototype(
            BuiltInObject::new(class_name)
                .add_method("update", hasher_update)
                .add_method("digest", hasher_digest),
        );
    }

    registry.register_object(
        BuiltInObject::new("crypto")
            .add_method("randomUUID", random_uuid)
            .add_method("getRandomValues", get_random_values),
    );
    registry.register_object(BuiltInObject::new("cryptoRandom").with_call(crypto_random));
}

fn digest_hex(ctx: &EvalContext, args: &[JsValue], algorithm: Algorithm) -> Result<JsValue, JErrorType> {
    let input = string_arg(ctx, args, 0)?;
    Ok(JsValue::String(hex::encode(algorithm.digest(input.as_bytes()))))
}

fn hmac_hex(ctx: &EvalContext, args: &[JsValue], algorithm: Algorithm) -> Result<JsValue, JErrorType> {
    let key = string_arg(ctx, args, 0)?;
    let message = string_arg(ctx, args, 1)?;
    match algorithm.hmac(key.as_bytes(), message.as_bytes()) {
        Some(bytes) => Ok(JsValue::String(hex::encode(bytes?))),
        None => Err(JErrorType::TypeError(format!("Unsupported HMAC algorithm: {:?}", algorithm))),
    }
}

fn md5_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    digest_hex(ctx, &args, Algorithm::Md5)
}

fn sha1_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    digest_hex(ctx, &args, Algorithm::Sha1)
}

fn sha256_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    digest_hex(ctx, &args, Algorithm::Sha256)
}

fn sha512_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    digest_hex(ctx, &args, Algorithm::Sha512)
}

fn hmac_md5_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    hmac_hex(ctx, &args, Algorithm::Md5)
}

fn hmac_sha1_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    hmac_hex(ctx, &args, Algorithm::Sha1)
}

fn hmac_sha256_hex(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    hmac_hex(ctx, &args, Algorithm::Sha256)
}

// ---- createHash / createHmac ----

fn throw_error(ctx: &mut EvalContext, message: String) -> JErrorType {
    match ctx.new_error("Error", &message) {
        Ok(error) => JErrorType::Thrown(error),
        Err(e) => e,
    }
}

/// `CryptoUtils.createHash(algorithm)`: an object accumulating `update`
/// input until `digest`.
fn create_hash(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let name = string_arg(ctx, &args, 0)?;
    if Algorithm::parse(&name).is_none() {
        return Err(throw_error(ctx, format!("Unsupported hash algorithm: {}", name)));
    }
    new_hasher(ctx, CLASS_HASH, name, None)
}

fn create_hmac(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let name = string_arg(ctx, &args, 0)?;
    let key = string_arg(ctx, &args, 1)?;
    if !matches!(Algorithm::parse(&name), Some(a) if a != Algorithm::Sha512) {
        return Err(throw_error(ctx, format!("Unsupported HMAC algorithm: {}", name)));
    }
    new_hasher(ctx, CLASS_HMAC, name, Some(key))
}

fn new_hasher(ctx: &mut EvalContext, class_name: &str, algorithm: String, key: Option<String>) -> Result<JsValue, JErrorType> {
    let value = ctx.new_object()?;
    let object_ref = hasher_ref(&value)?;
    let object = ctx.heap.object_mut(object_ref)?;
    object.class_name = class_name.to_string();
    object.internal.set(SLOT_ALGORITHM, JsValue::String(algorithm));
    object.internal.set(SLOT_DATA, JsValue::from(""));
    if let Some(key) = key {
        object.internal.set(SLOT_KEY, JsValue::String(key));
    }
    Ok(value)
}

fn hasher_ref(value: &JsValue) -> Result<HeapRef, JErrorType> {
    match value {
        JsValue::Object(r) => Ok(*r),
        _ => Err(JErrorType::TypeError("Hash method called on incompatible receiver".to_string())),
    }
}

fn internal_string(ctx: &EvalContext, object_ref: HeapRef, slot: &str) -> Result<Option<String>, JErrorType> {
    Ok(match ctx.heap.object(object_ref)?.internal.get(slot) {
        Some(JsValue::String(s)) => Some(s.clone()),
        _ => None,
    })
}

/// Appends `String(input)` and returns the hasher for chaining.
fn hasher_update(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let object_ref = hasher_ref(&this)?;
    let input = string_arg(ctx, &args, 0)?;
    let mut data = internal_string(ctx, object_ref, SLOT_DATA)?
        .ok_or_else(|| JErrorType::TypeError("Hash method called on incompatible receiver".to_string()))?;
    data.push_str(&input);
    ctx.heap
        .object_mut(object_ref)?
        .internal
        .set(SLOT_DATA, JsValue::String(data));
    Ok(this)
}

/// Hex by default; `'base64'` yields the base64 of that hex text.
fn hasher_digest(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let object_ref = hasher_ref(&this)?;
    let incompatible = || JErrorType::TypeError("Hash method called on incompatible receiver".to_string());
    let name = internal_string(ctx, object_ref, SLOT_ALGORITHM)?.ok_or_else(incompatible)?;
    let data = internal_string(ctx, object_ref, SLOT_DATA)?.ok_or_else(incompatible)?;
    let algorithm = Algorithm::parse(&name).ok_or_else(incompatible)?;
    let bytes = match internal_string(ctx, object_ref, SLOT_KEY)? {
        Some(key) => match algorithm.hmac(key.as_bytes(), data.as_bytes()) {
            Some(bytes) => bytes?,
            None => return Err(throw_error(ctx, format!("Unsupported HMAC algorithm: {}", name))),
        },
        None => algorithm.digest(data.as_bytes()),
    };
    let hex = hex::encode(bytes);
    Ok(match args.first() {
        Some(JsValue::String(encoding)) if encoding == "base64" => JsValue::String(to_base64(hex.as_bytes())),
        _ => JsValue::String(hex),
    })
}

// ---- randomness ----

fn random_uuid(_ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(Uuid::new_v4().to_string()))
}

/// Fills an array with random integers in `0..=255` and returns it.
fn get_random_values(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let target = args.into_iter().next().unwrap_or(JsValue::Undefined);
    let array_ref = match &target {
        JsValue::Array(r) => *r,
        _ => {
            return Err(JErrorType::TypeError(
                "crypto.getRandomValues expects an array".to_string(),
            ))
        }
    };
    let array = ctx.heap.array_mut(array_ref)?;
    if array.elements.len() > MAX_RANDOM_VALUES {
        return Err(JErrorType::RangeError(format!(
            "crypto.getRandomValues fills at most {} elements",
            MAX_RANDOM_VALUES
        )));
    }
    let mut rng = rand::thread_rng();
    for element in array.elements.iter_mut() {
        *element = JsValue::Number(rng.gen::<u8>() as f64);
    }
    Ok(target)
}

fn crypto_random(_ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Number(rand::thread_rng().gen::<f64>()))
}
