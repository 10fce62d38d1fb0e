use std::collections::HashMap;

use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::value::JsValue;

pub const CLASS_OBJECT: &str = "Object";

/// Own properties in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, JsValue)>,
    index: HashMap<String, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap::default()
    }

    pub fn get(&self, key: &str) -> Option<&JsValue> {
        self.index.get(key).map(|i| &self.entries[*i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: JsValue) {
        match self.index.get(key) {
            Some(i) => self.entries[*i].1 = value,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), value));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<JsValue> {
        let position = self.index.remove(key)?;
        let (_, value) = self.entries.remove(position);
        for i in self.index.values_mut() {
            if *i > position {
                *i -= 1;
            }
        }
        Some(value)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &JsValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordinary object. `class_name` is the tag reported for error objects and
/// used by `instanceof` against native constructors.
#[derive(Debug, Clone)]
pub struct JsObject {
    pub class_name: String,
    pub prototype: Option<HeapRef>,
    pub properties: PropertyMap,
    /// State native methods keep on the object; never visible to script.
    pub internal: PropertyMap,
}

impl JsObject {
    pub fn new() -> Self {
        JsObject::with_class(CLASS_OBJECT)
    }

    pub fn with_class(class_name: &str) -> Self {
        JsObject {
            class_name: class_name.to_string(),
            prototype: None,
            properties: PropertyMap::new(),
            internal: PropertyMap::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.class_name.ends_with("Error")
    }
}

impl Default for JsObject {
    fn default() -> Self {
        JsObject::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsArray {
    pub elements: Vec<JsValue>,
    /// Non-index properties assigned by script (`arr.tag = 1`).
    pub properties: PropertyMap,
}

impl JsArray {
    pub fn new(elements: Vec<JsValue>) -> Self {
        JsArray {
            elements,
            properties: PropertyMap::new(),
        }
    }
}

/// Parses a canonical array index (`"0"`, `"17"`, but not `"01"` or `"1.0"`).
pub fn as_array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i < u32::MAX).map(|i| i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_keeps_insertion_order() {
        let mut map = PropertyMap::new();
        map.set("b", JsValue::Number(1.0));
        map.set("a", JsValue::Number(2.0));
        map.set("b", JsValue::Number(3.0));
        assert_eq!(map.keys(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&JsValue::Number(3.0)));
        assert_eq!(map.remove("b"), Some(JsValue::Number(3.0)));
        map.set("c", JsValue::Null);
        assert_eq!(map.keys(), vec!["a", "c"]);
        assert_eq!(map.get("c"), Some(&JsValue::Null));
    }

    #[test]
    fn test_array_index_parsing() {
        assert_eq!(as_array_index("0"), Some(0));
        assert_eq!(as_array_index("42"), Some(42));
        assert_eq!(as_array_index("042"), None);
        assert_eq!(as_array_index("1.5"), None);
        assert_eq!(as_array_index("-1"), None);
        assert_eq!(as_array_index("length"), None);
    }
}
