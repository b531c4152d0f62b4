//! Deserializer over a parsed `Value` tree that matches wire keys against a
//! struct's declared fields.
//!
//! Renaming only happens where serde hands over the field list
//! (`deserialize_struct` and struct variants). Map keys and plain strings reach
//! the visitor untouched; only `deserialize_str` requests, which is how chrono
//! reads its date types, go through date normalization.

use super::SerializationOptions;
use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeSeed, Error as _, Unexpected, Visitor};
use serde_json::{Map, Number, Value};

type JsonError = serde_json::Error;

pub(super) struct WireDeserializer<'a> {
    value: Value,
    options: &'a SerializationOptions,
}

impl<'a> WireDeserializer<'a> {
    pub(super) fn new(value: Value, options: &'a SerializationOptions) -> Self {
        Self { value, options }
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn visit_number<'de, V>(n: &Number, visitor: V) -> Result<V::Value, JsonError>
where
    V: Visitor<'de>,
{
    if let Some(u) = n.as_u64() {
        visitor.visit_u64(u)
    } else if let Some(i) = n.as_i64() {
        visitor.visit_i64(i)
    } else if let Some(f) = n.as_f64() {
        visitor.visit_f64(f)
    } else {
        Err(JsonError::custom(format!("unsupported number {}", n)))
    }
}

fn visit_array<'de, V>(
    items: Vec<Value>,
    options: &SerializationOptions,
    visitor: V,
) -> Result<V::Value, JsonError>
where
    V: Visitor<'de>,
{
    let len = items.len();
    let mut seq = SeqDeserializer {
        items: items.into_iter(),
        options,
    };
    let value = visitor.visit_seq(&mut seq)?;
    if seq.items.as_slice().is_empty() {
        Ok(value)
    } else {
        Err(JsonError::invalid_length(len, &"fewer elements in array"))
    }
}

fn visit_object<'de, V>(
    map: Map<String, Value>,
    fields: Option<&'static [&'static str]>,
    options: &SerializationOptions,
    visitor: V,
) -> Result<V::Value, JsonError>
where
    V: Visitor<'de>,
{
    let mut access = MapDeserializer {
        entries: map.into_iter(),
        pending: None,
        fields,
        options,
    };
    visitor.visit_map(&mut access)
}

impl<'de> de::Deserializer<'de> for WireDeserializer<'_> {
    type Error = JsonError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(n) => visit_number(&n, visitor),
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => visit_array(items, self.options, visitor),
            Value::Object(map) => visit_object(map, None, self.options, visitor),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(s) => visitor.visit_string(self.options.decode_date(s)),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Object(map) => visit_object(map, Some(fields), self.options, visitor),
            Value::Array(items) => visit_array(items, self.options, visitor),
            other => Err(JsonError::invalid_type(unexpected(&other), &visitor)),
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(variant) => {
                visitor.visit_enum(StringDeserializer::<JsonError>::new(variant))
            }
            Value::Object(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((variant, value)), None) => visitor.visit_enum(EnumDeserializer {
                        variant,
                        value,
                        options: self.options,
                    }),
                    _ => Err(JsonError::invalid_value(
                        Unexpected::Map,
                        &"map with a single key",
                    )),
                }
            }
            other => Err(JsonError::invalid_type(unexpected(&other), &"string or map")),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier
    }
}

struct SeqDeserializer<'a> {
    items: std::vec::IntoIter<Value>,
    options: &'a SerializationOptions,
}

impl<'de> de::SeqAccess<'de> for SeqDeserializer<'_> {
    type Error = JsonError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, JsonError>
    where
        T: DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(value) => seed
                .deserialize(WireDeserializer::new(value, self.options))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapDeserializer<'a> {
    entries: serde_json::map::IntoIter,
    pending: Option<Value>,
    fields: Option<&'static [&'static str]>,
    options: &'a SerializationOptions,
}

impl<'de> de::MapAccess<'de> for MapDeserializer<'_> {
    type Error = JsonError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, JsonError>
    where
        K: DeserializeSeed<'de>,
    {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(value);
        let key = match self.fields {
            Some(fields) => self.options.field_from_wire(key, fields),
            None => key,
        };
        seed.deserialize(MapKey(key)).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, JsonError>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| JsonError::custom("map value requested before its key"))?;
        seed.deserialize(WireDeserializer::new(value, self.options))
    }
}

struct EnumDeserializer<'a> {
    variant: String,
    value: Value,
    options: &'a SerializationOptions,
}

impl<'de, 'a> de::EnumAccess<'de> for EnumDeserializer<'a> {
    type Error = JsonError;
    type Variant = VariantDeserializer<'a>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, VariantDeserializer<'a>), JsonError>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(StringDeserializer::<JsonError>::new(self.variant))?;
        Ok((
            variant,
            VariantDeserializer {
                value: self.value,
                options: self.options,
            },
        ))
    }
}

struct VariantDeserializer<'a> {
    value: Value,
    options: &'a SerializationOptions,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'_> {
    type Error = JsonError;

    fn unit_variant(self) -> Result<(), JsonError> {
        match self.value {
            Value::Null => Ok(()),
            other => Err(JsonError::invalid_type(unexpected(&other), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, JsonError>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(WireDeserializer::new(self.value, self.options))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Array(items) => visit_array(items, self.options, visitor),
            other => Err(JsonError::invalid_type(unexpected(&other), &"tuple variant")),
        }
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Object(map) => visit_object(map, Some(fields), self.options, visitor),
            other => Err(JsonError::invalid_type(unexpected(&other), &"struct variant")),
        }
    }
}

/// An object key. JSON keys are always strings, so numeric and boolean key
/// types are parsed out of the text.
struct MapKey(String);

macro_rules! parse_key {
    ($($method:ident => $visit:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, JsonError>
            where
                V: Visitor<'de>,
            {
                match self.0.parse() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => Err(JsonError::invalid_type(Unexpected::Str(&self.0), &visitor)),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for MapKey {
    type Error = JsonError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.0)
    }

    parse_key! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, JsonError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(StringDeserializer::<JsonError>::new(self.0))
    }

    serde::forward_to_deserialize_any! {
        i128 u128 char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}
