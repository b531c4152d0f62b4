//! Serializer that builds a `Value` tree, spelling struct fields in the
//! configured convention.
//!
//! Map keys, string values and enum variant names are written exactly as the
//! value produced them. Only values that come in through `collect_str` (the
//! path chrono's `DateTime` takes) are candidates for date formatting.

use super::SerializationOptions;
use serde::ser::{self, Error as _, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

type JsonError = serde_json::Error;

pub(super) struct WireSerializer<'a> {
    options: &'a SerializationOptions,
}

impl<'a> WireSerializer<'a> {
    pub(super) fn new(options: &'a SerializationOptions) -> Self {
        Self { options }
    }
}

fn tagged(variant: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(variant.to_string(), value);
    Value::Object(map)
}

// JSON object keys are strings; numbers and booleans are stringified the way serde_json does.
fn map_key(key: Value) -> Result<String, JsonError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(JsonError::custom("key must be a string")),
    }
}

impl<'a> ser::Serializer for WireSerializer<'a> {
    type Ok = Value;
    type Error = JsonError;

    type SerializeSeq = ArrayBuilder<'a>;
    type SerializeTuple = ArrayBuilder<'a>;
    type SerializeTupleStruct = ArrayBuilder<'a>;
    type SerializeTupleVariant = ArrayBuilder<'a>;
    type SerializeMap = ObjectBuilder<'a>;
    type SerializeStruct = ObjectBuilder<'a>;
    type SerializeStructVariant = ObjectBuilder<'a>;

    fn serialize_bool(self, v: bool) -> Result<Value, JsonError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, JsonError> {
        serde_json::to_value(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, JsonError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, JsonError> {
        serde_json::to_value(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value, JsonError> {
        serde_json::to_value(v)
    }

    fn serialize_f64(self, v: f64) -> Result<Value, JsonError> {
        serde_json::to_value(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, JsonError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, JsonError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, JsonError> {
        Ok(Value::Array(v.iter().copied().map(Value::from).collect()))
    }

    fn serialize_none(self) -> Result<Value, JsonError> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, JsonError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, JsonError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, JsonError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, JsonError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value, JsonError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, JsonError>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(variant, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ArrayBuilder<'a>, JsonError> {
        Ok(ArrayBuilder::new(self.options, len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<ArrayBuilder<'a>, JsonError> {
        Ok(ArrayBuilder::new(self.options, len, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<ArrayBuilder<'a>, JsonError> {
        Ok(ArrayBuilder::new(self.options, len, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ArrayBuilder<'a>, JsonError> {
        Ok(ArrayBuilder::new(self.options, len, Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<ObjectBuilder<'a>, JsonError> {
        Ok(ObjectBuilder::new(self.options, None))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<ObjectBuilder<'a>, JsonError> {
        Ok(ObjectBuilder::new(self.options, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<ObjectBuilder<'a>, JsonError> {
        Ok(ObjectBuilder::new(self.options, Some(variant)))
    }

    fn collect_str<T>(self, value: &T) -> Result<Value, JsonError>
    where
        T: ?Sized + Display,
    {
        Ok(Value::String(self.options.encode_date(value.to_string())))
    }
}

pub(super) struct ArrayBuilder<'a> {
    options: &'a SerializationOptions,
    items: Vec<Value>,
    variant: Option<&'static str>,
}

impl<'a> ArrayBuilder<'a> {
    fn new(options: &'a SerializationOptions, len: usize, variant: Option<&'static str>) -> Self {
        Self {
            options,
            items: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(WireSerializer::new(self.options))?);
        Ok(())
    }

    fn finish(self) -> Value {
        let array = Value::Array(self.items);
        match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        }
    }
}

impl ser::SerializeSeq for ArrayBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for ArrayBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for ArrayBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for ArrayBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

pub(super) struct ObjectBuilder<'a> {
    options: &'a SerializationOptions,
    map: Map<String, Value>,
    pending_key: Option<String>,
    variant: Option<&'static str>,
}

impl<'a> ObjectBuilder<'a> {
    fn new(options: &'a SerializationOptions, variant: Option<&'static str>) -> Self {
        Self {
            options,
            map: Map::new(),
            pending_key: None,
            variant,
        }
    }

    fn insert_field<T>(&mut self, field: &'static str, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        let value = value.serialize(WireSerializer::new(self.options))?;
        self.map.insert(self.options.field_to_wire(field), value);
        Ok(())
    }

    fn finish(self) -> Value {
        let object = Value::Object(self.map);
        match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        }
    }
}

impl ser::SerializeMap for ObjectBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        let key = key.serialize(WireSerializer::new(self.options))?;
        self.pending_key = Some(map_key(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| JsonError::custom("map value serialized before its key"))?;
        let value = value.serialize(WireSerializer::new(self.options))?;
        self.map.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for ObjectBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.insert_field(key, value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for ObjectBuilder<'_> {
    type Ok = Value;
    type Error = JsonError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), JsonError>
    where
        T: ?Sized + Serialize,
    {
        self.insert_field(key, value)
    }

    fn end(self) -> Result<Value, JsonError> {
        Ok(self.finish())
    }
}
