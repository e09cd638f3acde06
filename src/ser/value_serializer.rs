//! Builds a [`Value`] out of anything implementing [`Serialize`].
//!
//! Structs become objects with their fields in declaration order, maps
//! become dictionaries, sequences and tuples become lists. Unit variants
//! become enum values backed by their variant index; other variants become
//! objects named `Enum::Variant`.

use crate::error::{Error, Result};
use crate::value::{
    Container, ContainerKind, Dictionary, EnumValue, Object, Property, Sequence, Value,
};

use serde::{ser, Serialize};

/// Converts `value` into the value model.
pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    value.serialize(ValueSerializer)
}

fn list(type_name: Option<&str>, items: Vec<Value>) -> Value {
    let container = Container::new(ContainerKind::List, Sequence::Ready(items));
    match type_name {
        Some(type_name) => container.with_type_name(type_name).into(),
        None => container.into(),
    }
}

fn variant_name(name: &str, variant: &str) -> String {
    format!("{}::{}", name, variant)
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeSeq;
    type SerializeTuple = SerializeSeq;
    type SerializeTupleStruct = SerializeSeq;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStruct;

    fn serialize_bool(self, val: bool) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_i8(self, val: i8) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_i16(self, val: i16) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_i32(self, val: i32) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_i64(self, val: i64) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_u8(self, val: u8) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_u16(self, val: u16) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_u32(self, val: u32) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_u64(self, val: u64) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_f32(self, val: f32) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_f64(self, val: f64) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_char(self, val: char) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_str(self, val: &str) -> Result<Value> {
        Ok(val.into())
    }

    fn serialize_bytes(self, val: &[u8]) -> Result<Value> {
        Ok(list(None, val.iter().copied().map(Value::from).collect()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, val: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        val.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value> {
        Ok(Object::new(name).into())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(EnumValue::new(name, variant, variant_index).into())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        let object = Object::new(variant_name(name, variant)).with("0", to_value(value)?);
        Ok(object.into())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(SerializeSeq {
            type_name: None,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(SerializeSeq {
            type_name: Some(name),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            object: Object::new(variant_name(name, variant)),
            index: 0,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(SerializeMap {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Ok(SerializeStruct {
            object: Object::new(name),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Ok(SerializeStruct {
            object: Object::new(variant_name(name, variant)),
        })
    }
}

struct SerializeSeq {
    type_name: Option<&'static str>,
    items: Vec<Value>,
}

impl ser::SerializeSeq for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(list(self.type_name, self.items))
    }
}

impl ser::SerializeTuple for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

struct SerializeTupleVariant {
    object: Object,
    index: usize,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let name = self.index.to_string();
        self.index += 1;
        self.object.push(Property::new(name, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.object.into())
    }
}

struct SerializeMap {
    entries: Vec<(Value, Value)>,
    pending_key: Option<Value>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.pending_key = Some(to_value(value)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::Serializing("map value without a key".to_owned()))?;
        self.entries.push((key, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        if self.pending_key.is_some() {
            return Err(Error::Serializing("map key without a value".to_owned()));
        }
        Ok(Dictionary::new(Sequence::Ready(self.entries)).into())
    }
}

struct SerializeStruct {
    object: Object,
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.object.push(Property::new(name, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.object.into())
    }
}

impl ser::SerializeStructVariant for SerializeStruct {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeStruct::serialize_field(self, name, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeStruct::end(self)
    }
}
