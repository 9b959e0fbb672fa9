//! Conversion between [`Value`] trees and typed values.
//!
//! By default every type goes through `serde`. A [`Materializer`] can carry
//! custom functions for individual types, keyed by [`TypeId`]; these take
//! precedence over the `serde` implementation of the type they are registered
//! for.
use core::{
    any::{Any, TypeId, type_name},
    fmt,
};
use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{options::ConverterOptions, value::Value};

/// A value could not be converted to or from the requested type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{type_name}: {message}")]
pub struct MaterializeError {
    pub type_name: &'static str,
    pub message: String,
}

impl MaterializeError {
    pub fn new<T: ?Sized>(message: impl fmt::Display) -> Self {
        Self {
            type_name: type_name::<T>(),
            message: message.to_string(),
        }
    }
}

type DeserializeFn =
    dyn Fn(&Value, &ConverterOptions) -> Result<Box<dyn Any + Send>, MaterializeError> + Send + Sync;
type SerializeFn = dyn Fn(&dyn Any, &ConverterOptions) -> Result<Value, MaterializeError> + Send + Sync;

/// Registry of custom (de)serializers.
///
/// # Examples
///
/// ```rust
/// use jsonsluice::{ConverterOptions, MaterializeError, Materializer, Value};
///
/// #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
/// struct Celsius(f64);
///
/// let materializer = Materializer::default().with_deserializer(|value: &Value, _| {
///     let text = value.as_str().ok_or_else(|| MaterializeError::new::<Celsius>("expected text"))?;
///     let degrees = text.trim_end_matches("°C").parse().map_err(MaterializeError::new::<Celsius>)?;
///     Ok(Celsius(degrees))
/// });
///
/// let value = Value::from("21.5°C");
/// let options = ConverterOptions::default();
/// assert_eq!(materializer.deserialize::<Celsius>(value, &options), Ok(Celsius(21.5)));
/// ```
#[derive(Clone, Default)]
pub struct Materializer {
    deserializers: HashMap<TypeId, Arc<DeserializeFn>>,
    serializers: HashMap<TypeId, Arc<SerializeFn>>,
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Materializer")
            .field("deserializers", &self.deserializers.len())
            .field("serializers", &self.serializers.len())
            .finish()
    }
}

impl Materializer {
    /// Registers a custom deserializer for `T`, replacing any previous one.
    #[must_use]
    pub fn with_deserializer<T, F>(mut self, f: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&Value, &ConverterOptions) -> Result<T, MaterializeError> + Send + Sync + 'static,
    {
        let erased = move |value: &Value, options: &ConverterOptions| {
            f(value, options).map(|v| Box::new(v) as Box<dyn Any + Send>)
        };
        self.deserializers.insert(TypeId::of::<T>(), Arc::new(erased));
        self
    }

    /// Registers a custom serializer for `T`, replacing any previous one.
    #[must_use]
    pub fn with_serializer<T, F>(mut self, f: F) -> Self
    where
        T: 'static,
        F: Fn(&T, &ConverterOptions) -> Result<Value, MaterializeError> + Send + Sync + 'static,
    {
        let erased = move |value: &dyn Any, options: &ConverterOptions| match value.downcast_ref::<T>() {
            Some(value) => f(value, options),
            None => Err(MaterializeError::new::<T>("registered serializer received another type")),
        };
        self.serializers.insert(TypeId::of::<T>(), Arc::new(erased));
        self
    }

    #[must_use]
    pub fn has_deserializer<T: 'static>(&self) -> bool {
        self.deserializers.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn has_serializer<T: 'static>(&self) -> bool {
        self.serializers.contains_key(&TypeId::of::<T>())
    }

    /// Builds a `T` from `value`.
    ///
    /// # Errors
    ///
    /// Returns the custom deserializer's error, or the `serde` error if `value`
    /// does not have the shape of `T`.
    pub fn deserialize<T>(&self, value: Value, options: &ConverterOptions) -> Result<T, MaterializeError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.has_deserializer::<T>() {
            return self.deserialize_custom(value, options);
        }
        match passthrough::<T>(value) {
            Ok(same) => Ok(same),
            Err(value) => serde_json::from_value(serde_json::Value::from(value)).map_err(MaterializeError::new::<T>),
        }
    }

    /// Builds a `T` from `value` without going through `serde`, for types
    /// that only have a registered deserializer. [`Value`] targets pass
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// Returns the custom deserializer's error, or an error if nothing is
    /// registered for `T`.
    pub fn deserialize_custom<T>(&self, value: Value, options: &ConverterOptions) -> Result<T, MaterializeError>
    where
        T: Send + 'static,
    {
        if let Some(custom) = self.deserializers.get(&TypeId::of::<T>()) {
            let boxed = custom(&value, options)?;
            return boxed
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|_| MaterializeError::new::<T>("registered deserializer produced another type"));
        }
        passthrough::<T>(value).map_err(|_| MaterializeError::new::<T>("no deserializer registered"))
    }

    /// Turns a `T` into a [`Value`].
    ///
    /// # Errors
    ///
    /// Returns the custom serializer's error, or the `serde` error if `T`
    /// cannot be represented as JSON (for example, a map with non-string
    /// keys).
    pub fn serialize<T>(&self, value: &T, options: &ConverterOptions) -> Result<Value, MaterializeError>
    where
        T: Serialize + 'static,
    {
        if self.has_serializer::<T>() {
            return self.serialize_custom(value, options);
        }
        if let Some(value) = (value as &dyn Any).downcast_ref::<Value>() {
            return Ok(value.clone());
        }
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(MaterializeError::new::<T>)
    }

    /// Turns a `T` into a [`Value`] without going through `serde`, for types
    /// that only have a registered serializer.
    ///
    /// # Errors
    ///
    /// Returns the custom serializer's error, or an error if nothing is
    /// registered for `T`.
    pub fn serialize_custom<T>(&self, value: &T, options: &ConverterOptions) -> Result<Value, MaterializeError>
    where
        T: 'static,
    {
        if let Some(custom) = self.serializers.get(&TypeId::of::<T>()) {
            return custom(value as &dyn Any, options);
        }
        (value as &dyn Any)
            .downcast_ref::<Value>()
            .cloned()
            .ok_or_else(|| MaterializeError::new::<T>("no serializer registered"))
    }
}

/// How a receive mode turns each parsed [`Value`] into its target type.
pub(crate) type FromValue<T> = fn(&Materializer, Value, &ConverterOptions) -> Result<T, MaterializeError>;

/// `value` itself when `T` is [`Value`], otherwise `value` handed back.
fn passthrough<T: 'static>(value: Value) -> Result<T, Value> {
    let boxed: Box<dyn Any> = Box::new(value);
    match boxed.downcast::<T>() {
        Ok(same) => Ok(*same),
        Err(other) => Err(other.downcast::<Value>().map_or(Value::Null, |value| *value)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn serde_is_the_default_path() {
        let m = Materializer::default();
        let options = ConverterOptions::default();
        let value = Value::from_iter([("x", 1), ("y", -2)]);
        assert_eq!(m.deserialize::<Point>(value.clone(), &options), Ok(Point { x: 1, y: -2 }));
        assert_eq!(m.serialize(&Point { x: 1, y: -2 }, &options), Ok(value));
    }

    #[test]
    fn value_targets_pass_through() {
        let m = Materializer::default();
        let options = ConverterOptions::default();
        let value = Value::from(vec![Value::Null, "big".into()]);
        assert_eq!(m.deserialize::<Value>(value.clone(), &options), Ok(value.clone()));
        assert_eq!(m.serialize(&value, &options), Ok(value));
    }

    #[test]
    fn custom_entries_take_precedence() {
        let m = Materializer::default()
            .with_deserializer(|v: &Value, _| {
                let x = v.as_i64().ok_or_else(|| MaterializeError::new::<Point>("expected an integer"))?;
                Ok(Point { x: i32::try_from(x).unwrap_or(i32::MAX), y: 0 })
            })
            .with_serializer(|p: &Point, _| Ok(Value::from(format!("{},{}", p.x, p.y))));
        let options = ConverterOptions::default();

        assert!(m.has_deserializer::<Point>());
        assert_eq!(m.deserialize::<Point>(Value::from(7), &options), Ok(Point { x: 7, y: 0 }));
        assert_eq!(m.serialize(&Point { x: 7, y: 1 }, &options), Ok(Value::from("7,1")));
        // other types are unaffected
        assert!(!m.has_serializer::<Value>());
        assert_eq!(m.deserialize::<bool>(Value::from(true), &options), Ok(true));
    }

    /// Deliberately without `serde` impls.
    #[derive(Debug, PartialEq)]
    struct Opaque(u8);

    #[test]
    fn custom_only_types_skip_serde() {
        let m = Materializer::default()
            .with_deserializer(|v: &Value, _| {
                let n = v.as_number().and_then(crate::value::Number::as_u64).and_then(|n| u8::try_from(n).ok());
                n.map(Opaque).ok_or_else(|| MaterializeError::new::<Opaque>("expected a byte"))
            })
            .with_serializer(|o: &Opaque, _| Ok(Value::from(o.0)));
        let options = ConverterOptions::default();

        assert_eq!(m.deserialize_custom::<Opaque>(Value::from(9), &options), Ok(Opaque(9)));
        assert_eq!(m.serialize_custom(&Opaque(9), &options), Ok(Value::from(9)));
        let err = m.deserialize_custom::<Opaque>(Value::from(300), &options).unwrap_err();
        assert_eq!(err.message, "expected a byte");
    }

    #[test]
    fn custom_only_paths_need_a_registration() {
        let m = Materializer::default();
        let options = ConverterOptions::default();
        let err = m.deserialize_custom::<Opaque>(Value::from(1), &options).unwrap_err();
        assert!(err.type_name.ends_with("Opaque"), "{}", err.type_name);
        assert_eq!(err.message, "no deserializer registered");
        let err = m.serialize_custom(&Opaque(1), &options).unwrap_err();
        assert_eq!(err.message, "no serializer registered");
        // `Value` still passes through
        assert_eq!(m.deserialize_custom::<Value>(Value::from(1), &options), Ok(Value::from(1)));
        assert_eq!(m.serialize_custom(&Value::Null, &options), Ok(Value::Null));
    }

    #[test]
    fn shape_mismatch_names_the_type() {
        let err = Materializer::default()
            .deserialize::<Point>(Value::from("nope"), &ConverterOptions::default())
            .unwrap_err();
        assert!(err.type_name.ends_with("Point"), "{}", err.type_name);
    }

    #[test]
    fn non_string_map_keys_fail_to_serialize() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        let err = Materializer::default()
            .serialize(&map, &ConverterOptions::default())
            .unwrap_err();
        assert!(err.message.contains("key must be a string"), "{}", err.message);
    }
}
