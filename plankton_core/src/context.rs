//! Device context: the closed set of fields that make up a device's state.
//!
//! A context is an ordinary struct with typed fields. State hooks and guards
//! work on it directly, so a misspelled field is a compile error. Everything
//! that addresses fields by name (setup overrides, interfaces, the remote
//! control channel) goes through [`Context::get`] / [`Context::set`], which
//! only accept names from [`Context::FIELDS`].
//!
//! Contexts are declared with [`device_context!`](crate::device_context):
//!
//! ```
//! use plankton_core::device_context;
//!
//! device_context! {
//!     /// Data of a simple oven.
//!     pub struct OvenData {
//!         pub temperature: f64 = 24.0,
//!         pub heater_on: bool = false,
//!         pub cycles: i64 = 0,
//!     }
//! }
//!
//! use plankton_core::{Context, Value};
//!
//! let mut data = OvenData::default();
//! data.set("temperature", Value::Float(30.0)).unwrap();
//! assert_eq!(data.temperature, 30.0);
//! assert!(data.set("temprature", Value::Float(30.0)).is_err());
//! ```

use crate::error::FieldError;
use plankton_env::Value;
use std::fmt::Debug;

/// A fixed-shape device data record.
///
/// `Default` is the initializer routine: it produces the device's default
/// data and is invoked again whenever the device is reset.
pub trait Context: Default + Clone + Debug + Send + 'static {
    /// Name of the context type, for error messages.
    const NAME: &'static str;

    /// Every field name, in declaration order.
    const FIELDS: &'static [&'static str];

    /// Reads a field by name.
    fn get(&self, name: &str) -> Result<Value, FieldError>;

    /// Writes a field by name. Unknown names and mistyped values fail.
    fn set(&mut self, name: &str, value: Value) -> Result<(), FieldError>;

    /// Returns true if `name` is one of [`Context::FIELDS`].
    fn has_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }
}

/// Conversion between a typed field and a [`Value`].
pub trait FieldValue: Sized {
    /// Name of the accepted value kind, for error messages.
    const TYPE_NAME: &'static str;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Option<Self>;
}

impl FieldValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Declares a device context struct.
///
/// Every field takes a type implementing [`FieldValue`] (`f64`, `i64`,
/// `bool`) and a default expression. The macro generates the struct, its
/// `Default` impl from the defaults, and the closed-set [`Context`] impl.
#[macro_export]
macro_rules! device_context {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                }
            }
        }

        impl $crate::Context for $name {
            const NAME: &'static str = stringify!($name);

            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            #[allow(unused_variables)]
            fn get(&self, name: &str) -> ::core::result::Result<$crate::Value, $crate::FieldError> {
                match name {
                    $(
                        stringify!($field) => {
                            ::core::result::Result::Ok($crate::context::FieldValue::to_value(&self.$field))
                        }
                    )*
                    _ => ::core::result::Result::Err($crate::FieldError::unknown(stringify!($name), name)),
                }
            }

            #[allow(unused_variables)]
            fn set(
                &mut self,
                name: &str,
                value: $crate::Value,
            ) -> ::core::result::Result<(), $crate::FieldError> {
                match name {
                    $(
                        stringify!($field) => {
                            self.$field = <$ty as $crate::context::FieldValue>::from_value(value)
                                .ok_or_else(|| {
                                    $crate::FieldError::type_mismatch(
                                        name,
                                        <$ty as $crate::context::FieldValue>::TYPE_NAME,
                                        value,
                                    )
                                })?;
                            ::core::result::Result::Ok(())
                        }
                    )*
                    _ => ::core::result::Result::Err($crate::FieldError::unknown(stringify!($name), name)),
                }
            }
        }
    };
}
