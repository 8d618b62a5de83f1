//! Dynamically Typed Values
//!
//! Nodes in a graph produce values of unrelated types, so the engine carries
//! them type-erased. A [`Value`] is an `Arc` around the payload: cloning it
//! for every dependent is a reference count bump, never a deep copy.

use std::any::{type_name, Any};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::ValueError;

/// A type-erased, shareable node payload.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a payload.
    pub fn new<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            inner: Arc::new(payload),
            type_name: type_name::<T>(),
        }
    }

    /// The payload's Rust type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the payload as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Clone the payload out as a `T`.
    pub fn get<T>(&self) -> Result<T, ValueError>
    where
        T: Any + Clone,
    {
        self.downcast_ref::<T>()
            .cloned()
            .ok_or(ValueError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.type_name,
            })
    }

    /// Whether two values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name)
            .finish()
    }
}

macro_rules! impl_from_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(payload: $ty) -> Self {
                    Value::new(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char,
    String, &'static str, serde_json::Value,
);

/// Resolved dependency values handed to a computation callable.
///
/// Positions match the node's declared dependency names, independent of the
/// order in which the dependencies finished resolving.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value, ValueError> {
        self.values.get(index).ok_or(ValueError::MissingArgument {
            index,
            len: self.values.len(),
        })
    }

    /// The value at `index`, cloned out as a `T`.
    pub fn get<T>(&self, index: usize) -> Result<T, ValueError>
    where
        T: Any + Clone,
    {
        self.value(index)?.get::<T>()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
