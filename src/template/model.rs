// ABOUTME: Attribute-access capability for opaque model objects
// ABOUTME: Lets host types expose named attributes to dotted template paths

use std::fmt;

use super::value::Value;

/// An object whose attributes are read on demand by the path resolver.
///
/// `{{ customer.address.city }}` asks the `customer` model for `address`; if
/// that attribute is itself a [`Value::Model`], the walk continues on it.
pub trait Model: fmt::Debug + Send + Sync {
    /// Short class name; unnamed models are bound under its lowercase form
    fn class_name(&self) -> &str;

    /// Value of the named attribute, `None` when the model has no such attribute
    fn attribute(&self, name: &str) -> Option<Value>;
}
