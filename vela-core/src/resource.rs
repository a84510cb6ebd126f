//! Resource - Declared configuration and remote state

use std::collections::HashMap;

/// Unique identifier for a resource within a configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource kind (e.g., "search_domain", "cookie_policy")
    pub kind: String,
    /// Name the caller gave this resource instance
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
}

/// Attribute map shared by declared configuration and remote state
pub type Attributes = HashMap<String, Value>;

/// Error produced by the typed attribute accessors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttrError {
    #[error("required attribute '{0}' is missing")]
    Missing(String),

    #[error("attribute '{name}' has type {got}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("only a single '{0}' block is expected")]
    TooManyBlocks(String),
}

/// Typed accessors over an attribute map
///
/// Each accessor returns the typed value or a decode error; absent optional
/// attributes come back as `None` rather than a zero value.
pub mod attr {
    use super::{AttrError, Attributes, Value};

    fn wrong_type(name: &str, expected: &'static str, value: &Value) -> AttrError {
        AttrError::WrongType {
            name: name.to_string(),
            expected,
            got: value.type_name(),
        }
    }

    pub fn string(attrs: &Attributes, name: &str) -> Result<String, AttrError> {
        opt_string(attrs, name)?.ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    pub fn opt_string(attrs: &Attributes, name: &str) -> Result<Option<String>, AttrError> {
        match attrs.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(name, "String", other)),
        }
    }

    pub fn int(attrs: &Attributes, name: &str) -> Result<i64, AttrError> {
        opt_int(attrs, name)?.ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    pub fn opt_int(attrs: &Attributes, name: &str) -> Result<Option<i64>, AttrError> {
        match attrs.get(name) {
            None => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(wrong_type(name, "Int", other)),
        }
    }

    pub fn boolean(attrs: &Attributes, name: &str) -> Result<bool, AttrError> {
        opt_bool(attrs, name)?.ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    pub fn opt_bool(attrs: &Attributes, name: &str) -> Result<Option<bool>, AttrError> {
        match attrs.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(name, "Bool", other)),
        }
    }

    pub fn opt_string_map(
        attrs: &Attributes,
        name: &str,
    ) -> Result<Option<std::collections::HashMap<String, String>>, AttrError> {
        let Some(value) = attrs.get(name) else {
            return Ok(None);
        };
        let map = value
            .as_map()
            .ok_or_else(|| wrong_type(name, "Map", value))?;
        let mut out = std::collections::HashMap::new();
        for (k, v) in map {
            let s = v.as_str().ok_or_else(|| wrong_type(name, "String", v))?;
            out.insert(k.clone(), s.to_string());
        }
        Ok(Some(out))
    }

    /// Fetch a singleton nested block: a list of at most one map instance.
    ///
    /// More than one instance is an error surfaced here as well as in
    /// schema validation, so providers never silently take the first.
    pub fn singleton_block<'a>(
        attrs: &'a Attributes,
        name: &str,
    ) -> Result<Option<&'a Attributes>, AttrError> {
        let Some(value) = attrs.get(name) else {
            return Ok(None);
        };
        let items = value
            .as_list()
            .ok_or_else(|| wrong_type(name, "List", value))?;
        if items.len() > 1 {
            return Err(AttrError::TooManyBlocks(name.to_string()));
        }
        match items.first() {
            None => Ok(None),
            Some(item) => item
                .as_map()
                .ok_or_else(|| wrong_type(name, "Map", item))
                .map(Some),
        }
    }
}

/// Desired state declared by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: Attributes,
}

impl Resource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Remote state fetched from the vendor
///
/// Not-found is a tagged value (`exists == false`, empty attributes),
/// never an error and never a partially populated state.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Vendor-assigned handle (e.g., an ARN), immutable once assigned
    pub handle: Option<String>,
    pub attributes: Attributes,
    /// Whether the resource exists remotely
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            handle: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: Attributes) -> Self {
        Self {
            id,
            handle: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}
