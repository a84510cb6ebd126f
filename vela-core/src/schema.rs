//! Schema - Attribute contracts for resource kinds
//!
//! Each resource kind declares its full attribute contract once, at
//! adapter construction: the semantic type of every attribute, its
//! presence class, whether a change forces replacement, defaults, and
//! constraint validators. Validation runs before any vendor call.

use std::collections::HashMap;

use crate::resource::{Attributes, Value};

/// Semantic attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// Nested block with its own attribute contract, constrained to at
    /// most one instance per resource
    Block(BlockSchema),
}

impl AttributeType {
    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(block) => format!("Block<{}>", block.name),
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Presence class of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Caller must supply a value
    Required,
    /// Caller may supply a value
    Optional,
    /// Populated from remote state only; never supplied by the caller
    Computed,
    /// Caller may supply a value, otherwise the vendor picks one
    OptionalComputed,
}

/// Constraint validator: inspects a candidate value and returns zero or
/// more human-readable violations
pub type Validator = fn(&Value) -> Vec<String>;

/// Schema for a single attribute
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub presence: Presence,
    /// Changing this attribute destroys and recreates the resource
    pub force_new: bool,
    pub default: Option<Value>,
    pub validator: Option<Validator>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            presence: Presence::Optional,
            force_new: false,
            default: None,
            validator: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Attribute contract of a nested singleton block
#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub name: String,
    pub attributes: HashMap<String, AttributeSchema>,
}

impl BlockSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }
}

/// Schema violation found during validation
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaViolation {
    #[error("required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("attribute '{name}' has type {got}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        got: &'static str,
    },

    #[error("attribute '{name}': {message}")]
    Constraint { name: String, message: String },

    #[error("only a single '{name}' block is expected, got {count}")]
    TooManyBlocks { name: String, count: usize },

    #[error("at least one field is expected inside '{name}'")]
    EmptyBlock { name: String },
}

/// Full attribute contract of one resource kind
///
/// Built once per kind at adapter construction; immutable afterwards.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub kind: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate declared attributes against the contract.
    ///
    /// Singleton-block cardinality, requiredness, types, and constraint
    /// validators all run here, before any vendor call is issued.
    pub fn validate(&self, attributes: &Attributes) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();

        for (name, schema) in &self.attributes {
            if schema.presence == Presence::Required
                && !attributes.contains_key(name)
                && schema.default.is_none()
            {
                violations.push(SchemaViolation::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            if let Some(schema) = self.attributes.get(name) {
                check_value(name, schema, value, &mut violations);
            }
            // Unknown attributes are allowed (for flexibility)
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Attribute names whose value differs between two states.
    ///
    /// Only attributes present in `desired` participate; computed
    /// attributes never do (remote state wins for those), and an
    /// optional+computed attribute participates only when declared.
    pub fn changed_attributes(&self, current: &Attributes, desired: &Attributes) -> Vec<String> {
        let mut changed = Vec::new();

        for (name, schema) in &self.attributes {
            match schema.presence {
                Presence::Computed => continue,
                Presence::OptionalComputed | Presence::Optional | Presence::Required => {}
            }
            let Some(desired_value) = desired.get(name) else {
                continue;
            };
            match current.get(name) {
                Some(current_value) if current_value == desired_value => {}
                _ => changed.push(name.clone()),
            }
        }

        changed.sort();
        changed
    }

    /// Changed attributes that are flagged `force_new`: any non-empty
    /// result means the resource must be destroyed and recreated.
    pub fn replacement_attributes(&self, current: &Attributes, desired: &Attributes) -> Vec<String> {
        self.changed_attributes(current, desired)
            .into_iter()
            .filter(|name| self.is_force_new(name))
            .collect()
    }

    pub fn is_force_new(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .map(|schema| schema.force_new)
            .unwrap_or(false)
    }
}

fn check_value(
    name: &str,
    schema: &AttributeSchema,
    value: &Value,
    violations: &mut Vec<SchemaViolation>,
) {
    check_type(name, &schema.attr_type, value, violations);
    if let Some(validator) = schema.validator {
        for message in validator(value) {
            violations.push(SchemaViolation::Constraint {
                name: name.to_string(),
                message,
            });
        }
    }
}

fn check_type(
    name: &str,
    attr_type: &AttributeType,
    value: &Value,
    violations: &mut Vec<SchemaViolation>,
) {
    match (attr_type, value) {
        (AttributeType::String, Value::String(_)) => {}
        (AttributeType::Int, Value::Int(_)) => {}
        (AttributeType::Bool, Value::Bool(_)) => {}

        (AttributeType::List(inner), Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_type(&format!("{}[{}]", name, i), inner, item, violations);
            }
        }

        (AttributeType::Map(inner), Value::Map(map)) => {
            for (key, item) in map {
                check_type(&format!("{}.{}", name, key), inner, item, violations);
            }
        }

        (AttributeType::Block(block), Value::List(items)) => {
            if items.len() > 1 {
                violations.push(SchemaViolation::TooManyBlocks {
                    name: name.to_string(),
                    count: items.len(),
                });
                return;
            }
            if let Some(item) = items.first() {
                check_block(name, block, item, violations);
            }
        }

        _ => violations.push(SchemaViolation::TypeMismatch {
            name: name.to_string(),
            expected: attr_type.type_name(),
            got: value.type_name(),
        }),
    }
}

fn check_block(
    name: &str,
    block: &BlockSchema,
    instance: &Value,
    violations: &mut Vec<SchemaViolation>,
) {
    let Some(fields) = instance.as_map() else {
        violations.push(SchemaViolation::TypeMismatch {
            name: name.to_string(),
            expected: format!("Block<{}>", block.name),
            got: instance.type_name(),
        });
        return;
    };

    if fields.is_empty() {
        violations.push(SchemaViolation::EmptyBlock {
            name: name.to_string(),
        });
        return;
    }

    for (field_name, field_schema) in &block.attributes {
        if field_schema.presence == Presence::Required
            && !fields.contains_key(field_name)
            && field_schema.default.is_none()
        {
            violations.push(SchemaViolation::MissingRequired {
                name: format!("{}.{}", name, field_name),
            });
        }
    }

    for (field_name, field_value) in fields {
        if let Some(field_schema) = block.attributes.get(field_name) {
            check_value(
                &format!("{}.{}", name, field_name),
                field_schema,
                field_value,
                violations,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_block() -> BlockSchema {
        BlockSchema::new("cluster_config")
            .attribute(
                AttributeSchema::new("instance_count", AttributeType::Int)
                    .with_default(Value::Int(1)),
            )
            .attribute(AttributeSchema::new("instance_type", AttributeType::String))
    }

    fn domain_schema() -> ResourceSchema {
        ResourceSchema::new("search_domain")
            .attribute(
                AttributeSchema::new("domain_name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("access_policies", AttributeType::String))
            .attribute(AttributeSchema::new("endpoint", AttributeType::String).computed())
            .attribute(AttributeSchema::new(
                "cluster_config",
                AttributeType::Block(cluster_block()),
            ))
    }

    fn block_value(count: i64) -> Value {
        let mut fields = HashMap::new();
        fields.insert("instance_count".to_string(), Value::Int(count));
        Value::List(vec![Value::Map(fields)])
    }

    #[test]
    fn valid_declaration_passes() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "domain_name".to_string(),
            Value::String("logs-test".to_string()),
        );
        attrs.insert("cluster_config".to_string(), block_value(3));

        assert!(domain_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn missing_required_attribute_fails() {
        let attrs = HashMap::new();
        let violations = domain_schema().validate(&attrs).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, SchemaViolation::MissingRequired { name } if name == "domain_name")));
    }

    #[test]
    fn computed_attribute_is_not_required() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );
        // endpoint is computed and absent; still valid
        assert!(domain_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn two_singleton_block_instances_fail() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );
        let mut fields = HashMap::new();
        fields.insert("instance_count".to_string(), Value::Int(2));
        attrs.insert(
            "cluster_config".to_string(),
            Value::List(vec![Value::Map(fields.clone()), Value::Map(fields)]),
        );

        let violations = domain_schema().validate(&attrs).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, SchemaViolation::TooManyBlocks { count: 2, .. })));
    }

    #[test]
    fn empty_block_instance_fails() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );
        attrs.insert(
            "cluster_config".to_string(),
            Value::List(vec![Value::Map(HashMap::new())]),
        );

        let violations = domain_schema().validate(&attrs).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, SchemaViolation::EmptyBlock { .. })));
    }

    #[test]
    fn type_mismatch_is_reported_with_path() {
        let mut attrs = HashMap::new();
        attrs.insert("domain_name".to_string(), Value::Int(5));

        let violations = domain_schema().validate(&attrs).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("domain_name"));
    }

    #[test]
    fn validator_violations_are_collected() {
        fn no_uppercase(value: &Value) -> Vec<String> {
            match value.as_str() {
                Some(s) if s.chars().any(|c| c.is_ascii_uppercase()) => {
                    vec!["must be lowercase".to_string()]
                }
                _ => Vec::new(),
            }
        }

        let schema = ResourceSchema::new("bucket").attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_validator(no_uppercase),
        );

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("Bad".to_string()));

        let violations = schema.validate(&attrs).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, SchemaViolation::Constraint { .. })));
    }

    #[test]
    fn changed_attributes_skips_computed() {
        let schema = domain_schema();

        let mut current = HashMap::new();
        current.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );
        current.insert(
            "endpoint".to_string(),
            Value::String("search-logs.example.com".to_string()),
        );

        let mut desired = HashMap::new();
        desired.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );
        desired.insert(
            "access_policies".to_string(),
            Value::String("{}".to_string()),
        );

        let changed = schema.changed_attributes(&current, &desired);
        assert_eq!(changed, vec!["access_policies".to_string()]);
    }

    #[test]
    fn replacement_attributes_flags_force_new_changes() {
        let schema = domain_schema();

        let mut current = HashMap::new();
        current.insert(
            "domain_name".to_string(),
            Value::String("logs".to_string()),
        );

        let mut desired = HashMap::new();
        desired.insert(
            "domain_name".to_string(),
            Value::String("metrics".to_string()),
        );
        desired.insert("cluster_config".to_string(), block_value(3));

        let forced = schema.replacement_attributes(&current, &desired);
        assert_eq!(forced, vec!["domain_name".to_string()]);
    }
}
