//! Differ - Classify the gap between declared and remote state
//!
//! Compares the desired attributes with the current remote state under a
//! resource kind's schema and produces the required action. A change to
//! any force_new attribute classifies as Replace (destroy then recreate),
//! never an in-place update.

use std::collections::HashMap;

use crate::adapter::AdapterSet;
use crate::effect::Effect;
use crate::error::{LifecycleError, LifecycleResult};
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with in-place-updatable differences
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed: Vec<String>,
    },
    /// A force_new attribute changed -> destroy and recreate
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        forced: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but is no longer desired -> needs deletion
    Delete {
        id: ResourceId,
        handle: Option<String>,
    },
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired attributes with current remote state
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = schema.changed_attributes(&current.attributes, &desired.attributes);
    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forced: Vec<String> = changed
        .iter()
        .filter(|name| schema.is_force_new(name))
        .cloned()
        .collect();

    if forced.is_empty() {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed,
        }
    } else {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            forced,
        }
    }
}

/// Diff every desired resource against its current state and produce a
/// Plan. Replace lowers to a Delete followed by a Create.
pub fn create_plan(
    adapters: &AdapterSet,
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> LifecycleResult<Plan> {
    let mut plan = Plan::new();

    for resource in desired {
        let schema = adapters.schema(&resource.id.kind).ok_or_else(|| {
            LifecycleError::validation(vec![format!(
                "unknown resource kind '{}'",
                resource.id.kind
            )])
        })?;

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(&schema, resource, &current) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::Replace { id, from, to, .. } => {
                plan.add(Effect::Delete {
                    id: id.clone(),
                    handle: from.handle.clone(),
                });
                plan.add(Effect::Create(to));
            }
            Diff::NoChange(_) => {}
            Diff::Delete { id, handle } => plan.add(Effect::Delete { id, handle }),
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};
    use crate::resource::Value;

    fn policy_schema() -> ResourceSchema {
        ResourceSchema::new("cookie_policy")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("ttl", AttributeType::Int))
    }

    fn existing_state(name: &str, ttl: i64) -> State {
        let id = ResourceId::new("cookie_policy", "web");
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String(name.to_string()));
        attrs.insert("ttl".to_string(), Value::Int(ttl));
        State::existing(id, attrs).with_handle("lb:80:web")
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("cookie_policy", "web");
        let current = State::not_found(ResourceId::new("cookie_policy", "web"));

        assert!(matches!(
            diff(&policy_schema(), &desired, &current),
            Diff::Create(_)
        ));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("cookie_policy", "web")
            .with_attribute("name", Value::String("web".to_string()))
            .with_attribute("ttl", Value::Int(60));

        let result = diff(&policy_schema(), &desired, &existing_state("web", 60));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_for_mutable_change() {
        let desired = Resource::new("cookie_policy", "web")
            .with_attribute("name", Value::String("web".to_string()))
            .with_attribute("ttl", Value::Int(120));

        match diff(&policy_schema(), &desired, &existing_state("web", 60)) {
            Diff::Update { changed, .. } => assert_eq!(changed, vec!["ttl".to_string()]),
            other => panic!("expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_for_force_new_change() {
        let desired = Resource::new("cookie_policy", "web")
            .with_attribute("name", Value::String("api".to_string()))
            .with_attribute("ttl", Value::Int(60));

        match diff(&policy_schema(), &desired, &existing_state("web", 60)) {
            Diff::Replace { forced, .. } => assert_eq!(forced, vec!["name".to_string()]),
            other => panic!("expected Replace, got {:?}", other),
        }
    }
}
