//! Effect - A single pending lifecycle action

use crate::resource::{Resource, ResourceId, State};

/// One action against a resource, produced by diffing and consumed by the
/// interpreter. No side effects occur until an Effect is executed.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Refresh remote state for a handle
    Read { id: ResourceId, handle: String },
    /// Create a resource from declared attributes
    Create(Resource),
    /// Modify a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Delete a resource by its recorded handle
    Delete {
        id: ResourceId,
        handle: Option<String>,
    },
}

impl Effect {
    /// Whether executing this Effect mutates remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read { .. })
    }

    pub fn id(&self) -> &ResourceId {
        match self {
            Effect::Read { id, .. } => id,
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_not_mutating() {
        let effect = Effect::Read {
            id: ResourceId::new("search_domain", "logs"),
            handle: "arn:logs".to_string(),
        };
        assert!(!effect.is_mutating());
        assert_eq!(effect.id().name, "logs");
    }

    #[test]
    fn create_is_mutating() {
        let effect = Effect::Create(Resource::new("search_domain", "logs"));
        assert!(effect.is_mutating());
    }
}
