//! Adapter - The lifecycle contract each resource kind implements
//!
//! A ResourceAdapter translates declared attributes into vendor API calls
//! and reconciles the vendor's answers back into the declared attribute
//! shape. All operations are async and involve side effects.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::LifecycleResult;
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle contract for one resource kind
///
/// There are no implicit transitions between operations; the caller
/// sequences them. Each call runs to completion, including any embedded
/// completion wait, before returning.
pub trait ResourceAdapter: Send + Sync {
    /// Resource kind this adapter manages (e.g., "search_domain")
    fn kind(&self) -> &'static str;

    /// Static attribute contract for this resource kind
    fn schema(&self) -> ResourceSchema;

    /// Create the resource from declared attributes.
    ///
    /// The vendor-assigned handle is recorded as soon as the vendor
    /// returns it; failures after that point surface as
    /// `LifecycleError::Incomplete` carrying the handle, so an
    /// interrupted create never orphans an untracked remote resource.
    fn create(&self, desired: &Resource) -> BoxFuture<'_, LifecycleResult<State>>;

    /// Fetch the vendor's authoritative state for a handle.
    ///
    /// A vendor "not found" yields `State::not_found`, never an error and
    /// never a partially populated state.
    fn read(&self, id: &ResourceId, handle: &str) -> BoxFuture<'_, LifecycleResult<State>>;

    /// Apply in-place modifications for changed, non-force_new attributes.
    ///
    /// Attribute groups that only support whole-block replacement are
    /// resent in full even when a single sub-field changed.
    fn update(
        &self,
        id: &ResourceId,
        handle: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, LifecycleResult<State>>;

    /// Delete the remote resource.
    ///
    /// Blocking sub-objects are detached first; a vendor "not found"
    /// during deletion counts as success.
    fn delete(&self, id: &ResourceId, handle: &str) -> BoxFuture<'_, LifecycleResult<()>>;
}

/// Immutable set of adapters, keyed by resource kind.
///
/// Built explicitly by the caller and passed where needed; there is no
/// process-wide registry.
#[derive(Default)]
pub struct AdapterSet {
    adapters: HashMap<&'static str, Box<dyn ResourceAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Box<dyn ResourceAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&dyn ResourceAdapter> {
        self.adapters.get(kind).map(|a| a.as_ref())
    }

    pub fn schema(&self, kind: &str) -> Option<ResourceSchema> {
        self.get(kind).map(|a| a.schema())
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}
