//! Application cookie stickiness policy resource
//!
//! A policy has no single vendor identifier: its identity is the load
//! balancer name, the listener port, and the policy name, joined into a
//! composite handle. The vendor has no concept of updating a policy in
//! place, so every attribute forces replacement. Deleting requires
//! detaching first, by replacing the listener's policy list with an
//! empty one.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use vela_core::adapter::{BoxFuture, ResourceAdapter};
use vela_core::error::{LifecycleError, LifecycleResult};
use vela_core::handle;
use vela_core::resource::{Attributes, Resource, ResourceId, State, Value, attr};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::VendorError;

/// The vendor's description of a policy
#[derive(Debug, Clone)]
pub struct PolicyDescription {
    pub policy_name: String,
    pub cookie_name: Option<String>,
}

/// Vendor API surface this resource kind needs.
///
/// `describe_policy` reports absence as `Ok(None)`; `delete_policy`
/// treats a vendor not-found as already deleted.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn create_cookie_policy(
        &self,
        load_balancer: &str,
        policy: &str,
        cookie_name: &str,
    ) -> Result<(), VendorError>;

    /// Replace the full policy list of a listener. An empty list detaches
    /// every policy.
    async fn set_listener_policies(
        &self,
        load_balancer: &str,
        port: i64,
        policies: &[String],
    ) -> Result<(), VendorError>;

    async fn describe_policy(
        &self,
        load_balancer: &str,
        policy: &str,
    ) -> Result<Option<PolicyDescription>, VendorError>;

    async fn delete_policy(&self, load_balancer: &str, policy: &str) -> Result<(), VendorError>;
}

/// Attribute contract for the cookie stickiness policy resource
pub fn cookie_policy_schema() -> ResourceSchema {
    ResourceSchema::new("cookie_policy")
        .with_description("An application cookie stickiness policy attached to a listener")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_validator(validate_policy_name),
        )
        .attribute(
            AttributeSchema::new("load_balancer", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("lb_port", AttributeType::Int)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("cookie_name", AttributeType::String)
                .required()
                .force_new(),
        )
}

static POLICY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9A-Za-z-]+$").expect("policy name pattern"));

fn validate_policy_name(value: &Value) -> Vec<String> {
    match value.as_str() {
        Some(s) if !POLICY_NAME.is_match(s) => {
            vec!["only alphanumeric characters and hyphens allowed".to_string()]
        }
        _ => Vec::new(),
    }
}

/// Lifecycle adapter for cookie stickiness policies
pub struct CookiePolicyAdapter<C> {
    api: C,
}

impl<C: LoadBalancerApi> CookiePolicyAdapter<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    async fn do_create(&self, id: ResourceId, attrs: Attributes) -> LifecycleResult<State> {
        cookie_policy_schema()
            .validate(&attrs)
            .map_err(crate::invalid)?;

        let name = attr::string(&attrs, "name")?;
        let load_balancer = attr::string(&attrs, "load_balancer")?;
        let lb_port = attr::int(&attrs, "lb_port")?;
        let cookie_name = attr::string(&attrs, "cookie_name")?;

        tracing::debug!(policy = %name, %load_balancer, "creating cookie stickiness policy");
        self.api
            .create_cookie_policy(&load_balancer, &name, &cookie_name)
            .await
            .map_err(|e| LifecycleError::vendor("creating cookie stickiness policy", e))?;

        self.api
            .set_listener_policies(&load_balancer, lb_port, std::slice::from_ref(&name))
            .await
            .map_err(|e| {
                LifecycleError::vendor("attaching cookie stickiness policy to listener", e)
            })?;

        let port = lb_port.to_string();
        let joined = handle::join(&[load_balancer.as_str(), port.as_str(), name.as_str()])?;
        self.do_read(id, &joined).await
    }

    async fn do_read(&self, id: ResourceId, composite: &str) -> LifecycleResult<State> {
        let (load_balancer, lb_port, name) = parse_handle(composite)?;

        let description = match self.api.describe_policy(&load_balancer, &name).await {
            Ok(Some(description)) => description,
            Ok(None) => return Ok(State::not_found(id)),
            Err(e) => {
                return Err(LifecycleError::vendor(
                    "describing cookie stickiness policy",
                    e,
                ));
            }
        };

        // The state is built complete or not at all; a description with
        // no cookie attribute is a vendor-side inconsistency.
        let cookie_name = description.cookie_name.ok_or_else(|| {
            LifecycleError::vendor(
                "describing cookie stickiness policy",
                format!("policy '{}' has no cookie name attribute", name),
            )
        })?;

        let mut attrs: Attributes = HashMap::new();
        attrs.insert("name".to_string(), Value::String(name));
        attrs.insert("load_balancer".to_string(), Value::String(load_balancer));
        attrs.insert("lb_port".to_string(), Value::Int(lb_port));
        attrs.insert("cookie_name".to_string(), Value::String(cookie_name));

        Ok(State::existing(id, attrs).with_handle(composite))
    }

    async fn do_delete(&self, composite: &str) -> LifecycleResult<()> {
        let (load_balancer, lb_port, name) = parse_handle(composite)?;

        // Detach first: replacing the listener's policy list with an
        // empty one is what unblocks the delete.
        tracing::debug!(policy = %name, %load_balancer, "detaching cookie stickiness policy");
        self.api
            .set_listener_policies(&load_balancer, lb_port, &[])
            .await
            .map_err(|e| LifecycleError::vendor("detaching cookie stickiness policy", e))?;

        self.api
            .delete_policy(&load_balancer, &name)
            .await
            .map_err(|e| LifecycleError::vendor("deleting cookie stickiness policy", e))
    }
}

fn parse_handle(composite: &str) -> LifecycleResult<(String, i64, String)> {
    let parts = handle::split(composite, 3)?;
    let port = parts[1].parse::<i64>().map_err(|_| {
        LifecycleError::validation(vec![format!(
            "handle port '{}' is not a number",
            parts[1]
        )])
    })?;
    Ok((parts[0].to_string(), port, parts[2].to_string()))
}

impl<C: LoadBalancerApi> ResourceAdapter for CookiePolicyAdapter<C> {
    fn kind(&self) -> &'static str {
        "cookie_policy"
    }

    fn schema(&self) -> ResourceSchema {
        cookie_policy_schema()
    }

    fn create(&self, desired: &Resource) -> BoxFuture<'_, LifecycleResult<State>> {
        let id = desired.id.clone();
        let attrs = desired.attributes.clone();
        Box::pin(async move { self.do_create(id, attrs).await })
    }

    fn read(&self, id: &ResourceId, handle: &str) -> BoxFuture<'_, LifecycleResult<State>> {
        let id = id.clone();
        let handle = handle.to_string();
        Box::pin(async move { self.do_read(id, &handle).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        _handle: &str,
        _from: &State,
        _to: &Resource,
    ) -> BoxFuture<'_, LifecycleResult<State>> {
        let id = id.clone();
        Box::pin(async move {
            Err(LifecycleError::validation(vec![format!(
                "{} has no in-place updates, delete and recreate",
                id
            )]))
        })
    }

    fn delete(&self, _id: &ResourceId, handle: &str) -> BoxFuture<'_, LifecycleResult<()>> {
        let handle = handle.to_string();
        Box::pin(async move { self.do_delete(&handle).await })
    }
}
