//! Search domain resource
//!
//! Managed search domains settle asynchronously on the vendor side:
//! creation and configuration changes flip a processing flag that clears
//! minutes later, so every mutation here ends in a completion wait. The
//! handle is the domain ARN, assigned by the vendor on creation.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use vela_core::adapter::{BoxFuture, ResourceAdapter};
use vela_core::error::{LifecycleError, LifecycleResult, Stage};
use vela_core::resource::{Attributes, Resource, ResourceId, State, Value, attr};
use vela_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};
use vela_core::wait::{self, CancelToken, Poll, PollFailure, WaitSpec};

use crate::VendorError;
use crate::util::normalize_json;

pub const DEFAULT_INSTANCE_TYPE: &str = "m3.medium.elasticsearch";
const POLL_INTERVAL: Duration = Duration::from_secs(15);
const CREATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(25 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Cluster topology block, always sent to the vendor in full
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub instance_type: String,
    pub instance_count: i64,
    pub dedicated_master_enabled: bool,
    pub dedicated_master_type: Option<String>,
    pub dedicated_master_count: Option<i64>,
    pub zone_awareness_enabled: bool,
}

/// EBS storage block
#[derive(Debug, Clone, PartialEq)]
pub struct EbsOptions {
    pub ebs_enabled: bool,
    pub iops: Option<i64>,
    pub volume_size: Option<i64>,
    pub volume_type: Option<String>,
}

/// Automated snapshot block
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions {
    pub automated_snapshot_start_hour: i64,
}

/// Domain creation/modification request. `None` groups are omitted from
/// the vendor call; present groups are sent whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainSpec {
    pub domain_name: String,
    pub access_policies: Option<String>,
    pub advanced_options: HashMap<String, String>,
    pub cluster_config: Option<ClusterConfig>,
    pub ebs_options: Option<EbsOptions>,
    pub snapshot_options: Option<SnapshotOptions>,
}

/// The vendor's view of a domain
#[derive(Debug, Clone)]
pub struct DomainStatus {
    pub arn: String,
    pub domain_id: String,
    pub domain_name: String,
    /// Populated once the domain is reachable; absent while it settles
    pub endpoint: Option<String>,
    /// Set while a configuration change is being applied
    pub processing: bool,
    pub access_policies: Option<String>,
    pub advanced_options: HashMap<String, String>,
    pub cluster_config: Option<ClusterConfig>,
    pub ebs_options: Option<EbsOptions>,
    pub snapshot_options: Option<SnapshotOptions>,
}

/// Vendor API surface this resource kind needs.
///
/// `describe_domain` reports absence as `Ok(None)`, keeping not-found
/// distinct from transport errors.
#[async_trait]
pub trait SearchDomainApi: Send + Sync {
    async fn create_domain(&self, spec: &DomainSpec) -> Result<DomainStatus, VendorError>;
    async fn describe_domain(&self, domain_name: &str)
    -> Result<Option<DomainStatus>, VendorError>;
    async fn update_domain(&self, spec: &DomainSpec) -> Result<(), VendorError>;
    async fn delete_domain(&self, domain_name: &str) -> Result<(), VendorError>;
}

/// Attribute contract for the search domain resource
pub fn search_domain_schema() -> ResourceSchema {
    ResourceSchema::new("search_domain")
        .with_description("A managed search domain")
        .attribute(
            AttributeSchema::new("domain_name", AttributeType::String)
                .required()
                .force_new()
                .with_validator(validate_domain_name),
        )
        .attribute(AttributeSchema::new(
            "access_policies",
            AttributeType::String,
        ))
        .attribute(
            AttributeSchema::new(
                "advanced_options",
                AttributeType::Map(Box::new(AttributeType::String)),
            )
            .optional_computed(),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("domain_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("endpoint", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new(
                "ebs_options",
                AttributeType::Block(
                    BlockSchema::new("ebs_options")
                        .attribute(
                            AttributeSchema::new("ebs_enabled", AttributeType::Bool).required(),
                        )
                        .attribute(AttributeSchema::new("iops", AttributeType::Int))
                        .attribute(AttributeSchema::new("volume_size", AttributeType::Int))
                        .attribute(AttributeSchema::new("volume_type", AttributeType::String)),
                ),
            )
            .optional_computed(),
        )
        .attribute(
            AttributeSchema::new(
                "cluster_config",
                AttributeType::Block(
                    BlockSchema::new("cluster_config")
                        .attribute(
                            AttributeSchema::new("dedicated_master_count", AttributeType::Int),
                        )
                        .attribute(
                            AttributeSchema::new("dedicated_master_enabled", AttributeType::Bool)
                                .with_default(Value::Bool(false)),
                        )
                        .attribute(AttributeSchema::new(
                            "dedicated_master_type",
                            AttributeType::String,
                        ))
                        .attribute(
                            AttributeSchema::new("instance_count", AttributeType::Int)
                                .with_default(Value::Int(1)),
                        )
                        .attribute(
                            AttributeSchema::new("instance_type", AttributeType::String)
                                .with_default(Value::String(DEFAULT_INSTANCE_TYPE.to_string())),
                        )
                        .attribute(AttributeSchema::new(
                            "zone_awareness_enabled",
                            AttributeType::Bool,
                        )),
                ),
            )
            .optional_computed(),
        )
        .attribute(AttributeSchema::new(
            "snapshot_options",
            AttributeType::Block(BlockSchema::new("snapshot_options").attribute(
                AttributeSchema::new("automated_snapshot_start_hour", AttributeType::Int)
                    .required(),
            )),
        ))
}

static NAME_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9A-Za-z]+").expect("domain name start pattern"));
static NAME_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9A-Za-z][0-9a-z-]+$").expect("domain name pattern"));

fn validate_domain_name(value: &Value) -> Vec<String> {
    let Some(s) = value.as_str() else {
        return Vec::new();
    };
    let mut violations = Vec::new();
    if !NAME_START.is_match(s) {
        violations.push("must start with a letter or number".to_string());
    }
    if !NAME_FULL.is_match(s) {
        violations.push("can only contain lowercase characters, numbers and hyphens".to_string());
    }
    violations
}

/// Lifecycle adapter for search domains
pub struct SearchDomainAdapter<C> {
    api: C,
    create_wait: WaitSpec,
    update_wait: WaitSpec,
    delete_wait: WaitSpec,
    cancel: Option<CancelToken>,
}

impl<C: SearchDomainApi> SearchDomainAdapter<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            create_wait: WaitSpec::new(CREATE_TIMEOUT, POLL_INTERVAL),
            update_wait: WaitSpec::new(UPDATE_TIMEOUT, POLL_INTERVAL),
            delete_wait: WaitSpec::new(DELETE_TIMEOUT, POLL_INTERVAL),
            cancel: None,
        }
    }

    pub fn with_waits(mut self, create: WaitSpec, update: WaitSpec, delete: WaitSpec) -> Self {
        self.create_wait = create;
        self.update_wait = update;
        self.delete_wait = delete;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    async fn do_create(&self, id: ResourceId, attrs: Attributes) -> LifecycleResult<State> {
        search_domain_schema()
            .validate(&attrs)
            .map_err(crate::invalid)?;
        let spec = expand_spec(&attrs)?;

        tracing::debug!(domain = %spec.domain_name, "creating search domain");
        let status = self
            .api
            .create_domain(&spec)
            .await
            .map_err(|e| LifecycleError::vendor("creating search domain", e))?;

        // The vendor has assigned the ARN; from here on, failures must
        // keep it attached so the caller can still target the domain.
        let handle = status.arn;

        tracing::debug!(%handle, "waiting for search domain to become active");
        let settled = self
            .wait_for_domain(&handle, &spec.domain_name, Stage::Create, self.create_wait, true)
            .await;
        if let Err(err) = settled {
            return Err(LifecycleError::incomplete(handle, err));
        }

        match self.do_read(id, &handle).await {
            Ok(state) => Ok(state),
            Err(err) => Err(LifecycleError::incomplete(handle, err)),
        }
    }

    async fn do_read(&self, id: ResourceId, handle: &str) -> LifecycleResult<State> {
        let name = domain_name_from_handle(handle);
        match self.api.describe_domain(name).await {
            Ok(Some(status)) => Ok(flatten_status(id, &status)),
            Ok(None) => Ok(State::not_found(id)),
            Err(e) => Err(LifecycleError::vendor("describing search domain", e)),
        }
    }

    async fn do_update(
        &self,
        id: ResourceId,
        handle: String,
        from: Attributes,
        to: Attributes,
    ) -> LifecycleResult<State> {
        let schema = search_domain_schema();
        schema.validate(&to).map_err(crate::invalid)?;

        let forced = schema.replacement_attributes(&from, &to);
        if !forced.is_empty() {
            return Err(LifecycleError::validation(vec![format!(
                "cannot update {} in place, delete and recreate",
                forced.join(", ")
            )]));
        }

        let changed = schema.changed_attributes(&from, &to);
        let full = expand_spec(&to)?;

        // Block groups only support whole-group replacement: a changed
        // group is resent in full, an unchanged one is omitted.
        let mut spec = DomainSpec {
            domain_name: full.domain_name.clone(),
            ..Default::default()
        };
        for group in &changed {
            match group.as_str() {
                "access_policies" => spec.access_policies = full.access_policies.clone(),
                "advanced_options" => spec.advanced_options = full.advanced_options.clone(),
                "cluster_config" => spec.cluster_config = full.cluster_config.clone(),
                "ebs_options" => spec.ebs_options = full.ebs_options.clone(),
                "snapshot_options" => spec.snapshot_options = full.snapshot_options.clone(),
                _ => {}
            }
        }

        tracing::debug!(domain = %spec.domain_name, ?changed, "updating search domain config");
        self.api
            .update_domain(&spec)
            .await
            .map_err(|e| LifecycleError::vendor("updating search domain config", e))?;

        self.wait_for_domain(&handle, &spec.domain_name, Stage::Update, self.update_wait, false)
            .await?;

        self.do_read(id, &handle).await
    }

    async fn do_delete(&self, handle: String) -> LifecycleResult<()> {
        let name = domain_name_from_handle(&handle).to_string();

        tracing::debug!(domain = %name, "deleting search domain");
        self.api
            .delete_domain(&name)
            .await
            .map_err(|e| LifecycleError::vendor("deleting search domain", e))?;

        let api = &self.api;
        let name_ref: &str = &name;
        wait::wait_until(
            &handle,
            Stage::Delete,
            self.delete_wait,
            self.cancel.clone(),
            move || {
                let fut = api.describe_domain(name_ref);
                async move {
                    match fut.await {
                        // Gone, or present but settled: deletion is done
                        Ok(None) => Ok(Poll::Ready),
                        Ok(Some(status)) if !status.processing => Ok(Poll::Ready),
                        Ok(Some(_)) => Ok(Poll::Pending(Some(
                            "domain is still processing".to_string(),
                        ))),
                        Err(e) => Err(PollFailure::Fatal(LifecycleError::vendor(
                            "describing search domain",
                            e,
                        ))),
                    }
                }
            },
        )
        .await
    }

    /// Wait until the domain settles. Creation additionally requires the
    /// endpoint to be populated; updates only need the processing flag
    /// cleared.
    async fn wait_for_domain(
        &self,
        handle: &str,
        domain_name: &str,
        stage: Stage,
        spec: WaitSpec,
        require_endpoint: bool,
    ) -> LifecycleResult<()> {
        let api = &self.api;
        wait::wait_until(handle, stage, spec, self.cancel.clone(), move || {
            let fut = api.describe_domain(domain_name);
            async move {
                match fut.await {
                    Ok(Some(status)) => {
                        if !status.processing && (!require_endpoint || status.endpoint.is_some()) {
                            Ok(Poll::Ready)
                        } else {
                            Ok(Poll::Pending(Some(
                                "domain is still processing".to_string(),
                            )))
                        }
                    }
                    // Freshly created domains can be briefly invisible
                    Ok(None) => Err(PollFailure::Transient(
                        "domain not visible yet".to_string(),
                    )),
                    Err(e) => Err(PollFailure::Fatal(LifecycleError::vendor(
                        "describing search domain",
                        e,
                    ))),
                }
            }
        })
        .await
    }
}

impl<C: SearchDomainApi> ResourceAdapter for SearchDomainAdapter<C> {
    fn kind(&self) -> &'static str {
        "search_domain"
    }

    fn schema(&self) -> ResourceSchema {
        search_domain_schema()
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
        handle: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, LifecycleResult<State>> {
        let id = id.clone();
        let handle = handle.to_string();
        let from = from.attributes.clone();
        let to = to.attributes.clone();
        Box::pin(async move { self.do_update(id, handle, from, to).await })
    }

    fn delete(&self, _id: &ResourceId, handle: &str) -> BoxFuture<'_, LifecycleResult<()>> {
        let handle = handle.to_string();
        Box::pin(async move { self.do_delete(handle).await })
    }
}

/// The domain name is the final path segment of the ARN handle; a bare
/// name is accepted as-is.
fn domain_name_from_handle(handle: &str) -> &str {
    match handle.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => handle,
    }
}

fn expand_spec(attrs: &Attributes) -> LifecycleResult<DomainSpec> {
    let mut spec = DomainSpec {
        domain_name: attr::string(attrs, "domain_name")?,
        ..Default::default()
    };
    spec.access_policies = attr::opt_string(attrs, "access_policies")?;
    if let Some(options) = attr::opt_string_map(attrs, "advanced_options")? {
        spec.advanced_options = options;
    }
    if let Some(fields) = attr::singleton_block(attrs, "cluster_config")? {
        spec.cluster_config = Some(expand_cluster_config(fields)?);
    }
    if let Some(fields) = attr::singleton_block(attrs, "ebs_options")? {
        spec.ebs_options = Some(expand_ebs_options(fields)?);
    }
    if let Some(fields) = attr::singleton_block(attrs, "snapshot_options")? {
        spec.snapshot_options = Some(SnapshotOptions {
            automated_snapshot_start_hour: attr::int(fields, "automated_snapshot_start_hour")?,
        });
    }
    Ok(spec)
}

fn expand_cluster_config(fields: &Attributes) -> LifecycleResult<ClusterConfig> {
    Ok(ClusterConfig {
        instance_type: attr::opt_string(fields, "instance_type")?
            .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
        instance_count: attr::opt_int(fields, "instance_count")?.unwrap_or(1),
        dedicated_master_enabled: attr::opt_bool(fields, "dedicated_master_enabled")?
            .unwrap_or(false),
        dedicated_master_type: attr::opt_string(fields, "dedicated_master_type")?,
        dedicated_master_count: attr::opt_int(fields, "dedicated_master_count")?,
        zone_awareness_enabled: attr::opt_bool(fields, "zone_awareness_enabled")?.unwrap_or(false),
    })
}

fn expand_ebs_options(fields: &Attributes) -> LifecycleResult<EbsOptions> {
    Ok(EbsOptions {
        ebs_enabled: attr::boolean(fields, "ebs_enabled")?,
        iops: attr::opt_int(fields, "iops")?,
        volume_size: attr::opt_int(fields, "volume_size")?,
        volume_type: attr::opt_string(fields, "volume_type")?,
    })
}

fn flatten_status(id: ResourceId, status: &DomainStatus) -> State {
    let mut attrs: Attributes = HashMap::new();
    attrs.insert(
        "domain_name".to_string(),
        Value::String(status.domain_name.clone()),
    );
    attrs.insert("arn".to_string(), Value::String(status.arn.clone()));
    attrs.insert(
        "domain_id".to_string(),
        Value::String(status.domain_id.clone()),
    );
    if let Some(endpoint) = &status.endpoint {
        attrs.insert("endpoint".to_string(), Value::String(endpoint.clone()));
    }
    if let Some(policies) = &status.access_policies {
        if !policies.is_empty() {
            attrs.insert(
                "access_policies".to_string(),
                Value::String(normalize_json(policies)),
            );
        }
    }
    if !status.advanced_options.is_empty() {
        let map = status
            .advanced_options
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        attrs.insert("advanced_options".to_string(), Value::Map(map));
    }
    if let Some(cluster) = &status.cluster_config {
        attrs.insert(
            "cluster_config".to_string(),
            flatten_cluster_config(cluster),
        );
    }
    if let Some(ebs) = &status.ebs_options {
        attrs.insert("ebs_options".to_string(), flatten_ebs_options(ebs));
    }
    if let Some(snapshot) = &status.snapshot_options {
        let mut fields = HashMap::new();
        fields.insert(
            "automated_snapshot_start_hour".to_string(),
            Value::Int(snapshot.automated_snapshot_start_hour),
        );
        attrs.insert(
            "snapshot_options".to_string(),
            Value::List(vec![Value::Map(fields)]),
        );
    }

    State::existing(id, attrs).with_handle(status.arn.clone())
}

fn flatten_cluster_config(cluster: &ClusterConfig) -> Value {
    let mut fields = HashMap::new();
    fields.insert(
        "instance_type".to_string(),
        Value::String(cluster.instance_type.clone()),
    );
    fields.insert(
        "instance_count".to_string(),
        Value::Int(cluster.instance_count),
    );
    fields.insert(
        "dedicated_master_enabled".to_string(),
        Value::Bool(cluster.dedicated_master_enabled),
    );
    if let Some(master_type) = &cluster.dedicated_master_type {
        fields.insert(
            "dedicated_master_type".to_string(),
            Value::String(master_type.clone()),
        );
    }
    if let Some(count) = cluster.dedicated_master_count {
        fields.insert("dedicated_master_count".to_string(), Value::Int(count));
    }
    fields.insert(
        "zone_awareness_enabled".to_string(),
        Value::Bool(cluster.zone_awareness_enabled),
    );
    Value::List(vec![Value::Map(fields)])
}

fn flatten_ebs_options(ebs: &EbsOptions) -> Value {
    let mut fields = HashMap::new();
    fields.insert("ebs_enabled".to_string(), Value::Bool(ebs.ebs_enabled));
    if let Some(iops) = ebs.iops {
        fields.insert("iops".to_string(), Value::Int(iops));
    }
    if let Some(size) = ebs.volume_size {
        fields.insert("volume_size".to_string(), Value::Int(size));
    }
    if let Some(volume_type) = &ebs.volume_type {
        fields.insert("volume_type".to_string(), Value::String(volume_type.clone()));
    }
    Value::List(vec![Value::Map(fields)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const ARN: &str = "arn:aws:es:us-east-1:123456789012:domain/logs-test";

    fn ready_status() -> DomainStatus {
        DomainStatus {
            arn: ARN.to_string(),
            domain_id: "123456789012/logs-test".to_string(),
            domain_name: "logs-test".to_string(),
            endpoint: Some("search-logs-test.us-east-1.es.example.com".to_string()),
            processing: false,
            access_policies: None,
            advanced_options: HashMap::new(),
            cluster_config: Some(ClusterConfig {
                instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
                instance_count: 3,
                dedicated_master_enabled: false,
                dedicated_master_type: None,
                dedicated_master_count: None,
                zone_awareness_enabled: false,
            }),
            ebs_options: None,
            snapshot_options: None,
        }
    }

    fn processing_status() -> DomainStatus {
        DomainStatus {
            endpoint: None,
            processing: true,
            ..ready_status()
        }
    }

    #[derive(Default)]
    struct StubInner {
        create_calls: Mutex<Vec<DomainSpec>>,
        update_calls: Mutex<Vec<DomainSpec>>,
        delete_calls: Mutex<Vec<String>>,
        /// Scripted describe responses; when drained, `fallback` repeats
        describe_script: Mutex<VecDeque<Option<DomainStatus>>>,
        fallback: Mutex<Option<DomainStatus>>,
    }

    #[derive(Clone, Default)]
    struct StubApi {
        inner: Arc<StubInner>,
    }

    impl StubApi {
        fn with_fallback(self, status: Option<DomainStatus>) -> Self {
            *self.inner.fallback.lock().unwrap() = status;
            self
        }

        fn script(self, responses: Vec<Option<DomainStatus>>) -> Self {
            *self.inner.describe_script.lock().unwrap() = responses.into();
            self
        }

        fn create_calls(&self) -> Vec<DomainSpec> {
            self.inner.create_calls.lock().unwrap().clone()
        }

        fn update_calls(&self) -> Vec<DomainSpec> {
            self.inner.update_calls.lock().unwrap().clone()
        }

        fn delete_calls(&self) -> Vec<String> {
            self.inner.delete_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchDomainApi for StubApi {
        async fn create_domain(&self, spec: &DomainSpec) -> Result<DomainStatus, VendorError> {
            self.inner.create_calls.lock().unwrap().push(spec.clone());
            Ok(processing_status())
        }

        async fn describe_domain(
            &self,
            _domain_name: &str,
        ) -> Result<Option<DomainStatus>, VendorError> {
            if let Some(scripted) = self.inner.describe_script.lock().unwrap().pop_front() {
                return Ok(scripted);
            }
            Ok(self.inner.fallback.lock().unwrap().clone())
        }

        async fn update_domain(&self, spec: &DomainSpec) -> Result<(), VendorError> {
            self.inner.update_calls.lock().unwrap().push(spec.clone());
            Ok(())
        }

        async fn delete_domain(&self, domain_name: &str) -> Result<(), VendorError> {
            self.inner
                .delete_calls
                .lock()
                .unwrap()
                .push(domain_name.to_string());
            Ok(())
        }
    }

    fn short_waits() -> (WaitSpec, WaitSpec, WaitSpec) {
        let spec = WaitSpec::new(Duration::from_secs(60), Duration::from_secs(5));
        (spec, spec, spec)
    }

    fn adapter(api: StubApi) -> SearchDomainAdapter<StubApi> {
        let (c, u, d) = short_waits();
        SearchDomainAdapter::new(api).with_waits(c, u, d)
    }

    fn cluster_block(count: i64) -> Value {
        let mut fields = HashMap::new();
        fields.insert("instance_count".to_string(), Value::Int(count));
        Value::List(vec![Value::Map(fields)])
    }

    fn desired(count: i64) -> Resource {
        Resource::new("search_domain", "logs")
            .with_attribute("domain_name", Value::String("logs-test".to_string()))
            .with_attribute("cluster_config", cluster_block(count))
    }

    #[tokio::test(start_paused = true)]
    async fn create_issues_one_call_and_waits_for_endpoint() {
        let api = StubApi::default()
            .script(vec![Some(processing_status())])
            .with_fallback(Some(ready_status()));
        let adapter = adapter(api.clone());

        let state = adapter.create(&desired(3)).await.unwrap();

        let creates = api.create_calls();
        assert_eq!(creates.len(), 1);
        let cluster = creates[0].cluster_config.as_ref().unwrap();
        assert_eq!(cluster.instance_count, 3);
        assert_eq!(cluster.instance_type, DEFAULT_INSTANCE_TYPE);

        assert_eq!(state.handle.as_deref(), Some(ARN));
        assert!(state.attributes.contains_key("endpoint"));
        assert!(state.attributes.contains_key("domain_id"));
    }

    #[tokio::test(start_paused = true)]
    async fn two_cluster_config_blocks_fail_before_any_vendor_call() {
        let api = StubApi::default();
        let adapter = adapter(api.clone());

        let mut fields = HashMap::new();
        fields.insert("instance_count".to_string(), Value::Int(3));
        let resource = Resource::new("search_domain", "logs")
            .with_attribute("domain_name", Value::String("logs-test".to_string()))
            .with_attribute(
                "cluster_config",
                Value::List(vec![
                    Value::Map(fields.clone()),
                    Value::Map(fields),
                ]),
            );

        let err = adapter.create(&resource).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
        assert!(err.to_string().contains("cluster_config"));
        assert!(api.create_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_survives_a_create_timeout_and_drives_delete() {
        // Domain never stops processing: the wait times out, but the ARN
        // the vendor assigned must still reach the caller.
        let api = StubApi::default().with_fallback(Some(processing_status()));
        let adapter = adapter(api.clone());

        let err = adapter.create(&desired(3)).await.unwrap_err();
        assert_eq!(err.handle(), Some(ARN));
        match &err {
            LifecycleError::Incomplete { source, .. } => {
                assert!(matches!(**source, LifecycleError::Timeout { .. }));
            }
            other => panic!("expected Incomplete, got {:?}", other),
        }

        // Delete with that handle, no prior successful Read
        let handle = err.handle().unwrap().to_string();
        *api.inner.fallback.lock().unwrap() = None;
        let id = ResourceId::new("search_domain", "logs");
        adapter.delete(&id, &handle).await.unwrap();
        assert_eq!(api.delete_calls(), vec!["logs-test".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn read_not_found_is_a_tagged_state() {
        let api = StubApi::default();
        let adapter = adapter(api);

        let id = ResourceId::new("search_domain", "logs");
        let state = adapter.read(&id, ARN).await.unwrap();
        assert!(!state.exists);
        assert!(state.attributes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_resends_the_whole_changed_block() {
        let api = StubApi::default().with_fallback(Some(ready_status()));
        let adapter = adapter(api.clone());

        let id = ResourceId::new("search_domain", "logs");
        let from = flatten_status(id.clone(), &ready_status());

        // Desired differs from remote only in instance_count
        let mut fields = HashMap::new();
        fields.insert("instance_count".to_string(), Value::Int(5));
        fields.insert(
            "instance_type".to_string(),
            Value::String(DEFAULT_INSTANCE_TYPE.to_string()),
        );
        fields.insert("dedicated_master_enabled".to_string(), Value::Bool(false));
        fields.insert("zone_awareness_enabled".to_string(), Value::Bool(false));
        let to = Resource::new("search_domain", "logs")
            .with_attribute("domain_name", Value::String("logs-test".to_string()))
            .with_attribute("cluster_config", Value::List(vec![Value::Map(fields)]));

        adapter.update(&id, ARN, &from, &to).await.unwrap();

        let updates = api.update_calls();
        assert_eq!(updates.len(), 1);
        // Every field of the block is present, not just the changed one
        assert_eq!(
            updates[0].cluster_config,
            Some(ClusterConfig {
                instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
                instance_count: 5,
                dedicated_master_enabled: false,
                dedicated_master_type: None,
                dedicated_master_count: None,
                zone_awareness_enabled: false,
            })
        );
        // Unchanged groups are omitted
        assert!(updates[0].access_policies.is_none());
        assert!(updates[0].snapshot_options.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn update_rejects_force_new_changes() {
        let api = StubApi::default().with_fallback(Some(ready_status()));
        let adapter = adapter(api.clone());

        let id = ResourceId::new("search_domain", "logs");
        let from = flatten_status(id.clone(), &ready_status());
        let to = Resource::new("search_domain", "logs")
            .with_attribute("domain_name", Value::String("metrics".to_string()));

        let err = adapter.update(&id, ARN, &from, &to).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
        assert!(err.to_string().contains("domain_name"));
        assert!(api.update_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_domain_name_fails_validation() {
        let api = StubApi::default();
        let adapter = adapter(api.clone());

        let resource = Resource::new("search_domain", "logs")
            .with_attribute("domain_name", Value::String("-bad_Name".to_string()));

        let err = adapter.create(&resource).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
        assert!(api.create_calls().is_empty());
    }

    #[test]
    fn domain_name_from_arn_handle() {
        assert_eq!(domain_name_from_handle(ARN), "logs-test");
        assert_eq!(domain_name_from_handle("logs-test"), "logs-test");
    }
}
