//! Machine image copy resource
//!
//! Copying an image returns the new image's identifier immediately while
//! the copy runs in the background. The identifier is recorded before the
//! completion wait starts, so an interrupted create never loses track of
//! the vendor-side image.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use vela_core::adapter::{BoxFuture, ResourceAdapter};
use vela_core::error::{LifecycleError, LifecycleResult, Stage};
use vela_core::resource::{Attributes, Resource, ResourceId, State, Value, attr};
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use vela_core::wait::{self, CancelToken, Poll, PollFailure, WaitSpec};

use crate::VendorError;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const CREATE_TIMEOUT: Duration = Duration::from_secs(40 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(90 * 60);

/// Vendor image lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageState {
    Pending,
    Available,
    Failed,
    Other(String),
}

impl ImageState {
    pub fn from_vendor(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "available" => Self::Available,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

/// The vendor's view of an image
#[derive(Debug, Clone)]
pub struct ImageDescription {
    pub image_id: String,
    pub state: ImageState,
    pub state_reason: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Vendor API surface this resource kind needs.
///
/// `describe_image` reports absence as `Ok(None)`; `deregister_image`
/// treats a vendor not-found as already deleted.
#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Start the copy and return the new image's identifier
    async fn copy_image(
        &self,
        name: &str,
        description: Option<&str>,
        source_image_id: &str,
        source_region: &str,
    ) -> Result<String, VendorError>;

    async fn describe_image(&self, image_id: &str)
    -> Result<Option<ImageDescription>, VendorError>;

    async fn update_image_description(
        &self,
        image_id: &str,
        description: &str,
    ) -> Result<(), VendorError>;

    async fn deregister_image(&self, image_id: &str) -> Result<(), VendorError>;
}

/// Attribute contract for the image copy resource
pub fn image_copy_schema() -> ResourceSchema {
    ResourceSchema::new("image_copy")
        .with_description("A machine image copied from another region")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("source_image_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("source_image_region", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("image_state", AttributeType::String).computed())
}

/// Lifecycle adapter for image copies
pub struct ImageCopyAdapter<C> {
    api: C,
    create_wait: WaitSpec,
    update_wait: WaitSpec,
    delete_wait: WaitSpec,
    cancel: Option<CancelToken>,
}

impl<C: ImageApi> ImageCopyAdapter<C> {
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
        image_copy_schema()
            .validate(&attrs)
            .map_err(crate::invalid)?;

        let name = attr::string(&attrs, "name")?;
        let description = attr::opt_string(&attrs, "description")?;
        let source_image_id = attr::string(&attrs, "source_image_id")?;
        let source_region = attr::string(&attrs, "source_image_region")?;

        tracing::debug!(%source_image_id, %source_region, "copying image");
        let handle = self
            .api
            .copy_image(&name, description.as_deref(), &source_image_id, &source_region)
            .await
            .map_err(|e| LifecycleError::vendor("copying image", e))?;

        // The identifier exists from here on, whatever happens to the wait
        tracing::debug!(%handle, "waiting for image to become available");
        let settled = self
            .wait_for_available(&handle, Stage::Create, self.create_wait)
            .await;
        if let Err(err) = settled {
            return Err(LifecycleError::incomplete(handle, err));
        }

        match self.do_read(id, &handle).await {
            Ok(mut state) => {
                // Create-only inputs the vendor does not echo back stay in
                // the state; remote values win where both exist.
                for (key, value) in attrs {
                    state.attributes.entry(key).or_insert(value);
                }
                Ok(state)
            }
            Err(err) => Err(LifecycleError::incomplete(handle, err)),
        }
    }

    async fn do_read(&self, id: ResourceId, handle: &str) -> LifecycleResult<State> {
        let image = match self.api.describe_image(handle).await {
            Ok(Some(image)) => image,
            Ok(None) => return Ok(State::not_found(id)),
            Err(e) => return Err(LifecycleError::vendor("describing image", e)),
        };

        let mut attrs: Attributes = HashMap::new();
        if let Some(name) = &image.name {
            attrs.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(description) = &image.description {
            attrs.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        attrs.insert(
            "image_state".to_string(),
            Value::String(image.state.as_str().to_string()),
        );

        Ok(State::existing(id, attrs).with_handle(image.image_id))
    }

    async fn do_update(
        &self,
        id: ResourceId,
        handle: String,
        from: Attributes,
        to: Attributes,
    ) -> LifecycleResult<State> {
        let schema = image_copy_schema();
        schema.validate(&to).map_err(crate::invalid)?;

        let forced = schema.replacement_attributes(&from, &to);
        if !forced.is_empty() {
            return Err(LifecycleError::validation(vec![format!(
                "cannot update {} in place, delete and recreate",
                forced.join(", ")
            )]));
        }

        let changed = schema.changed_attributes(&from, &to);
        if changed.iter().any(|name| name == "description") {
            if let Some(description) = attr::opt_string(&to, "description")? {
                tracing::debug!(%handle, "updating image description");
                self.api
                    .update_image_description(&handle, &description)
                    .await
                    .map_err(|e| LifecycleError::vendor("updating image description", e))?;
            }
        }

        self.wait_for_available(&handle, Stage::Update, self.update_wait)
            .await?;

        self.do_read(id, &handle).await
    }

    async fn do_delete(&self, handle: String) -> LifecycleResult<()> {
        tracing::debug!(%handle, "deregistering image");
        self.api
            .deregister_image(&handle)
            .await
            .map_err(|e| LifecycleError::vendor("deregistering image", e))?;

        let api = &self.api;
        let handle_ref: &str = &handle;
        wait::wait_until(
            handle_ref,
            Stage::Delete,
            self.delete_wait,
            self.cancel.clone(),
            move || {
                let fut = api.describe_image(handle_ref);
                async move {
                    match fut.await {
                        Ok(None) => Ok(Poll::Ready),
                        Ok(Some(image)) => Ok(Poll::Pending(Some(format!(
                            "image is still {}",
                            image.state.as_str()
                        )))),
                        Err(e) => {
                            Err(PollFailure::Fatal(LifecycleError::vendor(
                                "describing image",
                                e,
                            )))
                        }
                    }
                }
            },
        )
        .await
    }

    async fn wait_for_available(
        &self,
        handle: &str,
        stage: Stage,
        spec: WaitSpec,
    ) -> LifecycleResult<()> {
        let api = &self.api;
        wait::wait_until(handle, stage, spec, self.cancel.clone(), move || {
            let fut = api.describe_image(handle);
            async move {
                match fut.await {
                    Ok(Some(image)) => match image.state {
                        ImageState::Available => Ok(Poll::Ready),
                        ImageState::Failed => {
                            let reason = image
                                .state_reason
                                .unwrap_or_else(|| "no reason reported".to_string());
                            Err(PollFailure::Fatal(LifecycleError::vendor(
                                "copying image",
                                format!("image entered failed state: {}", reason),
                            )))
                        }
                        state => Ok(Poll::Pending(Some(format!(
                            "image is still {}",
                            state.as_str()
                        )))),
                    },
                    // A freshly issued copy can be briefly invisible
                    Ok(None) => Err(PollFailure::Transient(
                        "image not visible yet".to_string(),
                    )),
                    Err(e) => Err(PollFailure::Fatal(LifecycleError::vendor(
                        "describing image",
                        e,
                    ))),
                }
            }
        })
        .await
    }
}

impl<C: ImageApi> ResourceAdapter for ImageCopyAdapter<C> {
    fn kind(&self) -> &'static str {
        "image_copy"
    }

    fn schema(&self) -> ResourceSchema {
        image_copy_schema()
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
