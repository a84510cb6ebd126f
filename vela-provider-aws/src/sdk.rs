//! SDK-backed vendor API implementations
//!
//! Thin marshaling layers between the per-resource vendor API traits and
//! the AWS SDK clients. Credential resolution comes from the default
//! provider chain; only the region is taken from the provider config.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use vela_core::adapter::AdapterSet;

use crate::VendorError;
use crate::config::ProviderConfig;
use crate::cookie_policy::{CookiePolicyAdapter, LoadBalancerApi, PolicyDescription};
use crate::image_copy::{ImageApi, ImageCopyAdapter, ImageDescription, ImageState};
use crate::search_domain::{
    ClusterConfig, DomainSpec, DomainStatus, EbsOptions, SearchDomainAdapter, SearchDomainApi,
    SnapshotOptions,
};

/// SDK clients for every service this provider talks to
pub struct AwsClients {
    pub search: SdkSearchDomainApi,
    pub load_balancing: SdkLoadBalancerApi,
    pub images: SdkImageApi,
}

impl AwsClients {
    pub async fn new(config: &ProviderConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            search: SdkSearchDomainApi {
                client: aws_sdk_elasticsearch::Client::new(&shared),
            },
            load_balancing: SdkLoadBalancerApi {
                client: aws_sdk_elasticloadbalancing::Client::new(&shared),
            },
            images: SdkImageApi {
                client: aws_sdk_ec2::Client::new(&shared),
            },
        }
    }
}

/// Build the full adapter set for one provider configuration
pub async fn adapters(config: &ProviderConfig) -> AdapterSet {
    let clients = AwsClients::new(config).await;
    AdapterSet::new()
        .with(Box::new(SearchDomainAdapter::new(clients.search)))
        .with(Box::new(CookiePolicyAdapter::new(clients.load_balancing)))
        .with(Box::new(ImageCopyAdapter::new(clients.images)))
}

fn vendor_err(err: impl std::fmt::Debug) -> VendorError {
    VendorError::new(format!("{:?}", err))
}

// =========================================================================
// Search domains
// =========================================================================

pub struct SdkSearchDomainApi {
    client: aws_sdk_elasticsearch::Client,
}

#[async_trait]
impl SearchDomainApi for SdkSearchDomainApi {
    async fn create_domain(&self, spec: &DomainSpec) -> Result<DomainStatus, VendorError> {
        let mut req = self
            .client
            .create_elasticsearch_domain()
            .domain_name(&spec.domain_name);
        if let Some(policies) = &spec.access_policies {
            req = req.access_policies(policies);
        }
        for (key, value) in &spec.advanced_options {
            req = req.advanced_options(key, value);
        }
        if let Some(cluster) = &spec.cluster_config {
            req = req.elasticsearch_cluster_config(to_sdk_cluster(cluster));
        }
        if let Some(ebs) = &spec.ebs_options {
            req = req.ebs_options(to_sdk_ebs(ebs));
        }
        if let Some(snapshot) = &spec.snapshot_options {
            req = req.snapshot_options(
                aws_sdk_elasticsearch::types::SnapshotOptions::builder()
                    .automated_snapshot_start_hour(snapshot.automated_snapshot_start_hour as i32)
                    .build(),
            );
        }

        req.send().await.map_err(vendor_err)?;

        // The domain is described rather than decoded from the create
        // response; the describe shape is the one source of truth here.
        match self.describe_domain(&spec.domain_name).await? {
            Some(status) => Ok(status),
            None => Err(VendorError::new(format!(
                "domain '{}' not visible after create",
                spec.domain_name
            ))),
        }
    }

    async fn describe_domain(
        &self,
        domain_name: &str,
    ) -> Result<Option<DomainStatus>, VendorError> {
        let result = self
            .client
            .describe_elasticsearch_domain()
            .domain_name(domain_name)
            .send()
            .await;

        match result {
            Ok(out) => Ok(Some(from_sdk_status(out.domain_status()))),
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("ResourceNotFoundException") {
                    Ok(None)
                } else {
                    Err(VendorError::new(err_str))
                }
            }
        }
    }

    async fn update_domain(&self, spec: &DomainSpec) -> Result<(), VendorError> {
        let mut req = self
            .client
            .update_elasticsearch_domain_config()
            .domain_name(&spec.domain_name);
        if let Some(policies) = &spec.access_policies {
            req = req.access_policies(policies);
        }
        for (key, value) in &spec.advanced_options {
            req = req.advanced_options(key, value);
        }
        if let Some(cluster) = &spec.cluster_config {
            req = req.elasticsearch_cluster_config(to_sdk_cluster(cluster));
        }
        if let Some(ebs) = &spec.ebs_options {
            req = req.ebs_options(to_sdk_ebs(ebs));
        }
        if let Some(snapshot) = &spec.snapshot_options {
            req = req.snapshot_options(
                aws_sdk_elasticsearch::types::SnapshotOptions::builder()
                    .automated_snapshot_start_hour(snapshot.automated_snapshot_start_hour as i32)
                    .build(),
            );
        }

        req.send().await.map_err(vendor_err)?;
        Ok(())
    }

    async fn delete_domain(&self, domain_name: &str) -> Result<(), VendorError> {
        let result = self
            .client
            .delete_elasticsearch_domain()
            .domain_name(domain_name)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = format!("{:?}", e);
                // Already gone counts as deleted
                if err_str.contains("ResourceNotFoundException") {
                    Ok(())
                } else {
                    Err(VendorError::new(err_str))
                }
            }
        }
    }
}

fn to_sdk_cluster(
    cluster: &ClusterConfig,
) -> aws_sdk_elasticsearch::types::ElasticsearchClusterConfig {
    aws_sdk_elasticsearch::types::ElasticsearchClusterConfig::builder()
        .instance_type(aws_sdk_elasticsearch::types::EsPartitionInstanceType::from(
            cluster.instance_type.as_str(),
        ))
        .instance_count(cluster.instance_count as i32)
        .dedicated_master_enabled(cluster.dedicated_master_enabled)
        .set_dedicated_master_type(
            cluster
                .dedicated_master_type
                .as_deref()
                .map(aws_sdk_elasticsearch::types::EsPartitionInstanceType::from),
        )
        .set_dedicated_master_count(cluster.dedicated_master_count.map(|n| n as i32))
        .zone_awareness_enabled(cluster.zone_awareness_enabled)
        .build()
}

fn to_sdk_ebs(ebs: &EbsOptions) -> aws_sdk_elasticsearch::types::EbsOptions {
    aws_sdk_elasticsearch::types::EbsOptions::builder()
        .ebs_enabled(ebs.ebs_enabled)
        .set_iops(ebs.iops.map(|n| n as i32))
        .set_volume_size(ebs.volume_size.map(|n| n as i32))
        .set_volume_type(
            ebs.volume_type
                .as_deref()
                .map(aws_sdk_elasticsearch::types::VolumeType::from),
        )
        .build()
}

fn from_sdk_status(
    status: &aws_sdk_elasticsearch::types::ElasticsearchDomainStatus,
) -> DomainStatus {
    DomainStatus {
        arn: status.arn().to_string(),
        domain_id: status.domain_id().to_string(),
        domain_name: status.domain_name().to_string(),
        endpoint: status.endpoint().map(str::to_string),
        processing: status.processing().unwrap_or(false),
        access_policies: status.access_policies().map(str::to_string),
        advanced_options: status
            .advanced_options()
            .cloned()
            .unwrap_or_else(HashMap::new),
        cluster_config: Some(from_sdk_cluster(status.elasticsearch_cluster_config())),
        ebs_options: status.ebs_options().map(from_sdk_ebs),
        snapshot_options: status.snapshot_options().map(|s| SnapshotOptions {
            automated_snapshot_start_hour: i64::from(
                s.automated_snapshot_start_hour().unwrap_or(0),
            ),
        }),
    }
}

fn from_sdk_cluster(
    cluster: &aws_sdk_elasticsearch::types::ElasticsearchClusterConfig,
) -> ClusterConfig {
    ClusterConfig {
        instance_type: cluster
            .instance_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| crate::search_domain::DEFAULT_INSTANCE_TYPE.to_string()),
        instance_count: i64::from(cluster.instance_count().unwrap_or(1)),
        dedicated_master_enabled: cluster.dedicated_master_enabled().unwrap_or(false),
        dedicated_master_type: cluster.dedicated_master_type().map(|t| t.as_str().to_string()),
        dedicated_master_count: cluster.dedicated_master_count().map(i64::from),
        zone_awareness_enabled: cluster.zone_awareness_enabled().unwrap_or(false),
    }
}

fn from_sdk_ebs(ebs: &aws_sdk_elasticsearch::types::EbsOptions) -> EbsOptions {
    EbsOptions {
        ebs_enabled: ebs.ebs_enabled().unwrap_or(false),
        iops: ebs.iops().map(i64::from),
        volume_size: ebs.volume_size().map(i64::from),
        volume_type: ebs.volume_type().map(|t| t.as_str().to_string()),
    }
}

// =========================================================================
// Load balancer policies
// =========================================================================

pub struct SdkLoadBalancerApi {
    client: aws_sdk_elasticloadbalancing::Client,
}

#[async_trait]
impl LoadBalancerApi for SdkLoadBalancerApi {
    async fn create_cookie_policy(
        &self,
        load_balancer: &str,
        policy: &str,
        cookie_name: &str,
    ) -> Result<(), VendorError> {
        self.client
            .create_app_cookie_stickiness_policy()
            .load_balancer_name(load_balancer)
            .policy_name(policy)
            .cookie_name(cookie_name)
            .send()
            .await
            .map_err(vendor_err)?;
        Ok(())
    }

    async fn set_listener_policies(
        &self,
        load_balancer: &str,
        port: i64,
        policies: &[String],
    ) -> Result<(), VendorError> {
        self.client
            .set_load_balancer_policies_of_listener()
            .load_balancer_name(load_balancer)
            .load_balancer_port(port as i32)
            .set_policy_names(Some(policies.to_vec()))
            .send()
            .await
            .map_err(vendor_err)?;
        Ok(())
    }

    async fn describe_policy(
        &self,
        load_balancer: &str,
        policy: &str,
    ) -> Result<Option<PolicyDescription>, VendorError> {
        let result = self
            .client
            .describe_load_balancer_policies()
            .load_balancer_name(load_balancer)
            .policy_names(policy)
            .send()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("PolicyNotFound") {
                    return Ok(None);
                }
                return Err(VendorError::new(err_str));
            }
        };

        let Some(description) = out
            .policy_descriptions()
            .iter()
            .find(|d| d.policy_name() == Some(policy))
        else {
            return Ok(None);
        };

        let cookie_name = description
            .policy_attribute_descriptions()
            .iter()
            .find(|a| a.attribute_name() == Some("CookieName"))
            .and_then(|a| a.attribute_value())
            .map(str::to_string);

        Ok(Some(PolicyDescription {
            policy_name: policy.to_string(),
            cookie_name,
        }))
    }

    async fn delete_policy(&self, load_balancer: &str, policy: &str) -> Result<(), VendorError> {
        let result = self
            .client
            .delete_load_balancer_policy()
            .load_balancer_name(load_balancer)
            .policy_name(policy)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("PolicyNotFound") {
                    Ok(())
                } else {
                    Err(VendorError::new(err_str))
                }
            }
        }
    }
}

// =========================================================================
// Machine images
// =========================================================================

pub struct SdkImageApi {
    client: aws_sdk_ec2::Client,
}

#[async_trait]
impl ImageApi for SdkImageApi {
    async fn copy_image(
        &self,
        name: &str,
        description: Option<&str>,
        source_image_id: &str,
        source_region: &str,
    ) -> Result<String, VendorError> {
        let out = self
            .client
            .copy_image()
            .name(name)
            .set_description(description.map(str::to_string))
            .source_image_id(source_image_id)
            .source_region(source_region)
            .send()
            .await
            .map_err(vendor_err)?;

        out.image_id()
            .map(str::to_string)
            .ok_or_else(|| VendorError::new("copy returned no image id"))
    }

    async fn describe_image(
        &self,
        image_id: &str,
    ) -> Result<Option<ImageDescription>, VendorError> {
        let result = self
            .client
            .describe_images()
            .image_ids(image_id)
            .send()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("InvalidAMIID.NotFound") {
                    return Ok(None);
                }
                return Err(VendorError::new(err_str));
            }
        };

        let Some(image) = out.images().first() else {
            return Ok(None);
        };

        Ok(Some(ImageDescription {
            image_id: image.image_id().unwrap_or(image_id).to_string(),
            state: image
                .state()
                .map(|s| ImageState::from_vendor(s.as_str()))
                .unwrap_or(ImageState::Other("unknown".to_string())),
            state_reason: image
                .state_reason()
                .and_then(|r| r.message())
                .map(str::to_string),
            name: image.name().map(str::to_string),
            description: image.description().map(str::to_string),
        }))
    }

    async fn update_image_description(
        &self,
        image_id: &str,
        description: &str,
    ) -> Result<(), VendorError> {
        self.client
            .modify_image_attribute()
            .image_id(image_id)
            .description(
                aws_sdk_ec2::types::AttributeValue::builder()
                    .value(description)
                    .build(),
            )
            .send()
            .await
            .map_err(vendor_err)?;
        Ok(())
    }

    async fn deregister_image(&self, image_id: &str) -> Result<(), VendorError> {
        let result = self
            .client
            .deregister_image()
            .image_id(image_id)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("InvalidAMIID.NotFound")
                    || err_str.contains("InvalidAMIID.Unavailable")
                {
                    Ok(())
                } else {
                    Err(VendorError::new(err_str))
                }
            }
        }
    }
}
