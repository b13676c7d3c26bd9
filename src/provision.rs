// Provisioning orchestration: one bucket, one admin, one policy, one
// service account, in that order, stopping dead at the first failure.

use std::fmt;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::NamingConfig;
use crate::credentials::{CredentialError, CredentialProfile};
use crate::mc::{BucketCreated, McError, ObjectStoreAdmin};
use crate::policy;

/// Stage of the provisioning sequence a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckExistence,
    CreateBucket,
    CreateAdmin,
    Policy,
    ServiceAccount,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckExistence => "CheckExistence",
            Stage::CreateBucket => "CreateBucket",
            Stage::CreateAdmin => "CreateAdmin",
            Stage::Policy => "Policy",
            Stage::ServiceAccount => "ServiceAccount",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Client(#[from] McError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Rejected before any remote call was made.
    #[error("invalid bucket name '{name}': {reason}")]
    InvalidInput { name: String, reason: &'static str },

    /// A stage failed after zero or more resources were already created.
    /// `partial` lists exactly what exists so the caller can clean up or
    /// retry the missing tail; nothing is rolled back automatically.
    #[error("provisioning failed at stage {stage}: {cause}")]
    Failed {
        stage: Stage,
        partial: PartialResources,
        #[source]
        cause: StageFailure,
    },
}

/// Resources confirmed created before a failure stopped the sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResources {
    pub bucket: Option<String>,
    pub admin_username: Option<String>,
    pub policy_name: Option<String>,
}

/// The complete artifact of a successful run. Either every field is
/// populated or this struct is never constructed.
#[derive(Clone)]
pub struct ProvisionedResourceSet {
    pub bucket_name: String,
    pub admin_username: String,
    pub admin_password: String,
    pub policy_name: String,
    pub service_account_access_key: String,
    pub service_account_secret_key: String,
    pub endpoint: Url,
}

impl fmt::Debug for ProvisionedResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedResourceSet")
            .field("bucket_name", &self.bucket_name)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("policy_name", &self.policy_name)
            .field("service_account_access_key", &self.service_account_access_key)
            .field("service_account_secret_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[derive(Debug)]
pub enum ProvisioningOutcome {
    Created(ProvisionedResourceSet),
    AlreadyExists { bucket_name: String },
}

/// Validated input for one provisioning run. Immutable once constructed;
/// validation happens here so no invalid name ever reaches the store.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    bucket_name: String,
    endpoint: Url,
}

impl ProvisioningRequest {
    pub fn new(bucket_name: &str, endpoint: Url) -> Result<Self, ProvisionError> {
        validate_bucket_name(bucket_name).map_err(|reason| ProvisionError::InvalidInput {
            name: bucket_name.to_string(),
            reason,
        })?;
        Ok(Self {
            bucket_name: bucket_name.to_string(),
            endpoint,
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// DNS-label rules, the common denominator across S3-compatible stores.
pub fn validate_bucket_name(name: &str) -> Result<(), &'static str> {
    if name.len() < 3 {
        return Err("must be at least 3 characters");
    }
    if name.len() > 63 {
        return Err("must be at most 63 characters");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err("may only contain lowercase letters, digits, and hyphens");
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("may not start or end with a hyphen");
    }
    Ok(())
}

pub struct Provisioner<C> {
    client: C,
    profile: CredentialProfile,
    naming: NamingConfig,
}

impl<C: ObjectStoreAdmin> Provisioner<C> {
    pub fn new(client: C, profile: CredentialProfile, naming: NamingConfig) -> Self {
        Self {
            client,
            profile,
            naming,
        }
    }

    /// Run the full provisioning sequence for one request.
    ///
    /// Stages run strictly in order and the first failure stops the machine;
    /// no later stage is ever attempted against inconsistent state. An
    /// existing bucket short-circuits to `AlreadyExists` before anything is
    /// created.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningOutcome, ProvisionError> {
        let bucket = request.bucket_name();
        let mut partial = PartialResources::default();

        info!("Checking whether bucket '{}' already exists", bucket);
        match self.client.bucket_exists(bucket).await {
            Ok(true) => {
                info!("Bucket '{}' exists, leaving it untouched", bucket);
                return Ok(ProvisioningOutcome::AlreadyExists {
                    bucket_name: bucket.to_string(),
                });
            }
            Ok(false) => {}
            Err(err) => return Err(failed(Stage::CheckExistence, partial, err)),
        }

        info!("Creating bucket '{}'", bucket);
        match self.client.create_bucket(bucket).await {
            Ok(BucketCreated::Created) => {}
            // Lost a same-name race after the existence check: the store's
            // uniqueness constraint is the tie-breaker, and the loser
            // reports the conflict rather than a failure.
            Ok(BucketCreated::AlreadyOwned) => {
                return Ok(ProvisioningOutcome::AlreadyExists {
                    bucket_name: bucket.to_string(),
                });
            }
            Err(err) => return Err(failed(Stage::CreateBucket, partial, err)),
        }
        partial.bucket = Some(bucket.to_string());

        // Generated right before use so a secret never sits around unused.
        let admin_username = self.naming.admin_username(bucket);
        let admin_password = match self.profile.admin_password() {
            Ok(credential) => credential,
            Err(err) => return Err(failed(Stage::CreateAdmin, partial, err)),
        };
        info!("Creating admin user '{}'", admin_username);
        if let Err(err) = self
            .client
            .create_user(&admin_username, admin_password.value())
            .await
        {
            return Err(failed(Stage::CreateAdmin, partial, err));
        }
        partial.admin_username = Some(admin_username.clone());

        let policy_name = self.naming.policy_name(bucket);
        let document = policy::bucket_policy(bucket);
        info!("Creating policy '{}' scoped to bucket '{}'", policy_name, bucket);
        if let Err(err) = self.client.create_policy(&policy_name, &document).await {
            return Err(failed(Stage::Policy, partial, err));
        }
        info!("Attaching policy '{}' to '{}'", policy_name, admin_username);
        if let Err(err) = self.client.attach_policy(&policy_name, &admin_username).await {
            return Err(failed(Stage::Policy, partial, err));
        }
        partial.policy_name = Some(policy_name.clone());

        let access_key = match self.profile.access_key() {
            Ok(credential) => credential,
            Err(err) => return Err(failed(Stage::ServiceAccount, partial, err)),
        };
        let secret_key = match self.profile.secret_key() {
            Ok(credential) => credential,
            Err(err) => return Err(failed(Stage::ServiceAccount, partial, err)),
        };
        info!("Creating service account under '{}'", admin_username);
        let keys = match self
            .client
            .create_service_account(&admin_username, access_key.value(), secret_key.value())
            .await
        {
            Ok(keys) => keys,
            Err(err) => return Err(failed(Stage::ServiceAccount, partial, err)),
        };

        info!("Provisioning of bucket '{}' complete", bucket);
        Ok(ProvisioningOutcome::Created(ProvisionedResourceSet {
            bucket_name: bucket.to_string(),
            admin_username,
            admin_password: admin_password.into_value(),
            policy_name,
            service_account_access_key: keys.access_key,
            service_account_secret_key: keys.secret_key,
            endpoint: request.endpoint().clone(),
        }))
    }
}

fn failed(
    stage: Stage,
    partial: PartialResources,
    cause: impl Into<StageFailure>,
) -> ProvisionError {
    ProvisionError::Failed {
        stage,
        partial,
        cause: cause.into(),
    }
}
