// Management-client boundary: every store mutation goes through `mc`

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::policy::PolicyDocument;

#[derive(Debug, Error)]
pub enum McError {
    #[error("failed to launch `{binary}` for {operation}: {source}")]
    Launch {
        binary: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} rejected by the store: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {seconds}s")]
    TimedOut {
        operation: &'static str,
        seconds: u64,
    },

    #[error("unexpected {operation} output: {message}")]
    UnexpectedOutput {
        operation: &'static str,
        message: String,
    },

    #[error("failed to stage policy document: {0}")]
    PolicyFile(#[from] std::io::Error),

    #[error("failed to encode policy document: {0}")]
    PolicyEncode(#[from] serde_json::Error),
}

/// Result of a bucket-creation attempt. The store enforces name uniqueness,
/// so a rejection telling us the bucket is already ours is an expected
/// outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreated {
    Created,
    AlreadyOwned,
}

/// Key pair confirmed by the store for a new service account.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKeys {
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
}

impl fmt::Debug for ServiceAccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKeys")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Administrative operations against the object store.
///
/// The process-backed implementation below talks to a real store through
/// `mc`; tests substitute an in-memory fake so orchestration logic can be
/// exercised without the external tool. Implementations are stateless and
/// must not cache results between calls.
#[async_trait]
pub trait ObjectStoreAdmin {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, McError>;
    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreated, McError>;
    async fn create_user(&self, username: &str, password: &str) -> Result<(), McError>;
    async fn create_policy(&self, name: &str, document: &PolicyDocument) -> Result<(), McError>;
    async fn attach_policy(&self, policy: &str, username: &str) -> Result<(), McError>;
    async fn create_service_account(
        &self,
        username: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<ServiceAccountKeys, McError>;
}

/// `ObjectStoreAdmin` backed by the `mc` binary.
///
/// The alias must already be configured in `mc` (an alias bundles endpoint
/// and root credentials); it is injected here rather than read from any
/// ambient default so callers stay in control of which store is touched.
pub struct McProcessClient {
    binary: PathBuf,
    alias: String,
    step_timeout: Duration,
}

impl McProcessClient {
    pub fn new(binary: impl Into<PathBuf>, alias: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            alias: alias.into(),
            step_timeout,
        }
    }

    fn target(&self, bucket: &str) -> String {
        format!("{}/{}", self.alias, bucket)
    }

    /// Run one `mc` invocation under the step timeout.
    ///
    /// Argument values are never logged: user-add and svcacct-add carry
    /// secrets on the command line.
    async fn run(&self, operation: &'static str, args: &[&str]) -> Result<Output, McError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.kill_on_drop(true);
        debug!("Executing `{}` for {}", self.binary.display(), operation);

        let result = tokio::time::timeout(self.step_timeout, cmd.output()).await;
        match result {
            Err(_) => Err(McError::TimedOut {
                operation,
                seconds: self.step_timeout.as_secs(),
            }),
            Ok(Err(source)) => Err(McError::Launch {
                binary: self.binary.display().to_string(),
                operation,
                source,
            }),
            Ok(Ok(output)) => Ok(output),
        }
    }

    async fn run_checked(&self, operation: &'static str, args: &[&str]) -> Result<Output, McError> {
        let output = self.run(operation, args).await?;
        if !output.status.success() {
            return Err(McError::Rejected {
                operation,
                message: first_error_line(&output),
            });
        }
        Ok(output)
    }
}

/// First non-empty stderr line, or the exit status when stderr is silent.
fn first_error_line(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(line) => line.to_string(),
        None => format!("exit status {}", output.status),
    }
}

fn is_missing_bucket(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("does not exist") || lower.contains("not found")
}

fn is_already_owned(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already exists")
        || lower.contains("already own")
        || lower.contains("previous request to create the named bucket succeeded")
}

#[async_trait]
impl ObjectStoreAdmin for McProcessClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, McError> {
        let operation = "bucket existence check";
        let output = self.run(operation, &["stat", &self.target(bucket)]).await?;
        if output.status.success() {
            return Ok(true);
        }
        let message = first_error_line(&output);
        if is_missing_bucket(&message) {
            Ok(false)
        } else {
            // Connectivity or permission problems must not be mistaken for
            // an absent bucket.
            Err(McError::Rejected { operation, message })
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreated, McError> {
        let operation = "bucket creation";
        let output = self.run(operation, &["mb", &self.target(bucket)]).await?;
        if output.status.success() {
            return Ok(BucketCreated::Created);
        }
        let message = first_error_line(&output);
        if is_already_owned(&message) {
            warn!("Bucket '{}' already exists on the store", bucket);
            Ok(BucketCreated::AlreadyOwned)
        } else {
            Err(McError::Rejected { operation, message })
        }
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<(), McError> {
        self.run_checked(
            "admin user creation",
            &["admin", "user", "add", &self.alias, username, password],
        )
        .await?;
        Ok(())
    }

    async fn create_policy(&self, name: &str, document: &PolicyDocument) -> Result<(), McError> {
        // `mc admin policy create` only accepts a file, so the document is
        // staged in a tempfile that disappears once the call returns.
        let json = document.to_json()?;
        let file = tempfile::NamedTempFile::new()?;
        tokio::fs::write(file.path(), json).await?;
        let path = file.path().to_string_lossy().into_owned();

        self.run_checked(
            "policy creation",
            &["admin", "policy", "create", &self.alias, name, &path],
        )
        .await?;
        Ok(())
    }

    async fn attach_policy(&self, policy: &str, username: &str) -> Result<(), McError> {
        self.run_checked(
            "policy attachment",
            &[
                "admin", "policy", "attach", &self.alias, policy, "--user", username,
            ],
        )
        .await?;
        Ok(())
    }

    async fn create_service_account(
        &self,
        username: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<ServiceAccountKeys, McError> {
        let operation = "service account creation";
        let output = self
            .run_checked(
                operation,
                &[
                    "--json",
                    "admin",
                    "user",
                    "svcacct",
                    "add",
                    "--access-key",
                    access_key,
                    "--secret-key",
                    secret_key,
                    &self.alias,
                    username,
                ],
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let keys: ServiceAccountKeys =
            serde_json::from_str(stdout.trim()).map_err(|err| McError::UnexpectedOutput {
                operation,
                message: err.to_string(),
            })?;
        if keys.access_key.is_empty() || keys.secret_key.is_empty() {
            return Err(McError::UnexpectedOutput {
                operation,
                message: "response carried an empty access or secret key".to_string(),
            });
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bucket_classification() {
        assert!(is_missing_bucket(
            "mc: <ERROR> Unable to stat `minio/testbucket`. Bucket `testbucket` does not exist."
        ));
        assert!(is_missing_bucket("Object not found"));
        assert!(!is_missing_bucket("Access denied"));
        assert!(!is_missing_bucket("connection refused"));
    }

    #[test]
    fn test_already_owned_classification() {
        assert!(is_already_owned(
            "mc: <ERROR> Unable to make bucket `minio/testbucket`. \
             Your previous request to create the named bucket succeeded and you already own it."
        ));
        assert!(is_already_owned("Bucket already exists"));
        assert!(!is_already_owned("Access denied"));
        assert!(!is_already_owned("invalid bucket name"));
    }

    #[test]
    fn test_service_account_keys_parse_from_json() {
        let json = r#"{"status":"success","accessKey":"AKIA1234EXAMPLE00001","secretKey":"very-secret-value","accountStatus":"enabled"}"#;
        let keys: ServiceAccountKeys = serde_json::from_str(json).unwrap();
        assert_eq!(keys.access_key, "AKIA1234EXAMPLE00001");
        assert_eq!(keys.secret_key, "very-secret-value");
    }

    #[test]
    fn test_service_account_keys_debug_redacts_secret() {
        let keys = ServiceAccountKeys {
            access_key: "AKIA1234EXAMPLE00001".to_string(),
            secret_key: "very-secret-value".to_string(),
        };
        let debug = format!("{:?}", keys);
        assert!(debug.contains("AKIA1234EXAMPLE00001"));
        assert!(!debug.contains("very-secret-value"));
    }

    #[cfg(unix)]
    #[test]
    fn test_first_error_line_picks_first_non_empty() {
        use std::os::unix::process::ExitStatusExt;
        let output = Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: b"\n  mc: <ERROR> Access denied.\nsecond line\n".to_vec(),
        };
        assert_eq!(first_error_line(&output), "mc: <ERROR> Access denied.");
    }

    #[cfg(unix)]
    #[test]
    fn test_first_error_line_falls_back_to_status() {
        use std::os::unix::process::ExitStatusExt;
        let output = Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: b"\n\n".to_vec(),
        };
        assert!(first_error_line(&output).starts_with("exit status"));
    }
}
