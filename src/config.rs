// Defaults and naming configuration for provisioning runs

/// S3 endpoint reported alongside the generated credentials when no
/// `--endpoint` override is given. The endpoint is informational output; the
/// `mc` alias is what actually selects the target store.
pub const DEFAULT_ENDPOINT: &str = "https://s3.example.com";

/// Pre-configured `mc` alias every operation runs against.
pub const DEFAULT_ALIAS: &str = "minio";

/// Management client binary resolved through PATH unless overridden.
pub const DEFAULT_MC_BINARY: &str = "mc";

/// Upper bound on a single management-client call, in seconds. A hung call
/// would otherwise block the whole sequence indefinitely.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 60;

/// How provisioned resources are named after the target bucket.
///
/// Templates use `{bucket}` as the placeholder. The defaults name the admin
/// after the bucket itself and the policy after the bucket with an
/// `-admin-policy` suffix.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    pub admin_username_template: String,
    pub policy_name_template: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            admin_username_template: "{bucket}".to_string(),
            policy_name_template: "{bucket}-admin-policy".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn admin_username(&self, bucket: &str) -> String {
        self.admin_username_template.replace("{bucket}", bucket)
    }

    pub fn policy_name(&self, bucket: &str) -> String {
        self.policy_name_template.replace("{bucket}", bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_naming() {
        let naming = NamingConfig::default();
        assert_eq!(naming.admin_username("testbucket"), "testbucket");
        assert_eq!(naming.policy_name("testbucket"), "testbucket-admin-policy");
    }

    #[test]
    fn test_custom_templates() {
        let naming = NamingConfig {
            admin_username_template: "{bucket}-admin".to_string(),
            policy_name_template: "rw-{bucket}".to_string(),
        };
        assert_eq!(naming.admin_username("data"), "data-admin");
        assert_eq!(naming.policy_name("data"), "rw-data");
    }
}
