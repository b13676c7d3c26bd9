// Least-privilege access policy construction

use serde::Serialize;

pub const POLICY_VERSION: &str = "2012-10-17";

// Everything a service account needs to read, write, list, and delete
// objects in its own bucket, and nothing else. Account- and
// policy-management actions must never appear here.
const BUCKET_ACTIONS: [&str; 2] = ["s3:ListBucket", "s3:GetBucketLocation"];
const OBJECT_ACTIONS: [&str; 3] = ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

impl PolicyDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the access policy for a single bucket: bucket-level listing on the
/// bucket ARN, object read/write/delete on its contents, both scoped to that
/// bucket alone.
pub fn bucket_policy(bucket_name: &str) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statements: vec![
            Statement {
                effect: Effect::Allow,
                actions: BUCKET_ACTIONS.iter().map(|a| a.to_string()).collect(),
                resources: vec![format!("arn:aws:s3:::{}", bucket_name)],
            },
            Statement {
                effect: Effect::Allow,
                actions: OBJECT_ACTIONS.iter().map(|a| a.to_string()).collect(),
                resources: vec![format!("arn:aws:s3:::{}/*", bucket_name)],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_scoped_to_single_bucket() {
        let document = bucket_policy("testbucket");
        for statement in &document.statements {
            for resource in &statement.resources {
                assert!(
                    resource == "arn:aws:s3:::testbucket"
                        || resource == "arn:aws:s3:::testbucket/*",
                    "unexpected resource: {}",
                    resource
                );
            }
        }
    }

    #[test]
    fn test_policy_actions_are_exactly_the_allowed_set() {
        let allowed = [
            "s3:ListBucket",
            "s3:GetBucketLocation",
            "s3:GetObject",
            "s3:PutObject",
            "s3:DeleteObject",
        ];
        let document = bucket_policy("data");
        let actions: Vec<&str> = document
            .statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
            .collect();
        assert_eq!(actions.len(), allowed.len());
        for action in actions {
            assert!(allowed.contains(&action), "unexpected action: {}", action);
        }
    }

    #[test]
    fn test_policy_never_leaks_other_buckets() {
        // The resource scope must follow the input name exactly, whatever
        // valid name is used.
        let long = "x".repeat(63);
        for name in ["a1b", "tenant-42", "logs-archive-2024", long.as_str()] {
            let document = bucket_policy(name);
            assert_eq!(
                document.statements[0].resources,
                vec![format!("arn:aws:s3:::{}", name)]
            );
            assert_eq!(
                document.statements[1].resources,
                vec![format!("arn:aws:s3:::{}/*", name)]
            );
        }
    }

    #[test]
    fn test_policy_serializes_with_aws_field_names() {
        let json = bucket_policy("testbucket").to_json().unwrap();
        assert!(json.contains("\"Version\": \"2012-10-17\""));
        assert!(json.contains("\"Statement\""));
        assert!(json.contains("\"Effect\""));
        assert!(json.contains("\"Allow\""));
        assert!(json.contains("\"Action\""));
        assert!(json.contains("\"Resource\""));
        // No administrative grants, ever.
        assert!(!json.contains("s3:*"));
        assert!(!json.contains("admin:"));
    }
}
