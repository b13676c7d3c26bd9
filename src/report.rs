// Human-facing rendering of provisioning outcomes

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};

use crate::provision::{PartialResources, ProvisionedResourceSet, ProvisioningOutcome};

pub fn print_outcome(outcome: &ProvisioningOutcome) {
    match outcome {
        ProvisioningOutcome::Created(set) => print_resource_set(set),
        ProvisioningOutcome::AlreadyExists { bucket_name } => {
            println!(
                "Bucket '{}' already exists. Nothing was created and existing credentials were left untouched.",
                bucket_name
            );
        }
    }
}

fn print_resource_set(set: &ProvisionedResourceSet) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Resource").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
    table.add_row(vec![Cell::new("Bucket"), Cell::new(&set.bucket_name)]);
    table.add_row(vec![Cell::new("Endpoint"), Cell::new(set.endpoint.as_str())]);
    table.add_row(vec![Cell::new("Admin user"), Cell::new(&set.admin_username)]);
    table.add_row(vec![
        Cell::new("Admin password"),
        Cell::new(&set.admin_password),
    ]);
    table.add_row(vec![Cell::new("Policy"), Cell::new(&set.policy_name)]);
    table.add_row(vec![
        Cell::new("Access key"),
        Cell::new(&set.service_account_access_key),
    ]);
    table.add_row(vec![
        Cell::new("Secret key"),
        Cell::new(&set.service_account_secret_key),
    ]);

    println!("{table}");
    println!("Store these credentials now; they are not persisted anywhere and cannot be shown again.");
}

/// Printed on the failure path so an operator knows exactly what exists and
/// can clean up or re-run. Goes to stderr alongside the error itself.
pub fn print_partial(partial: &PartialResources) {
    eprintln!("Resources created before the failure:");
    eprintln!("  Bucket:     {}", describe(partial.bucket.as_deref()));
    eprintln!("  Admin user: {}", describe(partial.admin_username.as_deref()));
    eprintln!("  Policy:     {}", describe(partial.policy_name.as_deref()));
}

fn describe(resource: Option<&str>) -> &str {
    resource.unwrap_or("not created")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_partial_fields() {
        assert_eq!(describe(Some("testbucket")), "testbucket");
        assert_eq!(describe(None), "not created");
    }
}
