use anyhow::Result;

use crate::db::Database;
use crate::identity::{ContactSummary, Reconciler};
use crate::models::ContactId;

/// Execute the show command
pub fn run_show(db: &Database, reconciler: &Reconciler, id: ContactId) -> Result<()> {
    match reconciler.describe(db, id)? {
        Some(summary) => print_cluster(&summary),
        None => println!("No contact found with ID: {}", id),
    }
    Ok(())
}

pub fn print_cluster(summary: &ContactSummary) {
    println!("Primary contact {}", summary.primary_contact_id);

    if !summary.emails.is_empty() {
        println!("  Emails:");
        for email in &summary.emails {
            println!("    {}", email);
        }
    }

    if !summary.phone_numbers.is_empty() {
        println!("  Phone numbers:");
        for phone in &summary.phone_numbers {
            println!("    {}", phone);
        }
    }

    if !summary.secondary_contact_ids.is_empty() {
        let ids: Vec<String> = summary
            .secondary_contact_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        println!("  Secondary contacts: {}", ids.join(", "));
    }
}
