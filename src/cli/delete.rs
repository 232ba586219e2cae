use anyhow::{anyhow, Result};
use inquire::ui::{RenderConfig, Styled};
use inquire::Confirm;

use crate::db::Database;
use crate::models::{Contact, ContactId};
use crate::store::ContactStore;

/// Execute the delete command
pub fn run_delete(db: &Database, id: ContactId, force: bool) -> Result<()> {
    let Some(contact) = db.get_contact(id)? else {
        println!("No contact found with ID: {}", id);
        return Ok(());
    };

    ensure_deletable(db, &contact)?;
    print_contact_summary(&contact);
    println!();

    if !force {
        let confirmed = Confirm::new(&format!("Delete contact {}?", id))
            .with_render_config(minimal_render_config())
            .with_default(false)
            .prompt()
            .unwrap_or(false);

        if !confirmed {
            return Ok(());
        }
    }

    if db.soft_delete_contact(id)? {
        println!("Deleted.");
    } else {
        eprintln!("Error: failed to delete contact {}", id);
    }

    Ok(())
}

/// A primary with live secondaries would leave them linked to a deleted row.
fn ensure_deletable(db: &Database, contact: &Contact) -> Result<()> {
    if !contact.is_primary() {
        return Ok(());
    }
    let linked = db
        .find_cluster(&[contact.id])?
        .into_iter()
        .filter(|c| c.id != contact.id)
        .count();
    if linked > 0 {
        return Err(anyhow!(
            "Contact {} is the primary for {} linked contact(s); delete those first.",
            contact.id,
            linked
        ));
    }
    Ok(())
}

fn print_contact_summary(contact: &Contact) {
    println!("Contact {} ({})", contact.id, contact.link_precedence);
    if let Some(ref email) = contact.email {
        println!("  {}", email);
    }
    if let Some(ref phone) = contact.phone_number {
        println!("  {}", phone);
    }
    if let Some(linked_id) = contact.linked_id {
        println!("  linked to {}", linked_id);
    }
}

fn minimal_render_config() -> RenderConfig<'static> {
    RenderConfig::default_colored()
        .with_prompt_prefix(Styled::new(""))
        .with_answered_prompt_prefix(Styled::new(""))
}
