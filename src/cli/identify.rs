use anyhow::Result;

use crate::db::Database;
use crate::identity::{ContactSummary, Reconciler};
use crate::server::types::ApiResponse;

/// Execute the identify command: one reconciliation against the local store,
/// printed in the same shape the HTTP endpoint returns.
pub fn run_identify(
    db: &Database,
    reconciler: &Reconciler,
    email: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    let summary = reconciler.identify(db, email, phone)?;
    println!("{}", render(&summary)?);
    Ok(())
}

fn render(summary: &ContactSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ApiResponse::ok(summary))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_creates_then_reuses() {
        let db = Database::open_memory().unwrap();
        let reconciler = Reconciler::default();

        run_identify(&db, &reconciler, Some("a@test.com".to_string()), None).unwrap();
        run_identify(&db, &reconciler, Some("a@test.com".to_string()), None).unwrap();
        assert_eq!(db.count_contacts().unwrap(), 1);
    }

    #[test]
    fn test_identify_requires_a_value() {
        let db = Database::open_memory().unwrap();
        let err = run_identify(&db, &Reconciler::default(), None, None).unwrap_err();
        assert_eq!(err.to_string(), "Either email or phoneNumber is required");
    }

    #[test]
    fn test_render_matches_api_shape() {
        let summary = ContactSummary {
            primary_contact_id: 1,
            emails: vec!["a@test.com".to_string()],
            phone_numbers: vec![],
            secondary_contact_ids: vec![],
        };
        let value: serde_json::Value = serde_json::from_str(&render(&summary).unwrap()).unwrap();
        assert_eq!(value["success"], serde_json::json!(true));
        assert_eq!(value["contact"]["primaryContactId"], serde_json::json!(1));
    }
}
