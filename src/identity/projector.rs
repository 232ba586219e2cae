use serde::{Deserialize, Serialize};

use crate::models::{ContactId, ResolvedIdentity};

/// The `contact` object of an identify response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

pub fn project(resolved: ResolvedIdentity) -> ContactSummary {
    ContactSummary {
        primary_contact_id: resolved.primary_id,
        emails: resolved.emails,
        phone_numbers: resolved.phone_numbers,
        secondary_contact_ids: resolved.secondary_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_wire_shape() {
        let resolved = ResolvedIdentity {
            primary_id: 1,
            emails: vec!["alpha@test.com".to_string(), "beta@test.com".to_string()],
            phone_numbers: vec!["111".to_string(), "222".to_string()],
            secondary_ids: vec![2],
        };

        let json = serde_json::to_value(project(resolved)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "primaryContactId": 1,
                "emails": ["alpha@test.com", "beta@test.com"],
                "phoneNumbers": ["111", "222"],
                "secondaryContactIds": [2],
            })
        );
    }
}
