use serde::Serialize;

use super::ContactId;
use crate::error::{Error, Result};

/// A validated identification request: at least one of email/phone is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    email: Option<String>,
    phone_number: Option<String>,
}

impl Submission {
    /// Trims both values; blank values count as absent.
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
        let email = normalize(email);
        let phone_number = normalize(phone_number);
        if email.is_none() && phone_number.is_none() {
            return Err(Error::MissingIdentity);
        }
        Ok(Self {
            email,
            phone_number,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Both fields present: the only case allowed to merge two primaries.
    pub fn is_full(&self) -> bool {
        self.email.is_some() && self.phone_number.is_some()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Outcome of one reconciliation: the cluster as seen by this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    pub primary_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_ids: Vec<ContactId>,
}

impl ResolvedIdentity {
    pub fn new(primary_id: ContactId) -> Self {
        Self {
            primary_id,
            emails: Vec::new(),
            phone_numbers: Vec::new(),
            secondary_ids: Vec::new(),
        }
    }

    /// First-seen order, no duplicates.
    pub fn add_email(&mut self, email: Option<&str>) {
        push_unique(&mut self.emails, email);
    }

    pub fn add_phone_number(&mut self, phone_number: Option<&str>) {
        push_unique(&mut self.phone_numbers, phone_number);
    }

    /// Ignores the primary itself and ids already listed.
    pub fn add_secondary(&mut self, id: ContactId) {
        if id != self.primary_id && !self.secondary_ids.contains(&id) {
            self.secondary_ids.push(id);
        }
    }

    /// Makes `id` the primary; the previous primary becomes a secondary.
    pub fn promote(&mut self, id: ContactId) {
        if id == self.primary_id {
            return;
        }
        let previous = self.primary_id;
        self.secondary_ids.retain(|&s| s != id);
        self.primary_id = id;
        self.add_secondary(previous);
    }
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(v) = value {
        if !values.iter().any(|seen| seen == v) {
            values.push(v.to_string());
        }
    }
}
