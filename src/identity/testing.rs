//! In-memory `ContactStore` that records every mutation, for engine tests.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::models::{Contact, ContactId, LinkPrecedence};
use crate::store::ContactStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePrimary {
        email: Option<String>,
        phone_number: Option<String>,
    },
    CreateSecondary {
        email: Option<String>,
        phone_number: Option<String>,
        linked_id: ContactId,
    },
    Demote {
        id: ContactId,
        linked_id: ContactId,
    },
    Repoint {
        id: ContactId,
        linked_id: ContactId,
    },
}

#[derive(Default)]
pub struct MemoryStore {
    rows: RefCell<Vec<Contact>>,
    calls: RefCell<Vec<Call>>,
    conflicts: Cell<u32>,
}

pub fn ts(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn primary(id: ContactId, email: &str, phone: &str, created: &str) -> Contact {
    Contact {
        id,
        email: Some(email.to_string()).filter(|s| !s.is_empty()),
        phone_number: Some(phone.to_string()).filter(|s| !s.is_empty()),
        linked_id: None,
        link_precedence: LinkPrecedence::Primary,
        created_at: ts(created),
        updated_at: ts(created),
        deleted_at: None,
    }
}

pub fn secondary(
    id: ContactId,
    email: &str,
    phone: &str,
    linked_id: ContactId,
    created: &str,
) -> Contact {
    Contact {
        linked_id: Some(linked_id),
        link_precedence: LinkPrecedence::Secondary,
        ..primary(id, email, phone, created)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Contact>) -> Self {
        Self {
            rows: RefCell::new(rows),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn row(&self, id: ContactId) -> Contact {
        self.rows
            .borrow()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap()
    }

    /// Makes the next `n` lookups fail with a retryable conflict.
    pub fn fail_lookups(&self, n: u32) {
        self.conflicts.set(n);
    }

    fn live_primary(&self, id: ContactId) -> bool {
        self.rows
            .borrow()
            .iter()
            .any(|c| c.id == id && c.is_primary() && !c.is_deleted())
    }

    fn insert(&self, mut contact: Contact) -> Contact {
        let mut rows = self.rows.borrow_mut();
        contact.id = rows.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        rows.push(contact.clone());
        contact
    }

    fn sorted(mut contacts: Vec<Contact>) -> Vec<Contact> {
        contacts.sort_by_key(Contact::seniority);
        contacts
    }
}

impl ContactStore for MemoryStore {
    fn find_matching(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>> {
        if self.conflicts.get() > 0 {
            self.conflicts.set(self.conflicts.get() - 1);
            return Err(Error::conflict("database is locked"));
        }
        let rows = self.rows.borrow();
        let found = rows
            .iter()
            .filter(|c| !c.is_deleted())
            .filter(|c| {
                (email.is_some() && c.email.as_deref() == email)
                    || (phone_number.is_some() && c.phone_number.as_deref() == phone_number)
            })
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    fn find_cluster(&self, primary_ids: &[ContactId]) -> Result<Vec<Contact>> {
        let rows = self.rows.borrow();
        let found = rows
            .iter()
            .filter(|c| !c.is_deleted())
            .filter(|c| {
                primary_ids.contains(&c.id)
                    || c.linked_id.map_or(false, |l| primary_ids.contains(&l))
            })
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    fn create_primary(&self, email: Option<&str>, phone_number: Option<&str>) -> Result<Contact> {
        self.calls.borrow_mut().push(Call::CreatePrimary {
            email: email.map(String::from),
            phone_number: phone_number.map(String::from),
        });
        let now = Utc::now();
        Ok(self.insert(Contact {
            id: 0,
            email: email.map(String::from),
            phone_number: phone_number.map(String::from),
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }))
    }

    fn create_secondary(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
        linked_id: ContactId,
    ) -> Result<Contact> {
        self.calls.borrow_mut().push(Call::CreateSecondary {
            email: email.map(String::from),
            phone_number: phone_number.map(String::from),
            linked_id,
        });
        if !self.live_primary(linked_id) {
            return Err(Error::conflict("link target is not a live primary"));
        }
        let now = Utc::now();
        Ok(self.insert(Contact {
            id: 0,
            email: email.map(String::from),
            phone_number: phone_number.map(String::from),
            linked_id: Some(linked_id),
            link_precedence: LinkPrecedence::Secondary,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }))
    }

    fn demote_to_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()> {
        self.calls.borrow_mut().push(Call::Demote { id, linked_id });
        if id == linked_id || !self.live_primary(id) || !self.live_primary(linked_id) {
            return Err(Error::conflict("demotion target changed"));
        }
        for row in self.rows.borrow_mut().iter_mut() {
            if row.id == id {
                row.link_precedence = LinkPrecedence::Secondary;
                row.linked_id = Some(linked_id);
            } else if row.linked_id == Some(id) {
                row.linked_id = Some(linked_id);
            }
        }
        Ok(())
    }

    fn repoint_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()> {
        self.calls.borrow_mut().push(Call::Repoint { id, linked_id });
        if !self.live_primary(linked_id) {
            return Err(Error::conflict("repoint target is not a live primary"));
        }
        for row in self.rows.borrow_mut().iter_mut() {
            if row.id == id && row.is_secondary() {
                row.linked_id = Some(linked_id);
            }
        }
        Ok(())
    }
}
