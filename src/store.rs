//! The storage boundary the reconciliation engine depends on.

use crate::error::Result;
use crate::models::{Contact, ContactId};

/// CRUD over the contact table, as consumed by the engine.
///
/// Reads never return soft-deleted rows. Each mutation is applied as one
/// atomic unit and only when its target is a live primary, so a resolve that
/// stops half way never leaves a secondary pointing at a secondary.
pub trait ContactStore {
    /// Live contacts whose email equals `email` or whose phone equals
    /// `phone_number`, oldest first. A `None` value adds no clause.
    fn find_matching(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>>;

    /// Live contacts that are one of `primary_ids` or link to one of them,
    /// oldest first.
    fn find_cluster(&self, primary_ids: &[ContactId]) -> Result<Vec<Contact>>;

    fn create_primary(&self, email: Option<&str>, phone_number: Option<&str>) -> Result<Contact>;

    fn create_secondary(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
        linked_id: ContactId,
    ) -> Result<Contact>;

    /// Turns primary `id` into a secondary of `linked_id`, moving its own
    /// secondaries along with it.
    fn demote_to_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()>;

    fn repoint_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()>;

    /// Runs `f` as one atomic unit. Stores without transactions just call it.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>,
    {
        f(self)
    }
}
