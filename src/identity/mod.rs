//! Identity reconciliation: match, merge, consolidate, project.
//!
//! [`Reconciler::identify`] is the single entry point. It validates the
//! submission, then runs lookup and resolution inside one store transaction,
//! retrying the whole unit when the store reports a conflict.

use tracing::{info_span, warn};

use crate::error::{Error, Result};
use crate::models::{Contact, ContactId, Submission};
use crate::store::ContactStore;

pub mod matcher;
pub mod projector;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod testing;

pub use projector::{project, ContactSummary};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Reconciler {
    max_attempts: u32,
    link_new_info: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            link_new_info: false,
        }
    }
}

impl Reconciler {
    pub fn new(max_attempts: u32, link_new_info: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            link_new_info,
        }
    }

    /// Resolves one identification request against `store`.
    pub fn identify<S: ContactStore>(
        &self,
        store: &S,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<ContactSummary> {
        let submission = Submission::new(email, phone_number)?;
        let span = info_span!(
            "identify",
            has_email = submission.email().is_some(),
            has_phone = submission.phone_number().is_some()
        );
        let _enter = span.enter();

        let mut attempt = 1;
        loop {
            let outcome = store.atomically(|store| {
                let candidates = matcher::find_candidates(store, &submission)?;
                reconcile::resolve(store, candidates, &submission, self.link_new_info)
            });

            match outcome {
                Ok(resolved) => return Ok(project(resolved)),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "reconciliation conflict, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The cluster containing `id`, without modifying anything.
    ///
    /// Links are followed until a live primary is reached. A chain that ends
    /// at a deleted row or loops back on itself is an invariant violation.
    pub fn describe<S: ContactStore>(
        &self,
        store: &S,
        id: ContactId,
    ) -> Result<Option<ContactSummary>> {
        let Some(mut current) = live_contact(store, id)? else {
            return Ok(None);
        };

        let mut walked: Vec<Contact> = Vec::new();
        while !current.is_primary() {
            let next_id = current.root_id();
            if next_id == current.id || walked.iter().any(|c| c.id == next_id) {
                return Err(Error::invariant(format!(
                    "contact {id} has a link cycle through {next_id}"
                )));
            }
            walked.push(current);
            current = live_contact(store, next_id)?.ok_or_else(|| {
                Error::invariant(format!("contact {id} links to missing contact {next_id}"))
            })?;
        }

        let mut cluster = store.find_cluster(&[current.id])?;
        for contact in walked {
            if !cluster.iter().any(|c| c.id == contact.id) {
                cluster.push(contact);
            }
        }
        cluster.sort_by_key(Contact::seniority);

        Ok(Some(project(reconcile::summarize(current.id, &cluster))))
    }
}

fn live_contact<S: ContactStore>(store: &S, id: ContactId) -> Result<Option<Contact>> {
    Ok(store
        .find_cluster(&[id])?
        .into_iter()
        .find(|c| c.id == id))
}
