//! Candidate lookup for one submission.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::models::{Contact, ContactId, Submission};
use crate::store::ContactStore;

/// Live contacts sharing the submitted email or phone, widened to the full
/// clusters they belong to, oldest first.
///
/// Links are followed until no new primary id shows up, so a secondary that
/// still points at a since-demoted primary pulls in the surviving one too.
pub fn find_candidates<S: ContactStore>(store: &S, submission: &Submission) -> Result<Vec<Contact>> {
    let direct = store.find_matching(submission.email(), submission.phone_number())?;
    if direct.is_empty() {
        return Ok(direct);
    }

    let mut roots: BTreeSet<ContactId> = direct.iter().map(Contact::root_id).collect();
    let mut candidates = loop {
        let ids: Vec<ContactId> = roots.iter().copied().collect();
        let cluster = store.find_cluster(&ids)?;
        let before = roots.len();
        roots.extend(cluster.iter().map(Contact::root_id));
        if roots.len() == before {
            break cluster;
        }
    };

    // A direct match whose primary is gone is not in any fetched cluster.
    for contact in direct {
        if !candidates.iter().any(|c| c.id == contact.id) {
            candidates.push(contact);
        }
    }
    candidates.sort_by_key(Contact::seniority);

    debug!(
        candidates = candidates.len(),
        clusters = roots.len(),
        "matched existing contacts"
    );
    Ok(candidates)
}
