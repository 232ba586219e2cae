//! Primary selection, merge and consolidation over a candidate set.

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::{Contact, ContactId, LinkPrecedence, ResolvedIdentity, Submission};
use crate::store::ContactStore;

/// Decides the canonical primary for `candidates` and brings the store in
/// line with it.
///
/// Candidates must be ordered oldest first. With no candidates a new primary
/// is created. Two primaries are merged only when the submission carries both
/// an email and a phone number. Re-running with the same input against the
/// resulting store issues no further mutations.
pub fn resolve<S: ContactStore>(
    store: &S,
    mut candidates: Vec<Contact>,
    submission: &Submission,
    link_new_info: bool,
) -> Result<ResolvedIdentity> {
    if candidates.is_empty() {
        let contact = store.create_primary(submission.email(), submission.phone_number())?;
        info!(contact_id = contact.id, "created primary contact");

        let mut resolved = ResolvedIdentity::new(contact.id);
        resolved.add_email(submission.email());
        resolved.add_phone_number(submission.phone_number());
        return Ok(resolved);
    }

    let working_id = working_primary(&candidates)?.id;
    let mut resolved = summarize(working_id, &candidates);

    if submission.is_full() {
        merge_primaries(store, &mut candidates, &mut resolved)?;
    }

    consolidate(store, &candidates, resolved.primary_id)?;

    if link_new_info {
        link_unseen_values(store, submission, &mut resolved)?;
    }

    // Submitted values stay in the reported view even when not persisted.
    resolved.add_email(submission.email());
    resolved.add_phone_number(submission.phone_number());

    Ok(resolved)
}

/// Flattens a cluster, in candidate order, without touching the store.
pub fn summarize(primary_id: ContactId, candidates: &[Contact]) -> ResolvedIdentity {
    let mut resolved = ResolvedIdentity::new(primary_id);
    for contact in candidates {
        resolved.add_email(contact.email.as_deref());
        resolved.add_phone_number(contact.phone_number.as_deref());
        resolved.add_secondary(contact.id);
    }
    resolved
}

/// First primary-flagged candidate. Without one, the earliest-created
/// candidate is the fallback, and it must still hold primary status.
fn working_primary(candidates: &[Contact]) -> Result<&Contact> {
    let chosen = candidates
        .iter()
        .find(|c| c.is_primary())
        .or_else(|| candidates.iter().min_by_key(|c| c.seniority()));

    match chosen {
        Some(contact) if contact.is_primary() => Ok(contact),
        _ => {
            let detail: Vec<String> = candidates
                .iter()
                .map(|c| format!("{}:{}->{:?}", c.id, c.link_precedence, c.linked_id))
                .collect();
            error!(
                candidates = %detail.join(","),
                "candidate cluster has no live primary"
            );
            Err(Error::invariant(format!(
                "no primary among candidates [{}]",
                detail.join(", ")
            )))
        }
    }
}

/// Demotes every primary but the oldest, mirroring the demotions into
/// `candidates` so consolidation sees the post-merge links.
fn merge_primaries<S: ContactStore>(
    store: &S,
    candidates: &mut [Contact],
    resolved: &mut ResolvedIdentity,
) -> Result<()> {
    let mut primaries: Vec<&Contact> = candidates.iter().filter(|c| c.is_primary()).collect();
    if primaries.len() < 2 {
        return Ok(());
    }
    primaries.sort_by_key(|c| c.seniority());

    let survivor = primaries[0].id;
    let demoted: Vec<ContactId> = primaries[1..].iter().map(|c| c.id).collect();

    for &id in &demoted {
        store.demote_to_secondary(id, survivor)?;
        info!(contact_id = id, primary_id = survivor, "demoted primary contact");
    }

    resolved.promote(survivor);
    for &id in &demoted {
        resolved.add_secondary(id);
    }

    for contact in candidates.iter_mut() {
        if demoted.contains(&contact.id) {
            contact.link_precedence = LinkPrecedence::Secondary;
            contact.linked_id = Some(survivor);
        } else if contact.linked_id.map_or(false, |l| demoted.contains(&l)) {
            contact.linked_id = Some(survivor);
        }
    }
    Ok(())
}

/// Repoints every secondary that does not already link to `primary_id`.
fn consolidate<S: ContactStore>(
    store: &S,
    candidates: &[Contact],
    primary_id: ContactId,
) -> Result<()> {
    for contact in candidates {
        if contact.is_secondary() && contact.linked_id != Some(primary_id) {
            store.repoint_secondary(contact.id, primary_id)?;
            info!(
                contact_id = contact.id,
                from = ?contact.linked_id,
                primary_id,
                "repointed secondary contact"
            );
        }
    }
    Ok(())
}

/// Stores the submission as a new secondary when it carries an email or phone
/// the cluster has not seen yet.
fn link_unseen_values<S: ContactStore>(
    store: &S,
    submission: &Submission,
    resolved: &mut ResolvedIdentity,
) -> Result<()> {
    let new_email = submission
        .email()
        .map_or(false, |e| !resolved.emails.iter().any(|seen| seen == e));
    let new_phone = submission
        .phone_number()
        .map_or(false, |p| !resolved.phone_numbers.iter().any(|seen| seen == p));
    if !new_email && !new_phone {
        return Ok(());
    }

    let contact = store.create_secondary(
        submission.email(),
        submission.phone_number(),
        resolved.primary_id,
    )?;
    info!(
        contact_id = contact.id,
        primary_id = resolved.primary_id,
        "linked new contact information"
    );
    resolved.add_secondary(contact.id);
    Ok(())
}
