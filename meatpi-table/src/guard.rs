//! Concurrency token handling for writes.

use crate::entity::{HasConcurrencyToken, WILDCARD_ETAG};

/// Gives an entity without a concurrency token the wildcard token.
///
/// A write carrying `*` applies regardless of the stored version. Entities
/// that round-trip a token from an earlier read keep it, and with it
/// lost-update detection.
pub fn ensure_token<E: HasConcurrencyToken + ?Sized>(entity: &mut E) {
    if entity.etag().is_none() {
        entity.set_etag(Some(WILDCARD_ETAG.to_string()));
    }
}

/// Applies [`ensure_token`] to every entity in order.
pub fn ensure_tokens<E: HasConcurrencyToken>(entities: &mut [E]) {
    for entity in entities.iter_mut() {
        ensure_token(entity);
    }
}
