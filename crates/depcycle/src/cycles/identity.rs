//! Rotation-invariant cycle identity.
//!
//! The identity of a cycle is derived from its member *set*: members are
//! sorted, joined with `|`, hashed with SHA-256, and the first 16 hex
//! characters of the digest are kept. The same loop detected from a
//! different starting node in a later run gets the same id.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
pub const CYCLE_ID_LENGTH: usize = 16;

/// Compute the identity of a cycle with the given members.
#[must_use]
pub fn cycle_id<S: AsRef<str>>(members: &[S]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(sorted.join("|").as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(CYCLE_ID_LENGTH);
    for byte in &digest[..CYCLE_ID_LENGTH / 2] {
        let _ = write!(id, "{byte:02x}");
    }
    id
}
