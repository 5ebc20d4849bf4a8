/// Descriptor format version written into every envelope.
pub const ENVELOPE_VERSION: &str = "1.6";

/// Wrap a raw descriptor fragment in the versioned envelope the apply
/// primitive accepts for insertions and deletions.
///
/// Pure string composition: the fragment is never parsed, so a malformed
/// fragment yields a malformed envelope and is rejected at apply time.
pub fn normalize(fragment: &str) -> String {
    format!("{{\"sdf\":\"{ENVELOPE_VERSION}\",\"element\":{fragment}}}")
}

/// Normalize every descriptor of a list in place.
pub fn normalize_all(descriptors: &mut [String]) {
    for d in descriptors.iter_mut() {
        *d = normalize(d);
    }
}
