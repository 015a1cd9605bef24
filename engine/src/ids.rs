//! Monotonic-lexicographic 26-char opaque id generator, used for both room
//! and viewer identifiers. Built on a UUIDv7 (48-bit millisecond timestamp
//! in the top bits, the rest version/variant-tagged randomness), re-encoded
//! as 26 Crockford-base32 characters instead of the canonical 36-char
//! hyphenated form so that two ids minted in the same millisecond still
//! sort correctly most of the time and, crucially, an id minted later
//! always sorts at or after one minted earlier.

use protocol::OPAQUE_ID_LEN;
use uuid::Uuid;

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn encode_crockford32(bytes: [u8; 16]) -> String {
    // 128 bits packed as 26 * 5-bit groups (130 bits of output space, top 2
    // bits of the first character are always zero).
    let mut value: u128 = u128::from_be_bytes(bytes);
    let mut out = [0u8; OPAQUE_ID_LEN];
    for slot in out.iter_mut().rev() {
        let idx = (value & 0x1F) as usize;
        *slot = CROCKFORD_ALPHABET[idx];
        value >>= 5;
    }
    String::from_utf8(out.to_vec()).expect("crockford alphabet is ASCII")
}

/// Generates a fresh 26-char opaque id, timestamp-prefixed so ids sort in
/// creation order.
pub fn generate_id() -> String {
    encode_crockford32(*Uuid::now_v7().as_bytes())
}

#[cfg(test)]
fn generate_id_at(timestamp_millis: u64) -> String {
    let seconds = (timestamp_millis / 1000) as u32;
    let subsec_nanos = ((timestamp_millis % 1000) * 1_000_000) as u32;
    let uuid = Uuid::new_v7(uuid::Timestamp::from_unix(
        uuid::NoContext,
        seconds as u64,
        subsec_nanos,
    ));
    encode_crockford32(*uuid.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_the_right_length() {
        assert_eq!(generate_id().len(), OPAQUE_ID_LEN);
    }

    #[test]
    fn ids_minted_later_sort_after_ids_minted_earlier() {
        let earlier = generate_id_at(1_000);
        let later = generate_id_at(2_000);
        assert!(earlier < later);
    }

    #[test]
    fn ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }
}
