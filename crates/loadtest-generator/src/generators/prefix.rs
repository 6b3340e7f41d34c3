//! Sort key prefix generator.

use rand::Rng;

/// Characters a sort key may start with.
pub const SORT_KEY_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Pick one base-36 character uniformly.
pub fn random_prefix<R: Rng>(rng: &mut R) -> char {
    SORT_KEY_ALPHABET[rng.gen_range(0..SORT_KEY_ALPHABET.len())] as char
}
