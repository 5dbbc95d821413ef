//! Name hashing shared by strings, descriptors and call sites.

/// Polynomial (base 31) hash over raw bytes.
///
/// Strings cache this value at allocation time and every field, method and
/// type descriptor records it, so member lookups compare a `u32` before
/// anything else.
///
/// # Examples
///
/// ```
/// use core_types::name_hash;
///
/// assert_eq!(name_hash(b""), 0);
/// assert_eq!(name_hash(b"a"), 97);
/// assert_eq!(name_hash(b"area"), name_hash("area".as_bytes()));
/// ```
pub fn name_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |hash, &byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)))
}
