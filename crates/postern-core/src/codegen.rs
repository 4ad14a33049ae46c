use xxhash_rust::xxh64::xxh64;

/// Default length of generated short codes.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Derives a short code from an original URL.
///
/// The code is a pure function of `original` and `length`: seeded xxh64
/// digests of the URL are base58-encoded and concatenated until `length`
/// characters are available, then truncated. Retrying an insert of the
/// same URL therefore derives the same code; uniqueness among live
/// records is enforced by the store, not here.
///
/// Performs no I/O and cannot fail for non-empty input. Callers reject
/// empty input upstream.
pub fn shorten(original: &str, length: usize) -> String {
    let mut encoded = String::with_capacity(length + 11);
    let mut seed = 0u64;
    while encoded.len() < length {
        let digest = xxh64(original.as_bytes(), seed);
        encoded.push_str(&bs58::encode(digest.to_be_bytes()).into_string());
        seed += 1;
    }
    encoded.truncate(length);
    encoded
}
