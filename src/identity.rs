// src/identity.rs
// Random name suffixes for containers and other per-test resources

use data_encoding::BASE32_NOPAD;
use rand::RngCore;

/// Random bytes behind a default suffix (encodes to 10 characters)
pub const DEFAULT_SUFFIX_BYTES: usize = 6;

/// Random suffix for container and volume names.
///
/// Drawn from the thread-local CSPRNG, so parallel tests in one run do not
/// collide in practice.
pub fn random_suffix() -> String {
    let mut buf = [0u8; DEFAULT_SUFFIX_BYTES];
    rand::rng().fill_bytes(&mut buf);
    encode(&buf)
}

/// Resource name of the form `<prefix>-<suffix>`
pub fn resource_name(prefix: &str) -> String {
    format!("{}-{}", prefix, random_suffix())
}

/// Unpadded, lowercase base32
fn encode(data: &[u8]) -> String {
    BASE32_NOPAD.encode(data).to_ascii_lowercase()
}
