use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::utils::base64_url_encode;

/// Number of random bytes behind a verifier. Encodes to 43 characters.
pub const VERIFIER_BYTES: usize = 32;

/// The only challenge method we send
pub const CHALLENGE_METHOD: &str = "S256";

/// A PKCE code verifier and the challenge derived from it
#[derive(Clone)]
pub struct PkcePair {
    /// Kept server-side until the code exchange
    pub verifier: String,
    /// Sent to the authorization endpoint
    pub challenge: String,
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Generate PKCE code verifier and challenge
///
/// Only fails when the operating system's entropy source is unavailable.
pub fn generate() -> Result<PkcePair, rand::Error> {
    let mut verifier_bytes = [0u8; VERIFIER_BYTES];
    OsRng.try_fill_bytes(&mut verifier_bytes)?;

    let verifier = base64_url_encode(&verifier_bytes);
    let challenge = challenge_for(&verifier);

    Ok(PkcePair {
        verifier,
        challenge,
    })
}

/// S256 challenge: the hash is taken over the encoded verifier text, not the raw bytes
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    base64_url_encode(&hasher.finalize())
}
