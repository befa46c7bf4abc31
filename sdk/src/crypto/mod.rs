//! File content is encrypted with AES-256-GCM under a random per-file key.
//!
//! The cipher runs as a stream: content is fed to it in blocks of arbitrary
//! size, the keystream and the running GHASH advance across block boundaries,
//! and a single authentication tag over the whole stream is produced (or
//! verified) at finalization. The resulting ciphertext and tag depend only on
//! the key, the IV and the byte sequence, never on how the caller happened to
//! slice it.
//!
//! The per-file key travels next to the file, wrapped under the owner's (or a
//! share recipient's) RSA public key with OAEP/SHA-256. The matching private
//! key is stored as an encrypted PKCS#8 container whose protection key is
//! derived from the user's password with a fresh random salt, so unwrapping a
//! file key always requires both the private key container and the password.

mod cipher;
mod gcm;
mod keypair;

pub use cipher::{FileDecryptionCipher, FileEncryptionCipher, FinalizedEncryption};
pub use keypair::{
    check_user_key_pair, decrypt_file_key, encrypt_file_key, generate_user_key_pair,
};
use tresor_protocol::keys::{FileKey, FileKeyVersion, PlainFileKey};

/// Generates a fresh random file key for the given version, without IV or tag.
///
/// Every call returns new key material.
#[must_use]
#[inline]
pub fn generate_file_key(version: FileKeyVersion) -> PlainFileKey {
    PlainFileKey::new(FileKey::generate(), version)
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashSet};

    #[test]
    fn file_keys_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let key = generate_file_key(FileKeyVersion::Rsa2048Aes256Gcm);
            assert!(key.iv.is_none());
            assert!(key.tag.is_none());
            assert!(seen.insert(key.key.as_bytes().to_vec()));
        }
    }
}
