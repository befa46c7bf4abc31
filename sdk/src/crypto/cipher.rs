use {
    crate::{crypto::gcm::GcmStream, error::CryptoError},
    rand::{RngCore, rngs::OsRng},
    subtle::ConstantTimeEq,
    tresor_protocol::keys::{IV_LENGTH, PlainFileKey, TAG_LENGTH},
};

/// Result of finalizing an encryption cipher.
#[derive(Debug)]
pub struct FinalizedEncryption {
    /// Ciphertext the cipher still held back; sent with the completion message.
    pub trailing: Vec<u8>,
    /// The file key, now carrying both IV and authentication tag.
    pub file_key: PlainFileKey,
}

/// Streaming encryption of one file's content.
///
/// Blocks must be processed in the exact order the plaintext appears in the
/// file; the cipher state advances with every call and is never rewound.
/// Finalization consumes the cipher, so a finished session cannot be touched
/// again.
pub struct FileEncryptionCipher {
    gcm: GcmStream,
    file_key: PlainFileKey,
}

impl FileEncryptionCipher {
    /// Binds a fresh file key, generating and storing its random IV.
    #[inline]
    pub fn new(mut file_key: PlainFileKey) -> Result<Self, CryptoError> {
        if file_key.iv.is_some() {
            return Err(CryptoError::Failure(
                "file key already has an initialization vector".to_owned(),
            ));
        }
        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);
        let gcm = GcmStream::new(file_key.key.as_bytes(), &iv);
        file_key.iv = Some(iv);
        Ok(Self { gcm, file_key })
    }

    /// The bound file key; its IV is already populated.
    #[must_use]
    #[inline]
    pub fn file_key(&self) -> &PlainFileKey {
        &self.file_key
    }

    #[must_use]
    #[inline]
    pub fn bytes_processed(&self) -> u64 {
        self.gcm.ciphertext_len()
    }

    /// Encrypts the next block of plaintext.
    #[must_use]
    #[inline]
    pub fn process_block(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut ciphertext = plaintext.to_vec();
        self.gcm.apply_keystream(&mut ciphertext);
        self.gcm.absorb(&ciphertext);
        ciphertext
    }

    /// Finalizes the stream, storing the authentication tag into the file key.
    #[must_use]
    #[inline]
    pub fn do_final(self) -> FinalizedEncryption {
        let Self { gcm, mut file_key } = self;
        file_key.tag = Some(gcm.finalize());
        FinalizedEncryption {
            // The counter-mode keystream never buffers ciphertext.
            trailing: Vec::new(),
            file_key,
        }
    }
}

/// Streaming decryption of one file's content.
///
/// Plaintext returned by [`process_block`] is not authenticated until
/// [`do_final`] succeeds; callers must not trust it before then.
///
/// [`process_block`]: Self::process_block
/// [`do_final`]: Self::do_final
pub struct FileDecryptionCipher {
    gcm: GcmStream,
    expected_tag: [u8; TAG_LENGTH],
}

impl FileDecryptionCipher {
    /// Binds an unwrapped file key, which must carry both IV and tag.
    #[inline]
    pub fn new(file_key: &PlainFileKey) -> Result<Self, CryptoError> {
        let iv = file_key.iv.ok_or(CryptoError::MissingIv)?;
        let expected_tag = file_key.tag.ok_or(CryptoError::MissingTag)?;
        Ok(Self {
            gcm: GcmStream::new(file_key.key.as_bytes(), &iv),
            expected_tag,
        })
    }

    #[must_use]
    #[inline]
    pub fn bytes_processed(&self) -> u64 {
        self.gcm.ciphertext_len()
    }

    /// Decrypts the next block of ciphertext.
    #[must_use]
    #[inline]
    pub fn process_block(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        self.gcm.absorb(ciphertext);
        let mut plaintext = ciphertext.to_vec();
        self.gcm.apply_keystream(&mut plaintext);
        plaintext
    }

    /// Verifies the authentication tag over the whole stream.
    ///
    /// On [`CryptoError::BadAuthenticationTag`] all previously returned
    /// plaintext must be discarded.
    #[inline]
    pub fn do_final(self) -> Result<(), CryptoError> {
        let computed = self.gcm.finalize();
        if bool::from(computed.as_slice().ct_eq(self.expected_tag.as_slice())) {
            Ok(())
        } else {
            Err(CryptoError::BadAuthenticationTag)
        }
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "test")]
mod tests {
    use {
        super::*,
        crate::crypto::{gcm::GcmStream, generate_file_key},
        tresor_protocol::keys::FileKeyVersion,
    };

    const SAMPLE: &[u8] = b"TestABCDEFGH 123\nTestIJKLMNOP 456\nTestQRSTUVWX 789";

    fn encrypt_in_chunks(data: &[u8], chunk_size: usize) -> (Vec<u8>, PlainFileKey) {
        let key = generate_file_key(FileKeyVersion::Rsa2048Aes256Gcm);
        let mut cipher = FileEncryptionCipher::new(key).unwrap();
        let mut ciphertext = Vec::new();
        for chunk in data.chunks(chunk_size) {
            ciphertext.extend_from_slice(&cipher.process_block(chunk));
        }
        let finalized = cipher.do_final();
        ciphertext.extend_from_slice(&finalized.trailing);
        (ciphertext, finalized.file_key)
    }

    fn decrypt_in_chunks(
        ciphertext: &[u8],
        key: &PlainFileKey,
        chunk_size: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut cipher = FileDecryptionCipher::new(key)?;
        let mut plaintext = Vec::new();
        for chunk in ciphertext.chunks(chunk_size.max(1)) {
            plaintext.extend_from_slice(&cipher.process_block(chunk));
        }
        cipher.do_final()?;
        Ok(plaintext)
    }

    #[test]
    fn sample_roundtrip_with_small_blocks() {
        let (ciphertext, key) = encrypt_in_chunks(SAMPLE, 8);
        assert_eq!(ciphertext.len(), SAMPLE.len());
        assert_ne!(ciphertext, SAMPLE);
        assert!(key.iv.is_some());
        assert!(key.tag.is_some());
        let plaintext = decrypt_in_chunks(&ciphertext, &key, 8).unwrap();
        assert_eq!(plaintext, SAMPLE);
    }

    #[test]
    fn empty_roundtrip() {
        let (ciphertext, key) = encrypt_in_chunks(b"", 8);
        assert!(ciphertext.is_empty());
        let plaintext = decrypt_in_chunks(&ciphertext, &key, 8).unwrap();
        assert!(plaintext.is_empty());
    }

    #[test]
    fn block_partitioning_does_not_change_the_result() {
        let data: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let (ciphertext, key) = encrypt_in_chunks(&data, 200);

        // The same stream encrypted in one go must be byte-identical,
        // including the tag.
        let mut whole = GcmStream::new(key.key.as_bytes(), &key.iv.unwrap());
        let mut oneshot = data.clone();
        whole.apply_keystream(&mut oneshot);
        whole.absorb(&oneshot);
        assert_eq!(oneshot, ciphertext);
        assert_eq!(whole.finalize(), key.tag.unwrap());

        // And decryption must not care how the ciphertext is sliced.
        for chunk_size in [1, 7, 16, 4096, usize::MAX] {
            let plaintext = decrypt_in_chunks(&ciphertext, &key, chunk_size).unwrap();
            assert_eq!(plaintext, data);
        }
    }

    #[test]
    fn tampered_ciphertext_is_detected() {
        let (mut ciphertext, key) = encrypt_in_chunks(SAMPLE, 16);
        ciphertext[3] ^= 0x01;
        let err = decrypt_in_chunks(&ciphertext, &key, 16).unwrap_err();
        assert!(matches!(err, CryptoError::BadAuthenticationTag));
    }

    #[test]
    fn tampered_tag_is_detected() {
        let (ciphertext, mut key) = encrypt_in_chunks(SAMPLE, 16);
        let mut tag = key.tag.unwrap();
        tag[0] ^= 0x80;
        key.tag = Some(tag);
        let err = decrypt_in_chunks(&ciphertext, &key, 16).unwrap_err();
        assert!(matches!(err, CryptoError::BadAuthenticationTag));
    }

    #[test]
    fn decryption_requires_iv_and_tag() {
        let key = generate_file_key(FileKeyVersion::Rsa2048Aes256Gcm);
        assert!(matches!(
            FileDecryptionCipher::new(&key),
            Err(CryptoError::MissingIv)
        ));
        let mut with_iv = key;
        with_iv.iv = Some([0; IV_LENGTH]);
        assert!(matches!(
            FileDecryptionCipher::new(&with_iv),
            Err(CryptoError::MissingTag)
        ));
    }

    #[test]
    fn encryption_cipher_rejects_preassigned_iv() {
        let mut key = generate_file_key(FileKeyVersion::Rsa2048Aes256Gcm);
        key.iv = Some([1; IV_LENGTH]);
        assert!(FileEncryptionCipher::new(key).is_err());
    }
}
