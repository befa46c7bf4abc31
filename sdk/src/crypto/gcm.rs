//! Incremental AES-256-GCM.
//!
//! The one-shot AEAD APIs require the whole message at once; the transfer
//! pipeline instead feeds ciphertext through in arbitrary slices. This module
//! composes GCM from its primitives: AES-256 in 32-bit big-endian counter
//! mode for the keystream and a running GHASH over the ciphertext, finished
//! with the standard length block and masked with the encrypted pre-counter
//! block.

use {
    aes::{
        Aes256, Block,
        cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher, generic_array::GenericArray},
    },
    ctr::Ctr32BE,
    ghash::{GHash, universal_hash::UniversalHash},
    std::cmp::min,
    tresor_protocol::keys::{FILE_KEY_LENGTH, IV_LENGTH, TAG_LENGTH},
};

const GHASH_BLOCK_LENGTH: usize = 16;

/// Running GCM state over one stream of ciphertext.
///
/// The caller is responsible for feeding every ciphertext byte to [`absorb`]
/// exactly once and in order; the keystream advances independently through
/// [`apply_keystream`].
///
/// [`absorb`]: Self::absorb
/// [`apply_keystream`]: Self::apply_keystream
pub(crate) struct GcmStream {
    keystream: Ctr32BE<Aes256>,
    ghash: GHash,
    tag_mask: Block,
    partial: [u8; GHASH_BLOCK_LENGTH],
    partial_len: usize,
    ciphertext_len: u64,
}

impl GcmStream {
    pub(crate) fn new(key: &[u8; FILE_KEY_LENGTH], iv: &[u8; IV_LENGTH]) -> Self {
        let key = GenericArray::from_slice(key);

        // Hash subkey H = E_K(0).
        let mut hash_key = Block::default();
        Aes256::new(key).encrypt_block(&mut hash_key);
        let ghash = GHash::new(&hash_key);

        // Pre-counter block J0 = IV || 0^31 || 1 for a 96-bit IV. The first
        // keystream block E_K(J0) masks the tag; content starts at counter 2.
        let mut counter_block = [0u8; GHASH_BLOCK_LENGTH];
        counter_block[..IV_LENGTH].copy_from_slice(iv);
        counter_block[GHASH_BLOCK_LENGTH - 1] = 1;
        let mut keystream = Ctr32BE::<Aes256>::new(key, GenericArray::from_slice(&counter_block));
        let mut tag_mask = Block::default();
        keystream.apply_keystream(&mut tag_mask);

        Self {
            keystream,
            ghash,
            tag_mask,
            partial: [0; GHASH_BLOCK_LENGTH],
            partial_len: 0,
            ciphertext_len: 0,
        }
    }

    /// XORs the next keystream bytes into `data`.
    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        self.keystream.apply_keystream(data);
    }

    /// Feeds ciphertext into the running GHASH.
    pub(crate) fn absorb(&mut self, mut ciphertext: &[u8]) {
        self.ciphertext_len += ciphertext.len() as u64;
        if self.partial_len > 0 {
            let take = min(GHASH_BLOCK_LENGTH - self.partial_len, ciphertext.len());
            self.partial[self.partial_len..self.partial_len + take]
                .copy_from_slice(&ciphertext[..take]);
            self.partial_len += take;
            ciphertext = &ciphertext[take..];
            if self.partial_len == GHASH_BLOCK_LENGTH {
                self.ghash.update(&[Block::clone_from_slice(&self.partial)]);
                self.partial_len = 0;
            }
        }
        let mut blocks = ciphertext.chunks_exact(GHASH_BLOCK_LENGTH);
        for block in &mut blocks {
            self.ghash.update(&[Block::clone_from_slice(block)]);
        }
        let rest = blocks.remainder();
        if !rest.is_empty() {
            self.partial[..rest.len()].copy_from_slice(rest);
            self.partial_len = rest.len();
        }
    }

    /// Total ciphertext bytes absorbed so far.
    pub(crate) fn ciphertext_len(&self) -> u64 {
        self.ciphertext_len
    }

    /// Closes the stream and returns the authentication tag.
    pub(crate) fn finalize(mut self) -> [u8; TAG_LENGTH] {
        if self.partial_len > 0 {
            let mut block = Block::default();
            block[..self.partial_len].copy_from_slice(&self.partial[..self.partial_len]);
            self.ghash.update(&[block]);
        }
        // len(A) || len(C), both in bits; no associated data is used.
        let mut length_block = Block::default();
        length_block[8..].copy_from_slice(&(self.ciphertext_len * 8).to_be_bytes());
        self.ghash.update(&[length_block]);

        let mut tag = self.ghash.finalize();
        for (byte, mask) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *byte ^= mask;
        }
        tag.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // AES-256 GCM reference vectors (no associated data).
    const ZERO_KEY: [u8; FILE_KEY_LENGTH] = [0; FILE_KEY_LENGTH];
    const ZERO_IV: [u8; IV_LENGTH] = [0; IV_LENGTH];

    #[test]
    fn empty_stream_matches_reference_vector() {
        let tag = GcmStream::new(&ZERO_KEY, &ZERO_IV).finalize();
        assert_eq!(
            tag,
            [
                0x53, 0x0f, 0x8a, 0xfb, 0xc7, 0x45, 0x36, 0xb9, 0xa9, 0x63, 0xb4, 0xf1, 0xc4,
                0xcb, 0x73, 0x8b,
            ]
        );
    }

    #[test]
    fn single_block_matches_reference_vector() {
        let mut gcm = GcmStream::new(&ZERO_KEY, &ZERO_IV);
        let mut data = [0u8; 16];
        gcm.apply_keystream(&mut data);
        gcm.absorb(&data);
        assert_eq!(
            data,
            [
                0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba,
                0xf3, 0x9d, 0x18,
            ]
        );
        assert_eq!(
            gcm.finalize(),
            [
                0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b, 0x98, 0xb5, 0xd4,
                0x8a, 0xb9, 0x19,
            ]
        );
    }

    #[test]
    fn absorb_is_slicing_independent() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        let mut whole = GcmStream::new(&ZERO_KEY, &ZERO_IV);
        whole.absorb(&data);
        let whole_tag = whole.finalize();

        for split in [1_usize, 7, 16, 17, 333] {
            let mut sliced = GcmStream::new(&ZERO_KEY, &ZERO_IV);
            for piece in data.chunks(split) {
                sliced.absorb(piece);
            }
            assert_eq!(sliced.finalize(), whole_tag, "split {split}");
        }
    }
}
