pub mod encoding;
pub mod keys;
pub mod util;

pub use crate::keys::{
    EncryptedFileKey, FileKey, FileKeyVersion, PlainFileKey, UserKeyPair, UserKeyPairVersion,
    UserPrivateKey, UserPublicKey,
};
use derive_more::{Display, From, Into};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};

/// Server-side identifier of a stored file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into,
)]
pub struct NodeId(pub i64);

/// Server-side identifier of an open upload, passed through to the channel opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct UploadId(pub String);

const TRANSFER_ID_LENGTH: usize = 16;

/// Client-side identifier of one upload or download.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
pub struct TransferId(pub String);

impl TransferId {
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut rand::thread_rng(), TRANSFER_ID_LENGTH))
    }
}

/// Policy for resolving a file name conflict when an upload is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Reject the upload if a file with the same name exists.
    Fail,
    /// Replace the existing file.
    Overwrite,
    /// Store under a modified name.
    AutoRename,
}

/// Metadata of a stored file, as reported by the server after a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub size: Option<u64>,
}

/// Acknowledgment for one uploaded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub offset: u64,
    pub length: u64,
}

/// Finalization message for an upload.
///
/// Carries everything the remote side needs to seal the file: the target name,
/// the conflict policy, the wrapped file key and any ciphertext the cipher
/// still held back at finalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUpload {
    pub name: String,
    pub resolution_strategy: ResolutionStrategy,
    pub file_key: EncryptedFileKey,
    #[serde(with = "crate::encoding::base64_vec")]
    pub trailing: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_id_generate() {
        let id = TransferId::generate();
        assert_eq!(id.0.len(), TRANSFER_ID_LENGTH);
        assert!(id.0.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, TransferId::generate());
    }

    #[test]
    fn resolution_strategy_wire_names() {
        let json = serde_json::to_string(&ResolutionStrategy::AutoRename).unwrap();
        assert_eq!(json, "\"autorename\"");
        let parsed: ResolutionStrategy = serde_json::from_str("\"overwrite\"").unwrap();
        assert_eq!(parsed, ResolutionStrategy::Overwrite);
    }
}
