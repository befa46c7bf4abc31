use {
    std::io,
    thiserror::Error,
    tresor_protocol::keys::{FileKeyVersion, UnsupportedVersion, UserKeyPairVersion},
};

/// Failures of the key and content cryptography.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Unrecoverable failure of an underlying primitive.
    #[error("cryptographic operation failed: {0}")]
    Failure(String),
    /// The computed authentication tag does not match the stored one.
    /// All plaintext produced before finalization must be discarded.
    #[error("authentication tag mismatch")]
    BadAuthenticationTag,
    /// The private key container could not be opened with the given password.
    #[error("invalid private key password")]
    InvalidPassword,
    /// The wrapped file key is corrupted or was tampered with.
    #[error("invalid or corrupted file key")]
    InvalidFileKey,
    #[error("weak password: {0}")]
    WeakPassword(&'static str),
    #[error("incompatible versions: file key `{file_key}` vs key pair `{key_pair}`")]
    VersionMismatch {
        file_key: FileKeyVersion,
        key_pair: UserKeyPairVersion,
    },
    #[error("file key has no initialization vector")]
    MissingIv,
    #[error("file key has no authentication tag")]
    MissingTag,
    #[error(transparent)]
    UnsupportedVersion(#[from] UnsupportedVersion),
}

/// Failure reported by an upload or download channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Transport-level failure; the operation may be retried.
    #[error("channel I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The remote side rejected the request; retrying is pointless.
    #[error("channel rejected request: {0}")]
    Rejected(String),
}

impl ChannelError {
    #[must_use]
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Terminal failure of one transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// A chunk could not be delivered within the retry budget. Any remote
    /// state of this upload must be considered abandoned.
    #[error("failed to upload chunk at offset {offset} after {attempts} attempts: {source}")]
    ChunkUploadFailed {
        offset: u64,
        attempts: u32,
        source: ChannelError,
    },
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Local file system failure.
    #[error("local I/O failed: {0}")]
    Io(#[from] io::Error),
    /// Not an error: the transfer was canceled by the caller.
    #[error("transfer canceled")]
    Canceled,
}
