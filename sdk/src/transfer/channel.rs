//! Contracts towards the network channel and the local file system.
//!
//! Both sides of the transfer pipeline are driven through traits so that the
//! controllers stay independent of any concrete HTTP client and can be tested
//! against in-memory doubles.

use {
    crate::error::ChannelError,
    bytes::Bytes,
    std::{
        future::Future,
        io::{self, Write},
        path::PathBuf,
    },
    tresor_protocol::{ChunkAck, CompleteUpload, Node},
};

/// Ordered chunk sink of one remote upload.
pub trait UploadChannel: Send {
    /// Delivers the ciphertext chunk starting at `offset`.
    ///
    /// Chunks arrive in strict file order; a retried chunk is re-sent with
    /// byte-identical content.
    fn send_chunk(
        &mut self,
        offset: u64,
        ciphertext: Bytes,
    ) -> impl Future<Output = Result<ChunkAck, ChannelError>> + Send;

    /// Seals the remote file after the last chunk.
    fn complete(
        &mut self,
        completion: CompleteUpload,
    ) -> impl Future<Output = Result<Node, ChannelError>> + Send;

    /// Drops the remote upload session, best effort.
    fn abort(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Ordered chunk source of one remote download.
pub trait DownloadChannel: Send {
    /// Expected total ciphertext size, when the remote side announced one.
    fn content_length(&self) -> Option<u64>;

    /// Next ciphertext chunk, or `None` at the end of the stream.
    fn receive_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, ChannelError>> + Send;
}

/// Destination of a download.
///
/// Decrypted plaintext is only trustworthy once the whole stream has been
/// authenticated, so a target must be able to discard everything it received
/// when the transfer does not finish cleanly.
pub trait DownloadTarget: Send {
    type Sink: Write + Send;

    fn open(&mut self) -> io::Result<Self::Sink>;

    /// Removes partially written output. Must succeed when nothing was written.
    fn discard(&mut self) -> io::Result<()>;

    /// Where the finished download lives, for targets backed by a path.
    fn location(&self) -> Option<PathBuf>;
}

/// Download target writing to a local file.
#[derive(Debug)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    #[must_use]
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DownloadTarget for FileTarget {
    type Sink = fs_err::File;

    #[inline]
    fn open(&mut self) -> io::Result<Self::Sink> {
        fs_err::File::create(&self.path)
    }

    #[inline]
    fn discard(&mut self) -> io::Result<()> {
        match fs_err::remove_file(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    #[inline]
    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}
