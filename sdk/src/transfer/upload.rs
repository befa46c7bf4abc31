use {
    super::{
        EVENT_CHANNEL_CAPACITY, TransferConfig, TransferEvent, TransferHandle, TransferOutcome,
        channel::UploadChannel,
        emit_progress, finish,
        session::{TransferSession, TransferStatus},
    },
    crate::{
        crypto::{FileEncryptionCipher, encrypt_file_key},
        error::TransferError,
    },
    bytes::Bytes,
    std::{
        io::{self, Read},
        sync::Arc,
    },
    tokio::sync::mpsc,
    tracing::{debug, instrument, warn},
    tresor_protocol::{
        CompleteUpload, Node, PlainFileKey, ResolutionStrategy, UserPublicKey,
        util::maybe_block_in_place,
    },
};

/// Everything needed to start one encrypted upload.
pub struct UploadRequest<R> {
    /// Target file name on the remote side.
    pub name: String,
    /// Plaintext source, read sequentially in chunk-sized blocks.
    pub source: R,
    /// Plaintext length, when known; drives progress fractions.
    pub source_length: Option<u64>,
    /// Fresh file key from the key service; IV and tag still unset.
    pub file_key: PlainFileKey,
    /// Public key the file key is wrapped under at completion.
    pub recipient: UserPublicKey,
    pub resolution_strategy: ResolutionStrategy,
}

/// Starts an upload on its own worker task and returns its handle.
#[inline]
pub fn spawn_upload<R, C>(
    request: UploadRequest<R>,
    channel: C,
    config: TransferConfig,
) -> TransferHandle
where
    R: Read + Send + 'static,
    C: UploadChannel + 'static,
{
    let session = Arc::new(TransferSession::new(request.source_length));
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn({
        let session = Arc::clone(&session);
        let mut channel = channel;
        async move {
            let result = run_upload(request, &mut channel, &config, &session, &events_tx).await;
            let terminal = finish(&session, result.map(TransferOutcome::Uploaded));
            let _ = events_tx.send(terminal).await;
        }
    });
    TransferHandle {
        session,
        events: events_rx,
        task,
    }
}

#[instrument(skip_all, fields(transfer_id = %session.transfer_id()))]
async fn run_upload<R: Read, C: UploadChannel>(
    request: UploadRequest<R>,
    channel: &mut C,
    config: &TransferConfig,
    session: &TransferSession,
    events: &mpsc::Sender<TransferEvent>,
) -> Result<Node, TransferError> {
    let UploadRequest {
        name,
        mut source,
        source_length: _,
        file_key,
        recipient,
        resolution_strategy,
    } = request;
    session.transition(TransferStatus::InProgress);

    let mut cipher = FileEncryptionCipher::new(file_key)?;
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let mut offset = 0u64;
    loop {
        if session.is_cancelled() {
            abort_channel(channel).await;
            return Err(TransferError::Canceled);
        }
        let read = maybe_block_in_place(|| read_full(&mut source, &mut buf))
            .map_err(|err| local_io_error(err, session))?;
        if read == 0 {
            break;
        }
        let ciphertext = Bytes::from(cipher.process_block(&buf[..read]));
        send_chunk_with_retry(channel, offset, ciphertext, config.max_chunk_attempts, session)
            .await?;
        offset += read as u64;
        session.add_bytes(read as u64);
        emit_progress(session, events);
        debug!(offset, "chunk uploaded");
    }

    let finalized = cipher.do_final();
    let file_key = encrypt_file_key(&finalized.file_key, &recipient)?;
    if session.is_cancelled() {
        abort_channel(channel).await;
        return Err(TransferError::Canceled);
    }
    let node = channel
        .complete(CompleteUpload {
            name,
            resolution_strategy,
            file_key,
            trailing: finalized.trailing,
        })
        .await?;
    Ok(node)
}

/// Delivers one ciphertext chunk, resending the identical bytes on transport
/// failures. The cipher has already advanced past this plaintext, so the
/// chunk must never be re-encrypted.
async fn send_chunk_with_retry<C: UploadChannel>(
    channel: &mut C,
    offset: u64,
    ciphertext: Bytes,
    max_attempts: u32,
    session: &TransferSession,
) -> Result<(), TransferError> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let err = match channel.send_chunk(offset, ciphertext.clone()).await {
            Ok(_ack) => break Ok(()),
            Err(err) => err,
        };
        if !err.is_retryable() || attempts >= max_attempts {
            break Err(TransferError::ChunkUploadFailed {
                offset,
                attempts,
                source: err,
            });
        }
        session.note_chunk_retry();
        warn!(offset, attempts, error = %err, "chunk upload failed, retrying");
    }
}

async fn abort_channel<C: UploadChannel>(channel: &mut C) {
    if let Err(err) = channel.abort().await {
        warn!(error = %err, "failed to abort remote upload");
    }
}

fn local_io_error(err: io::Error, session: &TransferSession) -> TransferError {
    // Cancellation wins over I/O failures of an already-cancelled transfer.
    if session.is_cancelled() {
        TransferError::Canceled
    } else {
        TransferError::Io(err)
    }
}

/// Reads until `buf` is full or the source is exhausted.
fn read_full(source: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
