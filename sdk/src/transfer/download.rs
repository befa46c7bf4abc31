use {
    super::{
        EVENT_CHANNEL_CAPACITY, TransferConfig, TransferEvent, TransferHandle, TransferOutcome,
        channel::{DownloadChannel, DownloadTarget},
        emit_progress, finish,
        session::{TransferSession, TransferStatus},
    },
    crate::{
        crypto::{FileDecryptionCipher, decrypt_file_key},
        error::TransferError,
    },
    bytes::Bytes,
    std::{io::Write, path::PathBuf, sync::Arc},
    tokio::sync::mpsc,
    tracing::{debug, instrument, warn},
    tresor_protocol::{
        keys::{EncryptedFileKey, UserPrivateKey},
        util::maybe_block_in_place,
    },
};

/// Everything needed to start one encrypted download.
pub struct DownloadRequest<T> {
    /// The wrapped file key stored next to the remote file.
    pub encrypted_key: EncryptedFileKey,
    /// The owner's private key container.
    pub private_key: UserPrivateKey,
    /// Password protecting the private key container.
    pub password: String,
    /// Where decrypted content is written.
    pub target: T,
}

/// Starts a download on its own worker task and returns its handle.
#[inline]
pub fn spawn_download<C, T>(
    request: DownloadRequest<T>,
    channel: C,
    config: TransferConfig,
) -> TransferHandle
where
    C: DownloadChannel + 'static,
    T: DownloadTarget + 'static,
{
    let session = Arc::new(TransferSession::new(None));
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn({
        let session = Arc::clone(&session);
        let mut channel = channel;
        async move {
            let result = run_download(request, &mut channel, &config, &session, &events_tx).await;
            let terminal = finish(
                &session,
                result.map(|location| TransferOutcome::Downloaded { location }),
            );
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
async fn run_download<C: DownloadChannel, T: DownloadTarget>(
    request: DownloadRequest<T>,
    channel: &mut C,
    config: &TransferConfig,
    session: &TransferSession,
    events: &mpsc::Sender<TransferEvent>,
) -> Result<Option<PathBuf>, TransferError> {
    let DownloadRequest {
        encrypted_key,
        private_key,
        password,
        mut target,
    } = request;
    session.transition(TransferStatus::InProgress);

    let plain_key = decrypt_file_key(&encrypted_key, &private_key, &password)?;
    let cipher = FileDecryptionCipher::new(&plain_key)?;
    session.set_source_length(channel.content_length());

    let mut sink = maybe_block_in_place(|| target.open())?;
    let result = pump(channel, cipher, &mut sink, config, session, events).await;
    drop(sink);

    match result {
        Ok(()) => Ok(target.location()),
        Err(err) => {
            // Plaintext written before a failed finalization was never
            // authenticated; it must not survive at the destination.
            if let Err(discard_err) = maybe_block_in_place(|| target.discard()) {
                warn!(error = %discard_err, "failed to discard partial download output");
            }
            Err(err)
        }
    }
}

async fn pump<C: DownloadChannel, W: Write>(
    channel: &mut C,
    mut cipher: FileDecryptionCipher,
    sink: &mut W,
    config: &TransferConfig,
    session: &TransferSession,
    events: &mpsc::Sender<TransferEvent>,
) -> Result<(), TransferError> {
    loop {
        if session.is_cancelled() {
            return Err(TransferError::Canceled);
        }
        let Some(chunk) = receive_chunk_with_retry(channel, config.max_chunk_attempts, session)
            .await?
        else {
            break;
        };
        let plaintext = cipher.process_block(&chunk);
        maybe_block_in_place(|| sink.write_all(&plaintext)).map_err(|err| {
            if session.is_cancelled() {
                TransferError::Canceled
            } else {
                TransferError::Io(err)
            }
        })?;
        session.add_bytes(chunk.len() as u64);
        emit_progress(session, events);
        debug!(bytes = chunk.len(), "chunk downloaded");
    }
    cipher.do_final()?;
    maybe_block_in_place(|| sink.flush()).map_err(TransferError::Io)?;
    Ok(())
}

/// Fetches the next chunk, retrying transport failures within the budget.
/// The channel is expected to resume at the same stream offset after a
/// failed receive.
async fn receive_chunk_with_retry<C: DownloadChannel>(
    channel: &mut C,
    max_attempts: u32,
    session: &TransferSession,
) -> Result<Option<Bytes>, TransferError> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let err = match channel.receive_chunk().await {
            Ok(chunk) => break Ok(chunk),
            Err(err) => err,
        };
        if !err.is_retryable() || attempts >= max_attempts {
            break Err(TransferError::Channel(err));
        }
        session.note_chunk_retry();
        warn!(attempts, error = %err, "chunk receive failed, retrying");
    }
}
