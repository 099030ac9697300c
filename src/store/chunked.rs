//! Chunked upload shared by the store clients.
//!
//! The stream is read in `chunk_size` slices and each slice is handed to a
//! transport closure. A failed slice is offered to the request's
//! `on_chunk_error` callback, which decides whether the same bytes are sent
//! again. No resume state is kept here; a failed upload is abandoned.

use crate::domain::model::{ChunkRange, ChunkUploadError, RemoteItem};
use crate::domain::ports::{OnChunkError, UploadRequest};
use crate::utils::cancel::cancellable;
use crate::utils::error::{DriveError, Result};
use bytes::Bytes;
use std::future::Future;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Send one chunk, retrying while `on_chunk_error` allows it.
///
/// Cancellation is never retried.
pub async fn send_chunk_with_retry<F, Fut, T>(
    range: ChunkRange,
    on_chunk_error: &OnChunkError,
    ct: &CancellationToken,
    mut send: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt_count: u32 = 0;

    loop {
        match cancellable(ct, send()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                let event = ChunkUploadError {
                    range,
                    attempt_count,
                    error: &e,
                };

                if !on_chunk_error(&event) {
                    return Err(DriveError::ChunkUpload {
                        offset: range.offset,
                        attempts: attempt_count + 1,
                        source: Box::new(e),
                    });
                }

                warn!(
                    "Chunk {} failed (attempt {}), retrying: {}",
                    range.content_range(),
                    attempt_count + 1,
                    e
                );
                attempt_count += 1;
            }
        }
    }
}

/// Drive a whole upload through `send_chunk`.
///
/// `send_chunk` returns `Some(item)` once the store has assembled the file,
/// which must happen no later than the last chunk. Zero-length uploads are
/// rejected; clients send those as a single empty request instead.
pub async fn upload_in_chunks<F, Fut>(
    request: UploadRequest<'_>,
    ct: &CancellationToken,
    mut send_chunk: F,
) -> Result<RemoteItem>
where
    F: FnMut(ChunkRange, Bytes) -> Fut,
    Fut: Future<Output = Result<Option<RemoteItem>>>,
{
    if request.chunk_size == 0 {
        return Err(DriveError::invalid_argument("chunk_size"));
    }
    if request.length == 0 {
        return Err(DriveError::invalid_argument("length"));
    }

    let total = request.length;
    let buffer_len = (request.chunk_size as u64).min(total) as usize;
    let mut buffer = vec![0u8; buffer_len];
    let mut offset = 0u64;

    while offset < total {
        let length = (request.chunk_size as u64).min(total - offset);
        let slice = &mut buffer[..length as usize];
        let content = &mut *request.content;
        cancellable(ct, async move {
            content.read_exact(slice).await?;
            Ok::<(), DriveError>(())
        })
        .await?;

        let data = Bytes::copy_from_slice(&buffer[..length as usize]);
        let range = ChunkRange {
            offset,
            length,
            total,
        };

        let outcome = send_chunk_with_retry(range, request.on_chunk_error, ct, || {
            send_chunk(range, data.clone())
        })
        .await?;

        debug!("Uploaded chunk {} of '{}'", range.content_range(), request.name);
        offset += length;

        if range.is_last() {
            return outcome.ok_or_else(|| DriveError::UnexpectedResponse {
                message: format!(
                    "upload of '{}' finished without returning an item",
                    request.name
                ),
            });
        }
    }

    Err(DriveError::UnexpectedResponse {
        message: format!("upload of '{}' ended early", request.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn range() -> ChunkRange {
        ChunkRange {
            offset: 0,
            length: 4,
            total: 4,
        }
    }

    fn transient() -> DriveError {
        DriveError::Remote {
            status: 503,
            code: "serviceNotAvailable".to_string(),
            message: "busy".to_string(),
        }
    }

    fn below_three(event: &ChunkUploadError<'_>) -> bool {
        event.attempt_count < 3
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let ct = CancellationToken::new();

        let result = send_chunk_with_retry(range(), &below_three, &ct, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_callback_refuses() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let ct = CancellationToken::new();

        let result: Result<()> = send_chunk_with_retry(range(), &below_three, &ct, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        match result {
            Err(DriveError::ChunkUpload {
                offset, attempts, ..
            }) => {
                assert_eq!(offset, 0);
                assert_eq!(attempts, 4);
            }
            other => panic!("Expected ChunkUpload error, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_callback_sees_increasing_attempt_counts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let on_error = move |event: &ChunkUploadError<'_>| {
            recorder.lock().unwrap().push(event.attempt_count);
            event.attempt_count < 3
        };
        let ct = CancellationToken::new();

        let _: Result<()> =
            send_chunk_with_retry(range(), &on_error, &ct, || async { Err(transient()) }).await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let ct = CancellationToken::new();

        let result: Result<()> = send_chunk_with_retry(range(), &below_three, &ct, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(DriveError::Cancelled) }
        })
        .await;

        assert!(matches!(result, Err(DriveError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_splits_into_chunks() {
        let mut content = Cursor::new(b"abcdefghij".to_vec());
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&ranges);
        let ct = CancellationToken::new();

        let request = UploadRequest {
            name: "letters.txt",
            content: &mut content,
            length: 10,
            chunk_size: 4,
            on_chunk_error: &below_three,
        };

        let item = upload_in_chunks(request, &ct, move |range, data| {
            recorder.lock().unwrap().push((range.content_range(), data.to_vec()));
            async move {
                if range.is_last() {
                    Ok(Some(RemoteItem::file("new-id", "letters.txt", range.total)))
                } else {
                    Ok(None)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(item.size, 10);
        let ranges = ranges.lock().unwrap();
        assert_eq!(
            *ranges,
            vec![
                ("bytes 0-3/10".to_string(), b"abcd".to_vec()),
                ("bytes 4-7/10".to_string(), b"efgh".to_vec()),
                ("bytes 8-9/10".to_string(), b"ij".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_short_stream_is_an_io_error() {
        let mut content = Cursor::new(b"abc".to_vec());
        let ct = CancellationToken::new();

        let request = UploadRequest {
            name: "short.txt",
            content: &mut content,
            length: 10,
            chunk_size: 4,
            on_chunk_error: &below_three,
        };

        let result = upload_in_chunks(request, &ct, |_, _| async { Ok(None) }).await;
        assert!(matches!(result, Err(DriveError::IoError(_))));
    }

    #[tokio::test]
    async fn test_missing_final_item_is_reported() {
        let mut content = Cursor::new(b"ab".to_vec());
        let ct = CancellationToken::new();

        let request = UploadRequest {
            name: "ab.txt",
            content: &mut content,
            length: 2,
            chunk_size: 4,
            on_chunk_error: &below_three,
        };

        let result = upload_in_chunks(request, &ct, |_, _| async { Ok(None) }).await;
        assert!(matches!(
            result,
            Err(DriveError::UnexpectedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let mut content = Cursor::new(b"ab".to_vec());
        let ct = CancellationToken::new();

        let request = UploadRequest {
            name: "ab.txt",
            content: &mut content,
            length: 2,
            chunk_size: 0,
            on_chunk_error: &below_three,
        };

        let result = upload_in_chunks(request, &ct, |_, _| async { Ok(None) }).await;
        assert!(matches!(result, Err(DriveError::InvalidArgument { .. })));
    }
}
