//! Incremental text decoding of a chunked response body.
//!
//! The generation endpoint sends raw concatenable text with no framing, so the
//! only job here is turning byte chunks into text fragments without breaking a
//! multi-byte character that straddles two chunks.

use std::char::REPLACEMENT_CHARACTER;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream::FusedStream;

use crate::error::TransportError;

/// Stateful UTF-8 decoder.
///
/// Incomplete trailing sequences are held back until the next chunk. Invalid
/// sequences decode to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut pos = 0;
        while pos < buf.len() {
            match std::str::from_utf8(&buf[pos..]) {
                Ok(text) => {
                    out.push_str(text);
                    pos = buf.len();
                }
                Err(e) => {
                    let valid = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&buf[pos..valid]));
                    if let Some(len) = e.error_len() {
                        out.push(REPLACEMENT_CHARACTER);
                        pos = valid + len;
                    } else {
                        // Truncated sequence at the end; wait for more bytes
                        self.pending = buf[valid..].to_vec();
                        return out;
                    }
                }
            }
        }
        out
    }

    /// Flushes a dangling partial sequence at end of stream.
    fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Text fragments decoded from a byte stream.
///
/// Yields non-empty fragments in arrival order. A transport error from the
/// inner stream is yielded once as `Err` and ends the sequence. Not restartable.
pub struct TextFragments<S> {
    inner: S,
    decoder: Utf8Decoder,
    done: bool,
}

impl<S> TextFragments<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: Utf8Decoder::default(),
            done: false,
        }
    }
}

impl<S, E> Stream for TextFragments<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<TransportError>,
{
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let text = self.decoder.decode(&chunk);
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(err.into())));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    let tail = self.decoder.finish();
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(tail)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S, E> FusedStream for TextFragments<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<TransportError>,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    fn chunks(
        parts: &[&'static [u8]],
    ) -> TextFragments<impl Stream<Item = Result<Bytes, TransportError>> + Unpin> {
        let items: Vec<Result<Bytes, TransportError>> =
            parts.iter().copied().map(|p| Ok(Bytes::from_static(p))).collect();
        TextFragments::new(stream::iter(items))
    }

    async fn collect_ok<S>(fragments: S) -> Vec<String>
    where
        S: Stream<Item = Result<String, TransportError>>,
    {
        fragments.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_plain_chunks_pass_through_in_order() {
        let out = collect_ok(chunks(&[b"H".as_slice(), b"i there".as_slice()])).await;
        assert_eq!(out, vec!["H", "i there"]);
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        // "분석" is EB B6 84 EC 84 9D
        let out = collect_ok(chunks(&[
            b"\xEB\xB6".as_slice(),
            b"\x84\xEC".as_slice(),
            b"\x84\x9D!".as_slice(),
        ]))
        .await;
        assert_eq!(out.concat(), "분석!");
        // The first chunk held only a partial character and produced nothing
        assert_eq!(out, vec!["분", "석!"]);
    }

    #[tokio::test]
    async fn test_every_split_point_reassembles() {
        let text = "삼성전자 3분기 실적, 예상치 상회";
        let bytes = text.as_bytes();
        for cut in 0..=bytes.len() {
            let (a, b) = bytes.split_at(cut);
            let parts: Vec<Result<Bytes, TransportError>> =
                vec![Ok(Bytes::copy_from_slice(a)), Ok(Bytes::copy_from_slice(b))];
            let fragments = TextFragments::new(stream::iter(parts));
            assert_eq!(collect_ok(fragments).await.concat(), text, "cut at {cut}");
        }
    }

    #[tokio::test]
    async fn test_invalid_bytes_become_replacement_character() {
        let out = collect_ok(chunks(&[b"a\xFFb".as_slice()])).await;
        assert_eq!(out.concat(), "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn test_dangling_partial_flushed_at_end() {
        let out = collect_ok(chunks(&[b"ok".as_slice(), b"\xEB\xB6".as_slice()])).await;
        assert_eq!(out, vec!["ok", "\u{FFFD}"]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::body("connection reset")),
            Ok(Bytes::from_static(b"never")),
        ];
        let mut fragments = TextFragments::new(stream::iter(parts));

        assert_eq!(fragments.next().await.unwrap().unwrap(), "partial");
        let err = fragments.next().await.unwrap().unwrap_err();
        assert_eq!(err.message, "connection reset");
        assert!(fragments.next().await.is_none());
        assert!(fragments.is_terminated());
        assert!(fragments.next().await.is_none());
    }
}
