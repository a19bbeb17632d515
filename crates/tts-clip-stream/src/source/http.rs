//! HTTP [`ClipByteSource`] implementation.
//!
//! Posts a synthesis request built from a [`BackendConfig`] and streams the
//! response body as ordered `SourceMsg::Data(Bytes)` items, ending with
//! `SourceMsg::EndOfStream` when the transport closes the body.
//!
//! Notes:
//! - No fixed-size buffering here; the session's bounded channels control
//!   memory and pacing downstream.
//! - Cancellation is best-effort: dropping the stream drops the underlying
//!   HTTP body.
//! - Retries/backoff are deliberately out of scope; a transport failure ends
//!   the session.

use std::io;
use std::pin::Pin;

use futures_util::Stream;
use reqwest::Client;

use super::{ClipByteSource, SourceMsg};
use crate::backend::{BackendConfig, SynthesisRequest};
use crate::error::SessionResult;

/// Streaming HTTP synthesis source.
pub struct HttpClipSource {
    backend: BackendConfig,
    request: SynthesisRequest,
    client: Client,
}

impl HttpClipSource {
    /// Create a source for one synthesis request.
    ///
    /// Validates the request against the backend's limits up front, so a
    /// malformed request never reaches the network.
    pub fn new(backend: BackendConfig, request: SynthesisRequest) -> SessionResult<Self> {
        Self::with_client(backend, request, Client::new())
    }

    /// Like [`HttpClipSource::new`] with a custom `reqwest::Client` (for
    /// timeouts, proxies, etc.).
    pub fn with_client(
        backend: BackendConfig,
        request: SynthesisRequest,
        client: Client,
    ) -> SessionResult<Self> {
        backend.validate(&request)?;
        backend.synthesis_url()?;
        Ok(Self {
            backend,
            request,
            client,
        })
    }
}

impl ClipByteSource for HttpClipSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn into_stream(self: Box<Self>) -> Pin<Box<dyn Stream<Item = io::Result<SourceMsg>> + Send>> {
        let url = self
            .backend
            .synthesis_url()
            .expect("url validated at construction");
        let body = self.backend.build_body(&self.request);
        let client = self.client;

        // Build a stream that performs the POST on first poll, yields body
        // bytes as they arrive, then yields EndOfStream once. The spent state
        // (neither request nor response left) ends the stream, so draining
        // past EndOfStream just yields `None`.
        let s = futures_util::stream::try_unfold(
            (Some((client, url, body)), Option::<reqwest::Response>::None),
            |(init, resp)| async move {
                let mut resp = match resp {
                    Some(r) => r,
                    None => {
                        let Some((client, url, body)) = init else {
                            return Ok(None);
                        };
                        tracing::debug!(%url, "posting synthesis request");
                        let r = client
                            .post(url)
                            .json(&body)
                            .send()
                            .await
                            .map_err(transport_error)?;
                        let status = r.status();
                        if !status.is_success() {
                            // A reachable server answering with a failure
                            // status is "bad response", not "service
                            // unreachable".
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("bad response: HTTP {status}"),
                            ));
                        }
                        r
                    }
                };

                match resp.chunk().await {
                    Ok(Some(chunk)) => Ok(Some((SourceMsg::Data(chunk), (None, Some(resp))))),
                    Ok(None) => Ok(Some((SourceMsg::EndOfStream, (None, None)))),
                    Err(e) => Err(transport_error(e)),
                }
            },
        );

        Box::pin(s)
    }
}

fn transport_error(e: reqwest::Error) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, e.to_string())
}
