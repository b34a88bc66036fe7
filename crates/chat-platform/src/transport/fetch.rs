//! Streaming completion transport over browser `fetch()`.
//!
//! POSTs the request body as JSON via gloo-net, then reads the response
//! body incrementally through a `ReadableStreamDefaultReader`. Cancellation
//! is wired to an `AbortController`, which tears down the connection and
//! rejects any pending read.

use async_trait::async_trait;
use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, ReadableStreamDefaultReader};

use chat_core::cancel::CancelSignal;
use chat_core::ports::{ChunkStream, TransportPort};
use chat_types::{ChatError, Result, config::ChatConfig, wire::CompletionRequest};

use super::utf8::Utf8ChunkDecoder;

pub struct FetchTransport {
    api_base: String,
}

impl FetchTransport {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.api_base.clone())
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }
}

#[async_trait(?Send)]
impl TransportPort for FetchTransport {
    async fn open(
        &self,
        endpoint: &str,
        body: &CompletionRequest,
        cancel: CancelSignal,
    ) -> Result<ChunkStream> {
        let url = self.url_for(endpoint);

        let abort = AbortController::new().map_err(interop_error)?;
        let signal = abort.signal();
        cancel.on_cancel(move || abort.abort());

        let response = Request::post(&url)
            .abort_signal(Some(&signal))
            .json(body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| {
                if cancel.is_cancelled() {
                    ChatError::Cancelled
                } else {
                    ChatError::Network(e.to_string())
                }
            })?;

        if !response.ok() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ChatError::Http { status, body: text });
        }

        let stream = response
            .body()
            .ok_or_else(|| ChatError::Protocol("No response body".to_string()))?;
        let reader: ReadableStreamDefaultReader = stream.get_reader().unchecked_into();
        log::debug!("Streaming response from {}", url);

        let body_reader = BodyReader {
            reader,
            utf8: Utf8ChunkDecoder::new(),
            cancel,
            done: false,
        };
        Ok(Box::pin(futures::stream::unfold(body_reader, |mut r| async move {
            r.next_chunk().await.map(|item| (item, r))
        })))
    }

    fn transport_name(&self) -> &str {
        "fetch"
    }
}

struct BodyReader {
    reader: ReadableStreamDefaultReader,
    utf8: Utf8ChunkDecoder,
    cancel: CancelSignal,
    done: bool,
}

impl BodyReader {
    /// Next non-empty text chunk, `None` at end of body.
    async fn next_chunk(&mut self) -> Option<Result<String>> {
        while !self.done {
            let result = match JsFuture::from(self.reader.read()).await {
                Ok(result) => result,
                Err(_) if self.cancel.is_cancelled() => {
                    self.done = true;
                    return Some(Err(ChatError::Cancelled));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(js_error(e)));
                }
            };

            let finished = Reflect::get(&result, &JsValue::from_str("done"))
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if finished {
                self.done = true;
                let tail = self.utf8.finish();
                return (!tail.is_empty()).then_some(Ok(tail));
            }

            let value = match Reflect::get(&result, &JsValue::from_str("value")) {
                Ok(value) => value,
                Err(e) => {
                    self.done = true;
                    return Some(Err(interop_error(e)));
                }
            };
            let text = self.utf8.push(&Uint8Array::new(&value).to_vec());
            if !text.is_empty() {
                return Some(Ok(text));
            }
        }
        None
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        // Stop the browser from buffering a body nobody reads any more.
        if !self.done {
            let _ = self.reader.cancel();
        }
    }
}

fn describe(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn js_error(e: JsValue) -> ChatError {
    ChatError::Network(describe(&e))
}

fn interop_error(e: JsValue) -> ChatError {
    ChatError::JsInterop(describe(&e))
}
