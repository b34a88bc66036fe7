//! Stream session controller — one live completion stream per conversation.
//!
//! The controller is an explicit state machine:
//! 1. [`StreamController::start_stream`] appends the user message and a
//!    pending assistant reply, supersedes any older stream on the same
//!    conversation and registers a new [`StreamHandle`]
//! 2. [`StreamController::process_chunk`] feeds raw text through the
//!    handle's [`FrameDecoder`] and applies each frame to the reply
//! 3. [`StreamController::finalize`] retires the handle exactly once
//!
//! [`StreamController::drive`] is the async driver that pulls chunks from
//! the transport and runs the machine; tests and other runtimes can call the
//! steps directly. Everything runs on one thread and no RefCell borrow is
//! held across an `.await`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::StreamExt;

use chat_types::{
    ChatError, Result,
    conversation::ConversationId,
    event::{ChatEvent, FinishReason},
    message::{Message, MessageId},
    wire::CompletionRequest,
};
use crate::cancel::CancelSignal;
use crate::decoder::{Frame, FrameDecoder};
use crate::event_bus::WeakEventBus;
use crate::ports::TransportPort;
use crate::store::ChatStore;

/// What the user typed, plus whether to send prior history with it
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub text: String,
    pub using_context: bool,
}

impl SendRequest {
    pub fn new(text: impl Into<String>, using_context: bool) -> Self {
        Self {
            text: text.into(),
            using_context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

#[derive(Debug)]
struct HandleShared {
    cancel: CancelSignal,
    outcome: RefCell<Option<FinishReason>>,
}

impl HandleShared {
    /// Record the outcome. `false` if one was already recorded.
    fn retire(&self, reason: &FinishReason) -> bool {
        let mut outcome = self.outcome.borrow_mut();
        if outcome.is_some() {
            return false;
        }
        *outcome = Some(reason.clone());
        true
    }
}

/// One in-flight completion request, bound to one conversation and one
/// assistant message. Clones refer to the same stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: StreamId,
    conversation_id: ConversationId,
    message_id: MessageId,
    shared: Rc<HandleShared>,
}

impl StreamHandle {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// The assistant reply this stream writes into
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.shared.cancel.clone()
    }

    /// Retired handles never touch their message again.
    pub fn is_retired(&self) -> bool {
        self.shared.outcome.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<FinishReason> {
        self.shared.outcome.borrow().clone()
    }
}

/// Result of feeding one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// Keep reading
    Continue,
    /// A terminal frame retired the handle; stop reading
    Finished,
    /// The handle was already retired; the chunk was thrown away
    Discarded,
}

struct ActiveStream {
    handle: StreamHandle,
    decoder: FrameDecoder,
    /// Taken by the driver when it opens the transport
    outbound: Option<CompletionRequest>,
}

/// Clone-cheap; clones share the registry of live streams.
#[derive(Clone)]
pub struct StreamController {
    store: ChatStore,
    transport: Rc<dyn TransportPort>,
    active: Rc<RefCell<HashMap<ConversationId, ActiveStream>>>,
    next_id: Rc<Cell<u64>>,
}

impl StreamController {
    pub fn new(store: ChatStore, transport: Rc<dyn TransportPort>) -> Self {
        let controller = Self {
            store,
            transport,
            active: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(Cell::new(1)),
        };
        controller.watch_removals();
        controller
    }

    /// Streams whose conversation leaves the store are cancelled on the spot.
    /// The listener holds only weak references.
    fn watch_removals(&self) {
        let active = Rc::downgrade(&self.active);
        let bus = self.store.bus().downgrade();
        self.store.bus().subscribe(move |event| match event {
            ChatEvent::ConversationDeleted { conversation_id } => {
                retire_orphans(&active, &bus, Some(*conversation_id));
            }
            ChatEvent::Cleared => retire_orphans(&active, &bus, None),
            _ => {}
        });
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Start a reply on `conversation_id` and drive it to the end.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        request: SendRequest,
    ) -> Result<FinishReason> {
        let handle = self.start_stream(conversation_id, request)?;
        self.drive(&handle).await
    }

    /// Register a new stream. Any stream already live on the conversation is
    /// cancelled first, silently: only the newest send survives.
    pub fn start_stream(
        &self,
        conversation_id: ConversationId,
        request: SendRequest,
    ) -> Result<StreamHandle> {
        if !self.store.contains(conversation_id) {
            return Err(ChatError::ConversationNotFound(conversation_id.to_string()));
        }

        if let Some(previous) = self.active_handle(conversation_id) {
            log::debug!("{} superseded on {}", previous.id, conversation_id);
            previous.shared.cancel.cancel();
            self.finalize(&previous, FinishReason::Superseded);
        }

        // History is captured before this turn's messages are appended.
        let history = if request.using_context {
            Some(self.store.history(conversation_id)?)
        } else {
            None
        };
        let body = CompletionRequest::new(request.text.clone(), history);

        let reply = Message::pending_assistant();
        let message_id = reply.id;
        self.store
            .append_messages(conversation_id, vec![Message::user(request.text), reply])?;

        let id = StreamId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let handle = StreamHandle {
            id,
            conversation_id,
            message_id,
            shared: Rc::new(HandleShared {
                cancel: CancelSignal::new(),
                outcome: RefCell::new(None),
            }),
        };

        let decoder = FrameDecoder::new(self.store.config().server_error_notice.clone());
        self.active.borrow_mut().insert(
            conversation_id,
            ActiveStream {
                handle: handle.clone(),
                decoder,
                outbound: Some(body),
            },
        );

        log::info!("{} started on {} via {}", id, conversation_id, self.transport.transport_name());
        self.store.bus().emit(ChatEvent::StreamStarted {
            conversation_id,
            message_id,
        });
        Ok(handle)
    }

    /// Open the transport for `handle` and pump chunks until the stream is
    /// retired or the body ends. Returns why the stream finished.
    pub async fn drive(&self, handle: &StreamHandle) -> Result<FinishReason> {
        if let Some(outcome) = handle.outcome() {
            return Ok(outcome);
        }
        let body = self
            .with_active(handle, |entry| entry.outbound.take())
            .flatten()
            .ok_or_else(|| ChatError::Protocol(format!("{} is already being driven", handle.id)))?;

        let endpoint = self.store.config().stream_endpoint.clone();
        let mut chunks = match self
            .transport
            .open(&endpoint, &body, handle.cancel_signal())
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                self.fail(handle, e);
                return Ok(self.outcome_of(handle));
            }
        };

        while !handle.is_retired() {
            let Some(item) = chunks.next().await else {
                break;
            };
            let disposition = match item {
                Ok(chunk) => self.process_chunk(handle, &chunk),
                Err(e) => {
                    self.fail(handle, e);
                    ChunkDisposition::Finished
                }
            };
            if disposition != ChunkDisposition::Continue {
                break;
            }
        }

        self.finish_input(handle);
        Ok(self.outcome_of(handle))
    }

    /// Feed one raw chunk. Chunks for retired handles are discarded.
    pub fn process_chunk(&self, handle: &StreamHandle, chunk: &str) -> ChunkDisposition {
        if handle.is_retired() {
            log::debug!("Discarding {} bytes for retired {}", chunk.len(), handle.id);
            return ChunkDisposition::Discarded;
        }
        match self.with_active(handle, |entry| entry.decoder.push(chunk)) {
            Some(frames) => self.apply_frames(handle, frames),
            None => ChunkDisposition::Discarded,
        }
    }

    /// The transport body ended. Flushes the decoder, which always ends the
    /// stream with a terminal frame.
    pub fn finish_input(&self, handle: &StreamHandle) -> ChunkDisposition {
        if handle.is_retired() {
            return ChunkDisposition::Discarded;
        }
        match self.with_active(handle, |entry| entry.decoder.finish()) {
            Some(frames) => self.apply_frames(handle, frames),
            None => ChunkDisposition::Discarded,
        }
    }

    /// The request failed below the protocol layer.
    pub fn fail(&self, handle: &StreamHandle, error: ChatError) -> bool {
        if handle.is_retired() {
            log::debug!("Ignoring failure on retired {}: {}", handle.id, error);
            return false;
        }
        let reason = match error {
            ChatError::Cancelled => FinishReason::Cancelled,
            other => {
                log::warn!("{} failed: {}", handle.id, other);
                FinishReason::TransportFailure(other.to_string())
            }
        };
        self.finalize(handle, reason)
    }

    /// User-initiated stop. Returns `false` if the stream already ended.
    pub fn cancel(&self, handle: &StreamHandle) -> bool {
        if handle.is_retired() {
            return false;
        }
        handle.shared.cancel.cancel();
        self.finalize(handle, FinishReason::Cancelled)
    }

    /// Stop whatever is streaming on `conversation_id`.
    pub fn cancel_conversation(&self, conversation_id: ConversationId) -> bool {
        self.active_handle(conversation_id)
            .is_some_and(|handle| self.cancel(&handle))
    }

    pub fn active_handle(&self, conversation_id: ConversationId) -> Option<StreamHandle> {
        self.active
            .borrow()
            .get(&conversation_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn is_streaming(&self, conversation_id: ConversationId) -> bool {
        self.active.borrow().contains_key(&conversation_id)
    }

    /// Retire `handle` and settle its message. Only the first call for a
    /// handle has any effect.
    pub fn finalize(&self, handle: &StreamHandle, reason: FinishReason) -> bool {
        if !handle.shared.retire(&reason) {
            return false;
        }
        {
            let mut active = self.active.borrow_mut();
            if active
                .get(&handle.conversation_id)
                .is_some_and(|entry| entry.handle.id == handle.id)
            {
                active.remove(&handle.conversation_id);
            }
        }

        let config = self.store.config();
        let cancel_notice = config.cancel_notice.clone();
        let failure_notice = config.failure_notice.clone();
        self.store
            .update_message(handle.conversation_id, handle.message_id, |message| {
                match &reason {
                    FinishReason::Completed | FinishReason::Superseded => message.complete(),
                    FinishReason::ServerError(text) => message.fail(Some(text.clone())),
                    // Partial answers are still useful; keep them.
                    FinishReason::TransportFailure(_) if message.content.is_empty() => {
                        message.fail(Some(failure_notice))
                    }
                    FinishReason::TransportFailure(_) => message.fail(None),
                    FinishReason::Cancelled if message.content.is_empty() => {
                        message.fail(Some(cancel_notice))
                    }
                    FinishReason::Cancelled => message.complete(),
                }
            });

        log::info!("{} finished: {:?}", handle.id, reason);
        self.store.bus().emit(ChatEvent::StreamFinished {
            conversation_id: handle.conversation_id,
            message_id: handle.message_id,
            reason,
        });
        true
    }

    fn apply_frames(&self, handle: &StreamHandle, frames: Vec<Frame>) -> ChunkDisposition {
        for frame in frames {
            match frame {
                Frame::Token(text) => {
                    let applied = self.store.update_message(
                        handle.conversation_id,
                        handle.message_id,
                        |message| message.append(&text),
                    );
                    if applied.is_none() {
                        // Conversation deleted mid-stream; nothing left to write to.
                        log::debug!("{} lost its message, stopping", handle.id);
                        handle.shared.cancel.cancel();
                        self.finalize(handle, FinishReason::Cancelled);
                        return ChunkDisposition::Finished;
                    }
                }
                Frame::Done => {
                    self.finalize(handle, FinishReason::Completed);
                    return ChunkDisposition::Finished;
                }
                Frame::Error(text) => {
                    self.finalize(handle, FinishReason::ServerError(text));
                    return ChunkDisposition::Finished;
                }
            }
        }
        ChunkDisposition::Continue
    }

    /// Run `f` on the registry entry, if it still belongs to `handle`.
    fn with_active<R>(
        &self,
        handle: &StreamHandle,
        f: impl FnOnce(&mut ActiveStream) -> R,
    ) -> Option<R> {
        let mut active = self.active.borrow_mut();
        active
            .get_mut(&handle.conversation_id)
            .filter(|entry| entry.handle.id == handle.id)
            .map(f)
    }

    fn outcome_of(&self, handle: &StreamHandle) -> FinishReason {
        // Every exit path of `drive` goes through `finalize`.
        handle.outcome().unwrap_or(FinishReason::Completed)
    }
}

/// Retire the streams of removed conversations (all of them for `None`).
/// There is no message left to settle, so only the handle, the transport and
/// the bus are touched.
fn retire_orphans(
    active: &Weak<RefCell<HashMap<ConversationId, ActiveStream>>>,
    bus: &WeakEventBus,
    conversation_id: Option<ConversationId>,
) {
    let (Some(active), Some(bus)) = (active.upgrade(), bus.upgrade()) else {
        return;
    };
    let orphans: Vec<StreamHandle> = {
        let Ok(mut active) = active.try_borrow_mut() else {
            log::warn!("Stream registry busy; orphaned streams stop on their next chunk");
            return;
        };
        match conversation_id {
            Some(id) => active.remove(&id).into_iter().map(|e| e.handle).collect(),
            None => active.drain().map(|(_, e)| e.handle).collect(),
        }
    };

    for handle in orphans {
        if !handle.shared.retire(&FinishReason::Cancelled) {
            continue;
        }
        handle.shared.cancel.cancel();
        log::info!("{} cancelled: {} was removed", handle.id, handle.conversation_id);
        bus.emit(ChatEvent::StreamFinished {
            conversation_id: handle.conversation_id,
            message_id: handle.message_id,
            reason: FinishReason::Cancelled,
        });
    }
}
