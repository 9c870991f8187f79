use crate::errors::StoreResult;
use crate::models::attachment::Attachment;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageStatus};
use crate::store::{self, Store};

const QUESTIONS_COUNTER: &str = "questions";
const REPLIES_COUNTER: &str = "replies";

/// Names the reply slot a specific `submit` opened. Chunk routing goes
/// through the handle rather than "the last message", so fragments from an
/// abandoned reply can never land in a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHandle(u64);

/// What became of a chunk or lifecycle call: applied to the open slot, or
/// ignored because the slot it names is no longer open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Applied,
    Stale,
}

struct OpenSlot {
    handle: u64,
    index: usize,
}

/// Owns the transcript and its persistence.
///
/// Every mutation that returns `Ok` has already been written through to the
/// store, so the record on disk always matches memory at rest. A failed
/// write surfaces as an error but leaves the in-memory transcript mutated;
/// the next successful mutation rewrites the whole record and heals the gap.
pub struct Accumulator {
    conversation: Conversation,
    store: Box<dyn Store>,
    open: Option<OpenSlot>,
    next_handle: u64,
}

impl Accumulator {
    /// An empty accumulator over the given store. Call `restore` to pick up
    /// a persisted transcript.
    pub fn new(store: Box<dyn Store>) -> Self {
        Accumulator {
            conversation: Conversation::new(),
            store,
            open: None,
            next_handle: 0,
        }
    }

    /// Load the persisted conversation, replacing the in-memory one.
    ///
    /// Replies that were still in flight when the previous session died are
    /// marked errored; nothing will ever finish them. Returns how many were
    /// normalized that way. On failure the accumulator stays empty and the
    /// stored record is left untouched, so a record written by a newer
    /// schema survives being opened here.
    pub fn restore(&mut self) -> StoreResult<usize> {
        let mut conversation = store::load_conversation(self.store.as_ref())?;

        let mut interrupted = 0;
        for message in conversation.iter_mut() {
            if message.status.is_in_flight() {
                message.status = MessageStatus::Errored;
                interrupted += 1;
            }
        }
        if interrupted > 0 {
            tracing::info!("marked {interrupted} interrupted replies as errored");
            store::save_conversation(self.store.as_mut(), &conversation)?;
        }

        self.conversation = conversation;
        self.open = None;
        Ok(interrupted)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// Record a user turn and open a reply slot for the answer.
    ///
    /// If a previous reply is somehow still open it is closed as errored
    /// first; its handle goes stale and later fragments for it are dropped.
    pub fn submit<S: Into<String>>(
        &mut self,
        text: S,
        attachment: Option<Attachment>,
    ) -> StoreResult<ReplyHandle> {
        if let Some(slot) = self.open.take() {
            tracing::warn!("new question while a reply is open; closing the old reply as errored");
            if let Some(message) = self.conversation.get_mut(slot.index) {
                message.status = MessageStatus::Errored;
            }
        }

        let mut question = Message::user().with_text(text);
        if let Some(attachment) = attachment {
            question = question.with_attachment(attachment);
        }
        self.conversation.push(question);
        let index = self.conversation.push(Message::pending_assistant());

        self.next_handle += 1;
        let handle = self.next_handle;
        self.open = Some(OpenSlot { handle, index });

        store::save_conversation(self.store.as_mut(), &self.conversation)?;
        if let Err(error) = store::bump_counter(self.store.as_mut(), QUESTIONS_COUNTER) {
            tracing::warn!("bumping question counter failed: {error}");
        }
        Ok(ReplyHandle(handle))
    }

    /// Append a streamed fragment to the reply the handle names.
    pub fn apply_chunk(&mut self, handle: ReplyHandle, chunk: &str) -> StoreResult<ChunkOutcome> {
        let Some(index) = self.open_index(handle) else {
            return Ok(ChunkOutcome::Stale);
        };
        if let Some(message) = self.conversation.get_mut(index) {
            message.content.push_str(chunk);
            message.status = MessageStatus::Streaming;
        }
        store::save_conversation(self.store.as_mut(), &self.conversation)?;
        Ok(ChunkOutcome::Applied)
    }

    /// Close the reply as complete.
    pub fn finish(&mut self, handle: ReplyHandle) -> StoreResult<ChunkOutcome> {
        let Some(index) = self.open_index(handle) else {
            return Ok(ChunkOutcome::Stale);
        };
        self.open = None;
        if let Some(message) = self.conversation.get_mut(index) {
            message.status = MessageStatus::Complete;
        }
        store::save_conversation(self.store.as_mut(), &self.conversation)?;
        if let Err(error) = store::bump_counter(self.store.as_mut(), REPLIES_COUNTER) {
            tracing::warn!("bumping reply counter failed: {error}");
        }
        Ok(ChunkOutcome::Applied)
    }

    /// Close the reply as errored, keeping whatever fragments arrived. The
    /// partial text stays visible in the transcript; only the status records
    /// that the reply never finished.
    pub fn fail(&mut self, handle: ReplyHandle) -> StoreResult<ChunkOutcome> {
        let Some(index) = self.open_index(handle) else {
            return Ok(ChunkOutcome::Stale);
        };
        self.open = None;
        if let Some(message) = self.conversation.get_mut(index) {
            message.status = MessageStatus::Errored;
        }
        store::save_conversation(self.store.as_mut(), &self.conversation)?;
        Ok(ChunkOutcome::Applied)
    }

    /// Delete the transcript, in memory and on disk together. If the store
    /// refuses the delete, memory is left populated too; the two never
    /// diverge with one empty and one not.
    pub fn clear(&mut self) -> StoreResult<()> {
        store::clear_conversation(self.store.as_mut())?;
        self.conversation.clear();
        self.open = None;
        Ok(())
    }

    pub fn reset_counters(&mut self) -> StoreResult<()> {
        store::reset_counter(self.store.as_mut(), QUESTIONS_COUNTER)?;
        store::reset_counter(self.store.as_mut(), REPLIES_COUNTER)
    }

    pub fn questions_asked(&self) -> u64 {
        store::read_counter(self.store.as_ref(), QUESTIONS_COUNTER)
    }

    pub fn replies_completed(&self) -> u64 {
        store::read_counter(self.store.as_ref(), REPLIES_COUNTER)
    }

    fn open_index(&self, handle: ReplyHandle) -> Option<usize> {
        self.open
            .as_ref()
            .filter(|slot| slot.handle == handle.0)
            .map(|slot| slot.index)
    }
}
