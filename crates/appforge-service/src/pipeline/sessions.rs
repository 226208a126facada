//! In-flight generation sessions, used for cooperative cancellation.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A transient handle for one running generation.
#[derive(Clone)]
pub struct StreamSession {
    pub stream_id: String,
    pub chat_id: i64,
    pub user_id: i64,
    pub created_at: i64,
    cancel: CancellationToken,
}

/// Registry of active generation streams.
pub struct StreamSessions {
    inner: Mutex<HashMap<String, StreamSession>>,
}

impl StreamSessions {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a session; returns its id and cancel token.
    pub fn register(&self, chat_id: i64, user_id: i64) -> (String, CancellationToken) {
        let stream_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let session = StreamSession {
            stream_id: stream_id.clone(),
            chat_id,
            user_id,
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            cancel: cancel.clone(),
        };
        self.inner.lock().insert(stream_id.clone(), session);
        (stream_id, cancel)
    }

    pub fn get(&self, stream_id: &str) -> Option<StreamSession> {
        self.inner.lock().get(stream_id).cloned()
    }

    /// Cancel a stream. Returns `false` when the stream is unknown (already
    /// complete, already cancelled, or never existed) - a harmless race.
    pub fn cancel(&self, stream_id: &str) -> bool {
        match self.inner.lock().remove(stream_id) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Deregister a completed stream.
    pub fn remove(&self, stream_id: &str) {
        self.inner.lock().remove(stream_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Cancel everything; used on service shutdown.
    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock();
        for (_, session) in inner.drain() {
            session.cancel.cancel();
        }
    }
}

impl Default for StreamSessions {
    fn default() -> Self {
        Self::new()
    }
}
