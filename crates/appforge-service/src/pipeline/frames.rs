//! The SSE frame contract of the generation stream.
//!
//! One `data: <json>` line per frame, terminated by a blank line. Clients
//! receive a `message` frame echoing the just-persisted user message before
//! any `chunk`; they are expected to dedupe it against locally optimistic
//! messages.

use crate::db::Message;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamFrame {
    #[serde(rename = "streamId")]
    StreamId {
        #[serde(rename = "streamId")]
        stream_id: String,
    },

    #[serde(rename = "status")]
    Status { message: String },

    /// Echo of the persisted user message.
    #[serde(rename = "message")]
    Message { message: Message },

    #[serde(rename = "chunk")]
    Chunk {
        content: String,
        #[serde(rename = "fullContent")]
        full_content: String,
    },

    #[serde(rename = "fileUpdate")]
    FileUpdate { path: String, message: String },

    #[serde(rename = "end")]
    End {
        message: Message,
        #[serde(rename = "chatId")]
        chat_id: i64,
    },

    #[serde(rename = "error")]
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MessageRole;

    #[test]
    fn frame_json_uses_the_wire_keys() {
        let frame = StreamFrame::StreamId {
            stream_id: "abc".into(),
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"type":"streamId","streamId":"abc"}"#
        );

        let frame = StreamFrame::Chunk {
            content: "wor".into(),
            full_content: "hello wor".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["fullContent"], "hello wor");

        let frame = StreamFrame::End {
            message: Message {
                id: 12,
                chat_id: 7,
                role: MessageRole::Assistant,
                content: "done".into(),
                request_id: None,
                created_at: 0,
            },
            chat_id: 7,
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "end");
        assert_eq!(json["chatId"], 7);
        assert_eq!(json["message"]["chatId"], 7);
        assert_eq!(json["message"]["role"], "assistant");
    }
}
