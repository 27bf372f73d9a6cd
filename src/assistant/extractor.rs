//! Final reply extraction from a completed thread.

use super::{AssistantRuntime, MessageRole, ThreadMessage};
use crate::error::RelayError;

/// Build the reply for a completed thread.
///
/// Lists the thread, keeps assistant messages in the order the runtime
/// returns them, and joins their text. Fails with
/// [`RelayError::EmptyResponse`] when there is no usable text.
pub async fn extract_reply(
    runtime: &dyn AssistantRuntime,
    thread_id: &str,
) -> Result<String, RelayError> {
    let messages = runtime.list_messages(thread_id).await?;

    tracing::debug!(
        thread_id = %thread_id,
        message_count = messages.len(),
        "Listed thread messages"
    );

    join_assistant_text(&messages)
}

/// Join the text of all assistant messages.
///
/// Segments of one message are newline-joined, then messages are
/// newline-joined and the result trimmed.
pub fn join_assistant_text(messages: &[ThreadMessage]) -> Result<String, RelayError> {
    let assistant: Vec<&ThreadMessage> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .collect();

    if assistant.is_empty() {
        return Err(RelayError::EmptyResponse(
            "No se encontró respuesta del asistente".to_string(),
        ));
    }

    let reply = assistant
        .iter()
        .map(|m| m.text_segments().collect::<Vec<_>>().join("\n"))
        .collect::<Vec<_>>()
        .join("\n");
    let reply = reply.trim();

    if reply.is_empty() {
        return Err(RelayError::EmptyResponse(
            "Respuesta del asistente vacía".to_string(),
        ));
    }

    Ok(reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MessageContent;

    fn user(text: &str) -> ThreadMessage {
        ThreadMessage {
            id: String::new(),
            role: MessageRole::User,
            content: vec![MessageContent::text(text)],
        }
    }

    #[test]
    fn test_joins_segments_and_messages() {
        let messages = vec![
            ThreadMessage::assistant_text(["  Hola", "¿en qué te ayudo?"]),
            user("hola"),
            ThreadMessage::assistant_text(["Bienvenido  "]),
        ];
        let reply = join_assistant_text(&messages).unwrap();
        assert_eq!(reply, "Hola\n¿en qué te ayudo?\nBienvenido");
    }

    #[test]
    fn test_non_text_segments_ignored() {
        let mut msg = ThreadMessage::assistant_text(["solo texto"]);
        msg.content.insert(0, MessageContent::Other);
        assert_eq!(join_assistant_text(&[msg]).unwrap(), "solo texto");
    }

    #[test]
    fn test_message_without_text_contributes_empty_line() {
        let empty = ThreadMessage {
            id: String::new(),
            role: MessageRole::Assistant,
            content: vec![MessageContent::Other],
        };
        let messages = vec![
            ThreadMessage::assistant_text(["uno"]),
            empty,
            ThreadMessage::assistant_text(["dos"]),
        ];
        assert_eq!(join_assistant_text(&messages).unwrap(), "uno\n\ndos");
    }

    #[test]
    fn test_all_empty_is_error() {
        let messages = vec![
            ThreadMessage::assistant_text(["", "  "]),
            ThreadMessage::assistant_text(Vec::<String>::new()),
        ];
        let err = join_assistant_text(&messages).unwrap_err();
        assert!(matches!(err, RelayError::EmptyResponse(_)));
    }

    #[test]
    fn test_no_assistant_messages_is_error() {
        let err = join_assistant_text(&[user("hola")]).unwrap_err();
        assert!(matches!(err, RelayError::EmptyResponse(msg) if msg.contains("No se encontró")));
    }
}
