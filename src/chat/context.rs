use super::models::ChatMessage;

/// Number of trailing transcript entries considered when building the
/// prompt context.
pub const CONTEXT_WINDOW: usize = 10;

/// Build the prompt sent to the completion provider.
///
/// Only user messages from the last `CONTEXT_WINDOW` entries of the
/// prior transcript are included, oldest first, one `User: <content>`
/// line each. Assistant turns are left out. The new prompt is always
/// the final line.
pub fn build_context(transcript: &[ChatMessage], prompt: &str) -> String {
    let start = transcript.len().saturating_sub(CONTEXT_WINDOW);
    let mut lines: Vec<String> = transcript[start..]
        .iter()
        .filter(|msg| msg.is_user())
        .map(|msg| format!("{}: {}", msg.label(), msg.content))
        .collect();
    lines.push(prompt.to_string());
    lines.join("\n")
}
