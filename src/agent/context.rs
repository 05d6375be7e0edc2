use crate::message::Message;

/// Prompt for one round: system prompt, prior history, then everything this
/// run has produced so far.
///
/// From the second round on, media in history user messages is replaced by
/// `[image]` / `[file]` placeholders. The current query lives in `transcript`
/// and is always sent intact.
pub fn build_prompt(
    system_prompt: Option<&str>,
    history: &[Message],
    transcript: &[Message],
    round: usize,
) -> Vec<Message> {
    let mut prompt = Vec::with_capacity(history.len() + transcript.len() + 1);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        prompt.push(Message::system(system));
    }
    if round > 1 {
        prompt.extend(history.iter().map(Message::degrade_media));
    } else {
        prompt.extend(history.iter().cloned());
    }
    prompt.extend(transcript.iter().cloned());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentPart, MessageContent};

    fn history() -> Vec<Message> {
        vec![
            Message::user_parts(vec![ContentPart::text("look"), ContentPart::image("https://example.com/a.png")]),
            Message::assistant("a cat"),
        ]
    }

    fn query() -> Vec<Message> {
        vec![Message::user_parts(vec![ContentPart::text("and this?"), ContentPart::document("https://example.com/b.pdf")])]
    }

    #[test]
    fn first_round_keeps_media() {
        let prompt = build_prompt(Some("be brief"), &history(), &query(), 1);
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0], Message::system("be brief"));
        assert_eq!(prompt[1], history()[0]);
    }

    #[test]
    fn later_rounds_degrade_history_but_not_the_query() {
        let prompt = build_prompt(None, &history(), &query(), 2);
        assert_eq!(prompt.len(), 3);
        match &prompt[0] {
            Message::User { content: MessageContent::Text(text) } => assert!(text.contains("[image]")),
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(prompt[2], query()[0]);
    }

    #[test]
    fn blank_system_prompt_is_skipped() {
        let prompt = build_prompt(Some("  "), &[], &query(), 1);
        assert_eq!(prompt.len(), 1);
    }
}
