//! Bounded message window with a protected head
//!
//! The first two entries (context preamble and its acknowledgement) form the
//! protected head. Trimming drops the oldest message after the head; the
//! acknowledgement goes only when nothing else is left to drop, the preamble
//! and the newest message never go.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::llm::Message;

/// Entries seeded at session start
pub const PROTECTED_HEAD: usize = 2;

/// Rough token estimate: one token per four characters, rounded up
pub fn estimated_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Result of one append-and-trim pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimReport {
    /// Messages removed by this pass
    pub removed: usize,
    /// Estimated tokens left in the window
    pub total_tokens: usize,
    /// Still over budget because only the preamble and newest message remain
    pub over_budget: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageWindow {
    messages: VecDeque<Message>,
    budget: usize,
    total: usize,
    /// Head entries still in place (2, or 1 once the acknowledgement went)
    #[serde(skip)]
    protected: usize,
}

impl MessageWindow {
    /// New window holding the preamble and acknowledgement
    pub fn seeded(preamble: impl Into<String>, acknowledgement: impl Into<String>, budget: usize) -> Self {
        let mut window = Self {
            messages: VecDeque::new(),
            budget,
            total: 0,
            protected: PROTECTED_HEAD,
        };
        window.push(Message::user(preamble));
        window.push(Message::assistant(acknowledgement));
        window
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn total_tokens(&self) -> usize {
        self.total
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Append a new user turn, then drop old turns until the window fits
    pub fn append_and_enforce_budget(&mut self, message: Message) -> TrimReport {
        debug!(len = self.len(), total = self.total, budget = self.budget, "append_and_enforce_budget: called");
        self.push(message);

        let mut removed = 0;
        while self.total > self.budget && self.messages.len() > PROTECTED_HEAD {
            let index = if self.messages.len() > self.protected + 1 {
                self.protected
            } else {
                // Last resort: nothing but the head and the newest turn remain
                debug!("append_and_enforce_budget: dropping acknowledgement");
                self.protected = 1;
                1
            };
            let Some(dropped) = self.messages.remove(index) else {
                break;
            };
            self.total -= estimated_tokens(&dropped.content);
            removed += 1;
        }

        let report = TrimReport {
            removed,
            total_tokens: self.total,
            over_budget: self.total > self.budget,
        };
        debug!(?report, len = self.len(), "append_and_enforce_budget: done");
        report
    }

    /// Append an assistant reply; it is trimmed on the next user turn
    pub fn push_reply(&mut self, message: Message) {
        debug!(len = self.len(), "push_reply: called");
        self.push(message);
    }

    fn push(&mut self, message: Message) {
        self.total += estimated_tokens(&message.content);
        self.messages.push_back(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use proptest::prelude::*;

    /// Content of exactly `tokens` estimated tokens, tagged with `id`
    fn sized(id: usize, tokens: usize) -> String {
        let tag = format!("#{}:", id);
        let target = tokens * 4;
        let mut content = tag.clone();
        content.extend(std::iter::repeat_n('x', target.saturating_sub(tag.len())));
        content
    }

    fn window(head_tokens: usize, budget: usize) -> MessageWindow {
        MessageWindow::seeded(sized(0, head_tokens), sized(1, head_tokens), budget)
    }

    #[test]
    fn test_estimated_tokens_rounds_up() {
        assert_eq!(estimated_tokens(""), 0);
        assert_eq!(estimated_tokens("a"), 1);
        assert_eq!(estimated_tokens("abcd"), 1);
        assert_eq!(estimated_tokens("abcde"), 2);
        // Counts characters, not bytes
        assert_eq!(estimated_tokens("héllo wörld"), 3);
    }

    #[test]
    fn test_seeded_window_has_head() {
        let window = MessageWindow::seeded("context", "ok", 3000);
        let messages = window.to_vec();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "context");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(window.total_tokens(), 2 + 1);
    }

    #[test]
    fn test_under_budget_keeps_everything() {
        let mut window = window(10, 3000);
        let report = window.append_and_enforce_budget(Message::user(sized(2, 100)));
        assert_eq!(report.removed, 0);
        assert_eq!(window.len(), 3);
        assert_eq!(report.total_tokens, 120);
    }

    #[test]
    fn test_trims_oldest_after_head() {
        let mut window = window(50, 400);
        for id in 2..6 {
            window.append_and_enforce_budget(Message::user(sized(id, 100)));
        }
        // head 100 + 3 * 100 fits, a fourth message does not
        let ids: Vec<String> = window.messages().map(|m| m.content[..3].to_string()).collect();
        assert_eq!(ids, vec!["#0:", "#1:", "#3:", "#4:", "#5:"]);
        assert_eq!(window.total_tokens(), 400);
    }

    #[test]
    fn test_scenario_fifty_messages_against_3000_budget() {
        let mut window = window(100, 3000);
        for id in 2..52 {
            window.append_and_enforce_budget(Message::user(sized(id, 100)));
        }
        // 200 tokens of head leave room for the 28 most recent messages
        assert_eq!(window.len(), 30);
        assert_eq!(window.total_tokens(), 3000);
        let messages = window.to_vec();
        assert!(messages[0].content.starts_with("#0:"));
        assert!(messages[1].content.starts_with("#1:"));
        assert!(messages[2].content.starts_with("#24:"));
        assert!(messages[29].content.starts_with("#51:"));
    }

    #[test]
    fn test_acknowledgement_dropped_only_as_last_resort() {
        let mut window = window(100, 500);
        window.append_and_enforce_budget(Message::user(sized(2, 100)));
        window.push_reply(Message::assistant(sized(3, 100)));

        let report = window.append_and_enforce_budget(Message::user(sized(4, 350)));
        // Both middle messages go first; the acknowledgement still does not fit
        assert_eq!(report.removed, 3);
        let ids: Vec<String> = window.messages().map(|m| m.content[..3].to_string()).collect();
        assert_eq!(ids, vec!["#0:", "#4:"]);
        assert_eq!(window.total_tokens(), 450);
        assert!(!report.over_budget);
    }

    #[test]
    fn test_oversized_message_is_never_truncated() {
        let mut window = window(10, 100);
        let huge = sized(2, 5000);
        let report = window.append_and_enforce_budget(Message::user(huge.clone()));
        assert!(report.over_budget);
        assert_eq!(window.len(), 2);
        assert_eq!(window.to_vec()[1].content, huge);
        assert!(window.to_vec()[0].content.starts_with("#0:"));
    }

    #[test]
    fn test_after_ack_dropped_trimming_continues_after_preamble() {
        let mut window = window(100, 500);
        window.append_and_enforce_budget(Message::user(sized(2, 350)));
        assert_eq!(window.len(), 2);

        window.push_reply(Message::assistant(sized(3, 50)));
        window.append_and_enforce_budget(Message::user(sized(4, 300)));
        let ids: Vec<String> = window.messages().map(|m| m.content[..3].to_string()).collect();
        assert_eq!(ids, vec!["#0:", "#3:", "#4:"]);
    }

    proptest! {
        #[test]
        fn prop_window_respects_budget_and_order(
            sizes in proptest::collection::vec((0usize..400, any::<bool>()), 1..80),
            head in 0usize..200,
            budget in 50usize..3000,
        ) {
            let mut window = window(head, budget);
            let mut next_id = 2;

            for (tokens, with_reply) in sizes {
                let newest = sized(next_id, tokens);
                next_id += 1;
                window.append_and_enforce_budget(Message::user(newest.clone()));

                prop_assert!(window.total_tokens() <= budget || window.len() == PROTECTED_HEAD);
                prop_assert!(window.to_vec()[0].content.starts_with("#0:"));
                prop_assert_eq!(&window.to_vec()[window.len() - 1].content, &newest);

                let recount: usize = window.messages().map(|m| estimated_tokens(&m.content)).sum();
                prop_assert_eq!(recount, window.total_tokens());

                let ids: Vec<usize> = window
                    .messages()
                    .map(|m| m.content[1..m.content.find(':').unwrap()].parse().unwrap())
                    .collect();
                prop_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

                if with_reply {
                    window.push_reply(Message::assistant(sized(next_id, tokens / 2)));
                    next_id += 1;
                }
            }
        }
    }
}
