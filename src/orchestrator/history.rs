//! Per-conversation state: the append-only outcome log and the cancellation
//! flag the pipeline polls between execution waves.

use dashmap::DashMap;
use uuid::Uuid;

use super::schemas::QueryOutcome;

#[derive(Default)]
struct Conversation {
    outcomes: Vec<QueryOutcome>,
    cancelled: bool,
}

/// Registry of live conversations. Task state lives in the task itself; the
/// store only carries what outlives a single query: finished outcomes and
/// the cancel flag.
#[derive(Default)]
pub struct ConversationStore {
    conversations: DashMap<Uuid, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at task start. Clears any cancellation left over from an
    /// earlier task; a cancel applies to the task running when the flag is
    /// raised, not to whatever comes next.
    pub fn register(&self, conversation_id: Uuid) {
        let mut entry = self.conversations.entry(conversation_id).or_default();
        entry.cancelled = false;
    }

    /// Append a finished outcome. The log is append-only.
    pub fn append(&self, outcome: QueryOutcome) {
        let mut entry = self
            .conversations
            .entry(outcome.conversation_id)
            .or_default();
        entry.outcomes.push(outcome);
    }

    /// Outcomes recorded for one conversation, oldest first.
    pub fn history(&self, conversation_id: &Uuid) -> Vec<QueryOutcome> {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.outcomes.clone())
            .unwrap_or_default()
    }

    /// Raise the cancel flag. Returns whether the conversation was known;
    /// unknown ids are a no-op and repeated cancels are harmless.
    pub fn cancel(&self, conversation_id: &Uuid) -> bool {
        match self.conversations.get_mut(conversation_id) {
            Some(mut entry) => {
                entry.cancelled = true;
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self, conversation_id: &Uuid) -> bool {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.cancelled)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::schemas::TaskStage;

    fn outcome(conversation_id: Uuid, response: &str) -> QueryOutcome {
        QueryOutcome {
            conversation_id,
            task_id: Uuid::new_v4(),
            stage: TaskStage::Synthesized,
            entities: vec![],
            steps: vec![],
            correlation: None,
            response: response.to_string(),
            degraded: false,
        }
    }

    #[test]
    fn test_history_preserves_order() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();

        store.register(id);
        store.append(outcome(id, "first"));
        store.append(outcome(id, "second"));

        let history = store.history(&id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].response, "first");
        assert_eq!(history[1].response, "second");
    }

    #[test]
    fn test_unknown_conversation_has_empty_history() {
        let store = ConversationStore::new();
        assert!(store.history(&Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_cancel_unknown_conversation_is_noop() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();

        assert!(!store.cancel(&id));
        assert!(!store.is_cancelled(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();
        store.register(id);

        assert!(store.cancel(&id));
        assert!(store.cancel(&id));
        assert!(store.is_cancelled(&id));
    }

    #[test]
    fn test_register_clears_stale_cancel() {
        let store = ConversationStore::new();
        let id = Uuid::new_v4();

        store.register(id);
        store.cancel(&id);
        assert!(store.is_cancelled(&id));

        // The next task in the conversation starts fresh.
        store.register(id);
        assert!(!store.is_cancelled(&id));
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = ConversationStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.register(a);
        store.register(b);
        store.append(outcome(a, "for a"));
        store.cancel(&b);

        assert_eq!(store.history(&a).len(), 1);
        assert!(store.history(&b).is_empty());
        assert!(!store.is_cancelled(&a));
        assert!(store.is_cancelled(&b));
        assert_eq!(store.len(), 2);
    }
}
