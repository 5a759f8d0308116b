//! Conversation id generation

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of conversation ids for one session.
///
/// Ids are decimal strings of a monotonically increasing counter, so no two calls on
/// the same generator ever return the same id.
#[derive(Debug)]
pub struct ConversationIdGenerator {
    next_id: AtomicU64,
}

impl Default for ConversationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationIdGenerator {
    /// Create a generator starting at 1
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Produce the next conversation id
    pub fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// The id the next call to [`next_id`](Self::next_id) will return
    pub fn peek(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Move this generator past every id `other` may already have handed out.
    pub fn advance_past(&self, other: &ConversationIdGenerator) {
        self.next_id.fetch_max(other.peek(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequential_ids_are_distinct() {
        let generator = ConversationIdGenerator::new();
        let ids: HashSet<String> = (0..100).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.contains("1"));
        assert!(ids.contains("100"));
    }

    #[test]
    fn test_concurrent_ids_are_distinct() {
        let generator = Arc::new(ConversationIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..250).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.extend(handle.join().unwrap());
        }
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_advance_past() {
        let session = ConversationIdGenerator::new();
        let request = ConversationIdGenerator::new();
        for _ in 0..5 {
            request.next_id();
        }

        session.advance_past(&request);
        assert_eq!(session.next_id(), "6");

        // never moves backwards
        session.advance_past(&ConversationIdGenerator::new());
        assert_eq!(session.next_id(), "7");
    }
}
