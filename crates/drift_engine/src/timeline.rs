//! The ordered in-memory projection of one room's messages.
//!
//! The rendered timeline is always `sort(by created_at, id)` over the
//! merged set of durable and pending messages — never raw arrival order.
//! Deleted messages keep their slot (content hidden); failed sends are
//! removed outright.

use drift_proto::Message;
use tracing::debug;

#[derive(Default)]
pub struct Timeline {
    /// Invariant: sorted by `Message::sort_key`, unique by id.
    entries: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|m| m.id.as_str() == id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.entries.iter().find(|m| m.id.as_str() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.entries.iter_mut().find(|m| m.id.as_str() == id)
    }

    /// Insert keeping sort order. Returns false (and changes nothing) if a
    /// message with the same id is already present.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.contains(message.id.as_str()) {
            debug!(id = message.id.as_str(), "duplicate timeline insert ignored");
            return false;
        }
        let key = (message.created_at, message.id.as_str().to_owned());
        let at = self
            .entries
            .partition_point(|m| (m.created_at, m.id.as_str().to_owned()) <= key);
        self.entries.insert(at, message);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let at = self.entries.iter().position(|m| m.id.as_str() == id)?;
        Some(self.entries.remove(at))
    }

    /// Swap a provisional entry for its durable counterpart. The durable
    /// row carries server timestamps, so the entry is re-placed in order.
    /// Returns false if the provisional entry is gone (already rolled back).
    pub fn replace(&mut self, provisional_id: &str, durable: Message) -> bool {
        if self.remove(provisional_id).is_none() {
            return false;
        }
        self.insert(durable)
    }

    /// Soft-delete in place; position preserved. Returns false when the
    /// target is not loaded (scrolled out of the fetched page).
    pub fn mark_deleted(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(m) => {
                m.mark_deleted();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::confirmed_message;

    #[test]
    fn arbitrary_insert_order_yields_created_at_order() {
        let mut tl = Timeline::new();
        for secs in [30, 10, 50, 20, 40] {
            assert!(tl.insert(confirmed_message(&format!("m-{secs}"), "q", secs)));
        }
        let order: Vec<&str> = tl.visible().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["m-10", "m-20", "m-30", "m-40", "m-50"]);
    }

    #[test]
    fn duplicate_ids_are_ignored() {
        let mut tl = Timeline::new();
        assert!(tl.insert(confirmed_message("m-1", "q", 10)));
        assert!(!tl.insert(confirmed_message("m-1", "q", 10)));
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let mut tl = Timeline::new();
        tl.insert(confirmed_message("m-b", "q", 10));
        tl.insert(confirmed_message("m-a", "q", 10));
        let order: Vec<&str> = tl.visible().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["m-a", "m-b"]);
    }

    #[test]
    fn delete_keeps_position_and_hides_content() {
        let mut tl = Timeline::new();
        tl.insert(confirmed_message("m-1", "q", 10));
        tl.insert(confirmed_message("m-2", "q", 20));
        tl.insert(confirmed_message("m-3", "q", 30));

        assert!(tl.mark_deleted("m-2"));
        assert_eq!(tl.len(), 3);
        let m2 = tl.get("m-2").unwrap();
        assert!(m2.is_deleted());
        assert!(m2.content.is_empty());
        assert_eq!(tl.visible()[1].id.as_str(), "m-2");

        assert!(!tl.mark_deleted("m-99"));
    }
}
