// ==========================================
// QUEUE MANAGEMENT MODULE
// ==========================================
// Ordered list of playable items plus a cursor pointing at the "current" one.
//
// - Insertion order is playback order
// - Append-only; the only removal is clear()
// - next()/previous() move the cursor by one and never wrap
// - A failed move leaves the cursor where it was

use crate::player::item::Playable;

#[derive(Debug, Default)]
pub struct Queue {
    items: Vec<Playable>,
    cursor: usize,
}

impl Queue {
    pub fn new() -> Self {
        Queue {
            items: Vec::new(),
            cursor: 0,
        }
    }

    // ==========================================
    // ADDING ITEMS
    // ==========================================
    /// Appends and returns the index the item landed at.
    pub fn push(&mut self, item: Playable) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    // ==========================================
    // NAVIGATION
    // ==========================================
    // Both return the new cursor on success, or the rejected index on failure.
    pub fn advance(&mut self) -> Result<usize, isize> {
        self.move_to(self.cursor as isize + 1)
    }

    pub fn retreat(&mut self) -> Result<usize, isize> {
        self.move_to(self.cursor as isize - 1)
    }

    /// Jump to an arbitrary index (used by random play).
    pub fn move_to(&mut self, target: isize) -> Result<usize, isize> {
        match usize::try_from(target) {
            Ok(index) if index < self.items.len() => {
                self.cursor = index;
                Ok(index)
            }
            _ => Err(target),
        }
    }

    // ==========================================
    // QUEUE MANAGEMENT
    // ==========================================
    /// Drops every item and resets the cursor to 0.
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
    }

    // ==========================================
    // QUEUE INSPECTION
    // ==========================================
    /// The item under the cursor, if the cursor is in bounds.
    pub fn current(&self) -> Option<&Playable> {
        self.items.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0 && !self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Playable> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playable> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(n: usize) -> Queue {
        let mut queue = Queue::new();
        for i in 0..n {
            queue.push(Playable::Url(format!("https://host/{}.mp3", i)));
        }
        queue
    }

    #[test]
    fn push_keeps_insertion_order() {
        let queue = queue_of(3);
        let urls: Vec<String> = queue.iter().map(Playable::label).collect();
        assert_eq!(urls, vec!["https://host/0.mp3", "https://host/1.mp3", "https://host/2.mp3"]);
        assert_eq!(queue.current(), queue.get(0));
    }

    #[test]
    fn advance_stops_at_last_item() {
        let mut queue = queue_of(2);
        assert_eq!(queue.advance(), Ok(1));
        assert_eq!(queue.advance(), Err(2));
        assert_eq!(queue.cursor(), 1);
    }

    #[test]
    fn retreat_stops_at_first_item() {
        let mut queue = queue_of(2);
        assert_eq!(queue.retreat(), Err(-1));
        assert_eq!(queue.cursor(), 0);
        queue.advance().unwrap();
        assert_eq!(queue.retreat(), Ok(0));
    }

    #[test]
    fn clear_resets_cursor() {
        let mut queue = queue_of(3);
        queue.advance().unwrap();
        queue.advance().unwrap();
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), 0);
        assert!(queue.current().is_none());
        assert!(queue.advance().is_err());
        assert!(queue.retreat().is_err());
    }

    #[test]
    fn boundary_flags() {
        let mut queue = queue_of(2);
        assert!(queue.has_next());
        assert!(!queue.has_previous());
        queue.advance().unwrap();
        assert!(!queue.has_next());
        assert!(queue.has_previous());
        assert!(!Queue::new().has_next());
    }
}
