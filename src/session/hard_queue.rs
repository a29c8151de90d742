// src/session/hard_queue.rs

use rand::Rng;

/// Ordered set of question ids the client answered incorrectly.
///
/// The head is the next question to be retried. A question leaves the queue
/// only when it is answered correctly while served from the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardQueue {
    items: Vec<i32>,
}

impl HardQueue {
    /// Builds a queue from a stored list, dropping repeated ids.
    pub fn new(items: Vec<i32>) -> Self {
        let mut queue = HardQueue::default();
        queue.replace(items);
        queue
    }

    /// Replaces the contents with the list returned by the store.
    pub fn replace(&mut self, items: Vec<i32>) {
        self.items.clear();
        for item in items {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<i32> {
        self.items.first().copied()
    }

    pub fn contains(&self, index: i32) -> bool {
        self.items.contains(&index)
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.items
    }

    /// Chance of serving the head instead of the next line question: `len / total`,
    /// clamped to `[0, 1]`.
    pub fn draw_probability(&self, total: usize) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        if total == 0 {
            return 1.0;
        }
        (self.items.len() as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn should_draw<R: Rng + ?Sized>(&self, total: usize, rng: &mut R) -> bool {
        !self.items.is_empty() && rng.r#gen::<f64>() < self.draw_probability(total)
    }
}
