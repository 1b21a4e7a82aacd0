//! Typing reveal: hands an already-received text to the session a character
//! at a time. Purely cosmetic; a zero cadence applies the whole text at once.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealScheduler {
    cadence: Duration,
}

impl RevealScheduler {
    pub fn new(cadence: Duration) -> Self {
        Self { cadence }
    }

    #[cfg(test)]
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_immediate(&self) -> bool {
        self.cadence.is_zero()
    }

    /// Splits `text` into the pieces revealed one per tick.
    pub fn chunks<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.is_immediate() {
            return vec![text];
        }
        text.char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect()
    }

    /// Waits one tick.
    pub async fn pace(&self) {
        if !self.is_immediate() {
            tokio::time::sleep(self.cadence).await;
        }
    }
}
