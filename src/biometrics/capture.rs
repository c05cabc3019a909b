use std::collections::HashMap;

use log::trace;

use super::BiometricsError;
use crate::models::{CapturedAttempt, Millis, RawKeystroke};

#[derive(Debug, Clone)]
struct Slot {
    expected_char: char,
    typed_char: char,
    key_code: u32,
    press_time: Millis,
    release_time: Option<Millis>,
}

/// Accumulates key-down/key-up events for one typing attempt.
///
/// Each key-down claims the next position of the target text; the matching
/// key-up is found through a pending map keyed by physical key code, so
/// overlapping keys resolve to the right positions.
#[derive(Debug, Clone)]
pub struct KeystrokeCapture {
    target: Vec<char>,
    slots: Vec<Slot>,
    pending: HashMap<u32, usize>,
}

impl KeystrokeCapture {
    pub fn new(target_text: &str) -> Self {
        let target: Vec<char> = target_text.chars().collect();
        Self {
            slots: Vec::with_capacity(target.len()),
            target,
            pending: HashMap::new(),
        }
    }

    /// Record a key press and return the position it was assigned.
    /// Auto-repeat presses of a key that is still held are ignored.
    pub fn key_down(
        &mut self,
        key_code: u32,
        typed_char: char,
        time: Millis,
    ) -> Result<Option<usize>, BiometricsError> {
        if self.pending.contains_key(&key_code) {
            trace!("Ignoring auto-repeat for key code {}", key_code);
            return Ok(None);
        }

        let position = self.slots.len();
        let expected_char = *self.target.get(position).ok_or_else(|| {
            BiometricsError::Capture(format!(
                "Keystroke at position {} exceeds target length {}",
                position,
                self.target.len()
            ))
        })?;

        self.slots.push(Slot {
            expected_char,
            typed_char,
            key_code,
            press_time: time,
            release_time: None,
        });
        self.pending.insert(key_code, position);

        Ok(Some(position))
    }

    /// Record a key release. Releases without a pending press are ignored.
    pub fn key_up(&mut self, key_code: u32, time: Millis) -> Option<usize> {
        let position = self.pending.remove(&key_code)?;
        if let Some(slot) = self.slots.get_mut(position) {
            slot.release_time = Some(time);
        }
        Some(position)
    }

    /// Drop the most recent position, as a backspace correction does
    pub fn backspace(&mut self) -> bool {
        match self.slots.pop() {
            Some(_) => {
                let removed = self.slots.len();
                self.pending.retain(|_, position| *position != removed);
                true
            }
            None => false,
        }
    }

    pub fn typed_text(&self) -> String {
        self.slots.iter().map(|slot| slot.typed_char).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the typed text currently equals the target
    pub fn is_complete(&self) -> bool {
        self.slots.len() == self.target.len()
            && self.slots.iter().zip(&self.target).all(|(slot, c)| slot.typed_char == *c)
    }

    /// Close the attempt. Keys still held are released at their press time.
    pub fn finish(self) -> CapturedAttempt {
        let typed_text = self.typed_text();
        let keystrokes = self
            .slots
            .into_iter()
            .map(|slot| {
                RawKeystroke::new(
                    slot.expected_char,
                    slot.key_code,
                    slot.press_time,
                    slot.release_time.unwrap_or(slot.press_time),
                )
            })
            .collect();

        CapturedAttempt { typed_text, keystrokes }
    }
}
