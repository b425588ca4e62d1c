//! Single-assignment result slots.
//!
//! A slot is filled at most once through its [`SlotWriter`] and read through any
//! number of [`SlotReader`] clones, exactly one of which obtains the value.
//!
//! A slot that is still empty resolves without a value when it is abandoned:
//! the writer is dropped unfilled, or a reader calls [`SlotReader::cancel`].
//! Abandoning never discards a value that was already written.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Creates an empty slot, returning its writer and a reader.
pub fn slot<T>() -> (SlotWriter<T>, SlotReader<T>) {
    let shared = Arc::new(Shared {
        content: Mutex::new(Content::Empty),
        changed: Condvar::new(),
    });
    (
        SlotWriter {
            shared: shared.clone(),
        },
        SlotReader { shared },
    )
}

/// The writing end of a slot.
pub struct SlotWriter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotWriter<T> {
    /// Stores `value` and wakes every reader.
    ///
    /// Hands the value back if a reader abandoned the slot first.
    pub fn fill(self, value: T) -> Result<(), T> {
        let mut content = self.shared.lock();
        if !content.is_empty() {
            return Err(value);
        }
        *content = Content::Filled(value);
        drop(content);
        self.shared.changed.notify_all();
        Ok(())
    }
}

impl<T> Drop for SlotWriter<T> {
    fn drop(&mut self) {
        self.shared.abandon();
    }
}

/// The reading end of a slot.
pub struct SlotReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SlotReader<T> {
    fn clone(&self) -> Self {
        SlotReader {
            shared: self.shared.clone(),
        }
    }
}

impl<T> SlotReader<T> {
    /// Blocks until the slot is resolved, then takes its value.
    ///
    /// `None` means the slot was abandoned, or another reader took the value.
    pub fn take(&self) -> Option<T> {
        let mut content = self.shared.lock();
        while content.is_empty() {
            content = self
                .shared
                .changed
                .wait(content)
                .unwrap_or_else(|e| e.into_inner());
        }
        content.drain()
    }

    /// Abandons the slot if it is still empty, waking every reader with `None`.
    ///
    /// Returns `false` if the slot was already resolved; a written value is kept.
    pub fn cancel(&self) -> bool {
        self.shared.abandon()
    }
}

struct Shared<T> {
    content: Mutex<Content<T>>,
    changed: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Content<T>> {
        // Every transition is a single assignment, so a poisoned slot is still consistent.
        self.content.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn abandon(&self) -> bool {
        let mut content = self.lock();
        if !content.is_empty() {
            return false;
        }
        *content = Content::Drained;
        drop(content);
        self.changed.notify_all();
        true
    }
}

enum Content<T> {
    Empty,
    Filled(T),
    /// Taken or abandoned.
    Drained,
}

impl<T> Content<T> {
    fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    fn drain(&mut self) -> Option<T> {
        match std::mem::replace(self, Content::Drained) {
            Content::Filled(value) => Some(value),
            Content::Empty | Content::Drained => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, thread, time::Duration};

    use super::*;

    #[test]
    fn test_slot_is_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<SlotWriter<Cell<u8>>>();
        assert_send_sync::<SlotReader<Cell<u8>>>();
    }

    #[test]
    fn test_fill_then_take() {
        let (writer, reader) = slot::<String>();
        writer.fill("first".to_string()).unwrap();
        assert_eq!(reader.take().as_deref(), Some("first"));
        assert_eq!(reader.take(), None);
    }

    #[test]
    fn test_take_blocks_until_filled() {
        let (writer, reader) = slot::<u64>();
        let filler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            writer.fill(99).unwrap();
        });
        assert_eq!(reader.take(), Some(99));
        filler.join().unwrap();
    }

    #[test]
    fn test_dropped_writer_abandons() {
        let (writer, reader) = slot::<u64>();
        thread::spawn(move || drop(writer)).join().unwrap();
        assert!(!reader.cancel());
        assert_eq!(reader.take(), None);
    }

    #[test]
    fn test_cancel_wakes_blocked_reader() {
        let (writer, reader) = slot::<u64>();
        let blocked = {
            let reader = reader.clone();
            thread::spawn(move || reader.take())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(reader.cancel());
        assert!(!reader.cancel());
        assert_eq!(blocked.join().unwrap(), None);
        assert_eq!(writer.fill(5), Err(5));
    }

    #[test]
    fn test_cancel_keeps_written_value() {
        let (writer, reader) = slot();
        writer.fill('x').unwrap();
        assert!(!reader.cancel());
        assert_eq!(reader.take(), Some('x'));
    }
}
