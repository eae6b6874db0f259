//! services/reader/src/adapters/memory_storage.rs
//!
//! An in-process `SessionStorage`. Nothing survives the process; useful for
//! embedding the flow and for tests.

use async_trait::async_trait;
use novel_reader_core::domain::Session;
use novel_reader_core::ports::{PortResult, SessionStorage};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn read(&self) -> PortResult<Option<Session>> {
        Ok(self.slot.lock().clone().filter(|s| s.bearer().is_some()))
    }

    async fn write(&self, session: &Session) -> PortResult<()> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    async fn erase(&self) -> PortResult<()> {
        self.slot.lock().take();
        Ok(())
    }
}
