mod memory;

pub use memory::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tandem_core::{RoomId, SessionId, UserInfo};
use thiserror::Error;

/// Persistent state of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub password: Option<String>,
    /// Join order.
    pub members: Vec<UserInfo>,
}

impl RoomRecord {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            password: None,
            members: Vec::new(),
        }
    }

    pub fn member(&self, id: &SessionId) -> Option<&UserInfo> {
        self.members.iter().find(|m| &m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room store unavailable: {0}")]
    Unavailable(String),
}

pub type RoomMutation<'a> = Box<dyn FnOnce(&mut RoomRecord) + Send + 'a>;

/// Storage seam for room records.
///
/// `update` is atomic per room and creates the record when it is absent.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, StoreError>;

    async fn upsert(&self, record: RoomRecord) -> Result<(), StoreError>;

    async fn delete(&self, room_id: &RoomId) -> Result<(), StoreError>;

    async fn update(
        &self,
        room_id: &RoomId,
        mutate: RoomMutation<'_>,
    ) -> Result<RoomRecord, StoreError>;
}
