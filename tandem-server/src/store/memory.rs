use crate::store::{RoomMutation, RoomRecord, RoomStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use tandem_core::RoomId;

#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: DashMap<RoomId, RoomRecord>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn get(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self.rooms.get(room_id).map(|r| r.value().clone()))
    }

    async fn upsert(&self, record: RoomRecord) -> Result<(), StoreError> {
        self.rooms.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.rooms.remove(room_id);
        Ok(())
    }

    async fn update(
        &self,
        room_id: &RoomId,
        mutate: RoomMutation<'_>,
    ) -> Result<RoomRecord, StoreError> {
        // The entry guard holds the shard lock for the whole mutation.
        let mut entry = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomRecord::new(room_id.clone()));
        mutate(entry.value_mut());
        Ok(entry.value().clone())
    }
}
