//! Local entity cache, mutated only through upserts.
//!
//! Records are created on first sighting and then updated in place; nothing
//! is ever deleted here (remote deletions are not reconciled).

use crate::models::mill::{DeviceEntry, DeviceId, Heater, Room, RoomEntry, RoomId};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct EntityStore {
    rooms: BTreeMap<RoomId, Room>,
    heaters: BTreeMap<DeviceId, Heater>,
}

impl EntityStore {
    pub fn upsert_room(&mut self, entry: RoomEntry) {
        let room = self
            .rooms
            .entry(entry.room_id)
            .or_insert_with(|| Room::new(entry.room_id));
        entry.room_name.apply(&mut room.name);
        entry.comfort_temp.apply(&mut room.comfort_temp);
        entry.away_temp.apply(&mut room.away_temp);
        entry.sleep_temp.apply(&mut room.sleep_temp);
        entry.current_mode.apply(&mut room.current_mode);
        entry.heat_status.apply(&mut room.heat_status);
    }

    /// Upserts one device sighting. Entries without a device id are skipped;
    /// `seen_in` is recorded only for sightings made through a room listing.
    pub fn upsert_heater(&mut self, entry: DeviceEntry, seen_in: Option<RoomId>) {
        let Some(device_id) = entry.device_id else {
            return;
        };
        let heater = self
            .heaters
            .entry(device_id)
            .or_insert_with(|| Heater::new(device_id));
        entry.device_name.apply(&mut heater.name);
        entry.current_temp.apply(&mut heater.current_temp);
        entry.device_status.apply(&mut heater.device_status);
        entry.heater_flag.apply(&mut heater.heater_flag);
        entry.control_type.apply(&mut heater.control_type);
        entry.can_change_temp.apply(&mut heater.can_change_temp);
        if seen_in.is_some() {
            heater.room = seen_in;
        }
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn heater(&self, id: DeviceId) -> Option<&Heater> {
        self.heaters.get(&id)
    }

    pub fn rooms(&self) -> &BTreeMap<RoomId, Room> {
        &self.rooms
    }

    pub fn heaters(&self) -> &BTreeMap<DeviceId, Heater> {
        &self.heaters
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}
