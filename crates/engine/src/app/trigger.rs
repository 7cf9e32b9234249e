use std::collections::{BTreeMap, BTreeSet};

use super::scene::{EntityId, SceneWorld, Vec3};

/// Axis-aligned box volume. Occupancy is point-in-box on the occupant's
/// transform position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerVolume {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl TriggerVolume {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (point.x - self.center.x).abs() <= self.half_extents.x
            && (point.y - self.center.y).abs() <= self.half_extents.y
            && (point.z - self.center.z).abs() <= self.half_extents.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyEvent {
    Entered {
        trigger: TriggerId,
        occupant: EntityId,
    },
    Exited {
        trigger: TriggerId,
        occupant: EntityId,
    },
}

#[derive(Debug, Clone)]
struct TrackedTrigger {
    volume: TriggerVolume,
    occupants: BTreeSet<EntityId>,
}

/// Edge detector over a set of trigger volumes. Each `scan` compares the
/// current overlap against the previous scan and reports only transitions,
/// ordered by trigger id then occupant id.
#[derive(Debug, Default)]
pub struct TriggerTracker {
    next_id: u32,
    triggers: BTreeMap<TriggerId, TrackedTrigger>,
}

impl TriggerTracker {
    pub fn add_volume(&mut self, volume: TriggerVolume) -> TriggerId {
        let id = TriggerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.triggers.insert(
            id,
            TrackedTrigger {
                volume,
                occupants: BTreeSet::new(),
            },
        );
        id
    }

    pub fn volume(&self, id: TriggerId) -> Option<&TriggerVolume> {
        self.triggers.get(&id).map(|trigger| &trigger.volume)
    }

    pub fn is_inside(&self, id: TriggerId, occupant: EntityId) -> bool {
        self.triggers
            .get(&id)
            .is_some_and(|trigger| trigger.occupants.contains(&occupant))
    }

    /// Drops `occupant` from every volume without reporting exits, so the
    /// next scan reports fresh entries for wherever it now stands.
    pub fn forget_occupant(&mut self, occupant: EntityId) {
        for trigger in self.triggers.values_mut() {
            trigger.occupants.remove(&occupant);
        }
    }

    pub fn clear(&mut self) {
        self.next_id = 0;
        self.triggers.clear();
    }

    /// Entities that vanished from the world since the last scan are
    /// reported as exits.
    pub fn scan(&mut self, world: &SceneWorld, candidates: &[EntityId]) -> Vec<OccupancyEvent> {
        let mut events = Vec::new();
        for (trigger_id, trigger) in &mut self.triggers {
            let mut now_inside = BTreeSet::new();
            for occupant in candidates {
                let Some(position) = world.position_of(*occupant) else {
                    continue;
                };
                if trigger.volume.contains(position) {
                    now_inside.insert(*occupant);
                }
            }

            for occupant in trigger.occupants.difference(&now_inside) {
                events.push(OccupancyEvent::Exited {
                    trigger: *trigger_id,
                    occupant: *occupant,
                });
            }
            for occupant in now_inside.difference(&trigger.occupants) {
                events.push(OccupancyEvent::Entered {
                    trigger: *trigger_id,
                    occupant: *occupant,
                });
            }
            trigger.occupants = now_inside;
        }
        events
    }
}
