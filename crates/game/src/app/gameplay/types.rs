/// Capability flags picked up during a run. Flags are only ever raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InventoryState {
    has_keycard: bool,
    has_gas_mask: bool,
}

impl InventoryState {
    /// Returns true when the flag was newly raised.
    fn give_keycard(&mut self) -> bool {
        !std::mem::replace(&mut self.has_keycard, true)
    }

    fn give_gas_mask(&mut self) -> bool {
        !std::mem::replace(&mut self.has_gas_mask, true)
    }

    fn has_keycard(&self) -> bool {
        self.has_keycard
    }

    fn has_gas_mask(&self) -> bool {
        self.has_gas_mask
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CoinPurse {
    collected: u32,
}

impl CoinPurse {
    fn collect(&mut self) -> u32 {
        self.collected = self.collected.saturating_add(1);
        self.collected
    }

    fn collected(&self) -> u32 {
        self.collected
    }
}

/// Shared cancel flag for one hazard effect. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    fn cancel(&self) {
        self.cancelled.set(true);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct HazardZoneId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectEndReason {
    Exited,
    Cancelled,
    OccupantDied,
    MissingHealth,
}

impl EffectEndReason {
    fn as_token(self) -> &'static str {
        match self {
            Self::Exited => "exited",
            Self::Cancelled => "cancelled",
            Self::OccupantDied => "occupant_died",
            Self::MissingHealth => "missing_health",
        }
    }
}

/// Receiver for the survival subsystem's outward signals: the damage flash
/// and the per-zone overlay, plus lifecycle notifications.
trait SurvivalSink {
    fn damage_feedback(&mut self, target: EntityId, amount: u32);
    fn overlay(&mut self, zone: HazardZoneId, visible: bool);
    fn effect_started(&mut self, _zone: HazardZoneId, _occupant: EntityId) {}
    fn effect_ended(&mut self, _zone: HazardZoneId, _occupant: EntityId, _reason: EffectEndReason) {}
    fn player_died(&mut self, _player: EntityId, _death_count: u32) {}
    fn respawned(&mut self, _player: EntityId, _moved: bool) {}
}

/// Everything a death broadcasts to: cancels every hazard effect on the
/// dying occupant. Returns how many effects were live.
trait HazardCancellation {
    fn cancel_effects_for(&mut self, occupant: EntityId, signals: &mut dyn SurvivalSink) -> usize;
}

/// Collision authority over a body, suspended while it is teleported.
trait MovementAuthority {
    fn set_movement_enabled(&mut self, id: EntityId, enabled: bool);
    fn teleport(&mut self, id: EntityId, pose: Pose) -> bool;
}

impl MovementAuthority for SceneWorld {
    fn set_movement_enabled(&mut self, id: EntityId, enabled: bool) {
        if let Some(entity) = self.find_entity_mut(id) {
            entity.movement_enabled = enabled;
        }
    }

    fn teleport(&mut self, id: EntityId, pose: Pose) -> bool {
        let Some(entity) = self.find_entity_mut(id) else {
            return false;
        };
        entity.transform = Transform::from_pose(pose);
        true
    }
}

/// Collaborators a death needs. Built fresh for each damage request so the
/// hazard registry can lend itself while it is ticking.
struct RespawnContext<'a> {
    hazards: &'a mut dyn HazardCancellation,
    body: &'a mut dyn MovementAuthority,
    signals: &'a mut dyn SurvivalSink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurvivalEvent {
    DamageFeedback {
        target: EntityId,
        amount: u32,
    },
    OverlayChanged {
        zone: HazardZoneId,
        visible: bool,
    },
    EffectStarted {
        zone: HazardZoneId,
        occupant: EntityId,
    },
    EffectEnded {
        zone: HazardZoneId,
        occupant: EntityId,
        reason: EffectEndReason,
    },
    PlayerDied {
        player: EntityId,
        death_count: u32,
    },
    Respawned {
        player: EntityId,
        moved: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurvivalEventKind {
    DamageFeedback,
    OverlayChanged,
    EffectStarted,
    EffectEnded,
    PlayerDied,
    Respawned,
}

impl SurvivalEvent {
    fn kind(self) -> SurvivalEventKind {
        match self {
            Self::DamageFeedback { .. } => SurvivalEventKind::DamageFeedback,
            Self::OverlayChanged { .. } => SurvivalEventKind::OverlayChanged,
            Self::EffectStarted { .. } => SurvivalEventKind::EffectStarted,
            Self::EffectEnded { .. } => SurvivalEventKind::EffectEnded,
            Self::PlayerDied { .. } => SurvivalEventKind::PlayerDied,
            Self::Respawned { .. } => SurvivalEventKind::Respawned,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SurvivalEventCounts {
    total: u32,
    damage_feedback: u32,
    overlay_changed: u32,
    effect_started: u32,
    effect_ended: u32,
    player_died: u32,
    respawned: u32,
}

impl SurvivalEventCounts {
    fn record(&mut self, kind: SurvivalEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            SurvivalEventKind::DamageFeedback => {
                self.damage_feedback = self.damage_feedback.saturating_add(1)
            }
            SurvivalEventKind::OverlayChanged => {
                self.overlay_changed = self.overlay_changed.saturating_add(1)
            }
            SurvivalEventKind::EffectStarted => {
                self.effect_started = self.effect_started.saturating_add(1)
            }
            SurvivalEventKind::EffectEnded => self.effect_ended = self.effect_ended.saturating_add(1),
            SurvivalEventKind::PlayerDied => self.player_died = self.player_died.saturating_add(1),
            SurvivalEventKind::Respawned => self.respawned = self.respawned.saturating_add(1),
        }
    }
}

#[derive(Default)]
struct SurvivalEventBus {
    current_tick_events: Vec<SurvivalEvent>,
    last_tick_counts: SurvivalEventCounts,
    overlay_visible: BTreeMap<HazardZoneId, bool>,
}

impl SurvivalEventBus {
    fn emit(&mut self, event: SurvivalEvent) {
        self.current_tick_events.push(event);
    }

    fn iter_emitted_so_far(&self) -> impl Iterator<Item = &SurvivalEvent> {
        self.current_tick_events.iter()
    }

    fn finish_tick_rollover(&mut self) {
        let mut counts = SurvivalEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
    }

    fn last_tick_counts(&self) -> SurvivalEventCounts {
        self.last_tick_counts
    }

    #[cfg(test)]
    fn overlay_visible(&self, zone: HazardZoneId) -> bool {
        self.overlay_visible.get(&zone).copied().unwrap_or(false)
    }

    fn any_overlay_visible(&self) -> bool {
        self.overlay_visible.values().any(|visible| *visible)
    }

    fn clear(&mut self) {
        self.current_tick_events.clear();
        self.last_tick_counts = SurvivalEventCounts::default();
        self.overlay_visible.clear();
    }
}

impl SurvivalSink for SurvivalEventBus {
    fn damage_feedback(&mut self, target: EntityId, amount: u32) {
        self.emit(SurvivalEvent::DamageFeedback { target, amount });
    }

    fn overlay(&mut self, zone: HazardZoneId, visible: bool) {
        self.overlay_visible.insert(zone, visible);
        self.emit(SurvivalEvent::OverlayChanged { zone, visible });
    }

    fn effect_started(&mut self, zone: HazardZoneId, occupant: EntityId) {
        self.emit(SurvivalEvent::EffectStarted { zone, occupant });
    }

    fn effect_ended(&mut self, zone: HazardZoneId, occupant: EntityId, reason: EffectEndReason) {
        self.emit(SurvivalEvent::EffectEnded {
            zone,
            occupant,
            reason,
        });
    }

    fn player_died(&mut self, player: EntityId, death_count: u32) {
        self.emit(SurvivalEvent::PlayerDied {
            player,
            death_count,
        });
    }

    fn respawned(&mut self, player: EntityId, moved: bool) {
        self.emit(SurvivalEvent::Respawned { player, moved });
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum RunOutcome {
    /// The run stopped before the exit was reached.
    #[default]
    Unfinished,
    Scored(ScoreReport),
    Rejected(String),
}

/// Lets the caller read how the run ended after the scene has been handed
/// to the loop runner.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunOutcomeHandle {
    outcome: Rc<RefCell<RunOutcome>>,
}

impl RunOutcomeHandle {
    pub(crate) fn get(&self) -> RunOutcome {
        self.outcome.borrow().clone()
    }

    fn set(&self, outcome: RunOutcome) {
        *self.outcome.borrow_mut() = outcome;
    }
}
