fn is_immune(rule: ImmunityRule, inventory: &InventoryState) -> bool {
    match rule {
        ImmunityRule::None => false,
        ImmunityRule::GasMask => inventory.has_gas_mask(),
    }
}

#[derive(Debug, Clone)]
struct HazardEffect {
    token: CancellationToken,
    since_last_tick_seconds: f32,
    ticks_fired: u32,
}

impl HazardEffect {
    fn new() -> Self {
        Self {
            token: CancellationToken::default(),
            since_last_tick_seconds: 0.0,
            ticks_fired: 0,
        }
    }
}

/// One placed gas or water volume and the damage-over-time effects it runs
/// on its occupants, at most one per occupant.
#[derive(Debug, Clone)]
struct HazardZone {
    id: HazardZoneId,
    name: String,
    label: String,
    kind: HazardKind,
    damage_per_tick: u32,
    tick_interval_seconds: f32,
    immunity: ImmunityRule,
    overlay: bool,
    effects: BTreeMap<EntityId, HazardEffect>,
}

impl HazardZone {
    fn from_def(name: &str, def: &HazardDef) -> Self {
        Self {
            id: HazardZoneId(0),
            name: name.to_string(),
            label: def.label.clone(),
            kind: def.kind,
            damage_per_tick: def.damage_per_tick,
            tick_interval_seconds: def.tick_interval_seconds.max(f32::EPSILON),
            immunity: def.immunity,
            overlay: def.overlay,
            effects: BTreeMap::new(),
        }
    }

    fn has_effect(&self, occupant: EntityId) -> bool {
        self.effects.contains_key(&occupant)
    }

    #[cfg(test)]
    fn effect_count(&self) -> usize {
        self.effects.len()
    }

    #[cfg(test)]
    fn effect_token(&self, occupant: EntityId) -> Option<CancellationToken> {
        self.effects.get(&occupant).map(|effect| effect.token.clone())
    }

    fn occupants(&self) -> Vec<EntityId> {
        self.effects.keys().copied().collect()
    }

    /// Re-entering while an effect is tracked is a no-op.
    fn enter(&mut self, occupant: EntityId, signals: &mut dyn SurvivalSink) -> bool {
        if self.has_effect(occupant) {
            debug!(
                zone = %self.name,
                entity_id = occupant.0,
                "hazard_reenter_ignored"
            );
            return false;
        }
        self.effects.insert(occupant, HazardEffect::new());
        signals.effect_started(self.id, occupant);
        if self.overlay {
            signals.overlay(self.id, true);
        }
        info!(
            zone = %self.name,
            kind = self.kind.as_token(),
            entity_id = occupant.0,
            damage_per_tick = self.damage_per_tick,
            tick_interval_seconds = self.tick_interval_seconds,
            "hazard_effect_started"
        );
        true
    }

    fn exit(&mut self, occupant: EntityId, signals: &mut dyn SurvivalSink) -> bool {
        if !self.end_effect(occupant, EffectEndReason::Exited, signals) {
            return false;
        }
        if self.overlay && self.effects.is_empty() {
            signals.overlay(self.id, false);
        }
        true
    }

    /// Safe to call with no effect running; the overlay is hidden either way.
    fn cancel_effect_for(&mut self, occupant: EntityId, signals: &mut dyn SurvivalSink) -> bool {
        self.cancel_with_reason(occupant, EffectEndReason::Cancelled, signals)
    }

    fn cancel_with_reason(
        &mut self,
        occupant: EntityId,
        reason: EffectEndReason,
        signals: &mut dyn SurvivalSink,
    ) -> bool {
        let ended = self.end_effect(occupant, reason, signals);
        if self.overlay {
            signals.overlay(self.id, false);
        }
        ended
    }

    fn end_effect(
        &mut self,
        occupant: EntityId,
        reason: EffectEndReason,
        signals: &mut dyn SurvivalSink,
    ) -> bool {
        let Some(effect) = self.effects.remove(&occupant) else {
            return false;
        };
        effect.token.cancel();
        signals.effect_ended(self.id, occupant, reason);
        info!(
            zone = %self.name,
            entity_id = occupant.0,
            reason = reason.as_token(),
            ticks_fired = effect.ticks_fired,
            "hazard_effect_ended"
        );
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HazardTickStats {
    damage_ticks: u32,
    immune_ticks: u32,
    aborted_effects: u32,
}

/// Every hazard zone in the level. Player deaths broadcast cancellation
/// through it, so no effect outlives a respawn.
#[derive(Debug, Default)]
struct HazardRegistry {
    zones: Vec<HazardZone>,
}

impl HazardRegistry {
    fn add_zone(&mut self, mut zone: HazardZone) -> HazardZoneId {
        let id = HazardZoneId(self.zones.len() as u32);
        zone.id = id;
        self.zones.push(zone);
        id
    }

    #[cfg(test)]
    fn zone(&self, id: HazardZoneId) -> Option<&HazardZone> {
        self.zones.get(id.0 as usize)
    }

    fn zone_mut(&mut self, id: HazardZoneId) -> Option<&mut HazardZone> {
        self.zones.get_mut(id.0 as usize)
    }

    fn zones(&self) -> &[HazardZone] {
        &self.zones
    }

    fn active_effects_for(&self, occupant: EntityId) -> usize {
        self.zones
            .iter()
            .filter(|zone| zone.has_effect(occupant))
            .count()
    }

    fn clear(&mut self) {
        self.zones.clear();
    }

    /// Advances every effect by `dt_seconds` and fires each due damage tick.
    /// Effects are looked up again before every fire, so a death or external
    /// cancellation in one tick stops all later ones.
    fn tick(
        &mut self,
        dt_seconds: f32,
        survivors: &mut BTreeMap<EntityId, Survivor>,
        body: &mut dyn MovementAuthority,
        signals: &mut dyn SurvivalSink,
    ) -> HazardTickStats {
        let mut stats = HazardTickStats::default();
        for zone_index in 0..self.zones.len() {
            for occupant in self.zones[zone_index].occupants() {
                if let Some(effect) = self.zones[zone_index].effects.get_mut(&occupant) {
                    effect.since_last_tick_seconds += dt_seconds;
                }

                loop {
                    let zone = &mut self.zones[zone_index];
                    let interval = zone.tick_interval_seconds;
                    let Some(effect) = zone.effects.get_mut(&occupant) else {
                        break;
                    };
                    if effect.token.is_cancelled() {
                        zone.cancel_effect_for(occupant, signals);
                        break;
                    }
                    if effect.since_last_tick_seconds < interval {
                        break;
                    }
                    effect.since_last_tick_seconds -= interval;
                    effect.ticks_fired = effect.ticks_fired.saturating_add(1);

                    let Some(survivor) = survivors.get_mut(&occupant) else {
                        warn!(
                            zone = %zone.name,
                            entity_id = occupant.0,
                            "hazard_effect_missing_health"
                        );
                        zone.end_effect(occupant, EffectEndReason::MissingHealth, signals);
                        if zone.overlay && zone.effects.is_empty() {
                            signals.overlay(zone.id, false);
                        }
                        stats.aborted_effects = stats.aborted_effects.saturating_add(1);
                        break;
                    };
                    if is_immune(zone.immunity, &survivor.inventory) {
                        stats.immune_ticks = stats.immune_ticks.saturating_add(1);
                        continue;
                    }

                    let damage = zone.damage_per_tick;
                    let label = zone.label.clone();
                    stats.damage_ticks = stats.damage_ticks.saturating_add(1);
                    let mut ctx = RespawnContext {
                        hazards: &mut *self,
                        body: &mut *body,
                        signals: &mut *signals,
                    };
                    survivor.health.take_damage(damage, &label, &mut ctx);
                }
            }
        }
        stats
    }
}

impl HazardCancellation for HazardRegistry {
    fn cancel_effects_for(&mut self, occupant: EntityId, signals: &mut dyn SurvivalSink) -> usize {
        self.zones
            .iter_mut()
            .map(|zone| zone.cancel_with_reason(occupant, EffectEndReason::OccupantDied, signals))
            .filter(|cancelled| *cancelled)
            .count()
    }
}
