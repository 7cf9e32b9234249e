/// Health of one body. Reaching zero resolves into a respawn before the
/// damaging call returns, so callers never observe a dead state.
#[derive(Debug, Clone, PartialEq)]
struct HealthStateMachine {
    owner: EntityId,
    current: u32,
    max: u32,
    death_count: u32,
    spawn: Option<Pose>,
}

impl HealthStateMachine {
    fn new(owner: EntityId, max: u32, spawn: Option<Pose>) -> Self {
        let max = max.max(1);
        Self {
            owner,
            current: max,
            max,
            death_count: 0,
            spawn,
        }
    }

    fn current_health(&self) -> u32 {
        self.current
    }

    fn max_health(&self) -> u32 {
        self.max
    }

    fn death_count(&self) -> u32 {
        self.death_count
    }

    fn take_damage(&mut self, amount: u32, source: &str, ctx: &mut RespawnContext<'_>) {
        self.current = self.current.saturating_sub(amount);
        ctx.signals.damage_feedback(self.owner, amount);
        debug!(
            entity_id = self.owner.0,
            amount,
            source,
            current = self.current,
            "damage_taken"
        );
        if self.current == 0 {
            self.die(source, ctx);
        }
    }

    fn instant_kill(&mut self, source: &str, ctx: &mut RespawnContext<'_>) {
        self.current = 0;
        self.die(source, ctx);
    }

    /// Ordering matters: effects are cancelled before the body moves so no
    /// hazard tick can land on a half-teleported player.
    fn die(&mut self, source: &str, ctx: &mut RespawnContext<'_>) {
        self.death_count = self.death_count.saturating_add(1);
        let cancelled_effects = ctx.hazards.cancel_effects_for(self.owner, &mut *ctx.signals);
        ctx.signals.player_died(self.owner, self.death_count);

        let moved = match self.spawn {
            Some(pose) => {
                ctx.body.set_movement_enabled(self.owner, false);
                let moved = ctx.body.teleport(self.owner, pose);
                ctx.body.set_movement_enabled(self.owner, true);
                moved
            }
            None => {
                warn!(entity_id = self.owner.0, "respawn_without_spawn_pose");
                false
            }
        };

        self.current = self.max;
        ctx.signals.respawned(self.owner, moved);
        info!(
            entity_id = self.owner.0,
            source,
            death_count = self.death_count,
            cancelled_effects,
            moved,
            "player_died"
        );
    }
}

/// The player's survival state: health plus the inventory hazards consult.
#[derive(Debug, Clone, PartialEq)]
struct Survivor {
    health: HealthStateMachine,
    inventory: InventoryState,
}

impl Survivor {
    fn new(health: HealthStateMachine) -> Self {
        Self {
            health,
            inventory: InventoryState::default(),
        }
    }
}
