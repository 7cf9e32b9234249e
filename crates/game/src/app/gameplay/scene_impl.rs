#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerRole {
    Hazard(HazardZoneId),
    Pickup(usize),
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Running,
    Finished,
}

struct EscapeScene {
    scenario: Scenario,
    outcome: RunOutcomeHandle,
    player_id: Option<EntityId>,
    survivors: BTreeMap<EntityId, Survivor>,
    registry: HazardRegistry,
    triggers: TriggerTracker,
    trigger_roles: BTreeMap<TriggerId, TriggerRole>,
    exit_trigger: Option<TriggerId>,
    pickups: Vec<Pickup>,
    doors: Vec<LockedDoor>,
    coins: CoinPurse,
    total_coins: u32,
    events: SurvivalEventBus,
    next_step: usize,
    phase: RunPhase,
    exit_blocked_reported: bool,
}

impl EscapeScene {
    fn new(scenario: Scenario, outcome: RunOutcomeHandle) -> Self {
        Self {
            scenario,
            outcome,
            player_id: None,
            survivors: BTreeMap::new(),
            registry: HazardRegistry::default(),
            triggers: TriggerTracker::default(),
            trigger_roles: BTreeMap::new(),
            exit_trigger: None,
            pickups: Vec::new(),
            doors: Vec::new(),
            coins: CoinPurse::default(),
            total_coins: 0,
            events: SurvivalEventBus::default(),
            next_step: 0,
            phase: RunPhase::Running,
            exit_blocked_reported: false,
        }
    }

    fn reset_runtime_state(&mut self) {
        self.player_id = None;
        self.survivors.clear();
        self.registry.clear();
        self.triggers.clear();
        self.trigger_roles.clear();
        self.exit_trigger = None;
        self.pickups.clear();
        self.doors.clear();
        self.coins = CoinPurse::default();
        self.total_coins = 0;
        self.events.clear();
        self.next_step = 0;
        self.phase = RunPhase::Running;
        self.exit_blocked_reported = false;
    }

    fn reject(&mut self, message: String) {
        error!(scenario = %self.scenario.name, error = %message, "scenario_rejected");
        self.outcome.set(RunOutcome::Rejected(message));
        self.phase = RunPhase::Finished;
    }

    fn player_survivor(&self) -> Option<&Survivor> {
        self.player_id.and_then(|id| self.survivors.get(&id))
    }

    fn apply_due_steps(&mut self, elapsed_seconds: f64, player: EntityId, world: &mut SceneWorld) {
        while let Some(step) = self.scenario.timeline.get(self.next_step) {
            if step.at_seconds > elapsed_seconds {
                break;
            }
            let action = step.action.clone();
            self.next_step += 1;
            self.apply_action(action, player, world);
        }
    }

    fn apply_action(&mut self, action: TimelineAction, player: EntityId, world: &mut SceneWorld) {
        match action {
            TimelineAction::MoveTo { position } => {
                let Some(entity) = world.find_entity_mut(player) else {
                    return;
                };
                if entity.movement_enabled {
                    entity.transform.position = position;
                    debug!(
                        entity_id = player.0,
                        x = position.x,
                        y = position.y,
                        z = position.z,
                        "player_moved"
                    );
                }
            }
            TimelineAction::Interact { target } => {
                let Some(survivor) = self.survivors.get(&player) else {
                    return;
                };
                let Some(door) = self.doors.iter_mut().find(|door| door.name == target) else {
                    warn!(target = %target, "interact_target_missing");
                    return;
                };
                let outcome = door.try_open(&survivor.inventory);
                info!(door = %door.name, outcome = ?outcome, "door_interaction");
            }
            TimelineAction::Damage { amount, source } => {
                let Some(survivor) = self.survivors.get_mut(&player) else {
                    return;
                };
                let mut ctx = RespawnContext {
                    hazards: &mut self.registry,
                    body: world,
                    signals: &mut self.events,
                };
                survivor.health.take_damage(amount, &source, &mut ctx);
            }
            TimelineAction::InstantKill { source } => {
                let Some(survivor) = self.survivors.get_mut(&player) else {
                    return;
                };
                let mut ctx = RespawnContext {
                    hazards: &mut self.registry,
                    body: world,
                    signals: &mut self.events,
                };
                survivor.health.instant_kill(&source, &mut ctx);
            }
        }
    }

    fn handle_occupancy(&mut self, event: OccupancyEvent) {
        match event {
            OccupancyEvent::Entered { trigger, occupant } => {
                match self.trigger_roles.get(&trigger).copied() {
                    Some(TriggerRole::Hazard(zone_id)) => {
                        if let Some(zone) = self.registry.zone_mut(zone_id) {
                            zone.enter(occupant, &mut self.events);
                        }
                    }
                    Some(TriggerRole::Pickup(index)) => {
                        let (Some(pickup), Some(survivor)) =
                            (self.pickups.get_mut(index), self.survivors.get_mut(&occupant))
                        else {
                            return;
                        };
                        if let Some(kind) = pickup.collect(&mut survivor.inventory, &mut self.coins) {
                            info!(
                                pickup = %pickup.name,
                                kind = kind.as_token(),
                                coins = self.coins.collected(),
                                total_coins = self.total_coins,
                                "pickup_collected"
                            );
                        }
                    }
                    Some(TriggerRole::Exit) => {
                        debug!(entity_id = occupant.0, "exit_entered");
                    }
                    None => {}
                }
            }
            OccupancyEvent::Exited { trigger, occupant } => {
                if let Some(TriggerRole::Hazard(zone_id)) = self.trigger_roles.get(&trigger).copied() {
                    if let Some(zone) = self.registry.zone_mut(zone_id) {
                        zone.exit(occupant, &mut self.events);
                    }
                }
            }
        }
    }

    fn exit_gate_open(&self) -> bool {
        match &self.scenario.exit.requires_open_door {
            Some(door_name) => self
                .doors
                .iter()
                .any(|door| &door.name == door_name && door.is_open()),
            None => true,
        }
    }

    fn check_exit(&mut self, player: EntityId, elapsed_seconds: f64) {
        let Some(exit) = self.exit_trigger else {
            return;
        };
        if !self.triggers.is_inside(exit, player) {
            return;
        }
        if !self.exit_gate_open() {
            if !self.exit_blocked_reported {
                self.exit_blocked_reported = true;
                info!(
                    door = ?self.scenario.exit.requires_open_door,
                    "exit_blocked"
                );
            }
            return;
        }
        self.finish_run(player, elapsed_seconds);
    }

    fn finish_run(&mut self, player: EntityId, elapsed_seconds: f64) {
        let deaths = self
            .survivors
            .get(&player)
            .map(|survivor| survivor.health.death_count())
            .unwrap_or_default();
        let report = ScoreReport::from_inputs(ScoreInputs {
            elapsed_seconds,
            deaths,
            coins_collected: self.coins.collected(),
            total_coins: self.total_coins,
        });
        match serde_json::to_string(&report) {
            Ok(json) => info!(score = report.score, report = %json, "run_scored"),
            Err(error) => warn!(score = report.score, error = %error, "score_report_serialize_failed"),
        }
        self.outcome.set(RunOutcome::Scored(report));
        self.phase = RunPhase::Finished;
    }
}

impl Scene for EscapeScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.reset_runtime_state();
        let defs = match resolve_level_defs(world, &self.scenario) {
            Ok(defs) => defs,
            Err(message) => {
                self.reject(message);
                return;
            }
        };

        let start = self
            .scenario
            .start
            .or(defs.player.spawn)
            .unwrap_or_default();
        let player_id = world.spawn(Transform::from_pose(start), "player");
        let health = HealthStateMachine::new(player_id, defs.player.max_health, defs.player.spawn);
        self.survivors.insert(player_id, Survivor::new(health));
        self.player_id = Some(player_id);

        for (placement, def) in self.scenario.hazards.iter().zip(&defs.hazards) {
            let zone_id = self.registry.add_zone(HazardZone::from_def(&placement.id, def));
            let trigger = self
                .triggers
                .add_volume(TriggerVolume::new(placement.center, placement.half_extents));
            self.trigger_roles.insert(trigger, TriggerRole::Hazard(zone_id));
        }

        for placement in &self.scenario.pickups {
            let pickup = Pickup::new(&placement.id, placement.kind, placement.position);
            let trigger = self.triggers.add_volume(pickup.volume());
            self.trigger_roles
                .insert(trigger, TriggerRole::Pickup(self.pickups.len()));
            self.pickups.push(pickup);
        }

        self.doors = self
            .scenario
            .doors
            .iter()
            .map(|door| LockedDoor::new(&door.id, door.requires_keycard))
            .collect();

        let exit = self.triggers.add_volume(self.scenario.exit_volume());
        self.trigger_roles.insert(exit, TriggerRole::Exit);
        self.exit_trigger = Some(exit);
        self.total_coins = self.scenario.coin_count();

        info!(
            scenario = %self.scenario.name,
            player_def = %defs.player.def_name,
            max_health = defs.player.max_health,
            hazard_zones = self.registry.zones().len(),
            pickups = self.pickups.len(),
            doors = self.doors.len(),
            total_coins = self.total_coins,
            timeline_steps = self.scenario.timeline.len(),
            "escape_scene_loaded"
        );
    }

    fn update(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) -> SceneCommand {
        if self.phase == RunPhase::Finished {
            return SceneCommand::Quit;
        }
        let Some(player) = self.player_id else {
            return SceneCommand::Quit;
        };
        let elapsed_seconds = world.elapsed_seconds();

        self.apply_due_steps(elapsed_seconds, player, world);

        for event in self.triggers.scan(world, &[player]) {
            self.handle_occupancy(event);
        }

        let stats = self
            .registry
            .tick(fixed_dt_seconds, &mut self.survivors, world, &mut self.events);
        if stats != HazardTickStats::default() {
            debug!(
                damage_ticks = stats.damage_ticks,
                immune_ticks = stats.immune_ticks,
                aborted_effects = stats.aborted_effects,
                "hazard_tick"
            );
        }

        self.check_exit(player, elapsed_seconds);

        // A respawn may land inside a volume the player already occupied.
        let died_this_tick = self
            .events
            .iter_emitted_so_far()
            .any(|event| matches!(event, SurvivalEvent::PlayerDied { .. }));
        if died_this_tick {
            self.triggers.forget_occupant(player);
        }
        self.events.finish_tick_rollover();
        let counts = self.events.last_tick_counts();
        if counts.total > 0 {
            debug!(
                total = counts.total,
                damage_feedback = counts.damage_feedback,
                overlay_changed = counts.overlay_changed,
                effect_started = counts.effect_started,
                effect_ended = counts.effect_ended,
                player_died = counts.player_died,
                respawned = counts.respawned,
                "survival_events"
            );
        }

        match self.phase {
            RunPhase::Finished => SceneCommand::Quit,
            RunPhase::Running => SceneCommand::None,
        }
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if let Some(player) = self.player_id {
            world.despawn(player);
        }
        self.reset_runtime_state();
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let survivor = self.player_survivor()?;
        let hazard_marker = if self.events.any_overlay_visible() {
            " | IN HAZARD"
        } else {
            ""
        };
        Some(format!(
            "{} | hp {}/{} | deaths {} | coins {}/{} | effects {}{}",
            self.scenario.name,
            survivor.health.current_health(),
            survivor.health.max_health(),
            survivor.health.death_count(),
            self.coins.collected(),
            self.total_coins,
            self.registry.active_effects_for(survivor.health.owner),
            hazard_marker
        ))
    }
}
