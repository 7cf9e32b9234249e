use serde::{Deserialize, Serialize};

use crate::content::DefDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Position plus heading. Pitch and roll belong to the camera, which lives
/// outside the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    #[serde(default)]
    pub yaw_degrees: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub yaw_degrees: f32,
}

impl Transform {
    pub fn from_pose(pose: Pose) -> Self {
        Self {
            position: pose.position,
            yaw_degrees: pose.yaw_degrees,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            yaw_degrees: self.yaw_degrees,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub debug_name: &'static str,
    /// While false the body ignores collision response, so a teleport is
    /// never resolved as a push.
    pub movement_enabled: bool,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    elapsed_seconds: f64,
    def_database: Option<DefDatabase>,
}

impl SceneWorld {
    pub fn spawn(&mut self, transform: Transform, debug_name: &'static str) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            debug_name,
            movement_enabled: true,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_spawns.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_despawns.clear();
        }

        self.entities.append(&mut self.pending_spawns);
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.elapsed_seconds = 0.0;
    }

    pub fn advance_clock(&mut self, fixed_dt_seconds: f32) {
        self.elapsed_seconds += f64::from(fixed_dt_seconds);
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.find_entity(id).map(|entity| entity.transform.position)
    }

    pub fn set_def_database(&mut self, def_database: DefDatabase) {
        self.def_database = Some(def_database);
    }

    pub fn def_database(&self) -> Option<&DefDatabase> {
        self.def_database.as_ref()
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    pub(crate) fn set_def_database(&mut self, def_database: DefDatabase) {
        self.world.set_def_database(def_database);
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        let (scene, world) = (&mut self.scene, &mut self.world);
        scene.load(world);
        world.apply_pending();
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32) -> SceneCommand {
        let (scene, world) = (&mut self.scene, &mut self.world);
        world.advance_clock(fixed_dt_seconds);
        let command = scene.update(fixed_dt_seconds, world);
        world.apply_pending();
        command
    }

    pub(crate) fn shutdown(&mut self) {
        if self.is_loaded {
            let (scene, world) = (&mut self.scene, &mut self.world);
            scene.unload(world);
            self.world.clear();
            self.is_loaded = false;
        }
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingScene {
        spawn_count: usize,
        updates: u32,
    }

    impl Scene for CountingScene {
        fn load(&mut self, world: &mut SceneWorld) {
            for _ in 0..self.spawn_count {
                world.spawn(Transform::default(), "test");
            }
        }

        fn update(&mut self, _fixed_dt_seconds: f32, _world: &mut SceneWorld) -> SceneCommand {
            self.updates += 1;
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    #[test]
    fn spawn_is_deferred_until_apply_pending() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), "crate");
        assert!(world.find_entity(id).is_none());
        world.apply_pending();
        assert!(world.find_entity(id).is_some());
    }

    #[test]
    fn despawn_of_unknown_entity_returns_false() {
        let mut world = SceneWorld::default();
        assert!(!world.despawn(EntityId(42)));
    }

    #[test]
    fn despawn_removes_after_apply() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), "crate");
        world.apply_pending();
        assert!(world.despawn(id));
        assert!(world.find_entity(id).is_some());
        world.apply_pending();
        assert!(world.find_entity(id).is_none());
    }

    #[test]
    fn despawn_of_pending_spawn_never_lands() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), "crate");
        assert!(world.despawn(id));
        world.apply_pending();
        assert!(world.find_entity(id).is_none());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn apply_pending_lands_every_queued_spawn() {
        let mut world = SceneWorld::default();
        let a = world.spawn(Transform::default(), "a");
        let b = world.spawn(Transform::default(), "b");
        world.apply_pending();
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.find_entity(a).expect("a").debug_name, "a");
        assert_eq!(world.find_entity(b).expect("b").debug_name, "b");
    }

    #[test]
    fn new_entities_start_with_movement_enabled() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), "player");
        world.apply_pending();
        assert!(world.find_entity(id).expect("player").movement_enabled);
    }

    #[test]
    fn runtime_load_applies_pending_and_update_advances_clock() {
        let mut runtime = SceneRuntime::new(Box::new(CountingScene {
            spawn_count: 3,
            updates: 0,
        }));
        runtime.load();
        runtime.load();
        assert_eq!(runtime.world().entity_count(), 3);
        assert_eq!(runtime.update(0.5), SceneCommand::None);
        assert!((runtime.world().elapsed_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn shutdown_clears_world() {
        let mut runtime = SceneRuntime::new(Box::new(CountingScene {
            spawn_count: 2,
            updates: 0,
        }));
        runtime.load();
        runtime.shutdown();
        assert_eq!(runtime.world().entity_count(), 0);
    }

    #[test]
    fn transform_pose_round_trip_keeps_yaw() {
        let pose = Pose {
            position: Vec3::new(1.0, 2.0, 3.0),
            yaw_degrees: 90.0,
        };
        assert_eq!(Transform::from_pose(pose).pose(), pose);
    }
}
