use std::collections::HashMap;

use crate::app::Pose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HazardDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardKind {
    Gas,
    Water,
}

impl HazardKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Gas => "gas",
            Self::Water => "water",
        }
    }
}

/// Inventory capability that suppresses a hazard's damage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImmunityRule {
    #[default]
    None,
    GasMask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDef {
    pub id: PlayerDefId,
    pub def_name: String,
    pub label: String,
    pub max_health: u32,
    pub spawn: Option<Pose>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardDef {
    pub id: HazardDefId,
    pub def_name: String,
    pub label: String,
    pub kind: HazardKind,
    pub damage_per_tick: u32,
    pub tick_interval_seconds: f32,
    pub immunity: ImmunityRule,
    pub overlay: bool,
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    player_defs: Vec<PlayerDef>,
    player_ids_by_name: HashMap<String, PlayerDefId>,
    hazard_defs: Vec<HazardDef>,
    hazard_ids_by_name: HashMap<String, HazardDefId>,
}

impl DefDatabase {
    /// Ids are assigned by position, so callers must pass defs in a stable
    /// order.
    pub fn from_defs(mut player_defs: Vec<PlayerDef>, mut hazard_defs: Vec<HazardDef>) -> Self {
        let mut player_ids_by_name = HashMap::with_capacity(player_defs.len());
        for (idx, def) in player_defs.iter_mut().enumerate() {
            let id = PlayerDefId(idx as u32);
            def.id = id;
            player_ids_by_name.insert(def.def_name.clone(), id);
        }
        let mut hazard_ids_by_name = HashMap::with_capacity(hazard_defs.len());
        for (idx, def) in hazard_defs.iter_mut().enumerate() {
            let id = HazardDefId(idx as u32);
            def.id = id;
            hazard_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            player_defs,
            player_ids_by_name,
            hazard_defs,
            hazard_ids_by_name,
        }
    }

    pub fn player_def_id_by_name(&self, name: &str) -> Option<PlayerDefId> {
        self.player_ids_by_name.get(name).copied()
    }

    pub fn player_def(&self, id: PlayerDefId) -> Option<&PlayerDef> {
        self.player_defs.get(id.0 as usize)
    }

    pub fn player_def_by_name(&self, name: &str) -> Option<&PlayerDef> {
        self.player_def_id_by_name(name)
            .and_then(|id| self.player_def(id))
    }

    pub fn hazard_def_id_by_name(&self, name: &str) -> Option<HazardDefId> {
        self.hazard_ids_by_name.get(name).copied()
    }

    pub fn hazard_def(&self, id: HazardDefId) -> Option<&HazardDef> {
        self.hazard_defs.get(id.0 as usize)
    }

    pub fn hazard_def_by_name(&self, name: &str) -> Option<&HazardDef> {
        self.hazard_def_id_by_name(name)
            .and_then(|id| self.hazard_def(id))
    }

    pub fn player_defs(&self) -> &[PlayerDef] {
        &self.player_defs
    }

    pub fn hazard_defs(&self) -> &[HazardDef] {
        &self.hazard_defs
    }
}
