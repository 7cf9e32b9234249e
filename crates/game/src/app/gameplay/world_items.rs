#[derive(Debug, Clone, PartialEq)]
struct Pickup {
    name: String,
    kind: PickupKind,
    position: Vec3,
    consumed: bool,
}

impl Pickup {
    fn new(name: &str, kind: PickupKind, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            kind,
            position,
            consumed: false,
        }
    }

    fn volume(&self) -> TriggerVolume {
        TriggerVolume::new(
            self.position,
            Vec3::new(PICKUP_RADIUS_UNITS, PICKUP_RADIUS_UNITS, PICKUP_RADIUS_UNITS),
        )
    }

    /// Applies the pickup once. Later calls return `None`.
    fn collect(&mut self, inventory: &mut InventoryState, purse: &mut CoinPurse) -> Option<PickupKind> {
        if self.consumed {
            return None;
        }
        self.consumed = true;
        match self.kind {
            PickupKind::Coin => {
                purse.collect();
            }
            PickupKind::Keycard => {
                inventory.give_keycard();
            }
            PickupKind::GasMask => {
                inventory.give_gas_mask();
            }
        }
        Some(self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DoorOutcome {
    Opened,
    AlreadyOpen,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LockedDoor {
    name: String,
    requires_keycard: bool,
    open: bool,
}

impl LockedDoor {
    fn new(name: &str, requires_keycard: bool) -> Self {
        Self {
            name: name.to_string(),
            requires_keycard,
            open: false,
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn try_open(&mut self, inventory: &InventoryState) -> DoorOutcome {
        if self.open {
            return DoorOutcome::AlreadyOpen;
        }
        if self.requires_keycard && !inventory.has_keycard() {
            return DoorOutcome::Locked;
        }
        self.open = true;
        DoorOutcome::Opened
    }
}
