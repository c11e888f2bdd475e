use std::collections::HashSet;

use crate::entity::{EntityId, PeerId};

/// Tracks which entities the local peer is authoritative for.
///
/// Populated only by local creation (spawn/fire). Inbound messages never add
/// entries here; they only ever create mirrors in the world.
#[derive(Debug, Clone)]
pub struct OwnershipRegistry {
    local: PeerId,
    owned: HashSet<EntityId>,
    next_seq: u64,
}

impl OwnershipRegistry {
    /// Create a registry for `local`, which always owns its own avatar.
    pub fn new(local: impl Into<PeerId>) -> Self {
        let local = local.into();
        let mut owned = HashSet::new();
        owned.insert(EntityId::avatar(local.clone()));
        Self {
            local,
            owned,
            next_seq: EntityId::AVATAR_SEQ + 1,
        }
    }

    pub fn local_peer(&self) -> &str {
        &self.local
    }

    /// Mint a fresh id for a locally created entity and take ownership of it.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId::new(self.local.clone(), self.next_seq);
        self.next_seq += 1;
        self.owned.insert(id.clone());
        id
    }

    pub fn is_owned(&self, id: &EntityId) -> bool {
        self.owned.contains(id)
    }

    pub fn owner_of<'a>(&self, id: &'a EntityId) -> &'a str {
        &id.owner
    }

    /// Drop ownership of a destroyed entity. The id is never handed out again.
    pub fn release(&mut self, id: &EntityId) -> bool {
        if id.is_avatar() {
            return false;
        }
        self.owned.remove(id)
    }

    /// Number of owned entities excluding the avatar.
    pub fn owned_entity_count(&self) -> usize {
        self.owned.len() - 1
    }
}
