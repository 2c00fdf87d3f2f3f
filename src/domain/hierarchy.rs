//! Manager-chain walks over the account forest.

use std::collections::HashMap;

use super::AccountId;

/// Returns true if making `proposed_manager` the manager of `id` would close
/// a loop in the manager relation.
///
/// Walks upward from `proposed_manager` using `manager_of`. The walk is
/// capped at `bound` steps (normally the number of stored records): a chain
/// longer than that can only exist if the stored graph is already cyclic,
/// and is reported as a cycle.
pub fn would_create_cycle<F>(
    id: AccountId,
    proposed_manager: AccountId,
    bound: usize,
    mut manager_of: F,
) -> bool
where
    F: FnMut(AccountId) -> Option<AccountId>,
{
    let mut current = proposed_manager;
    let mut steps = 0usize;

    loop {
        if current == id {
            return true;
        }

        steps += 1;
        if steps > bound {
            return true;
        }

        match manager_of(current) {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// A consistent copy of every `id -> manager_id` edge, taken while the
/// directory write gate is held.
#[derive(Debug, Clone, Default)]
pub struct ManagerGraph {
    edges: HashMap<AccountId, Option<AccountId>>,
}

impl ManagerGraph {
    pub fn from_edges(edges: impl IntoIterator<Item = (AccountId, Option<AccountId>)>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, id: AccountId) -> bool {
        self.edges.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn manager_of(&self, id: AccountId) -> Option<AccountId> {
        self.edges.get(&id).copied().flatten()
    }

    #[must_use]
    pub fn would_create_cycle(&self, id: AccountId, proposed_manager: AccountId) -> bool {
        would_create_cycle(id, proposed_manager, self.len(), |current| {
            self.manager_of(current)
        })
    }

    /// The chain of managers above `id`, nearest first. Stops early if an id
    /// repeats.
    #[must_use]
    pub fn chain_of(&self, id: AccountId) -> Vec<AccountId> {
        let mut chain = Vec::new();
        let mut current = self.manager_of(id);

        while let Some(manager) = current {
            if manager == id || chain.contains(&manager) || chain.len() >= self.len() {
                break;
            }
            chain.push(manager);
            current = self.manager_of(manager);
        }

        chain
    }
}
