//! Page-granular strict two-phase locking with deadlock detection.

use crate::transaction::TransactionId;
use crate::PageId;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};

/// The two lock modes on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub enum LockError {
    /// The requester was chosen as a deadlock victim and must roll back.
    Aborted,
}

/// The lock table and the waits-for graph, guarded together by one
/// mutex so that grant checks, edge updates and cycle detection are a
/// single atomic step.
#[derive(Debug, Default)]
struct LockTable {
    /// For every locked page, the holders and their modes. Either every
    /// entry is `Shared`, or there is exactly one `Exclusive` entry.
    locks: HashMap<PageId, HashMap<TransactionId, LockMode>>,
    /// Maps a blocked transaction to the transactions it waits on.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTable {
    fn can_grant(&self, pid: PageId, tid: TransactionId, mode: LockMode) -> bool {
        let Some(holders) = self.locks.get(&pid) else {
            return true;
        };
        if holders.is_empty() {
            return true;
        }
        // A sole holder may re-acquire, upgrade or downgrade freely.
        if holders.len() == 1 && holders.contains_key(&tid) {
            return true;
        }
        match mode {
            LockMode::Shared => holders.values().all(|&m| m == LockMode::Shared),
            LockMode::Exclusive => false,
        }
    }

    /// The holders standing between `tid` and its requested mode. For an
    /// exclusive request (including an upgrade) that is every other
    /// holder; for a shared request, only exclusive holders.
    fn blockers(&self, pid: PageId, tid: TransactionId, mode: LockMode) -> HashSet<TransactionId> {
        let mut blockers = HashSet::new();
        if let Some(holders) = self.locks.get(&pid) {
            for (&holder, &held) in holders {
                if holder == tid {
                    continue;
                }
                let conflict = match mode {
                    LockMode::Exclusive => true,
                    LockMode::Shared => held == LockMode::Exclusive,
                };
                if conflict {
                    blockers.insert(holder);
                }
            }
        }
        blockers
    }

    fn cycle_from(&self, start: TransactionId) -> bool {
        fn dfs(
            graph: &HashMap<TransactionId, HashSet<TransactionId>>,
            node: TransactionId,
            visited: &mut HashSet<TransactionId>,
            stack: &mut HashSet<TransactionId>,
        ) -> bool {
            if !visited.insert(node) {
                return false;
            }
            stack.insert(node);
            if let Some(next_nodes) = graph.get(&node) {
                for &next in next_nodes {
                    if stack.contains(&next) {
                        return true;
                    }
                    if !visited.contains(&next) && dfs(graph, next, visited, stack) {
                        return true;
                    }
                }
            }
            stack.remove(&node);
            false
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        dfs(&self.waits_for, start, &mut visited, &mut stack)
    }

    fn remove_edges_of(&mut self, tid: TransactionId) {
        self.waits_for.remove(&tid);
        for waiting_on in self.waits_for.values_mut() {
            waiting_on.remove(&tid);
        }
    }
}

/// The main lock manager struct.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
    /// Waiters park here; every release broadcasts so each can re-check
    /// the grant predicate.
    cvar: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `mode` can be granted to `tid` on `pid`, or fails
    /// with `Aborted` when granting would close a cycle in the waits-for
    /// graph.
    pub fn acquire_lock(
        &self,
        pid: PageId,
        tid: TransactionId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let mut table = self.table.lock().unwrap();
        loop {
            if table.can_grant(pid, tid, mode) {
                table.waits_for.remove(&tid);
                table.locks.entry(pid).or_default().insert(tid, mode);
                return Ok(());
            }

            let blockers = table.blockers(pid, tid, mode);
            table.waits_for.insert(tid, blockers);

            if table.cycle_from(tid) {
                crate::strata_debug_log!(
                    "[LockManager::acquire_lock] deadlock, aborting tx {:?} on {:?}",
                    tid,
                    pid
                );
                table.remove_edges_of(tid);
                self.cvar.notify_all();
                return Err(LockError::Aborted);
            }

            table = self.cvar.wait(table).unwrap();
            // Whatever ended the wait, this transaction is no longer
            // blocked until the next failed grant check.
            table.waits_for.remove(&tid);
        }
    }

    /// Drops `tid`'s lock on `pid`, if any, and wakes every waiter.
    pub fn release_lock(&self, pid: PageId, tid: TransactionId) {
        let mut table = self.table.lock().unwrap();
        if let Some(holders) = table.locks.get_mut(&pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                table.locks.remove(&pid);
            }
        }
        table.remove_edges_of(tid);
        self.cvar.notify_all();
    }

    pub fn holds_lock(&self, pid: PageId, tid: TransactionId) -> bool {
        let table = self.table.lock().unwrap();
        table
            .locks
            .get(&pid)
            .map_or(false, |holders| holders.contains_key(&tid))
    }

    /// Every page on which `tid` currently has an entry.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock().unwrap();
        table
            .locks
            .iter()
            .filter(|(_, holders)| holders.contains_key(&tid))
            .map(|(&pid, _)| pid)
            .collect()
    }
}
