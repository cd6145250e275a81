//! Shop purchases and job payouts.
//!
//! Purchases validate against the static catalog and mutate the buyer in
//! place. Jobs are deferred: `startJob` registers a pending entry here and
//! the caller schedules a timer; when the timer fires, the payout applies
//! only if the entry is still pending (the player can disconnect in the
//! meantime).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::entity::{Player, PlayerId};
use crate::store::EntityStore;

/// Balance a freshly joined player starts with.
pub const STARTING_BALANCE: u32 = 100;

/// Delay between `startJob` and its payout.
pub const JOB_DURATION: Duration = Duration::from_secs(8);

/// Credit for a completed job.
pub const JOB_REWARD: u32 = 100;

/// Purchase failures. `UnknownPlayer` is dropped by the router; the other
/// two surface as `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopError {
    UnknownPlayer,
    UnknownItem,
    InsufficientFunds,
}

impl ShopError {
    pub fn wire_message(self) -> Option<&'static str> {
        match self {
            ShopError::UnknownItem => Some("no item"),
            ShopError::InsufficientFunds => Some("insufficient"),
            ShopError::UnknownPlayer => None,
        }
    }
}

/// Validate and apply a purchase. Returns the updated player snapshot for
/// broadcast. On any failure the buyer is untouched.
pub fn purchase(
    store: &mut EntityStore,
    catalog: &Catalog,
    player: PlayerId,
    item_id: &str,
) -> Result<Player, ShopError> {
    let p = store.player_mut(player).ok_or(ShopError::UnknownPlayer)?;
    let item = catalog.get(item_id).ok_or(ShopError::UnknownItem)?;
    if p.money < item.price {
        return Err(ShopError::InsufficientFunds);
    }
    p.money -= item.price;
    p.clothing.set(item.slot, &item.color);
    Ok(p.clone())
}

/// Credit a finished job. `None` if the player is gone.
pub fn credit_job(store: &mut EntityStore, player: PlayerId) -> Option<Player> {
    let p = store.player_mut(player)?;
    p.money = p.money.saturating_add(JOB_REWARD);
    Some(p.clone())
}

/// Pending deferred jobs, keyed by player. Job ids are process-unique so a
/// stale timer can never match a newer job.
#[derive(Debug)]
pub struct JobBoard {
    pending: HashMap<PlayerId, HashSet<u64>>,
    next_id: u64,
}

impl JobBoard {
    pub fn new() -> Self {
        JobBoard {
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a job. The returned id is echoed back when the timer fires.
    pub fn begin(&mut self, player: PlayerId) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.entry(player).or_default().insert(id);
        id
    }

    /// Resolve a fired timer. True only if the job is still pending, i.e.
    /// the player did not disconnect in the meantime.
    pub fn complete(&mut self, player: PlayerId, job: u64) -> bool {
        let Some(jobs) = self.pending.get_mut(&player) else {
            return false;
        };
        let removed = jobs.remove(&job);
        if removed && jobs.is_empty() {
            self.pending.remove(&player);
        }
        removed
    }

    /// Drop every pending job for a departing player, so fired timers no-op
    /// and the map does not leak entries.
    pub fn forget(&mut self, player: PlayerId) {
        self.pending.remove(&player);
    }

    pub fn pending_count(&self, player: PlayerId) -> usize {
        self.pending.get(&player).map(|jobs| jobs.len()).unwrap_or(0)
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn store_with_player(money: u32) -> EntityStore {
        let mut store = EntityStore::new();
        store.upsert_player(Player::new(
            PlayerId(1),
            "Ada".to_string(),
            Vec2::ZERO,
            money,
        ));
        store
    }

    #[test]
    fn purchase_debits_and_dresses() {
        let mut store = store_with_player(STARTING_BALANCE);
        let catalog = Catalog::standard();

        let p = purchase(&mut store, &catalog, PlayerId(1), "shirt-red").unwrap();
        assert_eq!(p.money, 50);
        assert_eq!(p.clothing.shirt, "#e05a44");
    }

    #[test]
    fn purchase_sequence_until_broke() {
        let mut store = store_with_player(STARTING_BALANCE);
        let catalog = Catalog::standard();

        purchase(&mut store, &catalog, PlayerId(1), "shirt-red").unwrap();
        let p = purchase(&mut store, &catalog, PlayerId(1), "pants-blue").unwrap();
        assert_eq!(p.money, 10);

        let err = purchase(&mut store, &catalog, PlayerId(1), "pants-blue").unwrap_err();
        assert_eq!(err, ShopError::InsufficientFunds);
        assert_eq!(store.player(PlayerId(1)).unwrap().money, 10);
    }

    #[test]
    fn failed_purchase_leaves_player_untouched() {
        let mut store = store_with_player(20);
        let catalog = Catalog::standard();
        let before = store.player(PlayerId(1)).unwrap().clone();

        assert_eq!(
            purchase(&mut store, &catalog, PlayerId(1), "pants-blue"),
            Err(ShopError::InsufficientFunds)
        );
        assert_eq!(
            purchase(&mut store, &catalog, PlayerId(1), "crown-gold"),
            Err(ShopError::UnknownItem)
        );
        assert_eq!(store.player(PlayerId(1)).unwrap(), &before);
    }

    #[test]
    fn purchase_without_player_is_unknown_player() {
        let mut store = EntityStore::new();
        let catalog = Catalog::standard();
        assert_eq!(
            purchase(&mut store, &catalog, PlayerId(9), "shirt-red"),
            Err(ShopError::UnknownPlayer)
        );
    }

    #[test]
    fn credit_job_adds_reward() {
        let mut store = store_with_player(10);
        let p = credit_job(&mut store, PlayerId(1)).unwrap();
        assert_eq!(p.money, 10 + JOB_REWARD);
        assert!(credit_job(&mut store, PlayerId(2)).is_none());
    }

    #[test]
    fn job_board_completes_exactly_once() {
        let mut board = JobBoard::new();
        let job = board.begin(PlayerId(1));
        assert_eq!(board.pending_count(PlayerId(1)), 1);

        assert!(board.complete(PlayerId(1), job));
        assert!(!board.complete(PlayerId(1), job));
        assert_eq!(board.pending_count(PlayerId(1)), 0);
    }

    #[test]
    fn job_board_keeps_other_pending_jobs() {
        let mut board = JobBoard::new();
        let first = board.begin(PlayerId(1));
        let second = board.begin(PlayerId(1));

        assert!(board.complete(PlayerId(1), first));
        assert_eq!(board.pending_count(PlayerId(1)), 1);

        assert!(board.complete(PlayerId(1), second));
        assert_eq!(board.pending_count(PlayerId(1)), 0);
    }

    #[test]
    fn job_board_forget_discards_pending() {
        let mut board = JobBoard::new();
        let job = board.begin(PlayerId(1));
        board.begin(PlayerId(1));
        board.forget(PlayerId(1));

        assert!(!board.complete(PlayerId(1), job));
        assert_eq!(board.pending_count(PlayerId(1)), 0);
    }

    #[test]
    fn job_ids_are_unique_across_players() {
        let mut board = JobBoard::new();
        let a = board.begin(PlayerId(1));
        let b = board.begin(PlayerId(2));
        let c = board.begin(PlayerId(1));
        assert!(a != b && b != c && a != c);
    }
}
