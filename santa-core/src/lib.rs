use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type GroupId = i64;
pub type UserId = i64;

/// Sentinel shown until the organizer fills in a config field.
pub const CONFIG_UNSET: &str = "Not set";
/// Sentinel shown until a participant submits a wishlist.
pub const WISHLIST_UNSET: &str = "No wishlist provided yet.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventConfig {
    pub budget: String,
    pub rules: String,
    pub deadline: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            budget: CONFIG_UNSET.to_string(),
            rules: CONFIG_UNSET.to_string(),
            deadline: CONFIG_UNSET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Budget,
    Rules,
    Deadline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub username: Option<String>,
    pub wishlist: String,
}

impl Participant {
    pub fn new(name: impl Into<String>, username: Option<String>) -> Self {
        Self {
            name: name.into(),
            username,
            wishlist: WISHLIST_UNSET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub admin_id: UserId,
    pub status: EventStatus,
    pub config: EventConfig,
    pub users: HashMap<UserId, Participant>,
}

impl Event {
    pub fn new(admin_id: UserId) -> Self {
        Self {
            admin_id,
            status: EventStatus::Open,
            config: EventConfig::default(),
            users: HashMap::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, EventStatus::Open)
    }

    pub fn is_organizer(&self, user_id: UserId) -> bool {
        self.admin_id == user_id
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("no event exists for this group")]
    EventNotFound,
    #[error("event is closed")]
    EventClosed,
    #[error("user is not registered for this event")]
    NotRegistered,
    #[error("only the organizer may do that")]
    Forbidden,
    #[error("need at least two participants")]
    InsufficientParticipants,
}

/// One event per group, keyed by the group chat id. Serializes to the bare
/// map so the persisted file is `{"<group_id>": {...}, ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct EventStore {
    events: HashMap<GroupId, Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh open event for the group, replacing any previous one.
    pub fn create(&mut self, group_id: GroupId, admin_id: UserId) -> &Event {
        match self.events.entry(group_id) {
            Entry::Occupied(mut slot) => {
                slot.insert(Event::new(admin_id));
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(Event::new(admin_id)),
        }
    }

    pub fn get(&self, group_id: GroupId) -> Option<&Event> {
        self.events.get(&group_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn join(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        name: impl Into<String>,
        username: Option<String>,
    ) -> Result<(), EventError> {
        let event = self
            .events
            .get_mut(&group_id)
            .ok_or(EventError::EventNotFound)?;
        if !event.is_open() {
            return Err(EventError::EventClosed);
        }
        // Re-joining re-registers the user: a previously saved wishlist is reset.
        event.users.insert(user_id, Participant::new(name, username));
        Ok(())
    }

    pub fn set_wishlist(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        text: impl Into<String>,
    ) -> Result<(), EventError> {
        let event = self
            .events
            .get_mut(&group_id)
            .ok_or(EventError::EventNotFound)?;
        let user = event
            .users
            .get_mut(&user_id)
            .ok_or(EventError::NotRegistered)?;
        user.wishlist = text.into();
        Ok(())
    }

    pub fn set_config(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        field: ConfigField,
        value: impl Into<String>,
    ) -> Result<(), EventError> {
        let event = self
            .events
            .get_mut(&group_id)
            .ok_or(EventError::EventNotFound)?;
        if !event.is_organizer(user_id) {
            return Err(EventError::Forbidden);
        }
        let slot = match field {
            ConfigField::Budget => &mut event.config.budget,
            ConfigField::Rules => &mut event.config.rules,
            ConfigField::Deadline => &mut event.config.deadline,
        };
        *slot = value.into();
        Ok(())
    }

    /// Marks the event closed. Idempotent once closed.
    pub fn close(&mut self, group_id: GroupId) -> Result<(), EventError> {
        let event = self
            .events
            .get_mut(&group_id)
            .ok_or(EventError::EventNotFound)?;
        event.status = EventStatus::Closed;
        Ok(())
    }
}

/// Produces the giver → receiver pairs: the participants are shuffled, then
/// each one gifts to the next in the ring (the last gifts to the first).
/// Every id gives once and receives once, nobody draws themselves, and the
/// whole set forms a single cycle. Two participants degenerate to a swap.
pub fn assign<R: Rng>(
    participants: &[UserId],
    rng: &mut R,
) -> Result<Vec<(UserId, UserId)>, EventError> {
    if participants.len() < 2 {
        return Err(EventError::InsufficientParticipants);
    }

    let mut order = participants.to_vec();
    order.shuffle(rng);

    let pairs = (0..order.len())
        .map(|i| (order[i], order[(i + 1) % order.len()]))
        .collect();
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn store_with_event() -> EventStore {
        let mut store = EventStore::new();
        store.create(100, 1);
        store
    }

    #[test]
    fn create_initializes_open_and_empty() {
        let store = store_with_event();
        let event = store.get(100).unwrap();

        assert_eq!(event.status, EventStatus::Open);
        assert_eq!(event.admin_id, 1);
        assert!(event.users.is_empty());
        assert_eq!(event.config, EventConfig::default());
    }

    #[test]
    fn create_replaces_any_prior_event() {
        let mut store = store_with_event();
        store.join(100, 2, "Alice", None).unwrap();
        store
            .set_config(100, 1, ConfigField::Budget, "$20")
            .unwrap();
        store.close(100).unwrap();

        let event = store.create(100, 5);

        assert_eq!(event.admin_id, 5);
        assert_eq!(event.status, EventStatus::Open);
        assert!(event.users.is_empty());
        assert_eq!(event.config.budget, CONFIG_UNSET);
    }

    #[test]
    fn join_unknown_group_fails() {
        let mut store = EventStore::new();
        let err = store.join(100, 2, "Alice", None).unwrap_err();
        assert_eq!(err, EventError::EventNotFound);
    }

    #[test]
    fn join_closed_event_fails_and_leaves_participants_unchanged() {
        let mut store = store_with_event();
        store.join(100, 2, "Alice", None).unwrap();
        store.close(100).unwrap();

        let err = store.join(100, 3, "Bob", None).unwrap_err();

        assert_eq!(err, EventError::EventClosed);
        let event = store.get(100).unwrap();
        assert_eq!(event.users.len(), 1);
        assert!(event.users.contains_key(&2));
    }

    #[test]
    fn rejoin_resets_wishlist() {
        let mut store = store_with_event();
        store.join(100, 2, "Alice", Some("alice".into())).unwrap();
        store.set_wishlist(100, 2, "warm socks").unwrap();

        store.join(100, 2, "Alice", Some("alice".into())).unwrap();

        let wishlist = &store.get(100).unwrap().users[&2].wishlist;
        assert_eq!(wishlist, WISHLIST_UNSET);
    }

    #[test]
    fn set_wishlist_requires_registration() {
        let mut store = store_with_event();

        assert_eq!(
            store.set_wishlist(999, 2, "anything").unwrap_err(),
            EventError::EventNotFound
        );
        assert_eq!(
            store.set_wishlist(100, 2, "anything").unwrap_err(),
            EventError::NotRegistered
        );

        store.join(100, 2, "Alice", None).unwrap();
        store.set_wishlist(100, 2, "a red scarf").unwrap();
        assert_eq!(store.get(100).unwrap().users[&2].wishlist, "a red scarf");
    }

    #[test]
    fn set_config_rejects_non_organizer() {
        let mut store = store_with_event();

        let err = store
            .set_config(100, 99, ConfigField::Budget, "$50")
            .unwrap_err();

        assert_eq!(err, EventError::Forbidden);
        assert_eq!(store.get(100).unwrap().config.budget, CONFIG_UNSET);
    }

    #[test]
    fn set_config_updates_each_field() {
        let mut store = store_with_event();

        store
            .set_config(100, 1, ConfigField::Budget, "$20")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Rules, "no gag gifts")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Deadline, "Dec 24")
            .unwrap();

        let config = &store.get(100).unwrap().config;
        assert_eq!(config.budget, "$20");
        assert_eq!(config.rules, "no gag gifts");
        assert_eq!(config.deadline, "Dec 24");
    }

    #[test]
    fn close_is_idempotent() {
        let mut store = store_with_event();

        store.close(100).unwrap();
        store.close(100).unwrap();

        assert_eq!(store.get(100).unwrap().status, EventStatus::Closed);
        assert_eq!(store.close(999).unwrap_err(), EventError::EventNotFound);
    }

    #[test]
    fn assign_rejects_fewer_than_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(
            assign(&[], &mut rng).unwrap_err(),
            EventError::InsufficientParticipants
        );
        assert_eq!(
            assign(&[7], &mut rng).unwrap_err(),
            EventError::InsufficientParticipants
        );
    }

    #[test]
    fn assign_two_participants_swap() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pairs = assign(&[2, 3], &mut rng).unwrap();

        let pairs: HashSet<_> = pairs.into_iter().collect();
        assert_eq!(pairs, HashSet::from([(2, 3), (3, 2)]));
    }

    #[test]
    fn assign_forms_a_single_covering_cycle() {
        let ids = [10, 20, 30, 40, 50];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pairs = assign(&ids, &mut rng).unwrap();

        assert_eq!(pairs.len(), ids.len());

        let givers: HashSet<_> = pairs.iter().map(|(g, _)| *g).collect();
        let receivers: HashSet<_> = pairs.iter().map(|(_, r)| *r).collect();
        let expected: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(givers, expected);
        assert_eq!(receivers, expected);
        assert!(pairs.iter().all(|(g, r)| g != r));

        // Following giver -> receiver from any start must visit everyone
        // exactly once before returning to the start.
        let next: HashMap<_, _> = pairs.iter().copied().collect();
        let start = pairs[0].0;
        let mut current = start;
        let mut seen = HashSet::new();
        for _ in 0..ids.len() {
            assert!(seen.insert(current));
            current = next[&current];
        }
        assert_eq!(current, start);
        assert_eq!(seen, expected);
    }

    #[test]
    fn assign_is_reproducible_for_a_seed() {
        let ids = [1, 2, 3, 4, 5, 6];

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let first = assign(&ids, &mut rng).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let second = assign(&ids, &mut rng).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn store_round_trips_through_json() {
        let mut store = EventStore::new();
        store.create(100, 1);
        store.join(100, 2, "Alice", Some("alice".into())).unwrap();
        store.join(100, 3, "Bob", None).unwrap();
        store.set_wishlist(100, 2, "warm socks").unwrap();
        store.set_wishlist(100, 3, "a chess set").unwrap();
        store
            .set_config(100, 1, ConfigField::Budget, "$20")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Rules, "no gag gifts")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Deadline, "Dec 24")
            .unwrap();

        let json = serde_json::to_string(&store).unwrap();
        let restored: EventStore = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, store);

        // Map keys are textual in the file but numeric ids in memory.
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let event = &value["100"];
        assert_eq!(event["admin_id"], 1);
        assert_eq!(event["status"], "open");
        assert_eq!(event["users"]["2"]["username"], "alice");
        assert_eq!(event["users"]["3"]["username"], serde_json::Value::Null);
    }

    #[test]
    fn full_exchange_scenario() {
        let mut store = EventStore::new();
        store.create(100, 1);
        store.join(100, 2, "Alice", Some("alice".into())).unwrap();
        store.join(100, 3, "Bob", Some("bob".into())).unwrap();
        store
            .set_config(100, 1, ConfigField::Budget, "$20")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Rules, "no gag gifts")
            .unwrap();
        store
            .set_config(100, 1, ConfigField::Deadline, "Dec 24")
            .unwrap();

        let mut ids: Vec<UserId> = store.get(100).unwrap().users.keys().copied().collect();
        ids.sort_unstable();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pairs = assign(&ids, &mut rng).unwrap();

        let pairs: HashSet<_> = pairs.into_iter().collect();
        assert_eq!(pairs, HashSet::from([(2, 3), (3, 2)]));

        store.close(100).unwrap();
        assert_eq!(store.get(100).unwrap().status, EventStatus::Closed);
    }
}
