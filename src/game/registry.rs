//! Game code -> instance mapping with capacity-based matchmaking

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use tokio::sync::broadcast;
use tracing::info;

use crate::ws::protocol::ServerMsg;

use super::instance::{GameConfig, GameInstance};
use super::snapshot::{PlayerState, WorldBounds};
use super::{GameId, PlayerId};

pub const GAME_ID_LEN: usize = 4;
const GAME_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Outbound messages buffered per game before slow receivers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Player {0} could not be placed")]
    SpawnFailed(PlayerId),
}

/// A live game: its instance plus the channel its participants listen on
pub struct GameEntry {
    pub id: GameId,
    instance: Mutex<GameInstance>,
    events: broadcast::Sender<ServerMsg>,
    closed: AtomicBool,
}

impl GameEntry {
    fn new(id: GameId, instance: GameInstance) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id,
            instance: Mutex::new(instance),
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, GameInstance> {
        self.instance.lock()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events.subscribe()
    }

    /// Send to every subscriber; having none is not an error
    pub fn broadcast(&self, msg: ServerMsg) {
        let _ = self.events.send(msg);
    }

    pub fn player_count(&self) -> usize {
        self.lock().player_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Where matchmaking placed a request
#[derive(Clone)]
pub struct Placement {
    pub entry: Arc<GameEntry>,
    /// True when the game did not exist before this call
    pub created: bool,
}

/// Everything a session needs after a successful join
pub struct JoinOutcome {
    pub game_id: GameId,
    pub entry: Arc<GameEntry>,
    pub created: bool,
    pub player: PlayerState,
    /// States of the players already in the game
    pub existing_players: Vec<PlayerState>,
    pub world_bounds: WorldBounds,
    /// Game broadcasts, subscribed before the join was announced
    pub events: broadcast::Receiver<ServerMsg>,
}

/// Result of a player leaving
pub struct Departure {
    /// True when the game emptied and was removed
    pub torn_down: bool,
}

pub struct GameRegistry {
    games: Mutex<HashMap<GameId, Arc<GameEntry>>>,
    capacity: usize,
    game_config: GameConfig,
}

impl GameRegistry {
    pub fn new(capacity: usize, game_config: GameConfig) -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
            capacity,
            game_config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &str) -> Option<Arc<GameEntry>> {
        self.games.lock().get(id).cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.games.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.games.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.games.lock().is_empty()
    }

    pub fn total_players(&self) -> usize {
        self.games.lock().values().map(|g| g.player_count()).sum()
    }

    /// First game below capacity in id order, or a new one
    pub fn find_or_create_game(&self) -> Placement {
        let mut games = self.games.lock();
        self.find_or_create_locked(&mut games)
    }

    fn find_or_create_locked(&self, games: &mut HashMap<GameId, Arc<GameEntry>>) -> Placement {
        let mut ids: Vec<&GameId> = games.keys().collect();
        ids.sort();
        let open = ids
            .into_iter()
            .filter_map(|id| games.get(id))
            .find(|entry| entry.player_count() < self.capacity)
            .cloned();

        if let Some(entry) = open {
            return Placement {
                entry,
                created: false,
            };
        }

        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = random_game_id(&mut rng);
            if !games.contains_key(&candidate) {
                break candidate;
            }
        };

        let instance = GameInstance::new(self.game_config, rng.gen());
        let entry = Arc::new(GameEntry::new(id.clone(), instance));
        games.insert(id.clone(), entry.clone());
        info!(game_id = %id, "Game created");

        Placement {
            entry,
            created: true,
        }
    }

    /// Place a player in the requested game, or matchmake when none is given.
    /// Runs under the registry lock so concurrent joins see each other's players:
    /// the joiner subscribes before the join is broadcast, and every later joiner
    /// is announced on that subscription.
    pub fn join(
        &self,
        player_id: PlayerId,
        requested: Option<&str>,
    ) -> Result<JoinOutcome, RegistryError> {
        let mut games = self.games.lock();

        let Placement { entry, created } = match requested {
            Some(id) => Placement {
                entry: games
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RegistryError::GameNotFound(id.to_string()))?,
                created: false,
            },
            None => self.find_or_create_locked(&mut games),
        };

        let mut game = entry.lock();
        let existing_players: Vec<PlayerState> = game
            .player_states()
            .into_iter()
            .filter(|p| p.id != player_id)
            .collect();
        let player = game
            .add_player(player_id)
            .ok_or(RegistryError::SpawnFailed(player_id))?;
        let world_bounds = game.world_bounds();
        drop(game);

        let events = entry.subscribe();
        entry.broadcast(ServerMsg::PlayerJoined {
            player: player.clone(),
        });
        info!(game_id = %entry.id, player_id = %player_id, "Player joined game");

        Ok(JoinOutcome {
            game_id: entry.id.clone(),
            entry,
            created,
            player,
            existing_players,
            world_bounds,
            events,
        })
    }

    /// Remove a player, tearing the game down once it is empty.
    /// Remaining players are told through the game broadcast.
    /// Returns None if the player was not in that game.
    pub fn leave(&self, game_id: &str, player_id: &PlayerId) -> Option<Departure> {
        let mut games = self.games.lock();
        let entry = games.get(game_id)?.clone();

        let remaining = {
            let mut game = entry.lock();
            if !game.remove_player(player_id) {
                return None;
            }
            game.player_count()
        };
        info!(game_id = %game_id, player_id = %player_id, remaining, "Player left game");

        let torn_down = remaining == 0;
        if torn_down {
            games.remove(game_id);
            entry.close();
            info!(game_id = %game_id, "Game removed");
        } else {
            entry.broadcast(ServerMsg::PlayerLeft { id: *player_id });
        }

        Some(Departure { torn_down })
    }

    /// Delete a game that has no players. Returns true if it was removed.
    pub fn remove_if_empty(&self, game_id: &str) -> bool {
        let mut games = self.games.lock();
        let empty = games
            .get(game_id)
            .is_some_and(|entry| entry.player_count() == 0);

        if empty {
            if let Some(entry) = games.remove(game_id) {
                entry.close();
                info!(game_id = %game_id, "Empty game removed");
            }
        }
        empty
    }
}

fn random_game_id(rng: &mut impl Rng) -> GameId {
    (0..GAME_ID_LEN)
        .map(|_| GAME_ID_ALPHABET[rng.gen_range(0..GAME_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::food::FoodTargets;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn registry(capacity: usize) -> GameRegistry {
        GameRegistry::new(
            capacity,
            GameConfig {
                food_targets: FoodTargets {
                    square: 5,
                    triangle: 2,
                    pentagon: 1,
                },
                ..GameConfig::default()
            },
        )
    }

    #[test]
    fn test_game_ids_use_short_alphabet() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..100 {
            let id = random_game_id(&mut rng);
            assert_eq!(id.len(), GAME_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_full_game_routes_to_a_new_one() {
        let registry = registry(10);
        let first = registry.find_or_create_game();
        assert!(first.created);
        let game_id = first.entry.id.clone();

        for _ in 0..10 {
            let outcome = registry.join(Uuid::new_v4(), None).unwrap();
            assert_eq!(outcome.game_id, game_id);
        }
        assert_eq!(first.entry.player_count(), 10);

        let next = registry.find_or_create_game();
        assert!(next.created);
        assert_ne!(next.entry.id, game_id);
        assert!(next.entry.player_count() < registry.capacity());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_find_reuses_open_game() {
        let registry = registry(10);
        let created = registry.find_or_create_game();
        let again = registry.find_or_create_game();
        assert!(!again.created);
        assert_eq!(again.entry.id, created.entry.id);
    }

    #[test]
    fn test_join_reports_existing_players() {
        let registry = registry(10);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = registry.join(a, None).unwrap();
        assert!(first.created);
        assert!(first.existing_players.is_empty());
        assert_eq!(first.player.id, a);
        assert_eq!(first.world_bounds, WorldBounds { width: 2000.0, height: 2000.0 });

        let second = registry.join(b, Some(first.game_id.as_str())).unwrap();
        assert!(!second.created);
        assert_eq!(second.existing_players.len(), 1);
        assert_eq!(second.existing_players[0].id, a);
        assert_eq!(registry.total_players(), 2);
    }

    #[test]
    fn test_join_subscribes_before_announcing() {
        let registry = registry(10);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut first = registry.join(a, None).unwrap();
        let mut second = registry.join(b, Some(first.game_id.as_str())).unwrap();

        let announced: Vec<PlayerId> = std::iter::from_fn(|| match first.events.try_recv() {
            Ok(ServerMsg::PlayerJoined { player }) => Some(player.id),
            _ => None,
        })
        .collect();
        assert_eq!(announced, vec![a, b]);

        match second.events.try_recv() {
            Ok(ServerMsg::PlayerJoined { player }) => assert_eq!(player.id, b),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(second.events.try_recv().is_err());
    }

    #[test]
    fn test_leave_announces_to_remaining_players() {
        let registry = registry(10);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let joined = registry.join(a, None).unwrap();
        registry.join(b, Some(joined.game_id.as_str())).unwrap();
        let mut rx = joined.entry.subscribe();

        registry.leave(&joined.game_id, &b).unwrap();
        match rx.try_recv() {
            Ok(ServerMsg::PlayerLeft { id }) => assert_eq!(id, b),
            other => panic!("unexpected: {other:?}"),
        }

        let departure = registry.leave(&joined.game_id, &a).unwrap();
        assert!(departure.torn_down);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_join_unknown_game_fails() {
        let registry = registry(10);
        let result = registry.join(Uuid::new_v4(), Some("NOPE"));
        assert_eq!(
            result.err(),
            Some(RegistryError::GameNotFound("NOPE".to_string()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_join_by_id_may_exceed_capacity() {
        let registry = registry(1);
        let first = registry.join(Uuid::new_v4(), None).unwrap();
        let second = registry.join(Uuid::new_v4(), Some(first.game_id.as_str())).unwrap();
        assert_eq!(second.game_id, first.game_id);
        assert_eq!(first.entry.player_count(), 2);
    }

    #[test]
    fn test_last_leave_tears_down_once() {
        let registry = registry(10);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let joined = registry.join(a, None).unwrap();
        registry.join(b, Some(joined.game_id.as_str())).unwrap();

        let departure = registry.leave(&joined.game_id, &a).unwrap();
        assert!(!departure.torn_down);
        assert!(registry.contains(&joined.game_id));

        let departure = registry.leave(&joined.game_id, &b).unwrap();
        assert!(departure.torn_down);
        assert!(joined.entry.is_closed());
        assert!(!registry.contains(&joined.game_id));

        assert!(registry.leave(&joined.game_id, &b).is_none());
        assert!(registry.leave(&joined.game_id, &a).is_none());
    }

    #[test]
    fn test_leave_unknown_player_keeps_game() {
        let registry = registry(10);
        let joined = registry.join(Uuid::new_v4(), None).unwrap();
        assert!(registry.leave(&joined.game_id, &Uuid::new_v4()).is_none());
        assert!(registry.contains(&joined.game_id));
    }

    #[test]
    fn test_remove_if_empty() {
        let registry = registry(10);
        let placement = registry.find_or_create_game();
        let joined = registry.join(Uuid::new_v4(), None).unwrap();
        assert_eq!(joined.game_id, placement.entry.id);

        assert!(!registry.remove_if_empty(&joined.game_id));
        registry.leave(&joined.game_id, &joined.player.id);
        assert!(!registry.remove_if_empty(&joined.game_id));

        let idle = registry.find_or_create_game();
        assert!(registry.remove_if_empty(&idle.entry.id));
        assert!(idle.entry.is_closed());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let registry = registry(10);
        let placement = registry.find_or_create_game();
        let mut rx = placement.entry.subscribe();
        let id = Uuid::new_v4();

        placement.entry.broadcast(ServerMsg::PlayerLeft { id });

        match rx.try_recv() {
            Ok(ServerMsg::PlayerLeft { id: left }) => assert_eq!(left, id),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
