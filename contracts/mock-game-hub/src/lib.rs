#![no_std]

//! Stand-in for the shared Game Hub on local networks.
//!
//! Exposes the same `start_game` / `end_game` / `add_game` surface as the
//! testnet hub and keeps a record per session so a deployment can be
//! checked end to end without the real hub.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env, Vec,
};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum HubError {
    SessionNotFound = 1,
    SessionAlreadyEnded = 2,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameRecord {
    pub game_id: Address,
    pub player1: Address,
    pub player2: Address,
    pub player1_points: i128,
    pub player2_points: i128,
    pub ended: bool,
    pub player1_won: Option<bool>,
}

#[contracttype]
#[derive(Clone)]
enum HubKey {
    Session(u32),
    Games,
    StartCount,
    EndCount,
}

#[contractevent]
pub struct EvGameStarted {
    pub session_id: u32,
    pub game_id: Address,
}

#[contractevent]
pub struct EvGameEnded {
    pub session_id: u32,
    pub player1_won: bool,
}

#[contract]
pub struct MockGameHub;

#[contractimpl]
impl MockGameHub {
    pub fn start_game(
        env: Env,
        game_id: Address,
        session_id: u32,
        player1: Address,
        player2: Address,
        player1_points: i128,
        player2_points: i128,
    ) {
        let record = GameRecord {
            game_id: game_id.clone(),
            player1,
            player2,
            player1_points,
            player2_points,
            ended: false,
            player1_won: None,
        };
        env.storage().temporary().set(&HubKey::Session(session_id), &record);
        Self::bump(&env, HubKey::StartCount);

        EvGameStarted { session_id, game_id }.publish(&env);
    }

    pub fn end_game(env: Env, session_id: u32, player1_won: bool) -> Result<(), HubError> {
        let key = HubKey::Session(session_id);
        let mut record: GameRecord = env
            .storage()
            .temporary()
            .get(&key)
            .ok_or(HubError::SessionNotFound)?;
        if record.ended {
            return Err(HubError::SessionAlreadyEnded);
        }
        record.ended = true;
        record.player1_won = Some(player1_won);
        env.storage().temporary().set(&key, &record);
        Self::bump(&env, HubKey::EndCount);

        EvGameEnded {
            session_id,
            player1_won,
        }
        .publish(&env);
        Ok(())
    }

    /// Whitelist a game contract. The real hub gates `start_game` on this;
    /// the mock only remembers the list.
    pub fn add_game(env: Env, game_address: Address) {
        let mut games: Vec<Address> = env
            .storage()
            .instance()
            .get(&HubKey::Games)
            .unwrap_or_else(|| Vec::new(&env));
        if !games.contains(&game_address) {
            games.push_back(game_address);
            env.storage().instance().set(&HubKey::Games, &games);
        }
    }

    pub fn get_game(env: Env, session_id: u32) -> Option<GameRecord> {
        env.storage().temporary().get(&HubKey::Session(session_id))
    }

    pub fn get_games(env: Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&HubKey::Games)
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn get_start_count(env: Env) -> u32 {
        env.storage().instance().get(&HubKey::StartCount).unwrap_or(0)
    }

    pub fn get_end_count(env: Env) -> u32 {
        env.storage().instance().get(&HubKey::EndCount).unwrap_or(0)
    }

    fn bump(env: &Env, key: HubKey) {
        let count: u32 = env.storage().instance().get(&key).unwrap_or(0);
        env.storage().instance().set(&key, &(count + 1));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::testutils::Address as _;

    fn setup() -> (Env, MockGameHubClient<'static>, Address, Address, Address) {
        let env = Env::default();
        let hub_id = env.register(MockGameHub, ());
        let client = MockGameHubClient::new(&env, &hub_id);
        let game = Address::generate(&env);
        let p1 = Address::generate(&env);
        let p2 = Address::generate(&env);
        (env, client, game, p1, p2)
    }

    #[test]
    fn test_start_then_end_records_result() {
        let (_env, client, game, p1, p2) = setup();
        client.start_game(&game, &7, &p1, &p2, &10, &20);

        let record = client.get_game(&7).unwrap();
        assert_eq!(record.player1, p1);
        assert_eq!(record.player2_points, 20);
        assert!(!record.ended);
        assert_eq!(client.get_start_count(), 1);

        client.end_game(&7, &false);
        let record = client.get_game(&7).unwrap();
        assert!(record.ended);
        assert_eq!(record.player1_won, Some(false));
        assert_eq!(client.get_end_count(), 1);
    }

    #[test]
    fn test_end_unknown_session_rejected() {
        let (_env, client, _game, _p1, _p2) = setup();
        let result = client.try_end_game(&99, &true);
        assert_eq!(result, Err(Ok(HubError::SessionNotFound)));
    }

    #[test]
    fn test_end_twice_rejected() {
        let (_env, client, game, p1, p2) = setup();
        client.start_game(&game, &1, &p1, &p2, &0, &0);
        client.end_game(&1, &true);
        let result = client.try_end_game(&1, &true);
        assert_eq!(result, Err(Ok(HubError::SessionAlreadyEnded)));
        assert_eq!(client.get_end_count(), 1);
    }

    #[test]
    fn test_add_game_is_idempotent() {
        let (_env, client, game, _p1, _p2) = setup();
        client.add_game(&game);
        client.add_game(&game);
        assert_eq!(client.get_games().len(), 1);
    }
}
