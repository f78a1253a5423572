#![no_std]

//! # The Farm: ZK Dungeon
//!
//! A two-player race up a ten-floor dungeon, wired to the Game Hub.
//!
//! ## Game flow
//! 1. Player 1 opens a lobby (`create_lobby`). Player 2 takes the second
//!    seat (`join_lobby`). Alternatively both sign one `start_game` call
//!    that opens a lobby with both seats filled.
//! 2. Each player registers a sigil commitment (`set_commit`). Once both
//!    are in, the hub is told the game started and both players stand on
//!    floor 1.
//! 3. Players answer the prompt of their current floor, either with a door
//!    proof checked by the verifier contract (`attempt_door`) or as a plain
//!    answer (`make_guess`). Both paths are graded against the same answer
//!    key. Each attempt carries a strictly sequential nonce; missed attempts
//!    are still logged.
//! 4. Floors 1 and 5 are gates: a player who clears one waits there until
//!    the opponent clears it too, then both step up together.
//! 5. The first player to clear floor 10 wins and the hub is told.
//!
//! ## Door proofs
//! `commit = keccak256(sigil_hash || blinding || player)`. A door proof
//! shows knowledge of the committed sigil for one exact
//! (lobby, floor, nonce, proof stack, choice) attempt. The proof makes the
//! answer attributable to the sigil holder; whether it is the right answer
//! is decided here. See the `door-verifier` contract for the layout.
//!
//! ## Lobby ids
//! `create_lobby` ids are ledger sequences. `start_game` ids are chosen by
//! the players and must carry [`TWO_PARTY_LOBBY_FLAG`], so the two spaces
//! never overlap.

mod floors;

pub use floors::{FloorInfo, ProofStack, GATE_FLOOR_1, GATE_FLOOR_5, MAX_FLOOR, OPTION_COUNT};

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, vec,
    Address, Bytes, BytesN, Env, IntoVal, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvLobbyCreated {
    pub lobby_id: u32,
    pub player1: Address,
}

#[contractevent]
pub struct EvLobbyJoined {
    pub lobby_id: u32,
    pub player2: Address,
}

#[contractevent]
pub struct EvLobbyCancelled {
    pub lobby_id: u32,
}

#[contractevent]
pub struct EvCommitSet {
    pub lobby_id: u32,
    pub player: Address,
}

#[contractevent]
pub struct EvRunStarted {
    pub lobby_id: u32,
    pub player1: Address,
    pub player2: Address,
}

/// Emitted for every accepted attempt, opened or not.
#[contractevent]
pub struct EvDoorAttempted {
    pub lobby_id: u32,
    pub player: Address,
    pub floor: u32,
    pub nonce: u32,
    pub opened: bool,
}

#[contractevent]
pub struct EvGateCleared {
    pub lobby_id: u32,
    pub player: Address,
    pub floor: u32,
}

#[contractevent]
pub struct EvFloorReached {
    pub lobby_id: u32,
    pub player: Address,
    pub floor: u32,
}

#[contractevent]
pub struct EvGameEnded {
    pub lobby_id: u32,
    pub winner: Address,
}

#[contractevent]
pub struct EvHubStartReported {
    pub lobby_id: u32,
    pub hub: Address,
}

#[contractevent]
pub struct EvHubEndReported {
    pub lobby_id: u32,
    pub hub: Address,
    pub player1_won: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  External trait interfaces
// ═══════════════════════════════════════════════════════════════════════════════

#[contractclient(name = "GameHubClient")]
pub trait GameHub {
    fn start_game(
        env: Env,
        game_id: Address,
        session_id: u32,
        player1: Address,
        player2: Address,
        player1_points: i128,
        player2_points: i128,
    );

    fn end_game(env: Env, session_id: u32, player1_won: bool);
}

/// Door proof verifier.
///
/// Public inputs:
///   [0..32)   sigil_hash
///   [32..64)  commit
///   [64..68)  lobby_id   : u32 big-endian
///   [68..72)  floor      : u32 big-endian
///   [72..76)  nonce      : u32 big-endian
///   [76..80)  stack_tag  : 4 bytes
///   [80..84)  choice     : u32 big-endian
///   [84..)    player     : address string bytes
///
/// Proof: blinding(32) || response(32)
#[contractclient(name = "DoorVerifierClient")]
pub trait DoorVerifier {
    fn verify(env: Env, public_inputs: Bytes, proof: Bytes) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum FarmError {
    LobbyNotFound = 1,
    LobbyInactive = 2,
    AlreadyJoined = 3,
    AlreadyCommitted = 4,
    NotPlayer = 5,
    WrongFloor = 6,
    BadNonce = 7,
    NotWaiting = 8,
    GameFinished = 9,
    MissingCommit = 10,
    LobbyExists = 11,
    SelfPlayNotAllowed = 12,
    GateAlreadyCleared = 13,
    InvalidChoice = 14,
    InvalidFloor = 15,
    GameNotFinished = 16,
    TimeoutNotReached = 17,
    TimeoutNotApplicable = 18,
    AdminNotSet = 19,
    GameHubNotSet = 20,
    VerifierNotSet = 21,
    InvalidLobbyId = 22,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Lobby state & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LobbyStatus {
    Waiting,
    Active,
    Finished,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerState {
    pub commit: Option<BytesN<32>>,
    pub floor: u32,
    pub last_nonce: u32,
    pub cleared_gate1: bool,
    pub cleared_gate5: bool,
    pub misses: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lobby {
    pub status: LobbyStatus,
    pub player1: Address,
    pub player2: Option<Address>,
    pub player1_points: i128,
    pub player2_points: i128,
    pub p1: PlayerState,
    pub p2: PlayerState,
    pub winner: Option<Address>,
    pub created_ledger: u32,
    /// Ledger after which `resolve_timeout` may settle an active run.
    pub deadline_ledger: Option<u32>,
}

/// Compact view for clients polling a lobby.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LobbyProgress {
    pub lobby_id: u32,
    pub status: LobbyStatus,
    pub p1_floor: u32,
    pub p2_floor: u32,
    pub p1_nonce: u32,
    pub p2_nonce: u32,
    pub winner: Option<Address>,
}

/// One finished run, from the owning player's side.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSummary {
    pub lobby_id: u32,
    pub opponent: Address,
    pub won: bool,
    pub floor_reached: u32,
    pub misses: u32,
    pub ledger: u32,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Lobby(u32),
    Admin,
    Hub,
    Verifier,
    PlayerHistory(Address),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

// Player slots
const PLAYER_1: u32 = 1;
const PLAYER_2: u32 = 2;

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// Inactivity window before a run can be settled: ~30 minutes
const TIMEOUT_MINUTES: u32 = 30;
const TIMEOUT_LEDGERS: u32 = TIMEOUT_MINUTES * 60 / LEDGER_RATE_SECS; // 360 ledgers

// Lobby TTL: 30 days
const LOBBY_TTL_SECONDS: u32 = 30 * 24 * 60 * 60;
const LOBBY_TTL_LEDGERS: u32 = LOBBY_TTL_SECONDS / LEDGER_RATE_SECS; // 518,400 ledgers

// History TTL: 120 days
const HISTORY_TTL_SECONDS: u32 = 120 * 24 * 60 * 60;
const HISTORY_TTL_LEDGERS: u32 = HISTORY_TTL_SECONDS / LEDGER_RATE_SECS; // 2,073,600 ledgers

/// Max run summaries kept per player (ring buffer)
const MAX_HISTORY_PER_PLAYER: u32 = 50;

/// High bit marking lobby ids opened through `start_game`.
pub const TWO_PARTY_LOBBY_FLAG: u32 = 1 << 31;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct TheFarmContract;

#[contractimpl]
impl TheFarmContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor & Lobby lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    pub fn __constructor(env: Env, admin: Address, game_hub: Address, verifier: Address) {
        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Hub, &game_hub);
        env.storage().instance().set(&DataKey::Verifier, &verifier);
    }

    /// Open a lobby. The lobby id is the current ledger sequence.
    pub fn create_lobby(env: Env, player1: Address) -> Result<u32, FarmError> {
        player1.require_auth();

        let lobby_id = env.ledger().sequence();
        if lobby_id & TWO_PARTY_LOBBY_FLAG != 0 {
            return Err(FarmError::InvalidLobbyId);
        }
        if env.storage().temporary().has(&DataKey::Lobby(lobby_id)) {
            return Err(FarmError::LobbyExists);
        }

        let lobby = Self::new_lobby(&env, player1.clone(), None, 0, 0);
        EvLobbyCreated { lobby_id, player1 }.publish(&env);

        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(lobby_id)
    }

    /// Open a lobby with both seats filled in one transaction. `lobby_id`
    /// must carry [`TWO_PARTY_LOBBY_FLAG`].
    ///
    /// Both players authorize `(lobby_id, points)` for their own seat, so the
    /// transaction carries two independently signed auth entries: player 1
    /// signs first and hands the entry to player 2, who signs and submits.
    pub fn start_game(
        env: Env,
        lobby_id: u32,
        player1: Address,
        player2: Address,
        player1_points: i128,
        player2_points: i128,
    ) -> Result<(), FarmError> {
        if player1 == player2 {
            return Err(FarmError::SelfPlayNotAllowed);
        }
        if lobby_id & TWO_PARTY_LOBBY_FLAG == 0 {
            return Err(FarmError::InvalidLobbyId);
        }

        player1.require_auth_for_args(vec![
            &env,
            lobby_id.into_val(&env),
            player1_points.into_val(&env),
        ]);
        player2.require_auth_for_args(vec![
            &env,
            lobby_id.into_val(&env),
            player2_points.into_val(&env),
        ]);

        if env.storage().temporary().has(&DataKey::Lobby(lobby_id)) {
            return Err(FarmError::LobbyExists);
        }

        let lobby = Self::new_lobby(
            &env,
            player1.clone(),
            Some(player2.clone()),
            player1_points,
            player2_points,
        );

        EvLobbyCreated { lobby_id, player1 }.publish(&env);
        EvLobbyJoined { lobby_id, player2 }.publish(&env);

        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(())
    }

    pub fn join_lobby(env: Env, lobby_id: u32, player2: Address) -> Result<(), FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        if lobby.status != LobbyStatus::Waiting {
            return Err(FarmError::NotWaiting);
        }
        player2.require_auth();
        if lobby.player2.is_some() || player2 == lobby.player1 {
            return Err(FarmError::AlreadyJoined);
        }

        lobby.player2 = Some(player2.clone());
        EvLobbyJoined { lobby_id, player2 }.publish(&env);

        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(())
    }

    /// Remove a lobby that never started. Only its creator may do this.
    pub fn cancel_lobby(env: Env, lobby_id: u32, player1: Address) -> Result<(), FarmError> {
        let lobby = Self::read_lobby(&env, lobby_id)?;
        if lobby.status != LobbyStatus::Waiting {
            return Err(FarmError::NotWaiting);
        }
        player1.require_auth();
        if player1 != lobby.player1 {
            return Err(FarmError::NotPlayer);
        }

        env.storage().temporary().remove(&DataKey::Lobby(lobby_id));
        EvLobbyCancelled { lobby_id }.publish(&env);
        Ok(())
    }

    /// Store a sigil commitment. The run starts once both seats are filled
    /// and both commitments are in.
    pub fn set_commit(
        env: Env,
        lobby_id: u32,
        player: Address,
        commit: BytesN<32>,
    ) -> Result<(), FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        if lobby.status != LobbyStatus::Waiting {
            return Err(FarmError::NotWaiting);
        }
        player.require_auth();

        let slot = Self::resolve_slot(&lobby, &player)?;
        let state = Self::state_mut(&mut lobby, slot);
        if state.commit.is_some() {
            return Err(FarmError::AlreadyCommitted);
        }
        state.commit = Some(commit);

        EvCommitSet {
            lobby_id,
            player: player.clone(),
        }
        .publish(&env);

        if let Some(player2) = lobby.player2.clone() {
            if lobby.p1.commit.is_some() && lobby.p2.commit.is_some() {
                // Game Hub lifecycle: start_game before the run goes live.
                let hub_addr = Self::load_hub(&env)?;
                let hub = GameHubClient::new(&env, &hub_addr);
                hub.start_game(
                    &env.current_contract_address(),
                    &lobby_id,
                    &lobby.player1,
                    &player2,
                    &lobby.player1_points,
                    &lobby.player2_points,
                );

                EvHubStartReported {
                    lobby_id,
                    hub: hub_addr,
                }
                .publish(&env);

                lobby.status = LobbyStatus::Active;
                lobby.p1.floor = 1;
                lobby.p2.floor = 1;
                Self::reset_deadline(&env, &mut lobby);

                EvRunStarted {
                    lobby_id,
                    player1: lobby.player1.clone(),
                    player2,
                }
                .publish(&env);
            }
        }

        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Door attempts
    // ───────────────────────────────────────────────────────────────────────────

    /// Answer the current floor's prompt with a door proof over `choice`.
    ///
    /// Returns whether the door opened: the proof must verify and `choice`
    /// must match the floor's answer. A rejected proof or a wrong answer is
    /// not an error: the attempt is logged as a miss and the nonce is
    /// consumed.
    #[allow(clippy::too_many_arguments)]
    pub fn attempt_door(
        env: Env,
        lobby_id: u32,
        player: Address,
        floor: u32,
        attempt_nonce: u32,
        choice: u32,
        sigil_hash: BytesN<32>,
        proof: Bytes,
    ) -> Result<bool, FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        let (slot, commit) = Self::check_attempt(&lobby, &player, floor, attempt_nonce)?;

        if choice >= OPTION_COUNT {
            return Err(FarmError::InvalidChoice);
        }
        let answer = floors::answer(floor).ok_or(FarmError::InvalidFloor)?;
        let stack = floors::proof_stack(floor).ok_or(FarmError::InvalidFloor)?;

        let mut public_inputs = Bytes::from_array(&env, &sigil_hash.to_array());
        public_inputs.append(&Bytes::from_array(&env, &commit.to_array()));
        public_inputs.append(&Bytes::from_array(&env, &lobby_id.to_be_bytes()));
        public_inputs.append(&Bytes::from_array(&env, &floor.to_be_bytes()));
        public_inputs.append(&Bytes::from_array(&env, &attempt_nonce.to_be_bytes()));
        public_inputs.append(&Bytes::from_array(&env, &stack.tag()));
        public_inputs.append(&Bytes::from_array(&env, &choice.to_be_bytes()));
        public_inputs.append(&player.to_string().to_bytes());

        let verifier_addr = Self::load_verifier(&env)?;
        let verifier = DoorVerifierClient::new(&env, &verifier_addr);
        let opened = verifier.verify(&public_inputs, &proof) && choice == answer;

        Self::apply_attempt(&env, lobby_id, &mut lobby, slot, &player, floor, attempt_nonce, opened)?;
        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(opened)
    }

    /// Answer the current floor's prompt. `choice` is the option index (0-3).
    ///
    /// Returns whether the door opened. A wrong answer is logged as a miss
    /// and the nonce is consumed.
    pub fn make_guess(
        env: Env,
        lobby_id: u32,
        player: Address,
        floor: u32,
        attempt_nonce: u32,
        choice: u32,
    ) -> Result<bool, FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        let (slot, _) = Self::check_attempt(&lobby, &player, floor, attempt_nonce)?;

        if choice >= OPTION_COUNT {
            return Err(FarmError::InvalidChoice);
        }
        let answer = floors::answer(floor).ok_or(FarmError::InvalidFloor)?;
        let opened = choice == answer;

        Self::apply_attempt(&env, lobby_id, &mut lobby, slot, &player, floor, attempt_nonce, opened)?;
        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(opened)
    }

    /// The winner of a finished run. Repeated calls return the same address.
    pub fn reveal_winner(env: Env, lobby_id: u32) -> Result<Address, FarmError> {
        let lobby = Self::read_lobby(&env, lobby_id)?;
        lobby.winner.ok_or(FarmError::GameNotFinished)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Forfeit & Timeout
    // ───────────────────────────────────────────────────────────────────────────

    /// Withdraw from an active run. The opponent wins.
    pub fn forfeit(env: Env, lobby_id: u32, player: Address) -> Result<(), FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        Self::require_active(&lobby)?;
        player.require_auth();

        let slot = Self::resolve_slot(&lobby, &player)?;
        let winner_slot = if slot == PLAYER_1 { PLAYER_2 } else { PLAYER_1 };

        Self::finalize_game(&env, lobby_id, &mut lobby, winner_slot)?;
        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(())
    }

    /// Settle a stalled run once the ledger reaches the inactivity deadline.
    /// The player further up the dungeon wins; level runs cannot be settled.
    pub fn resolve_timeout(env: Env, lobby_id: u32, caller: Address) -> Result<(), FarmError> {
        let mut lobby = Self::read_lobby(&env, lobby_id)?;
        Self::require_active(&lobby)?;
        caller.require_auth();
        Self::resolve_slot(&lobby, &caller)?;

        let deadline = lobby.deadline_ledger.ok_or(FarmError::TimeoutNotReached)?;
        if env.ledger().sequence() < deadline {
            return Err(FarmError::TimeoutNotReached);
        }

        let score1 = Self::progress_score(&lobby.p1);
        let score2 = Self::progress_score(&lobby.p2);
        let winner_slot = if score1 > score2 {
            PLAYER_1
        } else if score2 > score1 {
            PLAYER_2
        } else {
            return Err(FarmError::TimeoutNotApplicable);
        };

        Self::finalize_game(&env, lobby_id, &mut lobby, winner_slot)?;
        Self::write_lobby(&env, lobby_id, &lobby);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_lobby(env: Env, lobby_id: u32) -> Option<Lobby> {
        env.storage().temporary().get(&DataKey::Lobby(lobby_id))
    }

    pub fn get_progress(env: Env, lobby_id: u32) -> Result<LobbyProgress, FarmError> {
        let lobby = Self::read_lobby(&env, lobby_id)?;
        Ok(LobbyProgress {
            lobby_id,
            status: lobby.status,
            p1_floor: lobby.p1.floor,
            p2_floor: lobby.p2.floor,
            p1_nonce: lobby.p1.last_nonce,
            p2_nonce: lobby.p2.last_nonce,
            winner: lobby.winner,
        })
    }

    /// Most recent runs first-in-first-out, up to 50.
    pub fn get_player_history(env: Env, player: Address) -> Vec<RunSummary> {
        env.storage()
            .persistent()
            .get(&DataKey::PlayerHistory(player))
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn get_floor(env: Env, floor: u32) -> Result<FloorInfo, FarmError> {
        floors::info(&env, floor).ok_or(FarmError::InvalidFloor)
    }

    pub fn get_floor_plan(env: Env) -> Vec<FloorInfo> {
        floors::plan(&env)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Admin
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_admin(env: Env) -> Result<Address, FarmError> {
        Self::load_admin(&env)
    }

    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), FarmError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage().instance().set(&DataKey::Admin, &new_admin);
        Ok(())
    }

    pub fn get_hub(env: Env) -> Result<Address, FarmError> {
        Self::load_hub(&env)
    }

    pub fn set_hub(env: Env, new_hub: Address) -> Result<(), FarmError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage().instance().set(&DataKey::Hub, &new_hub);
        Ok(())
    }

    pub fn get_verifier(env: Env) -> Result<Address, FarmError> {
        Self::load_verifier(&env)
    }

    pub fn set_verifier(env: Env, new_verifier: Address) -> Result<(), FarmError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage().instance().set(&DataKey::Verifier, &new_verifier);
        Ok(())
    }

    pub fn upgrade(env: Env, new_wasm_hash: BytesN<32>) -> Result<(), FarmError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Attempt validation & progression
    // ═══════════════════════════════════════════════════════════════════════════

    /// Checks shared by both attempt paths. Returns the caller's slot and
    /// sigil commitment.
    fn check_attempt(
        lobby: &Lobby,
        player: &Address,
        floor: u32,
        attempt_nonce: u32,
    ) -> Result<(u32, BytesN<32>), FarmError> {
        Self::require_active(lobby)?;
        player.require_auth();

        let slot = Self::resolve_slot(lobby, player)?;
        let state = Self::state(lobby, slot);
        let commit = match &state.commit {
            Some(commit) => commit.clone(),
            None => return Err(FarmError::MissingCommit),
        };
        if state.floor != floor {
            return Err(FarmError::WrongFloor);
        }
        if attempt_nonce != state.last_nonce.saturating_add(1) {
            return Err(FarmError::BadNonce);
        }
        if Self::gate_cleared(state, floor) {
            return Err(FarmError::GateAlreadyCleared);
        }
        Ok((slot, commit))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_attempt(
        env: &Env,
        lobby_id: u32,
        lobby: &mut Lobby,
        slot: u32,
        player: &Address,
        floor: u32,
        attempt_nonce: u32,
        opened: bool,
    ) -> Result<(), FarmError> {
        let state = Self::state_mut(lobby, slot);
        state.last_nonce = attempt_nonce;
        if !opened {
            state.misses = state.misses.saturating_add(1);
        }

        EvDoorAttempted {
            lobby_id,
            player: player.clone(),
            floor,
            nonce: attempt_nonce,
            opened,
        }
        .publish(env);

        if !opened {
            return Ok(());
        }
        // Only an opened door moves the deadline; misses never do.
        Self::reset_deadline(env, lobby);

        let next_floor = floor + 1;
        if floors::is_gate(floor) {
            Self::mark_gate(Self::state_mut(lobby, slot), floor);
            EvGateCleared {
                lobby_id,
                player: player.clone(),
                floor,
            }
            .publish(env);

            let other = if slot == PLAYER_1 { PLAYER_2 } else { PLAYER_1 };
            if Self::gate_cleared(Self::state(lobby, other), floor) {
                lobby.p1.floor = next_floor;
                lobby.p2.floor = next_floor;
                EvFloorReached {
                    lobby_id,
                    player: lobby.player1.clone(),
                    floor: next_floor,
                }
                .publish(env);
                if let Some(player2) = lobby.player2.clone() {
                    EvFloorReached {
                        lobby_id,
                        player: player2,
                        floor: next_floor,
                    }
                    .publish(env);
                }
            }
        } else if next_floor > MAX_FLOOR {
            Self::finalize_game(env, lobby_id, lobby, slot)?;
        } else {
            Self::state_mut(lobby, slot).floor = next_floor;
            EvFloorReached {
                lobby_id,
                player: player.clone(),
                floor: next_floor,
            }
            .publish(env);
        }
        Ok(())
    }

    fn gate_cleared(state: &PlayerState, floor: u32) -> bool {
        match floor {
            GATE_FLOOR_1 => state.cleared_gate1,
            GATE_FLOOR_5 => state.cleared_gate5,
            _ => false,
        }
    }

    fn mark_gate(state: &mut PlayerState, floor: u32) {
        match floor {
            GATE_FLOOR_1 => state.cleared_gate1 = true,
            GATE_FLOOR_5 => state.cleared_gate5 = true,
            _ => {}
        }
    }

    /// Two points per floor, one more for a gate already cleared on the
    /// current floor.
    fn progress_score(state: &PlayerState) -> u32 {
        let waiting = if Self::gate_cleared(state, state.floor) { 1 } else { 0 };
        state.floor * 2 + waiting
    }

    fn reset_deadline(env: &Env, lobby: &mut Lobby) {
        lobby.deadline_ledger = Some(env.ledger().sequence().saturating_add(TIMEOUT_LEDGERS));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Finalization (single end_game call-site)
    // ═══════════════════════════════════════════════════════════════════════════

    fn finalize_game(
        env: &Env,
        lobby_id: u32,
        lobby: &mut Lobby,
        winner_slot: u32,
    ) -> Result<(), FarmError> {
        if lobby.status == LobbyStatus::Finished {
            return Err(FarmError::GameFinished);
        }
        let player2 = lobby.player2.clone().ok_or(FarmError::LobbyInactive)?;
        let player1_won = winner_slot == PLAYER_1;
        let winner = if player1_won {
            lobby.player1.clone()
        } else {
            player2.clone()
        };

        // Game Hub lifecycle: end_game before finalizing state.
        let hub_addr = Self::load_hub(env)?;
        let hub = GameHubClient::new(env, &hub_addr);
        hub.end_game(&lobby_id, &player1_won);

        EvHubEndReported {
            lobby_id,
            hub: hub_addr,
            player1_won,
        }
        .publish(env);

        lobby.status = LobbyStatus::Finished;
        lobby.winner = Some(winner.clone());
        lobby.deadline_ledger = None;

        EvGameEnded { lobby_id, winner }.publish(env);

        let player1 = lobby.player1.clone();
        Self::save_player_history(env, lobby_id, &player1, &player2, player1_won, &lobby.p1);
        Self::save_player_history(env, lobby_id, &player2, &player1, !player1_won, &lobby.p2);
        Ok(())
    }

    /// Append a run summary to a player's persistent history (ring buffer, max 50).
    fn save_player_history(
        env: &Env,
        lobby_id: u32,
        player: &Address,
        opponent: &Address,
        won: bool,
        state: &PlayerState,
    ) {
        let key = DataKey::PlayerHistory(player.clone());
        let mut history: Vec<RunSummary> = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| Vec::new(env));

        while history.len() >= MAX_HISTORY_PER_PLAYER {
            history.remove(0);
        }

        history.push_back(RunSummary {
            lobby_id,
            opponent: opponent.clone(),
            won,
            floor_reached: state.floor,
            misses: state.misses,
            ledger: env.ledger().sequence(),
        });

        env.storage().persistent().set(&key, &history);
        env.storage()
            .persistent()
            .extend_ttl(&key, HISTORY_TTL_LEDGERS, HISTORY_TTL_LEDGERS);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Phase guards & slots
    // ═══════════════════════════════════════════════════════════════════════════

    fn require_active(lobby: &Lobby) -> Result<(), FarmError> {
        match lobby.status {
            LobbyStatus::Active => Ok(()),
            LobbyStatus::Finished => Err(FarmError::GameFinished),
            LobbyStatus::Waiting => Err(FarmError::LobbyInactive),
        }
    }

    fn resolve_slot(lobby: &Lobby, player: &Address) -> Result<u32, FarmError> {
        if *player == lobby.player1 {
            Ok(PLAYER_1)
        } else if lobby.player2.as_ref() == Some(player) {
            Ok(PLAYER_2)
        } else {
            Err(FarmError::NotPlayer)
        }
    }

    fn state(lobby: &Lobby, slot: u32) -> &PlayerState {
        match slot {
            PLAYER_1 => &lobby.p1,
            _ => &lobby.p2,
        }
    }

    fn state_mut(lobby: &mut Lobby, slot: u32) -> &mut PlayerState {
        match slot {
            PLAYER_1 => &mut lobby.p1,
            _ => &mut lobby.p2,
        }
    }

    fn new_lobby(
        env: &Env,
        player1: Address,
        player2: Option<Address>,
        player1_points: i128,
        player2_points: i128,
    ) -> Lobby {
        Lobby {
            status: LobbyStatus::Waiting,
            player1,
            player2,
            player1_points,
            player2_points,
            p1: Self::fresh_state(),
            p2: Self::fresh_state(),
            winner: None,
            created_ledger: env.ledger().sequence(),
            deadline_ledger: None,
        }
    }

    fn fresh_state() -> PlayerState {
        PlayerState {
            commit: None,
            floor: 0,
            last_nonce: 0,
            cleared_gate1: false,
            cleared_gate5: false,
            misses: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn read_lobby(env: &Env, lobby_id: u32) -> Result<Lobby, FarmError> {
        env.storage()
            .temporary()
            .get(&DataKey::Lobby(lobby_id))
            .ok_or(FarmError::LobbyNotFound)
    }

    fn write_lobby(env: &Env, lobby_id: u32, lobby: &Lobby) {
        let key = DataKey::Lobby(lobby_id);
        env.storage().temporary().set(&key, lobby);
        env.storage()
            .temporary()
            .extend_ttl(&key, LOBBY_TTL_LEDGERS, LOBBY_TTL_LEDGERS);
        // Keep instance storage (admin, hub, verifier addresses) alive
        env.storage()
            .instance()
            .extend_ttl(LOBBY_TTL_LEDGERS, LOBBY_TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, FarmError> {
        env.storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(FarmError::AdminNotSet)
    }

    fn load_hub(env: &Env) -> Result<Address, FarmError> {
        env.storage()
            .instance()
            .get(&DataKey::Hub)
            .ok_or(FarmError::GameHubNotSet)
    }

    fn load_verifier(env: &Env) -> Result<Address, FarmError> {
        env.storage()
            .instance()
            .get(&DataKey::Verifier)
            .ok_or(FarmError::VerifierNotSet)
    }
}
