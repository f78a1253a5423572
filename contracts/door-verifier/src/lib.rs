#![no_std]

//! # Door Verifier
//!
//! On-chain verifier for The Farm door attempts. A door proof shows that
//! the player attempting a door holds the sigil secret they committed to
//! before the run, bound to one exact (lobby, floor, nonce, proof stack,
//! choice) attempt. Grading the choice is left to the calling contract.
//!
//! ## Protocol
//!
//! **Commitment (client-side, registered via `set_commit`):**
//! ```text
//! sigil_hash = keccak256(sigil_secret)
//! commit     = keccak256(sigil_hash || blinding || player_address)
//! ```
//!
//! **Proof generation (client-side, Fiat-Shamir):**
//! ```text
//! challenge = keccak256(commit || lobby_id_be4 || floor_be4 || nonce_be4
//!                       || stack_tag || choice_be4 || player_address || "DOOR")
//! response  = keccak256(sigil_hash || challenge || blinding)
//! ```
//!
//! **Public inputs layout:**
//! ```text
//! [0..32)    sigil_hash
//! [32..64)   commit
//! [64..68)   lobby_id   : u32 big-endian
//! [68..72)   floor      : u32 big-endian
//! [72..76)   nonce      : u32 big-endian
//! [76..80)   stack_tag  : 4 ASCII bytes ("CRCM", "NOIR", "RSC0", "MIXD")
//! [80..84)   choice     : u32 big-endian, the option the player answers
//! [84..)     player     : variable-length address string bytes
//! ```
//!
//! **Proof layout:** `blinding(32) || response(32)`
//!
//! The raw sigil secret never appears on-chain. Because the challenge covers
//! the attempt coordinates and the choice, a proof for one door or one
//! answer cannot be reused for another.

use soroban_sdk::{contract, contracterror, contractevent, contractimpl, Bytes, BytesN, Env};

// ═══════════════════════════════════════════════════════════════════════════════
//  Error codes
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum DoorVerifyError {
    ProofWrongLength = 1,
    InputsTooShort = 2,
    EmptyPlayerAddress = 3,
    CommitmentMismatch = 4,
    ResponseMismatch = 5,
    WeakSigilEntropy = 6,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvVerifyFailed {
    pub reason: u32,
}

#[contractevent]
pub struct EvVerifySuccess {
    pub floor: u32,
    pub stack_tag: BytesN<4>,
    pub choice: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Layout & domain separators
// ═══════════════════════════════════════════════════════════════════════════════

const PROOF_LEN: u32 = 64;

const SIGIL_HASH_OFFSET: u32 = 0;
const COMMIT_OFFSET: u32 = 32;
const LOBBY_OFFSET: u32 = 64;
const FLOOR_OFFSET: u32 = 68;
const STACK_TAG_OFFSET: u32 = 76;
const CHOICE_OFFSET: u32 = 80;
const PLAYER_OFFSET: u32 = 84;

/// Domain separator for the door challenge: ASCII "DOOR".
pub const DOOR_CHALLENGE_TAG: [u8; 4] = [0x44, 0x4F, 0x4F, 0x52];

/// Minimum number of distinct byte values in a sigil hash.
const MIN_DISTINCT_BYTES: u32 = 4;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct DoorVerifier;

#[contractimpl]
impl DoorVerifier {
    /// Verify a door proof. Returns `true` if the proof is valid.
    ///
    /// Never traps on malformed input: every rejection publishes an
    /// `EvVerifyFailed` event carrying the reason code and returns `false`.
    pub fn verify(env: Env, public_inputs: Bytes, proof: Bytes) -> bool {
        match Self::check(&env, &public_inputs, &proof) {
            Ok(()) => {
                EvVerifySuccess {
                    floor: read_u32(&public_inputs, FLOOR_OFFSET),
                    stack_tag: read_array::<4>(&env, &public_inputs, STACK_TAG_OFFSET),
                    choice: read_u32(&public_inputs, CHOICE_OFFSET),
                }
                .publish(&env);
                true
            }
            Err(reason) => {
                EvVerifyFailed {
                    reason: reason as u32,
                }
                .publish(&env);
                false
            }
        }
    }

    fn check(env: &Env, public_inputs: &Bytes, proof: &Bytes) -> Result<(), DoorVerifyError> {
        if proof.len() != PROOF_LEN {
            return Err(DoorVerifyError::ProofWrongLength);
        }
        if public_inputs.len() < PLAYER_OFFSET {
            return Err(DoorVerifyError::InputsTooShort);
        }
        if public_inputs.len() == PLAYER_OFFSET {
            return Err(DoorVerifyError::EmptyPlayerAddress);
        }

        let sigil_hash = read_array::<32>(env, public_inputs, SIGIL_HASH_OFFSET);
        let commit = read_array::<32>(env, public_inputs, COMMIT_OFFSET);
        let player = public_inputs.slice(PLAYER_OFFSET..);

        let blinding = read_array::<32>(env, proof, 0);
        let response = read_array::<32>(env, proof, 32);

        // ── Commitment binding ──────────────────────────────────────────────
        let mut commit_preimage = Bytes::from_array(env, &sigil_hash.to_array());
        commit_preimage.append(&Bytes::from_array(env, &blinding.to_array()));
        commit_preimage.append(&player);
        let computed_commit: BytesN<32> = env.crypto().keccak256(&commit_preimage).into();
        if computed_commit != commit {
            return Err(DoorVerifyError::CommitmentMismatch);
        }

        // ── Fiat-Shamir challenge over the attempt coordinates ──────────────
        // lobby_id || floor || nonce || stack_tag || choice are contiguous.
        let mut challenge_preimage = Bytes::from_array(env, &commit.to_array());
        challenge_preimage.append(&public_inputs.slice(LOBBY_OFFSET..PLAYER_OFFSET));
        challenge_preimage.append(&player);
        challenge_preimage.append(&Bytes::from_array(env, &DOOR_CHALLENGE_TAG));
        let challenge: BytesN<32> = env.crypto().keccak256(&challenge_preimage).into();

        // ── Response ────────────────────────────────────────────────────────
        let mut resp_preimage = Bytes::from_array(env, &sigil_hash.to_array());
        resp_preimage.append(&Bytes::from_array(env, &challenge.to_array()));
        resp_preimage.append(&Bytes::from_array(env, &blinding.to_array()));
        let expected_response: BytesN<32> = env.crypto().keccak256(&resp_preimage).into();
        if expected_response != response {
            return Err(DoorVerifyError::ResponseMismatch);
        }

        if distinct_bytes(&sigil_hash.to_array()) < MIN_DISTINCT_BYTES {
            return Err(DoorVerifyError::WeakSigilEntropy);
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Byte helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Copy `N` bytes starting at `offset`. Callers check lengths first.
fn read_array<const N: usize>(env: &Env, data: &Bytes, offset: u32) -> BytesN<N> {
    let mut arr = [0u8; N];
    let mut i = 0usize;
    while i < N {
        arr[i] = data.get(offset + i as u32).unwrap_or(0);
        i += 1;
    }
    BytesN::from_array(env, &arr)
}

fn read_u32(data: &Bytes, offset: u32) -> u32 {
    let mut value = 0u32;
    let mut i = 0u32;
    while i < 4 {
        value = (value << 8) | data.get(offset + i).unwrap_or(0) as u32;
        i += 1;
    }
    value
}

fn distinct_bytes(arr: &[u8; 32]) -> u32 {
    let mut seen = [false; 256];
    let mut distinct = 0u32;
    for b in arr.iter() {
        if !seen[*b as usize] {
            seen[*b as usize] = true;
            distinct += 1;
        }
    }
    distinct
}
