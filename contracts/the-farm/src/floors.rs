//! Static floor tables: titles, proof-stack rotation, gates and the
//! multiple-choice answer key.

use soroban_sdk::{contracttype, Env, String, Vec};

pub const MAX_FLOOR: u32 = 10;

/// Floors where both players must clear before either advances.
pub const GATE_FLOOR_1: u32 = 1;
pub const GATE_FLOOR_5: u32 = 5;

/// Every prompt offers four options (A-D).
pub const OPTION_COUNT: u32 = 4;

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProofStack {
    Circom,
    Noir,
    Risc0,
    Mixed,
}

impl ProofStack {
    /// Domain tag folded into the door-proof challenge.
    pub fn tag(self) -> [u8; 4] {
        match self {
            ProofStack::Circom => *b"CRCM",
            ProofStack::Noir => *b"NOIR",
            ProofStack::Risc0 => *b"RSC0",
            ProofStack::Mixed => *b"MIXD",
        }
    }
}

/// Public view of a floor. The answer key stays off this struct.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FloorInfo {
    pub id: u32,
    pub title: String,
    pub proof_stack: ProofStack,
    pub gated: bool,
    pub mini_game: String,
    pub player_arc: String,
    pub copy: String,
    pub question: String,
    /// Option texts in index order; `make_guess` and `attempt_door` take
    /// the index.
    pub options: Vec<String>,
    pub option_count: u32,
}

struct FloorDesign {
    title: &'static str,
    stack: ProofStack,
    mini_game: &'static str,
    player_arc: &'static str,
    copy: &'static str,
    question: &'static str,
    options: [&'static str; OPTION_COUNT as usize],
    answer: u32,
}

// Floors 1-3 Circom, 4-7 Noir, 8-9 RISC Zero, 10 mixed attest.
const FLOORS: [FloorDesign; MAX_FLOOR as usize] = [
    FloorDesign {
        title: "Customs Gate",
        stack: ProofStack::Circom,
        mini_game: "Rune Stencil Rush: both players race to stamp the correct rune; first accurate stamp advances, second gets a hint.",
        player_arc: "You learn to act fast under scrutiny, defining your call-sign.",
        copy: "Your manifest must be sealed; the checkpoint AI only respects clean stencils.",
        question: "Which stencil seals a customs manifest?",
        options: ["Open ring", "Broken chevron", "Closed triple rune", "Blank plate"],
        answer: 2,
    },
    FloorDesign {
        title: "Freight Scales",
        stack: ProofStack::Circom,
        mini_game: "Weight Bluff: choose cargo crates; one is real weight, others decoys. Bluffing logged; truth advances.",
        player_arc: "You realize honesty is an accelerator when the ledger is the judge.",
        copy: "Scales hum; only truthful weight unlocks the lift.",
        question: "Which crate unlocks the lift?",
        options: [
            "The crate whose manifest matches the scale",
            "The heaviest crate",
            "The crate with the brightest seal",
            "The crate nobody touched",
        ],
        answer: 0,
    },
    FloorDesign {
        title: "Vault Ledger",
        stack: ProofStack::Circom,
        mini_game: "Ledger Slots: line up sigils to match the ledger checksum; wrong aligns trigger sand traps.",
        player_arc: "You start treating each attempt as part of your legend, not a mistake.",
        copy: "Notary lights flicker as your entry etches into stone.",
        question: "The checksum reads sun before moon before star. Which row matches?",
        options: ["Sun, Sun, Moon", "Moon, Star, Sun", "Star, Star, Star", "Sun, Moon, Star"],
        answer: 3,
    },
    FloorDesign {
        title: "Mirror of Intent",
        stack: ProofStack::Noir,
        mini_game: "Echo Whisper: speak a rune pattern; mirror judges sincerity via rhythm matching.",
        player_arc: "You learn that cadence and intent outweigh volume.",
        copy: "The mirror remembers tone, not words.",
        question: "What does the mirror judge?",
        options: ["Volume", "Cadence and intent", "The exact words", "Who spoke first"],
        answer: 1,
    },
    FloorDesign {
        title: "Twin Locks",
        stack: ProofStack::Noir,
        mini_game: "Sync Keys: two players must press paired glyphs within a heartbeat window; desync logs but does not open.",
        player_arc: "Trust forms; your partner becomes part of your toolkit.",
        copy: "Two turns, one gate; harmony or halt.",
        question: "When do the twin locks open?",
        options: [
            "When one player presses both glyphs",
            "When the louder glyph wins",
            "When both glyphs land in one heartbeat",
            "When the timer runs out",
        ],
        answer: 2,
    },
    FloorDesign {
        title: "Labyrinth Map",
        stack: ProofStack::Noir,
        mini_game: "Path Sketch: draw a flight vector on a hologrid; correct vector opens a corridor. Paths hidden from opponent, only success signal shown.",
        player_arc: "You master planning under secrecy.",
        copy: "Mission control only needs your checksum.",
        question: "What does mission control need to open the corridor?",
        options: [
            "The checksum of your vector",
            "The full drawn path",
            "Your opponent's path",
            "A second hologrid",
        ],
        answer: 0,
    },
    FloorDesign {
        title: "Resonance Choir",
        stack: ProofStack::Noir,
        mini_game: "Pitch Duel: choose a tone; engine hum responds. Matching the harmonic raises the platform. Opponent sees your hum state only.",
        player_arc: "Precision over force; your confidence hardens.",
        copy: "Engines purr when truth is on key.",
        question: "Which tone raises the platform?",
        options: [
            "The loudest tone",
            "The lowest tone",
            "Any tone held long enough",
            "The tone matching the engine harmonic",
        ],
        answer: 3,
    },
    FloorDesign {
        title: "Blackbox Furnace",
        stack: ProofStack::Risc0,
        mini_game: "Forge Run: feed ingredients to a sealed crucible; receipt proves the recipe. Wrong mix vents steam but still logs.",
        player_arc: "You entrust work to the machine and accept the delay of heavy proof.",
        copy: "The furnace signs your attempt; the bridge lowers only for the right alloy.",
        question: "What lowers the bridge?",
        options: [
            "Any mix that vents steam",
            "A receipt for the right alloy",
            "Feeding the crucible twice",
            "Opening the furnace door",
        ],
        answer: 1,
    },
    FloorDesign {
        title: "Time Dilation Test",
        stack: ProofStack::Risc0,
        mini_game: "Playback Pilot: replay your path in a slowed-down sim; sealed recorder signs it. Correct replay synchronizes the wormhole ring.",
        player_arc: "You reconcile memory with evidence; discipline peaks.",
        copy: "The recorder believes only what it signs.",
        question: "What synchronizes the wormhole ring?",
        options: [
            "A faster replay",
            "An unsigned recording",
            "A signed replay of your true path",
            "Your opponent's replay",
        ],
        answer: 2,
    },
    FloorDesign {
        title: "Stellar Confluence",
        stack: ProofStack::Mixed,
        mini_game: "Final Braid: weave your manifests, oaths, and blackbox receipts into a final codeword; submit together. First to weave right triggers end_game.",
        player_arc: "You and your rival-ally conclude the saga: respect through evidence.",
        copy: "All seals converge; the Archive crowns the one who braids cleanest.",
        question: "What does the final braid weave together?",
        options: [
            "Every seal you earned on the climb",
            "Only the fastest receipt",
            "Your opponent's codeword",
            "An empty manifest",
        ],
        answer: 0,
    },
];

fn design(floor: u32) -> Option<&'static FloorDesign> {
    if floor == 0 || floor > MAX_FLOOR {
        return None;
    }
    FLOORS.get((floor - 1) as usize)
}

pub fn is_gate(floor: u32) -> bool {
    floor == GATE_FLOOR_1 || floor == GATE_FLOOR_5
}

pub fn proof_stack(floor: u32) -> Option<ProofStack> {
    design(floor).map(|d| d.stack)
}

pub fn answer(floor: u32) -> Option<u32> {
    design(floor).map(|d| d.answer)
}

pub fn info(env: &Env, floor: u32) -> Option<FloorInfo> {
    design(floor).map(|d| {
        let mut options = Vec::new(env);
        for text in d.options.iter() {
            options.push_back(String::from_str(env, text));
        }
        FloorInfo {
            id: floor,
            title: String::from_str(env, d.title),
            proof_stack: d.stack,
            gated: is_gate(floor),
            mini_game: String::from_str(env, d.mini_game),
            player_arc: String::from_str(env, d.player_arc),
            copy: String::from_str(env, d.copy),
            question: String::from_str(env, d.question),
            options,
            option_count: OPTION_COUNT,
        }
    })
}

pub fn plan(env: &Env) -> Vec<FloorInfo> {
    let mut out = Vec::new(env);
    for floor in 1..=MAX_FLOOR {
        if let Some(floor_info) = info(env, floor) {
            out.push_back(floor_info);
        }
    }
    out
}
