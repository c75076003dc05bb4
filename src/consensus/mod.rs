// Consensus: the proof-of-work search and validator

mod pow;

pub use pow::{ProofOfWork, TARGET_BITS};
