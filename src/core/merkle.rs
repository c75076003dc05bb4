// Merkle tree over transaction serializations

use crate::core::hash::sha256;

/// Binary Merkle tree with duplicate-last-leaf padding.
///
/// Leaves store SHA256 of the leaf data; internal nodes store
/// SHA256(left || right). Any level with an odd number of nodes duplicates
/// its last node before pairing, including a single-leaf list, so a
/// one-transaction block has root SHA256(h || h) where h is the leaf hash.
#[derive(Debug)]
pub struct MerkleTree {
    root: Vec<u8>,
}

impl MerkleTree {
    pub fn new(leaves: &[Vec<u8>]) -> Self {
        if leaves.is_empty() {
            return Self { root: vec![0u8; 32] };
        }

        let mut level: Vec<[u8; 32]> = leaves.iter().map(|leaf| sha256(leaf)).collect();
        let mut building = true;

        while building {
            if level.len() % 2 == 1 {
                level.push(*level.last().expect("level is non-empty"));
            }

            level = level
                .chunks(2)
                .map(|pair| {
                    let mut combined = Vec::with_capacity(64);
                    combined.extend_from_slice(&pair[0]);
                    combined.extend_from_slice(&pair[1]);
                    sha256(&combined)
                })
                .collect();

            building = level.len() > 1;
        }

        Self {
            root: level[0].to_vec(),
        }
    }

    /// The root hash placed into the proof-of-work preimage.
    pub fn root(&self) -> &[u8] {
        &self.root
    }
}
