//! Photon-128 absorb/transform/squeeze

use crate::Digest;

/// Bytes absorbed per transform step
pub const BLOCK_SIZE: usize = 16;

/// Digest size in bytes
pub const OUTPUT_SIZE: usize = 16;

/// Number of 32-bit words in the state
pub const STATE_WORDS: usize = 4;

/// Left rotation applied to each state word
pub const ROTATION: u32 = 7;

/// Streaming Photon-128 hasher.
///
/// Input is buffered into 16-byte blocks. A trailing partial block is padded
/// with zero bytes on [`finalize`](Self::finalize); input whose length is
/// already a multiple of 16 is absorbed without padding. As a consequence a
/// message and the same message followed by its zero padding hash to the
/// same digest.
#[derive(Debug, Clone)]
pub struct Photon128 {
    state: [u32; STATE_WORDS],
    buffer: [u8; BLOCK_SIZE],
    buffered: usize,
}

impl Default for Photon128 {
    fn default() -> Self {
        Self::new()
    }
}

impl Photon128 {
    /// Create a hasher with an all-zero state
    pub fn new() -> Self {
        Self {
            state: [0u32; STATE_WORDS],
            buffer: [0u8; BLOCK_SIZE],
            buffered: 0,
        }
    }

    /// Absorb more input
    pub fn update(&mut self, mut data: &[u8]) {
        if self.buffered > 0 {
            let take = (BLOCK_SIZE - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];

            if self.buffered < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            self.transform(&block);
            self.buffered = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK_SIZE);
        for chunk in &mut chunks {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.transform(&block);
        }

        let rest = chunks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.buffered = rest.len();
    }

    /// Pad any buffered input and squeeze out the digest
    pub fn finalize(mut self) -> Digest {
        if self.buffered > 0 {
            let mut block = [0u8; BLOCK_SIZE];
            block[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
            self.transform(&block);
        }
        self.squeeze()
    }

    /// One transform step. Updates run in place and in order, so word `i`
    /// mixes in the neighbour `(i + 1) % 4` as it stands at that moment; for
    /// the last word that neighbour is word 0, already updated in this pass.
    fn transform(&mut self, block: &[u8; BLOCK_SIZE]) {
        let words = decode_block(block);
        for i in 0..STATE_WORDS {
            self.state[i] ^= words[i];
            self.state[i] = self.state[i].rotate_left(ROTATION) ^ self.state[(i + 1) % STATE_WORDS];
        }
    }

    fn squeeze(&self) -> Digest {
        let mut out = [0u8; STATE_WORDS * 4];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        let mut bytes = [0u8; OUTPUT_SIZE];
        bytes.copy_from_slice(&out[..OUTPUT_SIZE]);
        Digest::from_bytes(bytes)
    }
}

/// Split a block into big-endian words. A word without four source bytes
/// decodes as zero; padding makes that unreachable for whole blocks.
fn decode_block(block: &[u8]) -> [u32; STATE_WORDS] {
    let mut words = [0u32; STATE_WORDS];
    for (j, word) in words.iter_mut().enumerate() {
        if let Some(b) = block.get(j * 4..j * 4 + 4) {
            *word = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        }
    }
    words
}

/// Compute the Photon-128 digest of the input data
pub fn photon128(data: &[u8]) -> Digest {
    let mut hasher = Photon128::new();
    hasher.update(data);
    hasher.finalize()
}

/// Recompute the digest of `data` and compare it byte-for-byte
pub fn verify(data: &[u8], expected: &Digest) -> bool {
    photon128(data) == *expected
}
