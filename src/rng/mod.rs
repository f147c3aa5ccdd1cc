//! Uniform random sources backing the per-thread deviate engine.

use entropy::fill_entropy;
pub(crate) use entropy::Trng;
pub(crate) use mt19937::Mt19937;
pub(crate) use sfmt::Sfmt216091;
pub(crate) use xoshiro::{Xoshiro256Plus, Xoshiro256StarStar};

mod entropy;
mod mt19937;
mod sfmt;
#[cfg(test)]
mod test;
mod xoshiro;

/// Seed material for the deterministic generators: four 64-bit words.
pub type Seed = [u64; 4];

/// Number of 64-bit words in a [`Seed`].
pub const SEED_WORDS: usize = 4;

/// The available generator families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RngKind {
    /// 64-bit Mersenne Twister, period 2^19937 - 1.
    Mt19937,
    /// SIMD-oriented Fast Mersenne Twister, period 2^216091 - 1.
    Mt216091,
    /// Xoshiro256+, fastest option, weak low bits.
    Xoshiro256Plus,
    /// Xoshiro256**, full 64-bit scrambling.
    Xoshiro256StarStar,
    /// OS entropy pool; non-deterministic, ignores seeds.
    Trng,
}

/// A seedable 64-bit uniform generator.
///
/// Each deterministic kind produces the canonical sequence of its algorithm
/// from a given `(seed, extra)` pair. The `extra` word scrambles the seed so
/// that streams started from the same base seed but different `extra` values
/// (thread ids, in practice) are independent.
pub trait UniformSource: Send {
    /// Re-seed the generator, discarding all stream state.
    fn reseed(&mut self, seed: &Seed, extra: u32);

    fn kind(&self) -> RngKind;

    /// The seed last applied, without the `extra` scrambling.
    fn seed(&self) -> &Seed;

    /// Next 32 bits. Deterministic kinds split one 64-bit draw into two
    /// halves, low half first.
    fn next_u32(&mut self) -> u32;

    /// Next 64 bits of the stream.
    fn next_u64(&mut self) -> u64;

    /// Bulk fill, observably equivalent to `out.len()` successive
    /// [`next_u64`][Self::next_u64] calls except that the generator may
    /// discard up to one block of state at the end.
    fn fill(&mut self, out: &mut [u64]);
}

/// Build a generator of the requested kind.
pub fn uniform_source(kind: RngKind, seed: &Seed, extra: u32) -> Box<dyn UniformSource> {
    match kind {
        RngKind::Mt19937 => Box::new(Mt19937::new(seed, extra)),
        RngKind::Mt216091 => Box::new(Sfmt216091::new(seed, extra)),
        RngKind::Xoshiro256Plus => Box::new(Xoshiro256Plus::new(seed, extra)),
        RngKind::Xoshiro256StarStar => Box::new(Xoshiro256StarStar::new(seed, extra)),
        RngKind::Trng => Box::new(Trng::new()),
    }
}

/// Draw a fresh seed from the OS entropy pool.
pub fn entropy_seed() -> Seed {
    let mut bytes = [0u8; size_of::<Seed>()];
    fill_entropy(&mut bytes);

    let mut seed = [0u64; SEED_WORDS];
    for (word, chunk) in seed.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *word = u64::from_le_bytes(buf);
    }
    seed
}

/// Tracks which half of a decomposed 64-bit draw is handed out next.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct HalfWord(Option<u32>);

impl HalfWord {
    /// The high half stashed by the previous 32-bit request, if any.
    pub fn pending(&mut self) -> Option<u32> {
        self.0.take()
    }

    /// Stash the high half of a fresh draw and hand out the low half.
    pub fn split(&mut self, word: u64) -> u32 {
        self.0 = Some((word >> 32) as u32);
        word as u32
    }

    pub fn reset(&mut self) {
        self.0 = None;
    }
}
