//! OS entropy pool access and the TRNG generator kind.

use std::io::{Error, ErrorKind, Result};
use std::thread;
use std::time::Duration;

use super::{RngKind, Seed, UniformSource};

fn getrandom(buf: &mut [u8]) -> Result<usize> {
    let len = unsafe { libc::getrandom(buf.as_mut_ptr() as _, buf.len(), 0) };
    if len != -1 {
        Ok(len as _)
    } else {
        Err(Error::last_os_error())
    }
}

/// Fill `buf` from the OS entropy pool.
///
/// Short reads and EINTR are retried; the pool cannot run dry once the
/// kernel has gathered its initial entropy, so this never reports an error.
pub(super) fn fill_entropy(buf: &mut [u8]) {
    let mut filled = 0;
    while filled < buf.len() {
        match getrandom(&mut buf[filled..]) {
            Ok(len) => filled += len,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(_) => thread::sleep(Duration::from_millis(1)),
        }
    }
}

const ZERO_SEED: Seed = [0; 4];

/// True random generator; draws 32-bit words from the OS and ignores seeds.
pub(crate) struct Trng;

impl Trng {
    pub fn new() -> Self {
        Self
    }

    fn word32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        fill_entropy(&mut bytes);
        u32::from_le_bytes(bytes)
    }
}

impl UniformSource for Trng {
    fn reseed(&mut self, _seed: &Seed, _extra: u32) {}

    fn kind(&self) -> RngKind {
        RngKind::Trng
    }

    fn seed(&self) -> &Seed {
        &ZERO_SEED
    }

    fn next_u32(&mut self) -> u32 {
        self.word32()
    }

    fn next_u64(&mut self) -> u64 {
        u64::from(self.word32()) << 32 | u64::from(self.word32())
    }

    fn fill(&mut self, out: &mut [u64]) {
        for slot in out.iter_mut() {
            *slot = self.next_u64();
        }
    }
}
