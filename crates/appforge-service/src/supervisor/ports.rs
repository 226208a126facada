//! Bounded pool of dev-server ports.
//!
//! Pure bookkeeping: the allocator never probes the OS. A port is live
//! exactly as long as the supervisor holds a lease for it.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port pool exhausted ({size} ports in use)")]
    Exhausted { size: usize },
}

pub struct PortAllocator {
    inner: Mutex<Pool>,
}

struct Pool {
    free: BTreeSet<u16>,
    size: usize,
}

impl PortAllocator {
    /// Pool covering `[base, base + count)`.
    pub fn new(base: u16, count: u16) -> Self {
        let free: BTreeSet<u16> = (0..count).map(|i| base + i).collect();
        let size = free.len();
        Self {
            inner: Mutex::new(Pool { free, size }),
        }
    }

    /// Lease the lowest free port.
    pub fn acquire(&self) -> Result<u16, PortError> {
        let mut pool = self.inner.lock();
        let port = pool
            .free
            .iter()
            .next()
            .copied()
            .ok_or(PortError::Exhausted { size: pool.size })?;
        pool.free.remove(&port);
        Ok(port)
    }

    /// Return a port to the pool.
    pub fn release(&self, port: u16) {
        self.inner.lock().free.insert(port);
    }

    pub fn available(&self) -> usize {
        self.inner.lock().free.len()
    }
}
