//! The guest address space and its accessor.
//!
//! Host code never dereferences a guest address. It asks the [`AddressSpace`] to lock a range,
//! works on the returned [`LockedBuf`], and either commits the dirty bytes back or lets the
//! buffer drop on an error path. The mutable borrow held by a live lock is the pin: while a
//! range is locked, no other lock can be taken out and no mapping can change.

mod lock;
mod space;

pub use lock::LockedBuf;
pub use space::{AddressSpace, MapError, Prot};

use structures::error::BsdError;

/// A guest virtual address. Meaningful only inside the guest's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct GuestAddr(pub u64);
impl std::fmt::Display for GuestAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// How a locked range will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}
impl Access {
    pub fn needs_read(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn needs_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// A rejected guest memory access: unmapped range, permission mismatch, or a range that
/// crosses out of its mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub addr: GuestAddr,
    pub len: usize,
    pub access: Access,
}
impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "guest memory fault: {:?} access of {} bytes at {}",
            self.access, self.len, self.addr
        )
    }
}
impl std::error::Error for Fault {}

impl From<Fault> for BsdError {
    fn from(fault: Fault) -> Self {
        log::debug!("{fault}");
        BsdError::EFAULT
    }
}
