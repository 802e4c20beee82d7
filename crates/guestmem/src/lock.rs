use crate::{Access, AddressSpace, GuestAddr};
use std::ops::{Deref, DerefMut};

/// A scoped, host-addressable view over a locked guest range.
///
/// The buffer mutably borrows its [`AddressSpace`], so the mapping table cannot change and no
/// second lock can be taken while it is alive. [`commit`](Self::commit) flushes dirty bytes
/// back into guest memory; dropping the buffer instead releases the range untouched, which is
/// what every early-error path wants.
pub struct LockedBuf<'a> {
    space: &'a mut AddressSpace,
    addr: GuestAddr,
    access: Access,
    bytes: Vec<u8>,
}
impl<'a> LockedBuf<'a> {
    pub(crate) fn new(
        space: &'a mut AddressSpace,
        addr: GuestAddr,
        access: Access,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            space,
            addr,
            access,
            bytes,
        }
    }

    pub fn addr(&self) -> GuestAddr {
        self.addr
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Flushes the first `dirty_len` bytes back to the guest and releases the range.
    ///
    /// Only meaningful for write-capable buffers; a read-only buffer must commit zero bytes.
    /// The range was validated at lock time, so the flush itself cannot fault.
    pub fn commit(self, dirty_len: usize) {
        assert!(dirty_len <= self.bytes.len(), "commit beyond the locked range");
        debug_assert!(
            dirty_len == 0 || self.access.needs_write(),
            "committing through a read-only lock"
        );
        self.space.write_back(self.addr, &self.bytes[..dirty_len]);
    }
}
impl Deref for LockedBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}
impl DerefMut for LockedBuf<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}
