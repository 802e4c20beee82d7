use crate::{Access, Fault, GuestAddr, lock::LockedBuf};
use bitflags::bitflags;

bitflags! {
    /// Guest page permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Prot: u32 {
        const READ = 1;
        const WRITE = 2;
    }
}
impl Prot {
    fn allows(self, access: Access) -> bool {
        (!access.needs_read() || self.contains(Prot::READ))
            && (!access.needs_write() || self.contains(Prot::WRITE))
    }
}

/// A mapping request the address space cannot honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    ZeroLength,
    Overlap,
}
impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::ZeroLength => write!(f, "cannot map an empty range"),
            MapError::Overlap => write!(f, "mapping overlaps an existing region"),
        }
    }
}
impl std::error::Error for MapError {}

struct Region {
    base: u64,
    prot: Prot,
    bytes: Vec<u8>,
}
impl Region {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    fn contains(&self, addr: u64, len: usize) -> bool {
        self.base <= addr && addr.checked_add(len as u64).is_some_and(|end| end <= self.end())
    }
}

/// The guest's mapping table and backing memory.
///
/// A lockable range must lie entirely within one mapped region; ranges spanning two abutting
/// regions are faults.
#[derive(Default)]
pub struct AddressSpace {
    regions: Vec<Region>,
}
impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a zero-filled region at `base`. Loader-facing.
    pub fn map(&mut self, base: GuestAddr, len: usize, prot: Prot) -> Result<(), MapError> {
        if len == 0 {
            return Err(MapError::ZeroLength);
        }
        let end = base.0.checked_add(len as u64).ok_or(MapError::Overlap)?;
        if self
            .regions
            .iter()
            .any(|r| base.0 < r.end() && r.base < end)
        {
            return Err(MapError::Overlap);
        }
        self.regions.push(Region {
            base: base.0,
            prot,
            bytes: vec![0; len],
        });
        Ok(())
    }

    fn region(&self, addr: u64, len: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr, len))
    }

    fn region_mut(&mut self, addr: u64, len: usize) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(addr, len))
    }

    /// Locks `len` bytes at `addr` for the given access mode.
    ///
    /// On success the returned buffer holds a host copy of the range (zero-filled for
    /// write-only access) and pins the space until it is committed or dropped. A `len` of zero
    /// always succeeds with an empty buffer and validates nothing.
    pub fn lock(&mut self, addr: GuestAddr, len: usize, access: Access) -> Result<LockedBuf<'_>, Fault> {
        if len == 0 {
            return Ok(LockedBuf::new(self, addr, access, Vec::new()));
        }
        let fault = Fault { addr, len, access };
        let Some(region) = self.region(addr.0, len) else {
            return Err(fault);
        };
        if !region.prot.allows(access) {
            return Err(fault);
        }
        let off = (addr.0 - region.base) as usize;
        let bytes = if access.needs_read() {
            region.bytes[off..off + len].to_vec()
        } else {
            vec![0; len]
        };
        Ok(LockedBuf::new(self, addr, access, bytes))
    }

    /// Locks the NUL-terminated string at `addr` for reading, searching at most `max` bytes.
    ///
    /// The returned buffer excludes the terminator. When no terminator appears within `max`
    /// bytes of mapped memory, the full `max` bytes are returned and the caller's downstream
    /// length policy applies; running out of mapped memory first is a fault.
    pub fn lock_str(&mut self, addr: GuestAddr, max: usize) -> Result<LockedBuf<'_>, Fault> {
        if max == 0 {
            return Ok(LockedBuf::new(self, addr, Access::Read, Vec::new()));
        }
        let fault = Fault {
            addr,
            len: max,
            access: Access::Read,
        };
        let Some(region) = self.region(addr.0, 1) else {
            return Err(fault);
        };
        if !region.prot.allows(Access::Read) {
            return Err(fault);
        }
        let off = (addr.0 - region.base) as usize;
        let window = &region.bytes[off..region.bytes.len().min(off.saturating_add(max))];
        let len = match window.iter().position(|b| *b == 0) {
            Some(nul) => nul,
            None if window.len() == max => max,
            // the string runs off the end of the mapping before a terminator
            None => return Err(fault),
        };
        let bytes = window[..len].to_vec();
        Ok(LockedBuf::new(self, addr, Access::Read, bytes))
    }

    /// Copies bytes out of guest memory, honoring read permission.
    pub fn read(&self, addr: GuestAddr, len: usize) -> Result<Vec<u8>, Fault> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let fault = Fault {
            addr,
            len,
            access: Access::Read,
        };
        let region = self.region(addr.0, len).ok_or(fault)?;
        if !region.prot.contains(Prot::READ) {
            return Err(fault);
        }
        let off = (addr.0 - region.base) as usize;
        Ok(region.bytes[off..off + len].to_vec())
    }

    /// Copies bytes into guest memory, honoring write permission.
    pub fn write(&mut self, addr: GuestAddr, bytes: &[u8]) -> Result<(), Fault> {
        if bytes.is_empty() {
            return Ok(());
        }
        let fault = Fault {
            addr,
            len: bytes.len(),
            access: Access::Write,
        };
        let region = self.region_mut(addr.0, bytes.len()).ok_or(fault)?;
        if !region.prot.contains(Prot::WRITE) {
            return Err(fault);
        }
        let off = (addr.0 - region.base) as usize;
        region.bytes[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Flushes committed lock contents. The range was validated when the lock was taken.
    pub(crate) fn write_back(&mut self, addr: GuestAddr, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.region_mut(addr.0, bytes.len()) {
            Some(region) => {
                let off = (addr.0 - region.base) as usize;
                region.bytes[off..off + bytes.len()].copy_from_slice(bytes);
            }
            None => debug_assert!(false, "write-back outside any mapped region"),
        }
    }
}
