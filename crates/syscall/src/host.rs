//! The host operation seam.
//!
//! Adapters never call `libc` directly; they go through [`HostOps`] so the host side can be
//! swapped for a recording double in tests. [`NativeHost`] is the production implementation.

use structures::error::BsdError;

macro_rules! posix_num {
    ($x:expr) => {
        match $x {
            -1 => Err(BsdError::last_host_error()),
            n => Ok(n as _),
        }
    };
}

macro_rules! posix_bi {
    ($x:expr) => {
        match $x {
            -1 => Err(BsdError::last_host_error()),
            _ => Ok(()),
        }
    };
}

/// The host primitives backing the emulated process syscalls.
pub trait HostOps {
    /// Fills `grouplist` with the supplementary groups and returns the true group count.
    /// An empty `grouplist` still reports the count.
    fn getgroups(&self, grouplist: &mut [libc::gid_t]) -> Result<usize, BsdError>;

    fn setgroups(&self, grouplist: &[libc::gid_t]) -> Result<(), BsdError>;

    /// Never fails; returns the previous mask.
    fn umask(&self, mask: libc::mode_t) -> libc::mode_t;

    fn setlogin(&self, name: &[u8]) -> Result<(), BsdError>;

    /// Writes the login name, NUL-terminated, into `buf`; `ERANGE` when it does not fit.
    fn getlogin(&self, buf: &mut [u8]) -> Result<(), BsdError>;

    fn getrusage(&self, who: i32) -> Result<libc::rusage, BsdError>;

    fn getrlimit(&self, resource: i32) -> Result<libc::rlimit, BsdError>;

    fn setrlimit(&self, resource: i32, rlim: libc::rlimit) -> Result<(), BsdError>;

    /// The non-returning process terminate primitive.
    fn exit(&self, code: i32) -> !;
}

/// [`HostOps`] over the native `libc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl HostOps for NativeHost {
    fn getgroups(&self, grouplist: &mut [libc::gid_t]) -> Result<usize, BsdError> {
        unsafe {
            posix_num!(libc::getgroups(
                grouplist.len() as libc::c_int,
                grouplist.as_mut_ptr(),
            ))
        }
    }

    fn setgroups(&self, grouplist: &[libc::gid_t]) -> Result<(), BsdError> {
        unsafe { posix_bi!(libc::setgroups(grouplist.len() as _, grouplist.as_ptr())) }
    }

    fn umask(&self, mask: libc::mode_t) -> libc::mode_t {
        unsafe { libc::umask(mask) }
    }

    #[cfg(target_os = "freebsd")]
    fn setlogin(&self, name: &[u8]) -> Result<(), BsdError> {
        let name = std::ffi::CString::new(name).map_err(|_| BsdError::EINVAL)?;
        unsafe { posix_bi!(libc::setlogin(name.as_ptr())) }
    }

    // hosts without a login-name primitive
    #[cfg(not(target_os = "freebsd"))]
    fn setlogin(&self, _name: &[u8]) -> Result<(), BsdError> {
        Err(BsdError::ENOSYS)
    }

    fn getlogin(&self, buf: &mut [u8]) -> Result<(), BsdError> {
        unsafe {
            let name = libc::getlogin();
            if name.is_null() {
                return Err(BsdError::last_host_error());
            }
            let name = std::ffi::CStr::from_ptr(name).to_bytes();
            if name.len() + 1 > buf.len() {
                return Err(BsdError::ERANGE);
            }
            buf[..name.len()].copy_from_slice(name);
            buf[name.len()] = 0;
            Ok(())
        }
    }

    fn getrusage(&self, who: i32) -> Result<libc::rusage, BsdError> {
        unsafe {
            let mut buf = std::mem::zeroed();
            posix_bi!(libc::getrusage(who, &mut buf))?;
            Ok(buf)
        }
    }

    fn getrlimit(&self, resource: i32) -> Result<libc::rlimit, BsdError> {
        unsafe {
            let mut buf = std::mem::zeroed();
            posix_bi!(libc::getrlimit(resource as _, &mut buf))?;
            Ok(buf)
        }
    }

    fn setrlimit(&self, resource: i32, rlim: libc::rlimit) -> Result<(), BsdError> {
        unsafe { posix_bi!(libc::setrlimit(resource as _, &rlim)) }
    }

    fn exit(&self, code: i32) -> ! {
        unsafe { libc::_exit(code) }
    }
}
