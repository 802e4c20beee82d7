//! System call adapters bridging the guest BSD ABI onto the host.
//!
//! Each `sys_*` function receives raw argument words already routed by the dispatcher,
//! validates and locks any guest memory it touches, converts layouts through `structures`,
//! performs the one host operation it stands for, and folds the outcome into the guest's
//! signed-result convention via [`ToSysret`].

pub mod host;
pub mod proc;

pub use host::{HostOps, NativeHost};
pub use proc::{ExitHook, Proc, ProcConfig};

use structures::error::BsdError;

/// The dispatcher-facing result word: non-negative payload on success, negated guest errno on
/// failure.
pub type Sysret = i64;

/// Folds an adapter outcome into a [`Sysret`].
pub trait ToSysret {
    fn to_sysret(self) -> Sysret;
}
impl ToSysret for () {
    fn to_sysret(self) -> Sysret {
        0
    }
}
impl ToSysret for i32 {
    fn to_sysret(self) -> Sysret {
        self as Sysret
    }
}
impl ToSysret for u32 {
    fn to_sysret(self) -> Sysret {
        self as Sysret
    }
}
impl ToSysret for i64 {
    fn to_sysret(self) -> Sysret {
        self
    }
}
impl ToSysret for usize {
    fn to_sysret(self) -> Sysret {
        self as Sysret
    }
}
impl<T: ToSysret> ToSysret for Result<T, BsdError> {
    fn to_sysret(self) -> Sysret {
        match self {
            Ok(value) => value.to_sysret(),
            Err(err) => -(err.0 as Sysret),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_payloads_pass_through() {
        assert_eq!(Ok::<u32, BsdError>(7).to_sysret(), 7);
        assert_eq!(Ok::<(), BsdError>(()).to_sysret(), 0);
    }

    #[test]
    fn errors_negate_the_guest_number() {
        assert_eq!(Err::<u32, BsdError>(BsdError::EFAULT).to_sysret(), -14);
        assert_eq!(Err::<(), BsdError>(BsdError::EPERM).to_sysret(), -1);
    }
}
