//! Structures and definitions of guest BSD types, along with utilities converting them from and
//! to the host ones.
//!
//! The guest side of every conversion is a byte-exact wire form governed by the
//! [`abi::GuestAbi`] profile (byte order plus primitive widths); the host side is whatever the
//! native `libc` declares. Conversions are total: values that do not fit a narrower guest
//! representation are clamped through the explicit helpers in [`abi`] and [`process`], never
//! wrapped.

pub mod abi;
pub mod error;
pub mod process;
pub mod security;
pub mod time;

/// Converts a value from the host platform to the guest platform.
pub trait FromHost: Sized {
    /// The type of the host platform representation.
    type Host;

    /// Converts a value from the host platform to the guest platform.
    fn from_host(host: Self::Host) -> Result<Self, error::BsdError>;
}

/// Converts a value from the guest platform to the host platform.
pub trait ToHost {
    /// The type of the host platform representation.
    type Host;

    /// Converts a value from the guest platform to the host platform.
    fn to_host(self) -> Result<Self::Host, error::BsdError>;
}

/// Declares a guest-numbered constant set with total mappings to and from the host's `libc`
/// constants.
///
/// Constants marked `#[guest_only]` exist in the guest numbering but have no host counterpart;
/// converting one to the host yields `EINVAL`. `#[host = NAME]` maps a guest constant onto a
/// differently-named host constant. Comparisons are cast through the declared host type, so the
/// same table compiles against hosts that type these constants differently.
#[macro_export]
macro_rules! guestvariants {
    {
        $(#[$outer:meta])*
        $v:vis struct $n:ident: $t:ty {
            $(const $j:ident = $k:expr;)*
            $(#[guest_only] const $h:ident = $i:expr;)*
            $(#[host = $an:ident] const $l:ident = $m:expr;)*

            fn from_host($_:ident: $ati:ty) -> Result<Self, BsdError>;
            fn to_host(self) -> Result<$ato:ty, BsdError>;
        }
    } => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $v struct $n(pub $t);
        impl $n {
            $(
                pub const $j: Self = Self($k);
            )*
            $(
                pub const $h: Self = Self($i);
            )*
            $(
                pub const $l: Self = Self($m);
            )*
        }
        impl $crate::FromHost for $n {
            type Host = $ati;

            fn from_host(host: $ati) -> Result<Self, $crate::error::BsdError> {
                $(
                    if host == libc::$j as $ati {
                        return Ok(Self::$j);
                    }
                )*
                $(
                    if host == libc::$an as $ati {
                        return Ok(Self::$l);
                    }
                )*
                Err($crate::error::BsdError::EINVAL)
            }
        }
        impl $crate::ToHost for $n {
            type Host = $ato;

            fn to_host(self) -> Result<$ato, $crate::error::BsdError> {
                $(
                    if self == Self::$j {
                        return Ok(libc::$j as $ato);
                    }
                )*
                $(
                    if self == Self::$l {
                        return Ok(libc::$an as $ato);
                    }
                )*
                Err($crate::error::BsdError::EINVAL)
            }
        }
    };
}
