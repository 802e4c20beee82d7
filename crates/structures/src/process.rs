use crate::{abi::GuestAbi, abi::Endian, guestvariants, time::Timeval};
use std::ffi::c_int;

/// A resource-limit pair in host-friendly form, with the guest's `RLIM_INFINITY` convention.
///
/// The guest wire form is two 64-bit words in guest byte order (`rlim_t` is 64-bit on every
/// guest this core targets, regardless of `long` width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RLimit {
    pub rlim_cur: u64,
    pub rlim_max: u64,
}
impl RLimit {
    /// The guest's "unlimited" sentinel.
    pub const RLIM_INFINITY: u64 = 0x7fff_ffff_ffff_ffff;

    pub const WIRE_SIZE: usize = 16;

    pub fn from_host(host: libc::rlimit) -> Self {
        let map_value = |host: libc::rlim_t| match host {
            libc::RLIM_INFINITY => Self::RLIM_INFINITY,
            other => clamp_rlim(other as u64),
        };
        Self {
            rlim_cur: map_value(host.rlim_cur),
            rlim_max: map_value(host.rlim_max),
        }
    }

    pub fn to_host(self) -> libc::rlimit {
        let map_value = |guest: u64| match guest {
            Self::RLIM_INFINITY => libc::RLIM_INFINITY,
            other => other as libc::rlim_t,
        };
        libc::rlimit {
            rlim_cur: map_value(self.rlim_cur),
            rlim_max: map_value(self.rlim_max),
        }
    }

    /// Encodes into `out[..WIRE_SIZE]`.
    pub fn encode_to(&self, out: &mut [u8], endian: Endian) {
        out[..8].copy_from_slice(&endian.encode_u64(self.rlim_cur));
        out[8..16].copy_from_slice(&endian.encode_u64(self.rlim_max));
    }

    /// Decodes from `b[..WIRE_SIZE]`.
    pub fn decode_from(b: &[u8], endian: Endian) -> Self {
        let mut cur = [0; 8];
        let mut max = [0; 8];
        cur.copy_from_slice(&b[..8]);
        max.copy_from_slice(&b[8..16]);
        Self {
            rlim_cur: endian.decode_u64(cur),
            rlim_max: endian.decode_u64(max),
        }
    }
}

/// Clamps a finite host limit value into the guest's finite range.
///
/// The sentinel is reserved: a host value at or above it clamps to the largest finite guest
/// value so an enormous-but-bounded host limit never reads back as "unlimited".
pub fn clamp_rlim(v: u64) -> u64 {
    v.min(RLimit::RLIM_INFINITY - 1)
}

guestvariants! {
    pub struct ResourceKind: u32 {
        const RLIMIT_CPU = 0;
        const RLIMIT_FSIZE = 1;
        const RLIMIT_DATA = 2;
        const RLIMIT_STACK = 3;
        const RLIMIT_CORE = 4;
        const RLIMIT_RSS = 5;
        const RLIMIT_MEMLOCK = 6;
        const RLIMIT_NPROC = 7;
        const RLIMIT_NOFILE = 8;
        const RLIMIT_AS = 10;
        #[guest_only] const RLIMIT_SBSIZE = 9;
        #[guest_only] const RLIMIT_NPTS = 11;
        #[guest_only] const RLIMIT_SWAP = 12;
        #[guest_only] const RLIMIT_KQUEUES = 13;
        #[guest_only] const RLIMIT_UMTXP = 14;
        fn from_host(host: c_int) -> Result<Self, BsdError>;
        fn to_host(self) -> Result<libc::c_int, BsdError>;
    }
}

/// A BSD `struct rusage` in host-friendly form.
///
/// Every field the guest declares has a host source, so the conversion is a straight
/// field-by-field copy; the wire form re-expresses each field as a guest `long`.
#[derive(Debug, Clone, Default)]
pub struct RUsage {
    pub ru_utime: Timeval,
    pub ru_stime: Timeval,
    pub ru_maxrss: i64,
    pub ru_ixrss: i64,
    pub ru_idrss: i64,
    pub ru_isrss: i64,
    pub ru_minflt: i64,
    pub ru_majflt: i64,
    pub ru_nswap: i64,
    pub ru_inblock: i64,
    pub ru_oublock: i64,
    pub ru_msgsnd: i64,
    pub ru_msgrcv: i64,
    pub ru_nsignals: i64,
    pub ru_nvcsw: i64,
    pub ru_nivcsw: i64,
}
impl RUsage {
    pub fn from_host(host: libc::rusage) -> Self {
        Self {
            ru_utime: Timeval::from_host(host.ru_utime),
            ru_stime: Timeval::from_host(host.ru_stime),
            ru_maxrss: host.ru_maxrss as i64,
            ru_ixrss: host.ru_ixrss as i64,
            ru_idrss: host.ru_idrss as i64,
            ru_isrss: host.ru_isrss as i64,
            ru_minflt: host.ru_minflt as i64,
            ru_majflt: host.ru_majflt as i64,
            ru_nswap: host.ru_nswap as i64,
            ru_inblock: host.ru_inblock as i64,
            ru_oublock: host.ru_oublock as i64,
            ru_msgsnd: host.ru_msgsnd as i64,
            ru_msgrcv: host.ru_msgrcv as i64,
            ru_nsignals: host.ru_nsignals as i64,
            ru_nvcsw: host.ru_nvcsw as i64,
            ru_nivcsw: host.ru_nivcsw as i64,
        }
    }

    pub const fn wire_size(abi: GuestAbi) -> usize {
        // two timevals plus fourteen counters, all guest longs
        18 * abi.long_bytes()
    }

    /// Encodes into `out[..wire_size(abi)]`.
    pub fn encode_to(&self, out: &mut [u8], abi: GuestAbi) {
        let fields = [
            self.ru_utime.tv_sec,
            self.ru_utime.tv_usec,
            self.ru_stime.tv_sec,
            self.ru_stime.tv_usec,
            self.ru_maxrss,
            self.ru_ixrss,
            self.ru_idrss,
            self.ru_isrss,
            self.ru_minflt,
            self.ru_majflt,
            self.ru_nswap,
            self.ru_inblock,
            self.ru_oublock,
            self.ru_msgsnd,
            self.ru_msgrcv,
            self.ru_nsignals,
            self.ru_nvcsw,
            self.ru_nivcsw,
        ];
        let n = abi.long_bytes();
        for (i, v) in fields.iter().enumerate() {
            abi.encode_long(*v, &mut out[i * n..(i + 1) * n]);
        }
    }
}
