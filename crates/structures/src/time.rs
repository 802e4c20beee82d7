use crate::abi::GuestAbi;

/// A BSD `struct timeval` in host-friendly form.
///
/// The guest wire form is two guest `long`s, so seconds and microseconds both clamp on guests
/// narrower than the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeval {
    pub tv_sec: i64,
    pub tv_usec: i64,
}
impl Timeval {
    pub fn from_host(host: libc::timeval) -> Self {
        Self {
            tv_sec: host.tv_sec as i64,
            tv_usec: host.tv_usec as i64,
        }
    }

    pub const fn wire_size(abi: GuestAbi) -> usize {
        2 * abi.long_bytes()
    }

    /// Encodes into `out[..wire_size(abi)]`.
    pub fn encode_to(&self, out: &mut [u8], abi: GuestAbi) {
        let n = abi.long_bytes();
        abi.encode_long(self.tv_sec, &mut out[..n]);
        abi.encode_long(self.tv_usec, &mut out[n..2 * n]);
    }
}
