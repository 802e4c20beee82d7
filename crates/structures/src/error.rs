use crate::{FromHost, guestvariants};
use std::ffi::c_int;

guestvariants! {
    pub struct BsdError: u32 {
        const EPERM = 1;
        const ENOENT = 2;
        const ESRCH = 3;
        const EINTR = 4;
        const EIO = 5;
        const ENXIO = 6;
        const E2BIG = 7;
        const ENOEXEC = 8;
        const EBADF = 9;
        const ECHILD = 10;
        const EDEADLK = 11;
        const ENOMEM = 12;
        const EACCES = 13;
        const EFAULT = 14;
        const ENOTBLK = 15;
        const EBUSY = 16;
        const EEXIST = 17;
        const EXDEV = 18;
        const ENODEV = 19;
        const ENOTDIR = 20;
        const EISDIR = 21;
        const EINVAL = 22;
        const ENFILE = 23;
        const EMFILE = 24;
        const ENOTTY = 25;
        const ETXTBSY = 26;
        const EFBIG = 27;
        const ENOSPC = 28;
        const ESPIPE = 29;
        const EROFS = 30;
        const EMLINK = 31;
        const EPIPE = 32;
        const EDOM = 33;
        const ERANGE = 34;
        const EAGAIN = 35;
        const EINPROGRESS = 36;
        const EALREADY = 37;
        const ENOTSOCK = 38;
        const EDESTADDRREQ = 39;
        const EMSGSIZE = 40;
        const EPROTOTYPE = 41;
        const ENOPROTOOPT = 42;
        const EPROTONOSUPPORT = 43;
        const ESOCKTNOSUPPORT = 44;
        const EOPNOTSUPP = 45;
        const EPFNOSUPPORT = 46;
        const EAFNOSUPPORT = 47;
        const EADDRINUSE = 48;
        const EADDRNOTAVAIL = 49;
        const ENETDOWN = 50;
        const ENETUNREACH = 51;
        const ENETRESET = 52;
        const ECONNABORTED = 53;
        const ECONNRESET = 54;
        const ENOBUFS = 55;
        const EISCONN = 56;
        const ENOTCONN = 57;
        const ESHUTDOWN = 58;
        const ETOOMANYREFS = 59;
        const ETIMEDOUT = 60;
        const ECONNREFUSED = 61;
        const ELOOP = 62;
        const ENAMETOOLONG = 63;
        const EHOSTDOWN = 64;
        const EHOSTUNREACH = 65;
        const ENOTEMPTY = 66;
        const EUSERS = 68;
        const EDQUOT = 69;
        const ESTALE = 70;
        const EREMOTE = 71;
        const ENOLCK = 77;
        const ENOSYS = 78;
        const EIDRM = 82;
        const ENOMSG = 83;
        const EOVERFLOW = 84;
        const ECANCELED = 85;
        const EILSEQ = 86;
        const EBADMSG = 89;
        const EMULTIHOP = 90;
        const ENOLINK = 91;
        const EPROTO = 92;
        const ENOTRECOVERABLE = 95;
        const EOWNERDEAD = 96;
        #[guest_only] const EPROCLIM = 67;
        #[guest_only] const EFTYPE = 79;
        #[guest_only] const ENOATTR = 87;
        #[guest_only] const ENOTCAPABLE = 93;
        #[guest_only] const ECAPMODE = 94;
        fn from_host(host: c_int) -> Result<Self, BsdError>;
        fn to_host(self) -> Result<libc::c_int, BsdError>;
    }
}
impl BsdError {
    /// Reads the calling thread's `errno` and maps it into the guest numbering.
    ///
    /// Host indicators without a table entry degrade to `EIO`; the table is expected to cover
    /// everything the emulated operations can produce, and the tests pin that expectation.
    pub fn last_host_error() -> Self {
        match std::io::Error::last_os_error().raw_os_error() {
            Some(x) => Self::from_host(x).unwrap_or(Self::EIO),
            None => Self::EIO,
        }
    }
}
impl From<std::io::Error> for BsdError {
    fn from(value: std::io::Error) -> Self {
        match value.raw_os_error() {
            Some(x) => Self::from_host(x).unwrap_or(Self::EIO),
            None => Self::EIO,
        }
    }
}
