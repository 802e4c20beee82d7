//! Process-related system call adapters.
//!
//! Each adapter is a thin composition: lock the guest memory it will touch, convert layouts,
//! perform the single host operation, convert back, commit. Guest memory faults short-circuit
//! to `EFAULT` before the host is ever involved, and explicit policy (the stack-limit
//! rejection, the emulator-configured stack/data limits) takes precedence over host calls.

use crate::{HostOps, Sysret, ToSysret};
use guestmem::{Access, AddressSpace, GuestAddr};
use log::{debug, trace};
use structures::{
    ToHost,
    abi::{Endian, GuestAbi, LongWidth},
    error::BsdError,
    process::{RLimit, RUsage, ResourceKind},
    security::{self, GID_WIRE_SIZE, NGROUPS_MAX},
};

/// Process-wide immutable configuration, fixed when the guest process is created.
#[derive(Debug, Clone)]
pub struct ProcConfig {
    pub abi: GuestAbi,
    /// Served for `RLIMIT_STACK` queries instead of the host's own limit.
    pub stack_limit: RLimit,
    /// Served for `RLIMIT_DATA` queries instead of the host's own limit.
    pub data_limit: RLimit,
    /// Longest login name accepted from the guest, terminator included.
    pub max_login_len: usize,
}
impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            abi: GuestAbi {
                endian: Endian::native(),
                long_width: LongWidth::L64,
            },
            stack_limit: RLimit {
                rlim_cur: 8 << 20,
                rlim_max: 512 << 20,
            },
            data_limit: RLimit {
                rlim_cur: 128 << 20,
                rlim_max: 32 << 30,
            },
            max_login_len: security::MAXLOGNAME,
        }
    }
}

/// Emulator-side teardown run by [`sys_exit`] before the host terminate primitive.
pub trait ExitHook {
    fn on_exit(&self, code: i32);
}

/// The per-invocation view of one emulated guest process.
pub struct Proc<'a, H> {
    pub mem: &'a mut AddressSpace,
    pub host: &'a H,
    pub config: &'a ProcConfig,
    /// Run in order, exactly once, on the way out.
    pub exit_hooks: &'a [Box<dyn ExitHook>],
}

// -== Process Lifetime ==-

/// exit(2)
pub fn sys_exit<H: HostOps>(proc: &mut Proc<H>, code: i64) -> ! {
    let code = code as i32;
    for hook in proc.exit_hooks {
        hook.on_exit(code);
    }
    proc.host.exit(code)
}

// -== Credentials ==-

/// getgroups(2)
pub fn sys_getgroups<H: HostOps>(proc: &mut Proc<H>, gidsetsize: i64, list: GuestAddr) -> Sysret {
    do_getgroups(proc, gidsetsize, list).to_sysret()
}

fn do_getgroups<H: HostOps>(
    proc: &mut Proc<H>,
    gidsetsize: i64,
    list: GuestAddr,
) -> Result<i64, BsdError> {
    if !(0..=NGROUPS_MAX as i64).contains(&gidsetsize) {
        return Err(BsdError::EINVAL);
    }
    let gidsetsize = gidsetsize as usize;
    if gidsetsize == 0 {
        // report the true count without touching guest memory
        return Ok(proc.host.getgroups(&mut [])? as i64);
    }
    let mut wire = proc.mem.lock(list, gidsetsize * GID_WIRE_SIZE, Access::Write)?;
    let mut grouplist = vec![0 as libc::gid_t; gidsetsize];
    let count = proc.host.getgroups(&mut grouplist)?;
    let copied = count.min(gidsetsize);
    security::gids_to_guest(&grouplist[..copied], &mut wire, proc.config.abi.endian);
    wire.commit(copied * GID_WIRE_SIZE);
    Ok(count as i64)
}

/// setgroups(2)
pub fn sys_setgroups<H: HostOps>(proc: &mut Proc<H>, gidsetsize: i64, list: GuestAddr) -> Sysret {
    do_setgroups(proc, gidsetsize, list).to_sysret()
}

fn do_setgroups<H: HostOps>(
    proc: &mut Proc<H>,
    gidsetsize: i64,
    list: GuestAddr,
) -> Result<(), BsdError> {
    if !(0..=NGROUPS_MAX as i64).contains(&gidsetsize) {
        return Err(BsdError::EINVAL);
    }
    let gidsetsize = gidsetsize as usize;
    let wire = proc.mem.lock(list, gidsetsize * GID_WIRE_SIZE, Access::Read)?;
    let grouplist = security::gids_from_guest(&wire, proc.config.abi.endian);
    drop(wire);
    proc.host.setgroups(&grouplist)
}

/// umask(2)
pub fn sys_umask<H: HostOps>(proc: &mut Proc<H>, mask: i64) -> Sysret {
    proc.host.umask(mask as libc::mode_t) as Sysret
}

/// setlogin(2)
pub fn sys_setlogin<H: HostOps>(proc: &mut Proc<H>, name: GuestAddr) -> Sysret {
    do_setlogin(proc, name).to_sysret()
}

fn do_setlogin<H: HostOps>(proc: &mut Proc<H>, name: GuestAddr) -> Result<(), BsdError> {
    let name = {
        let buf = proc.mem.lock_str(name, proc.config.max_login_len)?;
        buf.to_vec()
    };
    proc.host.setlogin(&name)
}

/// getlogin(2)
pub fn sys_getlogin<H: HostOps>(proc: &mut Proc<H>, buf: GuestAddr, len: i64) -> Sysret {
    do_getlogin(proc, buf, len).to_sysret()
}

fn do_getlogin<H: HostOps>(proc: &mut Proc<H>, buf: GuestAddr, len: i64) -> Result<(), BsdError> {
    if len < 0 {
        return Err(BsdError::EINVAL);
    }
    let mut wire = proc.mem.lock(buf, len as usize, Access::Write)?;
    proc.host.getlogin(&mut wire)?;
    let len = wire.len();
    wire.commit(len);
    Ok(())
}

// -== Resource Limits and Accounting ==-

/// getrusage(2)
pub fn sys_getrusage<H: HostOps>(proc: &mut Proc<H>, who: i64, usage: GuestAddr) -> Sysret {
    do_getrusage(proc, who, usage).to_sysret()
}

fn do_getrusage<H: HostOps>(
    proc: &mut Proc<H>,
    who: i64,
    usage: GuestAddr,
) -> Result<(), BsdError> {
    let size = RUsage::wire_size(proc.config.abi);
    let mut wire = proc.mem.lock(usage, size, Access::Write)?;
    // `who` passes through untranslated; the host performs its own selector validation
    let usage = RUsage::from_host(proc.host.getrusage(who as i32)?);
    usage.encode_to(&mut wire, proc.config.abi);
    wire.commit(size);
    Ok(())
}

/// getrlimit(2)
pub fn sys_getrlimit<H: HostOps>(proc: &mut Proc<H>, resource: i64, rlp: GuestAddr) -> Sysret {
    do_getrlimit(proc, resource, rlp).to_sysret()
}

fn do_getrlimit<H: HostOps>(
    proc: &mut Proc<H>,
    resource: i64,
    rlp: GuestAddr,
) -> Result<(), BsdError> {
    let kind = ResourceKind(resource as u32);
    let mut wire = proc.mem.lock(rlp, RLimit::WIRE_SIZE, Access::Write)?;
    let rlim = match kind {
        // the guest's stack and data segments are laid out by the emulator, not the host
        ResourceKind::RLIMIT_STACK => {
            trace!("getrlimit: serving configured stack limit");
            proc.config.stack_limit
        }
        ResourceKind::RLIMIT_DATA => {
            trace!("getrlimit: serving configured data limit");
            proc.config.data_limit
        }
        other => RLimit::from_host(proc.host.getrlimit(other.to_host()?)?),
    };
    rlim.encode_to(&mut wire, proc.config.abi.endian);
    wire.commit(RLimit::WIRE_SIZE);
    Ok(())
}

/// setrlimit(2)
pub fn sys_setrlimit<H: HostOps>(proc: &mut Proc<H>, resource: i64, rlp: GuestAddr) -> Sysret {
    do_setrlimit(proc, resource, rlp).to_sysret()
}

fn do_setrlimit<H: HostOps>(
    proc: &mut Proc<H>,
    resource: i64,
    rlp: GuestAddr,
) -> Result<(), BsdError> {
    let kind = ResourceKind(resource as u32);
    if kind == ResourceKind::RLIMIT_STACK {
        // the guest stack cannot be resized after process creation
        debug!("setrlimit: rejecting guest stack resize");
        return Err(BsdError::EPERM);
    }
    let wire = proc.mem.lock(rlp, RLimit::WIRE_SIZE, Access::Read)?;
    let rlim = RLimit::decode_from(&wire, proc.config.abi.endian);
    drop(wire);
    proc.host.setrlimit(kind.to_host()?, rlim.to_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestmem::Prot;
    use std::cell::RefCell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    #[derive(Default)]
    struct MockHost {
        calls: RefCell<Vec<&'static str>>,
        groups: Vec<libc::gid_t>,
        login: &'static [u8],
        rlimit: (u64, u64),
        utime_sec: i64,
        maxrss: i64,
        seen_groups: RefCell<Option<Vec<libc::gid_t>>>,
        seen_login: RefCell<Option<Vec<u8>>>,
        seen_rlimit: RefCell<Option<(i32, libc::rlim_t, libc::rlim_t)>>,
    }
    impl MockHost {
        fn called(&self, name: &'static str) {
            self.calls.borrow_mut().push(name);
        }

        fn host_calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }
    impl HostOps for MockHost {
        fn getgroups(&self, grouplist: &mut [libc::gid_t]) -> Result<usize, BsdError> {
            self.called("getgroups");
            if !grouplist.is_empty() && grouplist.len() < self.groups.len() {
                return Err(BsdError::EINVAL);
            }
            let n = self.groups.len().min(grouplist.len());
            grouplist[..n].copy_from_slice(&self.groups[..n]);
            Ok(self.groups.len())
        }

        fn setgroups(&self, grouplist: &[libc::gid_t]) -> Result<(), BsdError> {
            self.called("setgroups");
            *self.seen_groups.borrow_mut() = Some(grouplist.to_vec());
            Ok(())
        }

        fn umask(&self, mask: libc::mode_t) -> libc::mode_t {
            self.called("umask");
            mask.wrapping_add(1)
        }

        fn setlogin(&self, name: &[u8]) -> Result<(), BsdError> {
            self.called("setlogin");
            *self.seen_login.borrow_mut() = Some(name.to_vec());
            Ok(())
        }

        fn getlogin(&self, buf: &mut [u8]) -> Result<(), BsdError> {
            self.called("getlogin");
            if self.login.len() + 1 > buf.len() {
                return Err(BsdError::ERANGE);
            }
            buf[..self.login.len()].copy_from_slice(self.login);
            buf[self.login.len()] = 0;
            Ok(())
        }

        fn getrusage(&self, _who: i32) -> Result<libc::rusage, BsdError> {
            self.called("getrusage");
            let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
            usage.ru_utime.tv_sec = self.utime_sec as _;
            usage.ru_maxrss = self.maxrss as _;
            Ok(usage)
        }

        fn getrlimit(&self, _resource: i32) -> Result<libc::rlimit, BsdError> {
            self.called("getrlimit");
            Ok(libc::rlimit {
                rlim_cur: self.rlimit.0 as _,
                rlim_max: self.rlimit.1 as _,
            })
        }

        fn setrlimit(&self, resource: i32, rlim: libc::rlimit) -> Result<(), BsdError> {
            self.called("setrlimit");
            *self.seen_rlimit.borrow_mut() = Some((resource, rlim.rlim_cur, rlim.rlim_max));
            Ok(())
        }

        fn exit(&self, code: i32) -> ! {
            self.called("exit");
            panic!("host exit({code})");
        }
    }

    struct RecordingHook {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }
    impl ExitHook for RecordingHook {
        fn on_exit(&self, code: i32) {
            self.log.borrow_mut().push(format!("{}:{code}", self.name));
        }
    }

    const PAGE: GuestAddr = GuestAddr(0x1000);

    fn mapped_space() -> AddressSpace {
        let mut space = AddressSpace::new();
        space.map(PAGE, 0x1000, Prot::READ | Prot::WRITE).unwrap();
        space
    }

    fn efault() -> Sysret {
        -(BsdError::EFAULT.0 as Sysret)
    }

    #[test]
    fn exit_runs_hooks_once_in_order_before_the_host_terminates() {
        for code in [0i64, 1, -1] {
            let log = Rc::new(RefCell::new(Vec::new()));
            let hooks: Vec<Box<dyn ExitHook>> = vec![
                Box::new(RecordingHook {
                    name: "debug-detach",
                    log: log.clone(),
                }),
                Box::new(RecordingHook {
                    name: "profile-flush",
                    log: log.clone(),
                }),
            ];
            let host = MockHost::default();
            let config = ProcConfig::default();
            let mut mem = AddressSpace::new();
            let mut proc = Proc {
                mem: &mut mem,
                host: &host,
                config: &config,
                exit_hooks: &hooks,
            };
            let unwind = catch_unwind(AssertUnwindSafe(|| sys_exit(&mut proc, code)));
            assert!(unwind.is_err());
            assert_eq!(
                *log.borrow(),
                vec![
                    format!("debug-detach:{}", code as i32),
                    format!("profile-flush:{}", code as i32),
                ]
            );
            assert_eq!(host.host_calls(), ["exit"]);
        }
    }

    #[test]
    fn invalid_addresses_fault_before_any_host_call() {
        let host = MockHost {
            groups: vec![1, 2],
            login: b"toor",
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = AddressSpace::new();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };
        let bad = GuestAddr(0xbad0);

        assert_eq!(sys_getgroups(&mut proc, 2, bad), efault());
        assert_eq!(sys_setgroups(&mut proc, 2, bad), efault());
        assert_eq!(sys_setlogin(&mut proc, bad), efault());
        assert_eq!(sys_getlogin(&mut proc, bad, 16), efault());
        assert_eq!(sys_getrusage(&mut proc, 0, bad), efault());
        assert_eq!(sys_getrlimit(&mut proc, ResourceKind::RLIMIT_CPU.0 as i64, bad), efault());
        assert_eq!(sys_setrlimit(&mut proc, ResourceKind::RLIMIT_CPU.0 as i64, bad), efault());

        assert!(host.host_calls().is_empty());
    }

    #[test]
    fn getgroups_with_zero_size_reports_count_without_touching_memory() {
        let host = MockHost {
            groups: vec![10, 20, 30],
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        mem.write(PAGE, &[0xaa; 16]).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getgroups(&mut proc, 0, PAGE), 3);
        assert_eq!(host.host_calls(), ["getgroups"]);
        assert_eq!(mem.read(PAGE, 16).unwrap(), vec![0xaa; 16]);
    }

    #[test]
    fn getgroups_copies_back_only_the_actual_count() {
        let host = MockHost {
            groups: vec![10, 20],
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        mem.write(PAGE, &[0xaa; 16]).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getgroups(&mut proc, 4, PAGE), 2);
        let endian = config.abi.endian;
        let wire = mem.read(PAGE, 16).unwrap();
        assert_eq!(security::gids_from_guest(&wire[..8], endian), vec![10, 20]);
        // the tail of the guest buffer stays as it was
        assert_eq!(&wire[8..], &[0xaa; 8]);
    }

    #[test]
    fn setgroups_converts_the_guest_list_in_order() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let mut wire = vec![0; 12];
        security::gids_to_guest(&[7, 5, 3], &mut wire, config.abi.endian);
        mem.write(PAGE, &wire).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_setgroups(&mut proc, 3, PAGE), 0);
        assert_eq!(host.seen_groups.borrow().as_deref(), Some(&[7, 5, 3][..]));
    }

    #[test]
    fn umask_passes_the_mask_straight_through() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = AddressSpace::new();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_umask(&mut proc, 0o22), 0o23);
        assert_eq!(host.host_calls(), ["umask"]);
    }

    #[test]
    fn setlogin_reads_the_guest_string() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        mem.write(PAGE, b"operator\0").unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_setlogin(&mut proc, PAGE), 0);
        assert_eq!(host.seen_login.borrow().as_deref(), Some(&b"operator"[..]));
    }

    #[test]
    fn getlogin_writes_within_the_caller_bound() {
        let host = MockHost {
            login: b"toor",
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        mem.write(PAGE, &[0xaa; 32]).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getlogin(&mut proc, PAGE, 16), 0);
        let wire = mem.read(PAGE, 32).unwrap();
        assert_eq!(&wire[..5], b"toor\0");
        // bytes past the caller's bound are untouched
        assert_eq!(&wire[16..], &[0xaa; 16]);
    }

    #[test]
    fn getlogin_propagates_range_errors_without_writing() {
        let host = MockHost {
            login: b"administrator",
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        mem.write(PAGE, &[0xaa; 8]).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getlogin(&mut proc, PAGE, 8), -(BsdError::ERANGE.0 as Sysret));
        assert_eq!(mem.read(PAGE, 8).unwrap(), vec![0xaa; 8]);
    }

    #[test]
    fn getrusage_converts_the_host_snapshot() {
        let host = MockHost {
            utime_sec: 5,
            maxrss: 42,
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getrusage(&mut proc, 0, PAGE), 0);
        let abi = config.abi;
        let wire = mem.read(PAGE, RUsage::wire_size(abi)).unwrap();
        assert_eq!(abi.decode_long(&wire[..8]), 5);
        // ru_maxrss sits after the two timevals
        assert_eq!(abi.decode_long(&wire[32..40]), 42);
    }

    #[test]
    fn getrlimit_serves_configured_stack_and_data_limits() {
        let host = MockHost {
            rlimit: (111, 222),
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let hooks = Vec::new();

        for (kind, expected) in [
            (ResourceKind::RLIMIT_STACK, config.stack_limit),
            (ResourceKind::RLIMIT_DATA, config.data_limit),
        ] {
            let mut proc = Proc {
                mem: &mut mem,
                host: &host,
                config: &config,
                exit_hooks: &hooks,
            };
            assert_eq!(sys_getrlimit(&mut proc, kind.0 as i64, PAGE), 0);
            let wire = mem.read(PAGE, RLimit::WIRE_SIZE).unwrap();
            assert_eq!(RLimit::decode_from(&wire, config.abi.endian), expected);
        }
        // the host was never asked
        assert!(host.host_calls().is_empty());
    }

    #[test]
    fn getrlimit_queries_the_host_for_other_kinds() {
        let host = MockHost {
            rlimit: (256, 1024),
            ..Default::default()
        };
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_getrlimit(&mut proc, ResourceKind::RLIMIT_NOFILE.0 as i64, PAGE), 0);
        assert_eq!(host.host_calls(), ["getrlimit"]);
        let wire = mem.read(PAGE, RLimit::WIRE_SIZE).unwrap();
        assert_eq!(
            RLimit::decode_from(&wire, config.abi.endian),
            RLimit {
                rlim_cur: 256,
                rlim_max: 1024,
            }
        );
    }

    #[test]
    fn setrlimit_always_rejects_the_stack_kind() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let mut wire = [0; RLimit::WIRE_SIZE];
        RLimit {
            rlim_cur: 1,
            rlim_max: 2,
        }
        .encode_to(&mut wire, config.abi.endian);
        mem.write(PAGE, &wire).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(
            sys_setrlimit(&mut proc, ResourceKind::RLIMIT_STACK.0 as i64, PAGE),
            -(BsdError::EPERM.0 as Sysret)
        );
        assert!(host.host_calls().is_empty());
    }

    #[test]
    fn setrlimit_forwards_converted_limits() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let mut wire = [0; RLimit::WIRE_SIZE];
        RLimit {
            rlim_cur: 100,
            rlim_max: RLimit::RLIM_INFINITY,
        }
        .encode_to(&mut wire, config.abi.endian);
        mem.write(PAGE, &wire).unwrap();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(sys_setrlimit(&mut proc, ResourceKind::RLIMIT_NOFILE.0 as i64, PAGE), 0);
        assert_eq!(
            *host.seen_rlimit.borrow(),
            Some((libc::RLIMIT_NOFILE as i32, 100, libc::RLIM_INFINITY))
        );
    }

    #[test]
    fn guest_only_resource_kinds_are_invalid_without_a_host_call() {
        let host = MockHost::default();
        let config = ProcConfig::default();
        let mut mem = mapped_space();
        let hooks = Vec::new();
        let mut proc = Proc {
            mem: &mut mem,
            host: &host,
            config: &config,
            exit_hooks: &hooks,
        };

        assert_eq!(
            sys_getrlimit(&mut proc, ResourceKind::RLIMIT_SBSIZE.0 as i64, PAGE),
            -(BsdError::EINVAL.0 as Sysret)
        );
        assert!(host.host_calls().is_empty());
    }
}
