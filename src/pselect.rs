use std::os::unix::io::RawFd;
use std::{io, mem, ptr, time};

#[derive(Clone, Copy)]
pub struct FdSet(libc::fd_set);

impl FdSet {
    pub fn new() -> FdSet {
        unsafe {
            let mut raw_fd_set = mem::MaybeUninit::<libc::fd_set>::uninit();
            libc::FD_ZERO(raw_fd_set.as_mut_ptr());
            FdSet(raw_fd_set.assume_init())
        }
    }

    pub fn set(&mut self, fd: RawFd) {
        unsafe {
            libc::FD_SET(fd, &mut self.0);
        }
    }

    pub fn is_set(&self, fd: RawFd) -> bool {
        unsafe { libc::FD_ISSET(fd, &self.0) }
    }
}

impl Default for FdSet {
    fn default() -> Self {
        Self::new()
    }
}

fn to_fdset_ptr(opt: Option<&mut FdSet>) -> *mut libc::fd_set {
    match opt {
        None => ptr::null_mut(),
        Some(&mut FdSet(ref mut raw_fd_set)) => raw_fd_set,
    }
}

/// A convenience wrapper around pselect(2), returning the number of ready descriptors.
pub fn pselect(
    nfds: libc::c_int,
    readfds: Option<&mut FdSet>,
    timeout: Option<&libc::timespec>,
) -> io::Result<usize> {
    let timeout = timeout.map_or(ptr::null(), |t| t as *const libc::timespec);
    match unsafe {
        libc::pselect(
            nfds,
            to_fdset_ptr(readfds),
            ptr::null_mut(),
            ptr::null_mut(),
            timeout,
            ptr::null(),
        )
    } {
        -1 => Err(io::Error::last_os_error()),
        res => Ok(res as usize),
    }
}

pub fn make_timespec(duration: time::Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}

/// Waits until `fd` is readable or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. A signal interrupting the wait counts as a timeout.
pub fn wait_readable(fd: RawFd, timeout: time::Duration) -> io::Result<bool> {
    let mut fds = FdSet::new();
    fds.set(fd);
    let ts = make_timespec(timeout);

    match pselect(fd + 1, Some(&mut fds), Some(&ts)) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(fds.is_set(fd)),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_splits_seconds() {
        let ts = make_timespec(time::Duration::from_millis(1500));
        assert_eq!(ts.tv_sec, 1);
        assert_eq!(ts.tv_nsec, 500_000_000);
    }
}
