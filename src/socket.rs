//! Netlink transport: the channel seam and the real netfilter socket.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use crate::error::{NfqError, Result};

/// Message-oriented duplex channel to the kernel queue subsystem.
///
/// The seam the dispatcher and negotiation run over; tests substitute a
/// scripted implementation.
pub trait Channel {
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Block for the next inbound datagram and return its length.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;
}

const NETLINK_NETFILTER: libc::c_int = 12;
const NETLINK_NO_ENOBUFS: libc::c_int = 5;

/// Blocking AF_NETLINK socket bound to the netfilter subsystem. The
/// descriptor is closed on drop, on every exit path.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: RawFd,
}

impl NetlinkSocket {
    /// Open and bind with a kernel-assigned port id.
    pub fn open() -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, NETLINK_NETFILTER) };
        if fd < 0 {
            return Err(NfqError::Io(io::Error::last_os_error()));
        }
        let socket = Self { fd };

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        let ret = unsafe {
            libc::bind(
                socket.fd,
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(NfqError::Io(io::Error::last_os_error()));
        }
        Ok(socket)
    }

    /// Stop the kernel from reporting ENOBUFS when queued packets are lost.
    /// Trades loss visibility for an uninterrupted read loop; without it a
    /// full socket buffer surfaces as a read error.
    pub fn set_no_enobufs(&self) -> Result<()> {
        let on: libc::c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_NETLINK,
                NETLINK_NO_ENOBUFS,
                std::ptr::addr_of!(on).cast::<libc::c_void>(),
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(NfqError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Channel for NetlinkSocket {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let ret = unsafe {
            libc::send(
                self.fd,
                frame.as_ptr().cast::<libc::c_void>(),
                frame.len(),
                0,
            )
        };
        if ret < 0 {
            return Err(NfqError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let ret = unsafe {
                libc::recv(
                    self.fd,
                    buf.as_mut_ptr().cast::<libc::c_void>(),
                    buf.len(),
                    0,
                )
            };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(NfqError::Io(err));
            }
            if ret == 0 {
                return Err(NfqError::ChannelClosed);
            }
            return Ok(ret as usize);
        }
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
