//! bridge.rs
//! Control bridge: one shared integer crossing the process boundary.
//!
//! A 4-byte file mapped `MAP_SHARED` in both the monitoring process and the
//! simulation child; the cell is accessed as an `AtomicI32`. Contract:
//! consumer-side writes are fire-and-forget (last-writer-wins, no ack),
//! simulation-side reads are polled once per tick and never block. No
//! queueing, no history; staleness of one tick is tolerated.

use std::{
    fs::{remove_file, OpenOptions},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
    ptr,
    sync::atomic::{AtomicI32, Ordering},
};

use crate::error::BridgeError;

/// Neutral control value: the resting midpoint of a 0..=100 channel. The
/// bridge reads neutral whenever no simulation or acquisition owns it.
pub const NEUTRAL_CONTROL_VALUE: i32 = 50;

const CELL_BYTES: usize = std::mem::size_of::<i32>();

/// Shared-memory scalar, allocated per simulation channel. The creating
/// side outlives individual simulation runs and unlinks the backing file
/// on drop; the child side only maps an existing file.
pub struct ControlBridge {
    cell: *mut AtomicI32,
    path: PathBuf,
    owner: bool,
}

// The mapping holds a single atomic; all access goes through atomic ops.
unsafe impl Send for ControlBridge {}
unsafe impl Sync for ControlBridge {}

impl ControlBridge {
    /// Create the backing file and map it. The cell starts at neutral.
    pub fn create(path: &Path) -> Result<Self, BridgeError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(CELL_BYTES as u64)?;
        let bridge = Self::map(file.as_raw_fd(), path, true)?;
        bridge.reset();
        Ok(bridge)
    }

    /// Map an existing bridge file. Used by the simulation child, which
    /// receives the path as a process argument.
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::map(file.as_raw_fd(), path, false)
    }

    fn map(fd: i32, path: &Path, owner: bool) -> Result<Self, BridgeError> {
        // The mapping survives the fd: the File may close right after.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                CELL_BYTES,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(BridgeError::Map(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(Self {
            cell: addr as *mut AtomicI32,
            path: path.to_path_buf(),
            owner,
        })
    }

    #[inline]
    fn atomic(&self) -> &AtomicI32 {
        unsafe { &*self.cell }
    }

    /// Last-writer-wins store. Never blocks, never fails.
    #[inline]
    pub fn publish(&self, value: i32) {
        self.atomic().store(value, Ordering::Relaxed);
    }

    /// Polled read. A value one tick old is acceptable by contract.
    #[inline]
    pub fn read(&self) -> i32 {
        self.atomic().load(Ordering::Relaxed)
    }

    /// Return the cell to neutral. Called on simulation stop, failed start,
    /// and acquisition disconnect.
    #[inline]
    pub fn reset(&self) {
        self.publish(NEUTRAL_CONTROL_VALUE);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlBridge {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.cell as *mut libc::c_void, CELL_BYTES);
        }
        if self.owner {
            let _ = remove_file(&self.path);
        }
    }
}

#[cfg(test)]
pub(crate) fn test_bridge_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mindbridge_{}_{}.cell", std::process::id(), tag))
}
