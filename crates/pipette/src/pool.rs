use memmap2::MmapMut;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;
use std::ops::Range;
use std::os::fd::AsFd;
use std::time::{SystemTime, UNIX_EPOCH};
use wayland_client::protocol::{wl_buffer::WlBuffer, wl_shm, wl_shm_pool::WlShmPool};
use wayland_client::QueueHandle;

use crate::error::{Error, Result};
use crate::screencopy::CaptureGeometry;
use crate::state::State;

pub const BYTES_PER_PIXEL: usize = 4;
pub const PREVIEW_SIZE: u32 = 100;
pub const PREVIEW_STRIDE: u32 = PREVIEW_SIZE * BYTES_PER_PIXEL as u32;

const SHM_CREATE_ATTEMPTS: u32 = 100;

/// A byte range inside a pool mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionView {
    pub offset: usize,
    pub len: usize,
}

impl RegionView {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn overlaps(&self, other: &RegionView) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// How one output's mapping is split: the captured screenshot at offset 0,
/// the preview swatch immediately after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLayout {
    pub width: u32,
    pub height: u32,
    pub background: RegionView,
    pub preview: RegionView,
}

impl PoolLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let background_len = width as usize * BYTES_PER_PIXEL * height as usize;
        let preview_len = PREVIEW_STRIDE as usize * PREVIEW_SIZE as usize;
        let background = RegionView {
            offset: 0,
            len: background_len,
        };
        let preview = RegionView {
            offset: background.end(),
            len: preview_len,
        };
        debug_assert!(!background.overlaps(&preview));

        Self {
            width,
            height,
            background,
            preview,
        }
    }

    pub fn total_len(&self) -> usize {
        self.preview.end()
    }
}

/// Creates an anonymous shared memory file of `size` bytes. The name is
/// unlinked before returning, so the descriptor is the only handle to it.
pub fn create_shm_file(size: usize) -> std::io::Result<File> {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    for attempt in 0..SHM_CREATE_ATTEMPTS {
        let name = format!(
            "/pipette-{}-{:08x}",
            std::process::id(),
            seed.wrapping_add(attempt.wrapping_mul(0x9E37_79B9))
        );
        let fd = match shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_CLOEXEC,
            Mode::S_IRUSR | Mode::S_IWUSR,
        ) {
            Ok(fd) => fd,
            Err(Errno::EEXIST) => continue,
            Err(errno) => return Err(errno.into()),
        };
        shm_unlink(name.as_str())?;

        let file = File::from(fd);
        file.set_len(size as u64)?;
        return Ok(file);
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        "no free shared memory name",
    ))
}

/// The process-side view of one output's shared memory.
pub struct SharedMapping {
    mmap: MmapMut,
    layout: PoolLayout,
}

impl SharedMapping {
    /// Allocates and maps memory for `layout`. The returned file is only
    /// needed until the compositor has been handed its descriptor.
    pub fn allocate(layout: PoolLayout) -> std::io::Result<(Self, File)> {
        let file = create_shm_file(layout.total_len())?;
        // SAFETY: the file is private to this process and the compositor;
        // neither side truncates it while mapped.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok((Self { mmap, layout }, file))
    }

    pub fn layout(&self) -> &PoolLayout {
        &self.layout
    }

    pub fn background(&self) -> &[u8] {
        &self.mmap[self.layout.background.range()]
    }

    #[cfg(test)]
    pub fn background_mut(&mut self) -> &mut [u8] {
        let range = self.layout.background.range();
        &mut self.mmap[range]
    }

    #[cfg(test)]
    pub fn preview(&self) -> &[u8] {
        &self.mmap[self.layout.preview.range()]
    }

    pub fn preview_mut(&mut self) -> &mut [u8] {
        let range = self.layout.preview.range();
        &mut self.mmap[range]
    }
}

/// One `wl_shm_pool` per output, backed by a [`SharedMapping`].
pub struct CapturePool {
    mapping: SharedMapping,
    pool: WlShmPool,
}

impl CapturePool {
    pub fn allocate(
        shm: &wl_shm::WlShm,
        width: u32,
        height: u32,
        qh: &QueueHandle<State>,
    ) -> Result<Self> {
        let layout = PoolLayout::new(width, height);
        let size = i32::try_from(layout.total_len()).map_err(|_| {
            Error::Shm(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("pool of {} bytes exceeds protocol limit", layout.total_len()),
            ))
        })?;

        let (mapping, file) = SharedMapping::allocate(layout)?;
        let pool = shm.create_pool(file.as_fd(), size, qh, ());
        drop(file);

        log::debug!(
            "[pool] {}x{} mapped: background {} bytes, preview at {}",
            layout.width,
            layout.height,
            layout.background.len,
            layout.preview.offset
        );

        Ok(Self { mapping, pool })
    }

    pub fn layout(&self) -> &PoolLayout {
        self.mapping.layout()
    }

    pub fn background(&self) -> &[u8] {
        self.mapping.background()
    }

    pub fn preview_mut(&mut self) -> &mut [u8] {
        self.mapping.preview_mut()
    }

    /// Carves the screenshot buffer at offset 0. The geometry must already
    /// have been checked against the background region.
    pub fn create_background_buffer(
        &self,
        geometry: &CaptureGeometry,
        format: wl_shm::Format,
        qh: &QueueHandle<State>,
    ) -> WlBuffer {
        self.pool.create_buffer(
            self.layout().background.offset as i32,
            geometry.width as i32,
            geometry.height as i32,
            geometry.stride as i32,
            format,
            qh,
            (),
        )
    }

    pub fn create_preview_buffer(&self, qh: &QueueHandle<State>) -> WlBuffer {
        self.pool.create_buffer(
            self.layout().preview.offset as i32,
            PREVIEW_SIZE as i32,
            PREVIEW_SIZE as i32,
            PREVIEW_STRIDE as i32,
            wl_shm::Format::Argb8888,
            qh,
            (),
        )
    }
}
