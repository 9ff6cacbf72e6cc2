use thiserror::Error;

use crate::surface::{SurfaceEvent, SurfacePhase};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to Wayland: {0}")]
    Connect(#[from] wayland_client::ConnectError),

    #[error("Wayland dispatch failed: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),

    #[error("Compositor does not advertise {0}")]
    MissingGlobal(&'static str),

    #[error("Compositor advertised no outputs")]
    NoOutputs,

    #[error("Shared memory allocation failed: {0}")]
    Shm(#[from] std::io::Error),

    #[error("Surface configured with zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    /// An event arrived in a phase that cannot accept it.
    #[error("Unexpected {event:?} while {phase:?}")]
    Sequence {
        phase: SurfacePhase,
        event: SurfaceEvent,
    },

    #[error("Capture buffer {width}x{height} stride {stride} does not fit {capacity} bytes")]
    BufferMismatch {
        width: u32,
        height: u32,
        stride: u32,
        capacity: usize,
    },

    #[error("Unsupported capture format {0:#x}")]
    UnsupportedFormat(u32),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<nix::Error> for Error {
    fn from(errno: nix::Error) -> Self {
        Error::Shm(std::io::Error::from(errno))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
