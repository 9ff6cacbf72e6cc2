use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_output::WlOutput, wl_subsurface::WlSubsurface, wl_surface::WlSurface,
};
use wayland_client::QueueHandle;
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1,
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};

use crate::error::{Error, Result};
use crate::pool::CapturePool;
use crate::screencopy::Capture;
use crate::state::{BoundGlobals, OutputId, State};

/// Where an output's overlay is in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Unconfigured,
    Configured,
    PoolAllocated,
    CaptureRequested,
    Captured,
    CaptureFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Configured { width: u32, height: u32 },
    PoolAllocated,
    CaptureRequested,
    BufferOffered,
    Flags,
    Ready,
    Failed,
}

impl SurfacePhase {
    pub fn advance(self, event: SurfaceEvent) -> Result<SurfacePhase> {
        use SurfaceEvent as E;
        use SurfacePhase as P;

        match (self, event) {
            (P::Unconfigured, E::Configured { width, height }) if width == 0 || height == 0 => {
                Err(Error::ZeroSize { width, height })
            }
            (P::Unconfigured, E::Configured { .. }) => Ok(P::Configured),
            (P::Configured, E::PoolAllocated) => Ok(P::PoolAllocated),
            (P::PoolAllocated, E::CaptureRequested) => Ok(P::CaptureRequested),
            (P::CaptureRequested, E::BufferOffered | E::Flags) => Ok(P::CaptureRequested),
            (P::CaptureRequested, E::Ready) => Ok(P::Captured),
            (P::CaptureRequested, E::Failed) => Ok(P::CaptureFailed),
            (phase, event) => Err(Error::Sequence { phase, event }),
        }
    }

    pub fn can_render(self) -> bool {
        self == SurfacePhase::Captured
    }
}

/// Compositor objects making up one overlay: the full-screen layer surface
/// and the preview swatch stacked on it as a subsurface.
pub struct SurfaceHandles {
    pub surface: WlSurface,
    pub preview: WlSurface,
    pub subsurface: WlSubsurface,
    pub layer_surface: ZwlrLayerSurfaceV1,
}

pub struct OutputSurface {
    pub id: OutputId,
    pub output: WlOutput,
    pub phase: SurfacePhase,
    pub width: u32,
    pub height: u32,
    pub handles: Option<SurfaceHandles>,
    pub pool: Option<CapturePool>,
    pub capture: Capture,
    pub preview_buffer: Option<WlBuffer>,
}

impl OutputSurface {
    pub fn new(id: OutputId, output: WlOutput) -> Self {
        Self {
            id,
            output,
            phase: SurfacePhase::Unconfigured,
            width: 0,
            height: 0,
            handles: None,
            pool: None,
            capture: Capture::default(),
            preview_buffer: None,
        }
    }

    pub fn apply(&mut self, event: SurfaceEvent) -> Result<()> {
        let next = self.phase.advance(event)?;
        if next != self.phase {
            log::debug!("[output {}] {:?} -> {:?}", self.id, self.phase, next);
        }
        self.phase = next;
        Ok(())
    }

    pub fn create_layer_surface(&mut self, globals: &BoundGlobals, qh: &QueueHandle<State>) {
        let surface = globals.compositor.create_surface(qh, ());
        let preview = globals.compositor.create_surface(qh, ());

        // The swatch sits under the cursor; with an empty input region the
        // pointer keeps reporting against the parent surface.
        let region = globals.compositor.create_region(qh, ());
        region.add(0, 0, 0, 0);
        preview.set_input_region(Some(&region));
        region.destroy();

        let subsurface = globals
            .subcompositor
            .get_subsurface(&preview, &surface, qh, ());
        subsurface.set_desync();

        let layer_surface = globals.layer_shell.get_layer_surface(
            &surface,
            Some(&self.output),
            zwlr_layer_shell_v1::Layer::Overlay,
            "pipette".to_string(),
            qh,
            self.id,
        );
        layer_surface.set_size(0, 0);
        layer_surface.set_anchor(
            zwlr_layer_surface_v1::Anchor::Top
                | zwlr_layer_surface_v1::Anchor::Right
                | zwlr_layer_surface_v1::Anchor::Bottom
                | zwlr_layer_surface_v1::Anchor::Left,
        );
        layer_surface.set_exclusive_zone(-1);
        surface.commit();

        self.handles = Some(SurfaceHandles {
            surface,
            preview,
            subsurface,
            layer_surface,
        });
    }

    /// Handles the first configure of the layer surface: records the size,
    /// maps the shared memory and asks for the screenshot. Later configures
    /// leave the surface untouched.
    pub fn configure(
        &mut self,
        width: u32,
        height: u32,
        globals: &BoundGlobals,
        overlay_cursor: bool,
        qh: &QueueHandle<State>,
    ) -> Result<()> {
        if self.phase != SurfacePhase::Unconfigured {
            log::debug!(
                "[output {}] ignoring reconfigure to {}x{}",
                self.id,
                width,
                height
            );
            return Ok(());
        }

        self.apply(SurfaceEvent::Configured { width, height })?;
        self.width = width;
        self.height = height;
        log::info!("[output {}] configured {}x{}", self.id, width, height);

        self.pool = Some(CapturePool::allocate(&globals.shm, width, height, qh)?);
        self.apply(SurfaceEvent::PoolAllocated)?;

        self.request_capture(globals, overlay_cursor, qh)
    }
}
