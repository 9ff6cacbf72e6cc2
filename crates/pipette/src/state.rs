use std::fmt;

use pipette_common::SampledColor;

use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_shm::WlShm, wl_subcompositor::WlSubcompositor,
    wl_surface::WlSurface,
};
use wayland_client::QueueHandle;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pointer::{BoundPointer, LoopControl, Session};
use crate::surface::OutputSurface;

/// Index of an output's overlay in [`State::surfaces`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub usize);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globals as they arrive from the registry.
#[derive(Default)]
pub struct Globals {
    pub compositor: Option<WlCompositor>,
    pub subcompositor: Option<WlSubcompositor>,
    pub shm: Option<WlShm>,
    pub layer_shell: Option<ZwlrLayerShellV1>,
    pub screencopy: Option<ZwlrScreencopyManagerV1>,
}

/// The globals every overlay needs, checked present.
#[derive(Clone)]
pub struct BoundGlobals {
    pub compositor: WlCompositor,
    pub subcompositor: WlSubcompositor,
    pub shm: WlShm,
    pub layer_shell: ZwlrLayerShellV1,
    pub screencopy: ZwlrScreencopyManagerV1,
}

impl Globals {
    pub fn require(&self) -> Result<BoundGlobals> {
        Ok(BoundGlobals {
            compositor: self
                .compositor
                .clone()
                .ok_or(Error::MissingGlobal("wl_compositor"))?,
            subcompositor: self
                .subcompositor
                .clone()
                .ok_or(Error::MissingGlobal("wl_subcompositor"))?,
            shm: self.shm.clone().ok_or(Error::MissingGlobal("wl_shm"))?,
            layer_shell: self
                .layer_shell
                .clone()
                .ok_or(Error::MissingGlobal("zwlr_layer_shell_v1"))?,
            screencopy: self
                .screencopy
                .clone()
                .ok_or(Error::MissingGlobal("zwlr_screencopy_manager_v1"))?,
        })
    }
}

/// Chooses the colour to record from one render pass. With a focused output
/// only its own sample counts, so an output without a capture yields nothing
/// rather than a pixel from another monitor. Without focus the last sample
/// wins.
pub fn pick_sample(
    focus: Option<OutputId>,
    samples: &[(OutputId, Option<SampledColor>)],
) -> Option<SampledColor> {
    match focus {
        Some(focused) => samples
            .iter()
            .find(|(id, _)| *id == focused)
            .and_then(|(_, color)| *color),
        None => samples.iter().rev().find_map(|(_, color)| *color),
    }
}

pub struct State {
    pub config: Config,
    pub globals: Globals,
    pub bound: Option<BoundGlobals>,
    pub surfaces: Vec<OutputSurface>,
    pub pointer: Option<BoundPointer>,
    pub session: Session,
    /// First unrecoverable error raised inside an event handler.
    pub fatal: Option<Error>,
}

impl State {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            globals: Globals::default(),
            bound: None,
            surfaces: Vec::new(),
            pointer: None,
            session: Session::default(),
            fatal: None,
        }
    }

    /// Resolves the discovered globals and puts an overlay on every output.
    pub fn create_surfaces(&mut self, qh: &QueueHandle<Self>) -> Result<()> {
        let bound = self.globals.require()?;
        if self.surfaces.is_empty() {
            return Err(Error::NoOutputs);
        }

        for surface in &mut self.surfaces {
            surface.create_layer_surface(&bound, qh);
        }
        log::info!("Created overlays on {} outputs", self.surfaces.len());

        self.bound = Some(bound);
        Ok(())
    }

    pub fn configure_surface(&mut self, id: OutputId, width: u32, height: u32, qh: &QueueHandle<Self>) {
        let Some(bound) = self.bound.clone() else {
            log::error!("[output {}] configured before globals were bound", id);
            return;
        };
        let overlay_cursor = self.config.capture.overlay_cursor;
        let Some(surface) = self.surfaces.get_mut(id.0) else {
            return;
        };

        match surface.configure(width, height, &bound, overlay_cursor, qh) {
            Ok(()) => {}
            Err(e @ Error::Shm(_)) => self.fail(e),
            Err(e) => log::error!("[output {}] {}", id, e),
        }
    }

    pub fn output_for_surface(&self, surface: &WlSurface) -> Option<OutputId> {
        self.surfaces
            .iter()
            .find(|s| s.handles.as_ref().is_some_and(|h| &h.surface == surface))
            .map(|s| s.id)
    }

    /// Re-renders every captured overlay at the current cursor position and
    /// records the colour picked on the focused output.
    pub fn render_all(&mut self, qh: &QueueHandle<Self>) {
        let cursor = self.session.cursor;
        let focus = self.session.focus;
        let outline = self.config.outline_color();

        let samples: Vec<_> = self
            .surfaces
            .iter_mut()
            .map(|surface| (surface.id, surface.render(&cursor, outline, qh)))
            .collect();

        if let Some(color) = pick_sample(focus, &samples) {
            self.session.cursor.color = Some(color);
        }
    }

    pub fn stop(&mut self) {
        self.session.running = false;
    }

    pub fn fail(&mut self, error: Error) {
        log::error!("{}", error);
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
        self.stop();
    }
}

impl LoopControl for State {
    fn is_running(&self) -> bool {
        self.session.is_running()
    }
}
