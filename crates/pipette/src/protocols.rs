use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_output::WlOutput, wl_region::WlRegion,
    wl_registry, wl_seat::WlSeat, wl_shm::WlShm, wl_shm_pool::WlShmPool,
    wl_subcompositor::WlSubcompositor, wl_subsurface::WlSubsurface, wl_surface::WlSurface,
};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1,
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1;

use crate::state::{OutputId, State};
use crate::surface::OutputSurface;

impl Dispatch<wl_registry::WlRegistry, ()> for State {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };

        match interface.as_str() {
            "wl_compositor" => {
                state.globals.compositor = Some(registry.bind(name, version.min(4), qh, ()));
            }
            "wl_subcompositor" => {
                state.globals.subcompositor = Some(registry.bind(name, 1, qh, ()));
            }
            "wl_shm" => {
                state.globals.shm = Some(registry.bind(name, 1, qh, ()));
            }
            "zwlr_layer_shell_v1" => {
                state.globals.layer_shell = Some(registry.bind(name, version.min(2), qh, ()));
            }
            "zwlr_screencopy_manager_v1" => {
                state.globals.screencopy = Some(registry.bind(name, 1, qh, ()));
            }
            "wl_seat" => {
                let _seat: WlSeat = registry.bind(name, version.min(5), qh, ());
            }
            "wl_output" => {
                let output: WlOutput = registry.bind(name, version.min(3), qh, ());
                let id = OutputId(state.surfaces.len());
                log::debug!("[registry] output {} (global {})", id, name);
                state.surfaces.push(OutputSurface::new(id, output));
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, OutputId> for State {
    fn event(
        state: &mut Self,
        layer_surface: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        id: &OutputId,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => {
                layer_surface.ack_configure(serial);
                state.configure_surface(*id, width, height, qh);
            }
            zwlr_layer_surface_v1::Event::Closed => {
                log::warn!("[output {}] overlay closed by compositor", id);
                if let Some(handles) = state.surfaces.get(id.0).and_then(|s| s.handles.as_ref()) {
                    handles.layer_surface.destroy();
                }
                state.stop();
            }
            _ => {}
        }
    }
}

delegate_noop!(State: ignore WlCompositor);
delegate_noop!(State: ignore WlSubcompositor);
delegate_noop!(State: ignore WlSubsurface);
delegate_noop!(State: ignore WlRegion);
delegate_noop!(State: ignore WlSurface);
delegate_noop!(State: ignore WlShm);
delegate_noop!(State: ignore WlShmPool);
delegate_noop!(State: ignore WlBuffer);
delegate_noop!(State: ignore WlOutput);
delegate_noop!(State: ignore ZwlrLayerShellV1);
delegate_noop!(State: ignore ZwlrScreencopyManagerV1);
