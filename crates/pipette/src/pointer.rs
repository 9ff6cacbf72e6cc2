use pipette_common::SampledColor;
use wayland_client::protocol::{
    wl_pointer::{self, WlPointer},
    wl_seat::{self, WlSeat},
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};

use crate::state::{OutputId, State};

/// Cursor position in surface-local pixels plus the colour last picked
/// from under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    pub x: i32,
    pub y: i32,
    pub color: Option<SampledColor>,
}

/// Process-wide context written by pointer handling and read by rendering.
#[derive(Debug)]
pub struct Session {
    pub cursor: CursorState,
    pub running: bool,
    /// Output whose overlay the pointer is currently over.
    pub focus: Option<OutputId>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            cursor: CursorState::default(),
            running: true,
            focus: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Enter {
        serial: u32,
        output: Option<OutputId>,
    },
    Leave,
    Motion {
        x: f64,
        y: f64,
    },
    Button {
        pressed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    HideCursor { serial: u32 },
    Render,
    Stop,
    Ignore,
}

impl Session {
    /// Applies one pointer event. Once a press has stopped the session,
    /// everything else still queued in the same dispatch is ignored so the
    /// picked colour stays the one sampled before the press.
    pub fn handle_pointer(&mut self, input: PointerInput) -> PointerAction {
        if !self.running {
            return PointerAction::Ignore;
        }
        match input {
            PointerInput::Enter { serial, output } => {
                self.focus = output;
                PointerAction::HideCursor { serial }
            }
            PointerInput::Leave => PointerAction::Ignore,
            PointerInput::Motion { x, y } => {
                // Truncate like wl_fixed_to_int.
                self.cursor.x = x as i32;
                self.cursor.y = y as i32;
                PointerAction::Render
            }
            PointerInput::Button { pressed: true } => {
                self.running = false;
                PointerAction::Stop
            }
            PointerInput::Button { pressed: false } => PointerAction::Ignore,
        }
    }
}

pub trait LoopControl {
    fn is_running(&self) -> bool;
}

impl LoopControl for Session {
    fn is_running(&self) -> bool {
        self.running
    }
}

/// Runs `dispatch` until the state asks to stop. The flag is checked before
/// every dispatch, so nothing queued behind the stopping event is handled.
pub fn run_until_stopped<S, E, F>(state: &mut S, mut dispatch: F) -> Result<(), E>
where
    S: LoopControl,
    F: FnMut(&mut S) -> Result<usize, E>,
{
    while state.is_running() {
        dispatch(state)?;
    }
    Ok(())
}

pub struct BoundPointer {
    pub seat: WlSeat,
    pub pointer: WlPointer,
}

impl BoundPointer {
    fn release(self) {
        if self.pointer.version() >= 3 {
            self.pointer.release();
        }
    }
}

impl Dispatch<WlSeat, ()> for State {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_seat::Event::Capabilities { capabilities } = event else {
            return;
        };
        let caps: u32 = capabilities.into();
        let has_pointer = caps & u32::from(wl_seat::Capability::Pointer) != 0;

        let bound_here = state.pointer.as_ref().is_some_and(|p| &p.seat == seat);
        if has_pointer && !bound_here {
            if let Some(previous) = state.pointer.take() {
                log::info!("[seat] switching pointer to newer seat");
                previous.release();
            }
            state.pointer = Some(BoundPointer {
                seat: seat.clone(),
                pointer: seat.get_pointer(qh, ()),
            });
            log::debug!("[seat] pointer bound");
        } else if !has_pointer && bound_here {
            if let Some(previous) = state.pointer.take() {
                previous.release();
            }
            log::warn!("[seat] pointer capability removed");
        }
    }
}

impl Dispatch<WlPointer, ()> for State {
    fn event(
        state: &mut Self,
        pointer: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let input = match event {
            wl_pointer::Event::Enter {
                serial, surface, ..
            } => PointerInput::Enter {
                serial,
                output: state.output_for_surface(&surface),
            },
            wl_pointer::Event::Leave { .. } => PointerInput::Leave,
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => PointerInput::Motion {
                x: surface_x,
                y: surface_y,
            },
            wl_pointer::Event::Button {
                state: button_state,
                ..
            } => PointerInput::Button {
                pressed: matches!(button_state, WEnum::Value(wl_pointer::ButtonState::Pressed)),
            },
            _ => return,
        };

        match state.session.handle_pointer(input) {
            PointerAction::HideCursor { serial } => pointer.set_cursor(serial, None, 0, 0),
            PointerAction::Render => state.render_all(qh),
            PointerAction::Stop => log::info!("[pointer] button pressed, picking colour"),
            PointerAction::Ignore => {}
        }
    }
}
