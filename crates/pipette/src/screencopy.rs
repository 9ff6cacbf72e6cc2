use pipette_common::PixelFormat;
use wayland_client::protocol::{wl_buffer::WlBuffer, wl_output, wl_shm};
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_frame_v1::{
    self, ZwlrScreencopyFrameV1,
};

use crate::error::{Error, Result};
use crate::pool::{PoolLayout, BYTES_PER_PIXEL};
use crate::state::{BoundGlobals, OutputId, State};
use crate::surface::{OutputSurface, SurfaceEvent};

/// Shape of the screenshot the compositor offered to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureGeometry {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl CaptureGeometry {
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// The frame must land inside the background region of `layout`.
    pub fn check_fits(&self, layout: &PoolLayout) -> Result<()> {
        let min_stride = self.width as usize * BYTES_PER_PIXEL;
        if self.width == 0
            || self.height == 0
            || (self.stride as usize) < min_stride
            || self.byte_len() > layout.background.len
        {
            return Err(Error::BufferMismatch {
                width: self.width,
                height: self.height,
                stride: self.stride,
                capacity: layout.background.len,
            });
        }
        Ok(())
    }
}

pub fn pixel_format(format: wl_shm::Format) -> PixelFormat {
    match format {
        wl_shm::Format::Xrgb8888 => PixelFormat::Xrgb8888,
        wl_shm::Format::Abgr8888 => PixelFormat::Abgr8888,
        wl_shm::Format::Xbgr8888 => PixelFormat::Xbgr8888,
        _ => PixelFormat::Argb8888,
    }
}

/// Unwraps the format of a buffer offer; raw values the protocol bindings
/// do not know cannot be sampled.
pub fn offered_format(format: WEnum<wl_shm::Format>) -> Result<wl_shm::Format> {
    match format {
        WEnum::Value(format) => Ok(format),
        WEnum::Unknown(raw) => Err(Error::UnsupportedFormat(raw)),
    }
}

pub fn y_inverted(flags: WEnum<zwlr_screencopy_frame_v1::Flags>) -> bool {
    let bits: u32 = flags.into();
    bits & u32::from(zwlr_screencopy_frame_v1::Flags::YInvert) != 0
}

/// Per-output screencopy bookkeeping.
#[derive(Default)]
pub struct Capture {
    pub frame: Option<ZwlrScreencopyFrameV1>,
    pub geometry: Option<CaptureGeometry>,
    pub buffer: Option<WlBuffer>,
    pub y_invert: bool,
}

impl Capture {
    fn finish(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.destroy();
        }
    }
}

impl OutputSurface {
    pub fn request_capture(
        &mut self,
        globals: &BoundGlobals,
        overlay_cursor: bool,
        qh: &QueueHandle<State>,
    ) -> Result<()> {
        self.apply(SurfaceEvent::CaptureRequested)?;
        let frame = globals
            .screencopy
            .capture_output(overlay_cursor as i32, &self.output, qh, self.id);
        self.capture.frame = Some(frame);
        log::debug!("[output {}] screencopy requested", self.id);
        Ok(())
    }

    fn on_buffer_offered(
        &mut self,
        format: WEnum<wl_shm::Format>,
        width: u32,
        height: u32,
        stride: u32,
        qh: &QueueHandle<State>,
    ) -> Result<()> {
        self.apply(SurfaceEvent::BufferOffered)?;

        let format = offered_format(format)?;
        let geometry = CaptureGeometry {
            format: pixel_format(format),
            width,
            height,
            stride,
        };

        let (Some(pool), Some(frame)) = (self.pool.as_ref(), self.capture.frame.as_ref()) else {
            return Err(Error::Sequence {
                phase: self.phase,
                event: SurfaceEvent::BufferOffered,
            });
        };
        geometry.check_fits(pool.layout())?;

        let buffer = pool.create_background_buffer(&geometry, format, qh);
        frame.copy(&buffer);

        log::debug!(
            "[output {}] copying {}x{} {:?} stride {}",
            self.id,
            width,
            height,
            format,
            stride
        );
        if (width, height) != (self.width, self.height) {
            log::debug!(
                "[output {}] frame size differs from surface {}x{}",
                self.id,
                self.width,
                self.height
            );
        }
        self.capture.geometry = Some(geometry);
        self.capture.buffer = Some(buffer);
        Ok(())
    }

    fn on_flags(&mut self, flags: WEnum<zwlr_screencopy_frame_v1::Flags>) -> Result<()> {
        self.apply(SurfaceEvent::Flags)?;
        self.capture.y_invert = y_inverted(flags);
        Ok(())
    }

    fn on_ready(&mut self) -> Result<()> {
        self.apply(SurfaceEvent::Ready)?;
        self.capture.finish();

        let (Some(handles), Some(buffer)) = (self.handles.as_ref(), self.capture.buffer.as_ref())
        else {
            return Ok(());
        };
        if self.capture.y_invert {
            handles
                .surface
                .set_buffer_transform(wl_output::Transform::Flipped180);
        }
        handles.surface.set_buffer_scale(1);
        handles.surface.attach(Some(buffer), 0, 0);
        handles.surface.damage(0, 0, i32::MAX, i32::MAX);
        handles.surface.commit();

        log::info!(
            "[output {}] captured{}",
            self.id,
            if self.capture.y_invert { " (y-inverted)" } else { "" }
        );
        Ok(())
    }

    fn on_failed(&mut self) -> Result<()> {
        self.apply(SurfaceEvent::Failed)?;
        self.capture.finish();
        log::warn!("[output {}] screencopy failed, sampling disabled", self.id);
        Ok(())
    }

    /// Gives up on this output's capture after a local error.
    fn abandon_capture(&mut self) {
        self.capture.finish();
        if self.apply(SurfaceEvent::Failed).is_ok() {
            log::warn!("[output {}] capture abandoned, sampling disabled", self.id);
        }
    }
}

impl Dispatch<ZwlrScreencopyFrameV1, OutputId> for State {
    fn event(
        state: &mut Self,
        _frame: &ZwlrScreencopyFrameV1,
        event: zwlr_screencopy_frame_v1::Event,
        id: &OutputId,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(surface) = state.surfaces.get_mut(id.0) else {
            return;
        };

        let result = match event {
            zwlr_screencopy_frame_v1::Event::Buffer {
                format,
                width,
                height,
                stride,
            } => surface.on_buffer_offered(format, width, height, stride, qh),
            zwlr_screencopy_frame_v1::Event::Flags { flags } => surface.on_flags(flags),
            zwlr_screencopy_frame_v1::Event::Ready { .. } => surface.on_ready(),
            zwlr_screencopy_frame_v1::Event::Failed => surface.on_failed(),
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::error!("[output {}] {}", id, e);
            surface.abandon_capture();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfacePhase;

    fn geometry(width: u32, height: u32, stride: u32) -> CaptureGeometry {
        CaptureGeometry {
            format: PixelFormat::Xrgb8888,
            width,
            height,
            stride,
        }
    }

    #[test]
    fn test_matching_frame_fits() {
        let layout = PoolLayout::new(1920, 1080);
        assert!(geometry(1920, 1080, 1920 * 4).check_fits(&layout).is_ok());
        assert!(geometry(1280, 720, 1280 * 4).check_fits(&layout).is_ok());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let layout = PoolLayout::new(1920, 1080);
        let err = geometry(3840, 2160, 3840 * 4).check_fits(&layout).unwrap_err();
        assert!(matches!(err, Error::BufferMismatch { .. }));
        assert!(geometry(1920, 1081, 1920 * 4).check_fits(&layout).is_err());
    }

    #[test]
    fn test_short_stride_is_rejected() {
        let layout = PoolLayout::new(1920, 1080);
        assert!(geometry(1920, 1080, 1920 * 3).check_fits(&layout).is_err());
        assert!(geometry(0, 1080, 0).check_fits(&layout).is_err());
    }

    #[test]
    fn test_y_invert_flag() {
        use zwlr_screencopy_frame_v1::Flags;

        assert!(y_inverted(WEnum::Value(Flags::YInvert)));
        assert!(!y_inverted(WEnum::Value(Flags::empty())));
        assert!(y_inverted(WEnum::Unknown(0x1 | 0x8)));
        assert!(!y_inverted(WEnum::Unknown(0x8)));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert_eq!(
            offered_format(WEnum::Value(wl_shm::Format::Xrgb8888)).unwrap(),
            wl_shm::Format::Xrgb8888
        );
        let err = offered_format(WEnum::Unknown(0xDEAD_BEEF)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(0xDEAD_BEEF)));
    }

    #[test]
    fn test_rejected_offer_ends_in_failure() {
        // A bad offer is followed by abandoning the capture.
        let layout = PoolLayout::new(1920, 1080);
        let phase = SurfacePhase::CaptureRequested
            .advance(SurfaceEvent::BufferOffered)
            .unwrap();
        assert!(geometry(3840, 2160, 3840 * 4).check_fits(&layout).is_err());

        let phase = phase.advance(SurfaceEvent::Failed).unwrap();
        assert_eq!(phase, SurfacePhase::CaptureFailed);
        assert!(!phase.can_render());
        assert!(phase.advance(SurfaceEvent::Failed).is_err());
    }

    #[test]
    fn test_outputs_capture_independently() {
        let small = PoolLayout::new(1280, 720);
        let large = PoolLayout::new(3840, 2160);
        let mut small_phase = SurfacePhase::Unconfigured
            .advance(SurfaceEvent::Configured {
                width: 1280,
                height: 720,
            })
            .unwrap();
        let mut large_phase = SurfacePhase::Unconfigured
            .advance(SurfaceEvent::Configured {
                width: 3840,
                height: 2160,
            })
            .unwrap();

        for event in [
            SurfaceEvent::PoolAllocated,
            SurfaceEvent::CaptureRequested,
            SurfaceEvent::BufferOffered,
            SurfaceEvent::Flags,
            SurfaceEvent::Ready,
        ] {
            large_phase = large_phase.advance(event).unwrap();
            small_phase = small_phase.advance(event).unwrap();
        }

        assert_eq!(small_phase, SurfacePhase::Captured);
        assert_eq!(large_phase, SurfacePhase::Captured);
        assert!(geometry(1280, 720, 1280 * 4).check_fits(&small).is_ok());
        assert!(geometry(3840, 2160, 3840 * 4).check_fits(&large).is_ok());
        assert!(geometry(3840, 2160, 3840 * 4).check_fits(&small).is_err());
    }

    #[test]
    fn test_one_output_failing_leaves_the_other() {
        let start = SurfacePhase::PoolAllocated
            .advance(SurfaceEvent::CaptureRequested)
            .unwrap();
        let mut first = start;
        let mut second = start;

        first = first.advance(SurfaceEvent::BufferOffered).unwrap();
        second = second.advance(SurfaceEvent::Failed).unwrap();
        first = first.advance(SurfaceEvent::Flags).unwrap();
        first = first.advance(SurfaceEvent::Ready).unwrap();

        assert!(first.can_render());
        assert_eq!(second, SurfacePhase::CaptureFailed);
    }

    #[test]
    fn test_pixel_format_mapping() {
        assert_eq!(pixel_format(wl_shm::Format::Xrgb8888), PixelFormat::Xrgb8888);
        assert_eq!(pixel_format(wl_shm::Format::Argb8888), PixelFormat::Argb8888);
        assert_eq!(pixel_format(wl_shm::Format::Xbgr8888), PixelFormat::Xbgr8888);
        assert_eq!(pixel_format(wl_shm::Format::Rgb565), PixelFormat::Argb8888);
    }
}
