pub mod color;
pub mod logging;
pub mod paths;

pub use color::{parse_color, PixelFormat, Rgb, SampledColor};
pub use logging::AppLogger;
pub use paths::{pipette_config_dir, pipette_log_dir};
