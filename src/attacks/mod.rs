//! Search engines
pub mod schedule;
pub mod single_pixel;
pub mod zoo;

pub use schedule::{ConstSchedule, ConstSearch};
pub use single_pixel::{SinglePixelAttack, SinglePixelConfig};
pub use zoo::{ZooAttack, ZooConfig, ZooResult};
