pub mod capture;
pub mod controller;
pub mod loop_worker;
pub mod region;

pub use capture::{ocr_image_file, CommandCapture, TextSource};
pub use controller::MonitorController;
pub use loop_worker::{CycleReport, LoopStats, PollLoop, MIN_POLL_INTERVAL_SECS};
pub use region::RegionMailbox;
