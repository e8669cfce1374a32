pub mod interval;
pub mod poll_loop;

pub use interval::{next_delay, safe_poll_interval, MIN_PLAY_DURATION, REMOTE_BATCH_CAP};
pub use poll_loop::{CycleReport, PollLoop, PollSettings};
