//! Background download scheduling: queued songs wait for their time and
//! conditions, then get dispatched to the download engine.

mod dispatch;
mod error;
mod queue;
mod schedule;

pub use dispatch::{DispatchError, DownloadDispatcher};
pub use error::{Result, SchedulerError};
pub use queue::{ScheduleQueue, SchedulerConfig};
pub use schedule::{
    DownloadSchedule, ScheduleConditions, ScheduleStatus, TimeWindow, DEFAULT_PRIORITY,
    MAX_PRIORITY, MIN_PRIORITY,
};
