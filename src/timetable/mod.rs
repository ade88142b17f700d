//! The timetable exporter: watches a schedule file and publishes
//! start/end/duration/active gauges per event.

mod collector;
mod schedule;
mod watcher;

pub use collector::EventCollector;
pub use schedule::{decode_schedule, ScheduleItem};
pub use watcher::ScheduleWatcher;
