pub mod stages;

pub use stages::{Stage, StageStatus, StageTimeline, StageView, TimelineSnapshot};
