//! 翻译管道模块
//!
//! 一次翻译流程依次经过收集、过滤、调度与 DOM 应用

pub mod collector;
pub mod filters;
pub mod mutator;
pub mod scheduler;

// 重新导出主要类型
pub use collector::{CollectionStats, Segment, SegmentCollector, SegmentKind};
pub use filters::{AncestorContext, AncestorFrame, SkipReason, TextFilter};
pub use mutator::{is_page_translated, restore, ApplyOutcome, ApplyQueue, DomMutator, FlushReport};
pub use scheduler::{
    ConcurrencyScheduler, LimitController, SchedulerObserver, SchedulerOptions, SchedulerStats, Task,
};
