//! 控制界面
//!
//! 引擎只通过这个接口报告状态与进度，不关心界面如何呈现。

use std::cell::{Cell, RefCell};

pub trait ControlSurface {
    /// 状态文本
    fn set_status(&self, text: &str);

    /// 进度百分比
    fn set_progress(&self, percent: f64, visible: bool);

    fn set_busy(&self, busy: bool);

    /// 界面是否仍挂在页面上
    fn is_attached(&self) -> bool {
        true
    }

    /// 重新挂载被页面脚本移除的界面
    fn reattach(&self) {}
}

/// 把状态写入日志的界面
#[derive(Debug, Default)]
pub struct TracingSurface;

impl ControlSurface for TracingSurface {
    fn set_status(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn set_progress(&self, percent: f64, visible: bool) {
        if visible {
            tracing::debug!("进度 {:.0}%", percent);
        }
    }

    fn set_busy(&self, busy: bool) {
        tracing::trace!("busy = {}", busy);
    }
}

/// 记录全部调用的界面
#[derive(Debug)]
pub struct RecordingSurface {
    statuses: RefCell<Vec<String>>,
    progress: RefCell<Vec<f64>>,
    busy: Cell<bool>,
    attached: Cell<bool>,
    reattached: Cell<usize>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            statuses: RefCell::new(Vec::new()),
            progress: RefCell::new(Vec::new()),
            busy: Cell::new(false),
            attached: Cell::new(true),
            reattached: Cell::new(0),
        }
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.borrow().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.borrow().last().cloned()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.progress.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// 模拟页面脚本移除界面
    pub fn detach(&self) {
        self.attached.set(false);
    }

    pub fn reattach_count(&self) -> usize {
        self.reattached.get()
    }
}

impl ControlSurface for RecordingSurface {
    fn set_status(&self, text: &str) {
        self.statuses.borrow_mut().push(text.to_string());
    }

    fn set_progress(&self, percent: f64, visible: bool) {
        if visible {
            self.progress.borrow_mut().push(percent);
        }
    }

    fn set_busy(&self, busy: bool) {
        self.busy.set(busy);
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn reattach(&self) {
        self.attached.set(true);
        self.reattached.set(self.reattached.get() + 1);
    }
}
