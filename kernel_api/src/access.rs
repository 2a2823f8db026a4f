//! Caller clearance for conduit access

use core_types::TaskId;
use identity::ConduitId;
use std::collections::HashSet;

/// Decides whether a caller may tune a conduit
///
/// The basic controller accepts a caller identity on every lookup and asks
/// this policy. Enforcement lives in the host; the conduit core only consults.
pub trait AccessPolicy: Send + Sync {
    /// Returns true if `caller` may obtain the conduit named `channel`
    fn may_tune(&self, caller: TaskId, channel: &ConduitId) -> bool;
}

/// Grants every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn may_tune(&self, _caller: TaskId, _channel: &ConduitId) -> bool {
        true
    }
}

/// Grants requests from listed tasks only
///
/// The kernel identity is always granted.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    tasks: HashSet<TaskId>,
}

impl AllowList {
    /// Creates an empty allow list
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task (builder pattern)
    pub fn with_task(mut self, task: TaskId) -> Self {
        self.tasks.insert(task);
        self
    }

    /// Adds a task
    pub fn allow(&mut self, task: TaskId) {
        self.tasks.insert(task);
    }
}

impl AccessPolicy for AllowList {
    fn may_tune(&self, caller: TaskId, _channel: &ConduitId) -> bool {
        caller.is_kernel() || self.tasks.contains(&caller)
    }
}
