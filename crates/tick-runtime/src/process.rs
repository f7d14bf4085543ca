use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tick_core::{CommandResult, Privileges, Script, ScriptError};
use tracing::debug;

use crate::environment::EnvId;
use crate::frame::{CallFrame, ReturnTarget};
use crate::io::OutputSink;
use crate::runtime::Runtime;

pub type ProcessId = u64;
pub type ErrorHandler = Box<dyn FnMut(&str)>;

/// How many runs an await may spend before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitLimit {
    /// `VirtualMachineOptions::await_tick_budget`.
    Budget,
    Unlimited,
    Runs(usize),
}

/// A cooperative script thread with an explicit, heap-resident call stack.
pub struct Process {
    pub(crate) id: ProcessId,
    pub(crate) privileges: Privileges,
    pub(crate) env: EnvId,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) queued: VecDeque<Rc<Script>>,
    input: VecDeque<String>,
    output: Option<Weak<dyn OutputSink>>,
    parent: Option<ProcessId>,
    children: Vec<ProcessId>,
    pub(crate) ended: bool,
    persistent: bool,
    pub(crate) latest_error: Option<String>,
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) result: Option<CommandResult>,
    pub(crate) run_count: u64,
    next_frame_id: u64,
    max_depth: usize,
}

impl Process {
    pub(crate) fn new(id: ProcessId, privileges: Privileges, env: EnvId, max_depth: usize) -> Self {
        Self {
            id,
            privileges,
            env,
            frames: Vec::new(),
            queued: VecDeque::new(),
            input: VecDeque::new(),
            output: None,
            parent: None,
            children: Vec::new(),
            ended: false,
            persistent: false,
            latest_error: None,
            error_handler: None,
            result: None,
            run_count: 0,
            next_frame_id: 1,
            max_depth,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn privileges(&self) -> Privileges {
        self.privileges
    }

    /// Root scope every top-level script of this process runs in.
    pub fn environment(&self) -> EnvId {
        self.env
    }

    pub fn parent(&self) -> Option<ProcessId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ProcessId>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[ProcessId] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: ProcessId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: ProcessId) {
        self.children.retain(|id| *id != child);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Nothing running and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.frames.is_empty() && self.queued.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.ended || (!self.persistent && self.is_idle())
    }

    /// A persistent process stays registered while idle, waiting for
    /// further scripts (console sessions).
    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub fn end(&mut self) {
        if !self.ended {
            debug!(process = self.id, depth = self.frames.len(), "process ended");
        }
        self.ended = true;
        self.frames.clear();
        self.queued.clear();
    }

    pub fn latest_error(&self) -> Option<&str> {
        self.latest_error.as_deref()
    }

    pub fn take_latest_error(&mut self) -> Option<String> {
        self.latest_error.take()
    }

    pub fn clear_latest_error(&mut self) {
        self.latest_error = None;
    }

    pub fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<CommandResult> {
        self.result.take()
    }

    pub fn push_input(&mut self, line: impl Into<String>) {
        self.input.push_back(line.into());
    }

    pub(crate) fn pop_input(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    pub fn set_output(&mut self, sink: Option<Weak<dyn OutputSink>>) {
        self.output = sink;
    }

    pub fn output(&self) -> Option<Rc<dyn OutputSink>> {
        self.output.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.error_handler = Some(Box::new(handler));
    }

    pub fn clear_error_handler(&mut self) {
        self.error_handler = None;
    }

    pub(crate) fn write_line(&self, line: &str, rt: &Runtime) {
        match self.output() {
            Some(sink) => sink.write_line(line),
            None => rt.output.write_line(line),
        }
    }

    pub(crate) fn write_error(&self, line: &str, rt: &Runtime) {
        match self.output() {
            Some(sink) => sink.write_line(line),
            None => rt.errors.write_line(line),
        }
    }

    /// Queues a top-level script; it starts once everything queued before
    /// it has finished.
    pub fn push_script(&mut self, script: Rc<Script>) -> Result<(), ScriptError> {
        if self.ended {
            return Err(ScriptError::new(
                "ENGINE_PROCESS_ENDED",
                format!("Process {} has ended.", self.id),
            ));
        }
        self.enqueue(script);
        Ok(())
    }

    pub(crate) fn enqueue(&mut self, script: Rc<Script>) {
        self.queued.push_back(script);
    }

    /// Pushes a frame; `None` when the stack is at its depth bound.
    pub(crate) fn push_frame(
        &mut self,
        script: Rc<Script>,
        env: EnvId,
        return_to: ReturnTarget,
    ) -> Option<usize> {
        if self.frames.len() >= self.max_depth {
            debug!(process = self.id, depth = self.frames.len(), "call stack full");
            return None;
        }
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        self.frames.push(CallFrame::new(id, script, env, return_to));
        Some(self.frames.len() - 1)
    }

    /// The top frame may hand its return target to a callee when the
    /// issuing command is its last and it scopes neither errors nor loops.
    pub(crate) fn can_tail_call(&self, index: usize) -> bool {
        if index + 1 != self.frames.len() {
            return false;
        }
        let frame = &self.frames[index];
        frame.is_last_command() && !frame.try_block && !frame.section
    }

    /// Replaces the frame at `index` (which must be the top) with a new frame
    /// inheriting its return target, function boundary and export target.
    pub(crate) fn replace_frame(&mut self, index: usize, script: Rc<Script>, env: EnvId) -> usize {
        self.frames.truncate(index + 1);
        let inherited = self.frames.pop().map(|frame| {
            (frame.return_to, frame.function_boundary, frame.export_target)
        });
        let (return_to, function_boundary, export_target) =
            inherited.unwrap_or((ReturnTarget::Discard, false, None));
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        let mut frame = CallFrame::new(id, script, env, return_to);
        frame.function_boundary = function_boundary;
        frame.export_target = export_target;
        self.frames.push(frame);
        self.frames.len() - 1
    }

    pub(crate) fn gc_roots(&self) -> impl Iterator<Item = EnvId> + '_ {
        std::iter::once(self.env).chain(self.frames.iter().map(|frame| frame.env))
    }

    /// Runs until the frame at `index` has been popped.
    pub fn await_frame(&mut self, rt: &mut Runtime, index: usize) -> Result<(), ScriptError> {
        self.await_with(rt, AwaitLimit::Budget, |process| process.frames.len() > index)
    }

    pub fn await_frame_unlimited(&mut self, rt: &mut Runtime, index: usize) -> Result<(), ScriptError> {
        self.await_with(rt, AwaitLimit::Unlimited, |process| process.frames.len() > index)
    }

    pub fn await_frame_limited(
        &mut self,
        rt: &mut Runtime,
        index: usize,
        runs: usize,
    ) -> Result<(), ScriptError> {
        self.await_with(rt, AwaitLimit::Runs(runs), |process| process.frames.len() > index)
    }

    /// Runs until every queued and running script has finished.
    pub fn await_idle(&mut self, rt: &mut Runtime, limit: AwaitLimit) -> Result<(), ScriptError> {
        self.await_with(rt, limit, |process| !process.is_idle())
    }

    fn await_with<F>(&mut self, rt: &mut Runtime, limit: AwaitLimit, pending: F) -> Result<(), ScriptError>
    where
        F: Fn(&Process) -> bool,
    {
        let bound = match limit {
            AwaitLimit::Budget => Some(rt.options.await_tick_budget),
            AwaitLimit::Unlimited => None,
            AwaitLimit::Runs(runs) => Some(runs),
        };
        let mut runs = 0usize;
        while !self.ended && pending(self) {
            if bound.is_some_and(|bound| runs >= bound) {
                return Err(ScriptError::new(
                    "ENGINE_AWAIT_LIMIT",
                    format!("Process {} did not finish within {} runs.", self.id, runs),
                ));
            }
            self.run(rt);
            runs += 1;
        }
        Ok(())
    }
}
