use std::rc::Rc;

use tick_core::{CommandResult, Privileges, ResumeToken, Script, Status};

use crate::environment::{EnvArena, EnvId};
use crate::frame::{CallFrame, InvocationData, ReturnTarget, Slot};
use crate::options::VirtualMachineOptions;
use crate::process::{Process, ProcessId};
use crate::registry::Registry;
use crate::runtime::Runtime;

/// The view a callable gets of the frame it runs in. Stack indices stay
/// hidden; `call`, `tail_call` and `call_discard` pick the return target.
///
/// A handle is bound to one frame. Once that frame is gone, because the
/// process ended or a tail call replaced it, the handle is detached: reads
/// return neutral values and writes are dropped.
pub struct FrameHandle<'a> {
    process: &'a mut Process,
    rt: &'a mut Runtime,
    index: usize,
    frame_id: Option<u64>,
    detached_data: InvocationData,
}

impl<'a> FrameHandle<'a> {
    pub(crate) fn new(process: &'a mut Process, rt: &'a mut Runtime, index: usize) -> Self {
        let frame_id = process.frames.get(index).map(|frame| frame.id);
        Self {
            process,
            rt,
            index,
            frame_id,
            detached_data: InvocationData::Empty,
        }
    }

    fn frame(&self) -> Option<&CallFrame> {
        let frame = self.process.frames.get(self.index)?;
        (Some(frame.id) == self.frame_id).then_some(frame)
    }

    fn frame_mut(&mut self) -> Option<&mut CallFrame> {
        let frame_id = self.frame_id;
        let frame = self.process.frames.get_mut(self.index)?;
        (Some(frame.id) == frame_id).then_some(frame)
    }

    /// False once the frame this handle was created for has been popped.
    pub fn is_attached(&self) -> bool {
        self.frame().is_some()
    }

    pub fn env(&self) -> EnvId {
        self.frame()
            .map_or_else(|| self.process.environment(), |frame| frame.env)
    }

    /// Status of the previous command in this frame.
    pub fn status(&self) -> Status {
        self.frame().map_or(Status::None, |frame| frame.status)
    }

    pub fn value(&self) -> &str {
        self.frame().map_or("", |frame| frame.value.as_str())
    }

    pub fn token(&self) -> ResumeToken {
        self.frame().map_or(0, |frame| frame.state.token)
    }

    /// Resolved arguments of the running command, name first.
    pub fn args(&self) -> &[String] {
        match self.frame() {
            Some(frame) => &frame.state.args,
            None => &[],
        }
    }

    pub fn data(&self) -> &InvocationData {
        match self.frame() {
            Some(frame) => &frame.state.data,
            None => &self.detached_data,
        }
    }

    pub fn data_mut(&mut self) -> &mut InvocationData {
        if !self.is_attached() {
            self.detached_data = InvocationData::Empty;
            return &mut self.detached_data;
        }
        match self.process.frames.get_mut(self.index) {
            Some(frame) => &mut frame.state.data,
            None => &mut self.detached_data,
        }
    }

    pub fn set_data(&mut self, data: InvocationData) {
        if let Some(frame) = self.frame_mut() {
            frame.state.data = data;
        }
    }

    /// Result of the last frame pushed with [`FrameHandle::call`].
    pub fn take_call_result(&mut self) -> Option<CommandResult> {
        self.frame_mut()?.state.call_result.take()
    }

    pub fn mark_try_block(&mut self) {
        if let Some(frame) = self.frame_mut() {
            frame.try_block = true;
        }
    }

    pub fn mark_section(&mut self) {
        if let Some(frame) = self.frame_mut() {
            frame.section = true;
        }
    }

    pub fn set_export_target(&mut self, target: Option<EnvId>) {
        if let Some(frame) = self.frame_mut() {
            frame.export_target = target;
        }
    }

    pub fn clear_export_target(&mut self) {
        self.set_export_target(None);
    }

    /// Nearest live export target along the chain of return frames.
    pub fn export_target(&self) -> Option<EnvId> {
        self.frame()?;
        let mut next = Some(self.index);
        while let Some(index) = next {
            let frame = self.process.frames.get(index)?;
            if let Some(target) = frame.export_target {
                if self.rt.envs.is_alive(target) {
                    return Some(target);
                }
            }
            next = match frame.return_to {
                ReturnTarget::Frame { index, .. } => Some(index),
                ReturnTarget::Root | ReturnTarget::Discard => None,
            };
        }
        None
    }

    /// Pushes `script` as a callee whose result comes back through
    /// [`FrameHandle::take_call_result`]. `None` on stack overflow.
    pub fn call(&mut self, script: Rc<Script>, env: EnvId) -> Option<FrameHandle<'_>> {
        self.frame()?;
        let target = ReturnTarget::Frame {
            index: self.index,
            slot: Slot::Call,
        };
        let index = self.process.push_frame(script, env, target)?;
        Some(FrameHandle::new(&mut *self.process, &mut *self.rt, index))
    }

    /// Like [`FrameHandle::call`], but replaces this frame when the running
    /// command is its last. The callee then answers this frame's caller and
    /// this handle's own frame is gone.
    pub fn tail_call(&mut self, script: Rc<Script>, env: EnvId) -> Option<FrameHandle<'_>> {
        self.frame()?;
        if !self.process.can_tail_call(self.index) {
            return self.call(script, env);
        }
        let index = self.process.replace_frame(self.index, script, env);
        Some(FrameHandle::new(&mut *self.process, &mut *self.rt, index))
    }

    /// Pushes `script` with its result dropped. Errors are still reported.
    pub fn call_discard(&mut self, script: Rc<Script>, env: EnvId) -> Option<FrameHandle<'_>> {
        self.frame()?;
        let index = self
            .process
            .push_frame(script, env, ReturnTarget::Discard)?;
        Some(FrameHandle::new(&mut *self.process, &mut *self.rt, index))
    }

    pub fn process_id(&self) -> ProcessId {
        self.process.id()
    }

    pub fn privileges(&self) -> Privileges {
        self.process.privileges()
    }

    pub fn depth(&self) -> usize {
        self.process.depth()
    }

    pub fn write_line(&self, line: &str) {
        self.process.write_line(line, &*self.rt);
    }

    pub fn read_input(&mut self) -> Option<String> {
        self.process.pop_input()
    }

    pub fn latest_error(&self) -> Option<&str> {
        self.process.latest_error()
    }

    pub fn take_latest_error(&mut self) -> Option<String> {
        self.process.take_latest_error()
    }

    pub fn clear_latest_error(&mut self) {
        self.process.clear_latest_error();
    }

    pub fn end_process(&mut self) {
        self.process.end();
    }

    /// Starts a child process with this process's privileges.
    pub fn launch(&mut self, script: Rc<Script>, env: EnvId) -> ProcessId {
        let parent = self.process.id();
        let privileges = self.process.privileges();
        let child = self.rt.spawn(parent, privileges, env, script);
        self.process.add_child(child);
        child
    }

    /// Ends one of this process's children; false if `id` is not one.
    pub fn end_child(&mut self, id: ProcessId) -> bool {
        if !self.process.children().contains(&id) {
            return false;
        }
        self.rt.request_end(id);
        true
    }

    pub fn environments(&self) -> &EnvArena {
        &self.rt.envs
    }

    pub fn environments_mut(&mut self) -> &mut EnvArena {
        &mut self.rt.envs
    }

    pub fn global(&self) -> EnvId {
        self.rt.envs.global()
    }

    /// Fresh scope whose parent is this frame's environment.
    pub fn child_env(&mut self) -> EnvId {
        let parent = self.env();
        self.rt.envs.create_child(parent)
    }

    pub fn parse(&mut self, text: &str) -> Rc<Script> {
        self.rt.parse_cached(text)
    }

    pub fn random(&mut self, bound: u32) -> u32 {
        self.rt.random(bound)
    }

    pub fn ticks(&self) -> u64 {
        self.rt.ticks()
    }

    pub fn registry(&self) -> &Registry {
        &self.rt.registry
    }

    pub fn options(&self) -> &VirtualMachineOptions {
        &self.rt.options
    }
}
