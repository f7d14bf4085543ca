use tick_core::{Command, CommandResult, Status};
use tracing::{debug, warn};

use crate::frame::{CallFrame, CommandState, Phase, ReturnTarget, Slot};
use crate::process::Process;
use crate::runtime::Runtime;
use crate::step::Flow;

pub(crate) const STACK_OVERFLOW: &str = "Stack overflow.";
pub(crate) const ALIAS_LIMIT: &str = "Alias recursion limit exceeded.";
pub(crate) const STEP_LIMIT: &str = "Execution step limit exceeded.";

impl Process {
    /// Records a terminal command result: escaping statuses unwind the
    /// frame, everything else advances it.
    pub(crate) fn complete_command(
        &mut self,
        index: usize,
        result: CommandResult,
        rt: &mut Runtime,
    ) -> Flow {
        if result.status.escapes_frame() {
            self.finish_frame(index, result, rt);
            return Flow::Continue;
        }
        let Some(frame) = self.frames.get_mut(index) else {
            return Flow::Continue;
        };
        let status = if result.status.is_suspended() {
            Status::None
        } else {
            result.status
        };
        let pipes = frame
            .script
            .commands
            .get(frame.pc)
            .is_some_and(Command::pipes_into_next);
        if pipes {
            frame.pipe_input = Some(result.value.clone());
        }
        frame.status = status;
        frame.value = result.value;
        frame.pc += 1;
        frame.state = CommandState::default();

        // Frames a finished command left behind no longer have a receiver.
        for above in self.frames.iter_mut().skip(index + 1) {
            if matches!(above.return_to, ReturnTarget::Frame { index: target, .. } if target == index)
            {
                above.return_to = ReturnTarget::Discard;
            }
        }
        Flow::Continue
    }

    /// Pops the frame at `index` (and anything above it) and hands its
    /// result to the recorded return target.
    pub(crate) fn finish_frame(&mut self, index: usize, result: CommandResult, rt: &mut Runtime) {
        if index >= self.frames.len() {
            return;
        }
        self.frames.truncate(index + 1);
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let result = self.settle(&frame, result);
        self.deliver(frame.return_to, result, rt);
    }

    /// Applies the boundary rules of `frame` to a result leaving it.
    fn settle(&mut self, frame: &CallFrame, mut result: CommandResult) -> CommandResult {
        match result.status {
            Status::ConditionFailed | Status::NotDone(_) | Status::DeferToNextFrame(_) => {
                result.status = Status::None;
            }
            Status::Return if frame.function_boundary => result.status = Status::None,
            Status::ReturnValue if frame.function_boundary => result.status = Status::Value,
            Status::Break | Status::Continue
                if !frame.section
                    && (frame.try_block
                        || matches!(frame.return_to, ReturnTarget::Root | ReturnTarget::Discard)) =>
            {
                result = CommandResult::error(format!("{} outside a loop", result.status.name()));
            }
            _ => {}
        }
        if result.is_error() && frame.try_block {
            debug!(process = self.id, error = %result.value, "error caught by try block");
            self.latest_error = Some(result.value);
            return CommandResult::none();
        }
        result
    }

    fn deliver(&mut self, target: ReturnTarget, result: CommandResult, rt: &mut Runtime) {
        match target {
            ReturnTarget::Root => {
                if result.is_error() {
                    self.handle_root_error(result.value, rt);
                    return;
                }
                let status = match result.status {
                    Status::Return => Status::None,
                    Status::ReturnValue => Status::Value,
                    status => status,
                };
                self.result = Some(CommandResult::new(status, result.value));
            }
            ReturnTarget::Discard => {
                if result.is_error() {
                    warn!(process = self.id, error = %result.value, "error in discarded call");
                    self.write_error(&result.value, rt);
                }
            }
            ReturnTarget::Frame { index, slot } => {
                let Some(frame) = self.frames.get_mut(index) else {
                    return;
                };
                match slot {
                    Slot::Argument(position) => {
                        if frame.state.phase == Phase::AwaitingArgument
                            && frame.state.next_arg == position
                        {
                            frame.state.delivered = Some(result);
                        }
                    }
                    Slot::Call => frame.state.call_result = Some(result),
                }
            }
        }
    }

    /// An error reached the bottom of the stack: the installed handler gets
    /// it and the process lives on, otherwise the process ends.
    pub(crate) fn handle_root_error(&mut self, message: String, rt: &mut Runtime) {
        self.frames.clear();
        if let Some(handler) = self.error_handler.as_mut() {
            debug!(process = self.id, error = %message, "error handler invoked");
            handler(&message);
            return;
        }
        warn!(process = self.id, error = %message, "unhandled script error");
        self.write_error(&message, rt);
        self.result = Some(CommandResult::error(message.clone()));
        self.latest_error = Some(message);
        self.end();
    }
}
