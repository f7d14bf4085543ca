use std::any::Any;
use std::rc::Rc;

use tick_core::{Command, CommandResult, ResumeToken, Script, Status};

use crate::environment::EnvId;
use crate::registry::Entry;

/// Which pending value of the return frame a finished frame fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Argument(usize),
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTarget {
    /// Fire-and-forget: the result is dropped, errors are only reported.
    Discard,
    /// Bottom of the stack: the result becomes the process result.
    Root,
    Frame { index: usize, slot: Slot },
}

/// Per-invocation state a resumable command keeps across NOT_DONE and
/// DEFER_TO_NEXT_FRAME re-entries. Cleared when the command completes.
#[derive(Debug, Default)]
pub enum InvocationData {
    #[default]
    Empty,
    Countdown(u64),
    Counter {
        next: i64,
        end: i64,
        step: i64,
    },
    Items {
        items: Vec<String>,
        next: usize,
    },
    Custom(Box<dyn Any>),
}

impl InvocationData {
    pub fn custom<T: Any>(value: T) -> Self {
        Self::Custom(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(value) => value.downcast_ref(),
            _ => None,
        }
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            Self::Custom(value) => value.downcast_mut(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Phase {
    #[default]
    Resolving,
    AwaitingArgument,
    Dispatching,
    AwaitingFunction,
}

#[derive(Default)]
pub(crate) struct CommandState {
    pub(crate) phase: Phase,
    /// Alias-substituted replacement for the script's command.
    pub(crate) command: Option<Rc<Command>>,
    pub(crate) alias_depth: usize,
    pub(crate) next_arg: usize,
    pub(crate) args: Vec<String>,
    pub(crate) delivered: Option<CommandResult>,
    pub(crate) call_result: Option<CommandResult>,
    pub(crate) entry: Option<Rc<Entry>>,
    pub(crate) token: ResumeToken,
    pub(crate) deferred_at: Option<u64>,
    pub(crate) data: InvocationData,
}

pub(crate) struct CallFrame {
    pub(crate) id: u64,
    pub(crate) script: Rc<Script>,
    pub(crate) pc: usize,
    pub(crate) state: CommandState,
    pub(crate) env: EnvId,
    pub(crate) return_to: ReturnTarget,
    pub(crate) export_target: Option<EnvId>,
    pub(crate) try_block: bool,
    pub(crate) section: bool,
    pub(crate) function_boundary: bool,
    pub(crate) status: Status,
    pub(crate) value: String,
    pub(crate) pipe_input: Option<String>,
}

impl CallFrame {
    pub(crate) fn new(id: u64, script: Rc<Script>, env: EnvId, return_to: ReturnTarget) -> Self {
        Self {
            id,
            script,
            pc: 0,
            state: CommandState::default(),
            env,
            return_to,
            export_target: None,
            try_block: false,
            section: false,
            function_boundary: false,
            status: Status::None,
            value: String::new(),
            pipe_input: None,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.pc >= self.script.len()
    }

    pub(crate) fn is_last_command(&self) -> bool {
        self.pc + 1 >= self.script.len()
    }

    pub(crate) fn current_command(&self) -> Option<&Command> {
        match &self.state.command {
            Some(command) => Some(command.as_ref()),
            None => self.script.commands.get(self.pc),
        }
    }

    pub(crate) fn result(&self) -> CommandResult {
        CommandResult::new(self.status, self.value.clone())
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Progress(u8);

    #[test]
    fn custom_data_downcasts_only_to_its_type() {
        let mut data = InvocationData::custom(Progress(1));
        assert_eq!(data.downcast_ref::<Progress>(), Some(&Progress(1)));
        assert!(data.downcast_ref::<u8>().is_none());
        if let Some(progress) = data.downcast_mut::<Progress>() {
            progress.0 += 1;
        }
        assert_eq!(data.downcast_ref::<Progress>(), Some(&Progress(2)));
        assert!(InvocationData::Countdown(3).downcast_ref::<Progress>().is_none());
    }
}
