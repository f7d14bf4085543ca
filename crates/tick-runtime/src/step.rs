use std::rc::Rc;

use tick_core::{Argument, Command, CommandResult, Status};
use tick_parser::expand_values;
use tracing::{trace, warn};

use crate::control_flow::{ALIAS_LIMIT, STACK_OVERFLOW, STEP_LIMIT};
use crate::environment::{Function, Object};
use crate::frame::{Phase, ReturnTarget, Slot};
use crate::handle::FrameHandle;
use crate::process::Process;
use crate::runtime::Runtime;

pub(crate) enum Flow {
    Continue,
    Yield,
}

fn push_value(args: &mut Vec<String>, value: String, expand: bool) {
    if expand {
        args.extend(expand_values(&value));
    } else {
        args.push(value);
    }
}

impl Process {
    /// Interprets until the stack drains, a command defers, or the process
    /// ends. Returns whether the process is done.
    pub fn run(&mut self, rt: &mut Runtime) -> bool {
        if self.ended {
            return true;
        }
        self.run_count += 1;
        let mut steps = 0usize;
        loop {
            if self.ended {
                return true;
            }
            if self.frames.is_empty() {
                let Some(script) = self.queued.pop_front() else {
                    return self.is_done();
                };
                let env = self.env;
                if self.push_frame(script, env, ReturnTarget::Root).is_none() {
                    self.handle_root_error(STACK_OVERFLOW.to_string(), rt);
                    continue;
                }
            }
            steps += 1;
            if steps > rt.options.max_steps_per_run {
                warn!(
                    process = self.id,
                    limit = rt.options.max_steps_per_run,
                    "step limit exceeded"
                );
                self.handle_root_error(STEP_LIMIT.to_string(), rt);
                return self.is_done();
            }
            if let Flow::Yield = self.step(rt) {
                return self.is_done();
            }
        }
    }

    fn step(&mut self, rt: &mut Runtime) -> Flow {
        let index = self.frames.len() - 1;
        let frame = &mut self.frames[index];
        if frame.is_exhausted() {
            let result = frame.result();
            self.finish_frame(index, result, rt);
            return Flow::Continue;
        }
        let phase = frame.state.phase;
        match phase {
            Phase::Resolving => self.resolve_arguments(index, rt),
            Phase::AwaitingArgument => {
                let result = frame.state.delivered.take().unwrap_or_default();
                self.accept_argument(index, result, rt)
            }
            Phase::Dispatching => {
                if frame.state.call_result.as_ref().is_some_and(CommandResult::is_error) {
                    let result = frame.state.call_result.take().unwrap_or_default();
                    return self.complete_command(index, result, rt);
                }
                self.dispatch(index, rt)
            }
            Phase::AwaitingFunction => {
                let result = frame.state.call_result.take().unwrap_or_default();
                self.complete_command(index, result, rt)
            }
        }
    }

    fn resolve_arguments(&mut self, index: usize, rt: &mut Runtime) -> Flow {
        loop {
            let frame = &mut self.frames[index];
            let position = frame.state.next_arg;
            let Some(argument) = frame
                .current_command()
                .and_then(|command| command.args.get(position))
                .cloned()
            else {
                if let Some(piped) = frame.pipe_input.take() {
                    let at = frame.state.args.len().min(1);
                    frame.state.args.insert(at, piped);
                }
                frame.state.phase = Phase::Dispatching;
                return self.dispatch(index, rt);
            };

            if argument.flags.exec {
                let script = rt.parse_cached(&argument.value);
                let env = frame.env;
                frame.state.phase = Phase::AwaitingArgument;
                let target = ReturnTarget::Frame {
                    index,
                    slot: Slot::Argument(position),
                };
                if self.push_frame(script, env, target).is_none() {
                    return self.complete_command(index, CommandResult::error(STACK_OVERFLOW), rt);
                }
                return Flow::Continue;
            }

            frame.state.next_arg += 1;
            push_value(&mut frame.state.args, argument.value, argument.flags.expand);
        }
    }

    fn accept_argument(&mut self, index: usize, result: CommandResult, rt: &mut Runtime) -> Flow {
        if matches!(
            result.status,
            Status::ErrorMsg | Status::Break | Status::Continue
        ) {
            return self.complete_command(index, result, rt);
        }
        let frame = &mut self.frames[index];
        let position = frame.state.next_arg;
        let expand = frame
            .current_command()
            .and_then(|command| command.args.get(position))
            .is_some_and(|argument| argument.flags.expand);
        frame.state.next_arg += 1;
        frame.state.phase = Phase::Resolving;
        push_value(&mut frame.state.args, result.value, expand);
        Flow::Continue
    }

    /// Resolves the command head: alias, then object, then registry.
    fn dispatch(&mut self, index: usize, rt: &mut Runtime) -> Flow {
        let frame = &mut self.frames[index];
        if frame.state.deferred_at == Some(self.run_count) {
            return Flow::Yield;
        }
        if frame.state.entry.is_some() {
            return self.invoke_entry(index, rt);
        }
        let Some(name) = frame.state.args.first().cloned() else {
            return self.complete_command(index, CommandResult::none(), rt);
        };

        let bare_expression = frame.state.args.len() == 1
            && frame.current_command().is_some_and(|command| {
                command.len() == 1 && command.args[0].flags.exec && !command.args[0].flags.expand
            });
        if bare_expression {
            return self.complete_command(index, CommandResult::value(name), rt);
        }

        let env = frame.env;
        if let Some(alias) = rt.envs.lookup_alias(env, &name) {
            if frame.state.alias_depth >= rt.options.max_alias_depth {
                return self.complete_command(index, CommandResult::error(ALIAS_LIMIT), rt);
            }
            let mut args = alias.args.clone();
            args.extend(frame.state.args[1..].iter().cloned().map(Argument::literal));
            trace!(process = self.id, alias = %name, "alias substituted");
            let state = &mut frame.state;
            state.command = Some(Rc::new(Command::new(args)));
            state.alias_depth += 1;
            state.args.clear();
            state.next_arg = 0;
            state.phase = Phase::Resolving;
            return Flow::Continue;
        }

        if let Some(object) = rt.envs.lookup_object(env, &name).cloned() {
            let rest = frame.state.args[1..].to_vec();
            let result = match object {
                Object::Function(function) => return self.invoke_function(index, function, rest, rt),
                Object::Variable(value) => match rest.as_slice() {
                    [] => CommandResult::value(value),
                    [assigned] => {
                        if let Some(scope) = rt.envs.find_object_scope(env, &name) {
                            rt.envs
                                .insert_object(scope, &name, Object::Variable(assigned.clone()));
                        }
                        CommandResult::none()
                    }
                    _ => CommandResult::usage(&name, "[value]"),
                },
                Object::Constant(value) => match rest.as_slice() {
                    [] => CommandResult::value(value),
                    _ => CommandResult::error(format!("{}: cannot assign to a constant", name)),
                },
                Object::Array(ref items) => match rest.as_slice() {
                    [] => CommandResult::value(object.render()),
                    [position] => match position.trim().parse::<usize>().ok().and_then(|i| items.get(i)) {
                        Some(item) => CommandResult::value(item.clone()),
                        None => CommandResult::error(format!("{}: no element {}", name, position)),
                    },
                    _ => CommandResult::usage(&name, "[index]"),
                },
                Object::Table(ref entries) => match rest.as_slice() {
                    [] => CommandResult::value(object.render()),
                    [key] => match entries.get(key) {
                        Some(value) => CommandResult::value(value.clone()),
                        None => CommandResult::error(format!("{}: no key {}", name, key)),
                    },
                    _ => CommandResult::usage(&name, "[key]"),
                },
            };
            return self.complete_command(index, result, rt);
        }

        let Some(entry) = rt.registry.lookup(&name).cloned() else {
            return self.complete_command(
                index,
                CommandResult::error(format!("Unknown command: {}", name)),
                rt,
            );
        };
        if !self.privileges.contains(entry.info().privileges) {
            return self.complete_command(
                index,
                CommandResult::error(format!("{}: permission denied", name)),
                rt,
            );
        }
        self.frames[index].state.entry = Some(entry);
        self.invoke_entry(index, rt)
    }

    fn invoke_entry(&mut self, index: usize, rt: &mut Runtime) -> Flow {
        let frame = &self.frames[index];
        let Some(entry) = frame.state.entry.clone() else {
            return Flow::Continue;
        };
        let args = frame.state.args.clone();
        let frame_id = frame.id;
        trace!(
            process = self.id,
            command = %entry.info().name,
            token = frame.state.token,
            "dispatch"
        );

        let result = {
            let mut handle = FrameHandle::new(self, rt, index);
            entry.invoke(&mut handle, args.get(1..).unwrap_or(&[]))
        };

        // A tail call replaced the frame; its successor carries on.
        if self.frames.get(index).map(|frame| frame.id) != Some(frame_id) {
            return Flow::Continue;
        }
        match result.status {
            Status::NotDone(token) => {
                let state = &mut self.frames[index].state;
                state.token = token;
                state.deferred_at = None;
                Flow::Continue
            }
            Status::DeferToNextFrame(token) => {
                let run_count = self.run_count;
                let state = &mut self.frames[index].state;
                state.token = token;
                state.deferred_at = Some(run_count);
                Flow::Yield
            }
            _ => self.complete_command(index, result, rt),
        }
    }

    fn invoke_function(
        &mut self,
        index: usize,
        function: Function,
        args: Vec<String>,
        rt: &mut Runtime,
    ) -> Flow {
        let env = rt.envs.create_child(function.env);
        for (position, param) in function.params.iter().enumerate() {
            let value = args.get(position).cloned().unwrap_or_default();
            rt.envs.insert_object(env, param, Object::Variable(value));
        }
        self.frames[index].state.phase = Phase::AwaitingFunction;
        let pushed = if self.can_tail_call(index) {
            Some(self.replace_frame(index, function.body, env))
        } else {
            let target = ReturnTarget::Frame {
                index,
                slot: Slot::Call,
            };
            self.push_frame(function.body, env, target)
        };
        match pushed {
            Some(callee) => {
                self.frames[callee].function_boundary = true;
                Flow::Continue
            }
            None => self.complete_command(index, CommandResult::error(STACK_OVERFLOW), rt),
        }
    }
}
