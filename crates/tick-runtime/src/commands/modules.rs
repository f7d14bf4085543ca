use std::rc::Rc;

use tick_core::{Command, CommandResult, Script};

use super::{resumed, RESUME};
use crate::control_flow::STACK_OVERFLOW;
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command("global", "<command...>", global)
        .command("import", "<text>", import)
        .command("export", "<name...>", export)
}

fn global(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    if args.is_empty() {
        return CommandResult::usage("global", "<command...>");
    }
    let script = Rc::new(Script::single(Command::from_values(args.iter().cloned())));
    let env = frame.global();
    match frame.tail_call(script, env) {
        Some(_) => CommandResult::not_done(RESUME),
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

fn import(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [text] = args else {
        return CommandResult::usage("import", "<text>");
    };
    let destination = frame.env();
    let script = frame.parse(text);
    let env = frame.child_env();
    match frame.call(script, env) {
        Some(mut module) => {
            module.set_export_target(Some(destination));
            CommandResult::not_done(RESUME)
        }
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

fn export(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if args.is_empty() {
        return CommandResult::usage("export", "<name...>");
    }
    let Some(target) = frame.export_target() else {
        return CommandResult::error("export: not inside an import");
    };
    let env = frame.env();
    for name in args {
        let envs = frame.environments_mut();
        if let Some(object) = envs.lookup_object(env, name).cloned() {
            envs.insert_object(target, name, object);
        } else if let Some(alias) = envs.lookup_alias(env, name) {
            envs.insert_shared_alias(target, name, alias);
        } else {
            return CommandResult::error(format!("export: Couldn't find {}", name));
        }
    }
    CommandResult::none()
}
