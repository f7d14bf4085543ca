use std::collections::BTreeMap;

use tick_core::{Command, CommandResult};
use tick_parser::{expand_values, format_command};

use crate::environment::{Function, Object};
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command("var", "<name> [value]", var)
        .command("const", "<name> <value>", constant)
        .command("set", "<name> <value>", set)
        .command("unset", "<name>", unset)
        .command("alias", "<name> [command...]", alias)
        .command("unalias", "<name>", unalias)
        .command("function", "<name> [params] <body>", function)
        .command("array", "<name> [entries]", array)
        .command("table", "<name> [entries]", table)
        .command("append", "<name> <entries>", append)
}

fn var(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let (name, value) = match args {
        [name] => (name, String::new()),
        [name, value] => (name, value.clone()),
        _ => return CommandResult::usage("var", "<name> [value]"),
    };
    let env = frame.env();
    if let Some(Object::Constant(_)) = frame.environments().object(env, name) {
        return CommandResult::error(format!("var: {} is a constant", name));
    }
    frame
        .environments_mut()
        .insert_object(env, name, Object::Variable(value));
    CommandResult::none()
}

fn constant(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name, value] = args else {
        return CommandResult::usage("const", "<name> <value>");
    };
    let env = frame.env();
    if let Some(Object::Constant(_)) = frame.environments().object(env, name) {
        return CommandResult::error(format!("const: {} is already defined", name));
    }
    frame
        .environments_mut()
        .insert_object(env, name, Object::Constant(value.clone()));
    CommandResult::none()
}

fn set(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name, value] = args else {
        return CommandResult::usage("set", "<name> <value>");
    };
    let env = frame.env();
    let Some(scope) = frame.environments().find_object_scope(env, name) else {
        return CommandResult::error(format!("set: Couldn't find {}", name));
    };
    match frame.environments().object(scope, name) {
        Some(Object::Variable(_)) => {
            frame
                .environments_mut()
                .insert_object(scope, name, Object::Variable(value.clone()));
            CommandResult::none()
        }
        Some(other) => CommandResult::error(format!("set: {} is a {}", name, other.kind_name())),
        None => CommandResult::error(format!("set: Couldn't find {}", name)),
    }
}

fn unset(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name] = args else {
        return CommandResult::usage("unset", "<name>");
    };
    let env = frame.env();
    match frame.environments_mut().erase_object(env, name) {
        Some(_) => CommandResult::none(),
        None => CommandResult::error(format!("unset: Couldn't find {}", name)),
    }
}

fn alias(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let env = frame.env();
    let command = match args {
        [name] => {
            return match frame.environments().lookup_alias(env, name) {
                Some(command) => CommandResult::value(format_command(&command)),
                None => CommandResult::error(format!("alias: Couldn't find {}", name)),
            };
        }
        [_, text] => {
            let script = frame.parse(text);
            match script.commands.as_slice() {
                [command] => command.clone(),
                _ => {
                    return CommandResult::error("alias: the body must be exactly one command")
                }
            }
        }
        [_, words @ ..] if !words.is_empty() => Command::from_values(words.iter().cloned()),
        _ => return CommandResult::usage("alias", "<name> [command...]"),
    };
    frame
        .environments_mut()
        .insert_alias(env, &args[0], command);
    CommandResult::none()
}

fn unalias(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name] = args else {
        return CommandResult::usage("unalias", "<name>");
    };
    let env = frame.env();
    match frame.environments_mut().erase_alias(env, name) {
        Some(_) => CommandResult::none(),
        None => CommandResult::error(format!("unalias: Couldn't find {}", name)),
    }
}

fn function(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let (name, params, body) = match args {
        [name, body] => (name, Vec::new(), body),
        [name, params, body] => (name, expand_values(params), body),
        _ => return CommandResult::usage("function", "<name> [params] <body>"),
    };
    let env = frame.env();
    let body = frame.parse(body);
    frame.environments_mut().insert_object(
        env,
        name,
        Object::Function(Function { params, body, env }),
    );
    CommandResult::none()
}

fn array(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let (name, entries) = match args {
        [name] => (name, None),
        [name, entries] => (name, Some(entries)),
        _ => return CommandResult::usage("array", "<name> [entries]"),
    };
    let env = frame.env();
    let envs = frame.environments_mut();
    envs.insert_object(env, name, Object::Array(Vec::new()));
    match entries.map(|entries| envs.append_to_array(env, name, entries)) {
        Some(Err(message)) => {
            envs.erase_object(env, name);
            CommandResult::error(format!("array: {}", message))
        }
        _ => CommandResult::none(),
    }
}

fn table(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let (name, entries) = match args {
        [name] => (name, None),
        [name, entries] => (name, Some(entries)),
        _ => return CommandResult::usage("table", "<name> [entries]"),
    };
    let env = frame.env();
    let envs = frame.environments_mut();
    envs.insert_object(env, name, Object::Table(BTreeMap::new()));
    match entries.map(|entries| envs.append_to_table(env, name, entries)) {
        Some(Err(message)) => {
            envs.erase_object(env, name);
            CommandResult::error(format!("table: {}", message))
        }
        _ => CommandResult::none(),
    }
}

fn append(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name, entries] = args else {
        return CommandResult::usage("append", "<name> <entries>");
    };
    let env = frame.env();
    let envs = frame.environments_mut();
    let Some(scope) = envs.find_object_scope(env, name) else {
        return CommandResult::error(format!("append: Couldn't find {}", name));
    };
    let appended = match envs.object(scope, name) {
        Some(Object::Table(_)) => envs.append_to_table(scope, name, entries),
        _ => envs.append_to_array(scope, name, entries),
    };
    match appended {
        Ok(()) => CommandResult::none(),
        Err(message) => CommandResult::error(format!("append: {}", message)),
    }
}
