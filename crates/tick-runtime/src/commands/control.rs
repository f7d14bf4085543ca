use tick_core::{is_truthy, CommandResult, ResumeToken, Status};
use tick_parser::expand_values;

use super::{continue_scoped, continue_with, resumed, RESUME};
use crate::control_flow::STACK_OVERFLOW;
use crate::environment::{EnvId, Object};
use crate::frame::InvocationData;
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

const CHECK: ResumeToken = 2;
const BODY: ResumeToken = 3;

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command("if", "<cond> <body> [elif <cond> <body>]... [else <body>]", if_command)
        .command("elif", "<cond> <body> [elif <cond> <body>]... [else <body>]", elif)
        .command("else", "<body>", else_command)
        .command("while", "<cond> <body>", while_loop)
        .command("for", "<var> <start> <end> [step] <body>", for_loop)
        .command("foreach", "<var> <list> <body>", foreach)
        .command("scope", "<body>", scope)
        .command("exec", "<text>", exec)
        .command("try", "<body>", try_command)
        .command("catch", "[name] [body]", catch)
        .command("throw", "<message...>", throw)
        .command("return", "[value...]", return_command)
        .command("break", "", break_command)
        .command("continue", "", continue_command)
}

enum Branch<'a> {
    Taken(&'a str),
    NoneTaken,
    Malformed,
}

/// Walks `cond body [elif cond body]* [else body]`.
fn select_branch(args: &[String]) -> Branch<'_> {
    let mut rest = args;
    loop {
        match rest {
            [condition, body, tail @ ..] => {
                if is_truthy(condition) {
                    return Branch::Taken(body);
                }
                rest = match tail {
                    [] => return Branch::NoneTaken,
                    [keyword, tail @ ..] if keyword == "elif" => tail,
                    [keyword, body] if keyword == "else" => return Branch::Taken(body),
                    _ => return Branch::Malformed,
                };
            }
            _ => return Branch::Malformed,
        }
    }
}

fn run_branch(frame: &mut FrameHandle<'_>, args: &[String], usage: &str, name: &str) -> CommandResult {
    match select_branch(args) {
        Branch::Taken(body) => continue_scoped(frame, body),
        Branch::NoneTaken => CommandResult::condition_failed(),
        Branch::Malformed => CommandResult::usage(name, usage),
    }
}

fn if_command(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    run_branch(
        frame,
        args,
        "<cond> <body> [elif <cond> <body>]... [else <body>]",
        "if",
    )
}

fn elif(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    if frame.status() != Status::ConditionFailed {
        return CommandResult::none();
    }
    run_branch(
        frame,
        args,
        "<cond> <body> [elif <cond> <body>]... [else <body>]",
        "elif",
    )
}

fn else_command(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [body] = args else {
        return CommandResult::usage("else", "<body>");
    };
    if frame.status() != Status::ConditionFailed {
        return CommandResult::none();
    }
    continue_scoped(frame, body)
}

/// Starts one loop iteration as a section frame so BREAK and CONTINUE stop
/// there.
fn start_body(frame: &mut FrameHandle<'_>, body: &str, env: EnvId) -> CommandResult {
    let script = frame.parse(body);
    match frame.call(script, env) {
        Some(mut section) => {
            section.mark_section();
            CommandResult::not_done(BODY)
        }
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

/// What a finished iteration means for the loop: `Some` ends it.
fn after_body(frame: &mut FrameHandle<'_>) -> Option<CommandResult> {
    let result = resumed(frame);
    match result.status {
        Status::Break => Some(CommandResult::none()),
        Status::Return | Status::ReturnValue => Some(result),
        _ => None,
    }
}

fn while_loop(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [condition, body] = args else {
        return CommandResult::usage("while", "<cond> <body>");
    };
    match frame.token() {
        CHECK => {
            let result = resumed(frame);
            if result.status.escapes_frame() {
                return result;
            }
            if !is_truthy(&result.value) {
                return CommandResult::none();
            }
            let env = frame.child_env();
            start_body(frame, body, env)
        }
        BODY => match after_body(frame) {
            Some(done) => done,
            None => check_condition(frame, condition),
        },
        _ => check_condition(frame, condition),
    }
}

fn check_condition(frame: &mut FrameHandle<'_>, condition: &str) -> CommandResult {
    let script = frame.parse(condition);
    let env = frame.env();
    match frame.call(script, env) {
        Some(_) => CommandResult::not_done(CHECK),
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

fn parse_bound(name: &str, what: &str, text: &str) -> Result<i64, CommandResult> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| CommandResult::error(format!("{}: {} must be an integer, got \"{}\"", name, what, text)))
}

fn for_loop(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let (name, start, end, step, body) = match args {
        [name, start, end, body] => (name, start, end, None, body),
        [name, start, end, step, body] => (name, start, end, Some(step), body),
        _ => return CommandResult::usage("for", "<var> <start> <end> [step] <body>"),
    };
    if frame.token() == BODY {
        if let Some(done) = after_body(frame) {
            return done;
        }
    } else {
        let bounds = parse_bound("for", "start", start).and_then(|start| {
            let end = parse_bound("for", "end", end)?;
            let step = match step {
                Some(step) => parse_bound("for", "step", step)?,
                None => 1,
            };
            Ok((start, end, step))
        });
        let (start, end, step) = match bounds {
            Ok(bounds) => bounds,
            Err(error) => return error,
        };
        if step == 0 {
            return CommandResult::error("for: step must not be 0");
        }
        frame.set_data(InvocationData::Counter {
            next: start,
            end,
            step,
        });
    }

    let &InvocationData::Counter { next, end, step } = frame.data() else {
        return CommandResult::error("for: loop state lost");
    };
    if (step > 0 && next >= end) || (step < 0 && next <= end) {
        return CommandResult::none();
    }
    // Stepping past the integer range ends the loop after this body.
    frame.set_data(InvocationData::Counter {
        next: next.checked_add(step).unwrap_or(end),
        end,
        step,
    });
    let env = frame.child_env();
    frame
        .environments_mut()
        .insert_object(env, name, Object::Variable(next.to_string()));
    start_body(frame, body, env)
}

fn foreach(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [name, list, body] = args else {
        return CommandResult::usage("foreach", "<var> <list> <body>");
    };
    if frame.token() == BODY {
        if let Some(done) = after_body(frame) {
            return done;
        }
    } else {
        frame.set_data(InvocationData::Items {
            items: expand_values(list),
            next: 0,
        });
    }

    let item = match frame.data_mut() {
        InvocationData::Items { items, next } => {
            let item = items.get(*next).cloned();
            *next += 1;
            item
        }
        _ => None,
    };
    let Some(item) = item else {
        return CommandResult::none();
    };
    let env = frame.child_env();
    frame
        .environments_mut()
        .insert_object(env, name, Object::Variable(item));
    start_body(frame, body, env)
}

fn scope(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [body] = args else {
        return CommandResult::usage("scope", "<body>");
    };
    continue_scoped(frame, body)
}

fn exec(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [text] = args else {
        return CommandResult::usage("exec", "<text>");
    };
    let env = frame.env();
    continue_with(frame, text, env)
}

fn try_command(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [body] = args else {
        return CommandResult::usage("try", "<body>");
    };
    frame.clear_latest_error();
    let script = frame.parse(body);
    let env = frame.child_env();
    match frame.call(script, env) {
        Some(mut guarded) => {
            guarded.mark_try_block();
            CommandResult::not_done(RESUME)
        }
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

fn catch(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    if args.len() > 2 {
        return CommandResult::usage("catch", "[name] [body]");
    }
    let Some(message) = frame.take_latest_error() else {
        return CommandResult::none();
    };
    match args {
        [body] => continue_scoped(frame, body),
        [name, body] => {
            let env = frame.child_env();
            frame
                .environments_mut()
                .insert_object(env, name, Object::Variable(message));
            continue_with(frame, body, env)
        }
        _ => CommandResult::value(message),
    }
}

fn throw(_frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if args.is_empty() {
        return CommandResult::usage("throw", "<message...>");
    }
    CommandResult::error(args.join(" "))
}

fn return_command(_frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if args.is_empty() {
        CommandResult::ret()
    } else {
        CommandResult::ret_value(args.join(" "))
    }
}

fn break_command(_frame: &mut FrameHandle<'_>, _args: &[String]) -> CommandResult {
    CommandResult::brk()
}

fn continue_command(_frame: &mut FrameHandle<'_>, _args: &[String]) -> CommandResult {
    CommandResult::cont()
}

#[cfg(test)]
mod control_tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split(' ').map(str::to_string).collect()
    }

    #[test]
    fn select_branch_walks_elif_chain() {
        assert!(matches!(
            select_branch(&words("0 a elif 1 b else c")),
            Branch::Taken("b")
        ));
        assert!(matches!(
            select_branch(&words("0 a elif 0 b else c")),
            Branch::Taken("c")
        ));
        assert!(matches!(
            select_branch(&words("false a elif 0 b")),
            Branch::NoneTaken
        ));
        assert!(matches!(select_branch(&words("1")), Branch::Malformed));
        assert!(matches!(
            select_branch(&words("0 a otherwise b")),
            Branch::Malformed
        ));
    }
}
