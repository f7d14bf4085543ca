use tick_core::CommandResult;

use super::RESUME;
use crate::frame::InvocationData;
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command("wait", "[ticks]", wait)
        .command("launch", "<body>", launch)
        .command("end", "[pid]", end)
        .command("random", "<bound>", random)
}

fn wait(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        let remaining = match frame.data() {
            InvocationData::Countdown(remaining) => *remaining,
            _ => 0,
        };
        if remaining <= 1 {
            return CommandResult::none();
        }
        frame.set_data(InvocationData::Countdown(remaining - 1));
        return CommandResult::defer(RESUME);
    }
    let ticks = match args {
        [] => 1,
        [ticks] => match ticks.trim().parse::<u64>() {
            Ok(ticks) => ticks,
            Err(_) => {
                return CommandResult::error(format!("wait: \"{}\" is not a tick count", ticks))
            }
        },
        _ => return CommandResult::usage("wait", "[ticks]"),
    };
    if ticks == 0 {
        return CommandResult::none();
    }
    frame.set_data(InvocationData::Countdown(ticks));
    CommandResult::defer(RESUME)
}

fn launch(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [body] = args else {
        return CommandResult::usage("launch", "<body>");
    };
    let script = frame.parse(body);
    let env = frame.child_env();
    let child = frame.launch(script, env);
    CommandResult::value(child.to_string())
}

fn end(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    match args {
        [] => {
            frame.end_process();
            CommandResult::none()
        }
        [pid] => {
            let Ok(id) = pid.trim().parse::<u64>() else {
                return CommandResult::error(format!("end: \"{}\" is not a process id", pid));
            };
            if id == frame.process_id() {
                frame.end_process();
                return CommandResult::none();
            }
            if frame.end_child(id) {
                CommandResult::none()
            } else {
                CommandResult::error(format!("end: {} is not a child of this process", id))
            }
        }
        _ => CommandResult::usage("end", "[pid]"),
    }
}

fn random(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    let [bound] = args else {
        return CommandResult::usage("random", "<bound>");
    };
    match bound.trim().parse::<u32>() {
        Ok(bound) if bound > 0 => CommandResult::value(frame.random(bound).to_string()),
        _ => CommandResult::error(format!("random: \"{}\" is not a positive bound", bound)),
    }
}
