use tick_core::CommandResult;

use super::RESUME;
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command("echo", "[text...]", echo)
        .command("read", "", read)
}

fn echo(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    frame.write_line(&args.join(" "));
    CommandResult::none()
}

fn read(frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::usage("read", "");
    }
    match frame.read_input() {
        Some(line) => CommandResult::value(line),
        None => CommandResult::defer(RESUME),
    }
}
