mod control;
mod library;
mod modules;
mod objects;
mod output;
mod tasks;

use std::rc::Rc;

use tick_core::{CommandResult, ResumeToken};

use crate::control_flow::STACK_OVERFLOW;
use crate::environment::EnvId;
use crate::handle::FrameHandle;
use crate::registry::RegistryBuilder;

pub use library::ScriptLibrary;

pub(crate) const RESUME: ResumeToken = 1;

pub(crate) fn register_core(builder: RegistryBuilder) -> RegistryBuilder {
    let builder = output::register(builder);
    let builder = objects::register(builder);
    let builder = control::register(builder);
    let builder = modules::register(builder);
    tasks::register(builder)
}

pub(crate) fn register_library(builder: RegistryBuilder, library: Rc<ScriptLibrary>) -> RegistryBuilder {
    library::register(builder, library)
}

/// Runs `body` in `env` as this command's continuation and waits for it.
fn continue_with(frame: &mut FrameHandle<'_>, body: &str, env: EnvId) -> CommandResult {
    let script = frame.parse(body);
    match frame.tail_call(script, env) {
        Some(_) => CommandResult::not_done(RESUME),
        None => CommandResult::error(STACK_OVERFLOW),
    }
}

fn continue_scoped(frame: &mut FrameHandle<'_>, body: &str) -> CommandResult {
    let env = frame.child_env();
    continue_with(frame, body, env)
}

fn resumed(frame: &mut FrameHandle<'_>) -> CommandResult {
    frame.take_call_result().unwrap_or_default()
}
