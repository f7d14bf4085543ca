mod commands;
mod control_flow;
mod environment;
mod frame;
mod handle;
mod io;
mod options;
mod process;
mod registry;
mod rng;
mod runtime;
mod settings;
mod step;
mod vm;

pub use commands::ScriptLibrary;
pub use environment::{EnvArena, EnvId, Environment, Function, Object};
pub use frame::{InvocationData, ReturnTarget, Slot};
pub use handle::FrameHandle;
pub use io::{LineBuffer, NullSink, OutputSink, StderrSink, StdoutSink};
pub use options::VirtualMachineOptions;
pub use process::{AwaitLimit, ErrorHandler, Process, ProcessId};
pub use registry::{
    Callable, CommandInfo, Entry, OptionSpec, Registry, RegistryBuilder, Setting,
    SuggestionProvider,
};
pub use runtime::Runtime;
pub use settings::{BoolSetting, IntSetting, StringSetting};
pub use vm::VirtualMachine;

pub use tick_core::{CommandResult, Privileges, ResumeToken, Script, ScriptError, Status};
