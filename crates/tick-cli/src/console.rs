use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use tick_core::{Privileges, ScriptError};
use tick_runtime::{LineBuffer, ProcessId, ScriptLibrary, VirtualMachine, VirtualMachineOptions};
use tracing::debug;

use crate::{
    build_registry, load_options, map_console_io, read_scripts_from_dir, resolve_scripts_dir,
    ConsoleArgs, TICK_SECONDS,
};

const HELP: &str = "commands: :help :vars :complete <prefix> :quit";
/// Ticks one submitted line may take before the prompt comes back.
const TICKS_PER_LINE: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleAction {
    Continue,
    Quit,
}

/// One persistent privileged process fed a script per input line. While a
/// script is still running, plain lines become its pending input instead.
pub(crate) struct ConsoleSession {
    vm: VirtualMachine,
    process: ProcessId,
    output: Rc<LineBuffer>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl ConsoleSession {
    pub(crate) fn new(
        options: VirtualMachineOptions,
        library: Option<Rc<ScriptLibrary>>,
    ) -> Result<Self, ScriptError> {
        let mut vm = VirtualMachine::new(build_registry(library)?, options);
        let output = Rc::new(LineBuffer::default());
        vm.set_output(output.clone());
        vm.set_error_output(output.clone());

        let errors = Rc::new(RefCell::new(Vec::new()));
        let process = vm.launch_process(Privileges::ALL);
        if let Some(console) = vm.find_process_mut(process) {
            let sink = errors.clone();
            console.set_persistent(true);
            console.set_error_handler(move |message| sink.borrow_mut().push(message.to_string()));
        }

        Ok(Self {
            vm,
            process,
            output,
            errors,
        })
    }

    fn is_busy(&self) -> bool {
        self.vm
            .find_process(self.process)
            .is_some_and(|process| !process.is_idle())
    }

    pub(crate) fn handle_line(&mut self, raw: &str, emit: &mut dyn FnMut(String)) -> ConsoleAction {
        let line = raw.trim();
        match line {
            ":help" => {
                emit(HELP.to_string());
                ConsoleAction::Continue
            }
            ":quit" => {
                emit("bye".to_string());
                ConsoleAction::Quit
            }
            ":vars" => {
                self.list_variables(emit);
                ConsoleAction::Continue
            }
            _ if line == ":complete" || line.starts_with(":complete ") => {
                let prefix = line[":complete".len()..].trim_start();
                let candidates = self.vm.runtime().registry().complete(prefix);
                if candidates.is_empty() {
                    emit("(no completions)".to_string());
                }
                for candidate in candidates {
                    emit(candidate);
                }
                ConsoleAction::Continue
            }
            _ if line.starts_with(':') => {
                emit(format!("unknown console command: {}", line));
                ConsoleAction::Continue
            }
            _ => self.submit(raw, emit),
        }
    }

    fn list_variables(&self, emit: &mut dyn FnMut(String)) {
        let Some(process) = self.vm.find_process(self.process) else {
            return;
        };
        let Some(env) = self.vm.environments().get(process.environment()) else {
            return;
        };
        for (name, object) in env.objects() {
            emit(format!("{} {} = {}", object.kind_name(), name, object.render()));
        }
    }

    fn submit(&mut self, raw: &str, emit: &mut dyn FnMut(String)) -> ConsoleAction {
        let busy = self.is_busy();
        let script = self.vm.runtime_mut().parse_cached(raw);
        let Some(process) = self.vm.find_process_mut(self.process) else {
            emit("console process has ended".to_string());
            return ConsoleAction::Quit;
        };
        if busy {
            process.push_input(raw);
        } else if !script.is_empty() {
            if let Err(error) = process.push_script(script) {
                emit(error.to_string());
                return ConsoleAction::Quit;
            }
        }
        self.run_until_idle(emit)
    }

    fn run_until_idle(&mut self, emit: &mut dyn FnMut(String)) -> ConsoleAction {
        for _ in 0..TICKS_PER_LINE {
            if !self.is_busy() {
                break;
            }
            self.vm.run(TICK_SECONDS);
            self.flush(emit);
        }
        if self.vm.find_process(self.process).is_none() {
            emit("process ended".to_string());
            return ConsoleAction::Quit;
        }
        if self.is_busy() {
            debug!(process = self.process, "console script still running");
            emit("(still running)".to_string());
        }
        ConsoleAction::Continue
    }

    fn flush(&mut self, emit: &mut dyn FnMut(String)) {
        for line in self.output.take_lines() {
            emit(line);
        }
        for message in self.errors.borrow_mut().drain(..) {
            emit(format!("error: {}", message));
        }
    }
}

pub(crate) fn run_console(args: ConsoleArgs) -> Result<i32, ScriptError> {
    let options = load_options(args.config.as_deref())?;
    let library = match args.scripts_dir {
        Some(dir) => {
            let root = resolve_scripts_dir(&dir)?;
            Some(Rc::new(ScriptLibrary::new(read_scripts_from_dir(&root)?)))
        }
        None => None,
    };
    let mut session = ConsoleSession::new(options, library)?;
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    run_console_with_io(&mut session, &mut reader, &mut writer)
}

pub(crate) fn run_console_with_io(
    session: &mut ConsoleSession,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<i32, ScriptError> {
    writeln!(writer, "tick console").map_err(map_console_io)?;
    writeln!(writer, "{}", HELP).map_err(map_console_io)?;

    loop {
        write!(writer, "> ").map_err(map_console_io)?;
        writer.flush().map_err(map_console_io)?;
        let mut input = String::new();
        if reader.read_line(&mut input).map_err(map_console_io)? == 0 {
            return Ok(0);
        }
        let raw = input.trim_end_matches(&['\r', '\n'][..]);

        let mut lines = Vec::new();
        let action = session.handle_line(raw, &mut |line| lines.push(line));
        for line in lines {
            writeln!(writer, "{}", line).map_err(map_console_io)?;
        }
        if action == ConsoleAction::Quit {
            return Ok(0);
        }
    }
}
