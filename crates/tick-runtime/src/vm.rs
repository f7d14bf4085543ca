use std::collections::BTreeMap;
use std::rc::Rc;

use tick_core::{CommandResult, Privileges, ScriptError};
use tracing::debug;

use crate::environment::{EnvArena, EnvId};
use crate::io::OutputSink;
use crate::options::VirtualMachineOptions;
use crate::process::{AwaitLimit, Process, ProcessId};
use crate::registry::Registry;
use crate::runtime::Runtime;

/// Owns the global scope and steps every registered process once per tick.
pub struct VirtualMachine {
    runtime: Runtime,
    processes: BTreeMap<ProcessId, Process>,
}

impl VirtualMachine {
    pub fn new(registry: Registry, options: VirtualMachineOptions) -> Self {
        Self {
            runtime: Runtime::new(registry, options),
            processes: BTreeMap::new(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn global(&self) -> EnvId {
        self.runtime.global()
    }

    pub fn environments(&self) -> &EnvArena {
        self.runtime.environments()
    }

    pub fn environments_mut(&mut self) -> &mut EnvArena {
        self.runtime.environments_mut()
    }

    pub fn set_output(&mut self, sink: Rc<dyn OutputSink>) {
        self.runtime.set_output(sink);
    }

    pub fn set_error_output(&mut self, sink: Rc<dyn OutputSink>) {
        self.runtime.set_error_output(sink);
    }

    pub fn ticks(&self) -> u64 {
        self.runtime.ticks()
    }

    pub fn elapsed(&self) -> f64 {
        self.runtime.elapsed()
    }

    /// Registers an idle top-level process whose root scope is a fresh
    /// child of the global environment.
    pub fn launch_process(&mut self, privileges: Privileges) -> ProcessId {
        let process = self.runtime.create_process(privileges);
        self.register(process)
    }

    pub fn launch_script(&mut self, text: &str, privileges: Privileges) -> ProcessId {
        let script = self.runtime.parse_cached(text);
        let mut process = self.runtime.create_process(privileges);
        process.enqueue(script);
        self.register(process)
    }

    fn register(&mut self, process: Process) -> ProcessId {
        let id = process.id();
        debug!(process = id, privileges = process.privileges().bits(), "process launched");
        self.processes.insert(id, process);
        id
    }

    /// Live processes only; an ended process is unreachable even while it
    /// waits to be reclaimed.
    pub fn find_process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id).filter(|process| !process.is_ended())
    }

    pub fn find_process_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(&id).filter(|process| !process.is_ended())
    }

    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.processes.keys().copied().collect()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn end_process(&mut self, id: ProcessId) -> bool {
        match self.processes.remove(&id) {
            Some(process) => {
                self.finalize(process);
                true
            }
            None => false,
        }
    }

    /// One tick: every process registered before the tick runs once, in
    /// registration order. Processes launched during the tick start on the
    /// next one.
    pub fn run(&mut self, delta_time: f64) {
        self.runtime.advance_clock(delta_time);
        let ids = self.process_ids();
        for id in ids {
            let Some(mut process) = self.processes.remove(&id) else {
                continue;
            };
            process.run(&mut self.runtime);
            self.settle(id, process);
        }
        self.collect_garbage();
    }

    fn settle(&mut self, id: ProcessId, mut process: Process) {
        self.adopt_spawned();
        let requests: Vec<ProcessId> = self.runtime.end_requests.drain(..).collect();
        for target in requests {
            if target == id {
                process.end();
            } else if let Some(other) = self.processes.get_mut(&target) {
                other.end();
            }
        }
        if process.is_done() {
            self.finalize(process);
        } else {
            self.processes.insert(id, process);
        }
    }

    fn adopt_spawned(&mut self) {
        for process in std::mem::take(&mut self.runtime.spawned) {
            self.register(process);
        }
    }

    fn finalize(&mut self, mut process: Process) {
        process.end();
        for child in process.children() {
            if let Some(orphan) = self.processes.get_mut(child) {
                orphan.set_parent(None);
                orphan.end();
            }
        }
        if let Some(parent) = process.parent().and_then(|id| self.processes.get_mut(&id)) {
            parent.remove_child(process.id());
        }
        debug!(process = process.id(), "process finalized");
    }

    /// Runs one process (not the whole machine) until it is idle and returns
    /// its final result.
    pub fn await_process(
        &mut self,
        id: ProcessId,
        limit: AwaitLimit,
    ) -> Result<CommandResult, ScriptError> {
        let Some(mut process) = self.processes.remove(&id) else {
            return Err(ScriptError::new(
                "ENGINE_PROCESS_NOT_FOUND",
                format!("Process {} is not registered.", id),
            ));
        };
        let outcome = process.await_idle(&mut self.runtime, limit);
        let result = process.take_result().unwrap_or_default();
        self.settle(id, process);
        outcome.map(|()| result)
    }

    /// Runs `text` to completion in the global scope with full privileges.
    pub fn execute(&mut self, text: &str) -> Result<CommandResult, ScriptError> {
        let script = self.runtime.parse_cached(text);
        let global = self.runtime.global();
        let id = self.runtime.allocate_process_id();
        let mut process = Process::new(
            id,
            Privileges::ALL,
            global,
            self.runtime.options.max_call_depth,
        );
        process.enqueue(script);
        self.register(process);
        let outcome = self.await_process(id, AwaitLimit::Budget);
        if outcome.is_err() {
            self.end_process(id);
        }
        outcome
    }

    /// Sweeps environments no process, frame or closure can reach.
    pub fn collect_garbage(&mut self) -> usize {
        let roots: Vec<EnvId> = self
            .processes
            .values()
            .chain(self.runtime.spawned.iter())
            .flat_map(Process::gc_roots)
            .collect();
        let freed = self.runtime.envs.collect(roots);
        if freed > 0 {
            debug!(freed, live = self.runtime.envs.len(), "environments collected");
        }
        freed
    }
}
