use std::collections::HashMap;
use std::rc::Rc;

use tick_core::{Privileges, Script};
use tick_parser::parse;
use tracing::debug;

use crate::environment::{EnvArena, EnvId};
use crate::io::{OutputSink, StderrSink, StdoutSink};
use crate::options::VirtualMachineOptions;
use crate::process::{Process, ProcessId};
use crate::registry::Registry;
use crate::rng::{next_random_bounded, seed_from_clock};

/// State shared by every process of one virtual machine. Processes borrow
/// it mutably while they run.
pub struct Runtime {
    pub(crate) envs: EnvArena,
    pub(crate) registry: Rc<Registry>,
    pub(crate) options: VirtualMachineOptions,
    ticks: u64,
    elapsed: f64,
    rng_state: u32,
    pub(crate) output: Rc<dyn OutputSink>,
    pub(crate) errors: Rc<dyn OutputSink>,
    script_cache: HashMap<String, Rc<Script>>,
    pub(crate) spawned: Vec<Process>,
    pub(crate) end_requests: Vec<ProcessId>,
    next_process_id: ProcessId,
}

impl Runtime {
    pub fn new(registry: Registry, options: VirtualMachineOptions) -> Self {
        let rng_state = options.random_seed.unwrap_or_else(seed_from_clock);
        Self {
            envs: EnvArena::new(),
            registry: Rc::new(registry),
            options,
            ticks: 0,
            elapsed: 0.0,
            rng_state,
            output: Rc::new(StdoutSink),
            errors: Rc::new(StderrSink),
            script_cache: HashMap::new(),
            spawned: Vec::new(),
            end_requests: Vec::new(),
            next_process_id: 1,
        }
    }

    pub fn environments(&self) -> &EnvArena {
        &self.envs
    }

    pub fn environments_mut(&mut self) -> &mut EnvArena {
        &mut self.envs
    }

    pub fn global(&self) -> EnvId {
        self.envs.global()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> &VirtualMachineOptions {
        &self.options
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub(crate) fn advance_clock(&mut self, delta_time: f64) {
        self.ticks += 1;
        self.elapsed += delta_time.max(0.0);
    }

    pub fn random(&mut self, bound: u32) -> u32 {
        next_random_bounded(&mut self.rng_state, bound)
    }

    pub fn set_output(&mut self, sink: Rc<dyn OutputSink>) {
        self.output = sink;
    }

    pub fn set_error_output(&mut self, sink: Rc<dyn OutputSink>) {
        self.errors = sink;
    }

    /// Parses `text` through a bounded cache so loop bodies and aliases are
    /// tokenized once.
    pub fn parse_cached(&mut self, text: &str) -> Rc<Script> {
        if let Some(script) = self.script_cache.get(text) {
            return script.clone();
        }
        let script = Rc::new(parse(text));
        if self.options.script_cache_size == 0 {
            return script;
        }
        if self.script_cache.len() >= self.options.script_cache_size {
            self.script_cache.clear();
        }
        self.script_cache.insert(text.to_string(), script.clone());
        script
    }

    pub(crate) fn allocate_process_id(&mut self) -> ProcessId {
        let id = self.next_process_id;
        self.next_process_id += 1;
        id
    }

    /// Builds an unregistered process whose root scope is a child of the
    /// global environment.
    pub fn create_process(&mut self, privileges: Privileges) -> Process {
        let env = self.envs.create_child(self.envs.global());
        let id = self.allocate_process_id();
        Process::new(id, privileges, env, self.options.max_call_depth)
    }

    /// Starts a child process that the owning virtual machine registers
    /// after the current step.
    pub(crate) fn spawn(
        &mut self,
        parent: ProcessId,
        privileges: Privileges,
        env: EnvId,
        script: Rc<Script>,
    ) -> ProcessId {
        let id = self.allocate_process_id();
        let mut process = Process::new(id, privileges, env, self.options.max_call_depth);
        process.set_parent(Some(parent));
        process.enqueue(script);
        debug!(process = id, parent, "spawned child process");
        self.spawned.push(process);
        id
    }

    pub(crate) fn request_end(&mut self, id: ProcessId) {
        if let Some(child) = self.spawned.iter_mut().find(|process| process.id() == id) {
            child.end();
            return;
        }
        self.end_requests.push(id);
    }
}
