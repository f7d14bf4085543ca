use std::collections::BTreeMap;
use std::rc::Rc;

use tick_core::{Command, Script};
use tick_parser::{escaped_string, parse_entries};

/// Generation-checked handle into an [`EnvArena`]. A handle to a collected
/// environment never resolves again, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Rc<Script>,
    pub env: EnvId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Variable(String),
    Constant(String),
    Function(Function),
    Array(Vec<String>),
    Table(BTreeMap<String, String>),
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Variable(_) => "variable",
            Self::Constant(_) => "constant",
            Self::Function(_) => "function",
            Self::Array(_) => "array",
            Self::Table(_) => "table",
        }
    }

    /// Text form used when the object is read as a value; collections come
    /// out in a shape EXPAND can splice back.
    pub fn render(&self) -> String {
        match self {
            Self::Variable(value) | Self::Constant(value) => value.clone(),
            Self::Function(function) => format!("function({})", function.params.join(" ")),
            Self::Array(items) => items
                .iter()
                .map(|item| escaped_string(item))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Table(entries) => entries
                .iter()
                .map(|(key, value)| format!("{} {}", escaped_string(key), escaped_string(value)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvId>,
    objects: BTreeMap<String, Object>,
    aliases: BTreeMap<String, Rc<Command>>,
}

impl Environment {
    pub fn parent(&self) -> Option<EnvId> {
        self.parent
    }

    pub fn objects(&self) -> &BTreeMap<String, Object> {
        &self.objects
    }

    pub fn aliases(&self) -> &BTreeMap<String, Rc<Command>> {
        &self.aliases
    }
}

#[derive(Debug)]
struct EnvSlot {
    generation: u32,
    env: Option<Environment>,
}

#[derive(Debug)]
pub struct EnvArena {
    slots: Vec<EnvSlot>,
    free: Vec<u32>,
    global: EnvId,
}

impl Default for EnvArena {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvArena {
    pub fn new() -> Self {
        let mut arena = Self {
            slots: Vec::new(),
            free: Vec::new(),
            global: EnvId {
                index: 0,
                generation: 0,
            },
        };
        arena.global = arena.allocate(None);
        arena
    }

    pub fn global(&self) -> EnvId {
        self.global
    }

    fn allocate(&mut self, parent: Option<EnvId>) -> EnvId {
        let env = Environment {
            parent,
            ..Environment::default()
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.env = Some(env);
            return EnvId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(EnvSlot {
            generation: 0,
            env: Some(env),
        });
        EnvId {
            index,
            generation: 0,
        }
    }

    /// Creates a scope under `parent`. A stale parent falls back to the
    /// global environment so every chain still ends there.
    pub fn create_child(&mut self, parent: EnvId) -> EnvId {
        let parent = if self.is_alive(parent) {
            parent
        } else {
            self.global
        };
        self.allocate(Some(parent))
    }

    pub fn is_alive(&self, id: EnvId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EnvId) -> Option<&Environment> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.env.as_ref()
    }

    fn get_mut(&mut self, id: EnvId) -> Option<&mut Environment> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.env.as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.env.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parent(&self, id: EnvId) -> Option<EnvId> {
        self.get(id).and_then(|env| env.parent)
    }

    fn chain(&self, id: EnvId) -> impl Iterator<Item = (EnvId, &Environment)> + '_ {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let current = next?;
            let env = self.get(current)?;
            next = env.parent;
            Some((current, env))
        })
    }

    /// Innermost environment on the chain from `id` that defines `name`.
    pub fn find_object_scope(&self, id: EnvId, name: &str) -> Option<EnvId> {
        self.chain(id)
            .find(|(_, env)| env.objects.contains_key(name))
            .map(|(scope, _)| scope)
    }

    pub fn lookup_object(&self, id: EnvId, name: &str) -> Option<&Object> {
        self.chain(id).find_map(|(_, env)| env.objects.get(name))
    }

    pub fn lookup_alias(&self, id: EnvId, name: &str) -> Option<Rc<Command>> {
        self.chain(id).find_map(|(_, env)| env.aliases.get(name).cloned())
    }

    pub fn object(&self, id: EnvId, name: &str) -> Option<&Object> {
        self.get(id).and_then(|env| env.objects.get(name))
    }

    pub fn insert_object(&mut self, id: EnvId, name: &str, object: Object) -> bool {
        match self.get_mut(id) {
            Some(env) => {
                env.objects.insert(name.to_string(), object);
                true
            }
            None => false,
        }
    }

    pub fn erase_object(&mut self, id: EnvId, name: &str) -> Option<Object> {
        self.get_mut(id)?.objects.remove(name)
    }

    pub fn insert_alias(&mut self, id: EnvId, name: &str, command: Command) -> bool {
        match self.get_mut(id) {
            Some(env) => {
                env.aliases.insert(name.to_string(), Rc::new(command));
                true
            }
            None => false,
        }
    }

    pub fn insert_shared_alias(&mut self, id: EnvId, name: &str, command: Rc<Command>) -> bool {
        match self.get_mut(id) {
            Some(env) => {
                env.aliases.insert(name.to_string(), command);
                true
            }
            None => false,
        }
    }

    pub fn erase_alias(&mut self, id: EnvId, name: &str) -> Option<Rc<Command>> {
        self.get_mut(id)?.aliases.remove(name)
    }

    /// Appends one-token entries to the array `name` defined directly in `id`.
    /// Nothing is appended when any entry is rejected.
    pub fn append_to_array(&mut self, id: EnvId, name: &str, fragment: &str) -> Result<(), String> {
        let entries = parse_entries(fragment)?;
        if let Some(entry) = entries.iter().find(|entry| entry.value.is_some()) {
            return Err(format!("Array entry \"{}\" must be a single token", entry.key));
        }
        match self.get_mut(id).and_then(|env| env.objects.get_mut(name)) {
            Some(Object::Array(items)) => {
                items.extend(entries.into_iter().map(|entry| entry.key));
                Ok(())
            }
            Some(other) => Err(format!("{} is a {}, not an array", name, other.kind_name())),
            None => Err(format!("Couldn't find {}", name)),
        }
    }

    /// Appends `key` or `key value` entries to the table `name` defined
    /// directly in `id`. Nothing is written when any entry is rejected.
    pub fn append_to_table(&mut self, id: EnvId, name: &str, fragment: &str) -> Result<(), String> {
        let entries = parse_entries(fragment)?;
        match self.get_mut(id).and_then(|env| env.objects.get_mut(name)) {
            Some(Object::Table(map)) => {
                for entry in entries {
                    map.insert(entry.key, entry.value.unwrap_or_default());
                }
                Ok(())
            }
            Some(other) => Err(format!("{} is a {}, not a table", name, other.kind_name())),
            None => Err(format!("Couldn't find {}", name)),
        }
    }

    /// Mark-and-sweep over the arena. Parent links and function closures
    /// keep environments alive; export targets do not. Returns the number
    /// of environments freed.
    pub fn collect<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = EnvId>,
    {
        let mut marked = vec![false; self.slots.len()];
        let mut pending: Vec<EnvId> = roots.into_iter().collect();
        pending.push(self.global);

        while let Some(id) = pending.pop() {
            let Some(env) = self.get(id) else {
                continue;
            };
            if marked[id.index as usize] {
                continue;
            }
            marked[id.index as usize] = true;
            if let Some(parent) = env.parent {
                pending.push(parent);
            }
            for object in env.objects.values() {
                if let Object::Function(function) = object {
                    pending.push(function.env);
                }
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.env.is_some() && !marked[index] {
                slot.env = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        freed
    }
}

#[cfg(test)]
mod environment_tests {
    use super::*;

    fn variable(arena: &EnvArena, env: EnvId, name: &str) -> Option<String> {
        match arena.lookup_object(env, name) {
            Some(Object::Variable(value)) => Some(value.clone()),
            _ => None,
        }
    }

    #[test]
    fn lookup_walks_outward_but_insert_stays_innermost() {
        let mut arena = EnvArena::new();
        let global = arena.global();
        let child = arena.create_child(global);
        let grandchild = arena.create_child(child);

        arena.insert_object(global, "x", Object::Variable("outer".to_string()));
        assert_eq!(variable(&arena, grandchild, "x").as_deref(), Some("outer"));

        arena.insert_object(grandchild, "x", Object::Variable("inner".to_string()));
        assert_eq!(variable(&arena, grandchild, "x").as_deref(), Some("inner"));
        assert_eq!(variable(&arena, child, "x").as_deref(), Some("outer"));
        assert_eq!(arena.find_object_scope(grandchild, "x"), Some(grandchild));
        assert_eq!(arena.find_object_scope(child, "x"), Some(global));
    }

    #[test]
    fn aliases_resolve_through_the_chain() {
        let mut arena = EnvArena::new();
        let global = arena.global();
        let child = arena.create_child(global);
        arena.insert_alias(global, "hi", Command::from_values(["echo", "hi"]));
        let alias = arena.lookup_alias(child, "hi").expect("alias visible");
        assert_eq!(alias.head(), Some("echo"));
        assert!(arena.erase_alias(child, "hi").is_none());
        assert!(arena.erase_alias(global, "hi").is_some());
        assert!(arena.lookup_alias(child, "hi").is_none());
    }

    #[test]
    fn table_append_rejects_duplicates_atomically() {
        let mut arena = EnvArena::new();
        let env = arena.global();
        arena.insert_object(env, "t", Object::Table(BTreeMap::new()));
        arena
            .append_to_table(env, "t", "a 1\nb")
            .expect("first append");
        let err = arena
            .append_to_table(env, "t", "c 3\nc 4")
            .expect_err("duplicate key");
        assert_eq!(err, "Duplicate key \"c\"");
        let Some(Object::Table(map)) = arena.object(env, "t") else {
            panic!("table expected");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("b").map(String::as_str), Some(""));
        assert!(!map.contains_key("c"));
    }

    #[test]
    fn array_append_keeps_order_and_renders_escaped() {
        let mut arena = EnvArena::new();
        let env = arena.global();
        arena.insert_object(env, "xs", Object::Array(Vec::new()));
        arena
            .append_to_array(env, "xs", "one\n\"two words\"")
            .expect("append");
        let object = arena.object(env, "xs").expect("array").clone();
        assert_eq!(object.render(), "one \"two words\"");
        assert!(arena.append_to_array(env, "xs", "k v").is_err());
        assert!(arena.append_to_array(env, "missing", "a").is_err());
    }

    #[test]
    fn collect_frees_unreachable_scopes_and_invalidates_handles() {
        let mut arena = EnvArena::new();
        let global = arena.global();
        let kept = arena.create_child(global);
        let dropped = arena.create_child(global);
        let closure_scope = arena.create_child(dropped);
        arena.insert_object(
            kept,
            "f",
            Object::Function(Function {
                params: Vec::new(),
                body: Rc::new(Script::default()),
                env: closure_scope,
            }),
        );
        let orphan = arena.create_child(global);

        let freed = arena.collect([kept]);
        assert_eq!(freed, 1);
        assert!(arena.is_alive(dropped), "closure keeps its parent chain");
        assert!(!arena.is_alive(orphan));

        let reused = arena.create_child(global);
        assert!(arena.get(orphan).is_none(), "stale handle must not resolve");
        assert!(arena.is_alive(reused));
    }

    #[test]
    fn child_of_stale_parent_hangs_off_global() {
        let mut arena = EnvArena::new();
        let global = arena.global();
        let temp = arena.create_child(global);
        arena.collect([]);
        let child = arena.create_child(temp);
        assert_eq!(arena.parent(child), Some(global));
    }
}
