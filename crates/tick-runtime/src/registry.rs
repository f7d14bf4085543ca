use std::collections::BTreeMap;
use std::rc::Rc;

use tick_core::{CommandResult, Privileges, ScriptError};
use tick_parser::parse;

use crate::handle::FrameHandle;

/// A command implementation. `args` excludes the command name; the full
/// resolved list is available through [`FrameHandle::args`].
pub trait Callable {
    fn invoke(&self, frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult;
}

impl<F> Callable for F
where
    F: Fn(&mut FrameHandle<'_>, &[String]) -> CommandResult,
{
    fn invoke(&self, frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
        self(frame, args)
    }
}

/// A typed value that scripts read and write like a command and hosts
/// persist through its raw string form.
pub trait Setting {
    fn get_raw(&self) -> String;
    fn set_raw(&self, raw: &str) -> Result<(), String>;
}

pub trait SuggestionProvider {
    /// Candidates for the argument following `args`.
    fn suggest(&self, args: &[String]) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: String,
    pub takes_value: bool,
    pub help: String,
}

#[derive(Clone)]
pub struct CommandInfo {
    pub name: String,
    pub usage: String,
    pub options: Vec<OptionSpec>,
    pub privileges: Privileges,
    pub suggestions: Option<Rc<dyn SuggestionProvider>>,
}

impl CommandInfo {
    pub fn new(name: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            options: Vec::new(),
            privileges: Privileges::NONE,
            suggestions: None,
        }
    }

    pub fn privileges(mut self, privileges: Privileges) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn option(mut self, name: &str, takes_value: bool, help: &str) -> Self {
        self.options.push(OptionSpec {
            name: name.to_string(),
            takes_value,
            help: help.to_string(),
        });
        self
    }

    pub fn suggestions(mut self, provider: Rc<dyn SuggestionProvider>) -> Self {
        self.suggestions = Some(provider);
        self
    }

    pub fn usage_error(&self) -> CommandResult {
        CommandResult::usage(&self.name, &self.usage)
    }
}

#[derive(Clone)]
pub enum Entry {
    Command {
        info: CommandInfo,
        callable: Rc<dyn Callable>,
    },
    Setting {
        info: CommandInfo,
        setting: Rc<dyn Setting>,
    },
}

impl Entry {
    pub fn info(&self) -> &CommandInfo {
        match self {
            Self::Command { info, .. } | Self::Setting { info, .. } => info,
        }
    }

    pub(crate) fn invoke(&self, frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
        match self {
            Self::Command { callable, .. } => callable.invoke(frame, args),
            Self::Setting { info, setting } => match args {
                [] => CommandResult::value(setting.get_raw()),
                [raw] => match setting.set_raw(raw) {
                    Ok(()) => CommandResult::none(),
                    Err(message) => CommandResult::error(format!("{}: {}", info.name, message)),
                },
                _ => info.usage_error(),
            },
        }
    }
}

/// Immutable name → callable table built once at startup and shared by
/// every process of a virtual machine.
#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Rc<Entry>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Rc<Entry>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn setting(&self, name: &str) -> Option<Rc<dyn Setting>> {
        match self.entries.get(name)?.as_ref() {
            Entry::Setting { setting, .. } => Some(setting.clone()),
            Entry::Command { .. } => None,
        }
    }

    /// Raw values of every setting, for persistence.
    pub fn settings_snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| match entry.as_ref() {
                Entry::Setting { setting, .. } => Some((name.clone(), setting.get_raw())),
                Entry::Command { .. } => None,
            })
            .collect()
    }

    /// Completes the last command of `line`: its name while the head is
    /// still being typed, otherwise the entry's suggestion provider.
    pub fn complete(&self, line: &str) -> Vec<String> {
        let script = parse(line);
        let ends_with_space = line.ends_with(' ') || line.ends_with('\t');
        let words: Vec<String> = script
            .commands
            .last()
            .filter(|_| !line.trim_end().ends_with(';'))
            .map(|command| command.args.iter().map(|arg| arg.value.clone()).collect())
            .unwrap_or_default();

        if words.is_empty() || (words.len() == 1 && !ends_with_space) {
            let prefix = words.first().map(String::as_str).unwrap_or("");
            return self
                .names()
                .filter(|name| name.starts_with(prefix))
                .map(str::to_string)
                .collect();
        }

        let Some(provider) = self
            .lookup(&words[0])
            .and_then(|entry| entry.info().suggestions.clone())
        else {
            return Vec::new();
        };
        let (done, partial) = if ends_with_space {
            (&words[1..], "")
        } else {
            (&words[1..words.len() - 1], words[words.len() - 1].as_str())
        };
        provider
            .suggest(done)
            .into_iter()
            .filter(|candidate| candidate.starts_with(partial))
            .collect()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
}

impl RegistryBuilder {
    pub fn command<C>(self, name: &str, usage: &str, callable: C) -> Self
    where
        C: Callable + 'static,
    {
        self.command_with(CommandInfo::new(name, usage), callable)
    }

    pub fn command_with<C>(mut self, info: CommandInfo, callable: C) -> Self
    where
        C: Callable + 'static,
    {
        self.entries.push(Entry::Command {
            info,
            callable: Rc::new(callable),
        });
        self
    }

    pub fn setting<S>(mut self, name: &str, usage: &str, setting: Rc<S>) -> Self
    where
        S: Setting + 'static,
    {
        self.entries.push(Entry::Setting {
            info: CommandInfo::new(name, usage),
            setting,
        });
        self
    }

    pub fn with_core_commands(self) -> Self {
        crate::commands::register_core(self)
    }

    /// Adds `source <name>` over the given scripts.
    pub fn with_script_library(self, library: Rc<crate::commands::ScriptLibrary>) -> Self {
        crate::commands::register_library(self, library)
    }

    pub fn build(self) -> Result<Registry, ScriptError> {
        let mut entries = BTreeMap::new();
        for entry in self.entries {
            let name = entry.info().name.clone();
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ScriptError::new(
                    "REGISTRY_INVALID_NAME",
                    format!("Command name \"{}\" is not a single word.", name),
                ));
            }
            if entries.insert(name.clone(), Rc::new(entry)).is_some() {
                return Err(ScriptError::new(
                    "REGISTRY_DUPLICATE",
                    format!("Command \"{}\" is registered twice.", name),
                ));
            }
        }
        Ok(Registry { entries })
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use crate::settings::IntSetting;

    struct Colors;

    impl SuggestionProvider for Colors {
        fn suggest(&self, _args: &[String]) -> Vec<String> {
            vec!["red".to_string(), "green".to_string(), "grey".to_string()]
        }
    }

    fn noop(_frame: &mut FrameHandle<'_>, _args: &[String]) -> CommandResult {
        CommandResult::none()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let error = match Registry::builder()
            .command("ping", "", noop)
            .command("ping", "", noop)
            .build()
        {
            Ok(_) => panic!("duplicate should fail"),
            Err(error) => error,
        };
        assert_eq!(error.code, "REGISTRY_DUPLICATE");
    }

    #[test]
    fn names_with_spaces_are_rejected() {
        let result = Registry::builder().command("two words", "", noop).build();
        assert!(matches!(result, Err(error) if error.code == "REGISTRY_INVALID_NAME"));
    }

    #[test]
    fn complete_lists_names_then_suggestions() {
        let registry = Registry::builder()
            .command("paint", "<color>", noop)
            .command_with(
                CommandInfo::new("pick", "<color>").suggestions(Rc::new(Colors)),
                noop,
            )
            .setting("volume", "[0-10]", Rc::new(IntSetting::new(5, 0, 10)))
            .build()
            .expect("registry");

        assert_eq!(registry.complete("p"), vec!["paint", "pick"]);
        assert_eq!(registry.complete("echo a; v"), vec!["volume"]);
        assert_eq!(registry.complete("pick gr"), vec!["green", "grey"]);
        assert_eq!(registry.complete("pick ").len(), 3);
        assert!(registry.complete("paint r").is_empty());
        assert_eq!(registry.complete("").len(), 3);
    }

    #[test]
    fn settings_snapshot_reports_raw_values() {
        let volume = Rc::new(IntSetting::new(5, 0, 10));
        let registry = Registry::builder()
            .setting("volume", "[0-10]", volume.clone())
            .command("ping", "", noop)
            .build()
            .expect("registry");
        volume.set_raw("9").expect("set");
        let snapshot = registry.settings_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("volume").map(String::as_str), Some("9"));
        assert!(registry.setting("ping").is_none());
    }
}
