use std::collections::BTreeMap;
use std::rc::Rc;

use tick_core::CommandResult;

use super::{continue_with, resumed, RESUME};
use crate::handle::FrameHandle;
use crate::registry::{CommandInfo, RegistryBuilder, SuggestionProvider};

pub(crate) const SCRIPT_EXTENSION: &str = ".cfg";

/// Named script sources that `source <name>` runs in the caller's scope.
/// Names are relative paths; the `.cfg` extension may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLibrary {
    scripts: BTreeMap<String, String>,
}

impl ScriptLibrary {
    pub fn new(scripts: BTreeMap<String, String>) -> Self {
        Self { scripts }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.scripts
            .get(name)
            .or_else(|| self.scripts.get(&format!("{}{}", name, SCRIPT_EXTENSION)))
            .map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl SuggestionProvider for ScriptLibrary {
    fn suggest(&self, args: &[String]) -> Vec<String> {
        if !args.is_empty() {
            return Vec::new();
        }
        self.names().map(str::to_string).collect()
    }
}

pub(crate) fn register(builder: RegistryBuilder, library: Rc<ScriptLibrary>) -> RegistryBuilder {
    let provider: Rc<dyn SuggestionProvider> = library.clone();
    builder.command_with(
        CommandInfo::new("source", "<name>").suggestions(provider),
        move |frame: &mut FrameHandle<'_>, args: &[String]| source(&library, frame, args),
    )
}

fn source(library: &ScriptLibrary, frame: &mut FrameHandle<'_>, args: &[String]) -> CommandResult {
    if frame.token() == RESUME {
        return resumed(frame);
    }
    let [name] = args else {
        return CommandResult::usage("source", "<name>");
    };
    let Some(text) = library.get(name) else {
        return CommandResult::error(format!("source: Couldn't find {}", name));
    };
    let text = text.to_string();
    let env = frame.env();
    continue_with(frame, &text, env)
}
