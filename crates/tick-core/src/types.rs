use std::ops::BitOr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub exec: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub expand: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pipe: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argument {
    pub value: String,
    #[serde(default)]
    pub flags: ArgFlags,
}

impl Argument {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            flags: ArgFlags::default(),
        }
    }

    pub fn exec(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            flags: ArgFlags {
                exec: true,
                ..ArgFlags::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command {
    pub args: Vec<Argument>,
}

impl Command {
    pub fn new(args: Vec<Argument>) -> Self {
        Self { args }
    }

    /// Builds a command whose arguments are already-resolved values.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: values.into_iter().map(Argument::literal).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn head(&self) -> Option<&str> {
        self.args.first().map(|arg| arg.value.as_str())
    }

    pub fn pipes_into_next(&self) -> bool {
        self.args.last().map(|arg| arg.flags.pipe).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub commands: Vec<Command>,
}

impl Script {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privileges(u32);

impl Privileges {
    pub const NONE: Privileges = Privileges(0);
    pub const CONSOLE: Privileges = Privileges(1);
    pub const REMOTE: Privileges = Privileges(1 << 1);
    pub const ADMIN: Privileges = Privileges(1 << 2);
    pub const ALL: Privileges = Privileges(0b111);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Privileges) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Privileges {
    type Output = Privileges;

    fn bitor(self, rhs: Self) -> Self::Output {
        Privileges(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn command_from_values_builds_plain_literals() {
        let command = Command::from_values(["echo", "hi"]);
        assert_eq!(command.head(), Some("echo"));
        assert!(command.args.iter().all(|arg| arg.flags == ArgFlags::default()));
        assert!(!command.pipes_into_next());
    }

    #[test]
    fn privileges_contains_requires_every_bit() {
        let granted = Privileges::CONSOLE | Privileges::ADMIN;
        assert!(granted.contains(Privileges::ADMIN));
        assert!(granted.contains(Privileges::NONE));
        assert!(!granted.contains(Privileges::REMOTE));
        assert!(Privileges::ALL.contains(granted));
    }

    #[test]
    fn script_serializes_without_default_flags() {
        let script = Script::single(Command::new(vec![
            Argument::literal("echo"),
            Argument::exec("x"),
        ]));
        let json = serde_json::to_string(&script).expect("script json");
        assert_eq!(
            json,
            r#"[[{"value":"echo","flags":{}},{"value":"x","flags":{"exec":true}}]]"#
        );
        let back: Script = serde_json::from_str(&json).expect("script should deserialize");
        assert_eq!(back, script);
    }
}
