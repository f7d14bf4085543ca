use serde::{Deserialize, Serialize};

pub type ResumeToken = u32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "token", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    None,
    Value,
    ErrorMsg,
    NotDone(ResumeToken),
    DeferToNextFrame(ResumeToken),
    Return,
    ReturnValue,
    Break,
    Continue,
    ConditionFailed,
}

impl Status {
    pub fn is_suspended(self) -> bool {
        matches!(self, Self::NotDone(_) | Self::DeferToNextFrame(_))
    }

    /// Statuses that leave the current frame instead of advancing it.
    pub fn escapes_frame(self) -> bool {
        matches!(
            self,
            Self::ErrorMsg | Self::Return | Self::ReturnValue | Self::Break | Self::Continue
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Value => "value",
            Self::ErrorMsg => "error",
            Self::NotDone(_) => "not-done",
            Self::DeferToNextFrame(_) => "defer",
            Self::Return => "return",
            Self::ReturnValue => "return-value",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::ConditionFailed => "condition-failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: Status,
    #[serde(default)]
    pub value: String,
}

impl CommandResult {
    pub fn new(status: Status, value: impl Into<String>) -> Self {
        Self {
            status,
            value: value.into(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self::new(Status::Value, value)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::ErrorMsg, message)
    }

    pub fn usage(name: &str, usage: &str) -> Self {
        Self::error(format!("{}: usage: {} {}", name, name, usage))
    }

    pub fn not_done(token: ResumeToken) -> Self {
        Self::new(Status::NotDone(token), "")
    }

    pub fn defer(token: ResumeToken) -> Self {
        Self::new(Status::DeferToNextFrame(token), "")
    }

    pub fn ret() -> Self {
        Self::new(Status::Return, "")
    }

    pub fn ret_value(value: impl Into<String>) -> Self {
        Self::new(Status::ReturnValue, value)
    }

    pub fn brk() -> Self {
        Self::new(Status::Break, "")
    }

    pub fn cont() -> Self {
        Self::new(Status::Continue, "")
    }

    pub fn condition_failed() -> Self {
        Self::new(Status::ConditionFailed, "")
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::ErrorMsg
    }
}

pub fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false")
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn truthiness_rejects_empty_zero_and_false() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(" false "));
        assert!(is_truthy("1"));
        assert!(is_truthy("00"));
        assert!(is_truthy("yes"));
    }

    #[test]
    fn escaping_statuses_are_the_unwinding_ones() {
        assert!(Status::ErrorMsg.escapes_frame());
        assert!(Status::Break.escapes_frame());
        assert!(!Status::Value.escapes_frame());
        assert!(!Status::ConditionFailed.escapes_frame());
        assert!(Status::NotDone(3).is_suspended());
        assert!(Status::DeferToNextFrame(0).is_suspended());
    }

    #[test]
    fn usage_error_names_the_command() {
        let result = CommandResult::usage("for", "<var> <start> <end> [step] <body>");
        assert!(result.is_error());
        assert_eq!(
            result.value,
            "for: usage: for <var> <start> <end> [step] <body>"
        );
    }

    #[test]
    fn status_serializes_with_token_payload() {
        let json = serde_json::to_string(&CommandResult::defer(7)).expect("json");
        assert_eq!(
            json,
            r#"{"status":{"kind":"DEFER_TO_NEXT_FRAME","token":7},"value":""}"#
        );
    }
}
