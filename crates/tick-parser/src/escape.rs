use std::fmt::Write;

use tick_core::{Command, Script};

/// Quotes `text` so that parsing the result yields exactly one argument
/// equal to `text`.
pub fn escaped_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_plain_word(text: &str) -> bool {
    !text.is_empty()
        && !text.contains("...")
        && !text.starts_with('$')
        && !text.starts_with("//")
        && text.chars().all(|c| {
            !c.is_control() && !matches!(c, ' ' | ';' | '|' | '"' | '(' | '{' | '\\')
        })
}

pub fn format_command(command: &Command) -> String {
    let mut parts = Vec::with_capacity(command.len());
    for arg in &command.args {
        let mut part = if arg.flags.exec {
            format!("({})", arg.value)
        } else if is_plain_word(&arg.value) {
            arg.value.clone()
        } else {
            escaped_string(&arg.value)
        };
        if arg.flags.expand {
            part.push_str("...");
        }
        if arg.flags.pipe {
            part.push_str(" |");
        }
        parts.push(part);
    }
    parts.join(" ")
}

pub fn format_script(script: &Script) -> String {
    let mut out = String::new();
    for command in &script.commands {
        out.push_str(&format_command(command));
        if !command.pipes_into_next() {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod escape_tests {
    use super::*;
    use crate::parse;

    fn reparse_single(text: &str) -> String {
        let script = parse(&escaped_string(text));
        assert_eq!(script.len(), 1, "escaped {:?} should stay one command", text);
        assert_eq!(script.commands[0].len(), 1);
        script.commands[0].args[0].value.clone()
    }

    #[test]
    fn escaped_string_round_trips_every_ascii_char() {
        for code in 0u8..=0x7f {
            let text = format!("a{}b", char::from(code));
            assert_eq!(reparse_single(&text), text, "char {:#04x}", code);
        }
    }

    #[test]
    fn escaped_string_round_trips_chars_above_ascii() {
        for code in (0x80u32..=0x2ff).chain([0x2603, 0xfffd, 0x1f600]) {
            let Some(c) = char::from_u32(code) else {
                continue;
            };
            let text = format!("a{}b", c);
            assert_eq!(reparse_single(&text), text, "char {:#x}", code);
        }
    }

    #[test]
    fn hex_escaped_utf8_matches_the_raw_character() {
        let escaped = parse(r#""\xC3\xBC\xE2\x98\x83""#);
        assert_eq!(escaped.commands[0].args[0].value, "ü☃");
        assert_eq!(reparse_single("ü☃"), "ü☃");
    }

    #[test]
    fn escaped_string_round_trips_mixed_content() {
        for text in [
            "",
            "plain",
            "with space; and | pipe",
            "quote \" backslash \\ end\\",
            "ctrl \u{1}\u{1b}\u{7f} tail",
            "braces {(}) and $dollar...",
            "unicode ☃ ü",
            "// not a comment",
        ] {
            assert_eq!(reparse_single(text), text);
        }
    }

    #[test]
    fn escaped_string_uses_hex_for_other_control_chars() {
        assert_eq!(escaped_string("\u{1}"), "\"\\x01\"");
        assert_eq!(escaped_string("\n\""), "\"\\n\\\"\"");
    }

    #[test]
    fn format_script_reparses_to_same_tree() {
        let source = "echo hi \"two words\" $x (add 1 2)... | consume\nif 1 {echo yes}";
        let script = parse(source);
        let formatted = format_script(&script);
        assert_eq!(parse(&formatted), script);
    }
}
