use tick_core::{ArgFlags, Argument, Command, Script};

/// Parses script text into commands. Malformed grouping is recovered on a
/// best-effort basis, so parsing never fails.
pub fn parse(text: &str) -> Script {
    Scanner::new(text).scan()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Bare,
    Quoted,
    Group,
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    commands: Vec<Command>,
    current: Vec<Argument>,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            commands: Vec::new(),
            current: Vec::new(),
        }
    }

    fn scan(mut self) -> Script {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => self.pos += 1,
                '\n' | ';' => {
                    self.pos += 1;
                    self.end_command();
                }
                '|' => {
                    self.pos += 1;
                    self.end_piped_command();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_comment(),
                '\\' if self.continuation_len() > 0 => self.pos += self.continuation_len(),
                _ => {
                    let argument = self.read_argument();
                    self.current.push(argument);
                }
            }
        }
        self.end_command();
        Script::new(self.commands)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_ellipsis(&self) -> bool {
        self.peek() == Some('.') && self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.')
    }

    /// Length of a `\` line continuation at the cursor, or 0.
    fn continuation_len(&self) -> usize {
        if self.peek() != Some('\\') {
            return 0;
        }
        match (self.peek_at(1), self.peek_at(2)) {
            (Some('\n'), _) => 2,
            (Some('\r'), Some('\n')) => 3,
            _ => 0,
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn end_command(&mut self) {
        if !self.current.is_empty() {
            let args = std::mem::take(&mut self.current);
            self.commands.push(Command::new(args));
        }
    }

    fn end_piped_command(&mut self) {
        if let Some(last) = self.current.last_mut() {
            last.flags.pipe = true;
        }
        self.end_command();
    }

    fn read_argument(&mut self) -> Argument {
        let mut flags = ArgFlags::default();

        if self.peek() == Some('$') {
            self.pos += 1;
            if self.at_token_end()
                || matches!(self.peek(), Some(' ') | Some('\t') | Some('\r'))
                || self.continuation_len() > 0
            {
                return Argument::literal("$");
            }
            flags.exec = true;
        }

        let (kind, mut value) = match self.peek() {
            Some('"') => (TokenKind::Quoted, self.read_quoted()),
            Some('(') => {
                flags.exec = true;
                (TokenKind::Group, self.read_group())
            }
            Some('{') => (TokenKind::Group, self.read_group()),
            _ => (TokenKind::Bare, self.read_bare()),
        };

        if self.at_ellipsis() {
            self.pos += 3;
            flags.expand = true;
            if kind == TokenKind::Bare && value.is_empty() {
                value.push_str("...");
            }
        }

        Argument { value, flags }
    }

    fn at_token_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some('\n') | Some(';') | Some('|') => true,
            Some('/') => self.peek_at(1) == Some('/'),
            _ => false,
        }
    }

    fn read_bare(&mut self) -> String {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\r' | '\n' | ';' | '|' | '"' | '(' | '{') {
                break;
            }
            if self.at_ellipsis() || self.continuation_len() > 0 {
                break;
            }
            value.push(c);
            self.pos += 1;
        }
        value
    }

    /// Decodes a quoted literal. `\xHH` contributes one raw byte, so escaped
    /// UTF-8 sequences come back as the characters they encode.
    fn read_quoted(&mut self) -> String {
        let mut bytes = Vec::new();
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '"' => return decode_bytes(bytes),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        bytes.push(b'\\');
                        break;
                    };
                    self.pos += 1;
                    match escaped {
                        't' => bytes.push(b'\t'),
                        'r' => bytes.push(b'\r'),
                        'n' => bytes.push(b'\n'),
                        '0' => bytes.push(0),
                        'x' => match self.read_hex_byte() {
                            Some(byte) => bytes.push(byte),
                            None => bytes.push(b'x'),
                        },
                        other => push_char(&mut bytes, other),
                    }
                }
                other => push_char(&mut bytes, other),
            }
        }
        decode_bytes(bytes)
    }

    fn read_hex_byte(&mut self) -> Option<u8> {
        let high = self.peek()?.to_digit(16)?;
        let low = self.peek_at(1)?.to_digit(16)?;
        self.pos += 2;
        u8::try_from(high * 16 + low).ok()
    }

    /// Reads a `(...)` or `{...}` group verbatim, tracking nesting of both
    /// bracket kinds and copying quoted strings untouched.
    fn read_group(&mut self) -> String {
        let mut value = String::new();
        let mut depth = 1usize;
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                '"' => self.copy_quoted_verbatim(&mut value),
                '(' | '{' => {
                    depth += 1;
                    value.push(c);
                    self.pos += 1;
                }
                ')' | '}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return value;
                    }
                    value.push(c);
                }
                _ => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
        value
    }

    fn copy_quoted_verbatim(&mut self, out: &mut String) {
        out.push('"');
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            out.push(c);
            match c {
                '"' => return,
                '\\' => {
                    if let Some(next) = self.peek() {
                        out.push(next);
                        self.pos += 1;
                    }
                }
                _ => {}
            }
        }
    }
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn decode_bytes(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}

#[cfg(test)]
mod script_tests {
    use super::*;

    fn values(command: &Command) -> Vec<&str> {
        command.args.iter().map(|arg| arg.value.as_str()).collect()
    }

    #[test]
    fn separators_split_commands_equivalently() {
        let first = parse("a;b\nc");
        let second = parse("a\nb;c");
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(values(&first.commands[2]), vec!["c"]);
    }

    #[test]
    fn whitespace_comments_and_empty_commands_are_skipped() {
        let script = parse("  echo  a\t b // trailing comment\n;;\n// whole line\nnext");
        assert_eq!(script.len(), 2);
        assert_eq!(values(&script.commands[0]), vec!["echo", "a", "b"]);
        assert_eq!(values(&script.commands[1]), vec!["next"]);
    }

    #[test]
    fn quoted_literal_decodes_escapes() {
        let script = parse(r#"echo "a\tb\r\n\0\x41\\\"\q end""#);
        let arg = &script.commands[0].args[1];
        assert_eq!(arg.value, "a\tb\r\n\0A\\\"q end");
        assert_eq!(arg.flags, ArgFlags::default());
    }

    #[test]
    fn hex_escapes_decode_as_bytes() {
        let script = parse(r#"echo "\xC3\xA9t\xC3\xA9" "\xE2\x98\x83 snow" "\xFF""#);
        let args = &script.commands[0].args;
        assert_eq!(args[1].value, "été");
        assert_eq!(args[1].value.as_bytes(), &[0xC3, 0xA9, b't', 0xC3, 0xA9]);
        assert_eq!(args[2].value, "☃ snow");
        assert_eq!(args[3].value, "\u{FFFD}");
    }

    #[test]
    fn invalid_hex_escape_keeps_the_x() {
        let script = parse(r#"echo "\xZZ""#);
        assert_eq!(script.commands[0].args[1].value, "xZZ");
    }

    #[test]
    fn paren_group_is_exec_and_keeps_inner_quotes_verbatim() {
        let script = parse(r#"echo (concat "a\"b" (inner {x}))"#);
        let arg = &script.commands[0].args[1];
        assert!(arg.flags.exec);
        assert_eq!(arg.value, r#"concat "a\"b" (inner {x})"#);
    }

    #[test]
    fn brace_group_is_verbatim_literal() {
        let script = parse("if 1 {\n  echo \"}\" ; echo b\n} else {x}");
        let command = &script.commands[0];
        assert_eq!(command.len(), 5);
        assert_eq!(command.args[2].value, "\n  echo \"}\" ; echo b\n");
        assert!(!command.args[2].flags.exec);
        assert_eq!(command.args[4].value, "x");
    }

    #[test]
    fn dollar_marks_following_token_as_exec() {
        let script = parse("echo $x $(z 1) $");
        let args = &script.commands[0].args;
        assert_eq!(args[1], Argument::exec("x"));
        assert_eq!(args[2], Argument::exec("z 1"));
        assert_eq!(args[3], Argument::literal("$"));
    }

    #[test]
    fn dollar_followed_by_whitespace_stays_literal() {
        let script = parse("echo $ y $\tz $;next");
        assert_eq!(script.len(), 2);
        let args = &script.commands[0].args;
        assert_eq!(args.len(), 6);
        assert_eq!(args[1], Argument::literal("$"));
        assert_eq!(args[2], Argument::literal("y"));
        assert_eq!(args[3], Argument::literal("$"));
        assert_eq!(args[4], Argument::literal("z"));
        assert_eq!(args[5], Argument::literal("$"));
    }

    #[test]
    fn trailing_ellipsis_marks_expand() {
        let script = parse("echo list... (items)... ...");
        let args = &script.commands[0].args;
        assert_eq!(args[1].value, "list");
        assert!(args[1].flags.expand);
        assert!(args[2].flags.exec && args[2].flags.expand);
        assert_eq!(args[3].value, "...");
        assert!(args[3].flags.expand);
    }

    #[test]
    fn pipe_ends_command_and_flags_last_argument() {
        let script = parse("produce a | consume b");
        assert_eq!(script.len(), 2);
        assert!(script.commands[0].pipes_into_next());
        assert!(script.commands[0].args[1].flags.pipe);
        assert!(!script.commands[1].pipes_into_next());
    }

    #[test]
    fn line_continuation_joins_lines() {
        let script = parse("echo a \\\n  b\r\necho c \\\r\n d");
        assert_eq!(script.len(), 2);
        assert_eq!(values(&script.commands[0]), vec!["echo", "a", "b"]);
        assert_eq!(values(&script.commands[1]), vec!["echo", "c", "d"]);
    }

    #[test]
    fn unterminated_groups_recover_to_end_of_text() {
        let script = parse("echo {open (nested\necho \"unterminated");
        assert_eq!(script.len(), 1);
        assert_eq!(script.commands[0].args[1].value, "open (nested\necho \"unterminated");

        let quoted = parse("echo \"abc");
        assert_eq!(quoted.commands[0].args[1].value, "abc");
    }

    #[test]
    fn adjacent_tokens_split_on_quotes_and_groups() {
        let script = parse("echo\"a\"{b}(c)");
        let args = &script.commands[0].args;
        assert_eq!(args.len(), 4);
        assert_eq!(args[1].value, "a");
        assert_eq!(args[2].value, "b");
        assert!(args[3].flags.exec);
    }
}
