use std::cell::RefCell;

/// Line-buffered destination for process output. Implementations decide the
/// transport (terminal, remote console, capture buffer).
pub trait OutputSink {
    fn write_line(&self, line: &str);
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: RefCell<Vec<String>>,
}

impl LineBuffer {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl OutputSink for LineBuffer {
    fn write_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn write_line(&self, line: &str) {
        eprintln!("{}", line);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_line(&self, _line: &str) {}
}

#[cfg(test)]
mod io_tests {
    use super::*;

    #[test]
    fn line_buffer_take_drains() {
        let buffer = LineBuffer::default();
        buffer.write_line("a");
        buffer.write_line("b");
        assert_eq!(buffer.lines(), vec!["a", "b"]);
        assert_eq!(buffer.take_lines(), vec!["a", "b"]);
        assert!(buffer.lines().is_empty());
    }
}
