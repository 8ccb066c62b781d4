//! Text-console implementations of the presentation seams.
//!
//! [`Console`] asks questions on a writer and reads answers from a reader;
//! the binary wires it to stdout/stdin, tests to in-memory buffers.

use std::cell::RefCell;
use std::io::{BufRead, Write};

use crate::models::{Field, Record};
use crate::traits::{ConflictResolver, Prompter};

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one line. `None` on EOF or I/O failure.
    pub fn ask(&mut self, question: &str) -> Option<String> {
        write!(self.output, "{}", question).ok()?;
        self.output.flush().ok()?;
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()),
        }
    }

    /// Yes/no question; anything but `y`/`yes` is no.
    pub fn confirm(&mut self, question: &str) -> bool {
        self.ask(question)
            .map(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl Console<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

/// `1` keeps the current value; any other answer (or EOF) takes the incoming one.
impl<R: BufRead, W: Write> ConflictResolver for Console<R, W> {
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String {
        let _ = writeln!(self.output, "CONFLICT in {}", field.label());
        let _ = writeln!(self.output, "\t1: {}", current);
        let _ = writeln!(self.output, "\t2: {}", incoming);
        match self.ask("Please specify your choice: ").as_deref().map(str::trim) {
            Some("1") => current.to_string(),
            _ => incoming.to_string(),
        }
    }
}

impl<R: BufRead, W: Write> Prompter for Console<R, W> {
    fn prompt(&mut self, field: Field, record: &Record) -> Option<String> {
        self.ask(&format!("Enter unknown {} for {}: ", field.label(), record.isbn))
    }
}

/// One console behind both seams of a lookup.
///
/// The engine borrows the resolver and the prompter at the same time, so
/// each side holds a shared reference and borrows the console per question.
pub struct Shared<'a, T>(pub &'a RefCell<T>);

impl<T: ConflictResolver> ConflictResolver for Shared<'_, T> {
    fn resolve(&mut self, field: Field, current: &str, incoming: &str) -> String {
        self.0.borrow_mut().resolve(field, current, incoming)
    }
}

impl<T: Prompter> Prompter for Shared<'_, T> {
    fn prompt(&mut self, field: Field, record: &Record) -> Option<String> {
        self.0.borrow_mut().prompt(field, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_resolver_choice_one_keeps_current() {
        let mut c = console("1\n");
        assert_eq!(c.resolve(Field::Author, "A", "B"), "A");
        let (_, out) = c.into_inner();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("CONFLICT in Author"));
        assert!(out.contains("1: A"));
        assert!(out.contains("2: B"));
    }

    #[test]
    fn test_resolver_defaults_to_incoming() {
        assert_eq!(console("2\n").resolve(Field::Title, "A", "B"), "B");
        assert_eq!(console("").resolve(Field::Title, "A", "B"), "B");
    }

    #[test]
    fn test_prompt_reads_line() {
        let mut c = console("Typed Title\r\n");
        let answer = c.prompt(Field::Title, &Record::new("1"));
        assert_eq!(answer.as_deref(), Some("Typed Title"));
    }

    #[test]
    fn test_prompt_eof_is_none() {
        assert!(console("").prompt(Field::Title, &Record::new("1")).is_none());
    }

    #[test]
    fn test_shared_console_serves_both_seams() {
        let cell = RefCell::new(console("1\nTyped\n"));
        let mut resolver = Shared(&cell);
        let mut prompter = Shared(&cell);
        assert_eq!(resolver.resolve(Field::Title, "A", "B"), "A");
        assert_eq!(
            prompter.prompt(Field::Title, &Record::new("1")).as_deref(),
            Some("Typed")
        );
    }

    #[test]
    fn test_confirm() {
        assert!(console("Y\n").confirm("again? "));
        assert!(!console("n\n").confirm("again? "));
        assert!(!console("").confirm("again? "));
    }
}
