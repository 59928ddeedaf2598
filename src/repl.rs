//! Line-oriented REPL. Globals persist across inputs; an unbalanced `{`
//! keeps reading until the braces close.

use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use colored::Colorize;

use crate::error::LoxError;
use crate::{RunOptions, Session};

const HISTORY_FILE: &str = ".lox_history";
const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";

pub struct Repl {
    session: Session,
    options: RunOptions,
    history: Vec<String>,
    history_file: PathBuf,
    buffer: String,
    brace_balance: i32,
}

impl Repl {
    pub fn new(options: RunOptions) -> Self {
        let history_file = Self::get_history_path();
        let mut repl = Self {
            session: Session::new(options),
            options,
            history: Vec::new(),
            history_file,
            buffer: String::new(),
            brace_balance: 0,
        };
        repl.load_history();
        repl
    }

    fn get_history_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(HISTORY_FILE)
        } else {
            PathBuf::from(HISTORY_FILE)
        }
    }

    fn load_history(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.history_file) {
            for line in content.lines() {
                if !line.trim().is_empty() {
                    self.history.push(line.to_string());
                }
            }
        }
        tracing::debug!(
            entries = self.history.len(),
            path = %self.history_file.display(),
            "loaded history"
        );
    }

    fn save_history(&self) {
        if let Some(parent) = self.history_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let content = self.history.join("\n");
        if let Err(e) = std::fs::write(&self.history_file, content) {
            tracing::warn!(error = %e, "could not save history");
        }
    }

    pub fn run(&mut self) {
        println!("Lox {}", env!("CARGO_PKG_VERSION"));
        println!("Type .help for available commands.\n");

        let stdin = io::stdin();

        loop {
            print!("{}", self.prompt());
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => {
                    println!();
                    break;
                }
                Ok(_) => {
                    let line = line.trim_end();
                    if self.buffer.is_empty() {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if line == "exit" {
                            break;
                        }
                        self.history.push(line.to_string());
                        if line.starts_with('.') {
                            self.handle_command(line);
                            continue;
                        }
                    } else {
                        self.history.push(line.to_string());
                    }

                    if let Some(code) = self.push_line(line) {
                        self.execute(&code);
                    }
                }
                Err(e) => {
                    eprintln!("{}", format!("Error reading input: {}", e).red());
                    break;
                }
            }
        }

        self.save_history();
    }

    fn prompt(&self) -> &'static str {
        if self.buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        }
    }

    /// Add a line to the pending input. Returns the complete source once the
    /// braces balance.
    fn push_line(&mut self, line: &str) -> Option<String> {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        self.brace_balance += count_braces(line);

        if self.brace_balance > 0 {
            return None;
        }
        self.brace_balance = 0;
        Some(std::mem::take(&mut self.buffer))
    }

    fn execute(&mut self, code: &str) {
        if let Err(e) = self.session.eval(code) {
            report(&e);
        }
    }

    fn handle_command(&mut self, line: &str) {
        match line {
            ".help" => self.cmd_help(),
            ".vars" => self.cmd_vars(),
            ".history" => self.cmd_history(),
            ".clear" => {
                self.session = Session::new(self.options);
                println!("Globals cleared.");
            }
            _ => println!(
                "Unknown command: {}. Type .help for available commands.",
                line
            ),
        }
    }

    fn cmd_help(&self) {
        println!();
        println!("Lox REPL Commands");
        println!();
        println!(".help     - Show this help message");
        println!(".vars     - List all global variables");
        println!(".history  - Show command history");
        println!(".clear    - Drop all globals");
        println!("exit      - Exit the REPL (or Ctrl+D)");
        println!();
    }

    fn cmd_vars(&self) {
        let globals = self.session.vm().globals();
        if globals.is_empty() {
            println!("No globals defined.");
            return;
        }

        let mut names: Vec<&Rc<str>> = globals.keys().collect();
        names.sort();
        for name in names {
            if let Some(value) = globals.get(name) {
                println!(
                    "  {} = {} {}",
                    name.cyan(),
                    value,
                    format!("({})", value.type_name()).dimmed()
                );
            }
        }
    }

    fn cmd_history(&self) {
        let start = self.history.len().saturating_sub(20);
        for (i, entry) in self.history.iter().enumerate().skip(start) {
            println!("{:4}  {}", i + 1, entry);
        }
    }
}

/// Print an error to stderr the way the REPL and CLI both show it.
pub fn report(err: &LoxError) {
    match err {
        LoxError::Fault(_) => eprintln!("{}", format!("Internal error: {}", err).red()),
        _ => eprintln!("{}", err.to_string().red()),
    }
}

/// Net `{` minus `}` in a line, ignoring braces inside string literals and
/// `//` comments.
fn count_braces(s: &str) -> i32 {
    let mut balance = 0;
    let mut in_string = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '/' && chars.peek() == Some(&'/') {
            break;
        } else if c == '{' {
            balance += 1;
        } else if c == '}' {
            balance -= 1;
        }
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repl() -> Repl {
        Repl {
            session: Session::new(RunOptions::default()),
            options: RunOptions::default(),
            history: Vec::new(),
            history_file: PathBuf::from(HISTORY_FILE),
            buffer: String::new(),
            brace_balance: 0,
        }
    }

    #[test]
    fn test_count_braces() {
        assert_eq!(count_braces("{"), 1);
        assert_eq!(count_braces("while (x) { { }"), 1);
        assert_eq!(count_braces("}"), -1);
        assert_eq!(count_braces("print \"{\";"), 0);
        assert_eq!(count_braces("x; // {"), 0);
    }

    #[test]
    fn test_single_line_is_complete() {
        let mut repl = repl();
        assert_eq!(repl.push_line("print 1;"), Some("print 1;".to_string()));
        assert_eq!(repl.prompt(), PROMPT);
    }

    #[test]
    fn test_open_brace_continues() {
        let mut repl = repl();
        assert_eq!(repl.push_line("if (true) {"), None);
        assert_eq!(repl.prompt(), CONTINUATION_PROMPT);
        assert_eq!(repl.push_line("  print 1;"), None);
        assert_eq!(
            repl.push_line("}"),
            Some("if (true) {\n  print 1;\n}".to_string())
        );
        assert_eq!(repl.prompt(), PROMPT);
    }

    #[test]
    fn test_stray_close_brace_resets_balance() {
        let mut repl = repl();
        assert!(repl.push_line("}").is_some());
        assert_eq!(repl.push_line("{"), None);
    }
}
