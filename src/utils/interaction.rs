//! User interaction port.
//!
//! Business logic never reads the console directly; it asks an
//! [`Interaction`] to confirm or to pick from a list. The console
//! implementation takes its reader and terminal flag as arguments so the
//! prompts can be driven from tests.

use std::io::{BufRead, Write};

use anyhow::Result;

/// Questions the pipeline may need a human to answer.
pub trait Interaction: Send {
    /// Asks a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Asks the user to pick one of `choices`.
    ///
    /// Returns `None` when no selection could be obtained.
    fn select(&mut self, prompt: &str, choices: &[String]) -> Result<Option<usize>>;
}

/// Console prompts on stderr, answers from `reader`.
pub struct ConsoleInteraction<R> {
    reader: R,
    is_terminal: bool,
}

impl<R: BufRead + Send> ConsoleInteraction<R> {
    /// Creates a console interaction.
    ///
    /// When `is_terminal` is false nothing is prompted: confirmations are
    /// declined and selections are unavailable.
    pub fn new(reader: R, is_terminal: bool) -> Self {
        Self {
            reader,
            is_terminal,
        }
    }

    fn read_answer(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let bytes = self.reader.read_line(&mut input)?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }
}

impl ConsoleInteraction<std::io::BufReader<std::io::Stdin>> {
    /// Console interaction over the process's stdin.
    pub fn stdin() -> Self {
        use std::io::IsTerminal;
        let stdin = std::io::stdin();
        let is_terminal = stdin.is_terminal();
        Self::new(std::io::BufReader::new(stdin), is_terminal)
    }
}

impl<R: BufRead + Send> Interaction for ConsoleInteraction<R> {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        if !self.is_terminal {
            eprintln!("warning: stdin is not interactive, treating confirmation as declined");
            return Ok(false);
        }
        eprintln!("{message}");
        eprint!("Proceed? [y/N] ");
        std::io::stderr().flush()?;
        Ok(matches!(
            self.read_answer()?.map(|a| a.to_lowercase()).as_deref(),
            Some("y" | "yes")
        ))
    }

    fn select(&mut self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        if !self.is_terminal || choices.is_empty() {
            return Ok(None);
        }
        eprintln!("{prompt}");
        for (i, choice) in choices.iter().enumerate() {
            eprintln!("  {}) {choice}", i + 1);
        }
        loop {
            eprint!("Select [1-{}] (empty to cancel): ", choices.len());
            std::io::stderr().flush()?;
            let Some(answer) = self.read_answer()? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => eprintln!("Please enter a number between 1 and {}.", choices.len()),
            }
        }
    }
}
