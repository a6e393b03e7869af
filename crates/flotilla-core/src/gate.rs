//! Interactive confirmation gates.
//!
//! The controller owns the input stream and the ask/validate loop, nothing
//! more. It keeps no memory of earlier answers; interpreting an answer
//! (proceed, skip, accept-all, quit) is the pipeline's job.

use std::io::{self, BufRead, Write};

use crate::error::FleetResult;

/// Reads gate answers from an input stream and re-prompts until the answer
/// is one the caller accepts.
pub struct GateController {
    input: Box<dyn BufRead + Send>,
}

impl GateController {
    /// Controller wired to the process's standard input.
    pub fn from_stdin() -> Self {
        Self {
            input: Box::new(io::BufReader::new(io::stdin())),
        }
    }

    /// Controller reading from a fixed script, one answer per line.
    pub fn scripted(answers: &str) -> Self {
        Self {
            input: Box::new(io::Cursor::new(answers.as_bytes().to_vec())),
        }
    }

    /// Prompt until one of `accepted` is entered and return it lowercased.
    ///
    /// Answers are trimmed and case-insensitive; anything else re-prompts.
    /// A closed input stream yields `"q"` so an unattended run winds down
    /// instead of spinning on an empty reader.
    pub fn ask(&mut self, prompt: &str, accepted: &[&str]) -> FleetResult<String> {
        loop {
            print!("{prompt} ( {} ) : ", accepted.join(" / "));
            io::stdout().flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok("q".to_string());
            }
            let answer = line.trim().to_lowercase();
            if accepted.contains(&answer.as_str()) {
                return Ok(answer);
            }
        }
    }

    /// Print text requested from a gate, e.g. the pending diff behind the
    /// `d` answer of the commit gate.
    pub fn show(&self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_answer() {
        let mut gate = GateController::scripted("y\n");
        let answer = gate.ask("Continue?", &["y", "n", "a", "q"]).unwrap();
        assert_eq!(answer, "y");
    }

    #[test]
    fn test_reprompts_until_valid() {
        let mut gate = GateController::scripted("x\nmaybe\nn\n");
        let answer = gate.ask("Continue?", &["y", "n", "a", "q"]).unwrap();
        assert_eq!(answer, "n");
    }

    #[test]
    fn test_answers_are_trimmed_and_lowercased() {
        let mut gate = GateController::scripted("  Y \n");
        let answer = gate.ask("Continue?", &["y", "n"]).unwrap();
        assert_eq!(answer, "y");
    }

    #[test]
    fn test_exhausted_input_quits() {
        let mut gate = GateController::scripted("");
        let answer = gate.ask("Continue?", &["y", "n", "a", "q"]).unwrap();
        assert_eq!(answer, "q");
    }

    #[test]
    fn test_consecutive_asks_consume_lines_in_order() {
        let mut gate = GateController::scripted("y\nd\nn\n");
        assert_eq!(gate.ask("First?", &["y", "n"]).unwrap(), "y");
        assert_eq!(gate.ask("Second?", &["y", "n", "d"]).unwrap(), "d");
        assert_eq!(gate.ask("Second?", &["y", "n", "d"]).unwrap(), "n");
    }
}
