//! Terminal implementations of the confirmation gate and value prompt
//!
//! The gate and prompt are called from inside the async engine. Stdin reads run
//! through [`blocking`], which hands the worker thread's other tasks off on a
//! multi-thread runtime. On a current-thread runtime the read blocks the runtime.

use crate::gate::{ConfirmationGate, PromptField, ValuePrompt};
use std::io::{self, BufRead, Write};
use tokio::runtime::{Handle, RuntimeFlavor};

/// Print `prompt` and read one trimmed line; `None` at end of input.
pub fn read_line(prompt: &str) -> Option<String> {
    blocking(|| {
        print!("{}", prompt);
        io::stdout().flush().ok()?;

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
}

/// Run a blocking call, via `block_in_place` when on a multi-thread runtime.
pub fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Shows the preview and proceeds only on the literal answer `confirm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalGate;

impl ConfirmationGate for TerminalGate {
    fn confirm(&self, preview: &str) -> bool {
        println!("\n{}\n", preview);
        matches!(
            read_line("Type 'confirm' to proceed or anything else to cancel: ").as_deref(),
            Some("confirm")
        )
    }
}

/// Asks on stdin; an empty answer or `cancel` abandons the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ValuePrompt for TerminalPrompt {
    fn prompt(&self, field: PromptField, options: &[String]) -> Option<String> {
        if !options.is_empty() {
            println!("Options for {}: {}", field, options.join(", "));
        }
        let answer = read_line(&format!("Enter {}: ", field))?;
        if answer.eq_ignore_ascii_case("cancel") {
            return None;
        }
        // Optional registration fields accept a blank answer
        match field {
            PromptField::DexName | PromptField::FactoryAddress => Some(answer),
            _ if answer.is_empty() => None,
            _ => Some(answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_runs_outside_a_runtime() {
        assert_eq!(blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn blocking_runs_on_current_thread_runtime() {
        assert_eq!(blocking(|| "ok"), "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_yields_the_worker_on_multi_thread_runtime() {
        let other = tokio::spawn(async { 40 + 2 });
        let value = blocking(|| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            5
        });
        assert_eq!(value, 5);
        assert_eq!(other.await.unwrap(), 42);
    }
}
