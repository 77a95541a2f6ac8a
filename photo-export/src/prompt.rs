//! Interactive count selection on stdin.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Mutex;

use photo_export_core::contract::CountSelector;
use tracing::warn;

/// Asks the user how many photos to transfer, re-asking until the answer is
/// in `1..=available`. Returns 0 when input ends, which the exporter rejects.
pub struct PromptCountSelector<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl PromptCountSelector<BufReader<io::Stdin>, io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptCountSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    fn ask(&self, grouping: &str, available: usize) -> io::Result<usize> {
        let mut input = self.input.lock().map_err(|_| io::Error::other("input lock poisoned"))?;
        let mut output = self
            .output
            .lock()
            .map_err(|_| io::Error::other("output lock poisoned"))?;

        loop {
            write!(
                output,
                "'{grouping}' holds {available} photos. How many to export (1-{available})? "
            )?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(0);
            }
            match line.trim().parse::<usize>() {
                Ok(n) if (1..=available).contains(&n) => return Ok(n),
                _ => writeln!(output, "Please enter a number between 1 and {available}.")?,
            }
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> CountSelector for PromptCountSelector<R, W> {
    fn select_count(&self, grouping: &str, available: usize) -> usize {
        self.ask(grouping, available).unwrap_or_else(|e| {
            warn!(error = %e, grouping, "Count prompt failed");
            0
        })
    }
}
