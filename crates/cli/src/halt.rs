use std::io::{self, BufRead, Write};

use overseer_core::event::CallEvent;
use overseer_core::halt::HaltHook;

/// Terminal halt hook: prints the halted event and blocks until the operator
/// presses Enter.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinHaltHook;

impl HaltHook for StdinHaltHook {
    fn halt(&self, event: &CallEvent) {
        let mut stderr = io::stderr();
        let _ = writeln!(
            stderr,
            "halted on {}\n{}\npress Enter to resume...",
            event.call_site,
            event.canonical_text()
        );
        let _ = stderr.flush();

        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}
