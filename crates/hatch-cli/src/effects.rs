// ABOUTME: Side effects a terminal session reacts to while a turn streams
// ABOUTME: Announces previews, finished steps, and live URLs on stderr and remembers them for the summary

use hatch_core::SideEffects;

/// Collects what the agent did outside the chat log during one turn.
#[derive(Debug, Default)]
pub struct TerminalEffects {
    pub dev_server_started: bool,
    pub files_changed: Vec<String>,
    pub steps_completed: Vec<u32>,
    pub live_url: Option<String>,
    quiet: bool,
}

impl TerminalEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record effects without printing anything.
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    /// One-line summary printed after the turn, if anything happened.
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.files_changed.is_empty() {
            parts.push(format!("{} file(s) changed", self.files_changed.len()));
        }
        if let Some(step) = self.steps_completed.last() {
            parts.push(format!("step {step} complete"));
        }
        if self.dev_server_started {
            parts.push("preview running".to_string());
        }
        if let Some(url) = &self.live_url {
            parts.push(format!("live at {url}"));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

impl SideEffects for TerminalEffects {
    fn on_dev_server_detected(&mut self) {
        if !self.dev_server_started && !self.quiet {
            eprintln!("Preview server starting");
        }
        self.dev_server_started = true;
    }

    fn on_file_changed(&mut self, path: &str) {
        if !self.files_changed.iter().any(|f| f == path) {
            self.files_changed.push(path.to_string());
        }
    }

    fn on_step_completed(&mut self, step: u32) {
        if !self.quiet {
            eprintln!("Step {step} complete");
        }
        self.steps_completed.push(step);
    }

    fn on_live_url(&mut self, url: &str) {
        if !self.quiet {
            eprintln!("Live at {url}");
        }
        self.live_url = Some(url.to_string());
    }
}
