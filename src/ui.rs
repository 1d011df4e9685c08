//! Minimal phase-progress display for the `fallout run` CLI path.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

pub struct PhaseProgress {
    bar: ProgressBar,
}

impl PhaseProgress {
    pub fn new(total_phases: u64) -> Self {
        let bar = ProgressBar::new(total_phases);
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_prefix("phases");
        Self { bar }
    }

    pub fn start_phase(&self, index: usize) {
        self.bar.set_message(format!("running phase {}", style(index).yellow()));
    }

    pub fn phase_done(&self) {
        self.bar.inc(1);
    }

    pub fn aborted(&self) {
        self.bar.finish_with_message(style("aborted").red().to_string());
    }

    pub fn finish(&self, pass: bool) {
        let msg = if pass { style("pass").green().to_string() } else { style("fail").red().to_string() };
        self.bar.finish_with_message(msg);
    }
}
