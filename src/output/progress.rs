use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};
use crate::engine::PassStage;

const TOTAL_PHASES: usize = 6;

/// Spinner per pass stage for one-shot modes.
pub struct PhaseProgress {
    pb: Option<ProgressBar>,
    current: Option<PassStage>,
    completed: usize,
}

impl PhaseProgress {
    pub fn start() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        Self {
            pb: None,
            current: None,
            completed: 0,
        }
    }

    /// Completes the running phase and starts a spinner for `stage`.
    pub fn advance(&mut self, stage: PassStage) {
        self.finish_current();
        let number = self.completed + 1;
        self.pb = Some(create_spinner(
            bright_yellow(format!("Phase {number}/{TOTAL_PHASES}: {}", stage.label())).to_string(),
        ));
        self.current = Some(stage);
    }

    pub fn finish(mut self) {
        self.finish_current();
        eprintln!();
    }

    fn finish_current(&mut self) {
        if let (Some(pb), Some(stage)) = (self.pb.take(), self.current.take()) {
            self.completed += 1;
            pb.finish_with_message(
                bright_green(format!(
                    "Phase {}/{TOTAL_PHASES}: {} ✓",
                    self.completed,
                    stage.label()
                ))
                .to_string(),
            );
        }
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
