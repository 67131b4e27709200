//! Theme and style definitions.

use ratatui::style::{Color, Modifier, Style};

use runscope_core::{ConditionStatus, RunPhase, StepPhase};

/// Colors used across the dashboard.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Primary accent color (highlights, active elements)
    pub accent: Color,
    /// Succeeded runs and finished steps
    pub success: Color,
    /// Running runs and steps
    pub running: Color,
    /// Waiting / pending
    pub warning: Color,
    /// Failed runs, load errors
    pub error: Color,
    /// Timestamps, secondary info
    pub muted: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            success: Color::Green,
            running: Color::Blue,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn focused_border(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn unfocused_border(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn bold(&self) -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn phase_style(&self, phase: RunPhase) -> Style {
        let color = match phase {
            RunPhase::Pending => self.warning,
            RunPhase::Running => self.running,
            RunPhase::Succeeded => self.success,
            RunPhase::Failed => self.error,
        };
        Style::default().fg(color)
    }

    pub fn condition_style(&self, status: Option<ConditionStatus>) -> Style {
        let color = match status {
            Some(ConditionStatus::True) => self.success,
            Some(ConditionStatus::False) => self.error,
            Some(ConditionStatus::Unknown) => self.running,
            None => self.muted,
        };
        Style::default().fg(color)
    }

    /// A terminated step is only green if it exited cleanly.
    pub fn step_style(&self, phase: Option<StepPhase>, reason: Option<&str>) -> Style {
        let color = match (phase, reason) {
            (Some(StepPhase::Terminated), Some("Completed")) => self.success,
            (Some(StepPhase::Terminated), _) => self.error,
            (Some(StepPhase::Running), _) => self.running,
            (Some(StepPhase::Waiting), _) => self.warning,
            (None, _) => self.muted,
        };
        Style::default().fg(color)
    }
}
