use log::info;
use std::fmt;

/// Human-readable export step. Purely informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPhase {
    CreatingTheme,
    CreatingTitlePage,
    ProcessingPage { page: usize, total: usize },
    Saving,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportPhase::CreatingTheme => write!(f, "Creating theme..."),
            ExportPhase::CreatingTitlePage => write!(f, "Creating title page..."),
            ExportPhase::ProcessingPage { page, total } => {
                write!(f, "Processing page {} of {}...", page, total)
            }
            ExportPhase::Saving => write!(f, "Saving PDF..."),
        }
    }
}

pub trait ExportObserver: Send + Sync {
    fn on_phase(&self, phase: &ExportPhase);
}

impl<F> ExportObserver for F
where
    F: Fn(&ExportPhase) + Send + Sync,
{
    fn on_phase(&self, phase: &ExportPhase) {
        self(phase)
    }
}

pub struct LogObserver;

impl ExportObserver for LogObserver {
    fn on_phase(&self, phase: &ExportPhase) {
        info!("{}", phase);
    }
}
