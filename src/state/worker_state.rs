/// Worker state definitions
///
/// The coordinator and the worker each keep their own view of a worker: the
/// coordinator only needs to know whether a request is outstanding, while the
/// worker tracks its full lifecycle for logging and shutdown.
use std::fmt;

/// Coordinator-side status of a worker
///
/// Owned and mutated only by the dispatcher. A worker is `Working` exactly
/// while a `URL` or `URLLIST` request it was sent has not been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkerStatus {
    /// Idle; may be assigned the next URL
    #[default]
    Ready,

    /// A request is outstanding
    Working,
}

impl WorkerStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_working(&self) -> bool {
        matches!(self, Self::Working)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Working => "working",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker-side lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Spawned, fetcher not yet confirmed usable
    Starting,

    /// Waiting for the next command
    Ready,

    /// Performing a fetch
    Working,

    /// Exited; no further commands are read
    Stopped,
}

impl WorkerState {
    /// Returns true if moving from `self` to `to` is a legal transition
    pub fn can_transition_to(&self, to: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, to),
            (Starting, Ready)
                | (Starting, Stopped)
                | (Ready, Working)
                | (Ready, Stopped)
                | (Working, Ready)
                | (Working, Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Working => "working",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
