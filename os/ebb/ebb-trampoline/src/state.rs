//! The fixed progression every trampoline invocation goes through.

use core::fmt;

/// Where an invocation of the trampoline currently is.
///
/// Each step follows the previous one; none is skipped or repeated. The
/// handler runs strictly between [`ContextSaved`](Self::ContextSaved) and
/// [`ContextRestored`](Self::ContextRestored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrampolineState {
    /// The branch was taken; nothing has been touched yet.
    Entry,
    /// The stack pointer has been moved down by the frame size.
    FrameReserved,
    /// Every register of the variant is in the frame.
    ContextSaved,
    /// Addressing has been established and the dispatch routine called.
    HandlerRunning,
    /// All saved registers are back.
    ContextRestored,
    /// The stack pointer has its pre-entry value again.
    FrameReleased,
    /// Control returned to the interrupted instruction.
    Resumed,
}

impl TrampolineState {
    pub const SEQUENCE: [Self; 7] = [
        Self::Entry,
        Self::FrameReserved,
        Self::ContextSaved,
        Self::HandlerRunning,
        Self::ContextRestored,
        Self::FrameReleased,
        Self::Resumed,
    ];

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Entry => Some(Self::FrameReserved),
            Self::FrameReserved => Some(Self::ContextSaved),
            Self::ContextSaved => Some(Self::HandlerRunning),
            Self::HandlerRunning => Some(Self::ContextRestored),
            Self::ContextRestored => Some(Self::FrameReleased),
            Self::FrameReleased => Some(Self::Resumed),
            Self::Resumed => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::FrameReserved => "frame reserved",
            Self::ContextSaved => "context saved",
            Self::HandlerRunning => "handler running",
            Self::ContextRestored => "context restored",
            Self::FrameReleased => "frame released",
            Self::Resumed => "resumed",
        }
    }
}

impl fmt::Display for TrampolineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
