use core::fmt;

/// A latch request mode. Stable identifiers used in diagnostics: `S`, `X`,
/// `SX`, `X_WAIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Shared (read) request.
    S,
    /// Exclusive request.
    X,
    /// Shared-exclusive request: may coexist with S holders, not with
    /// X/SX/XWait.
    SX,
    /// Upgrade-exclusive request awaiting readers to drain.
    XWait,
}

impl Mode {
    /// Stable diagnostic name, e.g. for the introspection table's
    /// "requested mode" column.
    pub const fn name(self) -> &'static str {
        match self {
            Mode::S => "S",
            Mode::X => "X",
            Mode::SX => "SX",
            Mode::XWait => "X_WAIT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The latch's own writer status, as reported for diagnostics. Unlike
/// [`Mode`] this can also be "nobody holds it exclusively".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterStatus {
    /// No thread holds the latch exclusively.
    NotLocked,
    /// A thread holds it in X mode.
    X,
    /// A thread holds it in SX mode.
    Sx,
    /// A thread holds it as an upgrade-exclusive waiter.
    XWait,
}

impl WriterStatus {
    /// Stable diagnostic name.
    pub const fn name(self) -> &'static str {
        match self {
            WriterStatus::NotLocked => "NOT_LOCKED",
            WriterStatus::X => "X",
            WriterStatus::Sx => "SX",
            WriterStatus::XWait => "X_WAIT",
        }
    }
}

impl fmt::Display for WriterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source-location diagnostic tag: the file and line of an acquisition
/// point. Captured explicitly (like the original's `file`/`line`
/// parameters) rather than via `#[track_caller]`, so call sites that
/// reserve on behalf of another logical site (e.g. a retry loop) can pass
/// through the original one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Site {
    /// Source file name, typically from `file!()`.
    pub file: &'static str,
    /// Source line number, typically from `line!()`.
    pub line: u32,
}

impl Site {
    /// Build a `Site` from explicit parts.
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Captures the calling site of an operation. Expands to a [`Site`] built
/// from `file!()`/`line!()` at the call site.
#[macro_export]
macro_rules! site {
    () => {
        $crate::Site::new(file!(), line!())
    };
}
