mod chunked;

pub use chunked::{READ_STEP, WRITE_STEP, read_chunked, write_chunked};

/// Receives `(completed, total)` byte counts from a bounded transfer loop.
pub trait ProgressSink {
    fn report(&mut self, completed: u64, total: u64);
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64),
{
    fn report(&mut self, completed: u64, total: u64) {
        self(completed, total)
    }
}

/// Progress sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _completed: u64, _total: u64) {}
}

/// Pipeline step a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Loading a source file into memory
    Reading,
    /// Compressing a payload
    Compressing,
    /// Writing an entry into the package
    Writing,
    /// Reading an entry out of a package
    Unpacking,
    /// Decompressing a payload
    Decompressing,
    /// Writing a recovered file to disk
    Saving,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "Reading",
            Self::Compressing => "Compressing",
            Self::Writing => "Writing",
            Self::Unpacking => "Unpacking",
            Self::Decompressing => "Decompressing",
            Self::Saving => "Saved",
        }
    }
}

/// One progress update emitted by the packaging or unpackaging pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    pub phase: Phase,
    /// `name + ext` of the file being processed
    pub file: &'a str,
    pub completed: u64,
    pub total: u64,
}

/// Observer for pipeline progress, decoupled from any console rendering.
pub trait Progress {
    fn update(&mut self, event: &ProgressEvent<'_>);
}

impl<F> Progress for F
where
    F: FnMut(&ProgressEvent<'_>),
{
    fn update(&mut self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

impl Progress for NoProgress {
    fn update(&mut self, _event: &ProgressEvent<'_>) {}
}

/// Adapts a pipeline [`Progress`] observer into a byte-level [`ProgressSink`]
/// for one phase of one file.
pub(crate) struct PhaseSink<'a> {
    progress: &'a mut dyn Progress,
    phase: Phase,
    file: &'a str,
}

impl<'a> PhaseSink<'a> {
    pub(crate) fn new(progress: &'a mut dyn Progress, phase: Phase, file: &'a str) -> Self {
        Self {
            progress,
            phase,
            file,
        }
    }
}

impl ProgressSink for PhaseSink<'_> {
    fn report(&mut self, completed: u64, total: u64) {
        self.progress.update(&ProgressEvent {
            phase: self.phase,
            file: self.file,
            completed,
            total,
        });
    }
}
