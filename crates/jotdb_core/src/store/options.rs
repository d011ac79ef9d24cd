//! Driver configuration.
//!
//! Passed explicitly to `Driver::open`; the store keeps no process-wide
//! mutable settings.

/// Default zero-padding width for generated resource ids.
pub const DEFAULT_ID_WIDTH: usize = 10;
/// Default number of spaces per JSON indent level.
pub const DEFAULT_INDENT: usize = 2;
/// Default unix permission bits for created directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Tunables for one `Driver` instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Spaces per indent level in stored JSON. `0` indents with tabs.
    pub indent: usize,
    /// Take the collection lock for reads as well as mutations.
    pub lock_reads: bool,
    /// Flush the staging file to disk before it is renamed into place.
    pub sync_writes: bool,
    /// Permission bits for directories created by the driver (unix only).
    pub dir_mode: u32,
    /// Digits used when formatting generated resource ids.
    pub id_width: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            lock_reads: false,
            sync_writes: true,
            dir_mode: DEFAULT_DIR_MODE,
            id_width: DEFAULT_ID_WIDTH,
        }
    }
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_lock_reads(mut self, lock_reads: bool) -> Self {
        self.lock_reads = lock_reads;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_dir_mode(mut self, dir_mode: u32) -> Self {
        self.dir_mode = dir_mode;
        self
    }

    /// Sets the generated id width; values below 1 are clamped to 1.
    pub fn with_id_width(mut self, id_width: usize) -> Self {
        self.id_width = id_width.max(1);
        self
    }

    pub(crate) fn indent_bytes(&self) -> Vec<u8> {
        if self.indent == 0 {
            b"\t".to_vec()
        } else {
            vec![b' '; self.indent]
        }
    }
}
