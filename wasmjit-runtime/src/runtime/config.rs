/// Limits an embedder places on a [Store][super::store::Store].
///
/// These are hard caps applied on top of whatever the modules themselves
/// declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Nesting depth of calls, counted across host re-entrancy, at which a
    /// call traps with `CallStackExhausted`. Guest-to-guest calls are kept
    /// off the native stack; each host or compiled-code call in the chain
    /// costs native stack, so the default leaves room for a 2 MiB thread.
    pub max_call_depth:   usize,
    /// The largest size, in pages, any memory may have.
    pub max_memory_pages: u32,
    /// The largest number of elements any table may have.
    pub max_table_length: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth:   128,
            max_memory_pages: 65536,
            max_table_length: 10_000_000,
        }
    }
}

impl Config {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    pub fn with_max_table_length(mut self, length: u32) -> Self {
        self.max_table_length = length;
        self
    }
}
