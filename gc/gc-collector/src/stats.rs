/// Read-only snapshot of the collector's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collection cycles.
    pub cycles: u64,
    /// Successful allocations over the collector's lifetime.
    pub total_allocations: u64,
    /// Bytes allocated since the last completed collection.
    pub bytes_since_collection: u64,
    /// Live payload bytes currently allocated.
    pub allocated_bytes: usize,
    /// Arena bytes not currently allocated to payloads.
    pub free_bytes: usize,
}
