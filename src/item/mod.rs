/// This module provides a record writer that logs written records.
pub mod logger;

/// This module provides in-memory record readers and writers.
pub mod memory;

/// This module provides the queue bridging reader and writers used for
/// job-to-job dispatch.
pub mod queue;
