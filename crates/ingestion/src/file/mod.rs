mod jsonl_failure_queue;

pub use jsonl_failure_queue::*;
