/// Identifies an in-flight load.
///
/// Handed to the host with each fetch and handed back on completion, so
/// completions can arrive in any order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Request(pub u64);
