/// Lifecycle of a single streamed resource.
///
/// Requested → Resident on success, Requested → Failed on error. A failed
/// resource is left out; it never blocks its neighbours.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Requested,
    Resident,
    Failed,
}

impl ResidencyState {
    pub fn is_settled(self) -> bool {
        !matches!(self, ResidencyState::Requested)
    }
}
