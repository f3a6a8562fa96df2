/// Connection lifecycle of the ingestion client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Disconnected,
    /// Connect requested, waiting for ConnAck and SubAck
    Connecting,
    /// Broker acknowledged both connection and subscription
    Subscribed,
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestionState::Disconnected => "disconnected",
            IngestionState::Connecting => "connecting",
            IngestionState::Subscribed => "subscribed",
        };
        f.write_str(name)
    }
}
