use serde::Serialize;

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Acknowledgement returned to verified provider callbacks.
#[derive(Debug, Serialize)]
pub struct InboundReceivedResponse {
    pub received: bool,
}
