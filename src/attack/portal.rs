//! Captive Portal Seam
//!
//! The evil-twin attack delegates AP impersonation and the phishing web
//! surface to this collaborator; the engine only decides when it runs.

use thiserror::Error;
use tracing::info;

/// Portal page variant served to lured clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalVariant {
    Generic,
    CloudLogin,
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("portal startup failed: {0}")]
    Startup(String),
}

pub trait CaptivePortal: Send {
    fn begin(&mut self, ssid: &str, variant: PortalVariant) -> Result<(), PortalError>;
    fn stop(&mut self);
}

/// Portal that always succeeds without serving anything; used by the
/// simulation CLI.
#[derive(Debug, Default)]
pub struct NullPortal;

impl CaptivePortal for NullPortal {
    fn begin(&mut self, ssid: &str, variant: PortalVariant) -> Result<(), PortalError> {
        info!(ssid, ?variant, "null portal started");
        Ok(())
    }

    fn stop(&mut self) {}
}
