//! Region pinning for the generative-AI route.
//!
//! The generative-AI upstream refuses traffic from some regions. Every
//! gateway instance therefore resolves one fixed unit name to one long-lived
//! unit, placed with a location hint, and sends all generative-AI calls
//! there instead of calling the upstream itself. The unit handles its calls
//! one at a time.
//!
//! [`RegionPin`] is the per-process handle: unbound until first use, then
//! bound to the resolved unit for the rest of the process lifetime.

pub mod local;
pub mod remote;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::models::auth::AuthContext;
use crate::upstream::{GeminiCall, ProxyError, UpstreamReply};

pub use local::LocalNamespace;
pub use remote::RemoteNamespace;

/// Unit name every gateway instance resolves.
pub const DEFAULT_UNIT_NAME: &str = "US_PROXY";

/// Placement preference for a unit's backing execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationHint {
    /// Western North America.
    Wnam,
    /// Eastern North America.
    Enam,
    Sam,
    Weur,
    Eeur,
    Apac,
    Oc,
    Afr,
    Me,
}

impl LocationHint {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationHint::Wnam => "wnam",
            LocationHint::Enam => "enam",
            LocationHint::Sam => "sam",
            LocationHint::Weur => "weur",
            LocationHint::Eeur => "eeur",
            LocationHint::Apac => "apac",
            LocationHint::Oc => "oc",
            LocationHint::Afr => "afr",
            LocationHint::Me => "me",
        }
    }
}

impl FromStr for LocationHint {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wnam" => Ok(LocationHint::Wnam),
            "enam" => Ok(LocationHint::Enam),
            "sam" => Ok(LocationHint::Sam),
            "weur" => Ok(LocationHint::Weur),
            "eeur" => Ok(LocationHint::Eeur),
            "apac" => Ok(LocationHint::Apac),
            "oc" => Ok(LocationHint::Oc),
            "afr" => Ok(LocationHint::Afr),
            "me" => Ok(LocationHint::Me),
            other => Err(PinError::UnknownLocation(other.to_string())),
        }
    }
}

impl fmt::Display for LocationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable unit identity: SHA-256 (hex) of the unit name.
///
/// Derived only from the name, so every instance computes the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(String);

impl UnitId {
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Accept an id received over the wire.
    pub fn parse(raw: &str) -> Result<Self, PinError> {
        if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(PinError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors resolving a pinned unit.
#[derive(Debug, Error)]
pub enum PinError {
    #[error("Unknown location hint: {0}")]
    UnknownLocation(String),

    #[error("Invalid unit id: {0}")]
    InvalidId(String),

    #[error("Unit resolution failed: {0}")]
    Resolve(String),
}

/// A long-lived unit executing generative-AI calls in sequence.
#[async_trait]
pub trait PinnedUnit: Send + Sync {
    async fn call(&self, ctx: &AuthContext, call: GeminiCall) -> Result<UpstreamReply, ProxyError>;
}

/// Resolves a unit identity to the unit itself.
#[async_trait]
pub trait UnitNamespace: Send + Sync {
    async fn get(&self, id: &UnitId, hint: LocationHint) -> Result<Arc<dyn PinnedUnit>, PinError>;
}

/// Per-process handle on the pinned unit.
pub struct RegionPin {
    namespace: Arc<dyn UnitNamespace>,
    name: String,
    hint: LocationHint,
    bound: OnceCell<Arc<dyn PinnedUnit>>,
}

impl RegionPin {
    pub fn new(namespace: Arc<dyn UnitNamespace>, name: impl Into<String>, hint: LocationHint) -> Self {
        Self {
            namespace,
            name: name.into(),
            hint,
            bound: OnceCell::new(),
        }
    }

    pub fn unit_id(&self) -> UnitId {
        UnitId::from_name(&self.name)
    }

    pub fn location_hint(&self) -> LocationHint {
        self.hint
    }

    pub fn is_bound(&self) -> bool {
        self.bound.initialized()
    }

    /// Resolve the unit on first use; later calls return the bound unit.
    pub async fn unit(&self) -> Result<Arc<dyn PinnedUnit>, PinError> {
        let unit = self
            .bound
            .get_or_try_init(|| async {
                let id = self.unit_id();
                info!(unit = %self.name, unit_id = %id, location_hint = %self.hint, "binding pinned unit");
                self.namespace.get(&id, self.hint).await
            })
            .await?;
        Ok(Arc::clone(unit))
    }

    /// Route a generative-AI call through the pinned unit.
    pub async fn call(&self, ctx: &AuthContext, call: GeminiCall) -> Result<UpstreamReply, ProxyError> {
        let unit = self
            .unit()
            .await
            .map_err(|e| ProxyError::UnitUnavailable(e.to_string()))?;
        unit.call(ctx, call).await
    }
}
