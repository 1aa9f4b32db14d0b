//! In-process units: one tokio task per unit id draining a bounded queue.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{LocationHint, PinError, PinnedUnit, UnitId, UnitNamespace};
use crate::models::auth::AuthContext;
use crate::upstream::{GeminiCall, ProxyDispatcher, ProxyError, ProxyRequest, UpstreamReply};

/// Pending calls a unit will buffer before callers wait for space.
const QUEUE_DEPTH: usize = 64;

struct Job {
    ctx: AuthContext,
    call: GeminiCall,
    reply: oneshot::Sender<Result<UpstreamReply, ProxyError>>,
}

/// Unit living inside this process.
pub struct LocalUnit {
    id: UnitId,
    hint: LocationHint,
    sender: mpsc::Sender<Job>,
}

impl LocalUnit {
    /// Start the unit's task. Must be called from within a tokio runtime.
    fn spawn(id: UnitId, hint: LocationHint, dispatcher: Arc<ProxyDispatcher>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let task_id = id.clone();
        tokio::spawn(async move {
            info!(unit_id = %task_id, location_hint = %hint, "pinned unit started");
            while let Some(job) = receiver.recv().await {
                let result = dispatcher
                    .forward(ProxyRequest::Gemini(job.call), &job.ctx)
                    .await;
                // The caller may have gone away.
                let _ = job.reply.send(result);
            }
            debug!(unit_id = %task_id, "pinned unit stopped");
        });
        Self { id, hint, sender }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn location_hint(&self) -> LocationHint {
        self.hint
    }
}

#[async_trait]
impl PinnedUnit for LocalUnit {
    async fn call(&self, ctx: &AuthContext, call: GeminiCall) -> Result<UpstreamReply, ProxyError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Job {
                ctx: ctx.clone(),
                call,
                reply,
            })
            .await
            .map_err(|_| ProxyError::UnitUnavailable(format!("unit {} is not running", self.id)))?;
        receiver
            .await
            .map_err(|_| ProxyError::UnitUnavailable(format!("unit {} dropped the call", self.id)))?
    }
}

/// Creates at most one [`LocalUnit`] per id.
pub struct LocalNamespace {
    dispatcher: Arc<ProxyDispatcher>,
    units: DashMap<UnitId, Arc<LocalUnit>>,
}

impl LocalNamespace {
    pub fn new(dispatcher: Arc<ProxyDispatcher>) -> Self {
        Self {
            dispatcher,
            units: DashMap::new(),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[async_trait]
impl UnitNamespace for LocalNamespace {
    async fn get(&self, id: &UnitId, hint: LocationHint) -> Result<Arc<dyn PinnedUnit>, PinError> {
        let unit = self
            .units
            .entry(id.clone())
            .or_insert_with(|| Arc::new(LocalUnit::spawn(id.clone(), hint, self.dispatcher.clone())))
            .clone();
        if unit.location_hint() != hint {
            debug!(unit_id = %id, requested = %hint, placed = %unit.location_hint(), "unit already placed elsewhere");
        }
        let unit: Arc<dyn PinnedUnit> = unit;
        Ok(unit)
    }
}
