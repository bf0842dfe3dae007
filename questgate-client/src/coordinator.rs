//! Per-service single-flight refresh coordination.
//!
//! Each service gets a lane: a spawned actor task owning that service's
//! refresh state. The in-progress flag is the presence of the in-flight
//! refresh future; the queue holds the parked callers. Because the actor
//! processes one message at a time, draining the queue and clearing the
//! flag are a single atomic step from every caller's perspective: an
//! admission processed after a drain starts a new cycle, never joins the
//! one being drained.
//!
//! Invariants:
//! - At most one refresh call per service is in flight at any time.
//! - A caller admitted while a refresh is in flight is queued, and never
//!   starts a second refresh.
//! - Queued callers are drained in strict FIFO order and each receives
//!   exactly one outcome, uniform across the queue.
//! - Lanes are fully independent across services.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use questgate_core::ServiceId;

use crate::refresh::{RefreshFailure, RefreshTokens};
use crate::response::ErrorCode;

/// Decision for a caller asking to proceed with an authenticated call.
#[derive(Debug)]
pub(crate) enum Admission {
    /// The token looks fresh and no refresh is in flight; go ahead with the
    /// caller's current token.
    Proceed,

    /// A refresh settled successfully; replay with this access token.
    TokenReady(String),

    /// The refresh cycle failed; every caller in the queue gets the same
    /// failure.
    TokenFailed { code: String, message: String },
}

enum LaneMsg {
    Admit {
        expired: bool,
        reply: oneshot::Sender<Admission>,
    },
}

/// Single-flight refresh coordinator, one lane per service.
pub(crate) struct RefreshCoordinator {
    refresher: Arc<dyn RefreshTokens>,
    lanes: Mutex<HashMap<ServiceId, mpsc::UnboundedSender<LaneMsg>>>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn RefreshTokens>) -> Self {
        Self {
            refresher,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Ask the service's lane whether the call may proceed with its current
    /// token, or park until the in-flight refresh settles.
    ///
    /// `expired = true` forces parking (and starts a refresh if none is in
    /// flight); used both for proactively-expired tokens and for 401s.
    pub async fn admit(&self, service: ServiceId, expired: bool) -> Admission {
        let (reply_tx, reply_rx) = oneshot::channel();
        let lane = self.lane(service);
        if lane
            .send(LaneMsg::Admit {
                expired,
                reply: reply_tx,
            })
            .is_err()
        {
            return coordinator_unavailable();
        }
        reply_rx.await.unwrap_or_else(|_| coordinator_unavailable())
    }

    fn lane(&self, service: ServiceId) -> mpsc::UnboundedSender<LaneMsg> {
        let mut lanes = self.lanes.lock();
        lanes
            .entry(service)
            .or_insert_with(|| spawn_lane(service, Arc::clone(&self.refresher)))
            .clone()
    }
}

fn coordinator_unavailable() -> Admission {
    Admission::TokenFailed {
        code: ErrorCode::TokenRefreshFailed.as_str().to_string(),
        message: "Refresh coordinator unavailable".to_string(),
    }
}

type RefreshFuture = Pin<Box<dyn Future<Output = Result<String, RefreshFailure>> + Send>>;

/// Resolves to the in-flight refresh outcome; pends forever when there is
/// none. Only polled under the select guard.
async fn settle(inflight: &mut Option<RefreshFuture>) -> Result<String, RefreshFailure> {
    match inflight.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

fn spawn_lane(service: ServiceId, refresher: Arc<dyn RefreshTokens>) -> mpsc::UnboundedSender<LaneMsg> {
    let (tx, mut rx) = mpsc::unbounded_channel::<LaneMsg>();

    tokio::spawn(async move {
        let mut queue: VecDeque<oneshot::Sender<Admission>> = VecDeque::new();
        let mut inflight: Option<RefreshFuture> = None;

        loop {
            tokio::select! {
                // Admissions already received when a refresh settles join
                // that cycle; the message queue is drained first.
                biased;

                msg = rx.recv() => {
                    let Some(LaneMsg::Admit { expired, reply }) = msg else {
                        break;
                    };

                    if !expired && inflight.is_none() {
                        let _ = reply.send(Admission::Proceed);
                        continue;
                    }

                    queue.push_back(reply);
                    if inflight.is_none() {
                        debug!(service = %service, "starting token refresh");
                        let refresher = Arc::clone(&refresher);
                        inflight = Some(Box::pin(async move {
                            refresher.refresh(service).await
                        }));
                    }
                }

                outcome = settle(&mut inflight), if inflight.is_some() => {
                    inflight = None;
                    match outcome {
                        Ok(token) => {
                            info!(service = %service, waiters = queue.len(), "refresh settled, draining queue");
                            for reply in queue.drain(..) {
                                let _ = reply.send(Admission::TokenReady(token.clone()));
                            }
                        }
                        Err(failure) => {
                            warn!(
                                service = %service,
                                waiters = queue.len(),
                                code = %failure.code,
                                "refresh failed, draining queue"
                            );
                            for reply in queue.drain(..) {
                                let _ = reply.send(Admission::TokenFailed {
                                    code: failure.code.clone(),
                                    message: failure.message.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
    });

    tx
}
