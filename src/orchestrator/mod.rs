//! Request lifecycle: one outstanding pipeline call, observed as `RequestState`.
//!
//! Every submission bumps a generation counter and the call it spawns is
//! tagged with that generation. Resolutions carrying an older generation are
//! dropped, so state always reflects the most recently *initiated*
//! submission, whatever order the network answers in.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::error::{PipelineError, StaleResolution};
use crate::pipeline::{Pipeline, PipelineRequest, PipelineResponse};
use crate::query::Query;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Success(PipelineResponse),
    Error(String),
}

impl RequestState {
    pub fn label(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Loading => "loading",
            RequestState::Success(_) => "success",
            RequestState::Error(_) => "error",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request ready to be sent, tagged with the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub generation: Generation,
    pub request: PipelineRequest,
}

/// The outcome of one pipeline call, routed back to the orchestrator.
#[derive(Debug)]
pub struct Resolution {
    pub generation: Generation,
    pub outcome: Result<PipelineResponse, PipelineError>,
}

#[derive(Debug)]
pub struct Orchestrator {
    model: String,
    generation: Generation,
    state: watch::Sender<RequestState>,
}

impl Orchestrator {
    pub fn new(model: impl Into<String>) -> Self {
        let (state, _) = watch::channel(RequestState::Idle);
        Self { model: model.into(), generation: Generation::default(), state }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generation of the most recent submission (zero before the first one).
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    /// Start a new lifecycle: publish `Loading` and hand back the tagged request.
    ///
    /// Observers clear any displayed report and charts when they see
    /// `Loading`, so stale content never sits next to a new in-flight request.
    pub fn begin(&mut self, query: Query) -> Submission {
        self.generation = self.generation.next();
        self.transition(RequestState::Loading);
        tracing::info!(generation = self.generation.get(), query = %query, "query submitted");
        Submission {
            generation: self.generation,
            request: PipelineRequest::new(query, self.model.clone()),
        }
    }

    /// Apply a finished call. Stale generations leave state untouched.
    pub fn resolve(&mut self, resolution: Resolution) -> Result<(), StaleResolution> {
        if resolution.generation != self.generation {
            let stale = StaleResolution {
                resolved: resolution.generation.get(),
                current: self.generation.get(),
            };
            tracing::debug!(resolved = stale.resolved, current = stale.current, "dropping stale resolution");
            return Err(stale);
        }

        let next = match resolution.outcome {
            Ok(response) => {
                tracing::info!(
                    generation = self.generation.get(),
                    charts = response.chart_html_list.len(),
                    report = response.has_report(),
                    "pipeline resolved"
                );
                RequestState::Success(response)
            }
            Err(err) => {
                tracing::warn!(
                    generation = self.generation.get(),
                    kind = err.kind(),
                    error = %err,
                    "pipeline failed"
                );
                RequestState::Error(err.user_message())
            }
        };
        self.transition(next);
        Ok(())
    }

    /// `begin` plus one spawned call; the resolution comes back over `results`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<P>(
        &mut self,
        query: Query,
        pipeline: Arc<P>,
        results: mpsc::UnboundedSender<Resolution>,
    ) -> Generation
    where
        P: Pipeline + 'static,
    {
        let Submission { generation, request } = self.begin(query);
        tokio::spawn(async move {
            let outcome = pipeline.run(&request).await;
            // Receiver gone means the front end shut down; nothing to report to.
            let _ = results.send(Resolution { generation, outcome });
        });
        generation
    }

    fn transition(&self, next: RequestState) {
        self.state.send_replace(next);
    }
}
