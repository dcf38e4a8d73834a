use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::info;
use waypoint_core::{Language, PlanRequest, Route};
use waypoint_storage::{Tour, TourRepository};

use crate::{RoutePlanner, RouteSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Input,
    Loading,
    Result,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Input => "input",
            Self::Loading => "loading",
            Self::Result => "result",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is in the {phase} phase")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("this route has already been accepted")]
    AlreadyAccepted,
}

#[derive(Debug)]
enum SessionState {
    Input {
        validation_message: Option<&'static str>,
    },
    Loading,
    Result {
        request: PlanRequest,
        route: Route,
        notice: Option<&'static str>,
        accepted: bool,
    },
}

/// Holds the session in `Loading` while a plan is in flight. Dropped without
/// settling (the submit future was cancelled), it puts the session back in `Input`.
struct LoadingGuard<'a> {
    state: &'a mut SessionState,
}

impl<'a> LoadingGuard<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Loading;
        Self { state }
    }

    fn settle(mut self, next: SessionState) {
        *self.state = next;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Loading) {
            *self.state = SessionState::Input {
                validation_message: None,
            };
        }
    }
}

/// One traveller's trip through input, loading and result.
pub struct PlanningSession {
    planner: Arc<RoutePlanner>,
    state: SessionState,
}

impl PlanningSession {
    pub fn new(planner: Arc<RoutePlanner>) -> Self {
        Self {
            planner,
            state: SessionState::Input {
                validation_message: None,
            },
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Input { .. } => SessionPhase::Input,
            SessionState::Loading => SessionPhase::Loading,
            SessionState::Result { .. } => SessionPhase::Result,
        }
    }

    pub fn validation_message(&self) -> Option<&'static str> {
        match self.state {
            SessionState::Input { validation_message } => validation_message,
            _ => None,
        }
    }

    pub fn route(&self) -> Option<&Route> {
        match &self.state {
            SessionState::Result { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&'static str> {
        match self.state {
            SessionState::Result { notice, .. } => notice,
            _ => None,
        }
    }

    /// Invalid requests keep the session in `Input` with a localized message and
    /// are not an error. Every valid request ends in `Result`.
    pub async fn submit(&mut self, req: PlanRequest) -> Result<SessionPhase, SessionError> {
        if !matches!(self.state, SessionState::Input { .. }) {
            return Err(SessionError::InvalidTransition {
                action: "submit",
                phase: self.phase(),
            });
        }

        if let Err(err) = req.validate() {
            self.state = SessionState::Input {
                validation_message: Some(err.user_message(req.language)),
            };
            return Ok(SessionPhase::Input);
        }

        let planner = Arc::clone(&self.planner);
        let loading = LoadingGuard::enter(&mut self.state);
        let (route, source) = match planner.plan_with_source(&req).await {
            Ok(planned) => planned,
            Err(err) => {
                loading.settle(SessionState::Input {
                    validation_message: Some(err.user_message(req.language)),
                });
                return Ok(SessionPhase::Input);
            }
        };

        let notice = match source {
            RouteSource::Model => None,
            RouteSource::Fallback(_) => Some(fallback_notice(req.language)),
        };
        loading.settle(SessionState::Result {
            request: req,
            route,
            notice,
            accepted: false,
        });
        Ok(SessionPhase::Result)
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Result { .. }) {
            return Err(SessionError::InvalidTransition {
                action: "reset",
                phase: self.phase(),
            });
        }
        self.state = SessionState::Input {
            validation_message: None,
        };
        Ok(())
    }

    /// Hands the shown route to the booking store. Allowed once per result.
    pub async fn accept<R: TourRepository>(&mut self, repo: &R) -> Result<Tour> {
        let phase = self.phase();
        let SessionState::Result {
            request,
            route,
            accepted,
            ..
        } = &mut self.state
        else {
            return Err(SessionError::InvalidTransition {
                action: "accept",
                phase,
            }
            .into());
        };
        if *accepted {
            return Err(SessionError::AlreadyAccepted.into());
        }

        let tour = Tour::accepted(
            request.origin_hub,
            request.language,
            request.travel_date,
            route.clone(),
        );
        repo.save(&tour).await.context("failed to save accepted tour")?;
        *accepted = true;

        info!(tour_id = %tour.id, hub = %tour.origin_hub, "tour accepted");
        Ok(tour)
    }
}

pub fn fallback_notice(language: Language) -> &'static str {
    match language {
        Language::En => "Still searching... showing the best available route for now.",
        Language::Ru => "Ещё ищем... пока показываем лучший доступный маршрут.",
    }
}
