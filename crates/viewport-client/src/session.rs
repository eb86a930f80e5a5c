//! Single-threaded viewport session.
//!
//! The session owns the debouncer, the reconciler and the render surface and
//! reacts to typed events. It never performs I/O or sleeps; instead it
//! returns [`SessionCommand`]s for its driver to execute. That keeps the
//! ordering rules testable by feeding events in any order.
//!
//! Ordering rule: every fetch is tagged with a monotonically increasing
//! [`RequestId`], and only the completion of the most recently issued
//! request may touch the surface. Anything older is a stale response and is
//! dropped without being treated as a failure.

use std::error::Error;

use anomaly_core::{Anomaly, ViewportBounds, ViewportStats};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{
    debounce::{Debouncer, TimerToken},
    fetch::FetchError,
    reconcile::MarkerReconciler,
    surface::RenderSurface,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    ViewportChanged(ViewportBounds),
    TimerFired(TimerToken),
    FetchCompleted {
        request_id: RequestId,
        result: Result<Vec<Anomaly>, FetchError>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    ArmTimer {
        token: TimerToken,
        deadline: Instant,
    },
    CancelTimer(TimerToken),
    IssueFetch {
        request_id: RequestId,
        bounds: ViewportBounds,
    },
}

pub struct ViewportSession<S> {
    debouncer: Debouncer,
    reconciler: MarkerReconciler,
    surface: S,
    viewport: Option<ViewportBounds>,
    latest_request: Option<RequestId>,
    in_flight: Option<RequestId>,
    next_request: u64,
    torn_down: bool,
}

impl<S: RenderSurface> ViewportSession<S> {
    pub fn new(surface: S, debounce: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(debounce),
            reconciler: MarkerReconciler::new(),
            surface,
            viewport: None,
            latest_request: None,
            in_flight: None,
            next_request: 0,
            torn_down: false,
        }
    }

    /// First render for a freshly created view. Fetches immediately without
    /// going through the debouncer.
    pub fn initial_load(&mut self, bounds: ViewportBounds) -> Vec<SessionCommand> {
        if self.torn_down {
            return Vec::new();
        }
        self.viewport = Some(bounds);
        vec![self.issue_fetch(bounds)]
    }

    pub fn handle(&mut self, now: Instant, event: SessionEvent) -> Vec<SessionCommand> {
        if self.torn_down {
            debug!("Ignoring {} after teardown", event_name(&event));
            return Vec::new();
        }

        match event {
            SessionEvent::ViewportChanged(bounds) => {
                self.viewport = Some(bounds);
                let arm = self.debouncer.on_change(now);
                let mut commands = Vec::with_capacity(2);
                if let Some(previous) = arm.replaces {
                    commands.push(SessionCommand::CancelTimer(previous));
                }
                commands.push(SessionCommand::ArmTimer {
                    token: arm.token,
                    deadline: arm.deadline,
                });
                commands
            }
            SessionEvent::TimerFired(token) => {
                if !self.debouncer.on_timer(token) {
                    debug!("Ignoring superseded debounce timer {token:?}");
                    return Vec::new();
                }
                match self.viewport {
                    Some(bounds) => vec![self.issue_fetch(bounds)],
                    None => Vec::new(),
                }
            }
            SessionEvent::FetchCompleted { request_id, result } => {
                self.complete(request_id, result);
                Vec::new()
            }
        }
    }

    /// Cancel any armed timer and stop accepting events. In-flight fetches
    /// are abandoned; their completions will be ignored.
    pub fn teardown(&mut self) -> Vec<SessionCommand> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.in_flight = None;
        self.debouncer
            .cancel()
            .map(SessionCommand::CancelTimer)
            .into_iter()
            .collect()
    }

    /// No timer armed and no current request outstanding.
    pub fn is_settled(&self) -> bool {
        !self.debouncer.is_pending() && self.in_flight.is_none()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn is_debounce_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.latest_request
    }

    pub fn stats(&self) -> ViewportStats {
        self.reconciler.stats()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn issue_fetch(&mut self, bounds: ViewportBounds) -> SessionCommand {
        self.next_request += 1;
        let request_id = RequestId(self.next_request);
        self.latest_request = Some(request_id);
        self.in_flight = Some(request_id);
        debug!("Issuing fetch #{} for {bounds}", request_id.0);
        SessionCommand::IssueFetch { request_id, bounds }
    }

    fn complete(&mut self, request_id: RequestId, result: Result<Vec<Anomaly>, FetchError>) {
        if self.latest_request != Some(request_id) {
            debug!(
                "Discarding stale response #{} (latest is #{})",
                request_id.0,
                self.latest_request.map_or(0, RequestId::value)
            );
            metrics::counter!("viewport_stale_responses_total").increment(1);
            return;
        }
        self.in_flight = None;

        match result {
            Ok(anomalies) => {
                let report = self.reconciler.reconcile(&mut self.surface, &anomalies);
                let stats = report.stats;
                info!(
                    "Rendered {} anomalies (high {}, medium {}, low {}) for request #{}",
                    stats.total, stats.high, stats.medium, stats.low, request_id.0
                );
                metrics::gauge!("viewport_rendered_markers").set(stats.total as f64);
            }
            Err(err) => {
                warn!(
                    "Failed to fetch anomalies ({}): {}; keeping previous markers",
                    err.kind().label(),
                    error_chain(&err)
                );
            }
        }
    }
}

fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::ViewportChanged(_) => "viewport change",
        SessionEvent::TimerFired(_) => "timer firing",
        SessionEvent::FetchCompleted { .. } => "fetch completion",
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    const D: Duration = Duration::from_millis(300);

    fn bounds(west: f64, south: f64, east: f64, north: f64) -> ViewportBounds {
        ViewportBounds::new(west, south, east, north).unwrap()
    }

    fn loop_view() -> ViewportBounds {
        bounds(-87.7, 41.85, -87.6, 41.90)
    }

    fn ohare_view() -> ViewportBounds {
        bounds(-87.95, 41.95, -87.85, 42.0)
    }

    fn loop_anomalies() -> Vec<Anomaly> {
        vec![
            Anomaly::new(-87.68, 41.86, "S Western Ave", 5),
            Anomaly::new(-87.65, 41.87, "W Roosevelt Rd", 12),
            Anomaly::new(-87.62, 41.89, "N Michigan Ave", 25),
        ]
    }

    fn ohare_anomalies() -> Vec<Anomaly> {
        vec![Anomaly::new(-87.90, 41.97, "O'Hare Access Rd", 40)]
    }

    fn issued(commands: &[SessionCommand]) -> (RequestId, ViewportBounds) {
        match commands {
            [SessionCommand::IssueFetch { request_id, bounds }] => (*request_id, *bounds),
            other => panic!("expected a single fetch, got {other:?}"),
        }
    }

    fn armed(commands: &[SessionCommand]) -> TimerToken {
        match commands.last() {
            Some(SessionCommand::ArmTimer { token, .. }) => *token,
            other => panic!("expected a timer, got {other:?}"),
        }
    }

    /// Change the viewport and let the debounce timer fire; returns the fetch.
    fn pan_to(
        session: &mut ViewportSession<MemorySurface>,
        now: Instant,
        view: ViewportBounds,
    ) -> (RequestId, ViewportBounds) {
        let token = armed(&session.handle(now, SessionEvent::ViewportChanged(view)));
        issued(&session.handle(now + D, SessionEvent::TimerFired(token)))
    }

    #[test]
    fn initial_load_bypasses_debouncer() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let (_, requested) = issued(&session.initial_load(loop_view()));
        assert_eq!(requested, loop_view());
        assert!(!session.is_debounce_pending());
        assert!(!session.is_settled());
    }

    #[test]
    fn change_arms_and_reset_cancels_previous_timer() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let t0 = Instant::now();
        let first = session.handle(t0, SessionEvent::ViewportChanged(loop_view()));
        assert!(matches!(
            first.as_slice(),
            [SessionCommand::ArmTimer { deadline, .. }] if *deadline == t0 + D
        ));
        let first_token = armed(&first);

        let later = t0 + Duration::from_millis(250);
        let second = session.handle(later, SessionEvent::ViewportChanged(ohare_view()));
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], SessionCommand::CancelTimer(first_token));
        assert!(matches!(
            second[1],
            SessionCommand::ArmTimer { deadline, .. } if deadline == later + D
        ));

        assert!(
            session
                .handle(t0 + D, SessionEvent::TimerFired(first_token))
                .is_empty()
        );
        let fired = session.handle(later + D, SessionEvent::TimerFired(armed(&second)));
        let (_, requested) = issued(&fired);
        assert_eq!(requested, ohare_view());
    }

    #[test]
    fn completion_renders_markers_and_stats() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let (request_id, _) = issued(&session.initial_load(loop_view()));
        session.handle(
            Instant::now(),
            SessionEvent::FetchCompleted {
                request_id,
                result: Ok(loop_anomalies()),
            },
        );
        let stats = session.stats();
        assert_eq!(
            stats,
            ViewportStats {
                total: 3,
                high: 1,
                medium: 1,
                low: 1,
            }
        );
        assert_eq!(session.surface().markers().len(), stats.total);
        assert!(session.is_settled());
    }

    #[test]
    fn late_response_for_older_request_is_discarded() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let t0 = Instant::now();
        let (request_a, _) = pan_to(&mut session, t0, loop_view());
        let later = t0 + Duration::from_millis(400);
        let (request_b, view_b) = pan_to(&mut session, later, ohare_view());
        assert!(request_b > request_a);
        assert_eq!(view_b, ohare_view());

        session.handle(
            t0 + Duration::from_millis(750),
            SessionEvent::FetchCompleted {
                request_id: request_b,
                result: Ok(ohare_anomalies()),
            },
        );
        session.handle(
            t0 + Duration::from_millis(900),
            SessionEvent::FetchCompleted {
                request_id: request_a,
                result: Ok(loop_anomalies()),
            },
        );

        let markers = session.surface().markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].label, "O'Hare Access Rd (40)");
        assert_eq!(session.stats().total, 1);
        assert_eq!(session.surface().renders(), 1);
    }

    #[test]
    fn older_response_arriving_first_is_also_discarded() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let t0 = Instant::now();
        let (request_a, _) = pan_to(&mut session, t0, loop_view());
        let later = t0 + Duration::from_millis(400);
        let (request_b, _) = pan_to(&mut session, later, ohare_view());

        session.handle(
            t0 + Duration::from_millis(710),
            SessionEvent::FetchCompleted {
                request_id: request_a,
                result: Ok(loop_anomalies()),
            },
        );
        assert_eq!(session.surface().stats(), None);
        assert!(!session.is_settled());

        session.handle(
            t0 + Duration::from_millis(720),
            SessionEvent::FetchCompleted {
                request_id: request_b,
                result: Ok(ohare_anomalies()),
            },
        );
        assert_eq!(session.stats().total, 1);
        assert!(session.is_settled());
    }

    #[test]
    fn failure_keeps_previous_render_and_leaves_debouncer_idle() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let (initial, _) = issued(&session.initial_load(loop_view()));
        session.handle(
            Instant::now(),
            SessionEvent::FetchCompleted {
                request_id: initial,
                result: Ok(loop_anomalies()),
            },
        );

        let (request_id, _) = pan_to(&mut session, Instant::now(), ohare_view());
        session.handle(
            Instant::now(),
            SessionEvent::FetchCompleted {
                request_id,
                result: Err(FetchError::Status {
                    url: "http://localhost:3001/api/anomalies".into(),
                    status: 503,
                    message: "Server error (cluster0 timed out)".into(),
                }),
            },
        );

        assert_eq!(session.surface().markers().len(), 3);
        assert_eq!(session.stats().total, 3);
        assert!(session.is_settled());
        assert!(!session.is_debounce_pending());
    }

    #[test]
    fn teardown_cancels_timer_and_ignores_later_events() {
        let mut session = ViewportSession::new(MemorySurface::new(), D);
        let t0 = Instant::now();
        let (initial, _) = issued(&session.initial_load(loop_view()));
        let token = armed(&session.handle(t0, SessionEvent::ViewportChanged(ohare_view())));

        assert_eq!(session.teardown(), vec![SessionCommand::CancelTimer(token)]);
        assert!(session.is_torn_down());
        assert!(
            session
                .handle(t0 + D, SessionEvent::TimerFired(token))
                .is_empty()
        );
        session.handle(
            t0 + D,
            SessionEvent::FetchCompleted {
                request_id: initial,
                result: Ok(loop_anomalies()),
            },
        );
        assert!(session.surface().markers().is_empty());
        assert!(session.teardown().is_empty());
    }
}
