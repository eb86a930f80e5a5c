use std::{collections::HashMap, sync::Arc};

use anomaly_core::ViewportBounds;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Duration, Instant},
};
use tracing::{Instrument, debug, info_span};

use crate::{
    debounce::TimerToken,
    fetch::AnomalySource,
    session::{RequestId, SessionCommand, SessionEvent, ViewportSession},
    surface::RenderSurface,
};

enum Control {
    Viewport(ViewportBounds),
    Settled(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to a running viewport session.
///
/// Dropping the handle tears the session down: the armed timer is cancelled
/// and outstanding fetches are abandoned.
pub struct SessionHandle<S> {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<S>,
}

impl<S: Send + 'static> SessionHandle<S> {
    /// Report a viewport change. Returns `false` once the session has ended.
    pub fn viewport_changed(&self, bounds: ViewportBounds) -> bool {
        self.control.send(Control::Viewport(bounds)).is_ok()
    }

    /// Wait until no debounce timer is armed and the latest fetch has
    /// completed.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.control.send(Control::Settled(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Tear the session down and hand back its render surface. Returns
    /// `None` if the session task panicked.
    pub async fn shutdown(self) -> Option<S> {
        let _ = self.control.send(Control::Shutdown);
        self.task.await.ok()
    }
}

/// Start a session on the current tokio runtime. The initial viewport is
/// fetched immediately; later changes go through the debouncer.
pub fn spawn_session<A, S>(
    source: Arc<A>,
    surface: S,
    debounce: Duration,
    initial: ViewportBounds,
) -> SessionHandle<S>
where
    A: AnomalySource,
    S: RenderSurface + Send + 'static,
{
    let (control, control_rx) = mpsc::unbounded_channel();
    let session = ViewportSession::new(surface, debounce);
    let span = info_span!("viewport_session");
    let task = tokio::spawn(run_session(source, session, initial, control_rx).instrument(span));
    SessionHandle { control, task }
}

struct Executor<A> {
    source: Arc<A>,
    events: mpsc::UnboundedSender<SessionEvent>,
    timers: HashMap<TimerToken, JoinHandle<()>>,
    fetches: HashMap<RequestId, JoinHandle<()>>,
}

impl<A: AnomalySource> Executor<A> {
    fn execute(&mut self, commands: Vec<SessionCommand>) {
        for command in commands {
            match command {
                SessionCommand::ArmTimer { token, deadline } => {
                    let events = self.events.clone();
                    let timer = tokio::spawn(async move {
                        tokio::time::sleep_until(deadline).await;
                        let _ = events.send(SessionEvent::TimerFired(token));
                    });
                    self.timers.insert(token, timer);
                }
                SessionCommand::CancelTimer(token) => {
                    if let Some(timer) = self.timers.remove(&token) {
                        timer.abort();
                    }
                }
                SessionCommand::IssueFetch { request_id, bounds } => {
                    let source = Arc::clone(&self.source);
                    let events = self.events.clone();
                    let fetch = tokio::spawn(async move {
                        let result = source.fetch(bounds).await;
                        let _ = events.send(SessionEvent::FetchCompleted { request_id, result });
                    });
                    self.fetches.insert(request_id, fetch);
                }
            }
        }
    }

    fn forget(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::TimerFired(token) => {
                self.timers.remove(token);
            }
            SessionEvent::FetchCompleted { request_id, .. } => {
                self.fetches.remove(request_id);
            }
            SessionEvent::ViewportChanged(_) => {}
        }
    }

    fn abort_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        for (_, fetch) in self.fetches.drain() {
            fetch.abort();
        }
    }
}

async fn run_session<A, S>(
    source: Arc<A>,
    mut session: ViewportSession<S>,
    initial: ViewportBounds,
    mut control: mpsc::UnboundedReceiver<Control>,
) -> S
where
    A: AnomalySource,
    S: RenderSurface,
{
    let (events, mut event_rx) = mpsc::unbounded_channel();
    let mut executor = Executor {
        source,
        events,
        timers: HashMap::new(),
        fetches: HashMap::new(),
    };
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

    executor.execute(session.initial_load(initial));

    loop {
        tokio::select! {
            message = control.recv() => match message {
                Some(Control::Viewport(bounds)) => {
                    let event = SessionEvent::ViewportChanged(bounds);
                    executor.execute(session.handle(Instant::now(), event));
                }
                Some(Control::Settled(waiter)) => waiters.push(waiter),
                Some(Control::Shutdown) | None => break,
            },
            Some(event) = event_rx.recv() => {
                executor.forget(&event);
                let commands = session.handle(Instant::now(), event);
                executor.execute(commands);
            }
        }

        if session.is_settled() {
            for waiter in waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    debug!("Tearing down viewport session");
    let commands = session.teardown();
    executor.execute(commands);
    executor.abort_all();
    for waiter in waiters.drain(..) {
        let _ = waiter.send(());
    }
    session.into_surface()
}
