use crate::types::{
    ChannelEvent, EventBody, MessageEvent, UpdateMessageEvent, CONTENT_TYPE_TYPING,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

pub const DEFAULT_TYPING_QUIET: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingSignal {
    Started { message_id: String },
    Stopped { message_id: String },
}

impl TypingSignal {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Started { message_id } | Self::Stopped { message_id } => message_id,
        }
    }

    /// Outbound protocol form: a typing-tagged `message` to start, an
    /// `update-message` completing it to stop.
    pub fn into_event(self, sender_id: &str) -> ChannelEvent {
        let body = match self {
            Self::Started { message_id } => EventBody::Message(MessageEvent {
                id: message_id,
                sender_id: sender_id.to_string(),
                content_type: Some(CONTENT_TYPE_TYPING.to_string()),
                ..MessageEvent::default()
            }),
            Self::Stopped { message_id } => EventBody::UpdateMessage(UpdateMessageEvent {
                id: message_id,
                complete: Some(true),
                ..UpdateMessageEvent::default()
            }),
        };
        ChannelEvent::live(body)
    }
}

#[derive(Debug)]
struct ActiveTyping {
    message_id: String,
    deadline: Instant,
}

/// Idle/active debounce machine. Time is passed in so the transitions can be
/// driven without a runtime.
#[derive(Debug)]
pub struct TypingState {
    quiet: Duration,
    active: Option<ActiveTyping>,
}

impl TypingState {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_message_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.message_id.as_str())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|a| a.deadline)
    }

    pub fn on_input(&mut self, text: &str, now: Instant) -> Option<TypingSignal> {
        if text.is_empty() {
            return self.stop();
        }
        let deadline = now + self.quiet;
        match &mut self.active {
            Some(active) => {
                active.deadline = deadline;
                None
            }
            None => {
                let message_id = Uuid::new_v4().to_string();
                self.active = Some(ActiveTyping {
                    message_id: message_id.clone(),
                    deadline,
                });
                Some(TypingSignal::Started { message_id })
            }
        }
    }

    pub fn on_deadline(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.stop(),
            _ => None,
        }
    }

    pub fn stop(&mut self) -> Option<TypingSignal> {
        self.active
            .take()
            .map(|active| TypingSignal::Stopped {
                message_id: active.message_id,
            })
    }
}

/// Runs a [`TypingState`] on its own task. Input changes go in through
/// [`TypingController::input_changed`]; start/stop events come out on the
/// outbound channel handed to [`TypingController::spawn`].
pub struct TypingController {
    input_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TypingController {
    pub fn spawn(
        outbound: mpsc::UnboundedSender<ChannelEvent>,
        sender_id: impl Into<String>,
        quiet: Duration,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_typing_loop(
            TypingState::new(quiet),
            sender_id.into(),
            input_rx,
            outbound,
            cancel.clone(),
        ));
        Self {
            input_tx,
            cancel,
            task: Some(task),
        }
    }

    /// Returns false once the controller has stopped.
    pub fn input_changed(&self, text: impl Into<String>) -> bool {
        self.input_tx.send(text.into()).is_ok()
    }

    /// Cancels the debounce timer, completes any open typing signal and waits
    /// for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                debug!(%error, "typing task ended abnormally");
            }
        }
    }
}

impl Drop for TypingController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_typing_loop(
    mut state: TypingState,
    sender_id: String,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let emit = |signal: TypingSignal| {
        trace!(?signal, "typing signal");
        outbound.send(signal.into_event(&sender_id)).is_ok()
    };

    loop {
        let signal = tokio::select! {
            _ = cancel.cancelled() => {
                if let Some(signal) = state.stop() {
                    emit(signal);
                }
                break;
            }
            input = input_rx.recv() => match input {
                Some(text) => state.on_input(&text, Instant::now()),
                None => break,
            },
            _ = wait_for(state.deadline()) => state.on_deadline(Instant::now()),
        };

        if let Some(signal) = signal {
            if !emit(signal) {
                debug!("typing outbound closed");
                break;
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
