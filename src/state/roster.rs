use super::window::MessageWindow;
use crate::types::{
    AgentDebugPayload, ChatMessage, DisconnectNotice, LifecycleEvent, ParticipantSnapshot,
    ParticipantType, RosterUpdate, SenderMetadata,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Lifecycle stop reasons that still count as an unexpected disconnect.
const FAILURE_STOP_REASONS: &[&str] = &["crash", "error"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterOutcome {
    pub notices: Vec<DisconnectNotice>,
    pub departed: Vec<String>,
    pub closed_typing_signals: usize,
}

/// Sender identity resolved for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderView {
    pub name: String,
    pub participant_type: ParticipantType,
    pub handle: Option<String>,
    pub live: bool,
}

#[derive(Debug, Clone)]
pub struct RosterTracker {
    self_id: String,
    historical: BTreeMap<String, ParticipantSnapshot>,
    current: BTreeMap<String, ParticipantSnapshot>,
    merged: Arc<BTreeMap<String, ParticipantSnapshot>>,
    expected_stops: HashSet<String>,
    suppress_disconnects: bool,
    notice_seq: u64,
}

impl RosterTracker {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            historical: BTreeMap::new(),
            current: BTreeMap::new(),
            merged: Arc::default(),
            expected_stops: HashSet::new(),
            suppress_disconnects: true,
            notice_seq: 0,
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Channel join: suppress disconnect notices until we see ourselves.
    pub fn begin_join(&mut self) {
        self.suppress_disconnects = true;
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_disconnects
    }

    pub fn current(&self) -> &BTreeMap<String, ParticipantSnapshot> {
        &self.current
    }

    pub fn historical(&self) -> &BTreeMap<String, ParticipantSnapshot> {
        &self.historical
    }

    /// Every participant ever seen, with live entries taking precedence.
    /// Rebuilt once per roster update, so handing it out is cheap.
    pub fn participants(&self) -> Arc<BTreeMap<String, ParticipantSnapshot>> {
        Arc::clone(&self.merged)
    }

    pub fn lookup(&self, participant_id: &str) -> Option<&ParticipantSnapshot> {
        self.current
            .get(participant_id)
            .or_else(|| self.historical.get(participant_id))
    }

    pub fn expects_stop(&self, handle: &str) -> bool {
        self.expected_stops.contains(handle)
    }

    /// Records lifecycle hints that arrive ahead of the roster departure.
    pub fn register_lifecycle(&mut self, payload: &AgentDebugPayload) {
        let AgentDebugPayload::Lifecycle {
            event,
            handle,
            reason,
            ..
        } = payload
        else {
            return;
        };

        let expected = match event {
            LifecycleEvent::IdleTimeout => true,
            LifecycleEvent::Stopped => !reason
                .as_deref()
                .is_some_and(|r| FAILURE_STOP_REASONS.contains(&r)),
            _ => false,
        };
        if expected {
            trace!(handle = %handle, "registered expected stop");
            self.expected_stops.insert(handle.clone());
        }
    }

    pub fn apply_update(
        &mut self,
        update: RosterUpdate,
        now_ms: i64,
        window: &mut MessageWindow,
    ) -> RosterOutcome {
        let mut outcome = RosterOutcome::default();
        let saw_self = update.participants.contains_key(&self.self_id);

        for (id, snapshot) in &update.participants {
            self.historical
                .entry(id.clone())
                .or_insert_with(|| snapshot.clone());
        }

        let departed: Vec<String> = self
            .current
            .keys()
            .filter(|id| !update.participants.contains_key(*id))
            .cloned()
            .collect();

        let mut stale_senders: BTreeSet<String> = BTreeSet::new();
        for id in &departed {
            stale_senders.insert(id.clone());
            let Some(snapshot) = self.current.get(id).cloned() else {
                continue;
            };
            if let Some(notice) = self.departure_notice(&snapshot, &update, now_ms) {
                outcome.notices.push(notice);
            }
        }

        // Same handle back under a new connection id: the old id's typing
        // signals can never complete on their own.
        for (id, snapshot) in &update.participants {
            if self.current.contains_key(id) {
                continue;
            }
            if snapshot.handle.is_empty() {
                continue;
            }
            for (old_id, old) in &self.historical {
                if old_id != id && old.handle == snapshot.handle {
                    stale_senders.insert(old_id.clone());
                }
            }
        }

        outcome.closed_typing_signals = close_typing_signals(window, &stale_senders);
        for notice in &outcome.notices {
            self.notice_seq += 1;
            let id = format!("disconnect-{}-{}", notice.participant_id, self.notice_seq);
            window.push(ChatMessage::disconnect_notice(id, notice.clone()));
        }

        if saw_self && self.suppress_disconnects {
            debug!("local identity observed in roster; disconnect notices enabled");
            self.suppress_disconnects = false;
        }

        self.current = update.participants;
        self.rebuild_merged();
        outcome.departed = departed;
        outcome
    }

    fn rebuild_merged(&mut self) {
        let mut merged = self.historical.clone();
        for (id, snapshot) in &self.current {
            merged.insert(id.clone(), snapshot.clone());
        }
        self.merged = Arc::new(merged);
    }

    fn departure_notice(
        &mut self,
        snapshot: &ParticipantSnapshot,
        update: &RosterUpdate,
        now_ms: i64,
    ) -> Option<DisconnectNotice> {
        if snapshot.participant_type.is_human() {
            return None;
        }
        // Any agent departure settles a pending expected stop for its handle.
        let expected = self.expected_stops.remove(&snapshot.handle);
        if self.suppress_disconnects {
            trace!(participant = %snapshot.id, "departure during join suppressed");
            return None;
        }
        if update
            .change
            .as_ref()
            .is_some_and(|change| change.is_graceful_leave_of(&snapshot.id))
        {
            trace!(participant = %snapshot.id, "graceful leave");
            return None;
        }
        if expected {
            debug!(handle = %snapshot.handle, "departure matched expected stop");
            return None;
        }

        info!(participant = %snapshot.id, handle = %snapshot.handle, "participant disconnected");
        Some(DisconnectNotice {
            participant_id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            handle: Some(snapshot.handle.clone()),
            participant_type: snapshot.participant_type,
            observed_at: now_ms,
        })
    }

    /// History is about to be replayed: re-arm suppression and drop every
    /// disconnect notice already shown.
    pub fn on_reconnect(&mut self, window: &mut MessageWindow) -> usize {
        self.suppress_disconnects = true;
        self.expected_stops.clear();
        let removed = window.remove_where(|m| m.disconnect.is_some());
        debug!(removed, "reconnect cleared disconnect notices");
        removed
    }

    /// Live roster data wins over the snapshot stored on the message.
    pub fn resolve_sender(&self, message: &ChatMessage) -> Option<SenderView> {
        if let Some(live) = self.current.get(&message.sender_id) {
            return Some(SenderView {
                name: live.name.clone(),
                participant_type: live.participant_type,
                handle: Some(live.handle.clone()),
                live: true,
            });
        }
        if let Some(SenderMetadata {
            name,
            participant_type,
            handle,
        }) = &message.sender_metadata
        {
            return Some(SenderView {
                name: name.clone(),
                participant_type: *participant_type,
                handle: handle.clone(),
                live: false,
            });
        }
        self.historical
            .get(&message.sender_id)
            .map(|seen| SenderView {
                name: seen.name.clone(),
                participant_type: seen.participant_type,
                handle: Some(seen.handle.clone()),
                live: false,
            })
    }
}

fn close_typing_signals(window: &mut MessageWindow, senders: &BTreeSet<String>) -> usize {
    if senders.is_empty() {
        return 0;
    }
    window.replace_where(
        |m| m.is_incomplete_typing() && senders.contains(&m.sender_id),
        |m| m.complete = true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RosterChange, CONTENT_TYPE_TYPING};

    fn agent(id: &str, handle: &str) -> ParticipantSnapshot {
        ParticipantSnapshot::new(id, handle, ParticipantType::Worker)
    }

    fn panel(id: &str) -> ParticipantSnapshot {
        ParticipantSnapshot::new(id, id, ParticipantType::Panel)
    }

    fn roster(participants: &[ParticipantSnapshot]) -> RosterUpdate {
        RosterUpdate {
            participants: participants
                .iter()
                .map(|p| (p.id.clone(), p.clone()))
                .collect(),
            change: None,
        }
    }

    fn joined(
        tracker: &mut RosterTracker,
        window: &mut MessageWindow,
        others: &[ParticipantSnapshot],
    ) {
        let mut all = vec![panel("me")];
        all.extend_from_slice(others);
        tracker.apply_update(roster(&all), 0, window);
    }

    fn stop_payload(
        event: LifecycleEvent,
        handle: &str,
        reason: Option<&str>,
    ) -> AgentDebugPayload {
        AgentDebugPayload::Lifecycle {
            event,
            agent_id: "ignored".to_string(),
            handle: handle.to_string(),
            reason: reason.map(ToString::to_string),
            details: None,
        }
    }

    #[test]
    fn test_departures_suppressed_until_self_seen() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        tracker.begin_join();

        tracker.apply_update(roster(&[agent("a1", "alpha")]), 0, &mut window);
        let outcome = tracker.apply_update(roster(&[]), 1, &mut window);
        assert_eq!(outcome.departed, vec!["a1".to_string()]);
        assert!(outcome.notices.is_empty());
        assert!(tracker.is_suppressing());

        joined(&mut tracker, &mut window, &[agent("a2", "beta")]);
        assert!(!tracker.is_suppressing());
        let outcome = tracker.apply_update(roster(&[panel("me")]), 2, &mut window);
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.notices[0].participant_id, "a2");
        assert_eq!(window.len(), 1);
        assert!(window.messages()[0].disconnect.is_some());
    }

    #[test]
    fn test_human_and_graceful_departures_are_silent() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[panel("human"), agent("a1", "alpha")]);

        let update = roster(&[panel("me"), agent("a1", "alpha")]);
        let outcome = tracker.apply_update(update, 1, &mut window);
        assert!(outcome.notices.is_empty());

        let mut leave = roster(&[panel("me")]);
        leave.change = Some(RosterChange {
            change_type: "leave".to_string(),
            participant_id: "a1".to_string(),
            leave_reason: Some("graceful".to_string()),
        });
        let outcome = tracker.apply_update(leave, 2, &mut window);
        assert!(outcome.notices.is_empty());
        assert!(window.is_empty());
    }

    #[test]
    fn test_expected_stop_is_consumed_once() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[agent("agent-7", "reviewer")]);

        tracker.register_lifecycle(&stop_payload(LifecycleEvent::IdleTimeout, "reviewer", None));
        assert!(tracker.expects_stop("reviewer"));

        let outcome = tracker.apply_update(roster(&[panel("me")]), 1, &mut window);
        assert!(outcome.notices.is_empty());
        assert!(!tracker.expects_stop("reviewer"));

        tracker.apply_update(roster(&[panel("me"), agent("agent-8", "reviewer")]), 2, &mut window);
        let outcome = tracker.apply_update(roster(&[panel("me")]), 3, &mut window);
        assert_eq!(outcome.notices.len(), 1);
    }

    #[test]
    fn test_crash_stop_is_not_expected() {
        let mut tracker = RosterTracker::new("me");
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::Stopped, "x", Some("crash")));
        assert!(!tracker.expects_stop("x"));
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::Stopped, "y", Some("user")));
        assert!(tracker.expects_stop("y"));
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::Started, "z", None));
        assert!(!tracker.expects_stop("z"));
    }

    #[test]
    fn test_reconnect_with_new_identity_closes_old_typing() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[agent("conn-1", "writer")]);
        window.push(ChatMessage::text("t1", "conn-1", "").with_content_type(CONTENT_TYPE_TYPING));

        let outcome = tracker.apply_update(
            roster(&[panel("me"), agent("conn-1", "writer"), agent("conn-2", "writer")]),
            1,
            &mut window,
        );
        assert_eq!(outcome.closed_typing_signals, 1);
        assert!(window.find("t1").unwrap().complete);
    }

    #[test]
    fn test_on_reconnect_removes_notices_and_rearms() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[agent("a1", "alpha")]);
        window.push(ChatMessage::text("m1", "a1", "hello"));
        tracker.apply_update(roster(&[panel("me")]), 1, &mut window);
        assert_eq!(window.len(), 2);

        assert_eq!(tracker.on_reconnect(&mut window), 1);
        assert!(tracker.is_suppressing());
        assert_eq!(window.len(), 1);
    }

    fn crash_after_rejoin(tracker: &mut RosterTracker, window: &mut MessageWindow) -> usize {
        joined(tracker, window, &[agent("a2", "rev")]);
        tracker
            .apply_update(roster(&[panel("me")]), 10, window)
            .notices
            .len()
    }

    #[test]
    fn test_graceful_leave_settles_expected_stop() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[agent("a1", "rev")]);
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::IdleTimeout, "rev", None));

        let mut leave = roster(&[panel("me")]);
        leave.change = Some(RosterChange {
            change_type: "leave".to_string(),
            participant_id: "a1".to_string(),
            leave_reason: Some("graceful".to_string()),
        });
        assert!(tracker.apply_update(leave, 1, &mut window).notices.is_empty());
        assert!(!tracker.expects_stop("rev"));

        assert_eq!(crash_after_rejoin(&mut tracker, &mut window), 1);
    }

    #[test]
    fn test_suppressed_departure_settles_expected_stop() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        tracker.begin_join();
        tracker.apply_update(roster(&[agent("a1", "rev")]), 0, &mut window);
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::IdleTimeout, "rev", None));

        assert!(tracker.apply_update(roster(&[]), 1, &mut window).notices.is_empty());
        assert!(tracker.is_suppressing());
        assert!(!tracker.expects_stop("rev"));

        assert_eq!(crash_after_rejoin(&mut tracker, &mut window), 1);
    }

    #[test]
    fn test_on_reconnect_forgets_expected_stops() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        joined(&mut tracker, &mut window, &[agent("a1", "rev")]);
        tracker.register_lifecycle(&stop_payload(LifecycleEvent::Stopped, "rev", Some("user")));
        assert!(tracker.expects_stop("rev"));

        tracker.on_reconnect(&mut window);
        assert!(!tracker.expects_stop("rev"));

        joined(&mut tracker, &mut window, &[agent("a1", "rev")]);
        let outcome = tracker.apply_update(roster(&[panel("me")]), 1, &mut window);
        assert_eq!(outcome.notices.len(), 1);
    }

    #[test]
    fn test_historical_entries_are_never_overwritten() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        let mut first = agent("a1", "alpha");
        first.name = "First".to_string();
        tracker.apply_update(roster(&[first]), 0, &mut window);

        let mut renamed = agent("a1", "alpha");
        renamed.name = "Renamed".to_string();
        tracker.apply_update(roster(&[renamed]), 1, &mut window);

        assert_eq!(tracker.historical()["a1"].name, "First");
        assert_eq!(tracker.participants()["a1"].name, "Renamed");
    }

    #[test]
    fn test_resolve_sender_prefers_live_roster() {
        let mut window = MessageWindow::new(50);
        let mut tracker = RosterTracker::new("me");
        let mut live = agent("a1", "alpha");
        live.name = "Live Name".to_string();
        tracker.apply_update(roster(&[live]), 0, &mut window);

        let mut message = ChatMessage::text("m1", "a1", "hi");
        message.sender_metadata = Some(SenderMetadata {
            name: "Stored Name".to_string(),
            participant_type: ParticipantType::Worker,
            handle: Some("alpha".to_string()),
        });
        let view = tracker.resolve_sender(&message).unwrap();
        assert_eq!(view.name, "Live Name");
        assert!(view.live);

        tracker.apply_update(roster(&[]), 1, &mut window);
        let view = tracker.resolve_sender(&message).unwrap();
        assert_eq!(view.name, "Stored Name");
        assert!(!view.live);
    }
}
