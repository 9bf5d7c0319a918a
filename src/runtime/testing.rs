//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O. Tests run with
//! paused tokio time, so timers and reply delays elapse instantly.

use super::traits::*;
use super::{DialogueRuntime, RuntimeError};
use crate::config::Timings;
use crate::phrases::PhraseCatalog;
use crate::state_machine::{ChatEvent, InboundMessage, Session, TransitionTable};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub const TEST_CHANNEL: &str = "#chat";
pub const TEST_NICK: &str = "smalltalk-bot";

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that records outbound lines instead of sending them
pub struct MockTransport {
    nickname: String,
    roster: Mutex<Vec<String>>,
    /// (target, text) pairs that were sent successfully
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            roster: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn set_roster(&self, names: &[&str]) {
        *self.roster.lock().unwrap() = names.iter().map(ToString::to_string).collect();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Just the text of every delivered line
    pub fn lines(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }

    async fn roster(&self, _channel: &str) -> Result<Vec<String>, TransportError> {
        Ok(self.roster.lock().unwrap().clone())
    }

    fn nickname(&self) -> String {
        self.nickname.clone()
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// A running dialogue wired to a `MockTransport`
pub struct TestRuntime {
    pub transport: Arc<MockTransport>,
    pub inbound_tx: mpsc::Sender<ChatEvent>,
    pub session_rx: watch::Receiver<Session>,
    handle: JoinHandle<Result<(), RuntimeError>>,
}

impl TestRuntime {
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            roster: vec![TEST_NICK.to_string()],
            seed: 7,
            timings: Timings::default(),
        }
    }

    /// Post a channel message from `sender`
    pub async fn say(&self, sender: &str, text: &str) {
        self.inbound_tx
            .send(ChatEvent::Message(InboundMessage::new(
                sender,
                TEST_CHANNEL,
                text,
            )))
            .await
            .unwrap();
    }

    /// Report a nickname change in the channel
    pub async fn rename(&self, old: &str, new: &str) {
        self.inbound_tx
            .send(ChatEvent::Renamed {
                old: old.to_string(),
                new: new.to_string(),
            })
            .await
            .unwrap();
    }

    pub fn session(&self) -> Session {
        self.session_rx.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn finish(self) -> Result<(), RuntimeError> {
        self.handle.await.unwrap()
    }
}

pub struct TestRuntimeBuilder {
    roster: Vec<String>,
    seed: u64,
    timings: Timings,
}

impl TestRuntimeBuilder {
    /// Channel members besides the bot
    pub fn roster(mut self, names: &[&str]) -> Self {
        self.roster = names.iter().map(ToString::to_string).collect();
        self.roster.push(TEST_NICK.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn build(self) -> TestRuntime {
        let transport = Arc::new(MockTransport::new(TEST_NICK));
        let roster: Vec<&str> = self.roster.iter().map(String::as_str).collect();
        transport.set_roster(&roster);

        let (inbound_tx, inbound_rx) = mpsc::channel(32);
        let runtime = DialogueRuntime::new(
            TEST_CHANNEL,
            Arc::new(TransitionTable::standard().unwrap()),
            Arc::new(PhraseCatalog::standard()),
            self.timings,
            transport.clone(),
            Box::new(StdRng::seed_from_u64(self.seed)),
            inbound_rx,
        );
        let session_rx = runtime.subscribe();
        let handle = tokio::spawn(runtime.run());

        TestRuntime {
            transport,
            inbound_tx,
            session_rx,
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrases::FAREWELL;
    use crate::runtime::PARTICIPANTS_HEADER;
    use crate::state_machine::DialogueState;
    use std::time::Duration;

    async fn wait_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    /// Strip the "nick: " address from an outbound line
    fn addressed<'a>(line: &'a str, nick: &str) -> Option<&'a str> {
        line.strip_prefix(nick)?.strip_prefix(": ")
    }

    fn is_phrase_for(state: DialogueState, text: &str) -> bool {
        PhraseCatalog::standard()
            .candidates(state)
            .iter()
            .any(|c| c == text)
    }

    fn assert_line(line: &str, nick: &str, state: DialogueState) {
        let text = addressed(line, nick)
            .unwrap_or_else(|| panic!("{line:?} is not addressed to {nick}"));
        assert!(is_phrase_for(state, text), "{text:?} is not a {state} phrase");
    }

    #[tokio::test]
    async fn test_mock_transport_records_and_fails() {
        let transport = MockTransport::new(TEST_NICK);
        transport.send_message("#chat", "one").await.unwrap();
        transport.set_fail_sends(true);
        assert!(transport.send_message("#chat", "two").await.is_err());

        assert_eq!(transport.lines(), vec!["one".to_string()]);
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_outreach_after_idle() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        wait_secs(34).await;
        assert!(rt.transport.lines().is_empty());

        wait_secs(2).await;
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 1);
        assert_line(&lines[0], "alice", DialogueState::InitialOutreach1);
        assert_eq!(rt.transport.sent()[0].0, TEST_CHANNEL);

        let session = rt.session();
        assert_eq!(session.state, DialogueState::InitialOutreach1);
        assert_eq!(session.partner.as_deref(), Some("alice"));

        // A turn timeout was armed: silence leads to the second outreach
        wait_secs(31).await;
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 2);
        assert_line(&lines[1], "alice", DialogueState::SecondaryOutreach1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outreach_to_empty_channel_is_unaddressed() {
        let rt = TestRuntime::new().build();

        wait_secs(36).await;
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 1);
        assert!(is_phrase_for(DialogueState::InitialOutreach1, &lines[0]));
        assert_eq!(rt.session().partner, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_responder_is_bound_and_others_ignored() {
        let rt = TestRuntime::new().build();

        wait_secs(36).await;
        assert_eq!(rt.session().state, DialogueState::InitialOutreach1);

        rt.say("alice", "hello").await;
        wait_secs(4).await;

        let session = rt.session();
        assert_eq!(session.state, DialogueState::OutreachReply2);
        assert_eq!(session.partner.as_deref(), Some("alice"));
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 2);
        assert_line(&lines[1], "alice", DialogueState::OutreachReply2);

        let generation = session.generation;
        rt.say("bob", "hey, me too").await;
        wait_secs(4).await;

        let session = rt.session();
        assert_eq!(session.state, DialogueState::OutreachReply2);
        assert_eq!(session.partner.as_deref(), Some("alice"));
        assert_eq!(session.generation, generation);
        assert_eq!(rt.transport.lines().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inquiry_timeout_gives_up_and_resets() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        for text in ["hey", "hi there", "doing stuff"] {
            rt.say("alice", text).await;
            wait_secs(4).await;
        }
        assert_eq!(rt.session().state, DialogueState::Inquiry1);
        assert_eq!(rt.transport.lines().len(), 3);

        wait_secs(30).await;
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 4);
        assert_line(&lines[3], "alice", DialogueState::GiveupFrustrated1);

        let session = rt.session();
        assert_eq!(session.state, DialogueState::Start);
        assert_eq!(session.partner, None);

        // Fresh initial wait, then a brand new outreach
        wait_secs(36).await;
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 5);
        assert_line(&lines[4], "alice", DialogueState::InitialOutreach1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_conversation_closes_and_resets() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        for text in ["hey", "hi", "how are you?", "good, you?", "great"] {
            rt.say("alice", text).await;
            wait_secs(8).await;
        }

        let lines = rt.transport.lines();
        let expected = [
            DialogueState::InitialOutreach1,
            DialogueState::OutreachReply2,
            DialogueState::Inquiry1,
            DialogueState::InquiryReply2,
            DialogueState::Inquiry2,
            DialogueState::InquiryReply1,
        ];
        assert_eq!(lines.len(), expected.len());
        for (line, state) in lines.iter().zip(expected) {
            assert_line(line, "alice", state);
        }

        let session = rt.session();
        assert_eq!(session.state, DialogueState::Start);
        assert_eq!(session.partner, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_die_sends_farewell_and_stops() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        rt.say("alice", "hey").await;
        wait_secs(4).await;
        rt.say("alice", "die").await;
        wait_secs(4).await;

        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("alice: {FAREWELL}"));
        assert!(rt.is_finished());
        rt.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_resets_without_speaking() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        rt.say("alice", "hey").await;
        wait_secs(4).await;
        assert_eq!(rt.session().state, DialogueState::InitialOutreach1);

        rt.say("alice", "forget").await;
        wait_secs(4).await;

        assert_eq!(rt.transport.lines().len(), 1);
        let session = rt.session();
        assert_eq!(session.state, DialogueState::Start);
        assert_eq!(session.partner, None);

        // Anyone can now claim the conversation
        rt.say("bob", "hello?").await;
        wait_secs(4).await;
        assert_eq!(rt.session().partner.as_deref(), Some("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_participants_reports_roster() {
        let rt = TestRuntime::new().roster(&["carol", "alice"]).build();

        rt.say("alice", "participants").await;
        wait_secs(4).await;

        assert_eq!(
            rt.transport.lines(),
            vec![
                PARTICIPANTS_HEADER.to_string(),
                format!("alice, carol, {TEST_NICK}"),
            ]
        );
        assert_eq!(rt.session().state, DialogueState::Start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_still_advances_and_rearms() {
        let rt = TestRuntime::new().roster(&["alice"]).build();
        rt.transport.set_fail_sends(true);

        rt.say("alice", "hey").await;
        wait_secs(4).await;
        assert_eq!(rt.session().state, DialogueState::InitialOutreach1);
        assert_eq!(rt.transport.attempts(), 1);

        wait_secs(31).await;
        assert_eq!(rt.session().state, DialogueState::SecondaryOutreach1);
        assert_eq!(rt.transport.attempts(), 2);
        assert!(rt.transport.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_just_before_timeout_wins() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        tokio::time::sleep(Duration::from_millis(34_900)).await;
        rt.say("alice", "hey").await;
        wait_secs(5).await;

        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 1);
        assert_line(&lines[0], "alice", DialogueState::InitialOutreach1);
        assert_eq!(rt.session().state, DialogueState::InitialOutreach1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_connection_is_an_error() {
        let rt = TestRuntime::new().build();
        let TestRuntime {
            inbound_tx, handle, ..
        } = rt;

        drop(inbound_tx);
        assert!(matches!(
            handle.await.unwrap(),
            Err(RuntimeError::ConnectionLost)
        ));
    }

    #[test]
    fn test_runtime_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let (_inbound_tx, inbound_rx) = mpsc::channel(1);
        let runtime = DialogueRuntime::new(
            TEST_CHANNEL,
            Arc::new(TransitionTable::standard().unwrap()),
            Arc::new(PhraseCatalog::standard()),
            Timings::default(),
            Arc::new(MockTransport::new(TEST_NICK)),
            Box::new(StdRng::seed_from_u64(1)),
            inbound_rx,
        );
        assert_send(&runtime.run());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partner_keeps_talking_after_nick_change() {
        let rt = TestRuntime::new().roster(&["alice"]).build();

        wait_secs(36).await;
        rt.say("alice", "hi bot").await;
        wait_secs(5).await;
        assert_eq!(rt.session().state, DialogueState::OutreachReply2);

        rt.rename("alice", "Alicia").await;
        rt.say("bob", "me too").await;
        rt.say("ALICIA", "good, you?").await;
        wait_secs(10).await;

        let session = rt.session();
        assert_eq!(session.partner.as_deref(), Some("Alicia"));
        assert_eq!(session.state, DialogueState::Inquiry1);
        let lines = rt.transport.lines();
        assert_eq!(lines.len(), 3);
        assert_line(&lines[2], "Alicia", DialogueState::Inquiry1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_timings_and_seed_are_reproducible() {
        let timings = Timings {
            turn_timeout: Duration::from_secs(5),
            initial_wait: Duration::from_secs(2),
            reply_delay_min: Duration::ZERO,
            reply_delay_max: Duration::ZERO,
        };
        let build = || {
            TestRuntime::new()
                .roster(&["alice", "bob", "carol", "dave"])
                .seed(42)
                .timings(timings)
                .build()
        };
        let first = build();
        let second = build();

        wait_secs(3).await;
        assert_eq!(first.transport.lines().len(), 1);
        assert_eq!(first.transport.lines(), second.transport.lines());
        assert_eq!(first.session().partner, second.session().partner);

        // Turn timeout is 5s here, not 30s
        wait_secs(5).await;
        assert_eq!(first.transport.lines().len(), 2);
        assert_eq!(first.session().state, DialogueState::SecondaryOutreach1);
    }
}
