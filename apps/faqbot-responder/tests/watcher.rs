use std::{
	io,
	sync::{Arc, Mutex, PoisonError},
	time::Duration as StdDuration,
};

use time::{Duration, OffsetDateTime, macros::datetime};

use faqbot_config::{BacklogPolicy, SeenPolicy};
use faqbot_mail::MessageId;
use faqbot_responder::{PollReport, Poller, WatchError, WatchPolicy, WatchSession, Watcher};
use faqbot_service::{Matcher, QueryEncoder, Responder};
use faqbot_testkit::{Fault, InMemoryServer, Operation, RecordingOutbound};

const T0: OffsetDateTime = datetime!(2026-10-19 08:00:00 UTC);
const SENDER: &str = "alice@example.com";

async fn poller(outbound: &RecordingOutbound, policy: WatchPolicy) -> Poller {
	let cfg = faqbot_testkit::local_embedding_config(384);
	let provider = faqbot_service::embedding_provider(&cfg).expect("Local provider must build.");
	let encoder = QueryEncoder::new(provider, cfg);
	let index = faqbot_service::build_index(&encoder, faqbot_testkit::faq_catalog())
		.await
		.expect("Index must build.");
	let matcher = Matcher::new(encoder, index).expect("Versions must agree.");
	let responder = Responder::new(
		matcher,
		Box::new(outbound.clone()),
		faqbot_testkit::FAQ_ADDRESS,
		"Re: Your Inquiry",
	);

	Poller::new(responder, WatchSession::new(T0), policy, "INBOX")
}

async fn watcher(
	server: &InMemoryServer,
	outbound: &RecordingOutbound,
	policy: WatchPolicy,
) -> Watcher {
	Watcher::new(
		Box::new(server.clone()),
		poller(outbound, policy).await,
		StdDuration::from_millis(10),
	)
}

fn deliver(server: &InMemoryServer, at: OffsetDateTime, body: &str) -> MessageId {
	let raw =
		faqbot_testkit::raw_message(SENDER, "Question", at, body).expect("Fixture must render.");

	server.deliver(raw)
}

fn policy(seen: SeenPolicy, backlog: BacklogPolicy) -> WatchPolicy {
	WatchPolicy { seen, backlog }
}

/// Collects formatted log lines written by a scoped subscriber.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);
impl LogCapture {
	fn lines(&self) -> Vec<String> {
		let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);

		String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
	}
}
impl io::Write for LogCapture {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);

		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

#[tokio::test]
async fn answers_new_inquiry_exactly_once() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;
	let id = deliver(&server, T0 + Duration::seconds(5), "what's your return policy?");

	watcher.connect().await.expect("Connect must succeed.");

	let report = watcher.tick().await.expect("Tick must not be fatal.");

	assert_eq!(report, Some(PollReport { found: 1, answered: 1, ..Default::default() }));

	let second = watcher.tick().await.expect("Tick must not be fatal.");

	assert_eq!(second, Some(PollReport::default()));

	let delivered = outbound.delivered();

	assert_eq!(delivered.len(), 1);
	assert_eq!(delivered[0].to, SENDER);
	assert_eq!(delivered[0].from, faqbot_testkit::FAQ_ADDRESS);
	assert_eq!(delivered[0].subject, "Re: Your Inquiry");
	assert_eq!(delivered[0].body, "30-day returns");
	assert!(server.is_seen(id));
	assert_eq!(server.mark_count(id), 1);
	assert_eq!(server.selected_folders(), vec!["INBOX".to_string(), "INBOX".to_string()]);
}

#[tokio::test]
async fn message_dated_at_session_start_is_backlog() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, WatchPolicy::default()).await;
	let at_start = deliver(&server, T0, "how long does shipping take");
	let after_start = deliver(&server, T0 + Duration::seconds(1), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 2, answered: 1, backlog: 1, ..Default::default() });
	assert!(!server.is_seen(at_start));
	assert!(server.is_seen(after_start));
	assert_eq!(outbound.delivered().len(), 1);
}

#[tokio::test]
async fn messages_are_processed_in_ascending_id_order() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, WatchPolicy::default()).await;

	deliver(&server, T0 + Duration::seconds(1), "how long does shipping take");
	deliver(&server, T0 + Duration::seconds(2), "what's your return policy?");

	let mut mailbox = server.session();

	poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	let bodies: Vec<String> = outbound.delivered().into_iter().map(|email| email.body).collect();

	assert_eq!(bodies, vec!["Ships in 3 days".to_string(), "30-day returns".to_string()]);
}

#[tokio::test]
async fn always_policy_flags_failed_delivery() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::failing();
	let poller = poller(&outbound, policy(SeenPolicy::Always, BacklogPolicy::Skip)).await;
	let id = deliver(&server, T0 + Duration::seconds(5), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 1, failed: 1, ..Default::default() });
	assert!(server.is_seen(id));

	poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(outbound.attempts().len(), 1);
}

#[tokio::test]
async fn failed_delivery_is_logged_at_error_once() {
	let capture = LogCapture::default();
	let writer = capture.clone();
	let subscriber = tracing_subscriber::fmt()
		.with_ansi(false)
		.with_max_level(tracing::Level::ERROR)
		.with_writer(move || writer.clone())
		.finish();
	let _guard = tracing::subscriber::set_default(subscriber);
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::failing();
	let poller = poller(&outbound, policy(SeenPolicy::Always, BacklogPolicy::Skip)).await;

	deliver(&server, T0 + Duration::seconds(5), "how long does shipping take");

	let report = poller.poll_once(&mut server.session()).await.expect("Poll must succeed.");
	let lines = capture.lines();

	assert_eq!(report.failed, 1);
	assert_eq!(lines.len(), 1, "Unexpected error logs: {lines:?}");
	assert!(lines[0].contains("550 Mailbox unavailable"), "Unexpected error log: {}", lines[0]);
}

#[tokio::test]
async fn on_success_policy_retries_failed_delivery() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::failing();
	let poller = poller(&outbound, policy(SeenPolicy::OnSuccess, BacklogPolicy::Skip)).await;
	let id = deliver(&server, T0 + Duration::seconds(5), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 1, failed: 1, ..Default::default() });
	assert!(!server.is_seen(id));

	outbound.set_failing(false);

	let retry = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(retry, PollReport { found: 1, answered: 1, ..Default::default() });
	assert!(server.is_seen(id));
	assert_eq!(outbound.attempts().len(), 2);
	assert_eq!(outbound.delivered().len(), 1);
}

#[tokio::test]
async fn empty_body_is_flagged_under_always_policy() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, WatchPolicy::default()).await;
	let id = deliver(&server, T0 + Duration::seconds(5), "");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 1, failed: 1, ..Default::default() });
	assert!(server.is_seen(id));
	assert!(outbound.attempts().is_empty());
}

#[tokio::test]
async fn skip_policy_leaves_backlog_untouched() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, policy(SeenPolicy::Always, BacklogPolicy::Skip)).await;
	let old = deliver(&server, T0 - Duration::minutes(10), "how long does shipping take");
	let mut mailbox = server.session();

	for _ in 0..2 {
		let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

		assert_eq!(report, PollReport { found: 1, backlog: 1, ..Default::default() });
	}

	assert!(!server.is_seen(old));
	assert!(outbound.attempts().is_empty());
}

#[tokio::test]
async fn mark_seen_policy_flags_backlog_without_reply() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, policy(SeenPolicy::Always, BacklogPolicy::MarkSeen)).await;
	let old = deliver(&server, T0 - Duration::minutes(10), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 1, backlog: 1, ..Default::default() });
	assert!(server.is_seen(old));
	assert!(outbound.attempts().is_empty());
}

#[tokio::test]
async fn answer_policy_replies_to_backlog() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, policy(SeenPolicy::Always, BacklogPolicy::Answer)).await;
	let old = deliver(&server, T0 - Duration::minutes(10), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 1, answered: 1, backlog: 1, ..Default::default() });
	assert!(server.is_seen(old));
	assert_eq!(outbound.delivered()[0].body, "Ships in 3 days");
}

#[tokio::test]
async fn unparseable_message_is_left_unseen() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, WatchPolicy::default()).await;
	let broken = server.deliver(faqbot_testkit::raw_message_without_date(SENDER, "shipping?"));
	let good = deliver(&server, T0 + Duration::seconds(5), "how long does shipping take");
	let mut mailbox = server.session();
	let report = poller.poll_once(&mut mailbox).await.expect("Poll must succeed.");

	assert_eq!(report, PollReport { found: 2, answered: 1, unparseable: 1, ..Default::default() });
	assert!(!server.is_seen(broken));
	assert!(server.is_seen(good));
}

#[tokio::test]
async fn mark_failure_aborts_the_iteration() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let poller = poller(&outbound, WatchPolicy::default()).await;

	server.inject_fault(Operation::MarkSeen, Fault::Protocol);

	let first = deliver(&server, T0 + Duration::seconds(1), "how long does shipping take");
	let second = deliver(&server, T0 + Duration::seconds(2), "what's your return policy?");
	let mut mailbox = server.session();
	let err = poller.poll_once(&mut mailbox).await.expect_err("Expected mark failure.");

	assert!(!err.is_connection());
	assert!(!server.is_seen(first));
	assert_eq!(server.fetch_count(second), 0);
	assert_eq!(outbound.delivered().len(), 1);
}

#[tokio::test]
async fn rejected_credentials_are_fatal_at_startup() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	server.reject_auth(true);

	let err = watcher.connect().await.expect_err("Expected auth failure.");

	assert!(matches!(err, WatchError::Auth(_)));
	assert!(!watcher.is_connected());
}

#[tokio::test]
async fn connection_failure_is_fatal_at_startup() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	server.inject_fault(Operation::Connect, Fault::Connection);

	let err = watcher.connect().await.expect_err("Expected connect failure.");

	assert!(matches!(err, WatchError::Connect(_)));
}

#[tokio::test]
async fn transport_failure_triggers_reconnect() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	watcher.connect().await.expect("Connect must succeed.");
	server.inject_fault(Operation::Search, Fault::Connection);

	assert_eq!(watcher.tick().await.expect("Tick must not be fatal."), None);
	assert!(!watcher.is_connected());

	let id = deliver(&server, T0 + Duration::seconds(5), "what's your return policy?");
	let report = watcher.tick().await.expect("Tick must not be fatal.");

	assert_eq!(report, Some(PollReport { found: 1, answered: 1, ..Default::default() }));
	assert!(watcher.is_connected());
	assert!(server.is_seen(id));
	assert_eq!(server.connect_count(), 2);
}

#[tokio::test]
async fn protocol_failure_keeps_the_session() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	watcher.connect().await.expect("Connect must succeed.");
	server.inject_fault(Operation::Select, Fault::Protocol);

	assert_eq!(watcher.tick().await.expect("Tick must not be fatal."), None);
	assert!(watcher.is_connected());
	assert_eq!(server.connect_count(), 1);
}

#[tokio::test]
async fn failed_reconnect_is_retried() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	watcher.connect().await.expect("Connect must succeed.");
	server.inject_fault(Operation::Fetch, Fault::Connection);
	server.inject_fault(Operation::Connect, Fault::Connection);
	deliver(&server, T0 + Duration::seconds(5), "how long does shipping take");

	assert_eq!(watcher.tick().await.expect("Fetch failure must not be fatal."), None);
	assert_eq!(watcher.tick().await.expect("Reconnect failure must not be fatal."), None);
	assert!(!watcher.is_connected());

	let report = watcher.tick().await.expect("Tick must not be fatal.");

	assert_eq!(report, Some(PollReport { found: 1, answered: 1, ..Default::default() }));
}

#[tokio::test]
async fn rejected_credentials_on_reconnect_are_fatal() {
	let server = InMemoryServer::new();
	let outbound = RecordingOutbound::new();
	let mut watcher = watcher(&server, &outbound, WatchPolicy::default()).await;

	watcher.connect().await.expect("Connect must succeed.");
	server.inject_fault(Operation::Search, Fault::Connection);

	assert_eq!(watcher.tick().await.expect("Tick must not be fatal."), None);

	server.reject_auth(true);

	let err = watcher.tick().await.expect_err("Expected auth failure.");

	assert!(matches!(err, WatchError::Auth(_)));
}
