use std::{
	collections::{BTreeMap, HashMap, VecDeque},
	sync::{Arc, Mutex, MutexGuard},
};

use faqbot_mail::{BoxFuture, Error, Mailbox, MailboxConnector, MessageId, Result};

/// Mailbox operations a fault can be injected into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	Connect,
	Select,
	Search,
	Fetch,
	MarkSeen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
	/// Surfaces as [`Error::Connection`], which makes a watcher reconnect.
	Connection,
	/// Surfaces as [`Error::Protocol`].
	Protocol,
}
impl Fault {
	fn into_error(self, operation: Operation) -> Error {
		let message = format!("Injected {operation:?} fault.");

		match self {
			Self::Connection => Error::Connection { message },
			Self::Protocol => Error::Protocol { message },
		}
	}
}

struct StoredMessage {
	raw: Vec<u8>,
	seen: bool,
	marks: usize,
	fetches: usize,
}

#[derive(Default)]
struct State {
	messages: BTreeMap<MessageId, StoredMessage>,
	next_uid: u32,
	reject_auth: bool,
	connects: usize,
	selects: Vec<String>,
	faults: HashMap<Operation, VecDeque<Fault>>,
}
impl State {
	fn take_fault(&mut self, operation: Operation) -> Result<()> {
		match self.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
			Some(fault) => Err(fault.into_error(operation)),
			None => Ok(()),
		}
	}
}

/// Shared in-memory mail store. Clones observe the same messages and flags.
#[derive(Clone, Default)]
pub struct InMemoryServer {
	state: Arc<Mutex<State>>,
}
impl InMemoryServer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `raw` as a new unseen message. UIDs start at 1 and only grow.
	pub fn deliver(&self, raw: Vec<u8>) -> MessageId {
		let mut state = self.lock();

		state.next_uid += 1;

		let id = MessageId(state.next_uid);

		state.messages.insert(id, StoredMessage { raw, seen: false, marks: 0, fetches: 0 });

		id
	}

	/// Makes every following connect fail with [`Error::Auth`] while `reject` holds.
	pub fn reject_auth(&self, reject: bool) {
		self.lock().reject_auth = reject;
	}

	/// Queues a one-shot fault. Faults for one operation fire in insertion order.
	pub fn inject_fault(&self, operation: Operation, fault: Fault) {
		self.lock().faults.entry(operation).or_default().push_back(fault);
	}

	pub fn is_seen(&self, id: MessageId) -> bool {
		self.lock().messages.get(&id).is_some_and(|message| message.seen)
	}

	/// Number of seen-flag stores issued for `id`.
	pub fn mark_count(&self, id: MessageId) -> usize {
		self.lock().messages.get(&id).map_or(0, |message| message.marks)
	}

	pub fn fetch_count(&self, id: MessageId) -> usize {
		self.lock().messages.get(&id).map_or(0, |message| message.fetches)
	}

	pub fn unseen(&self) -> Vec<MessageId> {
		self.lock()
			.messages
			.iter()
			.filter(|(_, message)| !message.seen)
			.map(|(id, _)| *id)
			.collect()
	}

	pub fn connect_count(&self) -> usize {
		self.lock().connects
	}

	pub fn selected_folders(&self) -> Vec<String> {
		self.lock().selects.clone()
	}

	/// Opens a session directly, bypassing auth and connect faults.
	pub fn session(&self) -> InMemoryMailbox {
		InMemoryMailbox { state: self.state.clone(), selected: None }
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		lock(&self.state)
	}
}
impl MailboxConnector for InMemoryServer {
	fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Mailbox>>> {
		let result = {
			let mut state = self.lock();

			state.take_fault(Operation::Connect).and_then(|()| {
				if state.reject_auth {
					return Err(Error::Auth {
						message: "[AUTHENTICATIONFAILED] Invalid credentials.".to_string(),
					});
				}

				state.connects += 1;

				Ok(())
			})
		};

		Box::pin(async move {
			result?;

			Ok(Box::new(self.session()) as Box<dyn Mailbox>)
		})
	}
}

/// One session against an [`InMemoryServer`].
pub struct InMemoryMailbox {
	state: Arc<Mutex<State>>,
	selected: Option<String>,
}
impl InMemoryMailbox {
	fn require_selected(&self) -> Result<()> {
		if self.selected.is_none() {
			return Err(Error::Protocol { message: "No folder selected.".to_string() });
		}

		Ok(())
	}
}
impl Mailbox for InMemoryMailbox {
	fn select_folder<'a>(&'a mut self, name: &'a str) -> BoxFuture<'a, Result<()>> {
		let result = {
			let mut state = lock(&self.state);

			state.take_fault(Operation::Select).map(|()| state.selects.push(name.to_string()))
		};

		if result.is_ok() {
			self.selected = Some(name.to_string());
		}

		Box::pin(async move { result })
	}

	fn search_unseen(&mut self) -> BoxFuture<'_, Result<Vec<MessageId>>> {
		let result: Result<Vec<MessageId>> = self.require_selected().and_then(|()| {
			let mut state = lock(&self.state);

			state.take_fault(Operation::Search)?;

			Ok(state
				.messages
				.iter()
				.filter(|(_, message)| !message.seen)
				.map(|(id, _)| *id)
				.collect())
		});

		Box::pin(async move { result })
	}

	fn fetch(&mut self, id: MessageId) -> BoxFuture<'_, Result<Vec<u8>>> {
		let result = self.require_selected().and_then(|()| {
			let mut state = lock(&self.state);

			state.take_fault(Operation::Fetch)?;

			let message = state
				.messages
				.get_mut(&id)
				.ok_or_else(|| Error::Protocol { message: format!("No message with id {id}.") })?;

			message.fetches += 1;

			Ok(message.raw.clone())
		});

		Box::pin(async move { result })
	}

	fn mark_seen(&mut self, id: MessageId) -> BoxFuture<'_, Result<()>> {
		let result = self.require_selected().and_then(|()| {
			let mut state = lock(&self.state);

			state.take_fault(Operation::MarkSeen)?;

			let message = state
				.messages
				.get_mut(&id)
				.ok_or_else(|| Error::Protocol { message: format!("No message with id {id}.") })?;

			message.seen = true;
			message.marks += 1;

			Ok(())
		});

		Box::pin(async move { result })
	}
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
	state.lock().unwrap_or_else(|err| err.into_inner())
}
