//! Two-party world - drives real engines over an unreliable channel.
//!
//! Messages travel through per-recipient in-flight queues. Delivery picks an
//! arbitrary queued message, so operation sequences explore reordering,
//! delayed delivery across epochs, and replays.

use ratchet_core::{
    Conversation, ConversationId, Environment, LocalDatasource, MemoryStorage, MessageHeader,
    RatchetEngine, RatchetError,
};
use ratchet_crypto::{
    MessageKey, NONCE_SIZE, SealedMessage, SharedSecret, X25519KeyRepository, open_message,
    seal_message,
};

use super::operation::{Operation, Outcome, PartyId, SkipReason, SmallMessage};
use crate::{
    invariants::{DeliveryRecord, PartySnapshot, ReplayRecord, WorldSnapshot},
    seeded_env::SeededEnv,
};

/// Engine type used by every simulated party.
pub type PartyEngine = RatchetEngine<MemoryStorage, X25519KeyRepository, SeededEnv>;

/// One side of the conversation.
pub struct Party {
    id: PartyId,
    engine: PartyEngine,
    conversation_id: ConversationId,
}

impl Party {
    /// Which party this is.
    pub fn id(&self) -> PartyId {
        self.id
    }

    /// The party's engine.
    pub fn engine(&self) -> &PartyEngine {
        &self.engine
    }

    /// The party's conversation id.
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Current stored snapshot. `None` if storage lost it.
    pub fn conversation(&self) -> Option<Conversation> {
        self.engine.datasource().get_conversation(self.conversation_id).ok().flatten()
    }

    /// Highest peer message number processed so far.
    pub fn received_last(&self) -> Option<u32> {
        self.conversation().and_then(|c| c.received_last_message_number())
    }

    /// True if the party has a sending chain.
    pub fn is_ready_for_sending(&self) -> bool {
        self.conversation().is_some_and(|c| c.is_ready_for_sending())
    }

    /// Skipped keys cached for this party.
    pub fn cached_keys(&self) -> usize {
        self.engine.datasource().message_key_count()
    }
}

/// A sealed message on its way to the peer.
struct InFlight {
    header: MessageHeader,
    sealed: SealedMessage,
    expected_key: MessageKey,
    plaintext: Vec<u8>,
}

/// Alice and Bob with real engines and a shared, seeded environment.
///
/// Alice invites and Bob accepts, so Bob can send first and Alice can send
/// once she has received.
pub struct TwoPartyWorld {
    env: SeededEnv,
    parties: [Party; 2],
    in_flight: [Vec<InFlight>; 2],
    delivered: [Vec<MessageHeader>; 2],
    history: WorldSnapshot,
}

impl TwoPartyWorld {
    /// Run the handshake with everything derived from `seed`.
    ///
    /// # Errors
    ///
    /// Propagates engine errors from the handshake.
    pub fn new(seed: u64) -> Result<Self, RatchetError> {
        let env = SeededEnv::with_seed(seed);
        let salt = SharedSecret::from_slice(&env.seed_bytes());

        let alice_engine = RatchetEngine::new(
            MemoryStorage::new(),
            X25519KeyRepository::from_seed(env.seed_bytes()),
            env.clone(),
        );
        let bob_engine = RatchetEngine::new(
            MemoryStorage::new(),
            X25519KeyRepository::from_seed(env.seed_bytes()),
            env.clone(),
        );

        let invitation = alice_engine.create_invitation(&salt, None)?;
        let bob_id = bob_engine.create_new_conversation_from_invitation(
            &invitation.public_key,
            &salt,
            None,
        )?;

        tracing::debug!(seed, alice = %invitation.conversation_id, bob = %bob_id, "world ready");

        let parties = [
            Party {
                id: PartyId::Alice,
                engine: alice_engine,
                conversation_id: invitation.conversation_id,
            },
            Party { id: PartyId::Bob, engine: bob_engine, conversation_id: bob_id },
        ];

        let mut history = WorldSnapshot::empty();
        history.parties = [PartyId::Alice, PartyId::Bob].map(PartySnapshot::new).to_vec();

        let mut world = Self {
            env,
            parties,
            in_flight: [Vec::new(), Vec::new()],
            delivered: [Vec::new(), Vec::new()],
            history,
        };
        world.record_counters();
        Ok(world)
    }

    /// A party.
    pub fn party(&self, id: PartyId) -> &Party {
        &self.parties[id.index()]
    }

    /// Messages queued for `to`.
    pub fn in_flight(&self, to: PartyId) -> usize {
        self.in_flight[to.index()].len()
    }

    /// Apply an operation and return what happened.
    pub fn apply(&mut self, op: &Operation) -> Outcome {
        tracing::trace!(?op, "apply");

        let outcome = match *op {
            Operation::Send { from, content } => self.send(from, content),
            Operation::Deliver { to, pick } => self.deliver(to, pick),
            Operation::Replay { to } => self.replay(to),
        };

        self.record_counters();
        outcome
    }

    /// Deliver every in-flight message in a seeded random order.
    pub fn deliver_all(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(to) =
            [PartyId::Alice, PartyId::Bob].into_iter().find(|p| self.in_flight(*p) > 0)
        {
            let pick = self.env.random_u128() as u8;
            outcomes.push(self.apply(&Operation::Deliver { to, pick }));
        }
        outcomes
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut snapshot = self.history.clone();
        for party in &self.parties {
            let entry = &mut snapshot.parties[party.id.index()];
            entry.cached_keys = party.cached_keys();
            entry.in_flight = self.in_flight(party.id);
        }
        snapshot
    }

    fn send(&mut self, from: PartyId, content: SmallMessage) -> Outcome {
        let sender = &self.parties[from.index()];
        if !sender.is_ready_for_sending() {
            return Outcome::Skipped(SkipReason::NotReadyToSend);
        }

        let data = match sender.engine.get_send_data(sender.conversation_id) {
            Ok(data) => data,
            Err(e) => return self.fail(format!("{} send: {e}", from.name())),
        };

        let plaintext = content.to_bytes();
        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);
        let sealed = match seal_message(
            &plaintext,
            &data.message_key,
            &data.message_header.associated_data(),
            nonce,
        ) {
            Ok(sealed) => sealed,
            Err(e) => return self.fail(format!("{} seal: {e}", from.name())),
        };

        let message_number = data.message_header.message_number;
        self.in_flight[from.peer().index()].push(InFlight {
            header: data.message_header,
            sealed,
            expected_key: data.message_key,
            plaintext,
        });

        Outcome::Sent { from, message_number }
    }

    fn deliver(&mut self, to: PartyId, pick: u8) -> Outcome {
        let queue = &mut self.in_flight[to.index()];
        if queue.is_empty() {
            return Outcome::Skipped(SkipReason::NothingInFlight);
        }
        let message = queue.remove(usize::from(pick) % queue.len());
        let message_number = message.header.message_number;

        let receiver = &self.parties[to.index()];
        let key = match receiver.engine.get_receive_key(&message.header, receiver.conversation_id) {
            Ok(key) => key,
            Err(e) => {
                return self.fail(format!("{} receive {message_number}: {e}", to.name()));
            },
        };

        let associated_data = message.header.associated_data();
        let plaintext_matches = open_message(&message.sealed, &key, &associated_data)
            .is_ok_and(|plaintext| plaintext == message.plaintext);

        self.history.deliveries.push(DeliveryRecord {
            to,
            message_number,
            keys_match: key == message.expected_key,
            plaintext_matches,
        });
        self.delivered[to.index()].push(message.header);

        Outcome::Delivered { to, message_number }
    }

    fn replay(&mut self, to: PartyId) -> Outcome {
        let Some(header) = self.delivered[to.index()].last().cloned() else {
            return Outcome::Skipped(SkipReason::NothingDelivered);
        };

        let receiver = &self.parties[to.index()];
        let result = receiver.engine.get_receive_key(&header, receiver.conversation_id);
        let rejected = matches!(result, Err(RatchetError::MessageKeyNotFound { .. }));

        let message_number = header.message_number;
        self.history.replays.push(ReplayRecord { to, message_number, rejected });

        if rejected {
            Outcome::ReplayRejected { to, message_number }
        } else {
            Outcome::Failed(format!("{} replay {message_number}: {result:?}", to.name()))
        }
    }

    fn fail(&mut self, context: String) -> Outcome {
        tracing::warn!(%context, "engine failure");
        self.history.failures.push(context.clone());
        Outcome::Failed(context)
    }

    fn record_counters(&mut self) {
        for party in &self.parties {
            let entry = &mut self.history.parties[party.id.index()];
            entry.received_last_history.push(party.received_last());
        }
    }
}
