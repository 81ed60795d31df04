//! Ratchet engine.
//!
//! Every operation loads one conversation snapshot, transforms it and writes
//! it back. The engine keeps no state between calls.
//!
//! # Receiving
//!
//! ```text
//! header.message_number <= received_last ──► pop cached key (once)
//!
//! otherwise, for n in received_last+1 ..= header.message_number:
//!     n == epoch start ──► DH step: new root, new receive chain,
//!                          roll own key pair and sending chain
//!     else             ──► chain step on the receive chain
//!     n <  header      ──► cache key under "{id} - {n}", checkpoint
//!     n == header      ──► checkpoint, return key
//! ```
//!
//! A skipped key is cached before the checkpoint that moves past it. If a
//! write fails in between, the retry re-derives the same key from the last
//! checkpoint and overwrites the cache entry, so no key is lost.

use ratchet_crypto::{KeyRepository, MessageKey, PublicKey, RootKey, SharedSecret};

use crate::{
    config::EngineConfig,
    conversation::{Conversation, ConversationId, EpochKeys},
    env::Environment,
    error::RatchetError,
    header::{InvitationData, MessageHeader, SendMessageData},
    storage::LocalDatasource,
};

/// Cache id of a skipped message key.
///
/// Format: `"{conversationId} - {messageNumber}"`.
pub fn message_key_id(conversation_id: ConversationId, message_number: u32) -> String {
    format!("{conversation_id} - {message_number}")
}

/// Double Ratchet engine over a datasource, a key repository and an
/// environment.
///
/// # Concurrency
///
/// At most one call per conversation may be in flight. Calls on different
/// conversations may run in parallel. See [`crate::ConversationLocks`].
pub struct RatchetEngine<D, K, E> {
    datasource: D,
    key_repository: K,
    env: E,
    config: EngineConfig,
}

impl<D, K, E> RatchetEngine<D, K, E>
where
    D: LocalDatasource,
    K: KeyRepository,
    E: Environment,
{
    /// Engine with the default configuration.
    pub fn new(datasource: D, key_repository: K, env: E) -> Self {
        Self::with_config(datasource, key_repository, env, EngineConfig::default())
    }

    /// Engine with an explicit configuration.
    pub fn with_config(datasource: D, key_repository: K, env: E, config: EngineConfig) -> Self {
        Self { datasource, key_repository, env, config }
    }

    /// Storage provider.
    pub fn datasource(&self) -> &D {
        &self.datasource
    }

    /// Crypto provider.
    pub fn key_repository(&self) -> &K {
        &self.key_repository
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a conversation as the inviter, seeded with a shared salt.
    ///
    /// The returned public key goes to the peer out of band, together with
    /// the salt. The conversation cannot send until the peer's first message
    /// has been received.
    ///
    /// # Errors
    ///
    /// - `InvalidSaltSize` if the salt length differs from the root key size
    /// - `ConversationAlreadySetup` if `conversation_id` is already in use
    pub fn create_invitation(
        &self,
        shared_salt: &SharedSecret,
        conversation_id: Option<ConversationId>,
    ) -> Result<InvitationData, RatchetError> {
        self.check_salt(shared_salt)?;
        let id = self.claim_id(conversation_id)?;

        let key_pair = self.key_repository.generate_key_pair()?;
        let public_key = key_pair.public_key.clone();
        let conversation = Conversation::awaiting_first_receive(
            id,
            key_pair,
            RootKey::from_shared_salt(shared_salt),
        );
        self.datasource.save_or_update_conversation(&conversation)?;

        tracing::debug!(
            conversation_id = %id,
            phase = conversation.state().name(),
            "created invitation"
        );

        Ok(InvitationData { conversation_id: id, public_key })
    }

    /// Start a conversation as the inviter without knowing the salt yet.
    ///
    /// The salt is supplied later to [`Self::get_first_receive_key`].
    pub fn create_invitation_without_salt(
        &self,
        conversation_id: Option<ConversationId>,
    ) -> Result<InvitationData, RatchetError> {
        let id = self.claim_id(conversation_id)?;

        let key_pair = self.key_repository.generate_key_pair()?;
        let public_key = key_pair.public_key.clone();
        let conversation = Conversation::invited(id, key_pair);
        self.datasource.save_or_update_conversation(&conversation)?;

        tracing::debug!(
            conversation_id = %id,
            phase = conversation.state().name(),
            "created invitation"
        );

        Ok(InvitationData { conversation_id: id, public_key })
    }

    /// Accept an invitation. The new conversation can send immediately.
    ///
    /// # Errors
    ///
    /// - `InvalidSaltSize` if the salt length differs from the root key size
    /// - `ConversationAlreadySetup` if `conversation_id` is already in use
    /// - `Crypto` if the contact public key is malformed
    pub fn create_new_conversation_from_invitation(
        &self,
        contact_public_key: &PublicKey,
        shared_salt: &SharedSecret,
        conversation_id: Option<ConversationId>,
    ) -> Result<ConversationId, RatchetError> {
        self.check_salt(shared_salt)?;
        let id = self.claim_id(conversation_id)?;

        let key_pair = self.key_repository.generate_key_pair()?;
        let shared_secret = self
            .key_repository
            .create_diffie_hellman_shared_secret(contact_public_key, &key_pair.private_key)?;
        let (root_key, sending_chain_key) = self
            .key_repository
            .derive_root_keys(&RootKey::from_shared_salt(shared_salt), &shared_secret)?;
        drop(shared_secret);

        let conversation = Conversation::accepted(id, key_pair, root_key, sending_chain_key);
        self.datasource.save_or_update_conversation(&conversation)?;

        tracing::debug!(
            conversation_id = %id,
            phase = conversation.state().name(),
            "accepted invitation"
        );

        Ok(id)
    }

    /// Derive the key and header for the next outgoing message.
    ///
    /// Always a plain chain step. Key pair rotation happens on receive.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation does not exist
    /// - `ConversationNotSetup` if there is no sending chain yet
    pub fn get_send_data(
        &self,
        conversation_id: ConversationId,
    ) -> Result<SendMessageData, RatchetError> {
        let conversation = self.load(conversation_id)?;
        let Some(sending_chain_key) = conversation.sending_chain_key() else {
            return Err(RatchetError::ConversationNotSetup { id: conversation_id });
        };

        let (next_chain_key, message_key) =
            self.key_repository.derive_chain_keys(sending_chain_key)?;
        let message_header = MessageHeader {
            message_number: conversation.next_message_number(),
            sequence_number: conversation.next_sequence_number(),
            public_key: conversation.personal_key_pair().public_key.clone(),
        };

        let next = conversation.advance_sending(next_chain_key)?;
        self.datasource.save_or_update_conversation(&next)?;

        tracing::trace!(
            conversation_id = %conversation_id,
            message_number = message_header.message_number,
            sequence_number = message_header.sequence_number,
            "derived send key"
        );

        Ok(SendMessageData { message_header, message_key })
    }

    /// Resolve the key for a received message.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation does not exist
    /// - `ConversationNotSetup` if there is no root key, or the header needs a
    ///   receive chain that does not exist
    /// - `MessageKeyNotFound` if the message was already decrypted or its key
    ///   is missing from the cache
    /// - `TooManySkippedMessages` or `InvalidHeader` for headers the state
    ///   cannot follow; nothing is persisted in that case
    pub fn get_receive_key(
        &self,
        message_header: &MessageHeader,
        conversation_id: ConversationId,
    ) -> Result<MessageKey, RatchetError> {
        let conversation = self.load(conversation_id)?;
        if conversation.root_key().is_none() {
            return Err(RatchetError::ConversationNotSetup { id: conversation_id });
        }

        if let Some(last) = conversation.received_last_message_number()
            && last >= message_header.message_number
        {
            return self.pop_cached_key(conversation_id, message_header.message_number);
        }

        self.catch_up(message_header, conversation)
    }

    /// Seed an unsalted invitation with the salt and resolve the first key.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation does not exist
    /// - `ConversationAlreadySetup` if it already has a root key
    /// - `InvalidSaltSize` if the salt length differs from the root key size
    pub fn get_first_receive_key(
        &self,
        message_header: &MessageHeader,
        conversation_id: ConversationId,
        shared_salt: &SharedSecret,
    ) -> Result<MessageKey, RatchetError> {
        let conversation = self.load(conversation_id)?;
        if conversation.root_key().is_some() {
            return Err(RatchetError::ConversationAlreadySetup { id: conversation_id });
        }
        self.check_salt(shared_salt)?;

        // Persisted by the first catch-up checkpoint
        let conversation = conversation.seed_root(RootKey::from_shared_salt(shared_salt))?;
        self.catch_up(message_header, conversation)
    }

    fn catch_up(
        &self,
        header: &MessageHeader,
        conversation: Conversation,
    ) -> Result<MessageKey, RatchetError> {
        let id = conversation.id();
        let first = match conversation.received_last_message_number() {
            Some(last) => last.checked_add(1).ok_or(RatchetError::CounterOverflow)?,
            None => 0,
        };
        debug_assert!(first <= header.message_number);

        // Validate everything before the first write
        let epoch_start = epoch_start(header, &conversation, first)?;

        let skipped = header.message_number - first;
        if skipped > self.config.max_skip {
            tracing::warn!(
                conversation_id = %id,
                next_expected = first,
                message_number = header.message_number,
                max_skip = self.config.max_skip,
                "rejecting header: too many skipped messages"
            );
            return Err(RatchetError::TooManySkippedMessages {
                current: first,
                requested: header.message_number,
                max_skip: self.config.max_skip,
            });
        }

        let needs_receive_chain = epoch_start.is_none_or(|start| start > first);
        if needs_receive_chain && !conversation.is_ready_for_receiving() {
            return Err(RatchetError::ConversationNotSetup { id });
        }

        let mut conversation = conversation;
        let mut message_number = first;
        loop {
            let (next, message_key) = if Some(message_number) == epoch_start {
                self.epoch_step(conversation, &header.public_key, message_number)?
            } else {
                self.chain_step(conversation, message_number)?
            };

            if message_number == header.message_number {
                self.datasource.save_or_update_conversation(&next)?;
                return Ok(message_key);
            }

            self.datasource.save_message_key(&message_key_id(id, message_number), &message_key)?;
            self.datasource.save_or_update_conversation(&next)?;
            tracing::trace!(conversation_id = %id, message_number, "cached skipped message key");

            conversation = next;
            message_number += 1;
        }
    }

    fn chain_step(
        &self,
        conversation: Conversation,
        message_number: u32,
    ) -> Result<(Conversation, MessageKey), RatchetError> {
        let Some(receive_chain_key) = conversation.receive_chain_key() else {
            return Err(RatchetError::ConversationNotSetup { id: conversation.id() });
        };

        let (next_chain_key, message_key) =
            self.key_repository.derive_chain_keys(receive_chain_key)?;
        let next = conversation.advance_receiving(next_chain_key, message_number)?;

        Ok((next, message_key))
    }

    fn epoch_step(
        &self,
        conversation: Conversation,
        contact_public_key: &PublicKey,
        message_number: u32,
    ) -> Result<(Conversation, MessageKey), RatchetError> {
        let Some(root_key) = conversation.root_key() else {
            return Err(RatchetError::ConversationNotSetup { id: conversation.id() });
        };

        // Receive side: re-key the peer's chain
        let receive_secret = self.key_repository.create_diffie_hellman_shared_secret(
            contact_public_key,
            &conversation.personal_key_pair().private_key,
        )?;
        let (root_key, receive_chain_key) =
            self.key_repository.derive_root_keys(root_key, &receive_secret)?;
        let (receive_chain_key, message_key) =
            self.key_repository.derive_chain_keys(&receive_chain_key)?;

        // Send side: fresh key pair so our next send opens a new epoch
        let personal_key_pair = self.key_repository.generate_key_pair()?;
        let send_secret = self.key_repository.create_diffie_hellman_shared_secret(
            contact_public_key,
            &personal_key_pair.private_key,
        )?;
        let (root_key, sending_chain_key) =
            self.key_repository.derive_root_keys(&root_key, &send_secret)?;

        tracing::debug!(
            conversation_id = %conversation.id(),
            message_number,
            from_phase = conversation.state().name(),
            "entering new epoch"
        );

        let keys = EpochKeys {
            root_key,
            receive_chain_key,
            last_contact_public_key: contact_public_key.clone(),
            personal_key_pair,
            sending_chain_key,
        };
        let next = conversation.enter_epoch(keys, message_number)?;

        Ok((next, message_key))
    }

    fn pop_cached_key(
        &self,
        id: ConversationId,
        message_number: u32,
    ) -> Result<MessageKey, RatchetError> {
        if let Some(key) = self.datasource.pop_message_key(&message_key_id(id, message_number))? {
            tracing::trace!(conversation_id = %id, message_number, "resolved key from cache");
            return Ok(key);
        }

        tracing::warn!(
            conversation_id = %id,
            message_number,
            "message key not found: replay or missing cache entry"
        );
        Err(RatchetError::MessageKeyNotFound { id, message_number })
    }

    fn load(&self, id: ConversationId) -> Result<Conversation, RatchetError> {
        self.datasource.get_conversation(id)?.ok_or(RatchetError::ConversationNotFound { id })
    }

    fn claim_id(&self, requested: Option<ConversationId>) -> Result<ConversationId, RatchetError> {
        let Some(id) = requested else {
            return Ok(ConversationId::random(&self.env));
        };

        if self.datasource.get_conversation(id)?.is_some() {
            return Err(RatchetError::ConversationAlreadySetup { id });
        }
        Ok(id)
    }

    fn check_salt(&self, shared_salt: &SharedSecret) -> Result<(), RatchetError> {
        let expected = self.key_repository.sizes().root_key;
        if shared_salt.len() != expected {
            return Err(RatchetError::InvalidSaltSize { expected, actual: shared_salt.len() });
        }
        Ok(())
    }
}

/// Message number at which the header's epoch began, if the header opens a
/// new epoch.
///
/// A new epoch that began at or before a message we already processed is
/// impossible for an honest peer: processing it would have recorded its key.
fn epoch_start(
    header: &MessageHeader,
    conversation: &Conversation,
    first: u32,
) -> Result<Option<u32>, RatchetError> {
    if conversation.last_contact_public_key() == Some(&header.public_key) {
        return Ok(None);
    }

    let invalid = || RatchetError::InvalidHeader {
        message_number: header.message_number,
        sequence_number: header.sequence_number,
    };
    let start = header.message_number.checked_sub(header.sequence_number).ok_or_else(invalid)?;
    if start < first {
        return Err(invalid());
    }

    Ok(Some(start))
}

#[cfg(test)]
mod tests {
    use ratchet_crypto::{KeySizes, Rng, X25519KeyRepository};

    use super::*;
    use crate::storage::MemoryStorage;

    #[derive(Clone)]
    struct CountingEnv;

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x5A);
        }
    }

    type TestEngine = RatchetEngine<MemoryStorage, X25519KeyRepository, CountingEnv>;

    fn engine(seed: u8) -> TestEngine {
        let repo = X25519KeyRepository::from_seed([seed; 32]);
        RatchetEngine::new(MemoryStorage::new(), repo, CountingEnv)
    }

    fn salt() -> SharedSecret {
        SharedSecret::from_slice(&[0x11; 32])
    }

    #[test]
    fn message_key_id_format() {
        let id = ConversationId::from_u128(1);

        assert_eq!(message_key_id(id, 42), "00000000-0000-0000-0000-000000000001 - 42");
    }

    #[test]
    fn explicit_id_is_used() {
        let bob = engine(1);
        let id = ConversationId::from_u128(99);

        let invitation = bob.create_invitation(&salt(), Some(id)).unwrap();

        assert_eq!(invitation.conversation_id, id);
        assert!(bob.datasource().get_conversation(id).unwrap().is_some());
    }

    #[test]
    fn explicit_id_cannot_be_reused() {
        let bob = engine(1);
        let id = ConversationId::from_u128(99);
        bob.create_invitation(&salt(), Some(id)).unwrap();

        let result = bob.create_invitation_without_salt(Some(id));

        assert!(matches!(result, Err(RatchetError::ConversationAlreadySetup { .. })));
    }

    #[test]
    fn salt_size_follows_configured_root_key_size() {
        let sizes = KeySizes { root_key: 48, ..KeySizes::default() };
        let repo = X25519KeyRepository::with_rng(sizes, Rng::from_seed([3; 32])).unwrap();
        let bob = RatchetEngine::new(MemoryStorage::new(), repo, CountingEnv);

        assert!(matches!(
            bob.create_invitation(&salt(), None),
            Err(RatchetError::InvalidSaltSize { expected: 48, actual: 32 })
        ));
        assert!(bob.create_invitation(&SharedSecret::from_slice(&[1; 48]), None).is_ok());
    }

    #[test]
    fn failed_validation_persists_nothing() {
        let alice = engine(2);
        let bob = engine(1);
        let invitation = bob.create_invitation(&salt(), None).unwrap();
        let before = bob.datasource().get_conversation(invitation.conversation_id).unwrap();

        let header = MessageHeader {
            message_number: 3,
            sequence_number: 5,
            public_key: alice.key_repository().generate_key_pair().unwrap().public_key,
        };
        let result = bob.get_receive_key(&header, invitation.conversation_id);

        assert!(matches!(result, Err(RatchetError::InvalidHeader { .. })));
        assert_eq!(bob.datasource().get_conversation(invitation.conversation_id).unwrap(), before);
    }

    #[test]
    fn first_receive_with_gap_before_epoch_needs_receive_chain() {
        let bob = engine(1);
        let alice = engine(2);
        let invitation = bob.create_invitation(&salt(), None).unwrap();

        // Claims an epoch starting at 2 with nothing received before
        let header = MessageHeader {
            message_number: 2,
            sequence_number: 0,
            public_key: alice.key_repository().generate_key_pair().unwrap().public_key,
        };

        assert!(matches!(
            bob.get_receive_key(&header, invitation.conversation_id),
            Err(RatchetError::ConversationNotSetup { .. })
        ));
    }
}
