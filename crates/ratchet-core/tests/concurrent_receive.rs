//! Concurrent engine use serialized per conversation by `ConversationLocks`.

use std::{
    sync::Arc,
    thread,
};

use ratchet_core::{
    ConversationId, ConversationLocks, MemoryStorage, RatchetEngine, SendMessageData,
};
use ratchet_crypto::{MessageKey, SharedSecret, X25519KeyRepository};
use ratchet_harness::SeededEnv;

type Engine = RatchetEngine<MemoryStorage, X25519KeyRepository, SeededEnv>;

fn engine(seed: u8) -> Engine {
    RatchetEngine::new(
        MemoryStorage::new(),
        X25519KeyRepository::from_seed([seed; 32]),
        SeededEnv::with_seed(u64::from(seed)),
    )
}

const THREADS: usize = 4;
const MESSAGES: usize = 24;

/// Bob invites `count` times, Alice accepts each. Returns `(bob_id, alice_id)`
/// pairs.
fn conversations(
    bob: &Engine,
    alice: &Engine,
    count: usize,
) -> Vec<(ConversationId, ConversationId)> {
    let salt = SharedSecret::from_slice(&[0x42; 32]);
    (0..count)
        .map(|_| {
            let invitation = bob.create_invitation(&salt, None).unwrap();
            let alice_id = alice
                .create_new_conversation_from_invitation(&invitation.public_key, &salt, None)
                .unwrap();
            (invitation.conversation_id, alice_id)
        })
        .collect()
}

#[test]
fn same_conversation_from_many_threads() {
    let bob = Arc::new(engine(1));
    let alice = engine(2);
    let (bob_id, alice_id) = conversations(&bob, &alice, 1)[0];
    let locks = ConversationLocks::new();

    let sent: Arc<Vec<SendMessageData>> =
        Arc::new((0..MESSAGES).map(|_| alice.get_send_data(alice_id).unwrap()).collect());

    // Thread t receives messages t, t+THREADS, ... newest first
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let bob = Arc::clone(&bob);
            let sent = Arc::clone(&sent);
            let locks = locks.clone();
            thread::spawn(move || {
                let mut keys: Vec<(usize, MessageKey)> = Vec::new();
                for index in (t..MESSAGES).step_by(THREADS).rev() {
                    let key = locks
                        .run(bob_id, || bob.get_receive_key(&sent[index].message_header, bob_id))
                        .unwrap();
                    keys.push((index, key));
                }
                keys
            })
        })
        .collect();

    for handle in handles {
        for (index, key) in handle.join().unwrap() {
            assert_eq!(key, sent[index].message_key, "message {index}");
        }
    }

    assert_eq!(bob.datasource().message_key_count(), 0);
    assert!(locks.is_empty());
}

#[test]
fn different_conversations_run_in_parallel() {
    let bob = Arc::new(engine(1));
    let alice = Arc::new(engine(2));
    let pairs = conversations(&bob, &alice, THREADS);
    let locks = ConversationLocks::new();

    let handles: Vec<_> = pairs
        .into_iter()
        .map(|(bob_id, alice_id)| {
            let bob = Arc::clone(&bob);
            let alice = Arc::clone(&alice);
            let locks = locks.clone();
            thread::spawn(move || {
                for _ in 0..6 {
                    let sent = locks.run(alice_id, || alice.get_send_data(alice_id)).unwrap();
                    let key = locks
                        .run(bob_id, || bob.get_receive_key(&sent.message_header, bob_id))
                        .unwrap();
                    assert_eq!(key, sent.message_key);

                    let reply = locks.run(bob_id, || bob.get_send_data(bob_id)).unwrap();
                    let key = locks
                        .run(alice_id, || alice.get_receive_key(&reply.message_header, alice_id))
                        .unwrap();
                    assert_eq!(key, reply.message_key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bob.datasource().conversation_count(), THREADS);
    assert_eq!(bob.datasource().message_key_count(), 0);
}
