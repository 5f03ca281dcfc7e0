//! End-to-end verification attempts against a scripted client.

use std::sync::{Arc, LazyLock, Mutex};

use bytes::{Bytes, BytesMut};
use mcverify::crypto::{SharedSecret, server_hash};
use mcverify::handler::{CHALLENGE_INVALID_MESSAGE, NOT_JOINED_MESSAGE, NOT_LOGIN_MESSAGE};
use mcverify::{
    GameProfile, Outcome, PacketCipher, SERVER_ID, ServerKeys, SessionError, SessionService,
    VerifyError, verify,
};
use mcverify_mc::ProtocolError;
use mcverify_mc::codec::{ByteReader, frame, split_frame};
use mcverify_mc::packets::{
    EncryptionRequest, Hello, Intention, Key, OutboundPacket, Packet, Writable, encode,
};
use rsa::pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::task::JoinHandle;
use uuid::Uuid;

static KEYS: LazyLock<Arc<ServerKeys>> =
    LazyLock::new(|| Arc::new(ServerKeys::generate().unwrap()));

static OTHER_KEYS: LazyLock<ServerKeys> = LazyLock::new(|| ServerKeys::generate().unwrap());

const SECRET: SharedSecret = *b"sixteen byte key";
const ADDRESS: &str = "k3y5t0k3.verify.localhost";

fn steve() -> GameProfile {
    GameProfile {
        id: Uuid::parse_str("8667ba71b85a4004af54457a9734eed7").unwrap(),
        name: "Steve".to_string(),
        properties: Vec::new(),
    }
}

/// Session service that answers from a script and records every lookup.
#[derive(Default)]
struct FakeSessionService {
    answer: Option<GameProfile>,
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSessionService {
    fn joined(profile: GameProfile) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(profile),
            ..Self::default()
        })
    }

    fn not_joined() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SessionService for FakeSessionService {
    async fn has_joined_server(
        &self,
        username: &str,
        server_hash: &str,
    ) -> Result<Option<GameProfile>, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push((username.to_string(), server_hash.to_string()));

        if self.fail {
            return Err(SessionError::InvalidProfile("scripted failure".to_string()));
        }
        Ok(self.answer.clone())
    }
}

/// The client end of a connection.
struct TestClient {
    stream: DuplexStream,
    buffer: BytesMut,
    cipher: Option<PacketCipher>,
}

impl TestClient {
    async fn send<P: Packet + Writable>(&mut self, packet: &P) {
        let mut bytes = frame(&encode(packet));
        if let Some(cipher) = &mut self.cipher {
            cipher.encrypt(&mut bytes);
        }
        self.stream.write_all(&bytes).await.unwrap();
    }

    /// Read the next clientbound packet, or `None` once the server closed.
    async fn recv(&mut self) -> Option<OutboundPacket> {
        loop {
            if let Some(frame) = split_frame(&mut self.buffer).unwrap() {
                let mut reader = ByteReader::new(frame.freeze());
                return Some(OutboundPacket::read(&mut reader).unwrap());
            }

            let start = self.buffer.len();
            if self.stream.read_buf(&mut self.buffer).await.unwrap() == 0 {
                assert!(self.buffer.is_empty(), "server closed mid-packet");
                return None;
            }
            if let Some(cipher) = &mut self.cipher {
                cipher.decrypt(&mut self.buffer[start..]);
            }
        }
    }

    async fn expect_disconnect(&mut self) -> String {
        match self.recv().await {
            Some(OutboundPacket::Disconnect(disconnect)) => disconnect.message,
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    async fn expect_encryption_request(&mut self) -> EncryptionRequest {
        match self.recv().await {
            Some(OutboundPacket::Hello(request)) => request,
            other => panic!("expected encryption request, got {other:?}"),
        }
    }

    async fn login(&mut self, name: &str) -> EncryptionRequest {
        self.send(&intention(2)).await;
        self.send(&Hello::new(name, Uuid::nil())).await;
        self.expect_encryption_request().await
    }

    fn enable_encryption(&mut self) {
        self.cipher = Some(PacketCipher::new(&SECRET));
    }
}

fn intention(intent: i32) -> Intention {
    Intention {
        protocol_version: 767,
        server_address: ADDRESS.to_string(),
        server_port: 25565,
        intent,
    }
}

fn encrypt_with(public_key: &RsaPublicKey, data: &[u8]) -> Bytes {
    public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .unwrap()
        .into()
}

fn key_response(request: &EncryptionRequest) -> Key {
    let public_key = RsaPublicKey::from_public_key_der(&request.public_key).unwrap();
    Key {
        encrypted_secret: encrypt_with(&public_key, &SECRET),
        encrypted_challenge: encrypt_with(&public_key, &request.challenge),
    }
}

fn start(session: Arc<FakeSessionService>) -> (TestClient, JoinHandle<Result<Outcome, VerifyError>>) {
    let (client, server) = duplex(64 * 1024);
    let callback = |address: &str, profile: &GameProfile| {
        format!("Verified {} via {address}", profile.name)
    };
    let handle = tokio::spawn(verify(server, KEYS.clone(), session, callback));

    let client = TestClient {
        stream: client,
        buffer: BytesMut::new(),
        cipher: None,
    };
    (client, handle)
}

#[tokio::test]
async fn verifies_joined_player() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    let request = client.login("Steve").await;
    assert_eq!(request.server_id, SERVER_ID);
    assert_eq!(request.public_key, KEYS.public_key_der());
    assert_eq!(request.challenge.len(), 4);
    assert!(request.should_authenticate);

    client.send(&key_response(&request)).await;
    client.enable_encryption();

    let message = client.expect_disconnect().await;
    assert_eq!(message, format!("Verified Steve via {ADDRESS}"));
    assert!(client.recv().await.is_none());

    let expected_hash = server_hash(SERVER_ID, &request.public_key, &SECRET);
    assert_eq!(session.calls(), vec![("Steve".to_string(), expected_hash)]);

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        Outcome::Verified {
            profile: steve(),
            message,
        }
    );
}

#[tokio::test]
async fn rejects_status_intention() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    client.send(&intention(1)).await;

    assert_eq!(client.expect_disconnect().await, NOT_LOGIN_MESSAGE);
    assert!(client.recv().await.is_none());

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::NotLogin { intent: 1 });
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn rejects_challenge_from_wrong_key() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    let request = client.login("Steve").await;

    let public_key = RsaPublicKey::from_public_key_der(&request.public_key).unwrap();
    let key = Key {
        encrypted_secret: encrypt_with(&public_key, &SECRET),
        encrypted_challenge: encrypt_with(&OTHER_KEYS.public_key(), &request.challenge),
    };
    client.send(&key).await;
    client.enable_encryption();

    assert_eq!(client.expect_disconnect().await, CHALLENGE_INVALID_MESSAGE);

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::ChallengeInvalid);
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn rejects_wrong_challenge_value() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    let mut request = client.login("Steve").await;
    request.challenge = Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]);
    client.send(&key_response(&request)).await;
    client.enable_encryption();

    // The odds of the random challenge being exactly this are negligible
    assert_eq!(client.expect_disconnect().await, CHALLENGE_INVALID_MESSAGE);
    assert_eq!(handle.await.unwrap().unwrap(), Outcome::ChallengeInvalid);
}

#[tokio::test]
async fn reports_player_not_joined() {
    let session = FakeSessionService::not_joined();
    let (mut client, handle) = start(session.clone());

    let request = client.login("Alex").await;
    client.send(&key_response(&request)).await;
    client.enable_encryption();

    assert_eq!(client.expect_disconnect().await, NOT_JOINED_MESSAGE);

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        Outcome::NotJoined {
            username: "Alex".to_string()
        }
    );
    assert_eq!(session.calls().len(), 1);
}

#[tokio::test]
async fn session_failure_disconnects_and_propagates() {
    let session = FakeSessionService::failing();
    let (mut client, handle) = start(session.clone());

    let request = client.login("Steve").await;
    client.send(&key_response(&request)).await;
    client.enable_encryption();

    assert_eq!(client.expect_disconnect().await, NOT_JOINED_MESSAGE);

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(VerifyError::Session(_))));
}

#[tokio::test]
async fn unknown_packet_in_place_of_intention_aborts() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    let mut bytes = frame(&[0x7f, 1, 2, 3]);
    bytes.extend_from_slice(&frame(&encode(&intention(2))));
    client.stream.write_all(&bytes).await.unwrap();

    match handle.await.unwrap() {
        Err(VerifyError::Protocol(ProtocolError::UnexpectedPacket { expected, actual })) => {
            assert_eq!(expected, "Intention");
            assert_eq!(actual, "Unknown(0x7f)");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(client.recv().await.is_none());
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn undecryptable_secret_aborts_without_disconnect() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    client.send(&intention(2)).await;
    // A Key instead of a Hello; its secret is decrypted before the type check
    client
        .send(&Key {
            encrypted_secret: Bytes::from_static(&[1]),
            encrypted_challenge: Bytes::from_static(&[2]),
        })
        .await;

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(VerifyError::Crypto(_))), "{result:?}");
    assert!(client.recv().await.is_none());
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn hello_instead_of_key_is_rejected() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session.clone());

    client.login("Steve").await;
    client.send(&Hello::new("Steve", Uuid::nil())).await;

    match handle.await.unwrap() {
        Err(VerifyError::Protocol(ProtocolError::UnexpectedPacket { expected, actual })) => {
            assert_eq!(expected, "Key");
            assert_eq!(actual, "Hello");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn client_hangup_is_an_io_error() {
    let session = FakeSessionService::joined(steve());
    let (mut client, handle) = start(session);

    client.send(&intention(2)).await;
    drop(client);

    assert!(matches!(handle.await.unwrap(), Err(VerifyError::Io(_))));
}

#[tokio::test]
async fn attempts_share_one_key_pair() {
    let first = start(FakeSessionService::joined(steve()));
    let second = start(FakeSessionService::joined(steve()));
    let (mut a, _a_handle) = first;
    let (mut b, _b_handle) = second;

    let request_a = a.login("Steve").await;
    let request_b = b.login("Steve").await;

    assert_eq!(request_a.public_key, request_b.public_key);
}
