use std::sync::Arc;
use std::time::Instant;

use hcn_dispatch::{parse_key_value, DispatchOutcome, DispatchRegistry, KeyValuePair};
use hcn_transport::Transport;
use hcn_wire::{
    decode_line, decode_packet, encode_packet, ConnectionState, Datapoint, DatapointBatch,
    Handshake, KeyValue, Packet, PacketType, PeerIndex, Side, TextBatch, VectorBatch, VectorEntry,
    WireError, MAGIC,
};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::state::{PeerHandshake, SessionTable, Transition};

/// What processing one inbound packet did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handshake was applied to the slot table.
    Handshake(Transition),
    /// An application payload went through the registry.
    Dispatched(DispatchOutcome),
}

impl Outcome {
    /// True when the packet advanced a handshake or reached a handler.
    pub fn acted(&self) -> bool {
        match self {
            Outcome::Handshake(transition) => transition.is_running(),
            Outcome::Dispatched(outcome) => outcome.is_handled(),
        }
    }
}

/// One endpoint of HCN messaging, client or server.
///
/// Owns the slot table, shares a handler registry and sends through `T`.
/// Every method runs to completion; handshake replies go out from inside the
/// call that received the hello.
pub struct Session<T: Transport> {
    config: SessionConfig,
    table: SessionTable,
    registry: Arc<DispatchRegistry>,
    transport: T,
}

impl<T: Transport> Session<T> {
    /// Create a session after validating `config`.
    pub fn new(
        config: SessionConfig,
        registry: Arc<DispatchRegistry>,
        transport: T,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            table: SessionTable::new(),
            registry,
            transport,
        })
    }

    /// Process a line known to have arrived on the HCN chat category.
    pub fn process_incoming(&mut self, slot: PeerIndex, units: &[u16]) -> bool {
        let chat_type = self.config.chat_type;
        self.process_chat(slot, chat_type, units)
    }

    /// Process any chat line. Returns true when the packet was acted upon.
    ///
    /// Foreign and malformed lines are logged and leave every slot untouched,
    /// except that an undecodable handshake resets its slot.
    pub fn process_chat(&mut self, slot: PeerIndex, chat_type: u32, units: &[u16]) -> bool {
        match self.try_process(slot, chat_type, units) {
            Ok(outcome) => outcome.acted(),
            Err(err @ (SessionError::TypeMismatch { .. }
            | SessionError::Wire(WireError::InvalidMagic { .. }))) => {
                trace!(%slot, chat_type, error = %err, "ignoring foreign chat line");
                false
            }
            Err(err) => {
                warn!(%slot, chat_type, error = %err, "dropping packet");
                false
            }
        }
    }

    /// Process a chat line, reporting failures as errors.
    pub fn try_process(
        &mut self,
        slot: PeerIndex,
        chat_type: u32,
        units: &[u16],
    ) -> Result<Outcome> {
        if chat_type != self.config.chat_type {
            return Err(SessionError::TypeMismatch { chat_type });
        }

        let inbound = match decode_packet(units) {
            Ok(inbound) => inbound,
            Err(err) => return Err(self.reject_undecodable(slot, units, err)),
        };

        for mismatch in &inbound.mismatches {
            warn!(
                %slot,
                field = mismatch.field,
                declared = mismatch.declared,
                actual = mismatch.actual,
                "length mismatch in received packet"
            );
        }
        if self.config.strict_lengths {
            if let Some(mismatch) = inbound.mismatches.first() {
                return Err(WireError::from(*mismatch).into());
            }
        }

        trace!(%slot, packet_type = %inbound.packet.packet_type(), "received packet");
        match inbound.packet {
            Packet::Handshake(handshake) => self.receive_handshake(slot, &handshake),
            Packet::KeyValue(kv) => {
                self.require_running(slot)?;
                let outcome = self.registry.dispatch_key_value(slot, &kv.text)?;
                Ok(Outcome::Dispatched(outcome))
            }
            Packet::Datapoints(batch) => {
                self.require_running(slot)?;
                let outcome = self.registry.dispatch_datapoints(slot, &batch.entries);
                Ok(Outcome::Dispatched(outcome))
            }
            Packet::Vectors(batch) => {
                self.require_running(slot)?;
                let outcome = self.registry.dispatch_vectors(slot, &batch.entries);
                Ok(Outcome::Dispatched(outcome))
            }
            Packet::Text(text) => {
                self.require_running(slot)?;
                let outcome = self.registry.dispatch_text(slot, &text);
                Ok(Outcome::Dispatched(outcome))
            }
        }
    }

    /// Send the client hello to the server. Client sessions only.
    pub fn start_handshake(&mut self) -> Result<()> {
        if self.config.role.side() != Side::Client {
            return Err(SessionError::WrongSide("server"));
        }

        let slot = PeerIndex::SERVER;
        self.table.begin_handshake(slot, Instant::now());
        let hello = Handshake::new(
            ConnectionState::HandshakeC2S,
            self.config.role,
            self.config.version.clone(),
        );
        if let Err(err) = self.transmit(slot, &hello.into()) {
            self.table.clear(slot);
            return Err(err);
        }
        Ok(())
    }

    /// Send a `key=value` string.
    pub fn send_key_value(&mut self, slot: PeerIndex, text: &str) -> Result<()> {
        self.require_running(slot)?;
        let pair = parse_key_value(text)?;
        pair.validate()?;
        self.transmit(slot, &KeyValue::new(text).into())
    }

    /// Send a key and value as one key/value packet.
    pub fn send_pair(&mut self, slot: PeerIndex, key: &str, value: &str) -> Result<()> {
        self.require_running(slot)?;
        let text = KeyValuePair::new(key, value).format()?;
        self.transmit(slot, &KeyValue::new(text).into())
    }

    /// Send up to six datapoints in one packet.
    pub fn send_datapoints(&mut self, slot: PeerIndex, entries: &[Datapoint]) -> Result<()> {
        self.require_running(slot)?;
        self.transmit(slot, &DatapointBatch::new(entries.to_vec()).into())
    }

    /// Send up to four vectors in one packet.
    pub fn send_vectors(&mut self, slot: PeerIndex, entries: &[VectorEntry]) -> Result<()> {
        self.require_running(slot)?;
        self.transmit(slot, &VectorBatch::new(entries.to_vec()).into())
    }

    /// Send one text message.
    pub fn send_text(&mut self, slot: PeerIndex, text: TextBatch) -> Result<()> {
        self.require_running(slot)?;
        self.transmit(slot, &text.into())
    }

    pub fn is_running(&self, slot: PeerIndex) -> bool {
        self.table.is_running(slot)
    }

    pub fn state(&self, slot: PeerIndex) -> ConnectionState {
        self.table.state(slot)
    }

    /// Handshake the peer on `slot` announced, once it is running.
    pub fn peer(&self, slot: PeerIndex) -> Option<&PeerHandshake> {
        self.table.peer(slot)
    }

    /// Reset a slot. Hosts call this when a player joins or leaves.
    pub fn clear_peer(&mut self, slot: PeerIndex) {
        self.table.clear(slot);
    }

    pub fn clear_all(&mut self) {
        self.table.clear_all();
    }

    /// Housekeeping hook for the host's frame loop.
    ///
    /// Does nothing unless a handshake timeout is configured; then resets
    /// stalled handshakes and returns their slots.
    pub fn tick(&mut self, now: Instant) -> Vec<PeerIndex> {
        match self.config.handshake_timeout {
            Some(timeout) => self.table.expire(now, timeout),
            None => Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn receive_handshake(&mut self, slot: PeerIndex, handshake: &Handshake) -> Result<Outcome> {
        let side = self.config.role.side();
        let transition = self.table.receive_handshake(side, slot, handshake);

        if transition == Transition::Reply {
            let reply = Handshake::new(
                ConnectionState::HandshakeS2C,
                self.config.role,
                self.config.version.clone(),
            );
            if let Err(err) = self.transmit(slot, &reply.into()) {
                self.table.clear(slot);
                return Err(err);
            }
        }
        Ok(Outcome::Handshake(transition))
    }

    /// A line with our magic failed to parse. If it claims to be a
    /// handshake, the slot's handshake is void.
    fn reject_undecodable(
        &mut self,
        slot: PeerIndex,
        units: &[u16],
        err: WireError,
    ) -> SessionError {
        if matches!(err, WireError::InvalidMagic { .. }) || units.first() != Some(&MAGIC) {
            return err.into();
        }
        let bytes = match decode_line(units) {
            Ok(bytes) => bytes,
            Err(_) => return err.into(),
        };
        if bytes.get(2) != Some(&(PacketType::Handshake as u8)) {
            return err.into();
        }

        self.table.clear(slot);
        match err {
            WireError::InvalidField {
                field: "state",
                value,
            } => SessionError::UnexpectedHandshakeState { slot, state: value },
            other => other.into(),
        }
    }

    fn require_running(&self, slot: PeerIndex) -> Result<()> {
        let state = self.table.state(slot);
        if state != ConnectionState::Running {
            return Err(SessionError::NotRunning { slot, state });
        }
        Ok(())
    }

    fn transmit(&mut self, slot: PeerIndex, packet: &Packet) -> Result<()> {
        let line = encode_packet(packet)?;
        self.transport.send(slot, &line)?;
        debug!(
            %slot,
            packet_type = %packet.packet_type(),
            units = line.len(),
            "sent packet"
        );
        Ok(())
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("table", &self.table)
            .field("registry", &self.registry)
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use hcn_transport::{MemoryTransport, TransportError};
    use hcn_wire::{
        encode, ClientKind, DatapointValue, PeerRole, ServerKind, TextType, Vec3, CHAT_TYPE,
        MAX_DATAPOINTS,
    };

    use super::*;

    fn slot(index: u8) -> PeerIndex {
        PeerIndex::new(index).unwrap()
    }

    fn server() -> Session<MemoryTransport> {
        server_with(SessionConfig::server(ServerKind::Sapp, "2.0"), DispatchRegistry::new())
    }

    fn server_with(
        config: SessionConfig,
        registry: DispatchRegistry,
    ) -> Session<MemoryTransport> {
        Session::new(config, Arc::new(registry), MemoryTransport::new()).unwrap()
    }

    fn client() -> Session<MemoryTransport> {
        Session::new(
            SessionConfig::client(ClientKind::Hac2, "1.0"),
            Arc::new(DispatchRegistry::new()),
            MemoryTransport::new(),
        )
        .unwrap()
    }

    fn line(packet: impl Into<Packet>) -> Vec<u16> {
        encode_packet(&packet.into()).unwrap()
    }

    fn hello() -> Vec<u16> {
        line(Handshake::new(
            ConnectionState::HandshakeC2S,
            PeerRole::Client(ClientKind::Hac2),
            "1.0",
        ))
    }

    fn running_server(registry: DispatchRegistry, at: PeerIndex) -> Session<MemoryTransport> {
        let mut session = server_with(SessionConfig::server(ServerKind::Sapp, "2.0"), registry);
        assert!(session.process_incoming(at, &hello()));
        session.transport_mut().drain();
        session
    }

    #[test]
    fn server_replies_to_hello() {
        let mut session = server();
        assert!(session.process_incoming(slot(2), &hello()));
        assert!(session.is_running(slot(2)));

        let sent = session.transport_mut().drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].slot, slot(2));
        assert_eq!(sent[0].chat_type, CHAT_TYPE);

        let reply = decode_packet(&sent[0].units).unwrap();
        match reply.packet {
            Packet::Handshake(hs) => {
                assert_eq!(hs.state, ConnectionState::HandshakeS2C);
                assert_eq!(hs.role, PeerRole::Server(ServerKind::Sapp));
                assert_eq!(hs.version, "2.0");
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(session.peer(slot(2)).unwrap().version, "1.0");
    }

    #[test]
    fn client_handshake_reaches_running() {
        let mut session = client();
        session.start_handshake().unwrap();
        assert_eq!(
            session.state(PeerIndex::SERVER),
            ConnectionState::HandshakeC2S
        );
        assert_eq!(session.transport().len(), 1);

        let answer = line(Handshake::new(
            ConnectionState::HandshakeS2C,
            PeerRole::Server(ServerKind::Phasor),
            "3.1",
        ));
        let outcome = session
            .try_process(PeerIndex::SERVER, CHAT_TYPE, &answer)
            .unwrap();
        assert_eq!(outcome, Outcome::Handshake(Transition::Established));
        assert!(session.is_running(PeerIndex::SERVER));
        assert_eq!(session.transport().len(), 1);
    }

    #[test]
    fn server_cannot_start_handshake() {
        let mut session = server();
        assert!(matches!(
            session.start_handshake(),
            Err(SessionError::WrongSide(_))
        ));
        assert!(session.transport().is_empty());
    }

    #[test]
    fn unexpected_handshake_resets_slot() {
        let mut session = running_server(DispatchRegistry::new(), slot(1));
        let answer = line(Handshake::new(
            ConnectionState::HandshakeS2C,
            PeerRole::Server(ServerKind::Hse),
            "9",
        ));

        assert!(!session.process_incoming(slot(1), &answer));
        assert_eq!(session.state(slot(1)), ConnectionState::None);
        assert!(session.transport().is_empty());
    }

    #[test]
    fn unknown_handshake_state_resets_slot() {
        let mut session = running_server(DispatchRegistry::new(), slot(1));
        let mut bytes = write_hello_bytes();
        bytes[5] = 9;

        let err = session
            .try_process(slot(1), CHAT_TYPE, &encode(&bytes))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::UnexpectedHandshakeState {
                slot: slot(1),
                state: 9
            }
        );
        assert!(!session.is_running(slot(1)));
    }

    fn write_hello_bytes() -> Vec<u8> {
        let packet = Packet::from(Handshake::new(
            ConnectionState::HandshakeC2S,
            PeerRole::Client(ClientKind::Chimera),
            "1",
        ));
        hcn_wire::write_packet(&packet).unwrap().to_vec()
    }

    #[test]
    fn foreign_chat_leaves_state_alone() {
        let mut session = running_server(DispatchRegistry::new(), slot(3));

        let chat: Vec<u16> = "hello".encode_utf16().chain([0]).collect();
        assert!(!session.process_chat(slot(3), 0, &chat));
        assert!(!session.process_chat(slot(3), CHAT_TYPE, &chat));
        assert!(matches!(
            session.try_process(slot(3), 2, &hello()),
            Err(SessionError::TypeMismatch { chat_type: 2 })
        ));
        assert!(session.is_running(slot(3)));
    }

    #[test]
    fn chat_resembling_handshake_type_leaves_state_alone() {
        let mut session = running_server(DispatchRegistry::new(), slot(3));

        // U+3001 puts 0x01 where a packet carries its type byte.
        for text in ["a\u{3001}b", "x\u{0401}", "o\u{0101}"] {
            let chat: Vec<u16> = text.encode_utf16().chain([0]).collect();
            assert!(matches!(
                session.try_process(slot(3), CHAT_TYPE, &chat),
                Err(SessionError::Wire(WireError::InvalidMagic { .. }))
            ));
            assert!(!session.process_chat(slot(3), CHAT_TYPE, &chat));
        }
        assert_eq!(session.state(slot(3)), ConnectionState::Running);
    }

    #[test]
    fn running_state_handshake_is_rejected_without_reply() {
        let mut session = server();
        let claim = line(Handshake::new(
            ConnectionState::Running,
            PeerRole::Client(ClientKind::Hac2),
            "1.0",
        ));

        assert!(!session.process_incoming(slot(2), &claim));
        assert_eq!(session.state(slot(2)), ConnectionState::None);
        assert!(session.transport().is_empty());

        let mut session = running_server(DispatchRegistry::new(), slot(2));
        let outcome = session.try_process(slot(2), CHAT_TYPE, &claim).unwrap();
        assert_eq!(
            outcome,
            Outcome::Handshake(Transition::Rejected {
                received: ConnectionState::Running
            })
        );
        assert!(!outcome.acted());
        assert_eq!(session.state(slot(2)), ConnectionState::None);
        assert!(session.transport().is_empty());
    }

    #[test]
    fn short_payload_length_still_dispatches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut registry = DispatchRegistry::new();
        registry.on_key("SJ", move |_: PeerIndex, _: &str, value: &str| {
            assert_eq!(value, "ON");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut session = running_server(registry, slot(4));

        let mut bytes = hcn_wire::write_packet(&Packet::from(KeyValue::new("SJ=ON")))
            .unwrap()
            .to_vec();
        for declared in [4u8, 6, 12] {
            bytes[3] = declared;
            assert!(session.process_incoming(slot(4), &encode(&bytes)));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn payload_refused_before_running() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut registry = DispatchRegistry::new();
        registry.on_key("SJ", move |_: PeerIndex, _: &str, _: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut session = server_with(SessionConfig::server(ServerKind::Sapp, "2.0"), registry);

        let kv = line(KeyValue::new("SJ=ON"));
        assert!(matches!(
            session.try_process(slot(4), CHAT_TYPE, &kv),
            Err(SessionError::NotRunning {
                state: ConnectionState::None,
                ..
            })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        session.process_incoming(slot(4), &hello());
        assert!(session.process_incoming(slot(4), &kv));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sending_requires_running() {
        let mut session = server();
        assert!(matches!(
            session.send_key_value(slot(0), "SJ=ON"),
            Err(SessionError::NotRunning { .. })
        ));
        assert!(session.transport().is_empty());
    }

    #[test]
    fn datapoint_capacity_checked_before_sending() {
        let mut session = running_server(DispatchRegistry::new(), slot(5));
        let entry = Datapoint::new(1, DatapointValue::from_f32(0.5));

        let err = session
            .send_datapoints(slot(5), &vec![entry; MAX_DATAPOINTS + 1])
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Wire(WireError::CapacityExceeded { count: 7, .. })
        ));
        assert!(session.transport().is_empty());

        session
            .send_datapoints(slot(5), &vec![entry; MAX_DATAPOINTS])
            .unwrap();
        assert_eq!(session.transport().len(), 1);
    }

    #[test]
    fn sends_every_payload_kind() {
        let mut session = running_server(DispatchRegistry::new(), slot(6));
        session.send_key_value(slot(6), "MTV=1").unwrap();
        session.send_pair(slot(6), "SJ", "OFF").unwrap();
        session
            .send_vectors(slot(6), &[VectorEntry::new(1, Vec3::new(1.0, 2.0, 3.0))])
            .unwrap();
        session
            .send_text(slot(6), TextBatch::new(TextType(1), 3, "gg"))
            .unwrap();

        let sent = session.transport_mut().drain();
        let kinds: Vec<PacketType> = sent
            .iter()
            .map(|line| decode_packet(&line.units).unwrap().packet.packet_type())
            .collect();
        assert_eq!(
            kinds,
            vec![
                PacketType::KeyValue,
                PacketType::KeyValue,
                PacketType::Vector,
                PacketType::Text
            ]
        );
        assert!(sent.iter().all(|line| line.slot == slot(6)));
    }

    #[test]
    fn bad_key_value_is_rejected() {
        let mut session = running_server(DispatchRegistry::new(), slot(6));
        assert!(matches!(
            session.send_key_value(slot(6), "novalue"),
            Err(SessionError::Dispatch(_))
        ));
        assert!(session.send_pair(slot(6), "A=B", "1").is_err());
        assert!(session.transport().is_empty());
    }

    #[test]
    fn strict_lengths_reject_mismatch() {
        let config = SessionConfig {
            strict_lengths: true,
            ..SessionConfig::server(ServerKind::Sapp, "2.0")
        };
        let mut session = server_with(config, DispatchRegistry::new());
        let mut bytes = write_hello_bytes();
        // Claim two more payload bytes than were sent.
        bytes[3] += 2;

        let result = session.try_process(slot(1), CHAT_TYPE, &encode(&bytes));
        assert!(matches!(
            result,
            Err(SessionError::Wire(WireError::LengthMismatch { .. }))
        ));
        assert!(!session.is_running(slot(1)));

        let mut lenient = server();
        assert!(lenient.process_incoming(slot(1), &encode(&bytes)));
    }

    #[test]
    fn transport_failure_resets_slot() {
        let mut session = Session::new(
            SessionConfig::server(ServerKind::Sapp, "2.0"),
            Arc::new(DispatchRegistry::new()),
            MemoryTransport::with_capacity(0),
        )
        .unwrap();

        let result = session.try_process(slot(7), CHAT_TYPE, &hello());
        assert_eq!(
            result,
            Err(SessionError::Transport(TransportError::Full { capacity: 0 }))
        );
        assert_eq!(session.state(slot(7)), ConnectionState::None);
    }

    #[test]
    fn tick_is_noop_without_timeout() {
        let mut session = client();
        session.start_handshake().unwrap();
        let later = Instant::now() + Duration::from_secs(3600);
        assert!(session.tick(later).is_empty());
        assert_eq!(
            session.state(PeerIndex::SERVER),
            ConnectionState::HandshakeC2S
        );
    }

    #[test]
    fn tick_expires_stalled_handshake() {
        let config = SessionConfig {
            handshake_timeout: Some(Duration::from_secs(2)),
            ..SessionConfig::client(ClientKind::Chimera, "1.0")
        };
        let mut session = Session::new(
            config,
            Arc::new(DispatchRegistry::new()),
            MemoryTransport::new(),
        )
        .unwrap();
        session.start_handshake().unwrap();

        let expired = session.tick(Instant::now() + Duration::from_secs(3));
        assert_eq!(expired, vec![PeerIndex::SERVER]);
        assert_eq!(session.state(PeerIndex::SERVER), ConnectionState::None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Session::new(
            SessionConfig::client(ClientKind::Hac2, ""),
            Arc::new(DispatchRegistry::new()),
            MemoryTransport::new(),
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn closure_transport_works() {
        let mut sent = Vec::new();
        {
            let mut session = Session::new(
                SessionConfig::client(ClientKind::Hac2, "1.0"),
                Arc::new(DispatchRegistry::new()),
                |slot: PeerIndex, line: &[u16]| sent.push((slot, line.len())),
            )
            .unwrap();
            session.start_handshake().unwrap();
        }
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PeerIndex::SERVER);
    }
}
