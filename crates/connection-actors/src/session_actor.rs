use actor_protocol::{
    BridgeError, CommandOutcome, ConnectionState, Focus, MediaAction, MediaIntent, PlaybackState,
    SystemEvent,
};
use actor_runtime::{
    actor_debug, actor_info, actor_warn, Actor, ConnectionMessage, ListenerId, SessionMessage,
};
use async_trait::async_trait;
use core_types::{
    AvrcpKind, Command, LinkId, ProtocolEvent, TransportControl, Verb, ERROR_NAME_NOT_FOUND,
};
use decoders::{ClassifyError, ResponseClassifier};
use framing::encode_command;
use futures_channel::mpsc;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::correlator::CommandCorrelator;
use crate::links::LinkTable;
use crate::sink::MediaControlSink;
use crate::BridgeConfig;

/// SessionActor turns response lines into link state and sink calls
///
/// Responsibilities:
/// - Classify every line and pair acknowledgements with sent commands
/// - Maintain the link table (create on first reference, destroy on loss)
/// - Route link-less media metadata to the playing link
/// - Arbitrate audio focus before any play command
/// - Fan classified events out to subscribers
///
/// Lines, host commands and connection updates arrive through one inbox,
/// so classifier and correlator never see concurrent access.
pub struct SessionActor {
    classifier: ResponseClassifier,
    correlator: CommandCorrelator,
    links: LinkTable,
    sink: Arc<dyn MediaControlSink>,

    connection_tx: mpsc::Sender<ConnectionMessage>,
    subscribers: Vec<(ListenerId, mpsc::Sender<SystemEvent>)>,

    connection_state: ConnectionState,
    focus_held: bool,
    // `AVRCP_MEDIA` fields seen while no link was playing, oldest first
    media_buffer: VecDeque<Vec<String>>,
    max_buffered_media: usize,
    single_link: bool,
}

impl SessionActor {
    pub fn new(
        sink: Arc<dyn MediaControlSink>,
        config: &BridgeConfig,
        connection_tx: mpsc::Sender<ConnectionMessage>,
    ) -> Self {
        Self {
            classifier: ResponseClassifier::new(),
            correlator: CommandCorrelator::new(),
            links: LinkTable::new(),
            sink,
            connection_tx,
            subscribers: Vec::new(),
            connection_state: ConnectionState::Disconnected,
            focus_held: false,
            media_buffer: VecDeque::new(),
            max_buffered_media: config.max_buffered_media,
            single_link: config.single_link,
        }
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn pending_commands(&self) -> usize {
        self.correlator.pending()
    }

    fn publish(&mut self, event: SystemEvent) {
        self.subscribers
            .retain(|(id, tx)| match tx.clone().try_send(event.clone()) {
                Ok(()) => true,
                Err(e) if e.is_disconnected() => {
                    actor_debug!("Event subscriber {} gone", id);
                    false
                }
                Err(_) => {
                    actor_warn!("Event subscriber {} is full, event dropped", id);
                    true
                }
            });
    }

    /// Register with the correlator and hand the framed line to the writer
    ///
    /// Refused unless Connected; the correlator is untouched then.
    fn send_command(&mut self, command: Command) -> Result<u64, BridgeError> {
        if self.connection_state != ConnectionState::Connected {
            return Err(BridgeError::TransportIo(format!(
                "Cannot send '{}': connection is {:?}",
                command, self.connection_state
            )));
        }
        self.connection_tx
            .clone()
            .try_send(ConnectionMessage::Write {
                bytes: encode_command(&command),
            })
            .map_err(|_| BridgeError::ChannelClosed("Connection actor unavailable".into()))?;

        let sequence = self.correlator.register(command.token());
        actor_debug!("→ {} (#{})", command, sequence);
        Ok(sequence)
    }

    async fn handle_connection_state(&mut self, state: ConnectionState) -> Result<(), BridgeError> {
        self.connection_state = state;
        match state {
            ConnectionState::Connected => {
                self.classifier.reset();
                self.correlator.clear();
                self.send_command(Command::new(Verb::List))?;
                self.send_command(Command::new(Verb::Status))?;
                self.send_command(Command::with_args(Verb::Get, "NAME"))?;
            }
            ConnectionState::Disconnected => {
                self.correlator.clear();
                self.media_buffer.clear();
                for link_id in self.links.ids() {
                    self.destroy_link(link_id).await;
                }
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                // Nothing pending will be answered on this connection.
                self.correlator.clear();
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: String) -> Result<(), BridgeError> {
        match self.classifier.classify(&line) {
            Ok(event) => self.handle_event(event).await,
            Err(ClassifyError::Unclassified(line)) => {
                actor_debug!("Unclassified line: '{}'", line);
                Ok(())
            }
            Err(e) => {
                actor_warn!("{}", BridgeError::from(e));
                Ok(())
            }
        }
    }

    async fn handle_event(&mut self, event: ProtocolEvent) -> Result<(), BridgeError> {
        self.publish(SystemEvent::Protocol {
            event: event.clone(),
        });

        if let Some(outcome) = CommandOutcome::from_event(&event) {
            self.resolve(outcome);
            return Ok(());
        }

        match event {
            ProtocolEvent::Avrcp {
                link_id: None,
                kind: AvrcpKind::Media,
                extras,
            } => self.route_media(extras).await,
            ProtocolEvent::Avrcp {
                link_id: Some(link_id),
                kind,
                ..
            } => self.handle_avrcp(link_id, kind).await,
            ProtocolEvent::Avrcp { link_id: None, kind, .. } => {
                actor_debug!("AVRCP {:?} without link id ignored", kind);
                Ok(())
            }
            ProtocolEvent::AbsoluteVolume { link_id, .. }
            | ProtocolEvent::CallStatus { link_id, .. }
            | ProtocolEvent::CallerNumber { link_id, .. }
            | ProtocolEvent::StreamStatus { link_id, .. } => {
                self.touch_link(link_id).await;
                Ok(())
            }
            ProtocolEvent::LinkStatus {
                link_id,
                profile,
                address,
                ..
            } => {
                self.touch_link(link_id).await;
                if let Some(link) = self.links.get_mut(link_id) {
                    link.profile = Some(profile);
                    link.address = Some(address);
                }
                Ok(())
            }
            ProtocolEvent::LinkLoss { link_id } => {
                actor_info!("Link {} lost", link_id);
                self.destroy_link(link_id).await;
                Ok(())
            }
            ProtocolEvent::List { address, .. } => {
                self.send_command(Command::with_args(Verb::Name, address))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve(&mut self, outcome: CommandOutcome) {
        let ack = match outcome {
            CommandOutcome::Ok => "OK",
            CommandOutcome::Error { .. } => "ERROR",
            CommandOutcome::Pending => "PENDING",
        };
        match self.correlator.resolve(ack) {
            Ok(pending) => {
                if outcome
                    == (CommandOutcome::Error {
                        code: Some(ERROR_NAME_NOT_FOUND),
                    })
                {
                    actor_info!("{} #{}: device name not found", pending.token, pending.sequence);
                } else {
                    actor_debug!("← {} #{}: {:?}", pending.token, pending.sequence, outcome);
                }
                self.publish(SystemEvent::CommandResolved {
                    command: pending.token,
                    sequence: pending.sequence,
                    outcome,
                });
            }
            Err(e) => {
                actor_warn!("{}", e);
                self.publish(SystemEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Get or create a link; in single-link mode a new id replaces the rest
    async fn touch_link(&mut self, link_id: LinkId) {
        if self.single_link && !self.links.contains(link_id) {
            for old in self.links.others(link_id) {
                actor_info!("Link {} superseded by {}", old, link_id);
                self.destroy_link(old).await;
            }
        }
        self.links.touch(link_id);
    }

    async fn destroy_link(&mut self, link_id: LinkId) {
        if self.links.remove(link_id).is_none() {
            return;
        }
        self.sink
            .on_playback_state_changed(link_id, PlaybackState::Stopped)
            .await;
        self.release_focus_if_idle().await;
    }

    async fn release_focus_if_idle(&mut self) {
        if self.focus_held && self.links.playing().is_none() {
            self.focus_held = false;
            self.sink.release_focus().await;
        }
    }

    /// Ask the sink for focus unless already held
    async fn acquire_focus(&mut self) -> bool {
        if self.focus_held {
            return true;
        }
        match self.sink.request_focus().await {
            Focus::Granted => {
                self.focus_held = true;
                true
            }
            Focus::Denied => false,
        }
    }

    async fn set_playback(&mut self, link_id: LinkId, state: PlaybackState) {
        let Some(link) = self.links.get_mut(link_id) else {
            return;
        };
        if link.playback == state {
            return;
        }
        link.playback = state;
        self.sink.on_playback_state_changed(link_id, state).await;
    }

    async fn handle_avrcp(&mut self, link_id: LinkId, kind: AvrcpKind) -> Result<(), BridgeError> {
        self.touch_link(link_id).await;
        match kind {
            AvrcpKind::Play => {
                if !self.acquire_focus().await {
                    actor_warn!("Focus denied, pausing link {}", link_id);
                    self.send_command(Command::transport_control(link_id, TransportControl::Pause))?;
                    return Ok(());
                }
                self.set_playback(link_id, PlaybackState::Playing).await;
                self.replay_buffered_media(link_id).await;
            }
            AvrcpKind::Pause => self.set_playback(link_id, PlaybackState::Paused).await,
            AvrcpKind::Stop => {
                self.set_playback(link_id, PlaybackState::Stopped).await;
                self.release_focus_if_idle().await;
            }
            other => actor_debug!("AVRCP {:?} on link {}", other, link_id),
        }
        Ok(())
    }

    async fn route_media(&mut self, fields: Vec<String>) -> Result<(), BridgeError> {
        if let Some(link_id) = self.links.playing() {
            self.apply_media(link_id, std::iter::once(fields)).await;
            return Ok(());
        }

        let was_empty = self.media_buffer.is_empty();
        self.media_buffer.push_back(fields);
        while self.media_buffer.len() > self.max_buffered_media {
            self.media_buffer.pop_front();
        }
        if was_empty && self.connection_state == ConnectionState::Connected {
            actor_debug!("Media metadata with no playing link, refreshing status");
            self.send_command(Command::new(Verb::Status))?;
        }
        Ok(())
    }

    async fn replay_buffered_media(&mut self, link_id: LinkId) {
        if self.media_buffer.is_empty() {
            return;
        }
        let buffered: Vec<_> = self.media_buffer.drain(..).collect();
        self.apply_media(link_id, buffered).await;
    }

    async fn apply_media(&mut self, link_id: LinkId, batches: impl IntoIterator<Item = Vec<String>>) {
        let Some(link) = self.links.get_mut(link_id) else {
            return;
        };
        let mut changed = false;
        for field in batches.into_iter().flatten() {
            changed |= link.metadata.apply_field(&field);
        }
        if changed {
            let metadata = link.metadata.clone();
            self.sink.on_metadata_changed(link_id, &metadata).await;
        }
    }

    async fn handle_intent(&mut self, intent: MediaIntent) -> Result<(), BridgeError> {
        let control = match intent.action {
            MediaAction::FocusLost => return self.handle_focus_lost().await,
            MediaAction::Play => TransportControl::Play,
            MediaAction::Pause => TransportControl::Pause,
            MediaAction::Next => TransportControl::Forward,
            MediaAction::Previous => TransportControl::Backward,
        };
        let Some(link_id) = intent.link_id.or_else(|| self.links.default_target()) else {
            actor_warn!("No link for {:?}, ignored", intent.action);
            return Ok(());
        };

        if control == TransportControl::Play {
            let playback = self.links.get(link_id).map(|link| link.playback);
            if playback == Some(PlaybackState::Playing) {
                actor_debug!("Link {} already playing", link_id);
                return Ok(());
            }
            if !self.acquire_focus().await {
                actor_info!("Focus denied, not starting playback on link {}", link_id);
                return Ok(());
            }
        }
        self.send_command(Command::transport_control(link_id, control))?;
        if control == TransportControl::Pause {
            self.set_playback(link_id, PlaybackState::Paused).await;
        }
        Ok(())
    }

    /// Host took audio focus away: give it up, then pause whatever plays
    async fn handle_focus_lost(&mut self) -> Result<(), BridgeError> {
        self.focus_held = false;
        self.sink.release_focus().await;
        if let Some(link_id) = self.links.playing() {
            self.send_command(Command::transport_control(link_id, TransportControl::Pause))?;
            self.set_playback(link_id, PlaybackState::Paused).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Actor for SessionActor {
    type Message = SessionMessage;

    fn name(&self) -> &'static str {
        "SessionActor"
    }

    async fn handle(&mut self, msg: Self::Message) -> Result<(), BridgeError> {
        match msg {
            SessionMessage::Line(line) => self.handle_line(line).await,
            SessionMessage::ConnectionStateChanged(state) => {
                self.handle_connection_state(state).await
            }
            SessionMessage::Send(command) => self.send_command(command).map(|_| ()),
            SessionMessage::Intent(intent) => self.handle_intent(intent).await,
            SessionMessage::SubscribeEvents { id, tx } => {
                self.subscribers.push((id, tx));
                Ok(())
            }
            SessionMessage::UnsubscribeEvents { id } => {
                self.subscribers.retain(|(subscriber, _)| *subscriber != id);
                Ok(())
            }
        }
    }
}
