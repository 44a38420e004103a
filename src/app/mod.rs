//! The standard application: the glue between user commands, agent events,
//! the auto-response policy and the event output writer.
//!
//! One task pumps both inputs. Every handled event is optionally copied to a
//! proxy channel for downstream consumers. The proxy channel is unbounded so
//! the copy preserves event order and can never stall the pump behind a slow
//! consumer.

mod command;
mod output;

pub use command::{CommandParseError, SendPduDetails, TextCommandParser, UserCommand};
pub use output::{OutputGenerator, StandardOutputGenerator};

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agent::{AgentEvent, AgentGroup};
use crate::pdu::{CommandId, DefaultPduFactory, Pdu, PduFactory};

enum Flow {
    Continue,
    Quit,
}

pub struct StandardApplication {
    output_generator: Box<dyn OutputGenerator>,
    event_writer: Box<dyn AsyncWrite + Send + Unpin>,
    pdu_factory: Box<dyn PduFactory>,
    agent_group: Arc<AgentGroup>,
    automatic_responses_enabled: bool,
    proxy_enabled: bool,
    proxy_tx: mpsc::UnboundedSender<AgentEvent>,
    proxy_rx: Option<mpsc::UnboundedReceiver<AgentEvent>>,
    quit_callback: Box<dyn Fn() + Send>,
}

impl StandardApplication {
    pub fn new(agent_group: Arc<AgentGroup>) -> Self {
        let (proxy_tx, proxy_rx) = mpsc::unbounded_channel();

        Self {
            output_generator: Box::new(StandardOutputGenerator::new()),
            event_writer: Box::new(tokio::io::stdout()),
            pdu_factory: Box::new(DefaultPduFactory::new()),
            agent_group,
            automatic_responses_enabled: true,
            proxy_enabled: true,
            proxy_tx,
            proxy_rx: Some(proxy_rx),
            quit_callback: Box::new(|| {}),
        }
    }

    pub fn with_output_generator(mut self, generator: Box<dyn OutputGenerator>) -> Self {
        self.output_generator = generator;
        self
    }

    pub fn with_event_writer(mut self, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        self.event_writer = writer;
        self
    }

    pub fn with_pdu_factory(mut self, factory: Box<dyn PduFactory>) -> Self {
        self.pdu_factory = factory;
        self
    }

    pub fn disable_automatic_responses(mut self) -> Self {
        self.automatic_responses_enabled = false;
        self
    }

    pub fn disable_event_proxying(mut self) -> Self {
        self.proxy_enabled = false;
        self
    }

    pub fn on_quit(mut self, callback: impl Fn() + Send + 'static) -> Self {
        self.quit_callback = Box::new(callback);
        self
    }

    /// Take the proxy stream onto which every handled event is copied.
    /// There is exactly one; the second caller gets `None`.
    pub fn proxied_event_stream(&mut self) -> Option<mpsc::UnboundedReceiver<AgentEvent>> {
        self.proxy_rx.take()
    }

    /// Pump agent events and user commands until a `Quit` command arrives or
    /// both inputs close.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<AgentEvent>,
        mut commands: mpsc::Receiver<UserCommand>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_agent_event(event).await,
                    None => {
                        debug!("agent event channel closed");
                        return;
                    }
                },

                command = commands.recv() => match command {
                    Some(command) => {
                        if let Flow::Quit = self.handle_user_command(command).await {
                            return;
                        }
                    }
                    None => {
                        debug!("user command channel closed");
                        return;
                    }
                },
            }
        }
    }

    async fn handle_agent_event(&mut self, event: AgentEvent) {
        let line = match &event {
            AgentEvent::ReceivedPdu {
                source_agent,
                remote_peer,
                pdu,
                ..
            } => {
                let line = self
                    .output_generator
                    .pdu_received(source_agent, remote_peer, pdu);

                if self.automatic_responses_enabled {
                    self.auto_respond(source_agent, remote_peer, pdu).await;
                }

                line
            }

            AgentEvent::SentPdu {
                source_agent,
                remote_peer,
                pdu,
                ..
            } => self.output_generator.pdu_sent(source_agent, remote_peer, pdu),

            AgentEvent::CompletedBind {
                source_agent,
                remote_peer,
                ..
            } => self
                .output_generator
                .bind_completed(source_agent, remote_peer),

            AgentEvent::CompletedUnbind {
                source_agent,
                remote_peer,
                ..
            } => self
                .output_generator
                .unbind_completed(source_agent, remote_peer),

            AgentEvent::PeerTransportClosed {
                source_agent,
                remote_peer,
                ..
            } => self
                .output_generator
                .transport_closed(source_agent, remote_peer),

            AgentEvent::TransportError {
                source_agent,
                remote_peer,
                error,
                ..
            } => self
                .output_generator
                .transport_error(source_agent, remote_peer, error),

            AgentEvent::ApplicationError {
                source_agent, error, ..
            } => self
                .output_generator
                .application_error(source_agent, error),
        };

        self.write_line(&line).await;

        if self.proxy_enabled {
            // Unbounded, so the copy neither blocks nor reorders.
            let _ = self.proxy_tx.send(event);
        }
    }

    /// The auto-response policy: answer a known request PDU with the matching
    /// response, routed back through the agent that received the request.
    async fn auto_respond(&mut self, source_agent: &str, remote_peer: &str, pdu: &Pdu) {
        let response = match pdu.command_id {
            CommandId::EnquireLink => self.pdu_factory.create_enquire_link_resp(pdu),
            CommandId::SubmitSm => self
                .pdu_factory
                .create_submit_sm_resp(pdu, source_agent),
            _ => return,
        };

        if let Err(e) = self
            .agent_group
            .route(source_agent, remote_peer, response)
            .await
        {
            let line = format!(
                "unable to send automatic response from ({source_agent}) to ({remote_peer}): {e}"
            );
            self.write_line(&line).await;
        }
    }

    async fn handle_user_command(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::SendPdu(details) => {
                let pdu = match self.generate_pdu(&details) {
                    Ok(pdu) => pdu,
                    Err(message) => {
                        self.write_line(&message).await;
                        return Flow::Continue;
                    }
                };

                let command_name = pdu.command_name();
                if let Err(e) = self
                    .agent_group
                    .route(&details.sending_agent, &details.receiving_peer, pdu)
                    .await
                {
                    let line = format!(
                        "unable to send pdu ({command_name}) from ({}) to ({}): {e}",
                        details.sending_agent, details.receiving_peer
                    );
                    self.write_line(&line).await;
                }

                Flow::Continue
            }

            UserCommand::Help => {
                self.write_line(HELP_TEXT).await;
                Flow::Continue
            }

            UserCommand::Quit => {
                (self.quit_callback)();
                Flow::Quit
            }
        }
    }

    fn generate_pdu(&self, details: &SendPduDetails) -> Result<Pdu, String> {
        match details.command_id {
            CommandId::EnquireLink => Ok(self.pdu_factory.create_enquire_link()),
            CommandId::SubmitSm => self
                .pdu_factory
                .create_submit_sm(&details.params)
                .map_err(|e| e.to_string()),
            other => Err(format!(
                "don't know how to generate message of type ({})",
                other.name()
            )),
        }
    }

    async fn write_line(&mut self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        if let Err(e) = self.event_writer.write_all(&bytes).await {
            warn!(error = %e, "event output write failed");
        }
        let _ = self.event_writer.flush().await;
    }
}

const HELP_TEXT: &str = "\
<sending_agent_name>: send enquire-link to <peer_name>
<sending_agent_name>: send submit-sm to <peer_name> [params]
  params: [source_addr_npi=<npi_int>] [source_addr=<addr>] [dest_addr_npi=<npi_int>] [destination_addr=<addr>] [short_message=<message>]
quit";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentKind;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    /// AsyncWrite that appends into shared memory, for asserting output.
    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl SharedWriter {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl AsyncWrite for SharedWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn received_event(agent: &str, peer: &str, pdu: Pdu) -> AgentEvent {
        AgentEvent::ReceivedPdu {
            source_agent: agent.to_string(),
            agent_kind: AgentKind::Esme,
            remote_peer: peer.to_string(),
            pdu,
        }
    }

    #[tokio::test]
    async fn events_are_formatted_and_proxied() {
        let group = AgentGroup::new(Vec::new());
        let writer = SharedWriter::default();
        let mut app = StandardApplication::new(group)
            .disable_automatic_responses()
            .with_event_writer(Box::new(writer.clone()));
        let mut proxy = app.proxied_event_stream().unwrap();

        let (event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        let pump = tokio::spawn(app.run(event_rx, command_rx));

        event_tx
            .send(received_event("esme01", "smsc01", Pdu::enquire_link(1)))
            .await
            .unwrap();

        let proxied = proxy.recv().await.unwrap();
        assert_eq!(proxied.source_agent(), "esme01");

        command_tx.send(UserCommand::Quit).await.unwrap();
        pump.await.unwrap();

        assert!(writer
            .contents()
            .contains("esme01 received enquire-link from smsc01"));
    }

    #[tokio::test]
    async fn quit_invokes_callback_and_stops_pump() {
        let group = AgentGroup::new(Vec::new());
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();

        let app = StandardApplication::new(group)
            .with_event_writer(Box::new(tokio::io::sink()))
            .on_quit(move || {
                fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            });

        let (_event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        let pump = tokio::spawn(app.run(event_rx, command_rx));
        command_tx.send(UserCommand::Quit).await.unwrap();
        pump.await.unwrap();

        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_route_is_reported_to_writer() {
        let group = AgentGroup::new(Vec::new());
        let writer = SharedWriter::default();
        let app = StandardApplication::new(group)
            .with_event_writer(Box::new(writer.clone()));

        let (_event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        let pump = tokio::spawn(app.run(event_rx, command_rx));

        command_tx
            .send(UserCommand::SendPdu(SendPduDetails {
                sending_agent: "esme02".to_string(),
                receiving_peer: "smsc01".to_string(),
                command_id: CommandId::EnquireLink,
                params: Default::default(),
            }))
            .await
            .unwrap();
        command_tx.send(UserCommand::Quit).await.unwrap();
        pump.await.unwrap();

        let output = writer.contents();
        assert!(output.contains("unable to send pdu (enquire-link) from (esme02) to (smsc01)"));
        assert!(output.contains("not managing an agent named (esme02)"));
    }

    #[tokio::test]
    async fn help_prints_grammar() {
        let group = AgentGroup::new(Vec::new());
        let writer = SharedWriter::default();
        let app = StandardApplication::new(group)
            .with_event_writer(Box::new(writer.clone()));

        let (_event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        let pump = tokio::spawn(app.run(event_rx, command_rx));
        command_tx.send(UserCommand::Help).await.unwrap();
        command_tx.send(UserCommand::Quit).await.unwrap();
        pump.await.unwrap();

        assert!(writer.contents().contains("send enquire-link to <peer_name>"));
    }

    #[tokio::test]
    async fn auto_response_can_be_disabled() {
        // With no agents in the group, an auto-response attempt would write a
        // routing failure; disabled, the line must not appear.
        let group = AgentGroup::new(Vec::new());
        let writer = SharedWriter::default();
        let app = StandardApplication::new(group)
            .disable_automatic_responses()
            .with_event_writer(Box::new(writer.clone()));

        let (event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        let pump = tokio::spawn(app.run(event_rx, command_rx));
        event_tx
            .send(received_event("esme01", "smsc01", Pdu::enquire_link(4)))
            .await
            .unwrap();
        command_tx.send(UserCommand::Quit).await.unwrap();
        pump.await.unwrap();

        assert!(!writer.contents().contains("unable to send"));
    }
}
