//! smppth: an SMPP v3.4 test harness.
//!
//! The harness impersonates a configurable population of ESMEs and SMSCs,
//! drives them from a text command channel, and surfaces every protocol
//! event (PDUs sent and received, bind completion, transport failure) on a
//! shared event stream.

pub mod agent;
pub mod app;
pub mod config;
pub mod pdu;
pub mod telemetry;

pub use agent::{
    Agent, AgentError, AgentEvent, AgentGroup, AgentKind, BindDescriptor, Esme,
    MessageDescriptor, RouteError, Smsc,
};
pub use app::{StandardApplication, TextCommandParser, UserCommand};
pub use config::Config;
pub use pdu::{CommandId, Pdu};
