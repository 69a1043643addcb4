// Socket module - transport seam and the shared teardown discipline
pub mod connection;
pub mod mock;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use mock::{MockTransport, TransportEvent};
pub use transport::{InboundFrame, SocketSink, Transport, TungsteniteTransport};
