//! Market data ingestion: wire parsing, synthetic fill-in, the receive
//! endpoint and the handler that drives them.

pub mod handler;
pub mod synthetic;
pub mod transport;
pub mod wire;

pub use handler::{FeedStats, HandlerState, MarketDataHandler, StartMode};
pub use synthetic::SyntheticGenerator;
pub use transport::{DatagramTransport, TransportBinder, UdpBinder, UdpTransport};
