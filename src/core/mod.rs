pub mod connection;

pub use connection::{ConnectionError, ConnectionListener, ConnectionManager, RpcConnection};
