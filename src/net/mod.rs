//! Non-blocking networking plane: socket wrappers, the edge-triggered
//! reactor, and the reactor-per-core pool.

mod pool;
mod reactor;
mod socket;

pub use pool::{AcceptHandler, ReactorPool, ReactorPoolConfig};
pub use reactor::{Callback, Interest, Reactor, ReactorHandle, Token};
pub use socket::{TcpListener, TcpSocket};
