//! TCP front end: accepts sockets and runs one connection core per socket.

pub mod listener;
