//! Request dispatch seam.
//!
//! The connection core hands every fully received request to a
//! [`Dispatcher`] and writes back whatever it returns. Routing, middleware and
//! error translation live behind this trait, outside the core.
//!
//! Any async closure taking a [`Request`] is a dispatcher:
//!
//! ```
//! use hearth::dispatch::Dispatcher;
//! use hearth::error::DispatchError;
//! use hearth::http::request::Request;
//! use hearth::http::response::Response;
//!
//! fn assert_dispatcher<D: Dispatcher>(_: D) {}
//!
//! assert_dispatcher(|request: Request| async move {
//!     Ok::<_, DispatchError>(Response::ok(format!("{} {}", request.method, request.target)))
//! });
//! ```

pub mod echo;

use std::future::Future;

use crate::error::DispatchError;
use crate::http::request::Request;
use crate::http::response::Response;

pub use echo::Echo;

pub trait Dispatcher: Send + Sync + 'static {
    /// Produces the response for one request.
    ///
    /// `Err(DispatchError::Fault)` (or a panic) is answered with a generic
    /// `500`; `Err(DispatchError::Respond)` sends the supplied response.
    /// Either way the connection closes afterwards.
    fn dispatch(&self, request: Request) -> impl Future<Output = Result<Response, DispatchError>> + Send;
}

impl<F, Fut> Dispatcher for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, DispatchError>> + Send,
{
    fn dispatch(&self, request: Request) -> impl Future<Output = Result<Response, DispatchError>> + Send {
        self(request)
    }
}
