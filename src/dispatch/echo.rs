use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::http::request::Request;
use crate::http::response::Response;

/// Answers every request with `200 text/plain` and a body of
/// `"<METHOD> <target>"`.
///
/// Used by the `hearth` binary so the server runs without a routing layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Dispatcher for Echo {
    async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        tracing::trace!(method = %request.method, target = %request.target, "Echoing request");
        Ok(Response::ok(format!("{} {}", request.method, request.target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{Method, RequestBuilder};

    #[tokio::test]
    async fn echoes_method_and_target() {
        let request = RequestBuilder::new()
            .method(Method::GET)
            .target("/hello")
            .build()
            .unwrap();

        let response = Echo.dispatch(request).await.unwrap();
        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(&response.body[..], b"GET /hello");
    }
}
