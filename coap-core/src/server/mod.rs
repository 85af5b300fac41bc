//! Request routing (§4.12): a small resource table matching request paths
//! against registered handlers.

pub mod method;
pub mod path;
pub mod resource;
pub mod respond;

use std::net::SocketAddr;

use coap_msg::Message;

pub use resource::{resource_notify, Handler, Resource};

/// Default number of observers a resource registered via [`Router::route`]
/// can hold at once. Applications expecting more observers for a given
/// resource should build a [`Resource`] directly and use [`Router::insert`].
pub const DEFAULT_OBSERVER_CAPACITY: usize = 16;

/// An ordered table of [`Resource`]s, matched top to bottom.
pub struct Router<'a> {
  resources: Vec<Resource<'a>>,
  max_unfragmented_size: u32,
}

impl<'a> core::fmt::Debug for Router<'a> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Router")
     .field("resources", &self.resources.iter().map(Resource::pattern).collect::<Vec<_>>())
     .finish()
  }
}

impl<'a> Default for Router<'a> {
  fn default() -> Self {
    Self::new()
  }
}

impl<'a> Router<'a> {
  /// An empty router, with room for a Block1 request body up to
  /// [`crate::config::Block::default`]'s `max_unfragmented_size`.
  pub fn new() -> Self {
    Self { resources: Vec::new(),
           max_unfragmented_size: crate::config::Block::default().max_unfragmented_size }
  }

  /// Bound how large a reassembled Block1 request body is allowed to get —
  /// should match the [`Core`](crate::core::Core) it's paired with's
  /// [`crate::config::Config::block`].
  pub fn block_config(mut self, max_unfragmented_size: u32) -> Self {
    self.max_unfragmented_size = max_unfragmented_size;
    self
  }

  /// Register a handler for requests whose path matches `pattern`, with
  /// room for [`DEFAULT_OBSERVER_CAPACITY`] simultaneous observers.
  pub fn route(self, pattern: &'static str, handler: impl Fn(&Message) -> Option<Message> + 'a) -> Self {
    self.insert(Resource::new(pattern, handler, DEFAULT_OBSERVER_CAPACITY))
  }

  /// Register an already-constructed [`Resource`] (e.g. one built with a
  /// non-default observer capacity).
  pub fn insert(mut self, resource: Resource<'a>) -> Self {
    self.resources.push(resource);
    self
  }

  /// Borrow the resource matching `pattern`, if registered — used to drive
  /// [`resource_notify`] for a resource outside of request dispatch.
  pub fn resource_mut(&mut self, pattern: &str) -> Option<&mut Resource<'a>> {
    self.resources.iter_mut().find(|r| r.pattern() == pattern)
  }

  /// Dispatch `req` (received from `peer`) to the first matching resource,
  /// or `None` if nothing matches (the caller should respond 4.04 Not
  /// Found). A response whose class the request's No-Response option (RFC
  /// 7967) asks to suppress is swallowed here rather than handed back.
  pub fn dispatch(&mut self, req: &Message, peer: SocketAddr) -> Option<Message> {
    let path = req.path_string().ok()?;
    let max_size = self.max_unfragmented_size;

    let resp = self.resources
                   .iter_mut()
                   .filter(|r| path::matches_exact(r.pattern(), &path))
                   .find_map(|r| r.dispatch(req, peer, max_size))?;

    if crate::hop_limit::no_response_check(req, resp.code) {
      None
    } else {
      Some(resp)
    }
  }
}

#[cfg(test)]
mod tests {
  use coap_msg::{Code, Id, Token, Type};

  use super::*;

  fn peer() -> SocketAddr {
    "127.0.0.1:5683".parse().unwrap()
  }

  #[test]
  fn dispatches_to_matching_route() {
    let mut router =
      Router::new().route("sensors/temp", |req| Some(respond::ok(req, b"21.5".to_vec())))
                    .route("users/*", |req| Some(respond::ok(req, b"user".to_vec())));

    let mut req = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
    req.set_path("sensors/temp").unwrap();
    let resp = router.dispatch(&req, peer()).unwrap();
    assert_eq!(resp.payload.0, b"21.5");

    let mut req2 = Message::new(Type::Con, Code::GET, Id(2), Token(Vec::new()));
    req2.set_path("users/42").unwrap();
    assert!(router.dispatch(&req2, peer()).is_some());

    let mut req3 = Message::new(Type::Con, Code::GET, Id(3), Token(Vec::new()));
    req3.set_path("nope").unwrap();
    assert!(router.dispatch(&req3, peer()).is_none());
  }

  #[test]
  fn no_response_option_suppresses_matching_class() {
    let mut router = Router::new().route("sensors/temp", |req| Some(respond::ok(req, b"21.5".to_vec())));

    let mut req = Message::new(Type::Non, Code::GET, Id(1), Token(Vec::new()));
    req.set_path("sensors/temp").unwrap();
    req.set_no_response(0b0000_0010).unwrap(); // suppress 2.xx

    assert!(router.dispatch(&req, peer()).is_none());
  }

  #[test]
  fn observe_register_then_dispatch_again_notifies_the_same_observer() {
    let mut router = Router::new().route("sensors/temp", |req| Some(respond::ok(req, b"21.5".to_vec())));

    let mut req = Message::new(Type::Con, Code::GET, Id(1), Token(vec![1]));
    req.set_path("sensors/temp").unwrap();
    req.set_observe(0).unwrap();
    assert!(router.dispatch(&req, peer()).is_some());

    let resource = router.resource_mut("sensors/temp").unwrap();
    assert_eq!(resource.observers().iter().count(), 1);
  }
}
