//! A plain CoAP server: a couple of routes returning a fixed payload, driven
//! by a `std::net::UdpSocket` and wall-clock time.

use std::net::UdpSocket;
use std::time::Duration;

use coap_core::config::Config;
use coap_core::core::{Core, Incoming};
use coap_core::net::Socket;
use coap_core::server::{respond, Router};
use coap_core::time::SystemClock;

fn main() -> std::io::Result<()> {
  simple_logger::SimpleLogger::new().init().ok();

  let sock = UdpSocket::bind_raw("0.0.0.0:5683")?;
  let mut core = Core::new(SystemClock::new(), sock, Config::default());

  let mut router =
    Router::new().route("sensors/temp", |req| Some(respond::ok(req, b"21.5".to_vec())))
                 .route("hello", |req| Some(respond::ok(req, b"hello, world".to_vec())));

  log::info!("listening on {}", core.socket().local_addr());

  loop {
    match core.poll() {
      | Ok(Incoming::Unmatched(req, peer)) => {
        let resp = router.dispatch(&req, peer).unwrap_or_else(|| respond::not_found(&req));
        if let Err(e) = core.send_resp(resp, peer) {
          log::warn!("send error: {e:?}");
        }
      },
      | Ok(Incoming::Duplicate(..)) | Ok(Incoming::Ack(_)) | Ok(Incoming::Response(..)) | Ok(Incoming::BlockContinuing(_)) => {},
      | Err(nb::Error::WouldBlock) => {
        std::thread::sleep(Duration::from_millis(10));
      },
      | Err(nb::Error::Other(e)) => log::warn!("poll error: {e:?}"),
    }

    match core.poll_retries() {
      | Ok(timed_out) => {
        for t in timed_out {
          log::warn!("request to {} (id {:?}) timed out", t.peer, t.id);
        }
      },
      | Err(e) => log::warn!("retry error: {e:?}"),
    }
  }
}
