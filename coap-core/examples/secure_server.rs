//! A CoAP server that additionally understands OSCORE-protected requests
//! (RFC 8613). The AEAD itself is stubbed out — see [`DemoCrypto`] — a real
//! deployment plugs in a COSE/AES-CCM implementation behind
//! [`coap_core::oscore::OscoreCrypto`].

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use coap_core::block::{BlockContext, Direction};
use coap_core::config::Config;
use coap_core::core::{Core, Incoming};
use coap_core::net::Socket;
use coap_core::oscore::{self, Exchange, ExchangeCache, OscoreCrypto, Outer};
use coap_core::server::{respond, Router};
use coap_core::time::SystemClock;
use coap_msg::{OscoreOption, Token};

/// Stand-in for a real OSCORE security context: "decrypts" by returning the
/// ciphertext unchanged. Exists only so this example can exercise the
/// envelope-processing control flow without pulling in a COSE crate.
struct DemoCrypto;

impl OscoreCrypto for DemoCrypto {
  type Error = std::convert::Infallible;

  fn verify(&mut self,
            _kid: &[u8],
            _partial_iv: Option<&[u8]>,
            ciphertext: &[u8])
            -> Result<Vec<u8>, Self::Error> {
    Ok(ciphertext.to_vec())
  }

  fn protect(&mut self, kid: &[u8], plaintext: &[u8]) -> Result<(OscoreOption, Vec<u8>), Self::Error> {
    Ok((OscoreOption { partial_iv: None,
                       kid_context: None,
                       kid: Some(kid.to_vec()) },
        plaintext.to_vec()))
  }
}

fn main() -> std::io::Result<()> {
  simple_logger::SimpleLogger::new().init().ok();

  let sock = UdpSocket::bind_raw("0.0.0.0:5683")?;
  let config = Config::default();
  let mut core = Core::new(SystemClock::new(), sock, config);
  let mut crypto = DemoCrypto;
  let mut exchanges: ExchangeCache<SystemClock> =
    ExchangeCache::new(config.oscore.exchange_cache_size, config.oscore.exchange_lifetime_millis);

  let mut router = Router::new().route("sensors/temp", |req| Some(respond::ok(req, b"21.5".to_vec())));
  let mut outer_blocks: HashMap<(SocketAddr, Token), BlockContext> = HashMap::new();

  log::info!("listening on {}", core.socket().local_addr());

  loop {
    match core.poll() {
      | Ok(Incoming::Unmatched(req, peer)) => {
        let resp = match oscore::extract(&req) {
          | Ok(Some(opt)) => {
            let key = (peer, req.token.clone());
            let mut ctx = outer_blocks.remove(&key);
            let max_size = config.oscore.max_unfragmented_size;

            match oscore::reassemble_outer(&req, &mut ctx, Direction::Request, max_size) {
              | Ok(Outer::NeedMore(ack)) => {
                outer_blocks.insert(key, ctx.expect("reassembly in progress"));
                ack
              },
              | Ok(Outer::Complete(ciphertext)) => {
                let kid = opt.kid.clone().unwrap_or_default();
                match crypto.verify(&kid, opt.partial_iv.as_deref(), &ciphertext) {
                  | Ok(_inner_plaintext) => {
                    if let Ok(now_millis) = core.now_millis() {
                      exchanges.insert(core.clock(),
                                        now_millis,
                                        Exchange { peer,
                                                   token: req.token.clone(),
                                                   kid,
                                                   is_observe: false });
                    }
                    router.dispatch(&req, peer).unwrap_or_else(|| respond::not_found(&req))
                  },
                  | Err(_) => respond::for_request(&req,
                                                   oscore::OscoreFailure::DecryptFailed.response_code(),
                                                   Vec::new()),
                }
              },
              | Err(failure) => respond::for_request(&req, failure.response_code(), Vec::new()),
            }
          },
          | Ok(None) => router.dispatch(&req, peer).unwrap_or_else(|| respond::not_found(&req)),
          | Err(failure) => respond::for_request(&req, failure.response_code(), Vec::new()),
        };

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
