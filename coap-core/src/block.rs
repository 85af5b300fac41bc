//! Block-wise transfer (§4.6): RFC 7959 Block1/Block2 and RFC 9177
//! Q-Block1/Q-Block2 reassembly and request construction, sharing a single
//! context shape.

use coap_msg::msg::opt::known::qblock;
use coap_msg::{ContentFormat, Message};

/// Which direction a [`BlockContext`] is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  /// Block1: the request body.
  Request,
  /// Block2: the response body.
  Response,
}

/// Classic Block vs Q-Block — mutually exclusive within a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  /// RFC 7959 classic Block1/Block2.
  Classic,
  /// RFC 9177 Q-Block1/Q-Block2.
  Quiet,
}

/// Reassembly/transfer state for one direction of one exchange.
#[derive(Debug, Clone)]
pub struct BlockContext {
  direction: Direction,
  kind: Kind,
  szx: u8,
  /// Offset, in bytes, of the next expected/next-to-send block.
  offset: u32,
  /// Total size if known from a Size1/Size2 option, else 0.
  total_size: u32,
  /// Cumulative bytes received so far, during reassembly.
  received: u32,
  /// ETag of the first block received, for RFC 9175 §3.3 identity checks.
  first_etag: Option<Vec<u8>>,
  body: Vec<u8>,
}

/// Error conditions the block engine can raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
  /// SZX value 7 (reserved) was encountered.
  ReservedSzx,
  /// A message carried both classic Block and Q-Block options.
  MixedClassicAndQuiet,
  /// Cumulative received size exceeded the configured maximum.
  TooLarge,
  /// RFC 9175 §3.3 identity check failed: a later block's ETag disagreed
  /// with the first block's.
  EtagMismatch,
  /// A `missing-blocks+cbor-seq` payload failed to decode/encode.
  BadMissingBlocksPayload,
}

impl BlockContext {
  /// Start a fresh context for `direction`, using `kind`'s option numbers,
  /// at block size exponent `szx` (`0..=6`).
  pub fn new(direction: Direction, kind: Kind, szx: u8) -> Result<Self, BlockError> {
    if szx > 6 {
      return Err(BlockError::ReservedSzx);
    }

    Ok(Self { direction,
              kind,
              szx,
              offset: 0,
              total_size: 0,
              received: 0,
              first_etag: None,
              body: Vec::new() })
  }

  /// Block size in octets (`16 << szx`).
  pub fn block_size(&self) -> u32 {
    16u32 << self.szx
  }

  /// Bytes received/sent so far.
  pub fn offset(&self) -> u32 {
    self.offset
  }

  /// Ingest one block of a response/request body. Advances the context by
  /// `payload.len()` (which may be less than `block_size()` on the final
  /// block) and computes the next block number from the updated offset.
  ///
  /// `etag`, if present, is checked against the first block's ETag per RFC
  /// 9175 §3.3; a mismatch or a later-missing-when-first-had-one aborts the
  /// transfer with [`BlockError::EtagMismatch`].
  pub fn ingest(&mut self,
                num: u32,
                more: bool,
                payload: &[u8],
                etag: Option<&[u8]>,
                max_unfragmented_size: u32)
                -> Result<(), BlockError> {
    if num == 0 {
      self.first_etag = etag.map(|e| e.to_vec());
    } else {
      match (&self.first_etag, etag) {
        | (Some(first), Some(this)) if first.as_slice() != this => {
          return Err(BlockError::EtagMismatch);
        },
        | (Some(_), None) => return Err(BlockError::EtagMismatch),
        | _ => {},
      }
    }

    self.body.extend_from_slice(payload);
    self.received += payload.len() as u32;
    self.offset += payload.len() as u32;

    if self.received > max_unfragmented_size {
      self.body.clear();
      self.received = 0;
      return Err(BlockError::TooLarge);
    }

    if !more {
      self.total_size = self.offset;
    }

    Ok(())
  }

  /// Has the full body been received (last block had `more == false`)?
  pub fn complete(&self) -> bool {
    self.total_size != 0 && self.offset == self.total_size
  }

  /// The reassembled body, once [`BlockContext::complete`].
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Block number of the next block to request/send, given the current
  /// offset and block size.
  pub fn next_num(&self) -> u32 {
    self.offset / self.block_size()
  }

  /// Construct the next request for this transfer, copying `prev`'s method
  /// and Uri-* options and appending a Block2 option `(NUM+1, M=0, SZX=current)`.
  /// Only meaningful for [`Direction::Response`] contexts driven by a client.
  pub fn next_request(&self, prev: &Message) -> Message {
    let mut req = prev.clone();
    req.set_payload(coap_msg::Payload(Vec::new()));

    match self.kind {
      | Kind::Classic => {
        let _ = req.set_block2(self.block_size() as u16, self.next_num(), false);
      },
      | Kind::Quiet => {
        let _ = req.set_qblock2(self.block_size() as u16, self.next_num(), false);
      },
    }

    req
  }

  /// Decode the `application/missing-blocks+cbor-seq` payload (content-format
  /// 272) carried by a Q-Block NACK into the ascending block numbers it
  /// names, de-duplicating consecutive repeats tolerated from the wire.
  pub fn decode_missing_blocks(payload: &[u8]) -> Result<Vec<u64>, BlockError> {
    qblock::missing_blocks::decode(payload).map_err(|_| BlockError::BadMissingBlocksPayload)
  }

  /// Encode a strictly-ascending list of missing block numbers as the
  /// `application/missing-blocks+cbor-seq` payload. Rejects non-ascending
  /// input.
  pub fn encode_missing_blocks(nums: &[u64]) -> Result<Vec<u8>, BlockError> {
    qblock::missing_blocks::encode(nums).map_err(|_| BlockError::BadMissingBlocksPayload)
  }

  /// Content-format identifier for the missing-blocks payload.
  pub fn missing_blocks_content_format() -> ContentFormat {
    ContentFormat::Other(272)
  }
}

/// Exponent such that `16 << szx == size`, for reconstructing a
/// [`BlockContext`] from a wire-parsed Block option's size field. `size` is
/// always one of `16, 32, ..., 1024` coming off the wire (the option codec
/// clamps SZX to `0..=6` when decoding), so this never needs to fail.
pub fn szx_for_size(size: u16) -> u8 {
  match size {
    | 16 => 0,
    | 32 => 1,
    | 64 => 2,
    | 128 => 3,
    | 256 => 4,
    | 512 => 5,
    | _ => 6,
  }
}

/// Validate that a message does not mix classic Block and Q-Block options.
pub fn validate_not_mixed(msg: &Message) -> Result<(), BlockError> {
  let has_classic = msg.block1().is_some() || msg.block2().is_some();
  let has_quiet = msg.qblock1().is_some() || msg.qblock2().is_some();

  if has_classic && has_quiet {
    Err(BlockError::MixedClassicAndQuiet)
  } else {
    Ok(())
  }
}
