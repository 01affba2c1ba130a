// Line framing and frame decoding for the probe bus.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::io::{self, Error, ErrorKind};
use tokio_util::codec::Decoder;

/// One `{pin, rtd}` entry of a device frame.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawPoint {
    pub pin: i32,
    pub rtd: u32,
}

pub struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src.as_ref().iter().position(|b| *b == b'\n');
        if let Some(n) = newline {
            let line = src.split_to(n + 1);
            return match std::str::from_utf8(line.as_ref()) {
                Ok(s) => Ok(Some(s.to_string())),
                Err(_) => Err(Error::new(ErrorKind::Other, "Invalid String")),
            };
        }
        Ok(None)
    }
}

/// Decodes one line as a frame.
///
/// A valid cycle is a JSON array of `{"pin": int, "rtd": int}` objects.
/// Anything else is diagnostic output from the device; the raw line
/// travels back as the error so it can be reported to observers.
pub fn parse_frame(line: &str) -> Result<Vec<RawPoint>, String> {
    serde_json::from_str::<Vec<RawPoint>>(line).map_err(|_| line.to_string())
}
