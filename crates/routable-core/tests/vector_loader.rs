//! JSON test vector loader shared by envelope tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;

use routable_core::{EnvelopeType, Frame};

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub frame: FrameData,
    #[serde(default)]
    pub expected_type: Option<EnvelopeType>,
    #[serde(default)]
    pub expect: Option<serde_json::Value>,
    #[serde(default)]
    pub expect_absent: bool,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub encoding: String,
    pub data: String,
}

impl FrameData {
    pub fn decode(&self) -> Frame {
        match self.encoding.as_str() {
            "text" => Frame::Text(self.data.clone()),
            "base64" => Frame::Binary(Bytes::from(
                base64::engine::general_purpose::STANDARD
                    .decode(&self.data)
                    .expect("invalid base64 in test vector"),
            )),
            "hex" => Frame::Binary(Bytes::from(
                hex::decode(&self.data).expect("invalid hex in test vector"),
            )),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}
