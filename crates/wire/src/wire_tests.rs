// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Request, Response};
use std::io::Cursor;

#[test]
fn encode_returns_raw_json_without_prefix() {
    let bytes = encode(&Request::Ping).unwrap();
    // encode() returns raw JSON, no length prefix
    assert_eq!(bytes[0], b'{');
    let back: Request = decode(&bytes).unwrap();
    assert_eq!(back, Request::Ping);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = Request::Cancel { run_id: "run-A".to_string() };
    let mut buffer = Vec::new();
    write_message(&mut buffer, &original).await.expect("write failed");

    // write_message adds 4-byte length prefix
    assert!(buffer.len() > 4);

    let mut cursor = Cursor::new(buffer);
    let read_back: Option<Request> = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back, Some(original));
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &Response::Pong).await.expect("write failed");

    // First 4 bytes are the length prefix
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
    assert_eq!(len as usize, buffer.len() - 4);
}

#[tokio::test]
async fn clean_eof_reads_as_none() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let message: Option<Request> = read_message(&mut cursor).await.unwrap();
    assert!(message.is_none());
}

#[tokio::test]
async fn truncated_payload_is_an_error() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &Request::Ping).await.unwrap();
    buffer.truncate(buffer.len() - 2);

    let mut cursor = Cursor::new(buffer);
    let result: Result<Option<Request>, _> = read_message(&mut cursor).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn oversized_frame_is_rejected_without_buffering() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
    let mut cursor = Cursor::new(buffer);
    let result: Result<Option<Request>, _> = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
}

#[tokio::test]
async fn multiple_messages_read_in_order() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &Request::Ping).await.unwrap();
    write_message(&mut buffer, &Request::Shutdown).await.unwrap();

    let mut cursor = Cursor::new(buffer);
    let first: Option<Request> = read_message(&mut cursor).await.unwrap();
    let second: Option<Request> = read_message(&mut cursor).await.unwrap();
    let third: Option<Request> = read_message(&mut cursor).await.unwrap();
    assert_eq!(first, Some(Request::Ping));
    assert_eq!(second, Some(Request::Shutdown));
    assert!(third.is_none());
}
