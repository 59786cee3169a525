//! Tests for the wire protocol
//!
//! These tests verify:
//! - Command / response framing
//! - Rejection of malformed frames
//! - Mapping of errors onto tagged responses and back

use std::io::Cursor;
use std::time::Duration;

use replikv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, CommandType, Reply, Response, Status,
    HEADER_SIZE,
};
use replikv::{Mutation, ReadOptions, ReplError, WriteOptions};

#[test]
fn test_write_command_round_trip() {
    let command = Command::Write {
        batch: vec![Mutation::put("a", "1"), Mutation::delete("b")],
        options: WriteOptions {
            wait_for_sync: true,
            timeout: Some(Duration::from_millis(250)),
            ..WriteOptions::default()
        },
    };

    let bytes = encode_command(&command).unwrap();
    assert_eq!(bytes[0], CommandType::Write as u8);
    assert_eq!(decode_command(&bytes).unwrap(), command);
}

#[test]
fn test_stream_helpers() {
    let command = Command::MultiGet {
        keys: vec!["a".to_string(), "b".to_string()],
        options: ReadOptions::from_index(7),
    };
    let response = Response::Ok(Reply::Written { index: 9 });

    let mut buffer = Vec::new();
    write_command(&mut buffer, &command).unwrap();
    write_response(&mut buffer, &response).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), command);
    assert_eq!(read_response(&mut cursor).unwrap(), response);
}

#[test]
fn test_header_must_match_payload() {
    let mut bytes = encode_command(&Command::Ping).unwrap();
    bytes[0] = CommandType::Write as u8;

    let result = decode_command(&bytes);
    assert!(matches!(result, Err(ReplError::Protocol(_))));
}

#[test]
fn test_unknown_command_type() {
    let mut bytes = encode_command(&Command::Ping).unwrap();
    bytes[0] = 0xEE;

    let result = decode_command(&bytes);
    assert!(matches!(result, Err(ReplError::Protocol(_))));
}

#[test]
fn test_incomplete_frames() {
    let bytes = encode_command(&Command::Status).unwrap();

    assert!(matches!(
        decode_command(&bytes[..HEADER_SIZE - 1]),
        Err(ReplError::Protocol(_))
    ));

    let bytes = encode_command(&Command::Snapshot { wait_for_index: Some(3) }).unwrap();
    assert!(matches!(
        decode_command(&bytes[..bytes.len() - 1]),
        Err(ReplError::Protocol(_))
    ));
}

#[test]
fn test_oversized_payload_is_rejected() {
    let bytes = [CommandType::Ping as u8, 0xFF, 0xFF, 0xFF, 0xFF];

    assert!(matches!(decode_command(&bytes), Err(ReplError::Protocol(_))));
    assert!(matches!(
        read_command(&mut Cursor::new(bytes.to_vec())),
        Err(ReplError::Protocol(_))
    ));
}

#[test]
fn test_response_status_must_match_payload() {
    let mut bytes = encode_response(&Response::NotLeader).unwrap();
    assert_eq!(bytes[0], Status::NotLeader as u8);
    bytes[0] = Status::Ok as u8;

    assert!(matches!(decode_response(&bytes), Err(ReplError::Protocol(_))));
}

#[test]
fn test_errors_map_onto_tagged_responses() {
    let superseded = ReplError::GenerationSuperseded { submitted: 3, current: 4 };
    let response = Response::from_error(&superseded);
    assert_eq!(response.status(), Status::GenerationSuperseded);
    assert!(matches!(
        response.into_result(),
        Err(ReplError::GenerationSuperseded { submitted: 3, current: 4 })
    ));

    let response = Response::from_error(&ReplError::NotLeader);
    assert!(matches!(response.into_result(), Err(ReplError::NotLeader)));

    let response = Response::from_error(&ReplError::Timeout("write 5".to_string()));
    assert_eq!(response.status(), Status::Timeout);
    assert!(matches!(response.into_result(), Err(ReplError::Timeout(_))));

    // Everything else travels as a message
    let response = Response::from_error(&ReplError::SnapshotRegression { applied: 5, snapshot: 3 });
    assert_eq!(response.status(), Status::Error);
    assert!(matches!(response.into_result(), Err(ReplError::Remote(_))));
}

#[test]
fn test_lifecycle_errors_keep_their_kind() {
    let response = Response::from_error(&ReplError::Dropped);
    assert_eq!(response.status(), Status::Dropped);
    assert!(matches!(response.into_result(), Err(ReplError::Dropped)));

    let response = Response::from_error(&ReplError::NeedsResync { applied: 5 });
    assert_eq!(response.status(), Status::NeedsResync);
    let err = response.into_result().unwrap_err();
    assert!(err.needs_resync());
    assert!(matches!(err, ReplError::NeedsResync { applied: 5 }));

    // A gap reports the last index that did apply
    let response = Response::from_error(&ReplError::OutOfOrder { expected: 6, got: 7 });
    assert!(matches!(
        response.into_result(),
        Err(ReplError::NeedsResync { applied: 5 })
    ));

    // Tagged statuses survive the frame check
    let bytes = encode_response(&Response::NeedsResync { applied: 9 }).unwrap();
    assert_eq!(bytes[0], Status::NeedsResync as u8);
    assert_eq!(decode_response(&bytes).unwrap(), Response::NeedsResync { applied: 9 });
}
