//! Tests for Connection
//!
//! These tests verify:
//! - Dial and handshake (connection id learned from the drive)
//! - Sequence and connection id stamping on send
//! - HMAC, framing and decoding failures on receive
//! - Close and use-after-close behaviour

#[path = "../common/mod.rs"]
mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{
    options, response_to, signed_frame, signed_frame_with_key, spawn_drive, spawn_silent_drive,
    untagged_frame, KEY,
};
use kinetic::auth::{compute_hmac, validate_hmac};
use kinetic::network::ConnectionState;
use kinetic::protocol::{
    encode_frame, AuthType, Command, Message, MessageType, StatusCode as WireCode,
};
use kinetic::{Connection, KineticError};

// =============================================================================
// Open / Handshake
// =============================================================================

#[test]
fn test_handshake_learns_connection_id() {
    let (port, drive) = spawn_drive(42, |_| {});

    let conn = Connection::open(options(port)).unwrap();

    assert_eq!(conn.connection_id(), 42);
    assert_eq!(conn.next_sequence(), 1);
    assert_eq!(conn.state(), ConnectionState::Open);
    drive.join().unwrap();
}

#[test]
fn test_dial_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    match Connection::open(options(port)) {
        Err(KineticError::Dial { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{}", port)),
        Err(e) => panic!("Expected Dial, got {}", e),
        Ok(_) => panic!("Expected Dial error"),
    }
}

#[test]
fn test_handshake_failure_on_early_close() {
    let (port, drive) = spawn_silent_drive(drop);

    match Connection::open(options(port)) {
        Err(KineticError::Handshake(inner)) => {
            assert!(matches!(*inner, KineticError::ConnectionClosed))
        }
        Err(e) => panic!("Expected Handshake, got {}", e),
        Ok(_) => panic!("Expected Handshake error"),
    }
    drive.join().unwrap();
}

#[test]
fn test_handshake_failure_on_bad_magic() {
    let (port, drive) = spawn_silent_drive(|mut stream| {
        use std::io::Write;
        stream.write_all(b"Xgarbage!").unwrap();
    });

    match Connection::open(options(port)) {
        Err(KineticError::Handshake(inner)) => {
            assert!(matches!(*inner, KineticError::InvalidMagic(b'X')))
        }
        Err(e) => panic!("Expected Handshake, got {}", e),
        Ok(_) => panic!("Expected Handshake error"),
    }
    drive.join().unwrap();
}

#[test]
fn test_invalid_options_rejected_before_dial() {
    let mut opts = options(1);
    opts.hmac_key.clear();
    assert!(matches!(Connection::open(opts), Err(KineticError::Config(_))));
}

// =============================================================================
// Send
// =============================================================================

#[test]
fn test_send_stamps_sequence_and_connection_id() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let (message, command, value) = conn.read_request().unwrap();
        assert!(validate_hmac(&message, KEY));
        assert_eq!(message.hmac_auth.as_ref().unwrap().identity, 1);
        assert_eq!(command.header.sequence, Some(1));
        assert_eq!(command.header.connection_id, Some(42));
        assert!(value.is_none());

        let (message, command, value) = conn.read_request().unwrap();
        assert!(validate_hmac(&message, KEY));
        assert_eq!(command.header.sequence, Some(2));
        assert_eq!(command.message_type(), Some(MessageType::Put));
        assert_eq!(value.as_deref(), Some(&b"payload"[..]));
    });

    let conn = Connection::open(options(port)).unwrap();

    let first = conn.send(&mut Command::new(MessageType::Noop), &[]).unwrap();
    let second = conn.send(&mut Command::new(MessageType::Put), b"payload").unwrap();

    assert_eq!((first, second), (1, 2));
    assert_eq!(conn.next_sequence(), 3);
    drive.join().unwrap();
}

#[test]
fn test_send_raw_tags_given_bytes() {
    let (port, drive) = spawn_drive(7, |mut conn| {
        let (message, command, _) = conn.read_request().unwrap();
        assert!(validate_hmac(&message, KEY));
        assert_eq!(
            message.hmac_auth.unwrap().hmac,
            compute_hmac(&message.command_bytes, KEY).unwrap()
        );
        // Raw sends are not sequenced
        assert_eq!(command.header.sequence, None);
    });

    let conn = Connection::open(options(port)).unwrap();
    let bytes = Command::new(MessageType::Noop).to_bytes().unwrap();
    conn.send_raw(bytes, &[]).unwrap();

    assert_eq!(conn.next_sequence(), 1);
    drive.join().unwrap();
}

#[test]
fn test_failed_register_does_not_consume_sequence() {
    let (port, drive) = spawn_drive(1, |mut conn| {
        let (_, command, _) = conn.read_request().unwrap();
        assert_eq!(command.header.sequence, Some(1));
    });

    let conn = Connection::open(options(port)).unwrap();
    let refused = conn.send_with(&mut Command::new(MessageType::Noop), &[], |_| {
        Err(KineticError::ConnectionClosed)
    });
    assert!(refused.is_err());

    assert_eq!(conn.send(&mut Command::new(MessageType::Noop), &[]).unwrap(), 1);
    drive.join().unwrap();
}

// =============================================================================
// Receive
// =============================================================================

#[test]
fn test_receive_response_with_value() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let (_, request, _) = conn.read_request().unwrap();
        let response = response_to(&request, WireCode::Success);
        conn.reply(&response, b"hello");
    });

    let conn = Connection::open(options(port)).unwrap();
    let sequence = conn.send(&mut Command::new(MessageType::Get), &[]).unwrap();

    let received = conn.receive().unwrap();
    assert_eq!(received.command.header.ack_sequence, Some(sequence));
    assert_eq!(received.command.status_code(), Some(WireCode::Success));
    assert_eq!(received.value.as_deref(), Some(&b"hello"[..]));
    drive.join().unwrap();
}

#[test]
fn test_receive_updates_connection_id() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let mut command = Command::new(MessageType::NoopResponse);
        command.header.connection_id = Some(43);
        conn.reply(&command, &[]);
    });

    let conn = Connection::open(options(port)).unwrap();
    conn.receive().unwrap();

    assert_eq!(conn.connection_id(), 43);
    drive.join().unwrap();
}

#[test]
fn test_bad_magic_makes_connection_unusable() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        conn.send_raw(&[b'X', 0, 0, 0, 0, 0, 0, 0, 0]);
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::InvalidMagic(b'X'))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    assert!(matches!(conn.receive(), Err(KineticError::ConnectionUnusable)));
    assert!(matches!(
        conn.send(&mut Command::new(MessageType::Noop), &[]),
        Err(KineticError::ConnectionUnusable)
    ));
    drive.join().unwrap();
}

#[test]
fn test_wrong_key_is_integrity_failure() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let response = Command::new(MessageType::NoopResponse).with_status(WireCode::Success, "");
        conn.send_raw(&signed_frame_with_key(&response, &[], b"not the key"));
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::IntegrityFailure(_))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    drive.join().unwrap();
}

#[test]
fn test_flipped_command_bit_is_integrity_failure() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let response = Command::new(MessageType::NoopResponse).with_status(WireCode::Success, "");
        let command_bytes = response.to_bytes().unwrap();
        let hmac = compute_hmac(&command_bytes, KEY).unwrap();

        let mut tampered = command_bytes.clone();
        tampered[0] ^= 0x01;
        let envelope = Message::hmac(1, hmac, tampered).to_bytes().unwrap();
        conn.send_raw(&encode_frame(&envelope, &[]).unwrap());
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::IntegrityFailure(_))));
    drive.join().unwrap();
}

#[test]
fn test_untagged_status_after_handshake_is_received() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let status = Command::default().with_status(WireCode::ServiceBusy, "shutting down");
        conn.send_raw(&untagged_frame(AuthType::UnsolicitedStatus, &status, &[]));
    });

    let conn = Connection::open(options(port)).unwrap();

    let received = conn.receive().unwrap();
    assert_eq!(received.message.auth_type, AuthType::UnsolicitedStatus);
    assert_eq!(received.command.status_code(), Some(WireCode::ServiceBusy));
    assert_eq!(conn.state(), ConnectionState::Open);
    drive.join().unwrap();
}

#[test]
fn test_untagged_status_acknowledging_request_is_integrity_failure() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let mut forged = Command::new(MessageType::GetResponse).with_status(WireCode::Success, "");
        forged.header.ack_sequence = Some(1);
        conn.send_raw(&untagged_frame(AuthType::UnsolicitedStatus, &forged, b"forged"));
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::IntegrityFailure(_))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    drive.join().unwrap();
}

#[test]
fn test_pin_auth_is_integrity_failure() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let response = Command::new(MessageType::NoopResponse).with_status(WireCode::Success, "");
        conn.send_raw(&untagged_frame(AuthType::PinAuth, &response, &[]));
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::IntegrityFailure(_))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    drive.join().unwrap();
}

#[test]
fn test_malformed_envelope_is_unmarshal_error() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        conn.send_raw(&encode_frame(b"definitely not bincode", &[]).unwrap());
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::Unmarshal(_))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    drive.join().unwrap();
}

#[test]
fn test_oversized_segment_is_rejected() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let response = Command::new(MessageType::GetResponse).with_status(WireCode::Success, "");
        conn.send_raw(&signed_frame(&response, &[0u8; 4096]));
    });

    let mut opts = options(port);
    opts.max_segment_len = 1024;
    let conn = Connection::open(opts).unwrap();

    assert!(matches!(
        conn.receive(),
        Err(KineticError::FrameTooLarge { len: 4096, max: 1024 })
    ));
    drive.join().unwrap();
}

#[test]
fn test_truncated_frame() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        let response = Command::new(MessageType::NoopResponse).with_status(WireCode::Success, "");
        let frame = signed_frame(&response, b"value");
        conn.send_raw(&frame[..frame.len() - 2]);
    });

    let conn = Connection::open(options(port)).unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::TruncatedFrame(_))));
    assert_eq!(conn.state(), ConnectionState::Broken);
    drive.join().unwrap();
}

#[test]
fn test_drive_closing_is_clean() {
    let (port, drive) = spawn_drive(42, |_| {});

    let conn = Connection::open(options(port)).unwrap();
    drive.join().unwrap();

    assert!(matches!(conn.receive(), Err(KineticError::ConnectionClosed)));
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn test_read_timeout_at_boundary_is_not_fatal() {
    let (port, drive) = spawn_drive(42, |mut conn| {
        thread::sleep(Duration::from_millis(200));
        let response = Command::new(MessageType::NoopResponse).with_status(WireCode::Success, "");
        conn.reply(&response, &[]);
    });

    let mut opts = options(port);
    opts.read_timeout = Some(Duration::from_millis(50));
    let conn = Connection::open(opts).unwrap();

    let mut timeouts = 0;
    let received = loop {
        match conn.receive() {
            Ok(received) => break received,
            Err(e) if e.is_timeout() => {
                assert_eq!(conn.state(), ConnectionState::Open);
                timeouts += 1;
                assert!(timeouts < 100, "response never arrived");
            }
            Err(e) => panic!("Unexpected error: {}", e),
        }
    };

    assert!(timeouts > 0);
    assert_eq!(received.command.message_type(), Some(MessageType::NoopResponse));
    drive.join().unwrap();
}

// =============================================================================
// Close
// =============================================================================

#[test]
fn test_use_after_close() {
    let (port, drive) = spawn_drive(42, |mut conn| while conn.read_request().is_some() {});

    let conn = Connection::open(options(port)).unwrap();
    conn.close();
    conn.close();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(matches!(
        conn.send(&mut Command::new(MessageType::Noop), &[]),
        Err(KineticError::ConnectionClosed)
    ));
    assert!(matches!(conn.receive(), Err(KineticError::ConnectionClosed)));
    drive.join().unwrap();
}

#[test]
fn test_close_unblocks_pending_receive() {
    let (port, drive) = spawn_drive(42, |mut conn| while conn.read_request().is_some() {});

    let conn = Arc::new(Connection::open(options(port)).unwrap());
    let receiver = {
        let conn = Arc::clone(&conn);
        thread::spawn(move || conn.receive())
    };

    thread::sleep(Duration::from_millis(100));
    conn.close();

    let result = receiver.join().unwrap();
    assert!(matches!(result, Err(KineticError::ConnectionClosed)));
    drive.join().unwrap();
}
