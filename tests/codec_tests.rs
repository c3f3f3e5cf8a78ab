use msfcli::codec::{self, HEADER_LEN, MAX_MESSAGE_LEN};
use msfcli::protocol::Inbound;
use msfcli::transport::Frame;
use msfcli::Error;
use serde_json::json;
use tokio::test;

/// Packed frames carry a big-endian length prefix
#[test]
async fn test_pack_layout() {
    let message = json!({ "event": "photo" });
    let frame = codec::pack(&message, &[1, 2, 3]).unwrap();

    let json = serde_json::to_vec(&message).unwrap();
    assert_eq!(&frame[..HEADER_LEN], &(json.len() as u16).to_be_bytes());
    assert_eq!(&frame[HEADER_LEN..HEADER_LEN + json.len()], json.as_slice());
    assert_eq!(&frame[HEADER_LEN + json.len()..], &[1, 2, 3]);
}

/// Messages and payloads survive pack then unpack
#[test]
async fn test_pack_unpack() {
    let samples = [
        (json!({ "event": "a", "data": null }), Vec::new()),
        (json!({ "event": "b", "data": [1, 2] }), vec![0u8; 1024]),
        (json!({ "method": "m", "params": { "k": "é" } }), vec![255, 0, 127]),
    ];

    for (message, payload) in samples {
        let frame = codec::pack(&message, &payload).unwrap();
        let unpacked = codec::unpack(&frame).unwrap();
        assert_eq!(unpacked.message, message);
        assert_eq!(unpacked.payload, payload);
    }
}

/// A JSON block longer than the prefix can describe is rejected
#[test]
async fn test_pack_too_large() {
    let message = json!({ "data": "x".repeat(MAX_MESSAGE_LEN) });

    match codec::pack(&message, &[]) {
        Err(Error::MessageTooLarge(len)) => assert!(len > MAX_MESSAGE_LEN),
        other => panic!("Expected MessageTooLarge, got {:?}", other),
    }
}

/// Truncated and malformed frames fail to decode
#[test]
async fn test_unpack_malformed() {
    assert!(matches!(codec::unpack(&[]), Err(Error::Decode(_))));
    assert!(matches!(codec::unpack(&[0]), Err(Error::Decode(_))));

    // Declares 16 bytes but carries 2
    assert!(matches!(codec::unpack(&[0, 16, b'{', b'}']), Err(Error::Decode(_))));

    // Length fits but the JSON does not parse
    assert!(matches!(codec::unpack(&[0, 3, b'{', b'x', b'}']), Err(Error::Decode(_))));
}

/// Text frames decode to events and responses
#[test]
async fn test_decode_text_frames() {
    let event = codec::decode_frame(Frame::Text(
        r#"{"event":"say","data":"hi","from":"c1"}"#.to_string(),
    ))
    .unwrap();
    match event {
        Inbound::Event(message) => {
            assert_eq!(message.event, "say");
            assert_eq!(message.data, json!("hi"));
            assert_eq!(message.from.as_deref(), Some("c1"));
            assert_eq!(message.payload, None);
        }
        other => panic!("Expected event, got {:?}", other),
    }

    let response =
        codec::decode_frame(Frame::Text(r#"{"id":7,"result":{"ok":true}}"#.to_string())).unwrap();
    match response {
        Inbound::Response(response) => {
            assert_eq!(response.call_id(), Some(7));
            assert_eq!(response.result, Some(json!({ "ok": true })));
        }
        other => panic!("Expected response, got {:?}", other),
    }
}

/// Binary frames keep their payload
#[test]
async fn test_decode_binary_frame() {
    let frame = codec::encode_frame(&json!({ "event": "file", "data": "a.bin" }), Some(&[9, 8, 7]))
        .unwrap();
    assert!(matches!(frame, Frame::Binary(_)));

    match codec::decode_frame(frame).unwrap() {
        Inbound::Event(message) => {
            assert_eq!(message.event, "file");
            assert_eq!(message.payload, Some(vec![9, 8, 7]));
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

/// Without a payload a message is encoded as text
#[test]
async fn test_encode_text_frame() {
    let frame = codec::encode_frame(&json!({ "method": "m" }), None).unwrap();
    assert_eq!(frame, Frame::Text(r#"{"method":"m"}"#.to_string()));
}
