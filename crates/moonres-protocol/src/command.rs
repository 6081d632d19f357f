//! Command re-serialization.
//!
//! The append-only log stores each write command exactly as a client
//! would send it: a RESP array whose first element is the command name.
//! [`encode_command`] rebuilds that wire form from a dispatched name and
//! its argument frames.

use bytes::{Bytes, BytesMut};

use crate::types::Frame;

/// Serializes a command name and its arguments back into a RESP array.
///
/// The resulting bytes are a valid client request for the same command,
/// replayable through the normal parse path.
pub fn encode_command(name: &str, args: &[Frame]) -> Bytes {
    let mut elements = Vec::with_capacity(1 + args.len());
    elements.push(Frame::Bulk(Bytes::copy_from_slice(name.as_bytes())));
    elements.extend_from_slice(args);

    let mut buf = BytesMut::new();
    Frame::Array(elements).serialize(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_frame;

    #[test]
    fn encodes_as_resp_array() {
        let args = vec![Frame::bulk("key"), Frame::bulk("value")];
        let encoded = encode_command("SET", &args);
        assert_eq!(
            &encoded[..],
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"
        );
    }

    #[test]
    fn encoded_command_reparses() {
        let args = vec![Frame::bulk("k"), Frame::bulk("v"), Frame::bulk("EX"), Frame::bulk("10")];
        let encoded = encode_command("SET", &args);

        let (frame, consumed) = parse_frame(&encoded).unwrap().unwrap();
        assert_eq!(consumed, encoded.len());
        match frame {
            Frame::Array(items) => {
                assert_eq!(items.len(), 5);
                assert_eq!(items[0], Frame::bulk("SET"));
                assert_eq!(items[4], Frame::bulk("10"));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn no_arguments() {
        let encoded = encode_command("SAVE", &[]);
        assert_eq!(&encoded[..], b"*1\r\n$4\r\nSAVE\r\n");
    }
}
