use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use tokio_util::codec::Decoder;

use crate::protocol::codec::{PostgresCodec, StartupCodec, get_cstring};
use crate::protocol::error::ProtocolError;

const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103
const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104
const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678; // 80877102

/// Messages sent by the frontend (client) during startup phase.
#[derive(Debug)]
pub enum StartupMessage {
    /// SSLRequest - refused, the server only speaks plain TCP
    SslRequest,
    /// GSSENCRequest - refused as well
    GssEncRequest,
    /// CancelRequest - client wants another session closed
    CancelRequest { process_id: i32, secret_key: i32 },
    /// StartupMessage - normal connection startup
    Startup {
        protocol_version: i32,
        parameters: StartupParameters,
    },
}

impl StartupMessage {
    /// Decodes one complete startup-phase message (length prefix included).
    fn decode(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let _len = src.get_i32();
        let code = src.get_i32();

        match code {
            SSL_REQUEST_CODE => Ok(StartupMessage::SslRequest),
            GSSENC_REQUEST_CODE => Ok(StartupMessage::GssEncRequest),
            CANCEL_REQUEST_CODE => {
                if src.len() < 8 {
                    return Err(ProtocolError::InvalidMessage);
                }
                Ok(StartupMessage::CancelRequest {
                    process_id: src.get_i32(),
                    secret_key: src.get_i32(),
                })
            }
            version if (version >> 16) == 3 => Ok(StartupMessage::Startup {
                protocol_version: version,
                parameters: StartupParameters::decode(src)?,
            }),
            _ => Err(ProtocolError::UnsupportedProtocolVersion(code)),
        }
    }
}

/// Startup parameters from the client
#[derive(Debug, Clone, Default)]
pub struct StartupParameters {
    pub user: String,
    pub database: Option<String>,
    pub application_name: Option<String>,
    pub other: HashMap<String, String>,
}

impl StartupParameters {
    /// Name of the database the client wants.
    ///
    /// Clients that omit `database` get the database named after their user,
    /// as PostgreSQL does.
    pub fn database_name(&self) -> &str {
        self.database.as_deref().unwrap_or(&self.user)
    }

    /// Decodes name/value pairs up to the empty-name terminator.
    fn decode(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let mut params = StartupParameters::default();

        while !src.is_empty() {
            let name = get_cstring(src)?;
            if name.is_empty() {
                break;
            }
            let value = get_cstring(src)?;

            match name.as_str() {
                "user" => params.user = value,
                "database" => params.database = Some(value),
                "application_name" => params.application_name = Some(value),
                _ => {
                    params.other.insert(name, value);
                }
            }
        }

        if params.user.is_empty() {
            return Err(ProtocolError::MissingParameter("user"));
        }

        Ok(params)
    }
}

impl Decoder for StartupCodec {
    type Item = StartupMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // length + code
        if src.len() < 8 {
            return Ok(None);
        }

        let len = i32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len < 8 {
            return Err(ProtocolError::InvalidMessage);
        }
        if len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge(len));
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut msg_buf = src.split_to(len);
        StartupMessage::decode(&mut msg_buf).map(Some)
    }
}

/// Messages sent by the frontend (client) during query phase.
///
/// Only the Simple Query protocol is understood.
#[derive(Debug)]
pub enum FrontendMessage {
    /// 'Q' - Simple query
    Query(String),
    /// 'X' - Termination
    Terminate,
}

impl FrontendMessage {
    /// Decodes one complete message (type byte and length included).
    fn decode(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let msg_type = src.get_u8();
        let _length = src.get_i32();
        match msg_type {
            b'Q' => Ok(FrontendMessage::Query(get_cstring(src)?)),
            b'X' => Ok(FrontendMessage::Terminate),
            _ => Err(ProtocolError::UnknownMessageType(msg_type)),
        }
    }
}

impl Decoder for PostgresCodec {
    type Item = FrontendMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // type + length
        if src.len() < 5 {
            return Ok(None);
        }

        // The length field counts itself but not the type byte.
        let len = i32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len < 4 {
            return Err(ProtocolError::InvalidMessage);
        }
        if len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge(len));
        }
        let len = 1 + len;
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut msg_buf = src.split_to(len);
        FrontendMessage::decode(&mut msg_buf).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn make_startup_message(code: i32, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i32((8 + body.len()) as i32);
        buf.put_i32(code);
        buf.extend_from_slice(body);
        buf
    }

    fn make_frontend_message(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![msg_type];
        buf.put_i32((4 + body.len()) as i32);
        buf.extend_from_slice(body);
        buf
    }

    fn decode_startup_message(buf: &[u8]) -> Result<Option<StartupMessage>, ProtocolError> {
        StartupCodec::new().decode(&mut BytesMut::from(buf))
    }

    fn decode_frontend_message(buf: &[u8]) -> Result<Option<FrontendMessage>, ProtocolError> {
        PostgresCodec::new().decode(&mut BytesMut::from(buf))
    }

    #[test]
    fn test_read_ssl_request() {
        let buf = make_startup_message(SSL_REQUEST_CODE, &[]);
        let msg = decode_startup_message(&buf).unwrap();
        assert!(matches!(msg, Some(StartupMessage::SslRequest)));
    }

    #[test]
    fn test_read_startup_message() {
        let buf = make_startup_message(3 << 16, b"user\0sa\0database\0notaryDb\0\0");
        let Some(StartupMessage::Startup {
            protocol_version,
            parameters,
        }) = decode_startup_message(&buf).unwrap()
        else {
            panic!("expected Startup message")
        };

        assert_eq!(protocol_version, 3 << 16);
        assert_eq!(parameters.user, "sa");
        assert_eq!(parameters.database_name(), "notaryDb");
    }

    #[test]
    fn test_database_defaults_to_user() {
        let buf = make_startup_message(3 << 16, b"user\0partyA\0\0");
        let Some(StartupMessage::Startup { parameters, .. }) =
            decode_startup_message(&buf).unwrap()
        else {
            panic!("expected Startup message")
        };
        assert_eq!(parameters.database, None);
        assert_eq!(parameters.database_name(), "partyA");
    }

    #[test]
    fn test_read_startup_message_missing_user() {
        let buf = make_startup_message(3 << 16, b"database\0notaryDb\0\0");
        assert!(matches!(
            decode_startup_message(&buf),
            Err(ProtocolError::MissingParameter("user"))
        ));
    }

    #[test]
    fn test_read_startup_message_partial() {
        let buf = make_startup_message(3 << 16, b"user\0sa\0\0");
        assert!(decode_startup_message(&buf[..buf.len() - 3]).unwrap().is_none());
    }

    #[test]
    fn test_read_unsupported_version() {
        let buf = make_startup_message(2 << 16, &[]);
        assert!(matches!(
            decode_startup_message(&buf),
            Err(ProtocolError::UnsupportedProtocolVersion(v)) if v == 2 << 16
        ));
    }

    #[test]
    fn test_read_cancel_request() {
        let mut body = Vec::new();
        body.put_i32(12345);
        body.put_i32(67890);

        let buf = make_startup_message(CANCEL_REQUEST_CODE, &body);
        let Some(StartupMessage::CancelRequest {
            process_id,
            secret_key,
        }) = decode_startup_message(&buf).unwrap()
        else {
            panic!("expected CancelRequest message")
        };

        assert_eq!(process_id, 12345);
        assert_eq!(secret_key, 67890);
    }

    #[test]
    fn test_read_query_message() {
        let buf = make_frontend_message(b'Q', b"SHOW TABLES\0");
        let msg = decode_frontend_message(&buf).unwrap().unwrap();
        let FrontendMessage::Query(q) = msg else {
            panic!("expected Query message, got {msg:?}")
        };
        assert_eq!(q, "SHOW TABLES");
    }

    #[test]
    fn test_read_terminate_message() {
        let buf = make_frontend_message(b'X', &[]);
        let msg = decode_frontend_message(&buf).unwrap().unwrap();
        assert!(matches!(msg, FrontendMessage::Terminate));
    }

    #[test]
    fn test_read_eof() {
        assert!(decode_frontend_message(&[]).unwrap().is_none());
    }

    #[test]
    fn test_read_unknown_message_type() {
        let buf = make_frontend_message(b'P', &[]);
        assert!(matches!(
            decode_frontend_message(&buf),
            Err(ProtocolError::UnknownMessageType(b'P'))
        ));
    }

    #[test]
    fn test_read_oversized_message() {
        let mut codec = PostgresCodec {
            max_message_size: 16,
        };
        let buf = make_frontend_message(b'Q', b"SELECT * FROM node_info\0");
        assert!(matches!(
            codec.decode(&mut BytesMut::from(&buf[..])),
            Err(ProtocolError::MessageTooLarge(_))
        ));
    }
}
