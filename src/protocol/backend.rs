use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::codec::{PostgresCodec, StartupCodec, put_cstring, put_message};
use crate::protocol::error::ProtocolError;
use crate::protocol::types::{ErrorFieldCode, type_oid};

/// Messages sent by the backend (server) to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// 'R' - Authentication response (AuthenticationOk)
    AuthenticationOk,
    /// 'K' - Backend key data for cancel requests
    BackendKeyData { process_id: i32, secret_key: i32 },
    /// 'S' - Parameter status notification
    ParameterStatus { name: String, value: String },
    /// 'Z' - Ready for query
    ReadyForQuery { status: TransactionStatus },
    /// 'T' - Column names of the rows that follow; all columns are text
    RowDescription { columns: Vec<String> },
    /// 'D' - One row of text values (`None` is NULL)
    DataRow { values: Vec<Option<String>> },
    /// 'C' - Statement finished
    CommandComplete { tag: String },
    /// 'I' - Query string was empty
    EmptyQueryResponse,
    /// 'E' - Error response
    ErrorResponse { fields: Vec<ErrorField> },
}

impl BackendMessage {
    /// An `ERROR` response; the session continues.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::error_with_severity("ERROR", code, message)
    }

    /// A `FATAL` response; the server closes the session after sending it.
    pub fn fatal(code: &str, message: impl Into<String>) -> Self {
        Self::error_with_severity("FATAL", code, message)
    }

    fn error_with_severity(severity: &str, code: &str, message: impl Into<String>) -> Self {
        BackendMessage::ErrorResponse {
            fields: vec![
                ErrorField::new(ErrorFieldCode::Severity, severity),
                ErrorField::new(ErrorFieldCode::SeverityNonLocalized, severity),
                ErrorField::new(ErrorFieldCode::SqlState, code),
                ErrorField::new(ErrorFieldCode::Message, message),
            ],
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        match self {
            BackendMessage::AuthenticationOk => put_message(dst, b'R', |dst| dst.put_i32(0)),
            BackendMessage::BackendKeyData {
                process_id,
                secret_key,
            } => put_message(dst, b'K', |dst| {
                dst.put_i32(*process_id);
                dst.put_i32(*secret_key);
            }),
            BackendMessage::ParameterStatus { name, value } => put_message(dst, b'S', |dst| {
                put_cstring(dst, name);
                put_cstring(dst, value);
            }),
            BackendMessage::ReadyForQuery { status } => {
                put_message(dst, b'Z', |dst| dst.put_u8(status.as_byte()))
            }
            BackendMessage::RowDescription { columns } => put_message(dst, b'T', |dst| {
                dst.put_i16(columns.len() as i16);
                for name in columns {
                    put_cstring(dst, name);
                    dst.put_i32(0); // table oid
                    dst.put_i16(0); // column attribute number
                    dst.put_i32(type_oid::TEXT);
                    dst.put_i16(-1); // variable length
                    dst.put_i32(-1); // no type modifier
                    dst.put_i16(0); // text format
                }
            }),
            BackendMessage::DataRow { values } => put_message(dst, b'D', |dst| {
                dst.put_i16(values.len() as i16);
                for value in values {
                    match value {
                        Some(v) => {
                            dst.put_i32(v.len() as i32);
                            dst.put_slice(v.as_bytes());
                        }
                        None => dst.put_i32(-1),
                    }
                }
            }),
            BackendMessage::CommandComplete { tag } => {
                put_message(dst, b'C', |dst| put_cstring(dst, tag))
            }
            BackendMessage::EmptyQueryResponse => put_message(dst, b'I', |_| {}),
            BackendMessage::ErrorResponse { fields } => put_message(dst, b'E', |dst| {
                for field in fields {
                    dst.put_u8(field.code);
                    put_cstring(dst, &field.value);
                }
                dst.put_u8(0); // terminator
            }),
        }
    }
}

impl Encoder<BackendMessage> for PostgresCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

impl Encoder<BackendMessage> for StartupCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

/// Transaction status indicator for ReadyForQuery message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// 'I' - Idle (not in a transaction block)
    Idle,
}

impl TransactionStatus {
    fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
        }
    }
}

/// Error/Notice field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorField {
    pub code: u8,
    pub value: String,
}

impl ErrorField {
    pub fn new(code: ErrorFieldCode, value: impl Into<String>) -> Self {
        Self {
            code: code.as_u8(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(msg: BackendMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        PostgresCodec::new().encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_write_authentication_ok() {
        let buf = encode(BackendMessage::AuthenticationOk);
        assert_eq!(&buf[..], &[b'R', 0, 0, 0, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_ready_for_query() {
        let buf = encode(BackendMessage::ReadyForQuery {
            status: TransactionStatus::Idle,
        });
        assert_eq!(&buf[..], &[b'Z', 0, 0, 0, 5, b'I']);
    }

    #[test]
    fn test_write_parameter_status() {
        let buf = encode(BackendMessage::ParameterStatus {
            name: "server_version".to_string(),
            value: "16.0".to_string(),
        });
        // length = 4 + 15 ("server_version\0") + 5 ("16.0\0") = 24
        assert_eq!(buf[0], b'S');
        assert_eq!(&buf[1..5], &[0, 0, 0, 24]);
        assert_eq!(&buf[5..], b"server_version\x0016.0\0");
    }

    #[test]
    fn test_write_data_row_with_null() {
        let buf = encode(BackendMessage::DataRow {
            values: vec![Some("ab".to_string()), None],
        });
        // length = 4 + 2 (count) + 4 + 2 ("ab") + 4 (NULL)
        assert_eq!(
            &buf[..],
            &[
                b'D', 0, 0, 0, 16, 0, 2, 0, 0, 0, 2, b'a', b'b', 0xFF, 0xFF, 0xFF, 0xFF
            ]
        );
    }

    #[test]
    fn test_write_row_description() {
        let buf = encode(BackendMessage::RowDescription {
            columns: vec!["id".to_string()],
        });
        // length = 4 + 2 + "id\0" (3) + 18 field attributes
        assert_eq!(&buf[..5], &[b'T', 0, 0, 0, 27]);
        assert_eq!(&buf[5..7], &[0, 1]);
        assert_eq!(&buf[7..10], b"id\0");
        assert_eq!(&buf[16..20], &type_oid::TEXT.to_be_bytes());
    }

    #[test]
    fn test_write_empty_query_response() {
        let buf = encode(BackendMessage::EmptyQueryResponse);
        assert_eq!(&buf[..], &[b'I', 0, 0, 0, 4]);
    }

    #[test]
    fn test_write_fatal_error() {
        let buf = encode(BackendMessage::fatal("3D000", "gone"));
        assert_eq!(buf[0], b'E');
        assert_eq!(&buf[5..], b"SFATAL\0VFATAL\0C3D000\0Mgone\0\0");
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(len, buf.len() - 1);
    }
}
