//! STUN Binding messages (RFC 5389)
//!
//! Only what the UDP port probe and its responder need: Binding request,
//! success and error responses, with the address, software and error
//! attributes. Everything else is carried through as raw bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub const MAGIC_COOKIE: u32 = 0x2112_A442;
pub const HEADER_LEN: usize = 20;

const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_ERROR_CODE: u16 = 0x0009;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const ATTR_SOFTWARE: u16 = 0x8022;

const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

#[derive(Debug, thiserror::Error)]
pub enum StunError {
    #[error("message too short: {0} bytes")]
    TooShort(usize),

    #[error("not a STUN message")]
    NotStun,

    #[error("bad magic cookie {0:#010x}")]
    BadMagicCookie(u32),

    #[error("unsupported message type {0:#06x}")]
    UnsupportedType(u16),

    #[error("declared length {declared} does not match {actual} payload bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("attribute {0:#06x} overruns the message")]
    AttributeOverflow(u16),

    #[error("malformed {0} attribute")]
    InvalidAttribute(&'static str),

    #[error("failed to generate transaction id: {0}")]
    Random(String),
}

/// STUN message types for the Binding method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StunMessageType {
    BindingRequest,
    BindingResponse,
    BindingError,
}

impl StunMessageType {
    pub fn code(self) -> u16 {
        match self {
            StunMessageType::BindingRequest => 0x0001,
            StunMessageType::BindingResponse => 0x0101,
            StunMessageType::BindingError => 0x0111,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(StunMessageType::BindingRequest),
            0x0101 => Some(StunMessageType::BindingResponse),
            0x0111 => Some(StunMessageType::BindingError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StunAttribute {
    MappedAddress(SocketAddr),
    XorMappedAddress(SocketAddr),
    Software(String),
    /// Error code and reason phrase
    ErrorCode(u16, String),
    Unknown { attr_type: u16, value: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunMessage {
    pub msg_type: StunMessageType,
    pub transaction_id: [u8; 12],
    pub attributes: Vec<StunAttribute>,
}

impl StunMessage {
    pub fn binding_request() -> Result<Self, StunError> {
        let mut transaction_id = [0u8; 12];
        getrandom::getrandom(&mut transaction_id).map_err(|e| StunError::Random(e.to_string()))?;

        Ok(Self {
            msg_type: StunMessageType::BindingRequest,
            transaction_id,
            attributes: Vec::new(),
        })
    }

    pub fn binding_response(transaction_id: [u8; 12], mapped_addr: SocketAddr) -> Self {
        Self {
            msg_type: StunMessageType::BindingResponse,
            transaction_id,
            attributes: vec![StunAttribute::XorMappedAddress(mapped_addr)],
        }
    }

    pub fn binding_error(transaction_id: [u8; 12], code: u16, message: impl Into<String>) -> Self {
        Self {
            msg_type: StunMessageType::BindingError,
            transaction_id,
            attributes: vec![StunAttribute::ErrorCode(code, message.into())],
        }
    }

    pub fn with_software(mut self, software: impl Into<String>) -> Self {
        self.attributes.push(StunAttribute::Software(software.into()));
        self
    }

    /// Reflexive address, XOR-MAPPED-ADDRESS preferred over MAPPED-ADDRESS
    pub fn get_mapped_address(&self) -> Option<SocketAddr> {
        let xor = self.attributes.iter().find_map(|a| match a {
            StunAttribute::XorMappedAddress(addr) => Some(*addr),
            _ => None,
        });
        xor.or_else(|| {
            self.attributes.iter().find_map(|a| match a {
                StunAttribute::MappedAddress(addr) => Some(*addr),
                _ => None,
            })
        })
    }

    pub fn get_error(&self) -> Option<(u16, &str)> {
        self.attributes.iter().find_map(|a| match a {
            StunAttribute::ErrorCode(code, msg) => Some((*code, msg.as_str())),
            _ => None,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        for attr in &self.attributes {
            self.encode_attribute(attr, &mut body);
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
        buf.put_u16(self.msg_type.code());
        buf.put_u16(body.len() as u16);
        buf.put_u32(MAGIC_COOKIE);
        buf.put_slice(&self.transaction_id);
        buf.put_slice(&body);
        buf.freeze()
    }

    fn encode_attribute(&self, attr: &StunAttribute, out: &mut BytesMut) {
        let mut value = BytesMut::new();
        let attr_type = match attr {
            StunAttribute::MappedAddress(addr) => {
                put_address(&mut value, *addr);
                ATTR_MAPPED_ADDRESS
            }
            StunAttribute::XorMappedAddress(addr) => {
                put_address(&mut value, xor_address(*addr, &self.transaction_id));
                ATTR_XOR_MAPPED_ADDRESS
            }
            StunAttribute::Software(text) => {
                value.put_slice(text.as_bytes());
                ATTR_SOFTWARE
            }
            StunAttribute::ErrorCode(code, reason) => {
                value.put_u16(0);
                value.put_u8((code / 100) as u8 & 0x07);
                value.put_u8((code % 100) as u8);
                value.put_slice(reason.as_bytes());
                ATTR_ERROR_CODE
            }
            StunAttribute::Unknown { attr_type, value: raw } => {
                value.put_slice(raw);
                *attr_type
            }
        };

        out.put_u16(attr_type);
        out.put_u16(value.len() as u16);
        out.put_slice(&value);
        // Attributes are padded to a 32-bit boundary
        out.put_bytes(0, (4 - value.len() % 4) % 4);
    }

    pub fn decode(data: &[u8]) -> Result<Self, StunError> {
        if data.len() < HEADER_LEN {
            return Err(StunError::TooShort(data.len()));
        }

        let mut buf = data;
        let code = buf.get_u16();
        if code & 0xC000 != 0 {
            return Err(StunError::NotStun);
        }
        let length = buf.get_u16() as usize;
        let cookie = buf.get_u32();
        if cookie != MAGIC_COOKIE {
            return Err(StunError::BadMagicCookie(cookie));
        }
        let msg_type = StunMessageType::from_code(code).ok_or(StunError::UnsupportedType(code))?;

        let mut transaction_id = [0u8; 12];
        buf.copy_to_slice(&mut transaction_id);

        if length % 4 != 0 || length != buf.remaining() {
            return Err(StunError::LengthMismatch {
                declared: length,
                actual: buf.remaining(),
            });
        }

        let mut attributes = Vec::new();
        while buf.remaining() >= 4 {
            let attr_type = buf.get_u16();
            let len = buf.get_u16() as usize;
            if len > buf.remaining() {
                return Err(StunError::AttributeOverflow(attr_type));
            }
            let value = &buf[..len];
            attributes.push(decode_attribute(attr_type, value, &transaction_id)?);

            let padded = (len + 3) & !3;
            buf.advance(padded.min(buf.remaining()));
        }

        Ok(Self {
            msg_type,
            transaction_id,
            attributes,
        })
    }
}

/// Cheap check used by the responder before a full decode
pub fn looks_like_stun(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN
        && data[0] & 0xC0 == 0
        && u32::from_be_bytes([data[4], data[5], data[6], data[7]]) == MAGIC_COOKIE
}

fn put_address(buf: &mut BytesMut, addr: SocketAddr) {
    buf.put_u8(0);
    match addr.ip() {
        IpAddr::V4(ip) => {
            buf.put_u8(FAMILY_IPV4);
            buf.put_u16(addr.port());
            buf.put_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            buf.put_u8(FAMILY_IPV6);
            buf.put_u16(addr.port());
            buf.put_slice(&ip.octets());
        }
    }
}

fn get_address(mut value: &[u8], name: &'static str) -> Result<SocketAddr, StunError> {
    if value.len() < 4 {
        return Err(StunError::InvalidAttribute(name));
    }
    value.advance(1);
    let family = value.get_u8();
    let port = value.get_u16();
    let ip = match (family, value.len()) {
        (FAMILY_IPV4, 4) => IpAddr::V4(Ipv4Addr::new(value[0], value[1], value[2], value[3])),
        (FAMILY_IPV6, 16) => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(value);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return Err(StunError::InvalidAttribute(name)),
    };
    Ok(SocketAddr::new(ip, port))
}

/// XOR is its own inverse, so this both encodes and decodes
fn xor_address(addr: SocketAddr, transaction_id: &[u8; 12]) -> SocketAddr {
    let port = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;
    let ip = match addr.ip() {
        IpAddr::V4(ip) => IpAddr::V4(Ipv4Addr::from(u32::from(ip) ^ MAGIC_COOKIE)),
        IpAddr::V6(ip) => {
            let mut key = [0u8; 16];
            key[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            key[4..].copy_from_slice(transaction_id);
            let mut octets = ip.octets();
            for (o, k) in octets.iter_mut().zip(key.iter()) {
                *o ^= k;
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };
    SocketAddr::new(ip, port)
}

fn decode_attribute(attr_type: u16, value: &[u8], transaction_id: &[u8; 12]) -> Result<StunAttribute, StunError> {
    let attr = match attr_type {
        ATTR_MAPPED_ADDRESS => StunAttribute::MappedAddress(get_address(value, "MAPPED-ADDRESS")?),
        ATTR_XOR_MAPPED_ADDRESS => {
            let raw = get_address(value, "XOR-MAPPED-ADDRESS")?;
            StunAttribute::XorMappedAddress(xor_address(raw, transaction_id))
        }
        ATTR_SOFTWARE => StunAttribute::Software(String::from_utf8_lossy(value).into_owned()),
        ATTR_ERROR_CODE => {
            if value.len() < 4 {
                return Err(StunError::InvalidAttribute("ERROR-CODE"));
            }
            let code = (value[2] & 0x07) as u16 * 100 + value[3] as u16;
            let reason = String::from_utf8_lossy(&value[4..]).into_owned();
            StunAttribute::ErrorCode(code, reason)
        }
        _ => StunAttribute::Unknown {
            attr_type,
            value: Bytes::copy_from_slice(value),
        },
    };
    Ok(attr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_request() {
        let req = StunMessage::binding_request().unwrap();
        let bytes = req.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[0..2], &[0x00, 0x01]);
        assert!(looks_like_stun(&bytes));

        let decoded = StunMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.msg_type, StunMessageType::BindingRequest);
        assert_eq!(decoded.transaction_id, req.transaction_id);
    }

    #[test]
    fn test_binding_response_xor_mapped() {
        let tid = [7u8; 12];
        let addr: SocketAddr = "192.0.2.1:32853".parse().unwrap();
        let bytes = StunMessage::binding_response(tid, addr).with_software("jk").encode();

        // Port and address are XOR'd on the wire
        assert_eq!(&bytes[20..22], &[0x00, 0x20]);
        assert_ne!(&bytes[26..28], &32853u16.to_be_bytes());

        let decoded = StunMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.get_mapped_address(), Some(addr));
        assert!(decoded.attributes.contains(&StunAttribute::Software("jk".to_string())));
    }

    #[test]
    fn test_ipv6_mapped_address() {
        let tid = [0xAB; 12];
        let addr: SocketAddr = "[2001:db8::1]:3478".parse().unwrap();
        let decoded = StunMessage::decode(&StunMessage::binding_response(tid, addr).encode()).unwrap();
        assert_eq!(decoded.get_mapped_address(), Some(addr));
    }

    #[test]
    fn test_binding_error() {
        let err = StunMessage::binding_error([2u8; 12], 420, "Unknown Attribute");
        let decoded = StunMessage::decode(&err.encode()).unwrap();
        assert_eq!(decoded.msg_type, StunMessageType::BindingError);
        assert_eq!(decoded.get_error(), Some((420, "Unknown Attribute")));
    }

    #[test]
    fn test_rfc5769_ipv4_response() {
        // Sample IPv4 response from RFC 5769 section 2.2, stripped of integrity and fingerprint
        let tid = [0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86, 0xfa, 0x87, 0xdf, 0xae];
        let mut data = vec![0x01, 0x01, 0x00, 0x0c, 0x21, 0x12, 0xa4, 0x42];
        data.extend_from_slice(&tid);
        data.extend_from_slice(&[0x00, 0x20, 0x00, 0x08, 0x00, 0x01, 0xa1, 0x47, 0xe1, 0x12, 0xa6, 0x43]);

        let msg = StunMessage::decode(&data).unwrap();
        assert_eq!(msg.get_mapped_address(), Some("192.0.2.1:32853".parse().unwrap()));
    }

    #[test]
    fn test_unknown_attribute_preserved() {
        let mut msg = StunMessage::binding_error([1u8; 12], 400, "Bad Request");
        msg.attributes.push(StunAttribute::Unknown {
            attr_type: 0x8028,
            value: Bytes::from_static(&[1, 2, 3, 4, 5]),
        });
        let decoded = StunMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(StunMessage::decode(&[0u8; 4]), Err(StunError::TooShort(4))));

        let mut bad_cookie = StunMessage::binding_request().unwrap().encode().to_vec();
        bad_cookie[4] = 0;
        assert!(matches!(StunMessage::decode(&bad_cookie), Err(StunError::BadMagicCookie(_))));

        let mut not_stun = StunMessage::binding_request().unwrap().encode().to_vec();
        not_stun[0] = 0x80;
        assert!(matches!(StunMessage::decode(&not_stun), Err(StunError::NotStun)));

        // Declared length larger than the payload
        let mut truncated = StunMessage::binding_error([0u8; 12], 500, "Server Error").encode().to_vec();
        truncated.truncate(truncated.len() - 4);
        assert!(matches!(StunMessage::decode(&truncated), Err(StunError::LengthMismatch { .. })));

        // Attribute length overruns the message
        let mut overflow = StunMessage::binding_request().unwrap().encode().to_vec();
        overflow[3] = 4;
        overflow.extend_from_slice(&[0x00, 0x20, 0x00, 0x40]);
        assert!(matches!(StunMessage::decode(&overflow), Err(StunError::AttributeOverflow(0x0020))));
    }
}
