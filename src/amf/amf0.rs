// AMF0 value

use byteorder::{BigEndian, ByteOrder};

use super::AMFDecodingCursor;

const AMF0_TYPE_NUMBER: u8 = 0x00;
const AMF0_TYPE_BOOL: u8 = 0x01;
const AMF0_TYPE_STRING: u8 = 0x02;
const AMF0_TYPE_OBJECT: u8 = 0x03;
const AMF0_TYPE_NULL: u8 = 0x05;
const AMF0_TYPE_UNDEFINED: u8 = 0x06;
const AMF0_TYPE_REF: u8 = 0x07;
const AMF0_TYPE_ARRAY: u8 = 0x08;
const AMF0_TYPE_STRICT_ARRAY: u8 = 0x0A;
const AMF0_TYPE_DATE: u8 = 0x0B;
const AMF0_TYPE_LONG_STRING: u8 = 0x0C;

const AMF0_OBJECT_TERM_CODE: u8 = 0x09;

/// AMF0 compatible value
///
/// Objects and ECMA arrays keep their properties in insertion
/// order, since that is the order they are encoded in
#[derive(Clone, Debug, PartialEq)]
pub enum AMF0Value {
    Number {
        value: f64,
    },
    Bool {
        value: bool,
    },
    String {
        value: String,
    },
    Object {
        properties: Vec<(String, AMF0Value)>,
    },
    Null,
    Undefined,
    Ref {
        addr: u16,
    },
    Array {
        items: Vec<(String, AMF0Value)>,
    },
    StrictArray {
        items: Vec<AMF0Value>,
    },
    Date {
        timestamp: f64,
    },
    LongString {
        value: String,
    },
}

impl AMF0Value {
    /// Obtains a string representation of the value
    /// Used for debug logging purposes
    pub fn to_debug_string(&self, tabs: &str) -> String {
        match self {
            AMF0Value::Number { value } => {
                format!("{}", value)
            }
            AMF0Value::Bool { value } => {
                if *value {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            AMF0Value::String { value } => {
                format!("'{}'", value)
            }
            AMF0Value::Object { properties } => {
                let mut res = "{\n".to_string();

                for (key, value) in properties {
                    res.push_str(tabs);
                    res.push_str("    '");
                    res.push_str(key);
                    res.push_str("' = ");
                    res.push_str(&value.to_debug_string(&format!("{}    ", tabs)));
                    res.push('\n');
                }

                res.push_str(tabs);
                res.push('}');

                res
            }
            AMF0Value::Null => "NULL".to_string(),
            AMF0Value::Undefined => "UNDEFINED".to_string(),
            AMF0Value::Ref { addr } => {
                format!("REF#{}", addr)
            }
            AMF0Value::Array { items } => {
                let mut res = "ARRAY [\n".to_string();

                for (key, value) in items {
                    res.push_str(tabs);
                    res.push_str("    '");
                    res.push_str(key);
                    res.push_str("' = ");
                    res.push_str(&value.to_debug_string(&format!("{}    ", tabs)));
                    res.push('\n');
                }

                res.push_str(tabs);
                res.push(']');

                res
            }
            AMF0Value::StrictArray { items } => {
                let mut res = "STRICT_ARRAY [\n".to_string();

                for value in items {
                    res.push_str(tabs);
                    res.push_str("    ");
                    res.push_str(&value.to_debug_string(&format!("{}    ", tabs)));
                    res.push('\n');
                }

                res.push_str(tabs);
                res.push(']');

                res
            }
            AMF0Value::Date { timestamp } => {
                format!("DATE({})", timestamp)
            }
            AMF0Value::LongString { value } => {
                format!("L'{}'", value)
            }
        }
    }

    // Value check functions:

    /// Returns true if the value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, AMF0Value::Undefined)
    }

    /// Returns the value as boolean
    pub fn get_bool(&self) -> bool {
        match self {
            AMF0Value::Bool { value } => *value,
            AMF0Value::Number { value } => *value != 0.0,
            _ => false,
        }
    }

    /// Returns the value as integer
    pub fn get_integer(&self) -> i64 {
        match self {
            AMF0Value::Number { value } => *value as i64,
            AMF0Value::Ref { addr } => *addr as i64,
            AMF0Value::Date { timestamp } => *timestamp as i64,
            _ => 0,
        }
    }

    /// Returns the value as string
    pub fn get_string(&self) -> &str {
        match self {
            AMF0Value::String { value } => value.as_str(),
            AMF0Value::LongString { value } => value.as_str(),
            _ => "",
        }
    }

    /// Returns the value as an ordered property list
    pub fn get_object(&self) -> Option<&Vec<(String, AMF0Value)>> {
        match self {
            AMF0Value::Object { properties } => Some(properties),
            AMF0Value::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Gets the value of a property (for objects and ECMA arrays)
    pub fn get_object_property(&self, property_name: &str) -> Option<&AMF0Value> {
        let obj = self.get_object()?;

        obj.iter()
            .find(|(key, _)| key == property_name)
            .map(|(_, value)| value)
    }

    // Encoding functions:

    /// Encodes value into bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AMF0Value::Number { value } => {
                let mut buf = vec![AMF0_TYPE_NUMBER];
                buf.extend(Self::encode_number(*value));
                buf
            }
            AMF0Value::Bool { value } => {
                vec![AMF0_TYPE_BOOL, if *value { 0x01 } else { 0x00 }]
            }
            AMF0Value::String { value } => {
                let mut buf = vec![AMF0_TYPE_STRING];
                buf.extend(Self::encode_string(value));
                buf
            }
            AMF0Value::Object { properties } => {
                let mut buf = vec![AMF0_TYPE_OBJECT];
                buf.extend(Self::encode_object(properties));
                buf
            }
            AMF0Value::Null => vec![AMF0_TYPE_NULL],
            AMF0Value::Undefined => vec![AMF0_TYPE_UNDEFINED],
            AMF0Value::Ref { addr } => {
                let mut buf = vec![AMF0_TYPE_REF, 0x00, 0x00];
                BigEndian::write_u16(&mut buf[1..3], *addr);
                buf
            }
            AMF0Value::Array { items } => {
                let mut buf = vec![AMF0_TYPE_ARRAY, 0x00, 0x00, 0x00, 0x00];
                BigEndian::write_u32(&mut buf[1..5], items.len() as u32);
                buf.extend(Self::encode_object(items));
                buf
            }
            AMF0Value::StrictArray { items } => {
                let mut buf = vec![AMF0_TYPE_STRICT_ARRAY, 0x00, 0x00, 0x00, 0x00];
                BigEndian::write_u32(&mut buf[1..5], items.len() as u32);

                for item in items {
                    buf.extend(item.encode());
                }

                buf
            }
            AMF0Value::Date { timestamp } => {
                let mut buf = vec![AMF0_TYPE_DATE];
                buf.extend(Self::encode_number(*timestamp));
                buf.extend([0x00, 0x00]); // Timezone (reserved)
                buf
            }
            AMF0Value::LongString { value } => {
                let str_bytes = value.bytes();
                let mut buf = vec![AMF0_TYPE_LONG_STRING, 0x00, 0x00, 0x00, 0x00];
                BigEndian::write_u32(&mut buf[1..5], str_bytes.len() as u32);
                buf.extend(str_bytes);
                buf
            }
        }
    }

    /// Encodes number value
    pub fn encode_number(num: f64) -> Vec<u8> {
        let mut buf = vec![0; 8];
        BigEndian::write_f64(&mut buf, num);
        buf
    }

    /// Encodes string value (length prefixed, no type marker)
    pub fn encode_string(s: &str) -> Vec<u8> {
        let str_bytes = s.bytes();
        let mut buf = vec![0x00; 2];
        BigEndian::write_u16(&mut buf, str_bytes.len() as u16);
        buf.extend(str_bytes);
        buf
    }

    /// Encodes object properties, in insertion order
    pub fn encode_object(properties: &[(String, AMF0Value)]) -> Vec<u8> {
        let mut buf = Vec::new();

        for (key, value) in properties {
            buf.extend(Self::encode_string(key));
            buf.extend(value.encode());
        }

        buf.extend(Self::encode_string(""));
        buf.push(AMF0_OBJECT_TERM_CODE);

        buf
    }

    // Decoding functions:

    /// Reads a value from a buffer, advancing the cursor
    pub fn read(cursor: &mut AMFDecodingCursor, buffer: &[u8]) -> Result<AMF0Value, ()> {
        let marker = cursor.read(buffer, 1)?[0];

        match marker {
            AMF0_TYPE_NUMBER => {
                let b = cursor.read(buffer, 8)?;
                Ok(AMF0Value::Number {
                    value: BigEndian::read_f64(b),
                })
            }
            AMF0_TYPE_BOOL => {
                let b = cursor.read(buffer, 1)?;
                Ok(AMF0Value::Bool { value: b[0] != 0 })
            }
            AMF0_TYPE_STRING => Ok(AMF0Value::String {
                value: Self::read_string(cursor, buffer)?,
            }),
            AMF0_TYPE_OBJECT => Ok(AMF0Value::Object {
                properties: Self::read_object_properties(cursor, buffer)?,
            }),
            AMF0_TYPE_NULL => Ok(AMF0Value::Null),
            AMF0_TYPE_UNDEFINED => Ok(AMF0Value::Undefined),
            AMF0_TYPE_REF => {
                let b = cursor.read(buffer, 2)?;
                Ok(AMF0Value::Ref {
                    addr: BigEndian::read_u16(b),
                })
            }
            AMF0_TYPE_ARRAY => {
                // The count hint is not trusted, the pairs are
                // terminated by an empty key like regular objects
                cursor.skip(4)?;
                Ok(AMF0Value::Array {
                    items: Self::read_object_properties(cursor, buffer)?,
                })
            }
            AMF0_TYPE_STRICT_ARRAY => {
                let count = BigEndian::read_u32(cursor.read(buffer, 4)?) as usize;

                let mut items: Vec<AMF0Value> = Vec::new();

                for _ in 0..count {
                    items.push(Self::read(cursor, buffer)?);
                }

                Ok(AMF0Value::StrictArray { items })
            }
            AMF0_TYPE_DATE => {
                let b = cursor.read(buffer, 8)?;
                let timestamp = BigEndian::read_f64(b);
                cursor.skip(2)?; // Timezone (reserved)
                Ok(AMF0Value::Date { timestamp })
            }
            AMF0_TYPE_LONG_STRING => {
                let len = BigEndian::read_u32(cursor.read(buffer, 4)?) as usize;
                let str_bytes = cursor.read(buffer, len)?;
                Ok(AMF0Value::LongString {
                    value: String::from_utf8_lossy(str_bytes).into_owned(),
                })
            }
            _ => Err(()),
        }
    }

    /// Reads a length-prefixed string (no type marker)
    fn read_string(cursor: &mut AMFDecodingCursor, buffer: &[u8]) -> Result<String, ()> {
        let len = BigEndian::read_u16(cursor.read(buffer, 2)?) as usize;
        let str_bytes = cursor.read(buffer, len)?;
        Ok(String::from_utf8_lossy(str_bytes).into_owned())
    }

    /// Reads object properties until the empty key + terminator mark
    fn read_object_properties(
        cursor: &mut AMFDecodingCursor,
        buffer: &[u8],
    ) -> Result<Vec<(String, AMF0Value)>, ()> {
        let mut properties: Vec<(String, AMF0Value)> = Vec::new();

        loop {
            let key = Self::read_string(cursor, buffer)?;

            if key.is_empty() {
                let term = cursor.read(buffer, 1)?;

                if term[0] != AMF0_OBJECT_TERM_CODE {
                    return Err(());
                }

                return Ok(properties);
            }

            let value = Self::read(cursor, buffer)?;

            properties.push((key, value));
        }
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: AMF0Value) {
        let encoded = value.encode();
        let mut cursor = AMFDecodingCursor::new(&encoded);

        let decoded = AMF0Value::read(&mut cursor, &encoded).expect("decode error");

        assert_eq!(decoded, value);
        assert!(cursor.ended());
    }

    #[test]
    fn test_amf0_round_trip() {
        round_trip(AMF0Value::Number { value: 0.0 });
        round_trip(AMF0Value::Number { value: -1935.5 });
        round_trip(AMF0Value::Bool { value: true });
        round_trip(AMF0Value::Bool { value: false });
        round_trip(AMF0Value::String {
            value: "".to_string(),
        });
        round_trip(AMF0Value::String {
            value: "NetConnection.Connect.Success".to_string(),
        });
        round_trip(AMF0Value::Null);
        round_trip(AMF0Value::Undefined);
        round_trip(AMF0Value::Ref { addr: 3 });
        round_trip(AMF0Value::Date {
            timestamp: 1700000000000.0,
        });
        round_trip(AMF0Value::LongString {
            value: "x".repeat(70000),
        });

        round_trip(AMF0Value::Object {
            properties: vec![
                (
                    "app".to_string(),
                    AMF0Value::String {
                        value: "live".to_string(),
                    },
                ),
                ("capabilities".to_string(), AMF0Value::Number { value: 31.0 }),
                ("nested".to_string(), AMF0Value::Null),
            ],
        });

        round_trip(AMF0Value::Array {
            items: vec![
                ("width".to_string(), AMF0Value::Number { value: 1920.0 }),
                ("height".to_string(), AMF0Value::Number { value: 1080.0 }),
            ],
        });

        round_trip(AMF0Value::StrictArray {
            items: vec![
                AMF0Value::Number { value: 1.0 },
                AMF0Value::Bool { value: false },
                AMF0Value::String {
                    value: "third".to_string(),
                },
            ],
        });
    }

    #[test]
    fn test_amf0_object_key_order() {
        // Keys must encode in insertion order
        let obj = AMF0Value::Object {
            properties: vec![
                ("zz".to_string(), AMF0Value::Number { value: 1.0 }),
                ("aa".to_string(), AMF0Value::Number { value: 2.0 }),
            ],
        };

        let encoded = obj.encode();

        let zz_pos = encoded
            .windows(2)
            .position(|w| w == b"zz")
            .expect("zz key not found");
        let aa_pos = encoded
            .windows(2)
            .position(|w| w == b"aa")
            .expect("aa key not found");

        assert!(zz_pos < aa_pos);
    }

    #[test]
    fn test_amf0_decode_errors() {
        // Unknown marker
        let bad_marker = vec![0x42];
        let mut cursor = AMFDecodingCursor::new(&bad_marker);
        assert!(AMF0Value::read(&mut cursor, &bad_marker).is_err());

        // Truncated number
        let truncated = vec![AMF0_TYPE_NUMBER, 0x00, 0x01];
        let mut cursor = AMFDecodingCursor::new(&truncated);
        assert!(AMF0Value::read(&mut cursor, &truncated).is_err());

        // Object without terminator
        let unterminated = vec![AMF0_TYPE_OBJECT, 0x00, 0x01, b'a', AMF0_TYPE_NULL];
        let mut cursor = AMFDecodingCursor::new(&unterminated);
        assert!(AMF0Value::read(&mut cursor, &unterminated).is_err());
    }
}
