// RTMP data messages

use std::{collections::HashMap, sync::LazyLock};

use crate::amf::{AMF0Value, AMFDecodingCursor};

/// RTMP data message
pub struct RtmpData {
    /// Data tag
    pub tag: String,

    /// Arguments
    pub arguments: HashMap<String, AMF0Value>,
}

static RTMP_DATA_CODES: LazyLock<HashMap<&'static str, Vec<&'static str>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Vec<&'static str>> = HashMap::new();

    m.insert("@setDataFrame", vec!["method", "dataObj"]);
    m.insert("onMetaData", vec!["dataObj"]);
    m.insert("|RtmpSampleAccess", vec!["bool1", "bool2"]);
    m.insert("onFI", vec!["info"]);

    m
});

impl RtmpData {
    /// Creates RtmpData
    pub fn new(tag: String) -> RtmpData {
        RtmpData {
            tag,
            arguments: HashMap::new(),
        }
    }

    /// Sets argument
    pub fn set_argument(&mut self, arg_name: &str, value: AMF0Value) {
        self.arguments.insert(arg_name.to_string(), value);
    }

    /// Gets argument
    pub fn get_argument(&self, arg_name: &str) -> Option<&AMF0Value> {
        self.arguments.get(arg_name)
    }

    /// Gets string representation of the data message for debug logging
    pub fn to_debug_string(&self) -> String {
        let mut s = format!("{} {}\n", self.tag, "{");

        for (arg_name, arg_val) in &self.arguments {
            s.push_str(&format!(
                "    '{}' = {}\n",
                arg_name,
                arg_val.to_debug_string("    ")
            ));
        }

        s.push('}');

        s
    }

    /// Encodes data
    pub fn encode(&self) -> Vec<u8> {
        let tag = AMF0Value::String {
            value: self.tag.clone(),
        };

        let mut buf = tag.encode();

        if let Some(arg_list) = RTMP_DATA_CODES.get(self.tag.as_str()) {
            for arg_name in arg_list {
                if let Some(val) = self.arguments.get(*arg_name) {
                    buf.extend(val.encode());
                }
            }
        }

        buf
    }

    /// Decodes data from bytes
    pub fn decode(data: &[u8]) -> Result<RtmpData, ()> {
        let mut cursor = AMFDecodingCursor::new(data);

        let tag_amf = AMF0Value::read(&mut cursor, data)?;
        let tag = tag_amf.get_string();

        let mut d = RtmpData::new(tag.to_string());

        if let Some(arg_list) = RTMP_DATA_CODES.get(tag) {
            let mut i: usize = 0;

            while i < arg_list.len() && !cursor.ended() {
                let val = AMF0Value::read(&mut cursor, data)?;

                d.set_argument(arg_list[i], val);

                i += 1;
            }
        }

        Ok(d)
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_data_frame_round_trip() {
        let mut data = RtmpData::new("@setDataFrame".to_string());

        data.set_argument(
            "method",
            AMF0Value::String {
                value: "onMetaData".to_string(),
            },
        );
        data.set_argument(
            "dataObj",
            AMF0Value::Array {
                items: vec![
                    ("width".to_string(), AMF0Value::Number { value: 1280.0 }),
                    ("height".to_string(), AMF0Value::Number { value: 720.0 }),
                ],
            },
        );

        let encoded = data.encode();
        let decoded = RtmpData::decode(&encoded).expect("decode error");

        assert_eq!(decoded.tag, "@setDataFrame");
        assert_eq!(
            decoded.get_argument("method").unwrap().get_string(),
            "onMetaData"
        );

        let data_obj = decoded.get_argument("dataObj").unwrap();

        assert_eq!(
            data_obj
                .get_object_property("width")
                .unwrap()
                .get_integer(),
            1280
        );
    }
}
