// RTMP command

use std::{collections::HashMap, sync::LazyLock};

use crate::amf::{AMF0Value, AMFDecodingCursor};

/// RTMP command
/// Maps the positional AMF0 arguments of each known command to names
pub struct RtmpCommand {
    /// Command
    pub cmd: String,

    /// Arguments
    pub arguments: HashMap<String, AMF0Value>,
}

static RTMP_COMMAND_CODES: LazyLock<HashMap<&'static str, Vec<&'static str>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Vec<&'static str>> = HashMap::new();

        m.insert("_result", vec!["transId", "cmdObj", "info"]);
        m.insert("_error", vec!["transId", "cmdObj", "info", "streamId"]);
        m.insert("onStatus", vec!["transId", "cmdObj", "info"]);

        m.insert("connect", vec!["transId", "cmdObj", "args"]);
        m.insert("call", vec!["transId", "cmdObj", "args"]);
        m.insert("close", vec!["transId", "cmdObj"]);
        m.insert("createStream", vec!["transId", "cmdObj"]);

        m.insert("releaseStream", vec!["transId", "cmdObj", "streamName"]);
        m.insert("getStreamLength", vec!["transId", "cmdObj", "streamId"]);
        m.insert("FCPublish", vec!["transId", "cmdObj", "streamName"]);
        m.insert("FCUnpublish", vec!["transId", "cmdObj", "streamName"]);
        m.insert("FCSubscribe", vec!["transId", "cmdObj", "streamName"]);

        m.insert("publish", vec!["transId", "cmdObj", "streamName", "type"]);
        m.insert(
            "play",
            vec![
                "transId",
                "cmdObj",
                "streamName",
                "start",
                "duration",
                "reset",
            ],
        );
        m.insert("play2", vec!["transId", "cmdObj", "params"]);

        m.insert("deleteStream", vec!["transId", "cmdObj", "streamId"]);
        m.insert("closeStream", vec!["transId", "cmdObj"]);
        m.insert("pause", vec!["transId", "cmdObj", "pause", "ms"]);
        m.insert("seek", vec!["transId", "cmdObj", "ms"]);
        m.insert("receiveAudio", vec!["transId", "cmdObj", "bool"]);
        m.insert("receiveVideo", vec!["transId", "cmdObj", "bool"]);

        m
    });

impl RtmpCommand {
    /// Creates RtmpCommand
    pub fn new(cmd: String) -> RtmpCommand {
        RtmpCommand {
            cmd,
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

    /// Gets string representation of the command for debug logging
    pub fn to_debug_string(&self) -> String {
        let mut s = format!("{} {}\n", self.cmd, "{");

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

    /// Encodes command
    pub fn encode(&self) -> Vec<u8> {
        let cmd_name = AMF0Value::String {
            value: self.cmd.clone(),
        };

        let mut buf = cmd_name.encode();

        if let Some(arg_list) = RTMP_COMMAND_CODES.get(self.cmd.as_str()) {
            for arg_name in arg_list {
                match self.arguments.get(*arg_name) {
                    Some(val) => {
                        buf.extend(val.encode());
                    }
                    None => {
                        buf.extend(AMF0Value::Undefined.encode());
                    }
                }
            }
        }

        buf
    }

    /// Decodes command from bytes
    pub fn decode(data: &[u8]) -> Result<RtmpCommand, ()> {
        let mut cursor = AMFDecodingCursor::new(data);

        let cmd_amf = AMF0Value::read(&mut cursor, data)?;
        let cmd = cmd_amf.get_string();

        let mut c = RtmpCommand::new(cmd.to_string());

        if let Some(arg_list) = RTMP_COMMAND_CODES.get(cmd) {
            let mut i: usize = 0;

            while i < arg_list.len() && !cursor.ended() {
                let val = AMF0Value::read(&mut cursor, data)?;

                c.set_argument(arg_list[i], val);

                i += 1;
            }
        }

        Ok(c)
    }
}

// Tests
