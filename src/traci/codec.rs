//! Binary framing for the TraCI protocol.
//!
//! A message is a big-endian `u32` total length (counting itself) followed by
//! one or more commands. A command starts with a one-byte length that counts
//! the length byte and the command id; commands longer than 255 bytes write
//! `0` there and follow it with a `u32` length instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::shared_data::Position;
use crate::traci::constants::*;
use crate::traci::error::{TraciError, TraciResult};

/// A decoded variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Integer(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Position2D(Position),
}

impl TypedValue {
    fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Double(_) => "double",
            TypedValue::String(_) => "string",
            TypedValue::StringList(_) => "string list",
            TypedValue::Position2D(_) => "2D position",
        }
    }

    pub fn into_integer(self) -> TraciResult<i32> {
        match self {
            TypedValue::Integer(v) => Ok(v),
            other => Err(unexpected("integer", &other)),
        }
    }

    pub fn into_string(self) -> TraciResult<String> {
        match self {
            TypedValue::String(v) => Ok(v),
            other => Err(unexpected("string", &other)),
        }
    }

    pub fn into_string_list(self) -> TraciResult<Vec<String>> {
        match self {
            TypedValue::StringList(v) => Ok(v),
            other => Err(unexpected("string list", &other)),
        }
    }

    pub fn into_position(self) -> TraciResult<Position> {
        match self {
            TypedValue::Position2D(v) => Ok(v),
            other => Err(unexpected("2D position", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &TypedValue) -> TraciError {
    TraciError::Protocol(format!("expected {}, got {}", wanted, got.type_name()))
}

pub fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

/// Appends one command (length header, id, payload) to `buf`.
pub fn put_command(buf: &mut BytesMut, command_id: u8, payload: &[u8]) {
    let short_len = 1 + 1 + payload.len();
    if short_len <= u8::MAX as usize {
        buf.put_u8(short_len as u8);
    } else {
        buf.put_u8(0);
        buf.put_u32((short_len + 4) as u32);
    }
    buf.put_u8(command_id);
    buf.put_slice(payload);
}

/// Wraps already-encoded commands into a complete message.
pub fn frame_message(commands: &[u8]) -> Bytes {
    let mut msg = BytesMut::with_capacity(4 + commands.len());
    msg.put_u32((4 + commands.len()) as u32);
    msg.put_slice(commands);
    msg.freeze()
}

pub fn encode_simple(command_id: u8, payload: &[u8]) -> Bytes {
    let mut commands = BytesMut::new();
    put_command(&mut commands, command_id, payload);
    frame_message(&commands)
}

pub fn encode_get_variable(command_id: u8, variable: u8, object_id: &str) -> Bytes {
    let mut payload = BytesMut::with_capacity(5 + object_id.len());
    payload.put_u8(variable);
    put_string(&mut payload, object_id);
    encode_simple(command_id, &payload)
}

pub fn encode_simulation_step(target_time: f64) -> Bytes {
    let mut payload = BytesMut::with_capacity(8);
    payload.put_f64(target_time);
    encode_simple(CMD_SIMSTEP, &payload)
}

fn ensure(buf: &Bytes, needed: usize, what: &str) -> TraciResult<()> {
    if buf.remaining() < needed {
        return Err(TraciError::Protocol(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn read_u8(buf: &mut Bytes) -> TraciResult<u8> {
    ensure(buf, 1, "byte")?;
    Ok(buf.get_u8())
}

pub fn read_i32(buf: &mut Bytes) -> TraciResult<i32> {
    ensure(buf, 4, "integer")?;
    Ok(buf.get_i32())
}

pub fn read_f64(buf: &mut Bytes) -> TraciResult<f64> {
    ensure(buf, 8, "double")?;
    Ok(buf.get_f64())
}

pub fn read_string(buf: &mut Bytes) -> TraciResult<String> {
    ensure(buf, 4, "string length")?;
    let len = buf.get_u32() as usize;
    ensure(buf, len, "string")?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| TraciError::Protocol(format!("string is not UTF-8: {}", e)))
}

pub fn read_string_list(buf: &mut Bytes) -> TraciResult<Vec<String>> {
    ensure(buf, 4, "list length")?;
    let count = buf.get_u32() as usize;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(read_string(buf)?);
    }
    Ok(items)
}

pub fn read_typed_value(buf: &mut Bytes) -> TraciResult<TypedValue> {
    let value_type = read_u8(buf)?;
    match value_type {
        TYPE_INTEGER => Ok(TypedValue::Integer(read_i32(buf)?)),
        TYPE_DOUBLE => Ok(TypedValue::Double(read_f64(buf)?)),
        TYPE_STRING => Ok(TypedValue::String(read_string(buf)?)),
        TYPE_STRINGLIST => Ok(TypedValue::StringList(read_string_list(buf)?)),
        POSITION_2D => {
            let x = read_f64(buf)?;
            let y = read_f64(buf)?;
            Ok(TypedValue::Position2D(Position::new(x, y)))
        }
        other => Err(TraciError::Protocol(format!(
            "unsupported value type 0x{:02x}",
            other
        ))),
    }
}

/// Splits the next command off `buf`, returning its id and content.
pub fn read_command(buf: &mut Bytes) -> TraciResult<(u8, Bytes)> {
    let short_len = read_u8(buf)? as usize;
    let content_len = if short_len == 0 {
        ensure(buf, 4, "extended length")?;
        let ext = buf.get_u32() as usize;
        ext.checked_sub(6)
            .ok_or_else(|| TraciError::Protocol(format!("bad extended length {}", ext)))?
    } else {
        short_len
            .checked_sub(2)
            .ok_or_else(|| TraciError::Protocol(format!("bad command length {}", short_len)))?
    };
    let command_id = read_u8(buf)?;
    ensure(buf, content_len, "command content")?;
    Ok((command_id, buf.split_to(content_len)))
}

/// Consumes the status command every response starts with.
pub fn read_status(buf: &mut Bytes, expected_command: u8) -> TraciResult<()> {
    let (command_id, mut content) = read_command(buf)?;
    if command_id != expected_command {
        return Err(TraciError::Protocol(format!(
            "status for command 0x{:02x}, expected 0x{:02x}",
            command_id, expected_command
        )));
    }
    let status = read_u8(&mut content)?;
    let description = read_string(&mut content)?;
    match status {
        RTYPE_OK => Ok(()),
        _ => Err(TraciError::CommandFailed {
            command: command_id,
            status,
            description,
        }),
    }
}

/// Decodes a GET response and checks it answers the question that was asked.
pub fn read_get_response(
    buf: &mut Bytes,
    command_id: u8,
    variable: u8,
    object_id: &str,
) -> TraciResult<TypedValue> {
    read_status(buf, command_id)?;
    let (response_id, mut content) = read_command(buf)?;
    if response_id != command_id.wrapping_add(RESPONSE_OFFSET) {
        return Err(TraciError::Protocol(format!(
            "response 0x{:02x} does not answer command 0x{:02x}",
            response_id, command_id
        )));
    }
    let got_variable = read_u8(&mut content)?;
    let got_object = read_string(&mut content)?;
    if got_variable != variable || got_object != object_id {
        return Err(TraciError::Protocol(format!(
            "response for 0x{:02x}/'{}', expected 0x{:02x}/'{}'",
            got_variable, got_object, variable, object_id
        )));
    }
    read_typed_value(&mut content)
}
