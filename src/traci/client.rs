use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use bytes::Bytes;
use log::debug;

use crate::shared_data::Position;
use crate::traci::codec::{self, TypedValue};
use crate::traci::constants::*;
use crate::traci::error::{TraciError, TraciResult};
use crate::traci::link::{SimulationLink, SimulatorVersion};

/// Messages above this size are treated as a corrupt stream.
const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Blocking TraCI client over a single TCP connection.
#[derive(Debug, Default)]
pub struct TraciClient {
    stream: Option<TcpStream>,
    read_timeout: Option<Duration>,
}

impl TraciClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_timeout(read_timeout: Option<Duration>) -> Self {
        Self {
            stream: None,
            read_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> TraciResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(TraciError::NotConnected)
    }

    /// Sends one framed message and returns the body of the reply.
    ///
    /// A failed round trip leaves the stream out of step with the server, so
    /// the connection is dropped and later calls fail with `NotConnected`.
    fn exchange(&mut self, message: &[u8]) -> TraciResult<Bytes> {
        let stream = self.stream()?;
        match Self::round_trip(stream, message) {
            Ok(body) => Ok(body),
            Err(e) => {
                if let Some(stream) = self.stream.take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
                debug!("Dropped TraCI connection after failed exchange: {}", e);
                Err(e)
            }
        }
    }

    fn round_trip(stream: &mut TcpStream, message: &[u8]) -> TraciResult<Bytes> {
        stream.write_all(message)?;
        stream.flush()?;

        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let total = u32::from_be_bytes(header) as usize;
        if !(4..=MAX_MESSAGE_LEN).contains(&total) {
            return Err(TraciError::Protocol(format!(
                "invalid message length {}",
                total
            )));
        }
        let mut body = vec![0u8; total - 4];
        stream.read_exact(&mut body)?;
        Ok(Bytes::from(body))
    }

    fn get_variable(&mut self, command: u8, variable: u8, object_id: &str) -> TraciResult<TypedValue> {
        let request = codec::encode_get_variable(command, variable, object_id);
        let mut reply = self.exchange(&request)?;
        codec::read_get_response(&mut reply, command, variable, object_id)
    }

    fn handshake(&mut self) -> TraciResult<SimulatorVersion> {
        let request = codec::encode_simple(CMD_GETVERSION, &[]);
        let mut reply = self.exchange(&request)?;
        codec::read_status(&mut reply, CMD_GETVERSION)?;
        let (command_id, mut content) = codec::read_command(&mut reply)?;
        if command_id != CMD_GETVERSION {
            return Err(TraciError::Protocol(format!(
                "unexpected version answer 0x{:02x}",
                command_id
            )));
        }
        Ok(SimulatorVersion {
            api_version: codec::read_i32(&mut content)?,
            simulator: codec::read_string(&mut content)?,
        })
    }
}

impl SimulationLink for TraciClient {
    fn connect(&mut self, host: &str, port: u16) -> TraciResult<SimulatorVersion> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.read_timeout)?;
        self.stream = Some(stream);

        match self.handshake() {
            Ok(version) => Ok(version),
            Err(e) => {
                self.stream = None;
                Err(e)
            }
        }
    }

    fn close(&mut self) -> TraciResult<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        let request = codec::encode_simple(CMD_CLOSE, &[]);
        let result = self
            .exchange(&request)
            .and_then(|mut reply| codec::read_status(&mut reply, CMD_CLOSE));
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        result
    }

    fn simulation_step(&mut self) -> TraciResult<()> {
        let request = codec::encode_simulation_step(0.0);
        let mut reply = self.exchange(&request)?;
        codec::read_status(&mut reply, CMD_SIMSTEP)?;
        let subscriptions = codec::read_i32(&mut reply)?;
        for _ in 0..subscriptions.max(0) {
            let (command_id, _) = codec::read_command(&mut reply)?;
            debug!("Skipping subscription response 0x{:02x}", command_id);
        }
        Ok(())
    }

    fn vehicle_ids(&mut self) -> TraciResult<Vec<String>> {
        self.get_variable(CMD_GET_VEHICLE_VARIABLE, TRACI_ID_LIST, "")?
            .into_string_list()
    }

    fn vehicle_position(&mut self, vehicle_id: &str) -> TraciResult<Position> {
        self.get_variable(CMD_GET_VEHICLE_VARIABLE, VAR_POSITION, vehicle_id)?
            .into_position()
    }

    fn traffic_light_ids(&mut self) -> TraciResult<Vec<String>> {
        self.get_variable(CMD_GET_TL_VARIABLE, TRACI_ID_LIST, "")?
            .into_string_list()
    }

    fn red_yellow_green_state(&mut self, tls_id: &str) -> TraciResult<String> {
        self.get_variable(CMD_GET_TL_VARIABLE, TL_RED_YELLOW_GREEN_STATE, tls_id)?
            .into_string()
    }

    fn junction_position(&mut self, junction_id: &str) -> TraciResult<Position> {
        self.get_variable(CMD_GET_JUNCTION_VARIABLE, VAR_POSITION, junction_id)?
            .into_position()
    }

    fn min_expected_vehicles(&mut self) -> TraciResult<i32> {
        self.get_variable(CMD_GET_SIM_VARIABLE, VAR_MIN_EXPECTED_VEHICLES, "")?
            .into_integer()
    }
}
