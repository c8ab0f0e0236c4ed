use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use v2i_hazard_bridge::monitoring::{HazardSink, LogSink, StepOutcome, TrafficHazardMonitor};
use v2i_hazard_bridge::shared_data::Position;
use v2i_hazard_bridge::traci::codec::{self, put_command, put_string};
use v2i_hazard_bridge::traci::constants::*;
use v2i_hazard_bridge::traci::{SimulationLink, TraciClient, TraciError};

/// Minimal SUMO stand-in: one vehicle, one light, answers until CLOSE.
fn spawn_fake_sumo(signal_state: &'static str) -> (u16, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut seen = Vec::new();
        loop {
            let mut request = read_message(&mut stream);
            let (command, mut content) = codec::read_command(&mut request).unwrap();
            seen.push(command);
            let reply = answer(command, &mut content, signal_state);
            stream.write_all(&codec::frame_message(&reply)).unwrap();
            if command == CMD_CLOSE {
                return seen;
            }
        }
    });
    (port, handle)
}

fn read_message(stream: &mut TcpStream) -> Bytes {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let mut body = vec![0u8; u32::from_be_bytes(header) as usize - 4];
    stream.read_exact(&mut body).unwrap();
    Bytes::from(body)
}

fn status(buf: &mut BytesMut, command: u8, result: u8, description: &str) {
    let mut payload = BytesMut::new();
    payload.put_u8(result);
    put_string(&mut payload, description);
    put_command(buf, command, &payload);
}

fn get_response(buf: &mut BytesMut, command: u8, variable: u8, object: &str, value: &[u8]) {
    status(buf, command, RTYPE_OK, "");
    let mut content = BytesMut::new();
    content.put_u8(variable);
    put_string(&mut content, object);
    content.put_slice(value);
    put_command(buf, command + RESPONSE_OFFSET, &content);
}

fn position(x: f64, y: f64) -> Vec<u8> {
    let mut value = BytesMut::new();
    value.put_u8(POSITION_2D);
    value.put_f64(x);
    value.put_f64(y);
    value.to_vec()
}

fn string_list(items: &[&str]) -> Vec<u8> {
    let mut value = BytesMut::new();
    value.put_u8(TYPE_STRINGLIST);
    value.put_u32(items.len() as u32);
    for item in items {
        put_string(&mut value, item);
    }
    value.to_vec()
}

fn answer(command: u8, content: &mut Bytes, signal_state: &str) -> BytesMut {
    let mut reply = BytesMut::new();
    match command {
        CMD_GETVERSION => {
            status(&mut reply, command, RTYPE_OK, "");
            let mut version = BytesMut::new();
            version.put_i32(21);
            put_string(&mut version, "SUMO 1.20.0");
            put_command(&mut reply, CMD_GETVERSION, &version);
        }
        CMD_SIMSTEP => {
            status(&mut reply, command, RTYPE_OK, "");
            reply.put_i32(0);
        }
        CMD_CLOSE => status(&mut reply, command, RTYPE_OK, ""),
        _ => {
            let variable = codec::read_u8(content).unwrap();
            let object = codec::read_string(content).unwrap();
            match (command, variable, object.as_str()) {
                (CMD_GET_VEHICLE_VARIABLE, TRACI_ID_LIST, _) => {
                    get_response(&mut reply, command, variable, &object, &string_list(&["car0"]))
                }
                (CMD_GET_VEHICLE_VARIABLE, VAR_POSITION, "car0") => {
                    get_response(&mut reply, command, variable, &object, &position(0.0, 0.0))
                }
                (CMD_GET_TL_VARIABLE, TRACI_ID_LIST, _) => {
                    get_response(&mut reply, command, variable, &object, &string_list(&["A1"]))
                }
                (CMD_GET_TL_VARIABLE, TL_RED_YELLOW_GREEN_STATE, "A1") => {
                    let mut value = BytesMut::new();
                    value.put_u8(TYPE_STRING);
                    put_string(&mut value, signal_state);
                    get_response(&mut reply, command, variable, &object, &value)
                }
                (CMD_GET_JUNCTION_VARIABLE, VAR_POSITION, "A1") => {
                    get_response(&mut reply, command, variable, &object, &position(10.0, 0.0))
                }
                (CMD_GET_SIM_VARIABLE, VAR_MIN_EXPECTED_VEHICLES, _) => {
                    let mut value = BytesMut::new();
                    value.put_u8(TYPE_INTEGER);
                    value.put_i32(1);
                    get_response(&mut reply, command, variable, &object, &value)
                }
                _ => status(
                    &mut reply,
                    command,
                    RTYPE_ERR,
                    &format!("Object '{}' is not known", object),
                ),
            }
        }
    }
    reply
}

#[test]
fn client_speaks_traci() {
    let (port, server) = spawn_fake_sumo("GGrr");
    let mut client = TraciClient::new();

    let version = client.connect("127.0.0.1", port).unwrap();
    assert_eq!(version.api_version, 21);
    assert_eq!(version.simulator, "SUMO 1.20.0");

    client.simulation_step().unwrap();
    assert_eq!(client.vehicle_ids().unwrap(), vec!["car0".to_string()]);
    assert_eq!(client.vehicle_position("car0").unwrap(), Position::new(0.0, 0.0));
    assert_eq!(client.traffic_light_ids().unwrap(), vec!["A1".to_string()]);
    assert_eq!(client.red_yellow_green_state("A1").unwrap(), "GGrr");
    assert_eq!(client.junction_position("A1").unwrap(), Position::new(10.0, 0.0));
    assert_eq!(client.min_expected_vehicles().unwrap(), 1);

    match client.vehicle_position("ghost") {
        Err(TraciError::CommandFailed { status, description, .. }) => {
            assert_eq!(status, RTYPE_ERR);
            assert!(description.contains("ghost"));
        }
        other => panic!("unexpected answer {:?}", other),
    }

    client.close().unwrap();
    assert!(!client.is_connected());

    let seen = server.join().unwrap();
    assert_eq!(seen.first(), Some(&CMD_GETVERSION));
    assert_eq!(seen.last(), Some(&CMD_CLOSE));
}

/// Answers the handshake, then replies to the next request only after `delay`.
fn spawn_slow_sumo(delay: Duration) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = read_message(&mut stream);
        let (command, mut content) = codec::read_command(&mut request).unwrap();
        let reply = answer(command, &mut content, "rrrr");
        stream.write_all(&codec::frame_message(&reply)).unwrap();

        let mut request = read_message(&mut stream);
        let (command, mut content) = codec::read_command(&mut request).unwrap();
        let reply = answer(command, &mut content, "rrrr");
        thread::sleep(delay);
        // The client has given up by now; the write may fail.
        let _ = stream.write_all(&codec::frame_message(&reply));
    });
    (port, handle)
}

#[test]
fn late_reply_drops_the_connection() {
    let (port, server) = spawn_slow_sumo(Duration::from_millis(300));
    let mut client = TraciClient::with_read_timeout(Some(Duration::from_millis(100)));
    client.connect("127.0.0.1", port).unwrap();

    assert!(matches!(client.traffic_light_ids(), Err(TraciError::Io(_))));
    assert!(!client.is_connected());

    // No stale answer is ever handed to a later request.
    assert!(matches!(client.vehicle_ids(), Err(TraciError::NotConnected)));
    assert!(matches!(client.vehicle_ids(), Err(TraciError::NotConnected)));
    server.join().unwrap();
}

#[test]
fn monitor_detects_red_light_over_tcp() {
    let (port, server) = spawn_fake_sumo("rrGG");
    let sink: Arc<dyn HazardSink> = Arc::new(LogSink);
    {
        let mut monitor = TrafficHazardMonitor::new(TraciClient::new());
        monitor.connect("127.0.0.1", port).unwrap();
        assert!(monitor.is_simulation_active());

        match monitor.advance_step_with_monitoring(&sink) {
            StepOutcome::HazardRaised(event) => {
                assert_eq!(event.traffic_light_id, "A1");
                assert_eq!(event.distance, 10.0);
                assert_eq!(event.tick, 1);
            }
            other => panic!("expected a hazard, got {:?}", other),
        }
        assert_eq!(
            monitor.advance_step_with_monitoring(&sink),
            StepOutcome::HazardOngoing
        );
        assert!(monitor.has_pending_warning());
        assert_eq!(monitor.vehicle_position_xy("ghost"), None);
        // Dropping the monitor closes the connection.
    }
    let seen = server.join().unwrap();
    assert_eq!(seen.last(), Some(&CMD_CLOSE));
}

#[test]
fn green_light_over_tcp_is_clear() {
    let (port, server) = spawn_fake_sumo("GGGG");
    let sink: Arc<dyn HazardSink> = Arc::new(LogSink);
    let mut monitor = TrafficHazardMonitor::new(TraciClient::new());
    monitor.connect("127.0.0.1", port).unwrap();
    assert_eq!(monitor.advance_step_with_monitoring(&sink), StepOutcome::Clear);
    assert!(!monitor.has_pending_warning());
    monitor.close();
    server.join().unwrap();
}
