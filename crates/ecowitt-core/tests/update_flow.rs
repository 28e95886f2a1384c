//! End-to-end query and update against a fake gateway on loopback.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ecowitt_core::events::NullObserver;
use ecowitt_core::protocol::{ControlPacket, checksum};
use ecowitt_core::transfer::{FirmwareImage, FirmwareImages, ImageSlot, TransferState};
use ecowitt_core::{ControlSession, MacAddress, SessionConfig, transport};

const MAC: [u8; 6] = [0x48, 0x3f, 0xda, 0x01, 0x02, 0x03];
const VERSION: &str = "GW1100C_V2.3.2";

/// How the fake gateway behaves once WRITE_UPDATE arrives.
#[derive(Clone, Copy)]
enum Behaviour {
    /// Accept, fetch the given image in full and say `end`.
    Fetch(&'static str),
    /// Accept, fetch one chunk, then hang up.
    HangUpEarly,
    /// Reply with a nonzero status.
    Reject,
}

/// What the fake gateway saw.
#[derive(Debug, Default)]
struct DeviceLog {
    opcodes: Vec<u8>,
    callback: Option<SocketAddrV4>,
    announced: Option<u32>,
    received: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    assert_eq!(&header[..2], &[0xFF, 0xFF]);
    let (opcode, size) = (header[2], header[3]);
    let mut rest = vec![0u8; size as usize - 2];
    stream.read_exact(&mut rest).ok()?;
    let (payload, sum) = rest.split_at(rest.len() - 1);
    assert_eq!(sum[0], checksum(opcode, size, payload), "request checksum");
    Some((opcode, payload.to_vec()))
}

fn reply(stream: &mut TcpStream, opcode: u8, payload: &[u8]) {
    let bytes = ControlPacket::new(opcode, payload.to_vec()).unwrap().to_bytes();
    stream.write_all(&bytes).unwrap();
}

fn fetch(callback: SocketAddrV4, token: &str, hang_up_early: bool, log: &mut DeviceLog) {
    let mut conn = TcpStream::connect(callback).unwrap();
    conn.write_all(format!("{token}\0").as_bytes()).unwrap();

    let mut size = [0u8; 4];
    conn.read_exact(&mut size).unwrap();
    let size = u32::from_be_bytes(size) as usize;
    log.announced = Some(size as u32);

    conn.write_all(b"start\0").unwrap();
    loop {
        let want = (size - log.received.len()).min(1024);
        let mut chunk = vec![0u8; want];
        conn.read_exact(&mut chunk).unwrap();
        log.received.extend_from_slice(&chunk);

        if hang_up_early {
            return;
        }
        if log.received.len() == size {
            break;
        }
        conn.write_all(b"continue\0").unwrap();
    }
    conn.write_all(b"end\0").unwrap();
}

fn spawn_gateway(behaviour: Behaviour) -> (u16, JoinHandle<DeviceLog>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut control, _) = listener.accept().unwrap();
        let mut log = DeviceLog::default();

        while let Some((opcode, payload)) = read_request(&mut control) {
            log.opcodes.push(opcode);
            match opcode {
                0x26 => reply(&mut control, 0x26, &MAC),
                0x50 => {
                    let mut body = vec![VERSION.len() as u8];
                    body.extend_from_slice(VERSION.as_bytes());
                    reply(&mut control, 0x50, &body);
                }
                0x43 => {
                    assert_eq!(payload.len(), 6);
                    let ip = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
                    let callback = SocketAddrV4::new(ip, u16::from_be_bytes([payload[4], payload[5]]));
                    log.callback = Some(callback);

                    match behaviour {
                        Behaviour::Reject => reply(&mut control, 0x43, &[0x01]),
                        Behaviour::Fetch(token) => {
                            reply(&mut control, 0x43, &[0x00]);
                            fetch(callback, token, false, &mut log);
                        }
                        Behaviour::HangUpEarly => {
                            reply(&mut control, 0x43, &[0x00]);
                            fetch(callback, "user1.bin", true, &mut log);
                        }
                    }
                    break;
                }
                other => panic!("unexpected opcode 0x{other:02X}"),
            }
        }
        log
    });

    (port, handle)
}

fn image(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn connect(port: u16) -> ControlSession<TcpStream, NullObserver> {
    let config = SessionConfig {
        reply_timeout_ms: 2000,
        ..Default::default()
    };
    let stream = transport::connect("127.0.0.1", port, config.connect_timeout()).unwrap();
    ControlSession::with_observer(stream, config, Arc::new(NullObserver))
}

#[test]
fn test_identity_then_update() {
    let data = image(5000, 7);
    let (port, gateway) = spawn_gateway(Behaviour::Fetch("user1.bin"));
    let mut session = connect(port);

    let identity = session.read_identity().unwrap();
    assert_eq!(identity.mac, MacAddress(MAC));
    assert_eq!(identity.firmware_version, VERSION);

    let mut images = FirmwareImages::single(FirmwareImage::from_bytes("user1", data.clone()));
    let report = session.perform_update(&mut images).unwrap();

    assert!(report.completed);
    assert_eq!(report.image, Some(ImageSlot::First));
    assert_eq!(report.image_size, Some(5000));
    assert_eq!(report.packets_sent, 5);
    assert_eq!(report.bytes_sent, 5000);
    assert_eq!(report.final_state, TransferState::GotEnd);

    let log = gateway.join().unwrap();
    assert_eq!(log.opcodes, vec![0x26, 0x50, 0x43]);
    assert_eq!(log.announced, Some(5000));
    assert_eq!(log.received, data);

    // Callback goes to the control connection's own local address.
    let callback = log.callback.unwrap();
    assert_eq!(*callback.ip(), Ipv4Addr::LOCALHOST);
    assert_ne!(callback.port(), port);
}

#[test]
fn test_update_serves_second_image() {
    let first = image(100, 1);
    let second = image(2048, 2);
    let (port, gateway) = spawn_gateway(Behaviour::Fetch("user2.bin"));
    let mut session = connect(port);

    let mut images = FirmwareImages::new(
        FirmwareImage::from_bytes("user1", first),
        Some(FirmwareImage::from_bytes("user2", second.clone())),
    );
    let report = session.perform_update(&mut images).unwrap();
    assert_eq!(report.image, Some(ImageSlot::Second));
    assert_eq!(report.packets_sent, 2);

    let log = gateway.join().unwrap();
    assert_eq!(log.opcodes, vec![0x43]);
    assert_eq!(log.received, second);
}

#[test]
fn test_rejected_update() {
    let (port, gateway) = spawn_gateway(Behaviour::Reject);
    let mut session = connect(port);

    let mut images = FirmwareImages::single(FirmwareImage::from_bytes("user1", image(10, 0)));
    let err = session.perform_update(&mut images).unwrap_err();
    assert!(err.is_update_rejected());

    let log = gateway.join().unwrap();
    let callback = log.callback.unwrap();
    // Listener was closed when the update failed.
    thread::sleep(Duration::from_millis(50));
    assert!(TcpStream::connect(callback).is_err());
}

#[test]
fn test_device_hangs_up_mid_transfer() {
    let (port, gateway) = spawn_gateway(Behaviour::HangUpEarly);
    let mut session = connect(port);

    let mut images = FirmwareImages::single(FirmwareImage::from_bytes("user1", image(3000, 9)));
    let report = session.perform_update(&mut images).unwrap();

    assert!(!report.completed);
    assert_eq!(report.final_state, TransferState::GotStart);
    assert_eq!(report.bytes_sent, 1024);

    let log = gateway.join().unwrap();
    assert_eq!(log.received.len(), 1024);
}
