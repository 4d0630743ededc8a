#![cfg(unix)]

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use arraypipe_frame::{Frame, Shape, TypeCode};
use arraypipe_session::{
    receive, send, Complex, NumericArray, NumericData, Receiver, ReceiverState, SessionConfig,
    SessionError, Stage, Value,
};
use arraypipe_transport::{open_pipe, UnixDomainSocket};

fn socket_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("arraypipe-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn config() -> SessionConfig {
    SessionConfig {
        timeout: Duration::from_secs(2),
        block_size: Some(16),
        ..SessionConfig::default()
    }
}

/// Run a receiver on a bound socket and a sender connecting to it.
fn transfer(name: &str, value: Value) -> (Result<Value, SessionError>, Result<(), SessionError>) {
    let path = socket_path(name);
    let listener = UnixDomainSocket::bind(&path).unwrap();

    let sender_path = path.clone();
    let sender = thread::spawn(move || {
        let stream = open_pipe(&sender_path).unwrap();
        send(stream, &value, &config())
    });

    let stream = listener.accept().unwrap();
    let received = receive::<_, Value>(stream, &config());
    (received, sender.join().unwrap())
}

#[test]
fn float64_matrix_end_to_end() {
    let matrix = Value::Numeric(NumericArray::from_rows(&[
        &[1.0, 2.0],
        &[3.0, 4.0],
        &[5.0, 6.0],
    ]));

    let (received, sent) = transfer("matrix.sock", matrix.clone());

    sent.unwrap();
    let received = received.unwrap();
    assert_eq!(received, matrix);
    match received {
        Value::Numeric(array) => {
            assert_eq!(array.dims, vec![3, 2]);
            assert_eq!(
                array.data,
                NumericData::Float64(vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0])
            );
        }
        other => panic!("unexpected value {other:?}"),
    }
}

#[test]
fn silent_sender_times_out_at_header() {
    let (_silent, ours) = UnixStream::pair().unwrap();
    let started = Instant::now();
    let config = SessionConfig::with_timeout(Duration::from_millis(200));
    let mut receiver = Receiver::new(ours, config);
    let err = receiver.receive_frame().unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.stage(), Some(Stage::Header));
    assert_eq!(receiver.state(), ReceiverState::Failed);
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
}

#[test]
fn every_wire_type_round_trips() {
    let values = vec![
        Value::Text("arraypipe".to_string()),
        Value::Text(String::new()),
        Value::Numeric(NumericArray::matrix(2, 2, NumericData::Int8(vec![-1, 0, 1, 2]))),
        Value::Numeric(NumericArray::matrix(1, 3, NumericData::UInt8(vec![0, 128, 255]))),
        Value::Numeric(NumericArray::matrix(3, 1, NumericData::Int16(vec![-2, 0, 2]))),
        Value::Numeric(NumericArray::matrix(1, 1, NumericData::UInt16(vec![65535]))),
        Value::Numeric(NumericArray::matrix(2, 1, NumericData::Int32(vec![-7, 7]))),
        Value::Numeric(NumericArray::matrix(1, 2, NumericData::UInt32(vec![1, 2]))),
        Value::Numeric(NumericArray::matrix(2, 3, NumericData::Float32(vec![0.5; 6]))),
        Value::Numeric(NumericArray::matrix(
            5,
            5,
            NumericData::Float64((0..25).map(f64::from).collect()),
        )),
        Value::Numeric(NumericArray::matrix(
            1,
            2,
            NumericData::ComplexFloat32(vec![Complex::new(1.0, 2.0), Complex::new(-3.0, 0.0)]),
        )),
        Value::Numeric(NumericArray::matrix(
            2,
            1,
            NumericData::ComplexFloat64(vec![Complex::new(0.0, -1.0), Complex::new(9.5, 9.5)]),
        )),
        Value::Numeric(NumericArray::matrix(0, 0, NumericData::Float64(vec![]))),
    ];

    for (i, value) in values.into_iter().enumerate() {
        let (received, sent) = transfer(&format!("roundtrip-{i}.sock"), value.clone());
        sent.unwrap();
        assert_eq!(received.unwrap(), value, "value #{i}");
    }
}

#[test]
fn unsupported_value_fails_both_sides() {
    let (received, sent) = transfer("cell.sock", Value::Cell(vec![Value::Text("x".into())]));

    assert!(matches!(sent, Err(SessionError::UnsupportedValue(_))));
    assert!(matches!(received, Err(SessionError::UnsupportedValue(_))));
}

#[test]
fn large_payload_uses_default_block_size() {
    let path = socket_path("large.sock");
    let listener = UnixDomainSocket::bind(&path).unwrap();
    let data: Vec<u8> = (0..=255u8).cycle().take(1 << 20).collect();
    let frame = Frame::new(TypeCode::UInt8, Shape::new(1024, 1024), data).unwrap();
    let expected = frame.clone();

    let sender = thread::spawn(move || {
        let stream = open_pipe(&path).unwrap();
        let config = SessionConfig::with_timeout(Duration::from_secs(5));
        send(stream, &frame, &config)
    });

    let stream = listener.accept().unwrap();
    let received: Frame = receive(stream, &SessionConfig::with_timeout(Duration::from_secs(5)))
        .unwrap();
    sender.join().unwrap().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn receiver_rejection_reaches_sender() {
    let path = socket_path("reject.sock");
    let listener = UnixDomainSocket::bind(&path).unwrap();
    let frame = Frame::new(TypeCode::Float64, Shape::new(8, 8), vec![0u8; 512]).unwrap();

    let sender = thread::spawn(move || {
        let stream = open_pipe(&path).unwrap();
        send(stream, &frame, &config())
    });

    let stream = listener.accept().unwrap();
    let small = SessionConfig {
        max_payload_size: 64,
        ..config()
    };
    let received = receive::<_, Frame>(stream, &small);

    assert!(matches!(
        received,
        Err(SessionError::PayloadTooLarge { size: 512, max: 64 })
    ));
    assert!(matches!(
        sender.join().unwrap(),
        Err(SessionError::PeerRejected)
    ));
}
