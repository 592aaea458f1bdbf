use std::{
    io::ErrorKind,
    net::UdpSocket,
    time::Duration,
};

use metrics_exporter_influxdb::{HandlerOptions, InfluxDbBuilder, Metric};

fn listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("failed to bind listener");
    socket.set_read_timeout(Some(Duration::from_millis(500))).expect("failed to set read timeout");
    let port = socket.local_addr().expect("listener has no local address").port();
    (socket, port)
}

fn receive_lines(socket: &UdpSocket) -> Vec<String> {
    let mut lines = Vec::new();
    let mut buf = [0; 2048];
    loop {
        match socket.recv(&mut buf) {
            Ok(len) => lines.push(String::from_utf8(buf[..len].to_vec()).expect("datagram is not UTF-8")),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => return lines,
            Err(e) => panic!("failed to receive: {}", e),
        }
    }
}

/// Checks a line against `<series> value=<float> <unix seconds>\n`.
fn assert_line_grammar(line: &str) {
    let body = line.strip_suffix('\n').expect("line must end with a newline");
    assert!(!body.contains('\n'), "line has more than one newline: {:?}", line);

    let mut fields = body.split(' ');
    let series = fields.next().expect("missing series");
    let value = fields.next().expect("missing value field");
    let timestamp = fields.next().expect("missing timestamp");
    assert!(fields.next().is_none(), "unexpected trailing field in {:?}", line);

    let mut tags = series.split(',');
    assert!(!tags.next().unwrap_or_default().is_empty(), "missing name in {:?}", line);
    let keys = tags
        .map(|tag| tag.split_once('=').expect("tag without '='").0)
        .collect::<Vec<_>>();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]), "tags out of order in {:?}", line);

    let value = value.strip_prefix("value=").expect("value field must start with 'value='");
    value.parse::<f64>().expect("value must be a float");

    assert_eq!(timestamp.len(), 10);
    timestamp.parse::<u64>().expect("timestamp must be an integer");
}

#[test]
fn batch_is_received() {
    let (socket, port) = listener();
    let handler = InfluxDbBuilder::default()
        .with_server("127.0.0.1")
        .with_port(port)
        .with_prefix("app.")
        .with_default_dimension("env", "prod")
        .with_telemetry(false)
        .build();

    let metrics = [
        Metric::new("cpu.load", 0.73).with_dimension("host", "a.b").with_dimension("dc", "east"),
        Metric::new("mem.used", 1024.0).with_dimension("host", "a.b"),
        Metric::new("requests", 3.0),
    ];
    assert!(handler.emit(&metrics));

    let lines = receive_lines(&socket);
    assert_eq!(lines.len(), 3);
    for line in &lines {
        assert_line_grammar(line);
    }

    assert!(lines[0].starts_with("app.cpu.load,dc=east,env=prod,host=a_b value=0.730000 "));
    assert!(lines[1].starts_with("app.mem.used,env=prod,host=a_b value=1024.000000 "));
    assert!(lines[2].starts_with("app.requests,env=prod value=3.000000 "));
}

#[test]
fn invalid_destination_sends_nothing() {
    let (socket, _) = listener();
    let handler = InfluxDbBuilder::default()
        .with_server("127.0.0.1")
        .with_port("99999")
        .with_telemetry(false)
        .build();

    assert!(!handler.emit(&[Metric::new("cpu", 1.0)]));
    assert!(receive_lines(&socket).is_empty());
}

#[test]
fn forwarder_delivers_on_shutdown() {
    let (socket, port) = listener();
    let forwarder = InfluxDbBuilder::default()
        .with_server("127.0.0.1")
        .with_port(port)
        .with_interval(Duration::from_secs(3600))
        .with_telemetry(false)
        .spawn()
        .expect("failed to spawn forwarder");

    forwarder.send(Metric::new("a", 1.0)).expect("forwarder should be running");
    forwarder.send(Metric::new("b", 2.0)).expect("forwarder should be running");
    forwarder.shutdown();

    let lines = receive_lines(&socket);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a value=1.000000 "));
    assert!(lines[1].starts_with("b value=2.000000 "));
}

#[test]
fn forwarder_from_params_with_huge_interval() {
    let (socket, port) = listener();
    let port = port.to_string();
    let options = HandlerOptions::from_params([
        ("server", "127.0.0.1"),
        ("port", port.as_str()),
        ("interval", "18446744073709551615"),
        ("default_dimensions.env", "prod"),
    ])
    .expect("options should parse");

    let forwarder = InfluxDbBuilder::from_options(&options).spawn().expect("failed to spawn forwarder");
    forwarder.send(Metric::new("a", 1.0)).expect("forwarder should be running");
    forwarder.send(Metric::new("b", 2.0)).expect("forwarder should be running");
    forwarder.shutdown();

    let lines = receive_lines(&socket);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a,env=prod value=1.000000 "));
    assert!(lines[1].starts_with("b,env=prod value=2.000000 "));
}
