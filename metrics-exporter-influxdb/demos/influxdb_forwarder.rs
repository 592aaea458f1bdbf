use std::time::{Duration, Instant};

use metrics_exporter_influxdb::{InfluxDbBuilder, Metric};

fn main() {
    tracing_subscriber::fmt::init();

    let forwarder = InfluxDbBuilder::default()
        .with_server("localhost")
        .with_port(8089)
        .with_prefix("demo.")
        .with_default_dimension("env", "dev")
        .with_interval(Duration::from_secs(5))
        .spawn()
        .expect("failed to spawn InfluxDB forwarder");

    // Send a sample every second for a minute, then shut down and flush whatever is left.
    let started = Instant::now();
    let mut iteration = 0u32;
    while started.elapsed() < Duration::from_secs(60) {
        let metric = Metric::new("loop.iterations", f64::from(iteration)).with_dimension("worker", "main");
        forwarder.send(metric).expect("forwarder should be running");

        iteration += 1;
        std::thread::sleep(Duration::from_secs(1));
    }

    forwarder.shutdown();
}
