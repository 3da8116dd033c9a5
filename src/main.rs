mod harness;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_colors(true)
        .with_threads(true)
        .with_local_timestamps()
        .init()
        .expect("failed to build logger instance");

    let channels = parlance_bridge::BridgeChannels::default();
    parlance_backend::run(channels.backend_rx, channels.backend_tx);
    harness::run(channels.frontend_rx, channels.frontend_tx);
}
