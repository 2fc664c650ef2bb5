//! Pairing coordinator demo host.
//!
//! Wires the single-threaded [`pairing_coordinator::PairingCoordinator`] core to a
//! simulated in-process radio (an mpsc loopback standing in for the real transport,
//! able to drop or corrupt frames) and a line-oriented stdin operator console.

use std::time::Duration;

use clap::Parser;
use pairing_coordinator::{
    AcceptMessage, AdvertisementMessage, BindingResult, Capabilities, CoordinatorIdentity,
    DeviceType, DiscoveredNode, FirmwareVersion, HwAddr, MonotonicClock, OsPairingRng,
    PairingConfig, PairingCoordinator, PairingMessage, PairingObserver, PairingRadio,
    PROTOCOL_VERSION,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pairing-coordinator", version, about = "Permit-join pairing coordinator demo host")]
struct Args {
    /// Coordinator hardware address, as six colon-separated hex bytes
    #[arg(long, default_value = "AA:AA:AA:AA:AA:AA")]
    coordinator_mac: String,

    /// Coordinator identifier
    #[arg(long, default_value = "4096")]
    coordinator_id: u16,

    /// Farm identifier
    #[arg(long, default_value = "1")]
    farm_id: u16,

    /// Discovery table capacity
    #[arg(long, default_value = "32")]
    capacity: usize,

    /// Default permit-join window, in milliseconds
    #[arg(long, default_value = "60000")]
    permit_join_default_ms: u64,

    /// Simulated node MAC that advertises and accepts offers automatically
    #[arg(long, default_value = "10:20:30:40:50:60")]
    sim_node_mac: String,

    /// Fraction of outbound frames the simulated radio silently drops over the air
    #[arg(long, default_value_t = 0.0)]
    drop_rate: f64,
}

fn parse_mac(s: &str) -> Result<HwAddr, String> {
    let mut bytes = [0u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(format!("expected six colon-separated hex bytes, got {:?}", s));
    }
    for (i, part) in parts.iter().enumerate() {
        bytes[i] = u8::from_str_radix(part, 16).map_err(|e| e.to_string())?;
    }
    Ok(HwAddr::new(bytes))
}

struct ChannelRadio {
    to_air: mpsc::UnboundedSender<Vec<u8>>,
    drop_rate: f64,
}

impl ChannelRadio {
    fn send_frame(&mut self, bytes: Vec<u8>) -> bool {
        if rand::random::<f64>() < self.drop_rate {
            warn!("simulated radio dropped outbound frame");
            return true;
        }
        self.to_air.send(bytes).is_ok()
    }
}

impl PairingRadio for ChannelRadio {
    fn send_offer(&mut self, _dest_mac: HwAddr, msg: pairing_coordinator::OfferMessage) -> bool {
        self.send_frame(PairingMessage::Offer(msg).encode())
    }

    fn send_confirm(&mut self, _dest_mac: HwAddr, msg: pairing_coordinator::ConfirmMessage) -> bool {
        self.send_frame(PairingMessage::Confirm(msg).encode())
    }

    fn send_reject(&mut self, _dest_mac: HwAddr, msg: pairing_coordinator::RejectMessage) -> bool {
        self.send_frame(PairingMessage::Reject(msg).encode())
    }
}

struct LoggingObserver;

impl PairingObserver for LoggingObserver {
    fn permit_join_changed(&mut self, open: bool, remaining_ms: u64) {
        info!(open, remaining_ms, "permit-join state changed");
    }

    fn binding_started(&mut self, entry: DiscoveredNode) {
        info!(mac = %entry.mac, offer_token = entry.offer_token, "binding started");
    }

    fn binding_completed(&mut self, entry: DiscoveredNode, result: BindingResult) {
        info!(mac = %entry.mac, ?result, "binding completed");
    }
}

/// Stands in for the real node's firmware: advertises periodically and accepts any
/// offer addressed to it, mirroring the four-message handshake from the peer side.
async fn run_simulated_node(
    mac: HwAddr,
    mut from_coordinator: mpsc::UnboundedReceiver<Vec<u8>>,
    to_coordinator: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut nonce: u32 = rand::random();
    let mut sequence: u16 = 0;
    let mut advertise_interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = advertise_interval.tick() => {
                sequence = sequence.wrapping_add(1);
                nonce = nonce.wrapping_add(1);
                let msg = PairingMessage::Advertisement(AdvertisementMessage {
                    version: PROTOCOL_VERSION,
                    mac,
                    device_type: DeviceType::Tower,
                    firmware_version: FirmwareVersion::new(1, 0, 0).pack(),
                    capabilities: Capabilities::DHT | Capabilities::PUMP_RELAY,
                    nonce,
                    sequence,
                    rssi_request: -60,
                });
                if to_coordinator.send(msg.encode()).is_err() {
                    break;
                }
            }
            frame = from_coordinator.recv() => {
                let Some(bytes) = frame else { break };
                match PairingMessage::decode(&bytes) {
                    Ok(msg) => {
                        info!(command = msg.command(), "sim node: frame received");
                        match msg {
                            PairingMessage::Offer(offer) => {
                                let accept = PairingMessage::Accept(AcceptMessage {
                                    node_mac: mac,
                                    offer_token: offer.offer_token,
                                    accepted_tower_id: offer.offered_tower_id,
                                });
                                let _ = to_coordinator.send(accept.encode());
                            }
                            PairingMessage::Confirm(confirm) => {
                                info!(tower_id = confirm.tower_id, "sim node: bound");
                            }
                            PairingMessage::Reject(reject) => {
                                warn!(reason = ?reject.reason_code, "sim node: rejected");
                            }
                            _ => {}
                        }
                    }
                    Err(e) => warn!(error = %e, "sim node: failed to decode inbound frame"),
                }
            }
        }
    }
}

enum OperatorCommand {
    Open(u64),
    Close,
    Approve(HwAddr),
    Reject(HwAddr),
    List,
    Quit,
}

fn parse_command(line: &str) -> Option<OperatorCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "open" => parts.next()?.parse().ok().map(OperatorCommand::Open),
        "close" => Some(OperatorCommand::Close),
        "approve" => parse_mac(parts.next()?).ok().map(OperatorCommand::Approve),
        "reject" => parse_mac(parts.next()?).ok().map(OperatorCommand::Reject),
        "list" => Some(OperatorCommand::List),
        "quit" => Some(OperatorCommand::Quit),
        other => {
            warn!(command = other, "unrecognized operator command");
            None
        }
    }
}

async fn run_stdin_console(tx: mpsc::UnboundedSender<OperatorCommand>) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(cmd) = parse_command(&line) {
            let is_quit = matches!(cmd, OperatorCommand::Quit);
            if tx.send(cmd).is_err() || is_quit {
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pairing_coordinator=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let coord_mac = match parse_mac(&args.coordinator_mac) {
        Ok(mac) => mac,
        Err(e) => {
            tracing::error!(error = %e, "invalid --coordinator-mac");
            return;
        }
    };
    let sim_mac = match parse_mac(&args.sim_node_mac) {
        Ok(mac) => mac,
        Err(e) => {
            tracing::error!(error = %e, "invalid --sim-node-mac");
            return;
        }
    };

    info!("════════════════════════════════════════════════════════════");
    info!("  Pairing coordinator v{VERSION}");
    info!("════════════════════════════════════════════════════════════");
    info!(%coord_mac, coordinator_id = args.coordinator_id, farm_id = args.farm_id, "identity");

    let identity = CoordinatorIdentity::new(coord_mac, args.coordinator_id, args.farm_id);
    let config = PairingConfig { discovery_capacity: args.capacity, ..PairingConfig::default() };

    let rng = match OsPairingRng::new() {
        Ok(rng) => rng,
        Err(e) => {
            tracing::error!(error = %e, "failed to construct RNG");
            return;
        }
    };

    let (to_air, from_coordinator) = mpsc::unbounded_channel::<Vec<u8>>();
    let (to_coordinator, mut air_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(run_simulated_node(sim_mac, from_coordinator, to_coordinator));

    let (operator_tx, mut operator_rx) = mpsc::unbounded_channel::<OperatorCommand>();
    tokio::spawn(run_stdin_console(operator_tx));

    let radio = ChannelRadio { to_air, drop_rate: args.drop_rate };
    let mut coordinator =
        PairingCoordinator::new(config, identity, radio, LoggingObserver, MonotonicClock::new(), rng);

    info!("type: open <ms>, close, approve <mac>, reject <mac>, list, quit");

    let mut tick_interval = tokio::time::interval(Duration::from_millis(20));

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                coordinator.tick();
            }
            frame = air_rx.recv() => {
                let Some(bytes) = frame else { break };
                match PairingMessage::decode(&bytes) {
                    Ok(msg) => {
                        info!(command = msg.command(), "frame received");
                        match msg {
                            PairingMessage::Advertisement(m) => { coordinator.on_advertisement(m); }
                            PairingMessage::Accept(m) => { coordinator.on_accept(m); }
                            PairingMessage::Abort(m) => { coordinator.on_abort(m); }
                            _ => {}
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to decode inbound frame"),
                }
            }
            cmd = operator_rx.recv() => {
                match cmd {
                    Some(OperatorCommand::Open(ms)) => {
                        coordinator.enable_permit_join(ms);
                    }
                    Some(OperatorCommand::Close) => {
                        coordinator.disable_permit_join();
                    }
                    Some(OperatorCommand::Approve(mac)) => {
                        if !coordinator.approve(mac) {
                            warn!(%mac, "approve rejected");
                        }
                    }
                    Some(OperatorCommand::Reject(mac)) => {
                        coordinator.reject(mac);
                    }
                    Some(OperatorCommand::List) => {
                        for node in coordinator.discovered_nodes() {
                            info!(mac = %node.mac, state = ?node.state, rssi = node.rssi, "discovered node");
                        }
                    }
                    Some(OperatorCommand::Quit) | None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
}
