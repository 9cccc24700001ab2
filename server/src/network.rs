//! Server network layer handling UDP requests and session engine dispatch

use crate::game::SessionEngine;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ErrorKind, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from the receiver task to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
}

/// Messages sent from request handlers to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// UDP front end for a [`SessionEngine`]
pub struct Server {
    socket: Arc<UdpSocket>,
    engine: Arc<SessionEngine>,
    status_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        engine: Arc<SessionEngine>,
        status_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            engine,
            status_interval,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), SendError> {
        let mut data = serialize(packet)?;
        if data.len() > MAX_DATAGRAM_SIZE {
            warn!(
                "Response of {} bytes for {} exceeds datagram limit, sending error instead",
                data.len(),
                addr
            );
            data = serialize(&Packet::Error {
                kind: ErrorKind::ResponseTooLarge,
                message: format!(
                    "response of {} bytes exceeds the {} byte datagram limit",
                    data.len(),
                    MAX_DATAGRAM_SIZE
                ),
            })?;
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Handles one request on its own task so players never wait on each other
    fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        if !packet.is_request() {
            warn!("Unexpected packet type from client at {}", addr);
            return;
        }

        let engine = Arc::clone(&self.engine);
        let game_tx = self.game_tx.clone();

        tokio::spawn(async move {
            if let Some(response) = dispatch(&engine, packet).await {
                if let Err(e) = game_tx.send(GameMessage::SendPacket {
                    packet: response,
                    addr,
                }) {
                    error!("Failed to queue response for {}: {}", addr, e);
                }
            }
        });
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), SendError> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;

        let mut status_interval = interval(self.status_interval);
        status_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: '{}' with {} questions, {} required per player",
            self.engine.config().title,
            self.engine.bank().len(),
            self.engine.config().min_questions
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = status_interval.tick() => {
                    let players = self.engine.player_count().await;
                    if players > 0 {
                        debug!("{} players in session", players);
                    }
                },
            }
        }

        Ok(())
    }
}

/// Runs a request against the engine and builds the response packet.
///
/// Returns `None` for packets that are not requests.
pub async fn dispatch(engine: &SessionEngine, packet: Packet) -> Option<Packet> {
    let result = match packet {
        Packet::Join {
            user_id,
            name,
            difficulty,
        } => engine
            .join(&user_id, &name, difficulty.unwrap_or_default())
            .await
            .map(|player| Packet::Joined { player }),
        Packet::RequestProblem { user_id } => engine
            .get_current_problem(&user_id)
            .await
            .map(Packet::Problem),
        Packet::Answer { user_id, answer } => engine
            .submit_answer(&user_id, &answer)
            .await
            .map(Packet::AnswerResult),
        Packet::Finish { user_id } => engine.finish(&user_id).await.map(Packet::Finished),
        Packet::RequestStandings => Ok(Packet::Standings {
            players: engine.standings().await,
        }),
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| {
        debug!("Request rejected: {}", e);
        Packet::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }))
}
