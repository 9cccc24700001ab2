use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use shared::{AnswerOutcome, Difficulty, Packet, ProblemView, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for the quiz race server")]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player id used for every request
    #[arg(short, long)]
    user_id: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// easy, medium or hard
    #[arg(short, long, default_value = "medium")]
    difficulty: Difficulty,
}

struct QuizClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    buffer: Vec<u8>,
}

impl QuizClient {
    async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        Ok(Self {
            socket,
            server_addr,
            buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Discards replies that arrived after an earlier request timed out
    fn drain_stale_replies(&mut self) {
        while let Ok((len, addr)) = self.socket.try_recv_from(&mut self.buffer) {
            debug!("Discarding stale {} byte reply from {}", len, addr);
        }
    }

    /// Sends a request and waits for the matching response
    async fn request(&mut self, packet: &Packet) -> Result<Packet, Box<dyn std::error::Error>> {
        self.drain_stale_replies();
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;

        let (len, _) = timeout(RESPONSE_TIMEOUT, self.socket.recv_from(&mut self.buffer))
            .await
            .map_err(|_| "server did not answer in time")??;
        Ok(deserialize::<Packet>(&self.buffer[..len])?)
    }
}

fn show_problem(view: &ProblemView) {
    println!();
    println!(
        "[{}/{} answered{}]",
        view.answered_count,
        view.min_questions,
        if view.can_finish { ", /finish available" } else { "" }
    );
    println!("Q: {}", view.problem);
    if view.image.is_some() {
        println!("   (this question has an image attached)");
    }
}

fn show_outcome(outcome: &AnswerOutcome) {
    println!(
        "{}  position {}  score {}",
        if outcome.correct { "Correct!" } else { "Wrong." },
        outcome.position,
        outcome.score
    );
    if !outcome.alive {
        println!("You have been eliminated. Type /finish to record your result.");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut client = QuizClient::new(&args.server).await?;
    info!("Connecting to: {}", args.server);

    let joined = client
        .request(&Packet::Join {
            user_id: args.user_id.clone(),
            name: args.name.clone(),
            difficulty: Some(args.difficulty),
        })
        .await?;
    match joined {
        Packet::Joined { player } => {
            println!("Joined as {} ({} difficulty)", player.name, player.difficulty)
        }
        Packet::Error { message, .. } => return Err(message.into()),
        other => return Err(format!("unexpected response: {:?}", other).into()),
    }

    match client
        .request(&Packet::RequestProblem {
            user_id: args.user_id.clone(),
        })
        .await?
    {
        Packet::Problem(view) => show_problem(&view),
        other => warn!("Unexpected response: {:?}", other),
    }

    println!("Type an answer, /standings to see the leaders, or /finish to stop.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let request = match input {
            "/finish" => Packet::Finish {
                user_id: args.user_id.clone(),
            },
            "/standings" => Packet::RequestStandings,
            answer => Packet::Answer {
                user_id: args.user_id.clone(),
                answer: answer.to_string(),
            },
        };

        match client.request(&request).await {
            Ok(Packet::AnswerResult(outcome)) => {
                show_outcome(&outcome);
                if outcome.alive {
                    show_problem(&ProblemView {
                        problem: outcome.next_problem.clone(),
                        image: outcome.next_image.clone(),
                        can_finish: outcome.can_finish,
                        answered_count: outcome.answered_count,
                        min_questions: outcome.min_questions,
                    });
                }
            }
            Ok(Packet::Finished(summary)) => {
                println!(
                    "Finished: score {}, {} correct, {} wrong in {}s{}",
                    summary.score,
                    summary.correct_count,
                    summary.wrong_count,
                    summary.playtime_seconds,
                    if summary.recorded { "" } else { " (results could not be saved)" }
                );
                break;
            }
            Ok(Packet::Standings { players }) => {
                for (rank, player) in players.iter().enumerate() {
                    println!(
                        "{:>3}. {:<20} position {:>3}  score {:>5}",
                        rank + 1,
                        player.name,
                        player.position,
                        player.score
                    );
                }
            }
            Ok(Packet::Error { message, .. }) => println!("Error: {}", message),
            Ok(other) => warn!("Unexpected response: {:?}", other),
            Err(e) => println!("Request failed: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorKind;

    #[tokio::test]
    async fn test_late_reply_is_not_mistaken_for_the_next_one() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let mut client = QuizClient::new(&server_addr.to_string()).await.unwrap();
        let client_port = client.socket.local_addr().unwrap().port();

        let late = Packet::Error {
            kind: ErrorKind::NoActiveProblem,
            message: "late".to_string(),
        };
        server
            .send_to(&serialize(&late).unwrap(), ("127.0.0.1", client_port))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let responder = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            let (len, from) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(
                deserialize::<Packet>(&buf[..len]).unwrap(),
                Packet::RequestStandings
            );
            let reply = Packet::Standings { players: vec![] };
            server.send_to(&serialize(&reply).unwrap(), from).await.unwrap();
        });

        let response = client.request(&Packet::RequestStandings).await.unwrap();
        assert_eq!(response, Packet::Standings { players: vec![] });
        responder.await.unwrap();
    }
}
