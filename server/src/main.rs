use clap::Parser;
use log::{error, info, warn};
use server::game::{SessionEngine, SessionRules};
use server::network::Server;
use server::persistence::FileStore;
use server::question_bank;
use server::registry::RejoinPolicy;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Question bank document
    #[arg(short, long, default_value = "questions.json")]
    questions: PathBuf,

    /// Directory holding users.csv and the sessions/ transcripts
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// What to do when a player joins again with a known id
    #[arg(long, value_enum, default_value_t = RejoinPolicy::Reset)]
    rejoin: RejoinPolicy,

    /// Eliminate players after this many wrong answers in a row
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    eliminate_after: Option<u32>,

    /// Seconds between status log lines
    #[arg(long, default_value = "60")]
    status_interval: u64,

    /// Print recorded users and sessions, then exit
    #[arg(long)]
    dashboard: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let store = FileStore::new(&args.data_dir);

    if args.dashboard {
        return print_dashboard(&store);
    }

    let (bank, config) = question_bank::load(&args.questions);
    if bank.is_empty() {
        warn!("Question bank is empty, every join will be refused until it is fixed");
    }

    let rules = SessionRules {
        rejoin: args.rejoin,
        max_consecutive_wrong: args.eliminate_after,
    };
    info!(
        "Rejoin policy: {:?}, elimination: {}",
        rules.rejoin,
        rules
            .max_consecutive_wrong
            .map_or_else(|| "off".to_string(), |n| format!("after {} wrong", n))
    );

    let engine = Arc::new(SessionEngine::new(
        Arc::new(bank),
        config,
        rules,
        Arc::new(store),
    ));

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        engine,
        Duration::from_secs(args.status_interval.max(1)),
    )
    .await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

fn print_dashboard(store: &FileStore) -> Result<(), Box<dyn std::error::Error>> {
    let users = store.load_user_stats()?;
    println!("Users ({}):", users.len());
    for user in &users {
        println!(
            "  {:<16} {:<20} score {:>5}  correct {:>4}  wrong {:>4}  playtime {:>6}s  last played {}",
            user.user_id,
            user.name,
            user.total_score,
            user.correct_answers,
            user.wrong_answers,
            user.playtime,
            user.last_played
        );
    }

    let sessions = store.load_session_transcripts()?;
    println!("Sessions ({}):", sessions.len());
    for session in &sessions {
        println!(
            "  {} {:<16} {:<12} score {:>5}  answered {:>3}/{}  {}",
            session.finished_at.format("%Y-%m-%d %H:%M:%S"),
            session.user_id,
            session.title,
            session.score,
            session.answered_count,
            session.min_questions,
            if session.alive { "" } else { "eliminated" }
        );
    }

    Ok(())
}
