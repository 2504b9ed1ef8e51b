use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    transport::websocket_url_for, AdvanceOutcome, ChannelNavigator, Collaborators,
    ConnectionCredentials, Destination, HttpSessionApi, QuizResultsController, SystemClock,
    WebSocketConnection,
};
use shared::domain::{QuizDefinition, Role};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Quiz definition (questions and session config) as JSON.
    #[arg(long)]
    quiz: PathBuf,
    /// Join as the session owner instead of as an attendee.
    #[arg(long)]
    owner: bool,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    ws_url: Option<String>,
    #[arg(long)]
    quiz_name: Option<String>,
    #[arg(long)]
    private_key: Option<String>,
    #[arg(long)]
    nickname: Option<String>,
}

enum Input {
    Event(bool),
    Command(Option<String>),
    Navigate(Option<Destination>),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(v) = args.api_url {
        settings.api_url = v;
    }
    if let Some(v) = args.ws_url {
        settings.ws_url = Some(v);
    }
    if let Some(v) = args.quiz_name {
        settings.quiz_name = Some(v);
    }
    if let Some(v) = args.private_key {
        settings.private_key = Some(v);
    }
    if let Some(v) = args.nickname {
        settings.nickname = Some(v);
    }

    let raw = fs::read_to_string(&args.quiz)
        .with_context(|| format!("failed to read quiz file {}", args.quiz.display()))?;
    let mut quiz: QuizDefinition = serde_json::from_str(&raw)
        .with_context(|| format!("invalid quiz file {}", args.quiz.display()))?;
    if let Some(name) = settings.quiz_name.clone() {
        quiz.hashtag = name;
    }
    let role = if args.owner { Role::Owner } else { Role::Attendee };

    let ws_url = match &settings.ws_url {
        Some(ws_url) => Url::parse(ws_url).with_context(|| format!("invalid ws url: {ws_url}"))?,
        None => websocket_url_for(&settings.api_url)?,
    };
    let connection = WebSocketConnection::connect(
        &ws_url,
        ConnectionCredentials {
            private_key: settings.private_key.clone(),
            nickname: settings.nickname.clone(),
        },
    )
    .await?;
    let (navigator, mut navigation) = ChannelNavigator::new();

    let mut controller = QuizResultsController::new(
        quiz,
        role,
        Collaborators {
            connection,
            api: Arc::new(HttpSessionApi::new(settings.api_url.clone())),
            navigator: Arc::new(navigator),
            clock: Arc::new(SystemClock),
        },
    );
    controller.enter().await?;
    watch_countdown(&controller);
    print_summary(&controller);

    let mut commands = spawn_stdin_reader();
    loop {
        let input = tokio::select! {
            alive = controller.process_next() => Input::Event(alive),
            command = commands.recv() => Input::Command(command),
            destination = navigation.recv() => Input::Navigate(destination),
        };

        match input {
            Input::Event(true) => {}
            Input::Event(false) => {
                warn!("session connection closed");
                break;
            }
            Input::Command(None) => break,
            Input::Command(Some(line)) => {
                if !run_command(&mut controller, line.trim()).await {
                    break;
                }
            }
            Input::Navigate(None) => break,
            Input::Navigate(Some(destination)) => {
                println!("navigate: {}", destination.path());
                if destination == Destination::Root {
                    break;
                }
            }
        }
    }

    controller.exit();
    info!("left live results");
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns `false` when the user asked to leave.
async fn run_command(controller: &mut QuizResultsController, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("advance"), _) => match controller.advance().await {
            Ok(AdvanceOutcome::ReadingConfirmationRequested) => {
                println!("reading confirmation requested");
            }
            Ok(AdvanceOutcome::QuestionStarted { question_index }) => {
                println!("question {} started", question_index + 1);
                watch_countdown(controller);
            }
            Err(err) => println!("advance failed: {err:#}"),
        },
        (Some("reset"), _) => {
            if let Err(err) = controller.reset().await {
                println!("reset failed: {err:#}");
            }
        }
        (Some("select"), Some(index)) => match index.parse::<usize>() {
            Ok(index) if index > 0 => match controller.select_question(index - 1) {
                Ok(()) => print_summary(controller),
                Err(err) => println!("{err}"),
            },
            _ => println!("usage: select <question number>"),
        },
        (Some("stats"), _) => print_summary(controller),
        (Some("quit"), _) => return false,
        (None, _) => {}
        _ => println!("commands: advance, reset, select <n>, stats, quit"),
    }
    true
}

fn watch_countdown(controller: &QuizResultsController) {
    if let Some(countdown) = controller.countdown() {
        println!("countdown: {}s", countdown.remaining_time());
        countdown.subscribe(|remaining| println!("countdown: {remaining}s"));
    }
}

fn print_summary(controller: &QuizResultsController) {
    let session = controller.session();
    let index = session.selected_question_index;
    println!(
        "question {}/{} ({} participants)",
        index + 1,
        session.question_count(),
        controller.roster().len()
    );
    println!("answers: {}", controller.answers().join(", "));
    if controller.show_response_progress() {
        let stats = controller.response_stats(Some(index));
        println!("responses: {}/{} ({})", stats.absolute, stats.base, stats.percent);
    }
    if controller.show_confidence_rate(index) {
        let stats = controller.confidence_stats(Some(index));
        println!("confidence: {} from {} answers", stats.percent, stats.absolute);
    }
    if controller.show_reading_confirmation(index) {
        let stats = controller.reading_confirmation_stats(Some(index));
        println!("read: {}/{} ({})", stats.absolute, stats.base, stats.percent);
    }
    if controller.show_start_button() {
        println!("owner: type `advance` to continue");
    }
    if controller.show_leaderboard_button(index) {
        println!("leaderboard available");
    }
}
