mod ui;

use std::{env, fs, path::Path, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use guessme_canvas::RasterSurface;
use guessme_mock::{serve, MockState};
use guessme_network::{ClientIdStore, FileIdStore, HttpPredictor, WsConnector};
use guessme_ops::{init_tracing, EventJournal};
use guessme_session::{
    ranked_predictions, session_error, LiveBoard, SimpleBoard, SimpleGame, StreamingGame,
};
use guessme_types::{
    config::GuessmeConfig,
    events::SessionEventKind,
    geometry::{strokes_from_json, Stroke},
    prediction::DEFAULT_TOP_N,
};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{sleep, timeout, Duration},
};
use tracing::info;

const CONFIG_ENV: &str = "GUESSME_CONFIG";
const CANVAS_SIZE: usize = 280;
const EVENT_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "guessme", version, about = "Draw-and-predict client and mock predictor")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `api.base_url`.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Overrides `stream.url`; a bare host:port is accepted.
    #[arg(long, global = true)]
    ws_url: Option<String>,
    /// Write session events as JSON lines when the command finishes.
    #[arg(long, global = true)]
    journal: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Draw a digit in the terminal and send it to the REST predictor.
    Draw,
    /// Timed round against the streaming predictor.
    Live,
    /// Submit a strokes file to the REST predictor.
    Predict {
        #[arg(long)]
        strokes: PathBuf,
    },
    /// Play a strokes file against the streaming predictor.
    Stream {
        #[arg(long)]
        strokes: PathBuf,
        /// How long to collect live predictions before submitting.
        #[arg(long, default_value_t = 1500)]
        settle_ms: u64,
    },
    /// Run the reference mock predictor.
    MockServer {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    config.apply_env_overrides();
    if let Some(url) = &cli.api_url {
        config.override_api_url(url.as_str());
    }
    if let Some(url) = &cli.ws_url {
        config.override_stream_url(url.as_str());
    }
    config.validate()?;

    let interactive = matches!(cli.command, Command::Draw | Command::Live);
    init_tracing(&config.ops, interactive)?;

    let journal = EventJournal::new();
    match cli.command {
        Command::Draw => run_draw(&config, &journal).await?,
        Command::Live => run_live(&config, &journal).await?,
        Command::Predict { strokes } => run_predict(&config, &journal, &strokes).await?,
        Command::Stream { strokes, settle_ms } => {
            run_stream(&config, &journal, &strokes, settle_ms).await?
        }
        Command::MockServer { bind, port } => run_mock_server(&config, bind, port).await?,
    }

    if let Some(path) = &cli.journal {
        let written = journal.write_jsonl(path).await?;
        eprintln!("Wrote {written} events to {}", path.display());
    }
    Ok(())
}

async fn run_draw(config: &GuessmeConfig, journal: &EventJournal) -> Result<()> {
    let game = Arc::new(SimpleGame::new(HttpPredictor::new(&config.api)?));
    let follower = journal.follow(game.subscribe());
    let mut board = SimpleBoard::new(RasterSurface::new(CANVAS_SIZE, CANVAS_SIZE), game);
    let summary = format!("api {}", config.api.base_url);

    let handle = tokio::runtime::Handle::current();
    tokio::task::block_in_place(|| ui::run_draw(&mut board, &handle, &summary))?;

    drop(board);
    settle(follower).await;
    Ok(())
}

async fn run_live(config: &GuessmeConfig, journal: &EventJournal) -> Result<()> {
    let connector = Arc::new(WsConnector::new(config.stream.url.clone(), identity_store(config)?));
    let game = Arc::new(StreamingGame::new(connector));
    let follower = journal.follow(game.subscribe());
    let mut board = LiveBoard::new(
        RasterSurface::new(CANVAS_SIZE, CANVAS_SIZE),
        game,
        config.timer,
    );
    let summary = format!("ws {}", config.stream.url);

    let result = tokio::task::block_in_place(|| ui::run_live(&mut board, &summary));
    board.shutdown();
    drop(board);
    settle(follower).await;
    result
}

async fn run_predict(config: &GuessmeConfig, journal: &EventJournal, path: &Path) -> Result<()> {
    let strokes = read_strokes(path)?;
    let game = SimpleGame::new(HttpPredictor::new(&config.api)?);
    let follower = journal.follow(game.subscribe());

    for stroke in strokes {
        game.add_stroke(stroke);
    }
    game.submit_drawing().await;
    let snapshot = game.snapshot();
    drop(game);
    settle(follower).await;

    match (snapshot.result, snapshot.error) {
        (Some(prediction), _) => {
            println!(
                "digit {} ({}% confidence, {:?})",
                prediction.digit,
                prediction.confidence,
                prediction.tone()
            );
            Ok(())
        }
        (None, Some(error)) => bail!(session_error(error)),
        (None, None) => bail!(session_error("nothing to submit")),
    }
}

async fn run_stream(
    config: &GuessmeConfig,
    journal: &EventJournal,
    path: &Path,
    settle_ms: u64,
) -> Result<()> {
    let strokes = read_strokes(path)?;
    let connector = Arc::new(WsConnector::new(config.stream.url.clone(), identity_store(config)?));
    let game = StreamingGame::new(connector);
    let follower = journal.follow(game.subscribe());
    let mut events = game.subscribe();

    game.start_game();
    let connected = wait_for(&mut events, |kind| match kind {
        SessionEventKind::Connection { connected } => Some(*connected),
        _ => None,
    })
    .await;
    if connected != Some(true) {
        game.shutdown();
        bail!(session_error(format!(
            "could not connect to {}",
            config.stream.url
        )));
    }
    info!(url = %config.stream.url, strokes = strokes.len(), "streaming strokes");

    for stroke in &strokes {
        game.handle_stroke(stroke);
    }
    sleep(Duration::from_millis(settle_ms)).await;
    for entry in ranked_predictions(&game.predictions(), DEFAULT_TOP_N) {
        let marker = if entry.leader { '*' } else { ' ' };
        println!("{marker} {:<8} {:>3}%", entry.label, entry.confidence);
    }

    game.handle_submit();
    let outcome = wait_for(&mut events, |kind| match kind {
        SessionEventKind::FinalResult(prediction) => Some(prediction.clone()),
        _ => None,
    })
    .await;
    game.shutdown();
    drop(game);
    settle(follower).await;

    match outcome {
        Some(prediction) => {
            println!("final: {} ({}%)", prediction.label, prediction.confidence);
            Ok(())
        }
        None => bail!(session_error("no final result before timeout")),
    }
}

async fn run_mock_server(
    config: &GuessmeConfig,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut mock = config.mock.clone();
    if let Some(bind) = bind {
        mock.bind_addr = bind;
    }
    if let Some(port) = port {
        mock.port = port;
    }
    let addr = mock.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!("Mock predictor on http://{addr} and ws://{addr}");
    serve(listener, MockState::new(&mock)).await?;
    Ok(())
}

async fn wait_for<T, F>(
    events: &mut futures::stream::BoxStream<'static, guessme_types::events::SessionEvent>,
    mut pick: F,
) -> Option<T>
where
    F: FnMut(&SessionEventKind) -> Option<T>,
{
    let search = async {
        while let Some(event) = events.next().await {
            if let Some(found) = pick(&event.kind) {
                return Some(found);
            }
        }
        None
    };
    timeout(EVENT_WAIT, search).await.ok().flatten()
}

/// Give the journal follower a moment to drain once its source is gone.
async fn settle(follower: JoinHandle<()>) {
    let _ = timeout(Duration::from_millis(250), follower).await;
}

fn identity_store(config: &GuessmeConfig) -> Result<Arc<dyn ClientIdStore>> {
    Ok(Arc::new(FileIdStore::from_config(&config.identity)?))
}

fn read_strokes(path: &Path) -> Result<Vec<Stroke>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read strokes from {}", path.display()))?;
    let strokes = strokes_from_json(&raw)
        .with_context(|| format!("invalid strokes file {}", path.display()))?;
    if strokes.is_empty() {
        bail!("{} contains no strokes", path.display());
    }
    Ok(strokes)
}

fn load_config(path: Option<&Path>) -> GuessmeConfig {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    match GuessmeConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                GuessmeConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            GuessmeConfig::default()
        }
    }
}
