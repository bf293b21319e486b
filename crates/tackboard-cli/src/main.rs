//! Tackboard command-line client.
//!
//! Usage:
//!   # Follow a board and log memo changes
//!   tackboard --endpoint 127.0.0.1:5000 watch --subject math --board algebra
//!
//!   # Pin a memo, then exit once the authority echoes it
//!   tackboard --config board.ron post --subject math --board algebra "bring snacks"
//!
//!   # Print grid placements for a viewport, no connection needed
//!   tackboard layout --width 800 --count 7

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use tackboard_client::{
    ClientConfig, CollectionKind, ConnectionEvent, ConnectionStatus, LayoutConfig, MemoDraft,
    PlacementMode, Prompt, Reconciler, ServerEvent, SyncEffect, SyncedBoard, TcpTransport, place,
};
use tackboard_types::{BoardId, Memo, Subject, SubjectId};

/// Real-time client for a shared memo board.
#[derive(Parser, Debug)]
#[command(name = "tackboard")]
#[command(about = "Client for a shared tackboard")]
struct Args {
    /// RON config file; flags below override its values
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Authority address (host:port)
    #[arg(long)]
    endpoint: Option<String>,

    /// Credential offered for an elevated session
    #[arg(long)]
    credential: Option<String>,

    /// Display name for memos and comments
    #[arg(long)]
    name: Option<String>,

    /// Viewport width used for the grid
    #[arg(long)]
    width: Option<f64>,

    /// Placement mode: grid or free-drag
    #[arg(long)]
    placement: Option<PlacementMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a board and log its memos as they change
    Watch {
        /// Subject id or name
        #[arg(long)]
        subject: String,
        /// Board id or name
        #[arg(long)]
        board: String,
    },
    /// Pin a memo on a board
    Post {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        board: String,
        /// Palette color (hex)
        #[arg(long)]
        color: Option<String>,
        text: String,
    },
    /// Print grid placements without connecting
    Layout {
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(credential) = &self.credential {
            config.credential = Some(credential.clone());
        }
        if let Some(name) = &self.name {
            config.user_name = Some(name.clone());
        }
        if let Some(width) = self.width {
            config.viewport_width = width;
        }
        if let Some(placement) = self.placement {
            config.placement = placement;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Layout { width, count } => {
            print_layout(*width, *count);
            Ok(())
        }
        Command::Watch { subject, board } => {
            let config = args.client_config()?;
            run(&config, subject, board, None).await
        }
        Command::Post {
            subject,
            board,
            color,
            text,
        } => {
            let config = args.client_config()?;
            let draft = MemoDraft {
                color: color.clone(),
                ..MemoDraft::text(text.clone())
            };
            run(&config, subject, board, Some(draft)).await
        }
    }
}

fn print_layout(width: f64, count: usize) {
    let config = LayoutConfig::responsive(width);
    println!(
        "{} columns, cell {}x{}, padding {}",
        config.columns_per_row(),
        config.cell_width(),
        config.cell_height(),
        config.padding()
    );
    for index in 0..count {
        let pos = place(index, &config);
        println!("{index:>4}  x={:<8} y={}", pos.x, pos.y);
    }
}

/// Pump the connection until ctrl-c, or until a posted memo is echoed.
async fn run(
    config: &ClientConfig,
    subject: &str,
    board_name: &str,
    mut draft: Option<MemoDraft>,
) -> Result<()> {
    tracing::info!(endpoint = %config.endpoint, "connecting");
    let mut board = SyncedBoard::from_config(TcpTransport::new(), config);
    // Board and content of a posted memo still waiting for its echo.
    let mut awaiting: Option<(BoardId, String)> = None;

    loop {
        let next = tokio::select! {
            next = board.next() => next,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, closing");
                board.close();
                continue;
            }
        };
        let Some((event, effect)) = next else {
            break;
        };

        if let ConnectionEvent::Status(status) = &event {
            match status {
                ConnectionStatus::Exhausted { attempts } => {
                    bail!("gave up on {} after {attempts} attempts", config.endpoint);
                }
                ConnectionStatus::Closed => break,
                status => tracing::info!(?status, "connection"),
            }
            continue;
        }

        select_scope(&mut board, subject, board_name);

        if let Some(memo) = draft.take_if(|_| board.state().current_board().is_some()) {
            let content = memo.content.clone();
            if board.create_memo(memo) {
                awaiting = board
                    .state()
                    .current_board()
                    .map(|b| (b.id.clone(), content));
            }
            continue;
        }

        if let ConnectionEvent::Server(ServerEvent::NewMemo(memo)) = &event {
            if awaiting
                .as_ref()
                .is_some_and(|(board_id, content)| is_echo(memo, board_id, content))
            {
                tracing::info!(id = %memo.id, "memo pinned");
                awaiting = None;
                board.close();
            }
        }

        match effect {
            Some(
                SyncEffect::Snapshot {
                    kind: CollectionKind::Memos,
                    ..
                }
                | SyncEffect::Updated {
                    kind: CollectionKind::Memos,
                }
                | SyncEffect::Removed {
                    kind: CollectionKind::Memos,
                    ..
                },
            ) => log_memos(board.state()),
            Some(SyncEffect::RemoteError(error)) => tracing::warn!(%error, "authority error"),
            _ => {}
        }
    }
    Ok(())
}

/// Move through the scope prompts using the names given on the command line.
fn select_scope(board: &mut SyncedBoard, subject: &str, board_name: &str) {
    let scope = board.state().session().scope();
    if scope.board().is_some() {
        return;
    }
    if scope.subject().is_none() {
        if let Some(id) = find_subject(board.state(), subject) {
            board.choose_subject(&id);
        }
    }
    if board.state().prompt() == Prompt::ChooseBoard {
        if let Some(id) = find_board(board.state(), board_name) {
            // Failures are logged by the board itself.
            let _ = board.choose_board(&id);
        }
    }
}

/// Whether `memo` is the authority's echo of a memo we posted.
fn is_echo(memo: &Memo, board: &BoardId, content: &str) -> bool {
    memo.board_id == *board && memo.content == content
}

fn find_subject(state: &Reconciler, wanted: &str) -> Option<SubjectId> {
    state
        .cache()
        .query::<Subject, _>(|s| s.id.as_str() == wanted || s.name.eq_ignore_ascii_case(wanted))
        .first()
        .map(|s| s.id.clone())
}

fn find_board(state: &Reconciler, wanted: &str) -> Option<BoardId> {
    state
        .board_choices()
        .into_iter()
        .find(|b| b.id.as_str() == wanted || b.name.eq_ignore_ascii_case(wanted))
        .map(|b| b.id.clone())
}

fn log_memos(state: &Reconciler) {
    let Some(current) = state.current_board() else {
        return;
    };
    let memos = state.visible_memos();
    tracing::info!(board = %current.name, memos = memos.len(), users = state.user_count(), "board");
    for memo in memos {
        tracing::info!(
            id = %memo.id.short(),
            by = %memo.display_name(),
            x = memo.x,
            y = memo.y,
            "{}",
            memo.content
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_matches_board_and_content() {
        let board = BoardId::new("b1");
        assert!(is_echo(&Memo::new("m9", "b1", "bring snacks"), &board, "bring snacks"));
        assert!(!is_echo(&Memo::new("m9", "b2", "bring snacks"), &board, "bring snacks"));
        assert!(!is_echo(&Memo::new("m9", "b1", "something else"), &board, "bring snacks"));
    }
}
