//! streakctl - command-line client for streakd
//!
//! Every subcommand sends one request and prints the response payload as
//! JSON; `watch` prints events, one JSON object per line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use streak_api::{Command, DEFAULT_ACTIVITY_LIMIT, EventPayload, StreakKind};
use streak_ipc::{IpcClient, IpcError};
use streak_util::{ActivityId, UserId, default_socket_path, parse_user_ids};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// streakd command-line client
#[derive(Parser, Debug)]
#[command(name = "streakctl")]
#[command(about = "Query streaks and log activities through streakd", long_about = None)]
struct Cli {
    /// Socket path (default: $STREAKD_SOCKET or the per-user runtime socket)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Day streaks for one or more users
    Streak {
        /// Comma-separated user IDs, e.g. 1,2,3
        #[arg(long)]
        users: String,

        /// `current` or `longest`
        #[arg(long, default_value_t = StreakKind::Current)]
        kind: StreakKind,
    },

    /// Log an activity for a user, stamped with the service clock
    Record {
        #[arg(long)]
        user: UserId,

        /// Exercise performed, e.g. push-up
        #[arg(long)]
        kind: String,

        #[arg(long)]
        amount: i64,

        /// Game the activity was earned in
        #[arg(long)]
        game: String,
    },

    /// Logged activities, newest first
    History {
        /// Comma-separated user IDs
        #[arg(long)]
        users: String,

        #[arg(long, default_value_t = DEFAULT_ACTIVITY_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Delete one of a user's activities
    Delete {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        user: UserId,
    },

    /// Summed amounts per exercise kind
    Totals {
        #[arg(long)]
        user: UserId,
    },

    /// Service health
    Health,

    /// Print events until the service shuts down
    Watch,
}

impl Commands {
    /// The request for a one-shot subcommand; `None` for `watch`
    fn into_request(self) -> Result<Option<Command>> {
        let command = match self {
            Commands::Streak { users, kind } => Command::GetStreaks {
                user_ids: user_list(&users)?,
                kind,
            },
            Commands::Record {
                user,
                kind,
                amount,
                game,
            } => Command::RecordActivity {
                user_id: user,
                kind,
                amount,
                game,
            },
            Commands::History {
                users,
                limit,
                offset,
            } => Command::ListActivities {
                user_ids: user_list(&users)?,
                limit,
                offset,
            },
            Commands::Delete { id, user } => Command::DeleteActivity {
                id: ActivityId::new(id),
                user_id: user,
            },
            Commands::Totals { user } => Command::GetTotals { user_id: user },
            Commands::Health => Command::GetHealth,
            Commands::Watch => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn user_list(users: &str) -> Result<Vec<UserId>> {
    parse_user_ids(users).with_context(|| format!("Invalid --users value '{}'", users))
}

async fn watch(client: IpcClient) -> Result<()> {
    let mut events = client.subscribe().await.context("Failed to subscribe to events")?;

    loop {
        let event = match events.next().await {
            Ok(event) => event,
            Err(IpcError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e).context("Failed to read event"),
        };

        println!("{}", serde_json::to_string(&event)?);

        if matches!(event.payload, EventPayload::Shutdown) {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let socket_path = cli.socket.unwrap_or_else(default_socket_path);
    debug!(socket_path = %socket_path.display(), "Connecting to streakd");

    let request = cli.command.into_request()?;

    let mut client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to streakd at {:?}", socket_path))?;

    match request {
        Some(command) => {
            let payload = client.request(command).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        None => watch(client).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["streakctl"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn streak_defaults_to_current() {
        match parse(&["streak", "--users", "1,2"]).into_request().unwrap() {
            Some(Command::GetStreaks { user_ids, kind }) => {
                assert_eq!(user_ids, vec![UserId::new(1), UserId::new(2)]);
                assert_eq!(kind, StreakKind::Current);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn streak_longest() {
        let request = parse(&["streak", "--users", "7", "--kind", "longest"]).into_request().unwrap();
        assert!(matches!(request, Some(Command::GetStreaks { kind: StreakKind::Longest, .. })));
    }

    #[test]
    fn bad_user_list_rejected() {
        assert!(parse(&["streak", "--users", "1,x"]).into_request().is_err());
        assert!(parse(&["history", "--users", ""]).into_request().is_err());
    }

    #[test]
    fn history_paging_defaults() {
        let request = parse(&["history", "--users", "1"]).into_request().unwrap();
        assert!(matches!(
            request,
            Some(Command::ListActivities { limit: DEFAULT_ACTIVITY_LIMIT, offset: 0, .. })
        ));
    }

    #[test]
    fn record_and_delete() {
        let request = parse(&[
            "record", "--user", "3", "--kind", "push-up", "--amount", "20", "--game", "overwatch",
        ])
        .into_request()
        .unwrap();
        assert!(matches!(request, Some(Command::RecordActivity { amount: 20, .. })));

        let request = parse(&["delete", "--id", "9", "--user", "3"]).into_request().unwrap();
        assert!(matches!(request, Some(Command::DeleteActivity { .. })));
    }

    #[test]
    fn watch_has_no_request() {
        assert!(parse(&["watch"]).into_request().unwrap().is_none());
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["streakctl", "streak", "--users", "1", "--kind", "best"]).is_err());
    }
}
