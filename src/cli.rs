use clap::builder::RangedU64ValueParser;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "podcaster",
    version,
    about = "Browse a podcast episode API and play episodes from a shared queue"
)]
pub struct Cli {
    /// Base URL of the episode API (overrides config and PODCASTER_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Serve cached episodes only, never contact the API
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the latest episodes
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one episode
    Show { id: String },
    /// Play a single episode
    Play {
        id: String,
        /// Print the now playing state without starting the player
        #[arg(long)]
        no_launch: bool,
    },
    /// Play the latest episodes as a queue
    Queue {
        /// 1-based position in the listing to start from
        #[arg(long, default_value_t = 1, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        start: usize,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        no_launch: bool,
    },
    /// Prefetch the newest episodes into the cache
    Warm {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage the local episode cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    Tui,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Clear,
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn queue_start_defaults_to_the_first_episode() {
        let cli = Cli::try_parse_from(["podcaster", "queue"]).expect("queue parses");
        match cli.command {
            Some(Command::Queue { start, .. }) => assert_eq!(start, 1),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn queue_start_rejects_zero() {
        let err = Cli::try_parse_from(["podcaster", "queue", "--start", "0"])
            .expect_err("positions are 1-based");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["podcaster", "list", "--offline", "-vv"])
            .expect("global flags parse");
        assert!(cli.offline);
        assert_eq!(cli.verbose, 2);
    }
}
