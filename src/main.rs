//! Dice Table console simulator
//!
//! Runs one chat table against an in-memory store and a console transport.
//! Commands are read from stdin, one per line.

use clap::Parser;
use dice_table::{
    ChatId, ConfigLoader, ConsoleTransport, DiceConfig, MemoryStore, PlayerId, TableManager,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dice-table")]
#[command(about = "Play dice table rounds from the terminal", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Chat id the simulated table runs in
    #[arg(long, default_value = "-1001")]
    chat: i64,

    /// Use the short test timings
    #[arg(long)]
    fast: bool,

    /// Open a round immediately
    #[arg(long)]
    autostart: bool,
}

const HELP: &str = "\
commands:
  /start | /stop
  /join <player> [name]     register with the default balance
  /balance <player>
  /cancel <player>          withdraw your bets while betting is open
  /bets <player>
  /roster | /balances | /trend | /metrics
  <player> <bet>            e.g. `7 dd 50`, `7 hz 11 20`, `7 2y 10`
  <player> roll <face>      privileged roller submits a die
  /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.fast {
        let config = DiceConfig::fast_testing();
        config.validate()?;
        config
    } else {
        let mut loader = ConfigLoader::new();
        if let Some(ref path) = args.config {
            loader = loader.with_path(path);
        }
        loader.load()?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.monitoring.log_level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        betting_window_secs = config.round.betting_window_secs,
        roll_window_secs = config.round.roll_window_secs,
        default_balance = config.economy.default_balance,
        "Starting dice table simulator"
    );

    let chat = ChatId(args.chat);
    let manager = TableManager::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(ConsoleTransport::new()),
    );

    if args.autostart {
        manager.start_round(chat).await?;
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = handle_command(&manager, chat, line).await {
            println!("❌ {}", e);
        }
    }

    manager.shutdown().await;
    Ok(())
}

fn player_arg(arg: Option<&str>) -> Result<PlayerId, Box<dyn std::error::Error>> {
    let raw = arg.ok_or("missing player id")?;
    Ok(PlayerId(raw.parse()?))
}

async fn handle_command(
    manager: &TableManager,
    chat: ChatId,
    line: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(());
    };
    let unit = manager.config().economy.currency_unit.clone();

    match head {
        "/start" => {
            let issue = manager.start_round(chat).await?;
            println!("▶ table started at {}", issue);
        }
        "/stop" => manager.stop_round(chat).await?,
        "/join" => {
            let player = player_arg(parts.next())?;
            let name = parts.collect::<Vec<_>>().join(" ");
            let name = if name.is_empty() { player.to_string() } else { name };
            let (account, created) = manager.register_player(player, &name).await?;
            if created {
                println!("👋 welcome {}, your balance is {} {}", account.name, account.balance, unit);
            } else {
                println!("{} is already registered", account.name);
            }
        }
        "/balance" => {
            let account = manager.balance(player_arg(parts.next())?).await?;
            println!(
                "💰 {}: {} {} ({} reserved by open bets)",
                account.name, account.balance, unit, account.reserved
            );
        }
        "/cancel" => {
            let refunded = manager.cancel_bets(chat, player_arg(parts.next())?).await?;
            if refunded > 0 {
                println!("✅ bets cancelled, {} {} released", refunded, unit);
            } else {
                println!("no open bets to cancel");
            }
        }
        "/bets" => {
            let bets = manager.player_bets(chat, player_arg(parts.next())?).await?;
            if bets.is_empty() {
                println!("no open bets");
            }
            for bet in bets {
                println!("🎲 {} {} {}", bet.kind, bet.stake, unit);
            }
        }
        "/roster" => {
            for (player, total) in manager.roster(chat).await? {
                println!("{}: {} {}", player, total, unit);
            }
        }
        "/balances" => {
            for account in manager.balances().await? {
                println!("{} ({}): {} {}", account.name, account.player_id, account.balance, unit);
            }
        }
        "/trend" => {
            let board = manager.table(chat).trend().await;
            for row in board.grid() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|c| c.map_or(" .".to_string(), |s| format!("{:>2}", s)))
                    .collect();
                println!("{}", cells.join(" "));
            }
            println!("big {} / small {}", board.big_count(), board.small_count());
        }
        "/metrics" => println!("{}", serde_json::to_string_pretty(&manager.metrics())?),
        _ => {
            let player = player_arg(Some(head))?;
            let rest: Vec<&str> = parts.collect();
            match rest.as_slice() {
                ["roll", face] => {
                    let collected = manager.submit_die_face(chat, player, face.parse()?).await?;
                    println!("🎲 die {} recorded", collected);
                }
                [] => println!("{}", HELP),
                _ => {
                    let bet = manager
                        .submit_bet_text(chat, player, &player.to_string(), &rest.join(" "))
                        .await?;
                    println!("✅ {} {} {} accepted", bet.kind, bet.stake, unit);
                }
            }
        }
    }
    Ok(())
}
