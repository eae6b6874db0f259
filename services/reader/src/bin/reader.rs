//! services/reader/src/bin/reader.rs

use clap::{Parser, Subcommand, ValueEnum};
use novel_reader_core::domain::{
    coins_for_custom_amount, Credentials, PaymentMethod, PaymentRequest, PurchaseSelection,
};
use reader_lib::{
    adapters::{FileSessionStorage, HttpBackend},
    config::{normalize_base_url, Config},
    error::{AccessError, ReaderError, UnlockError},
    flow::{ClientState, GateState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line reader for the novel platform.
#[derive(Parser, Debug)]
#[command(name = "reader")]
#[command(author, version, about = "Read and unlock novel chapters", long_about = None)]
struct Cli {
    /// Backend base URL (overrides API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Where the session is stored (overrides SESSION_FILE)
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with a username or email
    Login { identifier: String, password: String },
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Whoami,
    /// Show the current coin balance
    Balance,
    /// Open a chapter, optionally unlocking it with coins
    Read {
        chapter_id: i64,
        #[arg(long)]
        unlock: bool,
    },
    /// List the chapters of a story you have unlocked
    Unlocked { story_id: i64 },
    /// List coin packages
    Packages,
    /// Start a coin purchase and print the payment URL
    Buy {
        #[arg(long, conflicts_with = "amount", required_unless_present = "amount")]
        package: Option<i64>,
        #[arg(long)]
        amount: Option<u64>,
        #[arg(long, value_enum, default_value_t = Method::Vnpay)]
        method: Method,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    Vnpay,
    Momo,
    Zalopay,
}

impl From<Method> for PaymentMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Vnpay => PaymentMethod::Vnpay,
            Method::Momo => PaymentMethod::Momo,
            Method::Zalopay => PaymentMethod::ZaloPay,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ReaderError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = normalize_base_url(url)?;
    }
    if let Some(path) = cli.session_file.clone() {
        config.session_file = path;
    }
    let config = Arc::new(config);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.api_base_url);

    // --- 2. Initialize Adapters & Shared State ---
    let backend = Arc::new(HttpBackend::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    let storage = Arc::new(FileSessionStorage::new(config.session_file.clone()));
    info!("Session file at {}", storage.path().display());
    let state = ClientState::new(config.clone(), backend, storage);

    // --- 3. Run the Command ---
    let result = run(cli.command, &state).await;
    state.shutdown().await;
    result
}

async fn run(command: Commands, state: &ClientState) -> Result<(), ReaderError> {
    match command {
        Commands::Login { identifier, password } => {
            let session = state.login(&Credentials::new(identifier, password)).await?;
            println!("Logged in as {} ({})", session.username, session.role.as_str());
            if let Some(coins) = state.balance.displayed() {
                println!("Balance: {coins} coins");
            }
        }
        Commands::Logout => {
            state.logout().await;
            println!("Logged out");
        }
        Commands::Whoami => match state.sessions.get().await {
            Some(session) => println!(
                "{} (id {}, {})",
                session.username,
                session.user_id,
                session.role.as_str()
            ),
            None => println!("Not logged in"),
        },
        Commands::Balance => {
            let session = state
                .sessions
                .get()
                .await
                .ok_or(AccessError::Auth)?;
            let coins = state.balance.fetch_balance(&session).await?;
            println!("{coins} coins");
        }
        Commands::Read { chapter_id, unlock } => read_chapter(state, chapter_id, unlock).await?,
        Commands::Unlocked { story_id } => {
            let session = state.sessions.get().await;
            let ids = state.status.unlocked_in_story(session.as_ref(), story_id).await;
            if ids.is_empty() {
                println!("No unlocked chapters in story {story_id}");
            }
            for id in ids {
                println!("{id}");
            }
        }
        Commands::Packages => {
            for package in state.shop().list_packages().await? {
                println!(
                    "#{} {}: {} coins (+{} bonus) for {} {}",
                    package.id,
                    package.name,
                    package.coins,
                    package.bonus_coins,
                    package.price,
                    package.currency
                );
            }
        }
        Commands::Buy { package, amount, method } => {
            let selection = match (package, amount) {
                (Some(id), _) => PurchaseSelection::Package(id),
                (None, Some(amount)) => {
                    println!("About {} coins", coins_for_custom_amount(amount));
                    PurchaseSelection::CustomAmount(amount)
                }
                (None, None) => {
                    return Err(ReaderError::Internal("choose --package or --amount".to_string()))
                }
            };
            let request = PaymentRequest::new(selection, method.into());
            let session = state.sessions.get().await;
            let url = state.shop().start_purchase(session.as_ref(), &request).await?;
            println!("Complete the payment at: {url}");
        }
    }
    Ok(())
}

async fn read_chapter(state: &ClientState, chapter_id: i64, unlock: bool) -> Result<(), ReaderError> {
    let gate = state.gate();
    let mut current = gate.navigate(chapter_id).await;

    if unlock && matches!(current, GateState::LockedNeedsUnlock { .. }) {
        current = match gate.confirm_unlock().await {
            Ok(next) => next,
            Err(UnlockError::InsufficientFunds) => {
                println!("Not enough coins. Buy more with `reader packages` and `reader buy`.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
    }

    match current {
        GateState::Open(chapter) => {
            println!("Chapter {}: {}\n", chapter.chapter_number, chapter.title);
            println!("{}", chapter.content.unwrap_or_default());
        }
        GateState::LockedNeedsLogin { .. } => println!("This chapter is locked. Log in first."),
        GateState::LockedNeedsUnlock { coins_required, .. } => println!(
            "This chapter costs {coins_required} coins. Run again with --unlock to buy it."
        ),
        GateState::Error { reason, .. } => println!("Could not open the chapter: {reason}"),
        GateState::Unknown | GateState::Checking { .. } => {
            println!("The chapter check did not finish; try again.")
        }
    }
    Ok(())
}
