use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cyclecare::api::{ApiClient, TokenSource};
use cyclecare::api::billing::{BillingApi, Invoice, InvoiceQuery};
use cyclecare::api::users::{UpdateProfile, UserProfile};
use cyclecare::auth::provider::{AuthProvider, GoTrueClient};
use cyclecare::auth::reconciler::AuthSnapshot;
use cyclecare::auth::types::{OAuthProvider, SignUpOutcome};
use cyclecare::billing::{Billing, format_amount, format_invoice_date};
use cyclecare::config::{ConfigError, HttpTimeouts, exchange_rate_urls};
use cyclecare::currency::ExchangeRates;
use cyclecare::currency::localizer::CurrencyLocalizer;
use cyclecare::currency::rates::{RatesClient, RatesError, RatesSource};
use cyclecare::state::AppStore;
use cyclecare::storage::{FileStorage, KeyValueStorage, StorageError};
use cyclecare::{ApiError, AuthContext, ClientConfig};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{}", .0.display_message())]
    Api(#[from] ApiError),
    #[error(transparent)]
    Rates(#[from] RatesError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0}")]
    Billing(String),
    #[error("not signed in; run `cyclecare login` first")]
    NotSignedIn,
    #[error("timed out waiting for the session to settle")]
    Timeout,
    #[error("refusing to delete the account without --yes")]
    ConfirmationRequired,
    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Parser, Debug)]
#[command(name = "cyclecare", about = "cyclecare account, billing and pricing CLI")]
struct Cli {
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_PUBLISHABLE_KEY", hide_env_values = true)]
    publishable_key: Option<String>,

    #[arg(long, env = "BACKEND_API_URL")]
    backend_url: Option<String>,

    #[arg(long, env = "CYCLECARE_STORAGE", default_value = ".cyclecare-session.json")]
    storage: PathBuf,

    #[arg(long, env = "CYCLECARE_LOCALE", default_value = "pl")]
    locale: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Format a PLN price for the selected locale.
    Price {
        amount: f64,
        /// Show the base PLN price instead of the converted one.
        #[arg(long)]
        original: bool,
        /// Skip the exchange-rate download.
        #[arg(long)]
        offline: bool,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CYCLECARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CYCLECARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Print the reconciled user and profile.
    Me,
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    Invoices {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        starting_after: Option<String>,
        #[arg(long)]
        ending_before: Option<String>,
    },
    /// Print a customer-portal URL.
    Portal,
    DeleteAccount {
        #[arg(long)]
        yes: bool,
    },
    OauthUrl {
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Price { amount, original, offline } => run_price(&cli, *amount, *original, *offline).await,
        _ => run_account(&cli).await,
    }
}

// =============================================================================
// PRICE
// =============================================================================

async fn run_price(cli: &Cli, amount: f64, original: bool, offline: bool) -> Result<(), CliError> {
    let mut localizer = CurrencyLocalizer::new(cli.locale.clone());
    if !offline {
        let urls = exchange_rate_urls(std::env::var("EXCHANGE_RATE_URLS").ok().as_deref());
        let timeouts = HttpTimeouts::from_lookup(|key| std::env::var(key).ok());
        let rates = RatesClient::new(urls, timeouts)?;
        localizer.load_rates(&rates as &dyn RatesSource).await;
    }
    if original {
        localizer.toggle_price_view();
    }

    println!("{}", localizer.format_price(amount));
    let disclaimer = localizer.disclaimer();
    if !disclaimer.is_empty() {
        println!("{disclaimer}");
    }
    Ok(())
}

// =============================================================================
// ACCOUNT
// =============================================================================

struct Session {
    ctx: AuthContext,
    api: Arc<ApiClient>,
    config: ClientConfig,
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    ClientConfig::from_lookup(|key| match key {
        "SUPABASE_URL" => cli.supabase_url.clone(),
        "SUPABASE_PUBLISHABLE_KEY" => cli.publishable_key.clone(),
        "BACKEND_API_URL" => cli.backend_url.clone(),
        other => std::env::var(other).ok(),
    })
}

async fn open_session(cli: &Cli) -> Result<Session, CliError> {
    let config = load_config(cli)?;
    tracing::debug!(storage = %cli.storage.display(), backend = %config.backend_api_url, "opening session");
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::open(&cli.storage)?);
    let provider = Arc::new(GoTrueClient::new(&config, Arc::clone(&storage))?);
    let api = Arc::new(ApiClient::new(
        &config.backend_api_url,
        Arc::clone(&provider) as Arc<dyn TokenSource>,
        config.timeouts,
    )?);
    let ctx = AuthContext::start(&config, provider as Arc<dyn AuthProvider>, Arc::clone(&api), storage, AppStore::new())
        .await;
    Ok(Session { ctx, api, config })
}

/// Wait until the startup session (and its profile) has been reconciled.
async fn settle(session: &Session) -> Result<AuthSnapshot, CliError> {
    settle_until(session, |s| !s.is_loading && (!s.is_signed_in() || !s.is_user_loading)).await
}

async fn settle_until(session: &Session, done: impl FnMut(&AuthSnapshot) -> bool) -> Result<AuthSnapshot, CliError> {
    let mut rx = session.ctx.watch();
    let wait = rx.wait_for(done);
    match tokio::time::timeout(session.config.timeouts.request() + Duration::from_secs(1), wait).await {
        Ok(Ok(snapshot)) => Ok(snapshot.clone()),
        Ok(Err(_)) | Err(_) => Err(CliError::Timeout),
    }
}

async fn require_user(session: &Session) -> Result<AuthSnapshot, CliError> {
    let snapshot = settle(session).await?;
    if snapshot.is_signed_in() { Ok(snapshot) } else { Err(CliError::NotSignedIn) }
}

async fn run_account(cli: &Cli) -> Result<(), CliError> {
    let session = open_session(cli).await?;
    let result = run_account_command(cli, &session).await;
    session.ctx.shutdown().await;
    result
}

async fn run_account_command(cli: &Cli, session: &Session) -> Result<(), CliError> {
    let ctx = &session.ctx;
    match &cli.command {
        Command::Price { .. } => Ok(()),
        Command::Login { email, password } => {
            let signed_in = ctx.sign_in_with_email(email, password).await?;
            let user_id = signed_in.user.id.clone();
            let snapshot = settle_until(session, |s| {
                s.user.as_ref().is_some_and(|u| u.id == user_id) && !s.is_user_loading
            })
            .await?;
            let name = snapshot.profile.map_or_else(|| signed_in.user.id.clone(), |p| p.display_name());
            println!("signed in as {name}");
            Ok(())
        }
        Command::Signup { email, password } => {
            match ctx.sign_up(email, password).await? {
                SignUpOutcome::SignedIn(s) => println!("signed up and signed in as {}", s.user.id),
                SignUpOutcome::ConfirmationSent(_) => println!("check {email} to confirm your account"),
            }
            Ok(())
        }
        Command::Logout => {
            settle(session).await?;
            ctx.sign_out().await?;
            println!("signed out");
            Ok(())
        }
        Command::Me => {
            let snapshot = require_user(session).await?;
            let initials = snapshot.profile.as_ref().map(UserProfile::initials);
            let avatar_color = snapshot.profile.as_ref().map(UserProfile::avatar_color);
            let rendered = serde_json::json!({
                "user": snapshot.user,
                "profile": snapshot.profile,
                "initials": initials,
                "avatarColor": avatar_color,
            });
            print_json(&rendered)
        }
        Command::Profile { first_name, last_name } => {
            require_user(session).await?;
            let update = UpdateProfile { first_name: first_name.clone(), last_name: last_name.clone() };
            let profile = ctx.update_user_profile(&update).await?;
            print_json(&serde_json::to_value(profile)?)
        }
        Command::ResetPassword { email } => {
            ctx.reset_password_for_email(email).await?;
            println!("password reset email sent to {email}");
            Ok(())
        }
        Command::Invoices { page, limit, starting_after, ending_before } => {
            require_user(session).await?;
            let query = InvoiceQuery {
                page: *page,
                limit: *limit,
                starting_after: starting_after.clone(),
                ending_before: ending_before.clone(),
            };
            run_invoices(cli, session, &query).await
        }
        Command::Portal => {
            require_user(session).await?;
            let billing = Billing::new(Arc::clone(&session.api) as Arc<dyn BillingApi>, ctx.store().clone(), ctx.watch());
            println!("{}", billing.open_payment_portal().await?);
            Ok(())
        }
        Command::DeleteAccount { yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired);
            }
            require_user(session).await?;
            ctx.delete_user_account().await?;
            println!("account deleted");
            Ok(())
        }
        Command::OauthUrl { provider } => {
            let provider: OAuthProvider = provider.parse().map_err(CliError::InvalidArgument)?;
            println!("{}", ctx.sign_in_with_oauth(provider));
            Ok(())
        }
    }
}

async fn run_invoices(cli: &Cli, session: &Session, query: &InvoiceQuery) -> Result<(), CliError> {
    let ctx = &session.ctx;
    let billing = Billing::new(Arc::clone(&session.api) as Arc<dyn BillingApi>, ctx.store().clone(), ctx.watch());
    billing.fetch_invoices(query).await;
    let state = billing.state();
    if let Some(error) = state.error {
        return Err(CliError::Billing(error));
    }

    let rates = fetch_rates_quietly(&session.config).await;
    for invoice in &state.invoices {
        println!("{}", invoice_row(&cli.locale, invoice, rates.as_ref()));
    }
    if let Some(pagination) = state.pagination {
        println!(
            "page {} (limit {}){}",
            pagination.page,
            pagination.limit,
            if pagination.has_next_page { ", more available" } else { "" }
        );
    }
    Ok(())
}

async fn fetch_rates_quietly(config: &ClientConfig) -> Option<ExchangeRates> {
    let client = RatesClient::new(config.exchange_rate_urls.clone(), config.timeouts).ok()?;
    client.fetch_rates().await.ok()
}

fn invoice_row(locale: &str, invoice: &Invoice, rates: Option<&ExchangeRates>) -> String {
    format!(
        "{}\t{}\t{}\t{:?}\t{}",
        invoice.number,
        format_invoice_date(locale, invoice.created),
        format_amount(locale, invoice.amount, rates),
        invoice.status,
        invoice.document_url().unwrap_or("-"),
    )
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
