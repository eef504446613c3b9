//!
//! stayflow CLI
//! ------------
//! Terminal front-end for the booking client. The credential is kept under the
//! state directory, so consecutive invocations share one session the way page
//! reloads do in a browser.

use std::env;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stayflow::api::operations::PropertiesVariables;
use stayflow::booking::{PaymentHandle, TxStatus};
use stayflow::identity::{LoginRequest, RegisterRequest, Role};
use stayflow::navigation::{Navigation, Navigator};
use stayflow::{AppError, AppState, ClientConfig};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--endpoint <url>] [--state-dir <dir>] <command> [args]\n\nCommands:\n  login <email> <password>                 sign in\n  google <id-token>                        sign in with a Google identity token\n  register <name> <email> <password> [phone]\n  verify-email <code>                      confirm the emailed one-time code\n  resend <email>                           send a new verification code\n  forgot <email>                           request a password reset link\n  reset <token> <password> <confirm>       set a new password from a reset link\n  whoami                                   show the signed-in user\n  logout                                   end the session\n  properties [--location <l>] [--max-price <n>]\n  property <id>\n  book <property-id> <check-in> <check-out>   dates as YYYY-MM-DD; prints the checkout URL\n  verify <return-url | reference>          reconcile a payment after the gateway redirect\n  bookings                                 your bookings and their payment status\n  listings                                 properties you manage\n  guard [traveler|manager|admin]           show the access decision for a protected view\n\nEnvironment:\n  STAYFLOW_GRAPHQL_URL, STAYFLOW_STATE_DIR, STAYFLOW_HTTP_TIMEOUT_MS, STAYFLOW_DASHBOARD_DELAY_MS,\n  STAYFLOW_RESET_REDIRECT_DELAY_MS, STAYFLOW_NOTICE_TTL_MS, STAYFLOW_NOTICE_CAPACITY, RUST_LOG"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("stayflow");

    let mut config = ClientConfig::from_env();
    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--endpoint" => { i += 1; if let Some(v) = args.get(i) { config = config.with_endpoint(v.clone()); } }
            "--state-dir" => { i += 1; if let Some(v) = args.get(i) { config = config.with_state_dir(v.clone()); } }
            "-h" | "--help" => { print_usage(program); return Ok(()); }
            _ => break,
        }
        i += 1;
    }
    let Some(command) = args.get(i).cloned() else {
        print_usage(program);
        return Err(anyhow!("missing command"));
    };
    let rest: Vec<String> = args[i + 1..].to_vec();

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "stayflow",
        "stayflow starting: RUST_LOG='{}', endpoint='{}', state_dir='{}'",
        rust_log, config.endpoint, config.state_dir.display()
    );

    let (navigator, mut nav_rx) = Navigator::channel();
    let state = AppState::with_file_credentials(config, navigator)?;
    state.auth.initialize().await;

    let outcome = run(&state, &command, &rest).await;
    flush(&state, &mut nav_rx);
    match outcome {
        Ok(()) => Ok(()),
        Err(Usage) => {
            print_usage(program);
            Err(anyhow!("invalid arguments for '{command}'"))
        }
        Err(Failed(e)) => Err(anyhow!(e.user_facing())),
    }
}

enum CliError {
    Usage,
    Failed(AppError),
}
use CliError::{Failed, Usage};

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self { Failed(e) }
}

fn arg(rest: &[String], idx: usize) -> Result<&str, CliError> { rest.get(idx).map(String::as_str).ok_or(Usage) }

async fn run(state: &AppState, command: &str, rest: &[String]) -> Result<(), CliError> {
    match command {
        "login" => {
            let req = LoginRequest { email: arg(rest, 0)?.to_string(), password: arg(rest, 1)?.to_string() };
            let out = state.auth.login(&req).await?;
            println!("Signed in as {} <{}> ({})", out.identity.display_name, out.identity.email, out.identity.role);
        }
        "google" => {
            let out = state.auth.login_with_google(arg(rest, 0)?).await?;
            println!("Signed in as {} <{}> ({})", out.identity.display_name, out.identity.email, out.identity.role);
        }
        "register" => {
            let req = RegisterRequest {
                name: arg(rest, 0)?.to_string(),
                email: arg(rest, 1)?.to_string(),
                password: arg(rest, 2)?.to_string(),
                phone: rest.get(3).cloned(),
            };
            let out = state.auth.register(&req).await?;
            println!("{}", out.message.unwrap_or_else(|| "Account created. Check your email for a verification code.".into()));
        }
        "verify-email" => {
            let out = state.auth.verify_email(arg(rest, 0)?).await?;
            println!("{}", out.message.unwrap_or_else(|| "Email verified.".into()));
        }
        "resend" => println!("{}", state.auth.resend_verification(arg(rest, 0)?).await?),
        "forgot" => println!("{}", state.auth.forgot_password(arg(rest, 0)?).await?),
        "reset" => {
            let out = state.auth.reset_password(Some(arg(rest, 0)?), arg(rest, 1)?, arg(rest, 2)?).await?;
            println!("{}", out.message.unwrap_or_default());
        }
        "whoami" => match state.session.get().identity() {
            Some(id) => println!(
                "{} <{}> role={} verified={}",
                id.display_name, id.email, id.role, id.email_verified
            ),
            None => println!("Not signed in"),
        },
        "logout" => state.auth.logout(),
        "properties" => {
            let mut filter = PropertiesVariables::default();
            let mut j = 0usize;
            while j < rest.len() {
                match rest[j].as_str() {
                    "--location" => { j += 1; filter.location = Some(arg(rest, j)?.to_string()); }
                    "--max-price" => { j += 1; filter.max_price = Some(arg(rest, j)?.parse().map_err(|_| Usage)?); }
                    _ => return Err(Usage),
                }
                j += 1;
            }
            for p in state.catalog.properties(&filter).await? {
                let rating = p.average_rating().map(|r| format!("{r:.1}")).unwrap_or_else(|| "-".into());
                println!("{}\t{}\t{}\t{}/night\trating {}", p.id, p.name, p.location, p.price_per_night, rating);
            }
        }
        "property" => {
            let p = state.catalog.property(arg(rest, 0)?).await?;
            println!("{} ({})\n{}/night\n{}", p.name, p.location, p.price_per_night, p.description.unwrap_or_default());
        }
        "book" => {
            let check_in = parse_date(arg(rest, 1)?)?;
            let check_out = parse_date(arg(rest, 2)?)?;
            let mut tx = state.bookings.create_booking(arg(rest, 0)?, check_in, check_out).await?;
            println!("Booking {} created: {} nights, total {}", tx.booking_id(), tx.stay().nights(), tx.total_price());
            let nav = state.bookings.initialize_payment(&mut tx).await?;
            println!(
                "Payment reference {}\nComplete payment at: {}",
                tx.payment_reference().unwrap_or("-"),
                nav.target()
            );
        }
        "verify" => {
            let input = arg(rest, 0)?;
            let outcome = if input.contains('?') {
                state.bookings.resume_from_redirect(input).await?
            } else {
                state.bookings.verify_payment(&PaymentHandle::new(input)?).await?
            };
            println!("{} [{}]", outcome.message, outcome.status);
            if let Some(b) = &outcome.booking {
                println!("Booking {}: status={} total={}", b.id, b.status, b.total_price);
            }
            if outcome.status == TxStatus::Confirmed {
                if let Some(delay) = outcome.redirect_after {
                    // let the scheduled dashboard redirect fire before exiting
                    tokio::time::sleep(delay).await;
                }
            }
        }
        "bookings" => {
            for b in state.catalog.my_bookings().await? {
                println!(
                    "{}\t{}\t{} -> {}\t{}\t{}\tpayment={} ref={}",
                    b.id,
                    b.property.as_ref().map(|p| p.name.as_str()).unwrap_or("-"),
                    b.check_in,
                    b.check_out,
                    b.total_price,
                    b.status,
                    b.payment_status.as_deref().unwrap_or("-"),
                    b.payment_reference.as_deref().unwrap_or("-"),
                );
            }
        }
        "listings" => {
            for p in state.catalog.my_properties().await? {
                println!("{}\t{}\t{}\t{}/night\tbookings={}", p.id, p.name, p.location, p.price_per_night, p.bookings.len());
            }
        }
        "guard" => {
            let required = rest.first().map(|r| r.parse::<Role>()).transpose()?;
            println!("{:?}", state.guard(required).decision());
        }
        _ => return Err(Usage),
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Failed(AppError::validation("invalid_date", format!("'{s}' is not a date (YYYY-MM-DD)"))))
}

fn flush(state: &AppState, nav_rx: &mut UnboundedReceiver<Navigation>) {
    for n in state.notices.drain() {
        println!("[{:?}] {}", n.level, n.message);
    }
    while let Ok(nav) = nav_rx.try_recv() {
        match nav {
            Navigation::Route(path) => println!("-> {path}"),
            Navigation::External(url) => println!("-> open {url}"),
        }
    }
}
