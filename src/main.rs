use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use skytravels::application::booking::{NewBooking, PaymentRequest};
use skytravels::application::config::{AuditPolicy, ServiceConfig};
use skytravels::application::{Services, Stores};
use skytravels::domain::booking::{BookingFilter, BookingStatus, PaymentMethod, PaymentStatus};
use skytravels::domain::clock::{Clock, SystemClock};
use skytravels::domain::fare::compute_fare;
use skytravels::domain::money::Money;
use skytravels::domain::package::PackageQuery;
use skytravels::domain::page::PageRequest;
use skytravels::domain::user::{Actor, Role, User};
use skytravels::error::TravelError;
use skytravels::infrastructure::in_memory::{
    InMemoryAuditStore, InMemoryBookingStore, InMemoryPackageStore, InMemoryUserStore,
};
use skytravels::interfaces::csv::package_reader::PackageReader;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "SKYTRAVELS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// How audit entries are written: best-effort, strict or deferred.
    #[arg(long, global = true, env = "SKYTRAVELS_AUDIT_POLICY", default_value_t = AuditPolicy::BestEffort)]
    audit_policy: AuditPolicy,

    /// Log filter directive (e.g. `info`, `skytravels=debug`). Falls back to RUST_LOG.
    #[arg(long, global = true, env = "SKYTRAVELS_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Price a party of travellers without booking anything.
    Fare {
        #[arg(long)]
        adults: u32,
        #[arg(long, default_value_t = 0)]
        children: u32,
        #[arg(long)]
        price: Decimal,
    },
    /// Register a user.
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = Role::User)]
        role: Role,
    },
    /// Import packages from a CSV file.
    Seed {
        input: PathBuf,
        /// Admin performing the import. Defaults to the system identity.
        #[arg(long)]
        admin: Option<Uuid>,
    },
    /// Search the package catalog.
    Packages {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Reserve seats on a package.
    Book {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        package: Uuid,
        #[arg(long)]
        adults: i64,
        #[arg(long, default_value_t = 0)]
        children: i64,
        /// RFC 3339 timestamp or YYYY-MM-DD.
        #[arg(long)]
        travel_date: String,
    },
    /// Simulate a successful payment for a booking.
    Pay {
        #[arg(long)]
        booking: Uuid,
        /// User paying; must own the booking unless they are an admin.
        #[arg(long)]
        user: Uuid,
        /// CC, DC, UPI or NETBANKING.
        #[arg(long)]
        method: PaymentMethod,
        #[arg(long)]
        label: String,
        #[arg(long)]
        make_default: bool,
    },
    /// Admin confirmation of a paid booking.
    Confirm {
        #[arg(long)]
        booking: Uuid,
        #[arg(long)]
        admin: Uuid,
    },
    /// List bookings of a user, or of everyone when the user is an admin and `--all` is set.
    Bookings {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        payment_status: Option<PaymentStatus>,
        #[arg(long)]
        booking_status: Option<BookingStatus>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show the audit trail, newest first.
    Audit {
        #[arg(long)]
        admin: Uuid,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Booking and revenue summary.
    Analytics {
        #[arg(long)]
        admin: Uuid,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

impl PageArgs {
    fn request(&self) -> Result<PageRequest> {
        PageRequest::new(self.page, self.limit).into_diagnostic()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let stores = open_stores(cli.db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = ServiceConfig {
        audit_policy: cli.audit_policy,
    };
    let services = Services::new(stores.clone(), config, clock.clone());

    let command = cli.command;
    let outcome: Result<()> = async {
        match command {
            Command::Fare {
                adults,
                children,
                price,
            } => {
                let price = Money::new(price).into_diagnostic()?;
                let fare = compute_fare(adults.into(), children.into(), price).into_diagnostic()?;
                print_json(&fare)
            }
            Command::AddUser { name, email, role } => {
                let user = User::new(&name, &email, role, clock.now()).into_diagnostic()?;
                let user = stores.users.create(user).await.into_diagnostic()?;
                info!(user_id = %user.id, role = %user.role, "user registered");
                print_json(&user)
            }
            Command::Seed { input, admin } => {
                let actor = match admin {
                    Some(id) => resolve_actor(&stores, id).await?,
                    None => Actor::admin(Uuid::nil()),
                };
                let file = File::open(input).into_diagnostic()?;
                let mut created = Vec::new();
                for (line, draft) in PackageReader::new(file).drafts().enumerate() {
                    let result = match draft {
                        Ok(draft) => services.catalog.create(actor, draft).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(pkg) => created.push(pkg),
                        Err(e) => warn!(row = line + 1, error = %e, "skipping package row"),
                    }
                }
                print_json(&created)
            }
            Command::Packages {
                search,
                min_price,
                max_price,
                page,
            } => {
                let query = PackageQuery {
                    search,
                    min_price: min_price.map(Money::new).transpose().into_diagnostic()?,
                    max_price: max_price.map(Money::new).transpose().into_diagnostic()?,
                };
                let found = services
                    .catalog
                    .search(&query, page.request()?)
                    .await
                    .into_diagnostic()?;
                print_json(&found)
            }
            Command::Book {
                user,
                package,
                adults,
                children,
                travel_date,
            } => {
                let booking = services
                    .bookings
                    .create_booking(NewBooking {
                        user_id: user,
                        package_id: package,
                        adults,
                        children,
                        travel_date,
                    })
                    .await
                    .into_diagnostic()?;
                print_json(&booking)
            }
            Command::Pay {
                booking,
                user,
                method,
                label,
                make_default,
            } => {
                let actor = resolve_actor(&stores, user).await?;
                let request = PaymentRequest {
                    method,
                    label,
                    make_default,
                };
                let paid = services
                    .bookings
                    .simulate_payment(booking, actor, request)
                    .await
                    .into_diagnostic()?;
                print_json(&paid)
            }
            Command::Confirm { booking, admin } => {
                let actor = resolve_actor(&stores, admin).await?;
                let confirmed = services
                    .bookings
                    .confirm_booking(booking, actor)
                    .await
                    .into_diagnostic()?;
                print_json(&confirmed)
            }
            Command::Bookings {
                user,
                all,
                payment_status,
                booking_status,
                page,
            } => {
                let filter = BookingFilter {
                    payment_status,
                    booking_status,
                };
                let found = if all {
                    let actor = resolve_actor(&stores, user).await?;
                    services.bookings.all_bookings(actor, filter, page.request()?).await
                } else {
                    services.bookings.my_bookings(user, filter, page.request()?).await
                };
                print_json(&found.into_diagnostic()?)
            }
            Command::Audit { admin, page } => {
                let actor = resolve_actor(&stores, admin).await?;
                let entries = services
                    .admin
                    .audit_logs(actor, page.request()?)
                    .await
                    .into_diagnostic()?;
                print_json(&entries)
            }
            Command::Analytics { admin } => {
                let actor = resolve_actor(&stores, admin).await?;
                let report = services.admin.analytics(actor).await.into_diagnostic()?;
                print_json(&report)
            }
        }
    }
    .await;

    services.audit.flush().await;
    outcome
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive).into_diagnostic()?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .into_diagnostic()
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if let Some(path) = db_path {
        return open_persistent(path);
    }
    info!("no --db-path given, state lives in memory and is lost on exit");
    Ok(Stores {
        packages: Arc::new(InMemoryPackageStore::new()),
        users: Arc::new(InMemoryUserStore::new()),
        bookings: Arc::new(InMemoryBookingStore::new()),
        audit: Arc::new(InMemoryAuditStore::new()),
    })
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: PathBuf) -> Result<Stores> {
    use skytravels::infrastructure::rocksdb::RocksDBStore;

    let store = RocksDBStore::open(&path).into_diagnostic()?;
    info!(path = %path.display(), "opened RocksDB store");
    Ok(Stores {
        packages: Arc::new(store.clone()),
        users: Arc::new(store.clone()),
        bookings: Arc::new(store.clone()),
        audit: Arc::new(store),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(_path: PathBuf) -> Result<Stores> {
    Err(TravelError::ConfigurationError(
        "--db-path needs a build with the `storage-rocksdb` feature".to_string(),
    ))
    .into_diagnostic()
}

/// The caller's identity and role as recorded in the user store.
async fn resolve_actor(stores: &Stores, user_id: Uuid) -> Result<Actor> {
    let user = stores
        .users
        .find_by_id(user_id)
        .await
        .and_then(|user| user.ok_or(TravelError::NotFoundError("User")))
        .into_diagnostic()?;
    Ok(Actor {
        user_id: user.id,
        role: user.role,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).into_diagnostic()?;
    writeln!(out).into_diagnostic()
}
