use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sena_geo::config::Config;
use sena_geo::domain::{FileKind, FileUpload, ItineraryForm, RestaurantForm, ReviewForm};
use sena_geo::infra::{AppwriteBackend, InMemoryBackend};
use sena_geo::logging;
use sena_geo::metrics::GatewayMetrics;
use sena_geo::RemoteGateway;

#[derive(Parser)]
#[command(name = "sena_geo")]
#[command(about = "Restaurant discovery and itinerary data gateway")]
#[command(version)]
struct Cli {
    /// Run against a throwaway in-memory backend instead of the configured service
    #[arg(long, global = true)]
    in_memory: bool,

    /// Sign in with this email before running the command
    #[arg(long, global = true)]
    sign_in_email: Option<String>,

    /// Password for --sign-in-email (falls back to SENA_GEO_PASSWORD)
    #[arg(long, global = true)]
    sign_in_password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an account and its user profile
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "client")]
        role: String,
    },
    /// Print the signed-in user's profile, or null
    Whoami,
    /// End the current session
    SignOut,
    /// List or look up restaurants
    Restaurants {
        /// Restaurants created by this user id
        #[arg(long)]
        owner: Option<String>,
        /// Only the first page (10) of --owner's restaurants
        #[arg(long, requires = "owner")]
        first_page: bool,
        /// The most recently created restaurants
        #[arg(long)]
        latest: bool,
        /// Full-text search over names
        #[arg(long)]
        search: Option<String>,
        /// Exact name match, first hit only
        #[arg(long)]
        name: Option<String>,
        /// Single restaurant by id
        #[arg(long)]
        id: Option<String>,
    },
    /// Create a restaurant owned by the signed-in user
    AddRestaurant {
        #[arg(long)]
        name: String,
        #[arg(long)]
        direction: String,
        #[arg(long)]
        menu: String,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Upload a file and print its preview URL
    Upload {
        file: PathBuf,
        /// image, video, audio or document; only images have a preview
        #[arg(long, default_value = "image")]
        kind: FileKind,
    },
    /// Print the preview URL of an already uploaded file
    Preview {
        file_id: String,
        #[arg(long, default_value = "image")]
        kind: FileKind,
    },
    /// Reviews for a restaurant, newest first
    Reviews {
        #[arg(long)]
        restaurant: String,
    },
    /// Review a restaurant as the signed-in user
    AddReview {
        #[arg(long)]
        restaurant: String,
        #[arg(long)]
        place: i32,
        #[arg(long)]
        dish: i32,
        #[arg(long)]
        service: i32,
        #[arg(long)]
        text: String,
        #[arg(long)]
        recommendation: String,
    },
    /// Itineraries of a user, newest first (defaults to the signed-in user)
    Itineraries {
        #[arg(long)]
        user: Option<String>,
    },
    /// Book a visit to a restaurant, looked up by exact name
    AddItinerary {
        #[arg(long)]
        restaurant_name: String,
        #[arg(long)]
        people: String,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        date: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_visit_date(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}'", raw))?;
    let midnight = day.and_hms_opt(0, 0, 0).context("invalid date")?;
    Ok(midnight.and_utc())
}

async fn signed_in_user_id(gateway: &RemoteGateway) -> anyhow::Result<String> {
    let user = gateway
        .get_current_user()
        .await
        .context("not signed in; pass --sign-in-email")?;
    Ok(user.id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    GatewayMetrics::register_metrics();

    let cli = Cli::parse();
    let config = Config::load()?;

    let gateway = if cli.in_memory {
        info!("Using in-memory backend");
        RemoteGateway::from_backend(Arc::new(InMemoryBackend::new(&config)), config.collections.clone())
    } else {
        info!(endpoint = %config.backend.endpoint, "Using remote backend");
        RemoteGateway::from_backend(Arc::new(AppwriteBackend::new(&config)?), config.collections.clone())
    };

    if let Some(email) = &cli.sign_in_email {
        let password = match &cli.sign_in_password {
            Some(p) => p.clone(),
            None => std::env::var("SENA_GEO_PASSWORD")
                .context("--sign-in-email needs --sign-in-password or SENA_GEO_PASSWORD")?,
        };
        gateway.sign_in(email, &password).await?;
    }

    match cli.command {
        Commands::SignUp { email, password, username, role } => {
            let user = gateway.create_user(&email, &password, &username, &role).await?;
            print_json(&user)?;
        }
        Commands::Whoami => {
            print_json(&gateway.get_current_user().await)?;
        }
        Commands::SignOut => {
            gateway.sign_out().await?;
            println!("Signed out");
        }
        Commands::Restaurants { owner, first_page, latest, search, name, id } => {
            if let Some(id) = id {
                print_json(&gateway.get_restaurant_by_id(&id).await?)?;
            } else if let Some(name) = name {
                print_json(&gateway.search_restaurant_by_name(&name).await?)?;
            } else if let Some(query) = search {
                print_json(&gateway.search_restaurants(&query).await?)?;
            } else if let Some(owner) = owner {
                let restaurants = if first_page {
                    gateway.get_all_restaurants(&owner).await?
                } else {
                    gateway.get_restaurants_by_owner(&owner).await?
                };
                print_json(&restaurants)?;
            } else if latest {
                print_json(&gateway.get_latest_restaurants().await?)?;
            } else {
                anyhow::bail!("pick one of --id, --name, --search, --owner or --latest");
            }
        }
        Commands::AddRestaurant { name, direction, menu, kind, image } => {
            let user_id = signed_in_user_id(&gateway).await?;
            let image = image.as_deref().map(FileUpload::from_path).transpose()?;
            let form = RestaurantForm { name, direction, menu, kind, image, user_id };
            print_json(&gateway.create_restaurant(form).await?)?;
        }
        Commands::Upload { file, kind } => {
            let upload = FileUpload::from_path(&file)?;
            print_json(&gateway.upload_file(Some(upload), kind).await?)?;
        }
        Commands::Preview { file_id, kind } => {
            println!("{}", gateway.get_file_preview(&file_id, kind)?);
        }
        Commands::Reviews { restaurant } => {
            print_json(&gateway.get_reviews_by_restaurant_id(&restaurant).await?)?;
        }
        Commands::AddReview { restaurant, place, dish, service, text, recommendation } => {
            let user_id = signed_in_user_id(&gateway).await?;
            let form = ReviewForm {
                rating_place: place,
                rating_dish: dish,
                rating_service: service,
                write_review: text,
                recommendation,
            };
            print_json(&gateway.create_review(form, &restaurant, &user_id).await?)?;
        }
        Commands::Itineraries { user } => {
            let user_id = match user {
                Some(u) => u,
                None => signed_in_user_id(&gateway).await?,
            };
            print_json(&gateway.get_itineraries_by_user_id(&user_id).await?)?;
        }
        Commands::AddItinerary { restaurant_name, people, date } => {
            let user_id = signed_in_user_id(&gateway).await?;
            let restaurant = gateway.search_restaurant_by_name(&restaurant_name).await?;
            let form = ItineraryForm {
                number_of_people: people,
                visit_date: parse_visit_date(&date)?,
            };
            print_json(&gateway.create_itinerary(form, &restaurant.data.restaurant_id, &user_id).await?)?;
        }
    }

    Ok(())
}
