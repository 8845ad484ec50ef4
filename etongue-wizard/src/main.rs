//! E-tongue analysis wizard (etongue-wizard) - Main entry point
//!
//! Command-line front end for the analysis workflow: fetch the device init
//! script, run a data collection, trigger training and fetch predictions
//! against the analysis backend.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use etongue_common::config::{load_toml_config, resolve_config_path, CompiledDefaults, TomlConfig};
use etongue_common::{EventBus, Profile, WizardEvent};
use etongue_wizard::config::{log_filter, SettingsOverrides};
use etongue_wizard::models::{CollectionForm, FormField, SessionIdentity};
use etongue_wizard::services::WorkflowOrchestrator;
use etongue_wizard::{BackendClient, WizardSettings};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for etongue-wizard
#[derive(Parser, Debug)]
#[command(name = "etongue-wizard")]
#[command(about = "E-tongue analysis wizard")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "ETONGUE_CONFIG")]
    config: Option<PathBuf>,

    /// Analysis backend base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Persisted profile file
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Factory name (overrides the profile for this run)
    #[arg(long, global = true)]
    factory: Option<String>,

    /// Medicine name (overrides the profile for this run)
    #[arg(long, global = true)]
    medicine: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend answers
    Health,
    /// Print the factory_medicine id
    Id,
    /// Fetch the device init script
    Script {
        /// Save the script as `{id}.sh` in this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Submit readings and poll until the backend reports done
    Collect(CollectArgs),
    /// Trigger model training
    Train {
        /// Training data file
        #[arg(long)]
        file: PathBuf,
    },
    /// Enter predict mode and fetch predictions after the delay
    Predict,
    /// Show or update the persisted factory/medicine names
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
}

#[derive(Args, Debug)]
struct CollectArgs {
    #[arg(long, default_value = "0")]
    sweet: String,
    #[arg(long, default_value = "0")]
    salty: String,
    #[arg(long, default_value = "0")]
    bitter: String,
    #[arg(long, default_value = "0")]
    sour: String,
    #[arg(long, default_value = "0")]
    umami: String,
    #[arg(long, default_value = "0")]
    quality: String,
    #[arg(long, default_value = "0")]
    dilution: String,
}

impl CollectArgs {
    fn inputs(&self) -> [(FormField, &str); 7] {
        [
            (FormField::TasteSweet, self.sweet.as_str()),
            (FormField::TasteSalty, self.salty.as_str()),
            (FormField::TasteBitter, self.bitter.as_str()),
            (FormField::TasteSour, self.sour.as_str()),
            (FormField::TasteUmami, self.umami.as_str()),
            (FormField::Quality, self.quality.as_str()),
            (FormField::Dilution, self.dilution.as_str()),
        ]
    }
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// Persist factory and medicine names
    Set {
        #[arg(long)]
        factory: String,
        #[arg(long)]
        medicine: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Start at the compiled default level; switched to the configured level
    // once settings are resolved, unless RUST_LOG is set
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(env_filter.unwrap_or_else(|| {
        EnvFilter::new(log_filter(&CompiledDefaults::for_current_platform().log_level))
    }));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = resolve_config_path(cli.config.as_deref());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::default(),
    };

    let settings = WizardSettings::resolve(
        SettingsOverrides {
            base_url: cli.base_url.clone(),
            profile_path: cli.profile.clone(),
        },
        &toml_config,
    )
    .context("Invalid configuration")?;

    if !filter_from_env {
        filter_handle
            .reload(EnvFilter::new(settings.log_filter()))
            .context("Failed to apply log level")?;
    }
    info!(base_url = %settings.base_url, log_level = %settings.log_level, "Settings resolved");

    let mut profile = Profile::load(&settings.profile_path)
        .with_context(|| format!("Failed to read profile {}", settings.profile_path.display()))?;
    if let Some(factory) = &cli.factory {
        profile.factory_name = factory.clone();
    }
    if let Some(medicine) = &cli.medicine {
        profile.medicine_name = medicine.clone();
    }

    if let Command::Profile { action } = &cli.command {
        return run_profile(action.as_ref(), profile, &settings);
    }

    let client = BackendClient::new(&settings.base_url, settings.timing.request_timeout)
        .context("Failed to create backend client")?;
    let orchestrator = WorkflowOrchestrator::new(
        client.clone(),
        settings.timing.clone(),
        EventBus::new(100),
        SessionIdentity::new(&profile.factory_name, &profile.medicine_name),
    );

    let events = orchestrator.events();
    tokio::spawn(log_events(events));

    let on_signal = orchestrator.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.teardown().await;
    });

    match cli.command {
        Command::Health => {
            let body = client.health().await.context("Backend health check failed")?;
            println!("{}", body);
        }
        Command::Id => match orchestrator.factory_medicine_id().await {
            Some(id) => println!("{}", id),
            None => bail!("Factory and medicine names are required"),
        },
        Command::Script { out } => {
            let script = orchestrator.fetch_init_script().await?;
            println!("{}", script);
            if let Some(dir) = out {
                let path = orchestrator.save_script(&dir).await?;
                info!("Saved init script to {}", path.display());
            }
        }
        Command::Collect(args) => run_collect(&orchestrator, &args).await?,
        Command::Train { file } => {
            let message = orchestrator.start_training(Some(&file)).await?;
            println!("{}", message);
        }
        Command::Predict => {
            let handle = orchestrator.request_prediction().await?;
            info!(
                "Waiting {:?} before fetching predictions",
                orchestrator.timing().prediction_delay
            );
            let session = handle.wait().await?;
            println!("{}", session.message);
            for prediction in &session.predictions {
                println!("{}", prediction.0);
            }
        }
        // Handled before the client is built
        Command::Profile { .. } => {}
    }

    orchestrator.teardown().await;
    Ok(())
}

async fn run_collect(orchestrator: &WorkflowOrchestrator, args: &CollectArgs) -> Result<()> {
    let mut form = CollectionForm::default();
    for (field, input) in args.inputs() {
        form.set_from_input(field, input)
            .with_context(|| format!("Invalid value for {}", field))?;
    }
    orchestrator.set_form(form).await;

    let session_id = orchestrator.submit_collection().await?;
    info!(%session_id, "Collection started, polling until the backend reports done");

    let outcome = orchestrator.wait_for_collection().await?;
    let state = orchestrator.snapshot().await;
    let entries = state
        .collection
        .filter(|session| session.session_id == session_id)
        .map(|session| session.entries)
        .unwrap_or_default();

    for entry in &entries {
        println!("{}", entry.0);
    }
    match outcome {
        Some(outcome) => info!(
            cycles = outcome.cycles(),
            entries = entries.len(),
            "Collection ended: {:?}",
            outcome
        ),
        None => warn!("Collection polling was not running"),
    }
    Ok(())
}

fn run_profile(
    action: Option<&ProfileAction>,
    mut profile: Profile,
    settings: &WizardSettings,
) -> Result<()> {
    if let Some(ProfileAction::Set { factory, medicine }) = action {
        profile = Profile::new(factory.as_str(), medicine.as_str());
        profile
            .save(&settings.profile_path)
            .with_context(|| format!("Failed to write {}", settings.profile_path.display()))?;
        info!("Profile saved to {}", settings.profile_path.display());
    }

    let identity = SessionIdentity::new(&profile.factory_name, &profile.medicine_name);
    println!("factory:  {}", identity.factory_name());
    println!("medicine: {}", identity.medicine_name());
    println!("id:       {}", identity.factory_medicine_id().unwrap_or("-"));
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<WizardEvent>) {
    loop {
        match events.recv().await {
            Ok(WizardEvent::EntriesAppended { added, total, .. }) => {
                info!(added, total, "New entries");
            }
            Ok(WizardEvent::PollCycleFailed { endpoint, error, .. }) => {
                warn!(endpoint = %endpoint, "Poll cycle failed: {}", error);
            }
            Ok(event) => tracing::debug!(?event, "Wizard event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping background work");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping background work");
        },
    }
}
