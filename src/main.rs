use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use form_autofill::targets::{self, TargetDraft};
use form_autofill::{ConfigStore, Profile, TargetRecord};
use tracing_subscriber::EnvFilter;

/// Manage the profile and the list of forms the autofill agent works on.
#[derive(Parser)]
#[command(name = "form-autofill", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show, set or clear the name written into forms.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Edit the ordered list of target forms.
    #[command(subcommand)]
    Target(TargetCommand),
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Set { name: String },
    Clear,
}

#[derive(Subcommand)]
enum TargetCommand {
    List,
    Add(DraftArgs),
    Edit {
        id: String,
        #[command(flatten)]
        draft: DraftArgs,
    },
    Remove {
        id: String,
    },
    /// Move the entry at FROM so it ends up at TO (0-based).
    Move {
        from: usize,
        to: usize,
    },
}

#[derive(Args)]
struct DraftArgs {
    /// Form URL, or any substring of it to match on.
    #[arg(long)]
    url: String,
    #[arg(long)]
    label: String,
    /// Which free-text field (0-based) receives the name.
    #[arg(long, default_value_t = 0)]
    field: usize,
    /// Leave the "record email address" checkbox alone.
    #[arg(long)]
    no_email_toggle: bool,
}

impl From<DraftArgs> for TargetDraft {
    fn from(args: DraftArgs) -> Self {
        TargetDraft {
            url: args.url,
            label: args.label,
            field_position: args.field,
            record_email_toggle: !args.no_email_toggle,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = ConfigStore::from_env().context("locating config file")?;

    match cli.command {
        Command::Profile(cmd) => run_profile(&store, cmd).await,
        Command::Target(cmd) => run_target(&store, cmd).await,
    }
}

async fn run_profile(store: &ConfigStore, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Show => match store.load().await.context("reading config")?.profile {
            Some(profile) => println!("{}", profile.name),
            None => println!("(no profile)"),
        },
        ProfileCommand::Set { name } => {
            store
                .set_profile(Profile {
                    name: name.trim().to_string(),
                })
                .await
                .context("saving profile")?;
            println!("Profile saved.");
        }
        ProfileCommand::Clear => {
            store.clear_profile().await.context("clearing profile")?;
            println!("Profile cleared.");
        }
    }
    Ok(())
}

async fn run_target(store: &ConfigStore, cmd: TargetCommand) -> Result<()> {
    let mut list = store.load().await.context("reading config")?.targets;

    match cmd {
        TargetCommand::List => {
            if list.is_empty() {
                println!("(no targets) config: {}", store.path().display());
            }
            for (index, target) in list.iter().enumerate() {
                print_target(index, target);
            }
            return Ok(());
        }
        TargetCommand::Add(args) => {
            let record = targets::add(&mut list, args.into())?;
            println!("Added {} ({})", record.display_label, record.id);
        }
        TargetCommand::Edit { id, draft } => {
            targets::edit(&mut list, &id, draft.into())?;
            println!("Updated {id}");
        }
        TargetCommand::Remove { id } => {
            let removed = targets::remove(&mut list, &id)?;
            println!("Removed {}", removed.display_label);
        }
        TargetCommand::Move { from, to } => {
            targets::reorder(&mut list, from, to)?;
        }
    }

    store.set_targets(list).await.context("saving targets")?;
    Ok(())
}

fn print_target(index: usize, target: &TargetRecord) {
    println!(
        "{index:>2}. {label}  key={key}  field={field}  email-toggle={toggle}  id={id}",
        label = target.display_label,
        key = target.match_key,
        field = target.field_position,
        toggle = if target.record_email_toggle { "on" } else { "off" },
        id = target.id,
    );
}
