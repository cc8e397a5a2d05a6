use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use dotenvy::dotenv;
use tracing::{error, info};

mod config;
mod llm;
mod options;
mod state;
mod store;
mod studio;
mod utils;

use config::Config;
use llm::{ConsoleCredentialPrompt, GeminiStylist};
use options::{BeardStyle, Hairstyle, StylingOptions};
use store::FileStore;
use studio::{GenerateOutcome, SessionError, Studio};
use utils::logging::init_logging;
use utils::timing::{complete_command_timer, start_command_timer};

type CliStudio = Studio<GeminiStylist, FileStore>;

fn usage() -> &'static str {
    "Usage: ai-barber <command> [options]

Commands:
  options                                   List hairstyles and beard styles
  signin --email <email> [--name <name>]    Sign in and load saved looks
  signout                                   Forget the current user
  whoami                                    Show the current user
  style --image <path> [--hairstyle <h>] [--beard <b>] [--color <hex>] [--out <path>] [--save]
                                            Restyle a portrait
  favorites [--export <dir>]                List or export saved looks
  help                                      Show this message"
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Options,
    SignIn { email: String, name: String },
    SignOut,
    WhoAmI,
    Style(StyleArgs),
    Favorites { export: Option<PathBuf> },
    Help,
}

impl CliCommand {
    fn name(&self) -> &'static str {
        match self {
            CliCommand::Options => "options",
            CliCommand::SignIn { .. } => "signin",
            CliCommand::SignOut => "signout",
            CliCommand::WhoAmI => "whoami",
            CliCommand::Style(_) => "style",
            CliCommand::Favorites { .. } => "favorites",
            CliCommand::Help => "help",
        }
    }
}

#[derive(Debug, PartialEq)]
struct StyleArgs {
    image: PathBuf,
    hairstyle: Option<Hairstyle>,
    beard_style: Option<BeardStyle>,
    color: Option<String>,
    out: Option<PathBuf>,
    save: bool,
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a String> {
    args.get(index)
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_signin_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let mut email: Option<String> = None;
    let mut name = String::new();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--email" => {
                index += 1;
                email = Some(flag_value(args, index, "--email")?.clone());
            }
            "--name" => {
                index += 1;
                name = flag_value(args, index, "--name")?.clone();
            }
            other => {
                return Err(anyhow!("Unknown signin argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let email = email.ok_or_else(|| anyhow!("--email is required"))?;
    Ok(CliCommand::SignIn { email, name })
}

fn parse_style_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let mut image: Option<PathBuf> = None;
    let mut hairstyle = None;
    let mut beard_style = None;
    let mut color = None;
    let mut out = None;
    let mut save = false;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--image" => {
                index += 1;
                image = Some(PathBuf::from(flag_value(args, index, "--image")?));
            }
            "--hairstyle" => {
                index += 1;
                hairstyle = Some(flag_value(args, index, "--hairstyle")?.parse::<Hairstyle>()?);
            }
            "--beard" => {
                index += 1;
                beard_style = Some(flag_value(args, index, "--beard")?.parse::<BeardStyle>()?);
            }
            "--color" => {
                index += 1;
                let value = flag_value(args, index, "--color")?.trim();
                if value.is_empty() {
                    return Err(anyhow!("--color must not be empty"));
                }
                color = Some(value.to_string());
            }
            "--out" => {
                index += 1;
                out = Some(PathBuf::from(flag_value(args, index, "--out")?));
            }
            "--save" => {
                save = true;
            }
            other => {
                return Err(anyhow!("Unknown style argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let image = image.ok_or_else(|| anyhow!("--image is required"))?;
    Ok(CliCommand::Style(StyleArgs {
        image,
        hairstyle,
        beard_style,
        color,
        out,
        save,
    }))
}

fn parse_favorites_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let mut export = None;
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--export" => {
                index += 1;
                export = Some(PathBuf::from(flag_value(args, index, "--export")?));
            }
            other => {
                return Err(anyhow!("Unknown favorites argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }
    Ok(CliCommand::Favorites { export })
}

fn parse_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let rest = args.get(2..).unwrap_or_default();
    match args.get(1).map(|value| value.as_str()) {
        None | Some("help") | Some("--help") | Some("-h") => Ok(CliCommand::Help),
        Some("options") => Ok(CliCommand::Options),
        Some("signin") => parse_signin_args(rest),
        Some("signout") => Ok(CliCommand::SignOut),
        Some("whoami") => Ok(CliCommand::WhoAmI),
        Some("style") => parse_style_args(rest),
        Some("favorites") => parse_favorites_args(rest),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn with_hint(err: SessionError) -> anyhow::Error {
    anyhow!("{err}\n{}", err.recovery_hint())
}

fn build_studio(config: &Config, restore: bool) -> Result<CliStudio, SessionError> {
    let stylist = GeminiStylist::new(config.gemini_settings(), Arc::new(ConsoleCredentialPrompt));
    let store = FileStore::new(config.store_dir.clone());
    if restore {
        Studio::restore(stylist, store, config.studio_settings())
    } else {
        Ok(Studio::new(stylist, store, config.studio_settings()))
    }
}

fn print_options(defaults: &StylingOptions) {
    println!("Hairstyles:");
    for hairstyle in Hairstyle::ALL {
        println!("  {hairstyle}");
    }
    println!("Beard styles:");
    for beard_style in BeardStyle::ALL {
        println!("  {beard_style}");
    }
    println!(
        "Defaults: {} / {} / {}",
        defaults.hairstyle, defaults.beard_style, defaults.color
    );
}

async fn run_style(config: &Config, args: StyleArgs) -> anyhow::Result<()> {
    let mut studio = build_studio(config, true).map_err(with_hint)?;
    studio.upload_image_file(&args.image).map_err(with_hint)?;

    let current = studio.state().options.clone();
    studio.set_options(StylingOptions {
        hairstyle: args.hairstyle.unwrap_or(current.hairstyle),
        beard_style: args.beard_style.unwrap_or(current.beard_style),
        color: args.color.unwrap_or(current.color),
    });

    let outcome = studio.generate().await;
    info!(
        "Generation with {} finished: {:?} (session {:?})",
        studio.service().model(),
        outcome,
        studio.state().phase()
    );
    match outcome {
        GenerateOutcome::Generated => {}
        GenerateOutcome::Failed => {
            let message = studio.state().error.clone().unwrap_or_default();
            return Err(anyhow!(message));
        }
        outcome => return Err(anyhow!("Generation did not complete ({outcome:?})")),
    }

    let out = match args.out {
        Some(path) => path,
        None => {
            let extension = studio
                .state()
                .generated_image
                .as_ref()
                .map(|image| image.extension())
                .unwrap_or("png");
            PathBuf::from(format!(
                "styled-{}.{extension}",
                Utc::now().timestamp_millis()
            ))
        }
    };
    studio.export_generated(&out).await.map_err(with_hint)?;
    println!("Saved styled portrait to {}", out.display());

    if args.save {
        if !studio.state().can_save_favorite() {
            println!("Sign in with `ai-barber signin --email <email>` to save favorites.");
        } else if let Some(look) = studio.save_favorite().map_err(with_hint)? {
            println!("Added look {} to favorites", look.id);
        }
    }
    Ok(())
}

async fn run_favorites(config: &Config, export: Option<PathBuf>) -> anyhow::Result<()> {
    let studio = build_studio(config, true).map_err(with_hint)?;
    let state = studio.state();
    let Some(user) = &state.current_user else {
        println!("Not signed in.");
        return Ok(());
    };

    if state.favorites.is_empty() {
        println!("{} has no saved looks.", user.name);
    }
    for look in &state.favorites {
        let saved_at = chrono::DateTime::from_timestamp_millis(look.created_at)
            .map(|value| value.to_rfc3339())
            .unwrap_or_else(|| look.created_at.to_string());
        println!(
            "{}  {}  {} / {} / {}",
            look.id,
            saved_at,
            look.options.hairstyle,
            look.options.beard_style,
            look.options.color
        );
    }

    if let Some(dir) = export {
        let written = studio.export_favorites(&dir).await.map_err(with_hint)?;
        println!("Exported {} look(s) to {}", written.len(), dir.display());
    }
    Ok(())
}

async fn run_command(config: &Config, command: CliCommand) -> anyhow::Result<()> {
    match command {
        CliCommand::Help => println!("{}", usage()),
        CliCommand::Options => print_options(&config.default_options),
        CliCommand::SignIn { email, name } => {
            let mut studio = build_studio(config, false).map_err(with_hint)?;
            let user = studio.sign_in(&email, &name).map_err(with_hint)?;
            println!(
                "Signed in as {} <{}> with {} saved look(s)",
                user.name,
                user.email,
                studio.state().favorites.len()
            );
        }
        CliCommand::SignOut => {
            let mut studio = build_studio(config, false).map_err(with_hint)?;
            studio.sign_out().map_err(with_hint)?;
            println!("Signed out.");
        }
        CliCommand::WhoAmI => {
            let studio = build_studio(config, true).map_err(with_hint)?;
            match &studio.state().current_user {
                Some(user) => println!(
                    "{} <{}> ({} saved look(s))",
                    user.name,
                    user.email,
                    studio.state().favorites.len()
                ),
                None => println!("Not signed in."),
            }
        }
        CliCommand::Style(args) => run_style(config, args).await?,
        CliCommand::Favorites { export } => run_favorites(config, export).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level, &config.logs_dir);
    config.log_warnings();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;
    let name = command.name();
    info!("Running {} (model {})", name, config.gemini_image_model);

    let mut timer = start_command_timer(name, None);
    let result = run_command(&config, command).await;
    match &result {
        Ok(()) => complete_command_timer(&mut timer, "success", None),
        Err(err) => {
            error!("{} failed: {}", name, err);
            complete_command_timer(&mut timer, "error", Some(err.to_string()));
        }
    }
    result
}
