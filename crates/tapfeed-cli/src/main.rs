use std::{fs, path::Path, process::ExitCode};

use clap::Parser;
use cli::{Args, Commands};
use logging::setup_logging;
use nu_ansi_term::Color::{Cyan, Green};
use serde_json::Value;
use tapfeed_api::{
    error::ErrorContext, merge_variations, Api, ApiError, FetchContext, SignatureVerifier,
};
use tapfeed_config::{config::config_path, Config};
use tapfeed_utils::{path::resolve_path, system::platform_tag};
use tracing::{debug, info, warn};
use utils::{set_color, Colored};

mod cli;
mod logging;
mod utils;

fn load_config(args: &Args) -> tapfeed_api::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(resolve_path(path)?)?,
        None => Config::new()?,
    };

    if let Some(proxy) = &args.proxy {
        config.proxy = Some(proxy.clone());
    }
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }

    Ok(config)
}

fn create_api(config: &Config, auto_update_command: bool) -> tapfeed_api::Result<Api> {
    let context = FetchContext::detect(config, auto_update_command)?;
    debug!("{:?}", context);
    Api::from_config(config, context)
}

fn read_json(path: &Path) -> tapfeed_api::Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn print_json(value: &Value) -> tapfeed_api::Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_cli(args: Args) -> tapfeed_api::Result<()> {
    if args.no_color {
        set_color(false);
    }

    if let Commands::DefConfig = args.command {
        let path = match &args.config {
            Some(path) => resolve_path(path)?,
            None => config_path(),
        };
        if path.exists() {
            warn!("Config file {} already exists", path.display());
            return Ok(());
        }
        Config::default_config().save(&path)?;
        return Ok(());
    }

    let config = load_config(&args)?;

    match args.command {
        Commands::Fetch {
            endpoint,
            merge,
        } => {
            let api = create_api(&config, false)?;
            let document = api.fetch(&endpoint)?;
            if merge {
                print_json(&merge_variations((*document).clone(), &platform_tag()))?;
            } else {
                print_json(&document)?;
            }
        }
        Commands::FetchFile {
            endpoint,
            target,
            stale_secs,
            auto_update,
        } => {
            let api = create_api(&config, auto_update)?;
            let (document, fresh) =
                api.fetch_json_api_file(&endpoint, target.as_deref(), stale_secs, None)?;
            print_json(&document)?;
            if fresh {
                debug!("{} was refreshed", endpoint);
            } else {
                debug!("{} was served from cache", endpoint);
            }
        }
        Commands::Verify {
            file,
        } => {
            let verifier = SignatureVerifier::from_file(config.get_public_key_path()?)?;
            let envelope = read_json(&file)?;
            let payload = verifier.verify(&envelope).map_err(|failure| {
                ApiError::Integrity {
                    reason: failure.to_string(),
                    url: file.display().to_string(),
                }
            })?;
            print_json(&payload)?;
        }
        Commands::Merge {
            file,
            tag,
        } => {
            let tag = tag.unwrap_or_else(platform_tag);
            print_json(&merge_variations(read_json(&file)?, &tag))?;
        }
        Commands::Names {
            kind,
            auto_update,
        } => {
            let api = create_api(&config, auto_update)?;
            for name in api.download_and_cache_names(kind.into())? {
                info!("{}", name);
            }
        }
        Commands::Origin {
            path,
        } => {
            let api = create_api(&config, false)?;
            match api.source_origin(&path)? {
                Some(origin) => info!("{}", Colored(Green, origin.slug())),
                None => warn!("{} is not inside the API source cache", path.display()),
            }
        }
        Commands::Env => {
            let env = [
                ("TAPFEED_CONFIG", config_path().display().to_string()),
                ("TAPFEED_API_DOMAIN", config.get_api_domain()),
                ("TAPFEED_CACHE", config.get_cache_path()?.display().to_string()),
                (
                    "TAPFEED_PUBLIC_KEY",
                    config.get_public_key_path()?.display().to_string(),
                ),
                (
                    "TAPFEED_API_AUTO_UPDATE_SECS",
                    config.get_api_auto_update_secs()?.to_string(),
                ),
                ("TAPFEED_RETRIES", config.get_retries().to_string()),
            ];
            for (key, value) in env {
                info!("{}={}", Colored(Cyan, key), value);
            }
        }
        Commands::Config => {
            let content = toml::to_string_pretty(&config).map_err(|err| {
                ApiError::Config(tapfeed_config::ConfigError::TomlSerError(err))
            })?;
            info!("{}", content);
        }
        Commands::DefConfig => {}
    }

    Ok(())
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let args = Args::parse();
    setup_logging(&args);

    match handle_cli(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
