use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tweetmaster::config::Config;
use tweetmaster::credential_store::{
    API_KEY_ENV, Credential, CredentialStore, FileCredentialStore, resolve_credential,
};
use tweetmaster::gemini::GeminiClient;
use tweetmaster::generation_client::{GenerationClient, MockGenerationClient};
use tweetmaster::orchestrator::GenerationResult;
use tweetmaster::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("tweetmaster")
        .about("Generate an illustrated X post from a keyword with Gemini")
        .long_about("tweetmaster writes a short Japanese post about a keyword, turns it into an English visual prompt and renders an image for it")
        .arg(Arg::new("keyword")
            .help("Keyword or theme for the post")
            .num_args(1..))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Store the Gemini API key")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("clear-api-key")
            .long("clear-api-key")
            .help("Remove the stored Gemini API key")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("regenerate-image")
            .long("regenerate-image")
            .help("Generate only an image for an existing post text")
            .value_name("TEXT")
            .num_args(1))
        .arg(Arg::new("no-prompt")
            .long("no-prompt")
            .help("Save the image and print the compose URL instead of showing the menu")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("output-dir")
            .long("output-dir")
            .help("Directory generated images are saved to")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .help("Show pipeline state transitions")
            .action(ArgAction::SetTrue))
        .get_matches();

    let store = FileCredentialStore::open_default()?;

    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        store.set(api_key)?;
        println!("✅ APIキーを保存しました。");
        return Ok(ExitCode::SUCCESS);
    }

    if matches.get_flag("clear-api-key") {
        store.clear()?;
        println!("🗑️  APIキーを削除しました。");
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load()?;
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        config.output_dir = Some(dir.clone());
    }

    let mut credential = resolve_credential(&store, std::env::var(API_KEY_ENV).ok())?;

    if matches.get_flag("config") {
        config.show_config_info(credential.is_some())?;
        return Ok(ExitCode::SUCCESS);
    }

    if config.is_mock_mode() {
        info!("Mock mode enabled, no requests will be sent");
        credential = credential.or_else(|| Credential::new("mock"));
        run(MockGenerationClient::new(), &config, credential, &matches).await
    } else {
        let client = GeminiClient::new(config.api_base.clone());
        run(client, &config, credential, &matches).await
    }
}

async fn run<C: GenerationClient>(
    client: C,
    config: &Config,
    credential: Option<Credential>,
    matches: &ArgMatches,
) -> anyhow::Result<ExitCode> {
    let session = Session::new(client, config, credential, matches.get_flag("verbose"));
    let interactive = !matches.get_flag("no-prompt");

    if let Some(text) = matches.get_one::<String>("regenerate-image") {
        let mut result = GenerationResult::from_text(text.trim());
        return match session.regenerate_image(&mut result).await {
            Ok(true) => finish(&session, result, None, interactive).await,
            Ok(false) => Ok(ExitCode::from(130)),
            Err(_) => Ok(ExitCode::FAILURE),
        };
    }

    let Some(words) = matches.get_many::<String>("keyword") else {
        eprintln!("キーワードが指定されていません。使い方は 'tweetmaster --help' を参照してください。");
        return Ok(ExitCode::FAILURE);
    };
    let keyword = words.map(String::as_str).collect::<Vec<_>>().join(" ");

    info!("Processing keyword: {:?}", keyword);

    // Generation errors have already been rendered by the session's observer.
    match session.generate(&keyword).await {
        Ok(Some(result)) => finish(&session, result, Some(&keyword), interactive).await,
        Ok(None) => Ok(ExitCode::from(130)),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn finish<C: GenerationClient>(
    session: &Session<C>,
    result: GenerationResult,
    keyword: Option<&str>,
    interactive: bool,
) -> anyhow::Result<ExitCode> {
    if interactive {
        session.interact(result, keyword).await?;
    } else {
        session.finish_without_prompt(&result)?;
    }
    Ok(ExitCode::SUCCESS)
}
