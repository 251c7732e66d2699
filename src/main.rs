use clap::Parser;

use surf::chrome;
use surf::cli::{self, Cli, QUICKSTART, RequestConfig};
use surf::config::{load_config, resolve_config};
use surf::driver::{self, BrowserOptions};
use surf::error::AppError;
use surf::fetch;
use surf::logging;
use surf::paths::ToolDir;

#[tokio::main]
async fn main() {
    logging::init();

    let argv: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let argv = cli::strip_unknown_flags(&argv);
    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too and are not failures.
            std::process::exit(i32::from(e.use_stderr()));
        }
    };

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut cli::command(), "surf", &mut std::io::stdout());
        return;
    }
    if cli.quickstart {
        print!("{QUICKSTART}");
        return;
    }
    if cli.url().is_none() && !cli.stop {
        eprintln!("{}", cli::command().render_help());
        std::process::exit(1);
    }

    let args = argv.get(1..).unwrap_or_default();
    if let Err(e) = run(&cli, args).await {
        e.print_json_stderr();
        #[allow(clippy::cast_possible_truncation)]
        std::process::exit(e.code as i32);
    }
}

async fn run(cli: &Cli, args: &[String]) -> Result<(), AppError> {
    let tool_dir = ToolDir::resolve()?;

    if cli.stop {
        let id = cli
            .session
            .as_deref()
            .ok_or_else(AppError::stop_requires_session)?;
        driver::stop_session(&tool_dir, id).await?;
        println!("Session '{id}' stopped");
        return Ok(());
    }

    let config = resolve_config(&load_config(cli.config.as_deref(), &tool_dir));
    let request = RequestConfig::from_cli(cli, args, &config)?;

    let executable = match chrome::executable_override(config.executable.as_deref())? {
        Some(path) => path,
        None => chrome::ensure_browser(&tool_dir, config.download_url.as_deref()).await?,
    };
    let browser = BrowserOptions {
        executable,
        profile: request.profile.clone(),
        headful: request.headful,
        window_size: request.window_size,
        stealth: request.stealth,
        startup_timeout: config.startup_timeout,
        command_timeout: config.request_timeout,
    };

    let output = fetch::fetch(&request, &browser, &tool_dir, config.request_timeout).await?;
    println!("{output}");
    Ok(())
}
