//! Command-line surface: the clap definition and the per-request settings
//! built from it.

mod quickstart;

use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;

use crate::config::ResolvedConfig;
use crate::error::AppError;

pub use quickstart::QUICKSTART;

/// Used when `--window-size` cannot be parsed.
pub const FALLBACK_WINDOW_SIZE: (u32, u32) = (1280, 720);

#[derive(Parser, Debug)]
#[command(
    name = "surf",
    version,
    about = "Portable web scraper for LLMs",
    long_about = "surf loads a page in headless Chromium, lets its JavaScript run, optionally \
        fills a form or runs a script, and prints the rendered page as markdown.",
    after_help = "\
PHOENIX LIVEVIEW:
  LiveView pages are detected automatically. surf waits for .phx-connected,
  submits forms the way LiveView expects, and keeps state between steps.

EXAMPLES:
  surf https://example.com
  surf https://example.com --screenshot page.png --truncate-after 5000
  surf https://example.com --headful --window-size 1920x1080
  surf localhost:4000/login --form login_form \\
      --input email --value test@example.com --input password --value secret
  surf https://example.com --session work
  surf --session work --stop",
    after_long_help = "\
PHOENIX LIVEVIEW:
  LiveView pages are detected automatically. surf waits for .phx-connected,
  submits forms the way LiveView expects, and keeps state between steps.

EXAMPLES:
  surf https://example.com
  surf https://example.com --screenshot page.png --truncate-after 5000
  surf https://example.com --headful --window-size 1920x1080
  surf localhost:4000/login --form login_form \\
      --input email --value test@example.com --input password --value secret
  surf https://example.com --session work
  surf --session work --stop

EXIT CODES:
  0  Success
  1  General error (invalid arguments, failed step)
  2  Connection error (browser unreachable)
  3  Target error (element or tab not found)
  4  Timeout
  5  Protocol error

ENVIRONMENT:
  SURF_HOME         Tool directory (default ~/.surf)
  SURF_CONFIG       Config file path
  SURF_CHROME_PATH  Browser executable to use instead of the downloaded one
  SURF_LOG          Log filter for stderr (default info)"
)]
pub struct Cli {
    /// Page to load. `http://` is added when no scheme is given
    #[arg(value_name = "URL")]
    pub targets: Vec<String>,

    /// Show a detailed usage guide for AI agents
    #[arg(long)]
    pub quickstart: bool,

    /// Print the raw HTML instead of markdown
    #[arg(long)]
    pub raw: bool,

    /// Truncate markdown after this many characters
    #[arg(long, value_name = "N", num_args = 0..=1, allow_hyphen_values = true)]
    pub truncate_after: Option<String>,

    /// Save a full-page PNG screenshot here
    #[arg(long, value_name = "PATH")]
    pub screenshot: Option<PathBuf>,

    /// Id of the form to fill
    #[arg(long, value_name = "ID")]
    pub form: Option<String>,

    /// Name attribute of a field; must be followed by --value
    #[arg(long, value_name = "NAME", num_args = 0..=1, action = ArgAction::Append)]
    pub input: Vec<String>,

    /// Value for the preceding --input
    #[arg(
        long,
        value_name = "VALUE",
        num_args = 0..=1,
        allow_hyphen_values = true,
        action = ArgAction::Append
    )]
    pub value: Vec<String>,

    /// Load this URL after the form is submitted, before capturing
    #[arg(long, value_name = "URL")]
    pub after_submit: Option<String>,

    /// JavaScript to run once the page has loaded
    #[arg(long, value_name = "CODE", allow_hyphen_values = true)]
    pub js: Option<String>,

    /// Named profile for cookies and storage [default: default]
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Browser window size, e.g. 1280x720
    #[arg(long, value_name = "WxH", num_args = 0..=1, allow_hyphen_values = true)]
    pub window_size: Option<String>,

    /// Keep the browser running between calls under this id
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Stop the session named by --session
    #[arg(long)]
    pub stop: bool,

    /// Reduce automation fingerprints
    #[arg(long)]
    pub stealth: bool,

    /// Config file [default: ~/.surf/config.toml]
    #[arg(long, value_name = "PATH", env = crate::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Print a shell completion script
    #[arg(long, value_name = "SHELL", value_enum)]
    pub completions: Option<Shell>,
}

impl Cli {
    /// First positional token. Any others are ignored.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }
}

/// The clap command, for help rendering, completions and man pages.
#[must_use]
pub fn command() -> clap::Command {
    Cli::command()
}

/// Drop `--flags` surf does not define so a stray option never aborts a
/// run. `argv` includes the program name. Values that belong to known flags
/// are kept even when they look like flags themselves.
#[must_use]
pub fn strip_unknown_flags(argv: &[String]) -> Vec<String> {
    let mut cmd = command();
    cmd.build();

    let mut kept = Vec::with_capacity(argv.len());
    let mut tokens = argv.iter();
    if let Some(program) = tokens.next() {
        kept.push(program.clone());
    }
    while let Some(token) = tokens.next() {
        if token == "--" {
            kept.push(token.clone());
            kept.extend(tokens.by_ref().cloned());
            break;
        }
        let Some(flag) = token.strip_prefix("--") else {
            kept.push(token.clone());
            continue;
        };
        let (name, inline_value) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None => (flag, false),
        };
        let Some(arg) = cmd.get_arguments().find(|a| a.get_long() == Some(name)) else {
            tracing::debug!("ignoring unknown flag {token}");
            continue;
        };
        kept.push(token.clone());
        if inline_value || !arg.get_action().takes_values() {
            continue;
        }
        if let Some(next) = tokens.as_slice().first()
            && (arg.is_allow_hyphen_values_set() || !next.starts_with('-'))
        {
            kept.push(next.clone());
            tokens.next();
        }
    }
    kept
}

/// One field to fill: its `name` attribute and the text to type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    pub value: String,
}

/// Everything one fetch needs, with flags layered over the config file.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub url: String,
    pub profile: String,
    pub form_id: Option<String>,
    pub inputs: Vec<FormInput>,
    pub after_submit: Option<String>,
    pub script: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub truncate_after: usize,
    pub raw: bool,
    pub headful: bool,
    pub window_size: Option<(u32, u32)>,
    pub session: Option<String>,
    pub stealth: bool,
}

impl RequestConfig {
    /// `argv` is the raw argument list without the program name; form
    /// fields are paired from it by position.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no URL or a URL does not parse.
    pub fn from_cli(cli: &Cli, argv: &[String], defaults: &ResolvedConfig) -> Result<Self, AppError> {
        let url = cli
            .url()
            .ok_or_else(|| AppError::invalid_url("", "no URL given"))?;
        let url = normalize_url(url)?;
        let after_submit = cli.after_submit.as_deref().map(normalize_url).transpose()?;

        let window_size = cli
            .window_size
            .as_deref()
            .or(defaults.window_size.as_deref())
            .map(parse_window_size);

        Ok(Self {
            url,
            profile: cli
                .profile
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| defaults.profile.clone()),
            form_id: cli.form.clone().filter(|f| !f.is_empty()),
            inputs: pair_inputs(argv),
            after_submit,
            script: cli.js.clone().filter(|s| !s.is_empty()),
            screenshot: cli.screenshot.clone(),
            truncate_after: parse_truncate(cli.truncate_after.as_deref(), defaults.truncate_after),
            raw: cli.raw,
            headful: cli.headful || defaults.headful,
            window_size,
            session: cli.session.clone(),
            stealth: cli.stealth || defaults.stealth,
        })
    }
}

/// Split `--flag=value` so both spellings pair the same way.
fn split_tokens(argv: &[String]) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(argv.len());
    for arg in argv {
        match arg.split_once('=') {
            Some((flag @ ("--input" | "--value"), value)) => {
                tokens.push(flag);
                tokens.push(value);
            }
            _ => tokens.push(arg.as_str()),
        }
    }
    tokens
}

/// Pair each `--input NAME` with a `--value V` that directly follows it.
/// Unpaired names, stray values and empty names are dropped.
#[must_use]
pub fn pair_inputs(argv: &[String]) -> Vec<FormInput> {
    let tokens = split_tokens(argv);
    let mut inputs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "--" => break,
            "--input" => {
                let Some(name) = tokens.get(i + 1).filter(|t| !t.starts_with("--")) else {
                    i += 1;
                    continue;
                };
                if tokens.get(i + 2) != Some(&"--value") {
                    i += 2;
                    continue;
                }
                if let Some(value) = tokens.get(i + 3) {
                    if !name.is_empty() {
                        inputs.push(FormInput {
                            name: (*name).to_string(),
                            value: (*value).to_string(),
                        });
                    }
                    i += 4;
                } else {
                    i += 3;
                }
            }
            // These take hyphenated values, which must not be read as flags.
            "--value" | "--truncate-after" | "--window-size" | "--js" => i += 2,
            _ => i += 1,
        }
    }
    inputs
}

/// Positive integers replace `current`; anything else keeps it.
#[must_use]
pub fn parse_truncate(raw: Option<&str>, current: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(current)
}

/// `WxH` in pixels, or [`FALLBACK_WINDOW_SIZE`].
#[must_use]
pub fn parse_window_size(raw: &str) -> (u32, u32) {
    let Some((w, h)) = raw.split_once('x') else {
        return FALLBACK_WINDOW_SIZE;
    };
    match (w.parse::<u32>(), h.parse::<u32>()) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => FALLBACK_WINDOW_SIZE,
    }
}

/// Prefix `http://` unless the URL already names http or https.
#[must_use]
pub fn ensure_protocol(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

fn normalize_url(raw: &str) -> Result<String, AppError> {
    let url = ensure_protocol(raw);
    match url::Url::parse(&url) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        Ok(_) => Err(AppError::invalid_url(raw, "missing host")),
        Err(e) => Err(AppError::invalid_url(raw, &e.to_string())),
    }
}
