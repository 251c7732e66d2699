/// Long-form guide printed by `--quickstart`.
pub const QUICKSTART: &str = "\
surf - rendered web pages for LLMs

Loads a page in headless Chromium, runs its JavaScript, and prints the result
as markdown.

BASIC USAGE
  surf https://example.com          Page as markdown
  surf example.com                  http:// is added when no scheme is given

OUTPUT
  surf https://example.com --raw    Raw HTML instead of markdown
  surf URL --truncate-after 5000    Cap the markdown at 5000 characters

SCREENSHOTS
  surf https://example.com --screenshot page.png
  The whole scrollable page is captured, not only the viewport.

JAVASCRIPT
  surf https://example.com --js \"document.querySelector('button').click()\"
  surf https://example.com --js \"console.log(document.title)\"
  Console output and uncaught exceptions are appended to the result.

FORMS
  surf https://login.example.com \\
      --form login_form \\
      --input username --value myuser \\
      --input password --value mypass

  Each --input must be followed directly by its --value. Load another page
  once the form is submitted:
  surf https://login.example.com \\
      --form login_form \\
      --input email --value me@example.com \\
      --after-submit https://example.com/dashboard

HEADFUL MODE
  surf https://example.com --headful
  surf https://example.com --headful --window-size 1920x1080

PERSISTENT SESSIONS
  surf https://example.com --session myapp          Start a browser, fetch
  surf https://example.com/page2 --session myapp    Same browser and tab
  surf --session myapp --stop                       Shut it down

  Sessions are independent, so several can run side by side:
  surf https://site-a.com --session agent1
  surf https://site-b.com --session agent2

PROFILES
  surf --profile github https://github.com
  Cookies and storage persist in ~/.surf/profiles/<name>/ across calls.

PHOENIX LIVEVIEW
  Detected automatically from [data-phx-session]. surf waits for
  .phx-connected, submits forms with Enter, and tells in-place updates apart
  from navigations.

STEALTH
  surf https://example.com --stealth
  Uses a regular desktop Chrome user agent, hides navigator.webdriver,
  disables the AutomationControlled blink feature, and fills in plugins,
  languages and WebGL vendor strings.

CONFIGURATION
  Defaults can be set in ~/.surf/config.toml (or the file named by --config
  or SURF_CONFIG):

    [browser]
    executable = \"/usr/bin/chromium\"

    [defaults]
    profile = \"work\"
    truncate_after = 20000
    stealth = true

    [timeouts]
    request_secs = 90

  Flags always win over the file.

TIPS FOR AGENTS
  - Output is markdown sized for a context window; use --truncate-after
  - Console logs are appended, which helps when debugging page scripts
  - Combine --js with --screenshot to see the state after an interaction
  - Use --session for multi-step work; it keeps the tab and its state
  - Give parallel agents separate --session ids
  - Errors are one JSON line on stderr: {\"error\": \"...\", \"code\": N}
";
