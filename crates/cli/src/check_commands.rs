use std::path::Path;

use anyhow::Result;

use logrelay_config::{
    Credentials, Diagnostic, Severity, ValidationResult, load_channel_map, load_settings,
    validate_channels, validate_settings,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load everything `run` would load, report problems and list the tracked
/// identities. Any load failure is returned and ends the process non-zero.
pub fn check(
    channels_path: &Path,
    settings_path: Option<&Path>,
    credentials: Option<&Credentials>,
    verbose: bool,
) -> Result<()> {
    match settings_path {
        Some(path) => eprintln!("Checking {}", path.display()),
        None => eprintln!("No settings file given; checking defaults."),
    }
    let settings = load_settings(settings_path)?;

    eprintln!("Checking {}\n", channels_path.display());
    let channels = load_channel_map(channels_path)?;

    let mut result = validate_settings(&settings);
    result
        .diagnostics
        .extend(validate_channels(&channels).diagnostics);
    print_diagnostics(&result, verbose);

    match credentials {
        Some(credentials) => eprintln!("Credentials: {credentials:?}"),
        None => eprintln!(
            "{BOLD}{YELLOW}warning{RESET} credentials are not set; `run` will refuse to start"
        ),
    }

    eprintln!("\nTracking {} identities:", channels.len());
    for (identity, destination) in channels.iter() {
        println!("  {identity} -> #{destination}");
    }

    Ok(())
}

fn print_diagnostics(result: &ValidationResult, verbose: bool) {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        eprintln!("  {}", render(d));
        shown += 1;
    }

    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}

fn render(d: &Diagnostic) -> String {
    let color = match d.severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    };
    if d.path.is_empty() {
        format!("{BOLD}{color}{}{RESET} {}", d.severity, d.message)
    } else {
        format!("{BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_files_pass() {
        let channels = write_temp(r#"{"123": "alice"}"#);
        let settings = write_temp("[timing]\npoll_interval_secs = 5\n");
        check(channels.path(), Some(settings.path()), None, true).unwrap();
    }

    #[test]
    fn missing_channel_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&dir.path().join("channels.json"), None, None, false).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{err}");
    }

    #[test]
    fn invalid_settings_fail() {
        let channels = write_temp(r#"{"123": "alice"}"#);
        let settings = write_temp("[timing]\npoll_interval_secs = 0\n");
        assert!(check(channels.path(), Some(settings.path()), None, false).is_err());
    }

    #[test]
    fn render_includes_path() {
        let d = Diagnostic {
            severity: Severity::Warning,
            path: "channels.123".into(),
            message: "looks odd".into(),
        };
        let line = render(&d);
        assert!(line.contains("warning"));
        assert!(line.contains("channels.123: looks odd"));
    }
}
