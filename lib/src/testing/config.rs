const DEFAULT_ENABLED: bool = true;
const DEFAULT_VERBOSITY: Verbosity = Verbosity::Summary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Summary,
    Verbose,
}

impl Verbosity {
    pub fn from_str(value: &str) -> Self {
        if value.eq_ignore_ascii_case("quiet") {
            Verbosity::Quiet
        } else if value.eq_ignore_ascii_case("verbose") {
            Verbosity::Verbose
        } else {
            Verbosity::Summary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Summary => "summary",
            Verbosity::Verbose => "verbose",
        }
    }
}

impl core::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TestConfig {
    pub enabled: bool,
    pub verbosity: Verbosity,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            verbosity: DEFAULT_VERBOSITY,
        }
    }
}

/// Build a config from command-line style arguments.
///
/// Recognized tokens: `--quiet`, `--summary`, `--verbose`,
/// `--verbosity=<quiet|summary|verbose>`, `--list` (disables execution).
/// Unknown tokens are ignored.
pub fn config_from_args<'a>(args: impl Iterator<Item = &'a str>) -> TestConfig {
    let mut cfg = TestConfig::default();
    for token in args {
        if token == "--quiet" {
            cfg.verbosity = Verbosity::Quiet;
        } else if token == "--summary" {
            cfg.verbosity = Verbosity::Summary;
        } else if token == "--verbose" {
            cfg.verbosity = Verbosity::Verbose;
        } else if let Some(value) = token.strip_prefix("--verbosity=") {
            cfg.verbosity = Verbosity::from_str(value);
        } else if token == "--list" {
            cfg.enabled = false;
        }
    }
    cfg
}
