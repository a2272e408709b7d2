//! JobSift CLI
//!
//! CLI tool for trying rule sets against job cards outside the browser.

use std::fs;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

use sift_core::memory::{MemoryCard, MemoryPage};
use sift_core::{
    company_alternation, normalize, split_rule_text, CardReader, CardState, FilterEngine, NormalizeMode,
    RawSettings, RuleSet, SessionConfig, SiteProfile,
};

#[derive(Parser)]
#[command(name = "sift-cli")]
#[command(about = "JobSift rule checker and tools")]
struct Cli {
    /// Log level filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a filter pass over cards from a JSON file
    Check {
        /// Site id (linkedin, naukri, indeed, glassdoor, foundit)
        #[arg(short, long)]
        site: String,

        /// Settings snapshot (JSON object keyed by settings key)
        #[arg(long)]
        settings: Option<String>,

        /// Comma-separated blacklisted title keywords, added to the settings
        #[arg(long)]
        blacklist: Option<String>,

        /// Comma-separated whitelisted title keywords, added to the settings
        #[arg(long)]
        whitelist: Option<String>,

        /// Comma-separated blacklisted companies, added to the settings
        #[arg(long)]
        companies: Option<String>,

        /// Cards file (JSON array of {title, company, saved, promoted, dismissed, applied})
        #[arg(short, long)]
        cards: String,

        /// Print shown cards too
        #[arg(short, long)]
        verbose: bool,
    },

    /// Normalize a title the way the matcher sees it
    Normalize {
        /// Keep digits
        #[arg(long)]
        alnum: bool,

        text: String,
    },

    /// List the settings keys a site reads
    Keys {
        #[arg(short, long)]
        site: String,
    },

    /// List built-in site profiles
    Sites,

    /// Print the combined company pattern for a settings snapshot
    Pattern {
        #[arg(short, long)]
        site: String,

        #[arg(long)]
        settings: String,
    },

    /// Validate a session config file and print the resolved values
    Config {
        #[arg(short, long)]
        input: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = &cli.log {
        logger.parse_filters(level);
    }
    logger.init();

    let result = match cli.command {
        Commands::Check {
            site,
            settings,
            blacklist,
            whitelist,
            companies,
            cards,
            verbose,
        } => {
            let overrides = RuleText {
                blacklist,
                whitelist,
                companies,
            };
            cmd_check(&site, settings.as_deref(), &overrides, &cards, verbose)
        }
        Commands::Normalize { alnum, text } => cmd_normalize(&text, alnum),
        Commands::Keys { site } => cmd_keys(&site),
        Commands::Sites => cmd_sites(),
        Commands::Pattern { site, settings } => cmd_pattern(&site, &settings),
        Commands::Config { input } => cmd_config(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// One card as written in a cards file. Absent title or company models a
/// non-job element (ad slot, nudge card).
#[derive(Debug, Deserialize)]
struct CardInput {
    title: Option<String>,
    company: Option<String>,
    #[serde(default)]
    saved: bool,
    #[serde(default)]
    promoted: bool,
    #[serde(default)]
    dismissed: bool,
    #[serde(default)]
    applied: bool,
}

impl From<CardInput> for MemoryCard {
    fn from(input: CardInput) -> Self {
        MemoryCard {
            title: input.title,
            company: input.company,
            state: CardState::from_flags(input.saved, input.promoted, input.dismissed, input.applied),
        }
    }
}

/// Comma-separated rule text from the command line.
#[derive(Debug, Default)]
struct RuleText {
    blacklist: Option<String>,
    whitelist: Option<String>,
    companies: Option<String>,
}

impl RuleText {
    /// Append entries to the site's list settings.
    fn apply(&self, settings: &mut RawSettings, profile: &SiteProfile) -> Result<(), String> {
        let lists = [
            (&self.whitelist, &profile.keys.whitelist, "whitelist"),
            (&self.blacklist, &profile.keys.blacklist, "blacklist"),
            (&self.companies, &profile.keys.companies, "companies"),
        ];
        for (text, key, name) in lists {
            let Some(text) = text else { continue };
            let key = key
                .as_ref()
                .ok_or_else(|| format!("Site '{}' has no {} setting", profile.id, name))?;

            let entry = settings.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = entry else {
                return Err(format!("Setting '{}' is not a list", key));
            };
            items.extend(split_rule_text(text).into_iter().map(Value::String));
        }
        Ok(())
    }
}

fn site_profile(site: &str) -> Result<SiteProfile, String> {
    SiteProfile::builtin(site).ok_or_else(|| {
        format!(
            "Unknown site '{}' (expected one of: {})",
            site,
            SiteProfile::BUILTIN.join(", ")
        )
    })
}

fn read_settings(path: &str) -> Result<RawSettings, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid settings '{}': {}", path, e))
}

fn read_cards(path: &str) -> Result<Vec<MemoryCard>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let cards: Vec<CardInput> =
        serde_json::from_str(&content).map_err(|e| format!("Invalid cards '{}': {}", path, e))?;
    Ok(cards.into_iter().map(MemoryCard::from).collect())
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_check(
    site: &str,
    settings: Option<&str>,
    overrides: &RuleText,
    cards: &str,
    verbose: bool,
) -> Result<(), String> {
    let profile = site_profile(site)?;
    let mut raw = match settings {
        Some(path) => read_settings(path)?,
        None => RawSettings::new(),
    };
    overrides.apply(&mut raw, &profile)?;

    let engine = FilterEngine::new(RuleSet::from_settings(&raw, &profile));
    let page = MemoryPage::new(read_cards(cards)?);
    let summary = engine.run_filter_pass(&page);

    for handle in page.cards() {
        let record = match page.read(&handle) {
            Ok(record) => record,
            Err(e) => {
                if verbose {
                    println!("  [skip] #{}: {}", handle, e);
                }
                continue;
            }
        };
        match engine.evaluate(&record).reason() {
            Some(reason) => println!("  [hide] {} @ {} ({})", record.title, record.company, reason.as_str()),
            None if verbose => println!("  [show] {} @ {}", record.title, record.company),
            None => {}
        }
    }

    let rules = engine.rules();
    println!(
        "Checked {} cards on '{}': {} hidden, {} shown, {} skipped",
        summary.scanned, profile.id, summary.hidden, summary.shown, summary.skipped
    );
    if verbose {
        println!(
            "  Rules:    {} whitelist, {} blacklist, {} companies, hiding [{}]",
            rules.whitelist().len(),
            rules.blacklist().len(),
            rules.companies().len(),
            state_names(rules.hidden_states()).join(", ")
        );
    }

    Ok(())
}

fn cmd_normalize(text: &str, alnum: bool) -> Result<(), String> {
    let mode = if alnum { NormalizeMode::Alnum } else { NormalizeMode::AlphaOnly };
    println!("{}", normalize(text, mode));
    Ok(())
}

fn cmd_keys(site: &str) -> Result<(), String> {
    let profile = site_profile(site)?;
    for key in profile.settings_keys() {
        println!("{key}");
    }
    Ok(())
}

fn cmd_sites() -> Result<(), String> {
    for id in SiteProfile::BUILTIN {
        let profile = site_profile(id)?;
        println!(
            "{:<10} {:<14} mode={:<5} states=[{}]{}",
            profile.id,
            profile.hosts.join(","),
            profile.mode.as_str(),
            state_names(profile.capabilities).join(", "),
            profile
                .path_gate
                .as_deref()
                .map(|gate| format!(" path={gate}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn cmd_pattern(site: &str, settings: &str) -> Result<(), String> {
    let profile = site_profile(site)?;
    let rules = RuleSet::from_settings(&read_settings(settings)?, &profile);
    match company_alternation(rules.companies()) {
        Some(pattern) => println!("{pattern}"),
        None => println!("(no companies)"),
    }
    Ok(())
}

fn cmd_config(input: &str) -> Result<(), String> {
    let content = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let config = SessionConfig::from_json(&content).map_err(|e| e.to_string())?;

    println!("Config '{}' is valid", input);
    println!("  Settle delay:   {}ms", config.settle_delay_ms);
    println!(
        "  Debounce:       {}",
        config
            .debounce()
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "off".to_string())
    );
    println!(
        "  Retry:          {}ms x{} (max {}ms, {} attempts)",
        config.retry.initial_delay_ms,
        config.retry.multiplier,
        config.retry.max_delay_ms,
        config.retry.attempts()
    );
    Ok(())
}

fn state_names(states: CardState) -> Vec<&'static str> {
    states
        .iter_names()
        .map(|(name, _)| match name {
            "SAVED" => "saved",
            "PROMOTED" => "promoted",
            "DISMISSED" => "dismissed",
            "APPLIED" => "applied",
            other => other,
        })
        .collect()
}
