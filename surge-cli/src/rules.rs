//! Rules command - print the effective rule table
//!
//! Resolves the rule set the server would run with (defaults, a rules
//! file, or the `rules` section of a server config) and prints it as JSON.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, ValueEnum};

use surge_core::{Layout, RuleSet};
use surge_server::ServerConfig;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LayoutArg {
    Classic,
    Surge,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Classic => Layout::Classic,
            LayoutArg::Surge => Layout::Surge,
        }
    }
}

#[derive(Args)]
pub struct RulesArgs {
    /// Standalone rule set JSON
    #[arg(long, conflicts_with = "config")]
    pub rules: Option<PathBuf>,

    /// Server configuration JSON; its `rules` section is used
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the starting layout
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Single-line output
    #[arg(long)]
    pub compact: bool,
}

pub fn run(args: RulesArgs) -> Result<()> {
    let rules = resolve_rules(&args)?;
    let json = if args.compact {
        serde_json::to_string(&rules)?
    } else {
        serde_json::to_string_pretty(&rules)?
    };
    println!("{json}");
    Ok(())
}

fn resolve_rules(args: &RulesArgs) -> Result<RuleSet> {
    let mut rules = match (&args.rules, &args.config) {
        (Some(path), _) => RuleSet::load(path)?,
        (None, Some(path)) => server_rules(path)?,
        (None, None) => RuleSet::default(),
    };
    if let Some(layout) = args.layout {
        rules = rules.with_layout(layout.into());
    }
    rules.validate()?;
    Ok(rules)
}

fn server_rules(path: &Path) -> Result<RuleSet> {
    Ok(ServerConfig::load(path)?.rules)
}
