use anyhow::{anyhow, bail, Context, Result};
use loadsmith::{
    activation,
    config::{self, AppConfig, GameConfig},
    conflicts::{ConflictIndex, ConflictSide},
    game::GameFamily,
    graph::Direction,
    session::{NoticeLevel, Session, SessionOptions},
    store::JsonFileStore,
    violations, Entry, ModEntry,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use time::{macros::format_description, OffsetDateTime};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose(u8),
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    profile: Option<u64>,
    game: Option<GameFamily>,
    verbosity: Verbosity,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Order,
    DepsCheck,
    DepsClosure { id: String, dependents: bool },
    DepsRequiredBy(String),
    Reset,
    Move {
        active: String,
        over: String,
        select: Vec<String>,
    },
    Priority { id: String, priority: usize },
    Send { id: String, separator: String },
    Enable(String),
    Disable(String),
    ToggleAll,
    SeparatorAdd(String),
    SeparatorRemove(String),
    SeparatorToggle(String),
    SeparatorCollapse(String),
    SeparatorEdit {
        id: String,
        title: String,
        background: String,
        text: String,
    },
    Meta {
        id: String,
        title: Option<String>,
        categories: Option<String>,
    },
    Categories {
        select: Vec<String>,
        add: String,
        remove: String,
    },
    Conflicts(String),
    Paths,
    Help,
    Version,
}

#[derive(Debug)]
pub struct Invocation {
    command: CliCommand,
    global: GlobalOptions,
}

impl Invocation {
    pub fn verbosity(&self) -> Verbosity {
        self.global.verbosity
    }
}

pub fn parse(args: &[String]) -> Result<Invocation> {
    let (global, tokens) = parse_global_options(args)?;
    let command = parse_command(&tokens)?;
    Ok(Invocation { command, global })
}

pub fn run(invocation: Invocation) -> Result<()> {
    let Invocation { command, global } = invocation;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("loadsmith v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Paths => {
            let config = load_game_config(&global)?;
            list_paths(&config, global.format)
        }
        command => {
            let config = load_game_config(&global)?;
            let mut session = open_session(&config, &global)?;
            let result = run_command(&mut session, command, global.format);
            tracing::debug!(pending = session.sync().pending_count(), "flushing writes");
            let failures = session.flush();
            print_notices(&mut session);
            result?;
            if let Some(failure) = failures.into_iter().next() {
                bail!("{failure}");
            }
            Ok(())
        }
    }
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut profile = None;
    let mut game = None;
    let mut verbosity = Verbosity::Normal;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        let mut value = |name: &str| -> Result<String> {
            match inline.clone().or_else(|| iter.next().cloned()) {
                Some(value) => Ok(value),
                None => bail!("{name} requires a value"),
            }
        };
        match flag {
            "--format" => {
                let raw = value("--format")?;
                format = OutputFormat::parse(&raw)
                    .ok_or_else(|| anyhow!("Unknown format: {raw} (use 'text' or 'json')"))?;
            }
            "--profile" => {
                let raw = value("--profile")?;
                profile = Some(
                    raw.parse::<u64>()
                        .with_context(|| format!("Invalid profile id: {raw}"))?,
                );
            }
            "--game" => {
                let raw = value("--game")?;
                game = Some(
                    GameFamily::parse(&raw).ok_or_else(|| anyhow!("Unknown game: {raw}"))?,
                );
            }
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            "-v" => verbosity = bump(verbosity, 1),
            "-vv" => verbosity = bump(verbosity, 2),
            "-vvv" => verbosity = bump(verbosity, 3),
            "-h" | "--help" => tokens.push("help".to_string()),
            "-V" | "--version" => tokens.push("version".to_string()),
            _ => tokens.push(arg.to_string()),
        }
    }

    Ok((
        GlobalOptions {
            format,
            profile,
            game,
            verbosity,
        },
        tokens,
    ))
}

fn bump(verbosity: Verbosity, by: u8) -> Verbosity {
    match verbosity {
        Verbosity::Quiet => Verbosity::Quiet,
        Verbosity::Normal => Verbosity::Verbose(by),
        Verbosity::Verbose(level) => Verbosity::Verbose(level.saturating_add(by)),
    }
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let arg = |index: usize, what: &str| -> Result<String> {
        words
            .get(index)
            .map(|value| value.to_string())
            .ok_or_else(|| {
                let command = words[..index.min(words.len())].join(" ");
                anyhow!("{command} requires {what}")
            })
    };

    let command = match words.as_slice() {
        [] | ["help", ..] => CliCommand::Help,
        ["version", ..] => CliCommand::Version,
        ["order", ..] => CliCommand::Order,
        ["reset", ..] => CliCommand::Reset,
        ["paths", ..] => CliCommand::Paths,
        ["deps"] | ["deps", "check", ..] => CliCommand::DepsCheck,
        ["deps", "closure", rest @ ..] => CliCommand::DepsClosure {
            id: arg(2, "a mod id")?,
            dependents: rest.contains(&"--dependents"),
        },
        ["deps", "required-by", ..] => CliCommand::DepsRequiredBy(arg(2, "a mod id")?),
        ["deps", other, ..] => {
            bail!("Unknown deps command: {other} (use 'check', 'closure' or 'required-by')")
        }
        ["move", rest @ ..] => {
            let mut select = Vec::new();
            let mut positional = Vec::new();
            let mut iter = rest.iter();
            while let Some(word) = iter.next() {
                if let Some(list) = word.strip_prefix("--select=") {
                    select.extend(split_list(list));
                } else if *word == "--select" {
                    let list = iter
                        .next()
                        .ok_or_else(|| anyhow!("--select requires a value"))?;
                    select.extend(split_list(list));
                } else {
                    positional.push(word.to_string());
                }
            }
            let [active, over] = <[String; 2]>::try_from(positional)
                .map_err(|_| anyhow!("move requires <active> <over>"))?;
            CliCommand::Move {
                active,
                over,
                select,
            }
        }
        ["priority", ..] => {
            let raw = arg(2, "a position")?;
            CliCommand::Priority {
                id: arg(1, "a mod id")?,
                priority: raw
                    .parse()
                    .with_context(|| format!("Invalid position: {raw}"))?,
            }
        }
        ["send", ..] => CliCommand::Send {
            id: arg(1, "a mod id")?,
            separator: arg(2, "a separator id")?,
        },
        ["enable", ..] => CliCommand::Enable(arg(1, "a mod or separator id")?),
        ["disable", ..] => CliCommand::Disable(arg(1, "a mod or separator id")?),
        ["toggle-all", ..] => CliCommand::ToggleAll,
        ["separator", "add", ..] => CliCommand::SeparatorAdd(arg(2, "a title")?),
        ["separator", "remove", ..] => CliCommand::SeparatorRemove(arg(2, "a separator id")?),
        ["separator", "toggle", ..] => CliCommand::SeparatorToggle(arg(2, "a separator id")?),
        ["separator", "collapse", ..] => {
            CliCommand::SeparatorCollapse(arg(2, "a separator id")?)
        }
        ["separator", "edit", rest @ ..] => {
            let (mut flags, positional) =
                take_flags(rest, &["--title", "--background", "--text"])?;
            let [id] = <[String; 1]>::try_from(positional)
                .map_err(|_| anyhow!("separator edit requires <id>"))?;
            CliCommand::SeparatorEdit {
                id,
                title: flags.remove("--title").unwrap_or_default(),
                background: flags.remove("--background").unwrap_or_default(),
                text: flags.remove("--text").unwrap_or_default(),
            }
        }
        ["separator", ..] => {
            bail!(
                "Unknown separator command (use 'add', 'remove', 'edit', 'toggle', or 'collapse')"
            )
        }
        ["meta", rest @ ..] => {
            let (mut flags, positional) = take_flags(rest, &["--title", "--categories"])?;
            let [id] = <[String; 1]>::try_from(positional)
                .map_err(|_| anyhow!("meta requires <id>"))?;
            CliCommand::Meta {
                id,
                title: flags.remove("--title"),
                categories: flags.remove("--categories"),
            }
        }
        ["categories", rest @ ..] => {
            let (mut flags, positional) =
                take_flags(rest, &["--select", "--add", "--remove"])?;
            if let Some(extra) = positional.first() {
                bail!("Unexpected argument: {extra}");
            }
            let select: Vec<String> = flags
                .remove("--select")
                .map(|list| split_list(&list).collect())
                .unwrap_or_default();
            if select.is_empty() {
                bail!("categories requires --select <ids>");
            }
            CliCommand::Categories {
                select,
                add: flags.remove("--add").unwrap_or_default(),
                remove: flags.remove("--remove").unwrap_or_default(),
            }
        }
        ["conflicts", ..] => CliCommand::Conflicts(arg(1, "a mod id")?),
        [other, ..] => bail!("Unknown command: {other} (see 'loadsmith help')"),
    };
    Ok(command)
}

/// Splits `--name value` / `--name=value` pairs from positional words.
fn take_flags(
    words: &[&str],
    names: &[&str],
) -> Result<(BTreeMap<String, String>, Vec<String>)> {
    let mut flags = BTreeMap::new();
    let mut positional = Vec::new();
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        let (name, inline) = match word.split_once('=') {
            Some((name, value)) if word.starts_with("--") => (name, Some(value.to_string())),
            _ => (*word, None),
        };
        if !name.starts_with("--") {
            positional.push(word.to_string());
            continue;
        }
        if !names.contains(&name) {
            bail!("Unknown option: {name}");
        }
        let value = match inline {
            Some(value) => value,
            None => iter
                .next()
                .map(|value| value.to_string())
                .ok_or_else(|| anyhow!("{name} requires a value"))?,
        };
        flags.insert(name.to_string(), value);
    }
    Ok((flags, positional))
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

fn load_game_config(global: &GlobalOptions) -> Result<GameConfig> {
    let game = match global.game {
        Some(game) => game,
        None => AppConfig::load_or_create()?.active_game,
    };
    let mut config = GameConfig::load_or_create(game)?;
    if let Some(profile) = global.profile {
        config.active_profile = profile;
    }
    Ok(config)
}

fn open_session(config: &GameConfig, global: &GlobalOptions) -> Result<Session<JsonFileStore>> {
    let mods: Vec<ModEntry> = read_json_or_default(&config.catalog_path())?;
    let conflicts: ConflictIndex = read_json_or_default(&config.conflicts_path())?;
    let mut options = SessionOptions::from_config(config);
    if let Some(profile) = global.profile {
        options.profile = profile;
    }
    let store = JsonFileStore::new(config.records_dir());
    Session::load(store, options, mods, conflicts)
        .with_context(|| format!("load profile {} of {}", options.profile, config.game_name))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "input file missing, using empty data");
        return Ok(T::default());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn run_command(
    session: &mut Session<JsonFileStore>,
    command: CliCommand,
    format: OutputFormat,
) -> Result<()> {
    match command {
        CliCommand::Order => list_order(session, format),
        CliCommand::DepsCheck => check_dependencies(session, format),
        CliCommand::DepsClosure { id, dependents } => {
            let direction = if dependents {
                Direction::Dependents
            } else {
                Direction::Dependencies
            };
            let found: Vec<ClosureItem> = session
                .on_require_items_query(&id, direction)
                .into_iter()
                .map(|entry| ClosureItem {
                    id: entry.identifier.clone(),
                    title: entry.title.clone(),
                    active: session.is_active(&entry.identifier),
                })
                .collect();
            print_closure(&found, format)
        }
        CliCommand::DepsRequiredBy(id) => {
            let found: Vec<ClosureItem> = session
                .required_by(&id)?
                .into_iter()
                .map(|entry| ClosureItem {
                    id: entry.identifier.clone(),
                    title: entry.title.clone(),
                    active: session.is_active(&entry.identifier),
                })
                .collect();
            print_closure(&found, format)
        }
        CliCommand::Reset => {
            let outcome = session.on_reset_load_order();
            match format {
                OutputFormat::Json => {
                    let warnings: Vec<String> =
                        outcome.warnings.iter().map(ToString::to_string).collect();
                    let output = ResetOutput {
                        moved: outcome.report.moved,
                        total: outcome.report.total,
                        circular_groups: outcome.report.circular_groups,
                        passes: outcome.report.passes,
                        converged: outcome.report.converged,
                        warnings,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => list_order(session, format)?,
            }
            Ok(())
        }
        CliCommand::Move {
            active,
            over,
            select,
        } => {
            for id in &select {
                session.toggle_row(id)?;
            }
            if !session.on_drag_end(&active, Some(&over)) {
                println!("Load order unchanged");
                return Ok(());
            }
            list_order(session, format)
        }
        CliCommand::Priority { id, priority } => {
            session.set_priority(&id, priority)?;
            list_order(session, format)
        }
        CliCommand::Send { id, separator } => {
            session.send_to_separator(&id, &separator)?;
            list_order(session, format)
        }
        CliCommand::Enable(id) => {
            session.on_toggle_activation(&id, true)?;
            list_order(session, format)
        }
        CliCommand::Disable(id) => {
            session.on_toggle_activation(&id, false)?;
            list_order(session, format)
        }
        CliCommand::ToggleAll => {
            session.toggle_all();
            list_order(session, format)
        }
        CliCommand::SeparatorAdd(title) => {
            let id = session.add_separator(&title);
            println!("{id}");
            Ok(())
        }
        CliCommand::SeparatorRemove(id) => {
            session.remove_separator(&id)?;
            list_order(session, format)
        }
        CliCommand::SeparatorToggle(id) => {
            if !sequence_has_separator(session.entries(), &id) {
                bail!("'{id}' is not a separator");
            }
            session.on_toggle_activation(&id, true)?;
            list_order(session, format)
        }
        CliCommand::SeparatorCollapse(id) => {
            let collapsed = session.toggle_collapse(&id)?;
            println!("{id}: {}", if collapsed { "collapsed" } else { "expanded" });
            Ok(())
        }
        CliCommand::SeparatorEdit {
            id,
            title,
            background,
            text,
        } => {
            session.edit_separator(&id, &title, &background, &text)?;
            list_order(session, format)
        }
        CliCommand::Meta {
            id,
            title,
            categories,
        } => {
            let (current_title, current_categories) = session
                .meta()
                .iter()
                .find(|record| record.identifier == id)
                .map(|record| (record.title.clone(), record.categories.clone()))
                .unwrap_or_default();
            let title = title.unwrap_or(current_title);
            let categories = categories.unwrap_or(current_categories);
            session.set_meta(&id, &title, &categories)?;
            Ok(())
        }
        CliCommand::Categories {
            select,
            add,
            remove,
        } => {
            for id in &select {
                session.toggle_row(id)?;
            }
            let changed = session.bulk_categories(&add, &remove);
            println!("Updated categories of {changed} mods");
            Ok(())
        }
        CliCommand::Conflicts(id) => show_conflicts(session, &id, format),
        CliCommand::Paths | CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn sequence_has_separator(entries: &[Entry], id: &str) -> bool {
    entries
        .iter()
        .any(|entry| entry.is_separator() && entry.identifier() == id)
}

#[derive(Serialize)]
struct OrderItem {
    order: usize,
    id: String,
    title: String,
    kind: &'static str,
    active: Option<bool>,
    created: Option<String>,
    /// Dependencies this mod loads before, or that are missing.
    violations: Vec<String>,
}

fn list_order(session: &Session<JsonFileStore>, format: OutputFormat) -> Result<()> {
    let detected = session.violations();
    let items: Vec<OrderItem> = session
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Entry::Mod(mod_entry) => OrderItem {
                order: index + 1,
                id: mod_entry.identifier.clone(),
                title: mod_entry.title.clone(),
                kind: "mod",
                active: Some(session.is_active(&mod_entry.identifier)),
                created: format_date(mod_entry.created_at),
                violations: violations::violations_of(&detected, &mod_entry.identifier)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            Entry::Separator(separator) => OrderItem {
                order: index + 1,
                id: separator.identifier.clone(),
                title: separator.title.clone(),
                kind: if separator.collapsed {
                    "collapsed"
                } else {
                    "separator"
                },
                active: None,
                created: None,
                violations: Vec::new(),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for item in items {
                if item.active.is_none() {
                    let marker = if item.kind == "collapsed" { "+" } else { "-" };
                    println!("{:>3} {marker}-- {} ({})", item.order, item.title, item.id);
                    continue;
                }
                let enabled = if item.active == Some(true) { "x" } else { " " };
                let created = item.created.as_deref().unwrap_or("----------");
                let warning = if item.violations.is_empty() {
                    String::new()
                } else {
                    format!("  ! loads before {}", item.violations.join(", "))
                };
                println!(
                    "{:>3} [{enabled}] {created} {} ({}){warning}",
                    item.order, item.title, item.id
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct DependencyReport {
    /// Dependency id to the dependents loaded before it.
    violations: BTreeMap<String, Vec<String>>,
    /// Active mod id to required mods that are missing or disabled.
    inactive_requirements: BTreeMap<String, Vec<String>>,
}

fn check_dependencies(session: &Session<JsonFileStore>, format: OutputFormat) -> Result<()> {
    let violations: BTreeMap<String, Vec<String>> = session
        .violations()
        .into_iter()
        .map(|(dependency, dependents)| (dependency, dependents.into_iter().collect()))
        .collect();
    let mut inactive_requirements: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in session.entries().iter().filter_map(Entry::as_mod) {
        let missing =
            activation::inactive_requirements(session.entries(), session.activation(), entry);
        if !missing.is_empty() {
            inactive_requirements.insert(
                entry.identifier.clone(),
                missing.into_iter().map(str::to_string).collect(),
            );
        }
    }
    let report = DependencyReport {
        violations,
        inactive_requirements,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if report.violations.is_empty() && report.inactive_requirements.is_empty() {
                println!("No dependency problems");
            }
            for (dependency, dependents) in &report.violations {
                println!("{dependency} must load before: {}", dependents.join(", "));
            }
            for (id, missing) in &report.inactive_requirements {
                println!("{id} is active but requires: {}", missing.join(", "));
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ClosureItem {
    id: String,
    title: String,
    active: bool,
}

fn print_closure(items: &[ClosureItem], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        OutputFormat::Text => {
            for item in items {
                let enabled = if item.active { "x" } else { " " };
                println!("[{enabled}] {} ({})", item.title, item.id);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ResetOutput {
    moved: usize,
    total: usize,
    circular_groups: usize,
    passes: usize,
    converged: bool,
    warnings: Vec<String>,
}

fn show_conflicts(
    session: &Session<JsonFileStore>,
    id: &str,
    format: OutputFormat,
) -> Result<()> {
    let summary = session.conflicts_for(id)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            print_conflict_side("Overrides", &summary.win);
            print_conflict_side("Overridden by", &summary.lose);
        }
    }
    Ok(())
}

fn print_conflict_side(label: &str, side: &ConflictSide) {
    println!("{label} ({} files):", side.total);
    for (owner, descriptors) in &side.cases {
        println!("  {owner}: {}", descriptors.join(", "));
    }
}

#[derive(Serialize)]
struct PathsOutput {
    data_dir: String,
    catalog: String,
    conflicts: String,
    records: String,
    profile: u64,
}

fn list_paths(config: &GameConfig, format: OutputFormat) -> Result<()> {
    let output = PathsOutput {
        data_dir: config.data_dir.display().to_string(),
        catalog: config.catalog_path().display().to_string(),
        conflicts: config.conflicts_path().display().to_string(),
        records: config.records_dir().display().to_string(),
        profile: config.active_profile,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Game: {}", config.game_name);
            println!("Data dir: {}", output.data_dir);
            println!("Catalog: {}", output.catalog);
            println!("Conflicts: {}", output.conflicts);
            println!("Records: {}", output.records);
            println!("Profile: {}", output.profile);
            if let Ok(base) = config::base_data_dir() {
                println!("App config: {}", base.join("config.json").display());
            }
        }
    }
    Ok(())
}

fn print_notices(session: &mut Session<JsonFileStore>) {
    for notice in session.take_notices() {
        let prefix = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warn => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("{prefix}: {}", notice.message);
    }
}

fn format_date(timestamp: i64) -> Option<String> {
    if timestamp <= 0 {
        return None;
    }
    let date = OffsetDateTime::from_unix_timestamp(timestamp).ok()?;
    date.format(format_description!("[year]-[month]-[day]")).ok()
}

fn print_help() {
    println!("loadsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  loadsmith order                        Show the load order");
    println!("  loadsmith deps check                   List ordering and activation problems");
    println!("  loadsmith deps closure <id> [--dependents]");
    println!("                                         List transitive dependencies (or dependents)");
    println!("  loadsmith deps required-by <id>        List mods that directly require a mod");
    println!("  loadsmith reset                        Rebuild the load order from dependencies");
    println!("  loadsmith move <active> <over> [--select a,b]");
    println!("                                         Drag an entry (or selection) onto another");
    println!("  loadsmith priority <id> <n>            Move an entry to position n");
    println!("  loadsmith send <id> <separator>        Move a mod to the end of a separator");
    println!("  loadsmith enable <id>                  Enable a mod and its dependencies");
    println!("  loadsmith disable <id>                 Disable a mod and its dependents");
    println!("  loadsmith toggle-all                   Enable all, or disable all if all are on");
    println!("  loadsmith separator add <title>        Append a separator");
    println!("  loadsmith separator remove <id>        Remove a separator");
    println!("  loadsmith separator toggle <id>        Flip activation of a separator's mods");
    println!("  loadsmith separator collapse <id>      Collapse or expand a separator");
    println!("  loadsmith separator edit <id> [--title T] [--background C] [--text C]");
    println!("                                         Rename or recolour a separator");
    println!("  loadsmith meta <id> [--title T] [--categories a,b]");
    println!("                                         Set a mod's display title and categories");
    println!("  loadsmith categories --select a,b [--add x,y] [--remove z]");
    println!("                                         Edit categories of several mods");
    println!("  loadsmith conflicts <id>               Show file conflicts won and lost");
    println!("  loadsmith paths                        Show data locations");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                   Output format");
    println!("  --game <totalwar|bannerlord>           Game to operate on");
    println!("  --profile <id>                         Profile id");
    println!("  -q, --quiet                            Errors only");
    println!("  -v, -vv, -vvv                          Increase log verbosity");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn global_options_are_pulled_out_anywhere() {
        let invocation =
            parse(&args("order --format json --game=bannerlord -v --profile 3")).unwrap();
        assert_eq!(invocation.command, CliCommand::Order);
        assert_eq!(invocation.global.format, OutputFormat::Json);
        assert_eq!(invocation.global.game, Some(GameFamily::Bannerlord));
        assert_eq!(invocation.global.profile, Some(3));
        assert_eq!(invocation.verbosity(), Verbosity::Verbose(1));
    }

    #[test]
    fn move_collects_selection() {
        let invocation = parse(&args("move a c --select a,b")).unwrap();
        assert_eq!(
            invocation.command,
            CliCommand::Move {
                active: "a".to_string(),
                over: "c".to_string(),
                select: vec!["a".to_string(), "b".to_string()],
            }
        );
        assert!(parse(&args("move a")).is_err());
    }

    #[test]
    fn subcommands_validate_arguments() {
        assert_eq!(
            parse(&args("deps closure x --dependents")).unwrap().command,
            CliCommand::DepsClosure {
                id: "x".to_string(),
                dependents: true
            }
        );
        assert_eq!(
            parse(&args("priority x 4")).unwrap().command,
            CliCommand::Priority {
                id: "x".to_string(),
                priority: 4
            }
        );
        assert!(parse(&args("priority x first")).is_err());
        assert!(parse(&args("deps frobnicate")).is_err());
        assert!(parse(&args("--format xml order")).is_err());
        assert_eq!(parse(&args("")).unwrap().command, CliCommand::Help);
        assert_eq!(parse(&args("-q order")).unwrap().verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn edit_commands_take_named_options() {
        assert_eq!(
            parse(&args("separator edit separator-1 --title=Core --text #fff")).unwrap().command,
            CliCommand::SeparatorEdit {
                id: "separator-1".to_string(),
                title: "Core".to_string(),
                background: String::new(),
                text: "#fff".to_string(),
            }
        );
        assert_eq!(
            parse(&args("meta a --categories units,maps")).unwrap().command,
            CliCommand::Meta {
                id: "a".to_string(),
                title: None,
                categories: Some("units,maps".to_string()),
            }
        );
        assert_eq!(
            parse(&args("categories --select a,b --remove maps")).unwrap().command,
            CliCommand::Categories {
                select: vec!["a".to_string(), "b".to_string()],
                add: String::new(),
                remove: "maps".to_string(),
            }
        );
        assert!(parse(&args("categories --add x")).is_err());
        assert!(parse(&args("meta a --colour red")).is_err());
        assert_eq!(
            parse(&args("deps required-by a")).unwrap().command,
            CliCommand::DepsRequiredBy("a".to_string())
        );
    }

    #[test]
    fn dates_render_as_iso_days() {
        assert_eq!(format_date(0), None);
        assert_eq!(format_date(86_400).as_deref(), Some("1970-01-02"));
    }
}
