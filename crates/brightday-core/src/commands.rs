use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::days_until;
use crate::entry::{EntryDraft, EntryPatch};
use crate::filter::ListQuery;
use crate::render::Renderer;
use crate::storage::KeyValueStore;
use crate::tracker::Tracker;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "info",
        "modify",
        "delete",
        "sample",
        "stats",
        "export",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(tracker, cfg, renderer, inv))]
pub fn dispatch<S: KeyValueStore>(
    tracker: &mut Tracker<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.args, "dispatching command");

    match command {
        "add" => cmd_add(tracker, &inv.args),
        "list" => cmd_list(tracker, cfg, renderer, &inv.args, today),
        "info" => cmd_info(tracker, renderer, &inv.args, today),
        "modify" => cmd_modify(tracker, &inv.args),
        "delete" => cmd_delete(tracker, cfg, &inv.args),
        "sample" => cmd_sample(tracker, today),
        "stats" => renderer.print_summary(&tracker.summary(today)),
        "export" => cmd_export(tracker),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// A `key:value` token understood by add, modify and list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Id(String),
    Name(String),
    Date(String),
    Note(String),
    Filter(String),
    Sort(String),
}

/// Splits arguments into bare words and modifiers. Everything after `--` is
/// a bare word.
fn parse_words_and_mods(args: &[String]) -> (Vec<String>, Vec<Mod>) {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" && !literal {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg) {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    (words, mods)
}

fn parse_one_mod(tok: &str) -> Option<Mod> {
    let (key, value) = tok.split_once(':')?;
    let value = value.to_string();
    match key.to_ascii_lowercase().as_str() {
        "id" => Some(Mod::Id(value)),
        "name" => Some(Mod::Name(value)),
        "date" | "birthday" | "bday" => Some(Mod::Date(value)),
        "note" => Some(Mod::Note(value)),
        "filter" => Some(Mod::Filter(value)),
        "sort" => Some(Mod::Sort(value)),
        _ => None,
    }
}

fn is_confirmation_flag(arg: &str) -> bool {
    matches!(arg, "--yes" | "-y")
}

#[instrument(skip(tracker, args))]
fn cmd_add<S: KeyValueStore>(tracker: &mut Tracker<S>, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args);
    let mut draft = EntryDraft {
        name: words.join(" "),
        ..EntryDraft::default()
    };
    for one_mod in mods {
        match one_mod {
            Mod::Id(id) => draft.id = Some(id),
            Mod::Name(name) => draft.name = name,
            Mod::Date(date) => draft.date = date,
            Mod::Note(note) => draft.note = Some(note),
            other => warn!(modifier = ?other, "modifier has no meaning for add; ignored"),
        }
    }

    let entry = tracker.add(draft).context("could not add birthday")?;
    println!("Added {} ({}).", entry.name(), entry.id());
    report_unsaved(tracker);
    Ok(())
}

#[instrument(skip(tracker, cfg, renderer, args))]
fn cmd_list<S: KeyValueStore>(
    tracker: &Tracker<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    let mut query: ListQuery = cfg.default_query()?;
    let (words, mods) = parse_words_and_mods(args);
    for one_mod in mods {
        match one_mod {
            Mod::Filter(raw) => query.filter = raw.parse()?,
            Mod::Sort(raw) => query.sort = raw.parse()?,
            other => warn!(modifier = ?other, "modifier has no meaning for list; ignored"),
        }
    }
    query.search = words.join(" ");
    debug!(filter = %query.filter, sort = %query.sort, search = %query.search, "list query");

    let rows = tracker.view(&query, today);
    let summary = tracker.summary(today);
    renderer.print_list(&rows, &summary)
}

#[instrument(skip(tracker, renderer, args))]
fn cmd_info<S: KeyValueStore>(
    tracker: &Tracker<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command info");

    let id = single_id(args, "info")?;
    let entry = tracker
        .get(id)
        .ok_or_else(|| anyhow!("no birthday with id {id}"))?;
    let days = days_until(entry.date(), today, tracker.policy())?;
    renderer.print_entry_info(entry, days)
}

#[instrument(skip(tracker, args))]
fn cmd_modify<S: KeyValueStore>(tracker: &mut Tracker<S>, args: &[String]) -> anyhow::Result<()> {
    info!("command modify");

    let Some((id, rest)) = args.split_first() else {
        return Err(anyhow!("modify requires an id"));
    };

    let (words, mods) = parse_words_and_mods(rest);
    let mut patch = EntryPatch::default();
    if !words.is_empty() {
        patch.name = Some(words.join(" "));
    }
    for one_mod in mods {
        match one_mod {
            Mod::Name(name) => patch.name = Some(name),
            Mod::Date(date) => patch.date = Some(date),
            Mod::Note(note) => patch.note = Some(note),
            other => warn!(modifier = ?other, "modifier has no meaning for modify; ignored"),
        }
    }

    if patch.is_empty() {
        return Err(anyhow!("modify: nothing to change (use name:, date: or note:)"));
    }

    let entry = tracker
        .update(id, &patch)
        .with_context(|| format!("could not modify {id}"))?;
    println!("Modified {} ({}).", entry.name(), entry.id());
    report_unsaved(tracker);
    Ok(())
}

fn cmd_delete<S: KeyValueStore>(
    tracker: &mut Tracker<S>,
    cfg: &Config,
    args: &[String],
) -> anyhow::Result<()> {
    delete_entry(tracker, cfg, args, io::stdin().lock(), io::stdout().lock())
}

/// `delete` with the prompt read from `input` and all messages written to
/// `out`.
#[instrument(skip_all)]
fn delete_entry<S: KeyValueStore, R: BufRead, W: Write>(
    tracker: &mut Tracker<S>,
    cfg: &Config,
    args: &[String],
    input: R,
    mut out: W,
) -> anyhow::Result<()> {
    info!("command delete");

    let assume_yes = args.iter().any(|a| is_confirmation_flag(a));
    let ids: Vec<String> = args
        .iter()
        .filter(|a| !is_confirmation_flag(a))
        .cloned()
        .collect();
    let id = single_id(&ids, "delete")?;

    let entry = tracker
        .get(id)
        .ok_or_else(|| anyhow!("no birthday with id {id}"))?;

    let must_confirm = cfg.get_bool("confirmation").unwrap_or(true) && !assume_yes;
    if must_confirm {
        let prompt = format!("Delete the birthday of {} ({})? [y/N] ", entry.name(), entry.id());
        if !confirm(input, &mut out, &prompt)? {
            writeln!(out, "Nothing deleted.")?;
            return Ok(());
        }
    }

    let removed = tracker.remove(id)?;
    writeln!(out, "Deleted {} ({}).", removed.name(), removed.id())?;
    report_unsaved(tracker);
    Ok(())
}

#[instrument(skip(tracker))]
fn cmd_sample<S: KeyValueStore>(tracker: &mut Tracker<S>, today: NaiveDate) -> anyhow::Result<()> {
    info!("command sample");

    let added = tracker.import_samples(today);
    println!("Added {added} sample birthdays.");
    report_unsaved(tracker);
    Ok(())
}

fn cmd_export<S: KeyValueStore>(tracker: &Tracker<S>) -> anyhow::Result<()> {
    info!("command export");

    let out = serde_json::to_string_pretty(tracker.entries())?;
    println!("{out}");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
Usage: brightday [options] [command] [args...]

  add NAME... date:YYYY-MM-DD [note:TEXT] [id:ID]
  list [SEARCH...] [filter:all|today|this-week] [sort:soonest|name]
  info ID
  modify ID [NAME...] [name:TEXT] [date:YYYY-MM-DD] [note:TEXT]
  delete ID [--yes]
  sample
  stats
  export
  version

Commands may be abbreviated to any unique prefix. A first word that is such
a prefix runs the command (`brightday in` is `info`); search for it with
`brightday list WORD` instead."
    );
    Ok(())
}

fn single_id<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    match args {
        [id] => Ok(id.as_str()),
        [] => Err(anyhow!("{command} requires an id")),
        _ => Err(anyhow!("{command} takes exactly one id, got {}", args.len())),
    }
}

/// Writes `prompt` and reads one line; only `y` or `yes` agree. End of input
/// declines.
fn confirm<R: BufRead, W: Write>(mut input: R, mut out: W, prompt: &str) -> anyhow::Result<bool> {
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("failed reading confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn report_unsaved<S: KeyValueStore>(tracker: &Tracker<S>) {
    if !tracker.last_save_ok() {
        eprintln!("warning: the change could not be saved and will be lost on exit");
    }
}
