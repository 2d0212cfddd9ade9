pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod entry;
pub mod error;
pub mod filter;
pub mod render;
pub mod storage;
pub mod tracker;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::storage::{
  FileStore,
  KeyValueStore,
  MemoryStore
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting brightday"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.brightdayrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let policy = cfg.leap_day_policy()?;
  let today = match cli.today {
    | Some(today) => today,
    | None => {
      let zone =
        datetime::resolve_timezone(
          cfg.get("timezone").as_deref()
        );
      debug!(%zone, "evaluating today in tracker zone");
      datetime::ensure_next_year_exists(
        zone.today(Utc::now())
      )?
    }
  };
  debug!(%today, %policy, "evaluation date");

  let store: Box<dyn KeyValueStore> =
    if cli.ephemeral {
      info!(
        "ephemeral run; nothing will \
         be written"
      );
      Box::new(MemoryStore::new())
    } else {
      let data_dir =
        config::resolve_data_dir(
          &cfg,
          cli.data.as_deref()
        )
        .context(
          "failed to resolve data \
           directory"
        )?;
      Box::new(
        FileStore::open(&data_dir)
          .with_context(|| {
            format!(
              "failed to open store at \
               {}",
              data_dir.display()
            )
          })?
      )
    };

  let mut tracker =
    tracker::Tracker::open(
      store, policy
    );
  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &mut tracker,
    &cfg,
    &renderer,
    inv,
    today
  )?;

  info!("done");
  Ok(())
}
