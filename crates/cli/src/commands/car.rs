// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `car` subcommand family (spec §6.2): work-item CRUD, dependency edges,
//! and the ready-set inspector.

use anyhow::{bail, Result};
use clap::{Args, Subcommand, ValueEnum};
use railyard_core::{DependencyType, WorkItem, WorkItemId, WorkItemStatus, WorkItemType};
use railyard_storage::{CreateWorkItem, Store, WorkItemFilter, WorkItemPatch};

use crate::output::{emit, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct CarArgs {
    #[command(subcommand)]
    pub command: CarCommand,
}

#[derive(Subcommand)]
pub enum CarCommand {
    /// Create a new work item
    Create(CreateArgs),
    /// List work items
    List(ListArgs),
    /// Show a single work item
    Show(ShowArgs),
    /// Patch fields on a work item
    Update(UpdateArgs),
    /// Publish a draft work item (and optionally its draft descendants)
    Publish(PublishArgs),
    /// Inspect the ready set (spec §4.1 `ready`)
    Ready(ReadyArgs),
    /// Manage dependency edges
    Dep(DepArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliWorkItemType {
    Task,
    Epic,
    Bug,
    Spike,
}

impl From<CliWorkItemType> for WorkItemType {
    fn from(t: CliWorkItemType) -> Self {
        match t {
            CliWorkItemType::Task => WorkItemType::Task,
            CliWorkItemType::Epic => WorkItemType::Epic,
            CliWorkItemType::Bug => WorkItemType::Bug,
            CliWorkItemType::Spike => WorkItemType::Spike,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliStatus {
    Draft,
    Open,
    Claimed,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl From<CliStatus> for WorkItemStatus {
    fn from(s: CliStatus) -> Self {
        match s {
            CliStatus::Draft => WorkItemStatus::Draft,
            CliStatus::Open => WorkItemStatus::Open,
            CliStatus::Claimed => WorkItemStatus::Claimed,
            CliStatus::InProgress => WorkItemStatus::InProgress,
            CliStatus::Blocked => WorkItemStatus::Blocked,
            CliStatus::Done => WorkItemStatus::Done,
            CliStatus::Cancelled => WorkItemStatus::Cancelled,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliDepType {
    Blocks,
    Relates,
}

impl From<CliDepType> for DependencyType {
    fn from(t: CliDepType) -> Self {
        match t {
            CliDepType::Blocks => DependencyType::Blocks,
            CliDepType::Relates => DependencyType::Relates,
        }
    }
}

#[derive(Args)]
pub struct CreateArgs {
    /// Short human-readable title
    #[arg(long)]
    pub title: String,
    /// Work item kind
    #[arg(long = "type", value_enum, default_value_t = CliWorkItemType::Task)]
    pub item_type: CliWorkItemType,
    /// 0 (highest) through 4; defaults to 2
    #[arg(long)]
    pub priority: Option<u8>,
    /// Track name (inherited from --parent's track when omitted)
    #[arg(long, default_value = "")]
    pub track: String,
    /// Branch this work item merges into on completion (defaults to the
    /// configured `default_branch`)
    #[arg(long = "base-branch")]
    pub base_branch: Option<String>,
    /// Parent epic id, for epic decomposition
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long = "acceptance", default_value = "")]
    pub acceptance_criteria: String,
    #[arg(long = "design-notes", default_value = "")]
    pub design_notes: String,
    /// Skip the track's test command on completion
    #[arg(long = "skip-tests")]
    pub skip_tests: bool,
    /// Create as `draft` rather than `open` (useful for seeding an epic's
    /// children before publishing the whole tree)
    #[arg(long)]
    pub draft: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub track: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<CliStatus>,
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long = "acceptance")]
    pub acceptance_criteria: Option<String>,
    #[arg(long = "design-notes")]
    pub design_notes: Option<String>,
    #[arg(long)]
    pub priority: Option<u8>,
    #[arg(long = "skip-tests")]
    pub skip_tests: Option<bool>,
    #[arg(long, value_enum)]
    pub status: Option<CliStatus>,
}

#[derive(Args)]
pub struct PublishArgs {
    pub id: String,
    /// Also publish every draft descendant
    #[arg(long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct ReadyArgs {
    #[arg(long)]
    pub track: Option<String>,
}

#[derive(Args)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommand,
}

#[derive(Subcommand)]
pub enum DepCommand {
    /// Add a dependency edge: `id` depends on `--blocked-by`
    Add(DepAddArgs),
    /// List dependency edges naming `id`
    List(DepListArgs),
    /// Remove a dependency edge
    Remove(DepRemoveArgs),
}

#[derive(Args)]
pub struct DepAddArgs {
    pub id: String,
    #[arg(long = "blocked-by")]
    pub blocked_by: String,
    #[arg(long = "type", value_enum, default_value_t = CliDepType::Blocks)]
    pub dep_type: CliDepType,
}

#[derive(Args)]
pub struct DepListArgs {
    pub id: String,
}

#[derive(Args)]
pub struct DepRemoveArgs {
    pub id: String,
    #[arg(long = "blocked-by")]
    pub blocked_by: String,
}

pub fn run(store: &Store, args: CarArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        CarCommand::Create(a) => create(store, a, format),
        CarCommand::List(a) => list(store, a, format),
        CarCommand::Show(a) => show(store, a, format),
        CarCommand::Update(a) => update(store, a, format),
        CarCommand::Publish(a) => publish(store, a),
        CarCommand::Ready(a) => ready(store, a, format),
        CarCommand::Dep(a) => dep(store, a, format),
    }
}

fn create(store: &Store, a: CreateArgs, format: OutputFormat) -> Result<()> {
    if let Some(p) = &a.priority {
        if *p > railyard_core::MAX_PRIORITY {
            bail!("priority must be 0-{}", railyard_core::MAX_PRIORITY);
        }
    }
    if a.track.is_empty() && a.parent.is_none() {
        bail!("--track is required unless --parent is given");
    }
    let item = store.create(CreateWorkItem {
        title: a.title,
        item_type: a.item_type.into(),
        priority: a.priority,
        track: a.track,
        base_branch: a.base_branch,
        parent_id: a.parent.map(WorkItemId::new),
        description: a.description,
        acceptance_criteria: a.acceptance_criteria,
        design_notes: a.design_notes,
        skip_tests: a.skip_tests,
        draft: a.draft,
    })?;
    print_one(&item, format);
    Ok(())
}

fn list(store: &Store, a: ListArgs, format: OutputFormat) -> Result<()> {
    let items = store.list(&WorkItemFilter {
        track: a.track,
        status: a.status.map(Into::into),
        parent_id: a.parent.map(WorkItemId::new),
    })?;
    print_list(&items, format);
    Ok(())
}

fn show(store: &Store, a: ShowArgs, format: OutputFormat) -> Result<()> {
    let item = store.get(&WorkItemId::new(a.id))?;
    print_one(&item, format);
    Ok(())
}

fn update(store: &Store, a: UpdateArgs, format: OutputFormat) -> Result<()> {
    let item = store.update(
        &WorkItemId::new(a.id),
        WorkItemPatch {
            title: a.title,
            description: a.description,
            acceptance_criteria: a.acceptance_criteria,
            design_notes: a.design_notes,
            priority: a.priority,
            skip_tests: a.skip_tests,
            status: a.status.map(Into::into),
        },
    )?;
    print_one(&item, format);
    Ok(())
}

fn publish(store: &Store, a: PublishArgs) -> Result<()> {
    store.publish(&WorkItemId::new(a.id.clone()), a.recursive)?;
    println!("published {}", a.id);
    Ok(())
}

fn ready(store: &Store, a: ReadyArgs, format: OutputFormat) -> Result<()> {
    let items = store.ready(a.track.as_deref())?;
    print_list(&items, format);
    Ok(())
}

fn dep(store: &Store, a: DepArgs, format: OutputFormat) -> Result<()> {
    match a.command {
        DepCommand::Add(a) => {
            let d = store.add_dep(
                &WorkItemId::new(a.id),
                &WorkItemId::new(a.blocked_by),
                a.dep_type.into(),
            )?;
            println!("{} blocked_by {} ({})", d.work_item_id, d.blocked_by, d.dep_type);
        }
        DepCommand::List(a) => {
            let deps = store.deps(&WorkItemId::new(a.id))?;
            emit(format, &deps, |deps| {
                for d in deps {
                    println!("{} blocked_by {} ({})", d.work_item_id, d.blocked_by, d.dep_type);
                }
            });
        }
        DepCommand::Remove(a) => {
            store.remove_dep(&WorkItemId::new(a.id), &WorkItemId::new(a.blocked_by))?;
            println!("removed");
        }
    }
    Ok(())
}

fn print_one(item: &WorkItem, format: OutputFormat) {
    emit(format, item, |item| {
        println!("id:          {}", item.id);
        println!("title:       {}", item.title);
        println!("type:        {}", item.item_type);
        println!("status:      {}", crate::color::status(&item.status.to_string()));
        println!("priority:    {}", item.priority);
        println!("track:       {}", item.track);
        println!("branch:      {}", item.branch);
        println!("base:        {}", item.base_branch);
        if let Some(parent) = &item.parent_id {
            println!("parent:      {}", parent);
        }
        if let Some(assignee) = &item.assignee {
            println!("assignee:    {}", assignee);
        }
        if item.skip_tests {
            println!("skip_tests:  true");
        }
        if !item.description.is_empty() {
            println!("\n{}", item.description);
        }
    });
}

fn print_list(items: &[WorkItem], format: OutputFormat) {
    emit(format, &items.to_vec(), |items| {
        let mut table = Table::new(vec![
            Column::left("ID"),
            Column::status("STATUS"),
            Column::left("TYPE"),
            Column::right("PRI"),
            Column::left("TRACK"),
            Column::left("TITLE").with_max(60),
        ]);
        for item in items {
            table.row(vec![
                item.id.to_string(),
                item.status.to_string(),
                item.item_type.to_string(),
                item.priority.to_string(),
                item.track.clone(),
                item.title.clone(),
            ]);
        }
        table.render(&mut std::io::stdout());
    });
}

#[cfg(test)]
#[path = "car_tests.rs"]
mod tests;
