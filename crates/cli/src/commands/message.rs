// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `message` subcommand family and the standalone `inbox` command (spec
//! §6.2, §4.3 Messaging Bus).

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use railyard_core::{Message, MessageId, MessagePriority, ThreadId};
use railyard_storage::{SendMessage, Store};

use crate::output::{emit, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct MessageArgs {
    #[command(subcommand)]
    pub command: MessageCommand,
}

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Send a directed or broadcast (`--to '*'`) message
    Send(SendArgs),
    /// Acknowledge a message (or a broadcast, on behalf of `--agent`)
    Ack(AckArgs),
    /// Show every message sharing a thread id
    Thread(ThreadArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliPriority {
    Normal,
    Urgent,
}

impl From<CliPriority> for MessagePriority {
    fn from(p: CliPriority) -> Self {
        match p {
            CliPriority::Normal => MessagePriority::Normal,
            CliPriority::Urgent => MessagePriority::Urgent,
        }
    }
}

#[derive(Args)]
pub struct SendArgs {
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub subject: String,
    pub body: String,
    #[arg(long, value_enum, default_value_t = CliPriority::Normal)]
    pub priority: CliPriority,
    #[arg(long)]
    pub thread: Option<String>,
    #[arg(long)]
    pub car: Option<String>,
}

#[derive(Args)]
pub struct AckArgs {
    pub id: String,
    /// Required to acknowledge a broadcast (`to_agent == "*"`) on behalf of
    /// one recipient, rather than the single direct-message ack
    #[arg(long)]
    pub agent: Option<String>,
}

#[derive(Args)]
pub struct ThreadArgs {
    pub id: String,
}

#[derive(Args)]
pub struct InboxArgs {
    #[arg(long)]
    pub agent: String,
}

pub fn run(store: &Store, args: MessageArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        MessageCommand::Send(a) => send(store, a, format),
        MessageCommand::Ack(a) => ack(store, a),
        MessageCommand::Thread(a) => thread(store, a, format),
    }
}

fn send(store: &Store, a: SendArgs, format: OutputFormat) -> Result<()> {
    let msg = store.send_message(SendMessage {
        from_agent: a.from,
        to_agent: a.to,
        subject: a.subject,
        body: a.body,
        priority: a.priority.into(),
        thread_id: a.thread.map(ThreadId::new),
        car_id: a.car.map(railyard_core::WorkItemId::new),
    })?;
    print_one(&msg, format);
    Ok(())
}

fn ack(store: &Store, a: AckArgs) -> Result<()> {
    let id = MessageId::new(a.id.clone());
    match a.agent {
        Some(agent) => store.acknowledge_broadcast(&id, &agent)?,
        None => store.acknowledge(&id)?,
    }
    println!("acknowledged {}", a.id);
    Ok(())
}

fn thread(store: &Store, a: ThreadArgs, format: OutputFormat) -> Result<()> {
    let msgs = store.thread(&ThreadId::new(a.id))?;
    print_list(&msgs, format);
    Ok(())
}

pub fn inbox(store: &Store, a: InboxArgs, format: OutputFormat) -> Result<()> {
    let msgs = store.inbox(&a.agent)?;
    print_list(&msgs, format);
    Ok(())
}

fn print_one(msg: &Message, format: OutputFormat) {
    emit(format, msg, |msg| {
        println!("id:       {}", msg.id);
        println!("from:     {}", msg.from_agent);
        println!("to:       {}", msg.to_agent);
        println!("subject:  {}", msg.subject);
        println!("priority: {}", msg.priority);
        if let Some(thread) = &msg.thread_id {
            println!("thread:   {}", thread);
        }
        if let Some(car) = &msg.car_id {
            println!("car:      {}", car);
        }
        println!("\n{}", msg.body);
    });
}

fn print_list(msgs: &[Message], format: OutputFormat) {
    emit(format, &msgs.to_vec(), |msgs| {
        let mut table = Table::new(vec![
            Column::left("ID"),
            Column::left("FROM"),
            Column::left("TO"),
            Column::left("SUBJECT"),
            Column::left("PRIORITY"),
            Column::left("ACK"),
        ]);
        for msg in msgs {
            table.row(vec![
                msg.id.to_string(),
                msg.from_agent.clone(),
                msg.to_agent.clone(),
                msg.subject.clone(),
                msg.priority.to_string(),
                msg.acknowledged.to_string(),
            ]);
        }
        table.render(&mut std::io::stdout());
    });
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
