use anyhow::Context;
use colored::Colorize;
use keepstate_codec::{from_envelope, JsonEnvelopeSerializer, Serializer};
use keepstate_merge::{diff_values, ValueChange};
use keepstate_store::Storage;
use keepstate_types::{StoreKey, Value};
use serde_json::json;

use crate::backend;
use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = backend::storage_config(&cli)?;
    let storage = backend::open(&config)?;
    tracing::debug!(backend = config.backend_name(), "backend opened");

    match cli.command {
        Command::Get(args) => cmd_get(&storage, args, cli.format).await,
        Command::Show(args) => cmd_show(&storage, args, cli.format).await,
        Command::Has(args) => cmd_has(&storage, args, cli.format).await,
        Command::Clear(args) => cmd_clear(&storage, args, cli.format).await,
        Command::Put(args) => cmd_put(&storage, args, cli.format).await,
        Command::Diff(args) => cmd_diff(&storage, args, cli.format).await,
    }
}

fn key(raw: &str) -> anyhow::Result<StoreKey> {
    Ok(StoreKey::new(raw)?)
}

async fn read(storage: &Storage, key: &StoreKey) -> anyhow::Result<Option<Value>> {
    let Some(text) = storage.get(key.as_str()).await? else {
        return Ok(None);
    };
    let value = JsonEnvelopeSerializer::new()
        .deserialize(&text)
        .with_context(|| format!("record {} is not a state tree", key))?;
    Ok(Some(value))
}

fn parse_document(raw: &str) -> anyhow::Result<Value> {
    let json: serde_json::Value = serde_json::from_str(raw).context("argument is not valid JSON")?;
    Ok(from_envelope(json))
}

async fn cmd_get(storage: &Storage, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    let record = storage.get(key.as_str()).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "key": key.as_str(), "record": record })),
        OutputFormat::Text => match record {
            Some(text) => println!("{}", text),
            None => println!("{} no record for {}", "✗".red(), key.as_str().yellow()),
        },
    }
    Ok(())
}

async fn cmd_show(storage: &Storage, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    let state = read(storage, &key).await?;
    match format {
        OutputFormat::Json => {
            let state = state.as_ref().map(Value::to_plain_json);
            println!("{}", serde_json::to_string_pretty(&json!({ "key": key.as_str(), "state": state }))?);
        }
        OutputFormat::Text => match state {
            Some(state) => {
                println!("{} {}", "Record".bold(), key.as_str().yellow().bold());
                let mut out = String::new();
                tree(&state, 1, &mut out);
                print!("{}", out);
            }
            None => println!("{} no record for {}", "✗".red(), key.as_str().yellow()),
        },
    }
    Ok(())
}

async fn cmd_has(storage: &Storage, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    let present = storage.has(key.as_str()).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "key": key.as_str(), "present": present })),
        OutputFormat::Text if present => println!("{} {}", "✓".green(), key.as_str().yellow()),
        OutputFormat::Text => println!("{} {}", "✗".red(), key.as_str().yellow()),
    }
    Ok(())
}

async fn cmd_clear(storage: &Storage, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    storage.remove(key.as_str()).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "key": key.as_str(), "cleared": true })),
        OutputFormat::Text => println!("{} Cleared {}", "✓".green().bold(), key.as_str().yellow()),
    }
    Ok(())
}

async fn cmd_put(storage: &Storage, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    let state = parse_document(&args.json)?;
    let text = JsonEnvelopeSerializer::new().serialize(&state)?;
    storage.set(key.as_str(), &text).await?;
    match format {
        OutputFormat::Json => {
            println!("{}", json!({ "key": key.as_str(), "bytes": text.len() }))
        }
        OutputFormat::Text => println!(
            "{} Stored {} ({} bytes)",
            "✓".green().bold(),
            key.as_str().yellow(),
            text.len()
        ),
    }
    Ok(())
}

async fn cmd_diff(storage: &Storage, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = key(&args.key)?;
    let stored = read(storage, &key)
        .await?
        .unwrap_or_else(|| Value::object(Vec::<(String, Value)>::new()));
    let proposed = parse_document(&args.json)?;
    let diff = diff_values(&stored, &proposed);

    if format == OutputFormat::Json {
        let changes: Vec<_> = diff
            .changes
            .iter()
            .map(|change| match change {
                ValueChange::Added { key, value } => {
                    json!({ "op": "add", "key": key, "value": value.to_plain_json() })
                }
                ValueChange::Removed { key, value } => {
                    json!({ "op": "remove", "key": key, "value": value.to_plain_json() })
                }
                ValueChange::Modified { key, old, new } => json!({
                    "op": "modify",
                    "key": key,
                    "old": old.to_plain_json(),
                    "new": new.to_plain_json(),
                }),
            })
            .collect();
        println!("{}", json!({ "key": key.as_str(), "changes": changes }));
        return Ok(());
    }

    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    for change in &diff.changes {
        match change {
            ValueChange::Added { key, value } => {
                println!("{} {}: {}", "+".green(), key, summary(value))
            }
            ValueChange::Removed { key, value } => {
                println!("{} {}: {}", "-".red(), key, summary(value))
            }
            ValueChange::Modified { key, old, new } => {
                println!("{} {}: {} → {}", "~".yellow(), key, summary(old), summary(new))
            }
        }
    }
    println!(
        "{} added, {} removed, {} modified",
        diff.additions(),
        diff.removals(),
        diff.modifications()
    );
    Ok(())
}

/// One-line rendering of a value.
fn summary(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("object({})", map.len()),
        Value::Array(items) => format!("array({})", items.len()),
        Value::Map(entries) => format!("Map({})", entries.len()),
        Value::Set(members) => format!("Set({})", members.len()),
        Value::Date(date) => format!("Date {}", date.to_rfc3339()),
        Value::Symbol(desc) => format!("Symbol({})", desc.as_deref().unwrap_or("")),
        Value::Function(f) => format!("Function {}", f.name),
        Value::Class(c) => format!("{} {{{} fields}}", c.name, c.fields.len()),
        Value::Error(e) => format!("{}: {}", e.name, e.message),
        Value::Element(el) => format!("<{}>", el.selector()),
        Value::Weak => "weak (not persisted)".into(),
        plain => plain.to_plain_json().to_string(),
    }
}

/// Indented tree rendering, one node per line.
fn tree(value: &Value, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let children: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) | Value::Set(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("[{}]", i), v))
            .collect(),
        Value::Map(entries) => entries.iter().map(|(k, v)| (summary(k), v)).collect(),
        Value::Class(c) => c.fields.iter().map(|(k, v)| (k.clone(), v)).collect(),
        leaf => {
            out.push_str(&format!("{}{}\n", pad, summary(leaf)));
            return;
        }
    };
    for (label, child) in children {
        out.push_str(&format!("{}{}: {}\n", pad, label.cyan(), summary(child)));
        if matches!(
            child,
            Value::Object(_) | Value::Array(_) | Value::Set(_) | Value::Map(_) | Value::Class(_)
        ) {
            tree(child, depth + 1, out);
        }
    }
}
