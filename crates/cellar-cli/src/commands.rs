use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use cellar_log::AppendLog;
use cellar_store::ObjectStore;

use crate::cli::*;
use crate::settings::Settings;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let base = settings.base_dir(cli.root.as_deref());
    let format = cli.format;

    match cli.command {
        Command::Get(args) => cmd_get(&open_store(&settings, &base).await?, args, format).await,
        Command::Put(args) => cmd_put(&open_store(&settings, &base).await?, args, format).await,
        Command::Rm(args) => cmd_rm(&open_store(&settings, &base).await?, args, format).await,
        Command::Clear(args) => cmd_clear(&open_store(&settings, &base).await?, args, format).await,
        Command::Keys(args) => cmd_keys(&open_store(&settings, &base).await?, args, format).await,
        Command::Watch(args) => cmd_watch(open_store(&settings, &base).await?, args, format).await,
        Command::Log(args) => cmd_log(&settings, &base, args, format).await,
    }
}

async fn open_store(settings: &Settings, base: &Path) -> anyhow::Result<ObjectStore> {
    let config = settings.store_config(base);
    ObjectStore::open(config)
        .await
        .with_context(|| format!("cannot open object store under {}", base.display()))
}

fn parse_json(text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("not valid JSON: {text}"))
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "absent".dimmed().to_string(),
    }
}

async fn cmd_get(store: &ObjectStore, args: SlotArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value: Option<Value> = store.read(&args.key, &args.namespace).await?;
    match format {
        OutputFormat::Text => println!("{}", render_value(value.as_ref())),
        OutputFormat::Json => println!(
            "{}",
            json!({ "namespace": args.namespace, "key": args.key, "value": value })
        ),
    }
    Ok(())
}

async fn cmd_put(store: &ObjectStore, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = parse_json(&args.json)?;
    store.write(&args.key, &args.namespace, &value).await?;
    match format {
        OutputFormat::Text => println!(
            "{} Stored {}/{}",
            "✓".green().bold(),
            args.namespace.bold(),
            args.key.yellow()
        ),
        OutputFormat::Json => println!("{}", json!({ "stored": true })),
    }
    Ok(())
}

async fn cmd_rm(store: &ObjectStore, args: SlotArgs, format: OutputFormat) -> anyhow::Result<()> {
    store.remove(&args.key, &args.namespace).await?;
    match format {
        OutputFormat::Text => println!(
            "{} Removed {}/{}",
            "✓".green().bold(),
            args.namespace.bold(),
            args.key.yellow()
        ),
        OutputFormat::Json => println!("{}", json!({ "removed": true })),
    }
    Ok(())
}

async fn cmd_clear(store: &ObjectStore, args: NamespaceArgs, format: OutputFormat) -> anyhow::Result<()> {
    store.remove_all(&args.namespace).await?;
    match format {
        OutputFormat::Text => println!("{} Cleared {}", "✓".green().bold(), args.namespace.bold()),
        OutputFormat::Json => println!("{}", json!({ "cleared": args.namespace })),
    }
    Ok(())
}

async fn cmd_keys(store: &ObjectStore, args: NamespaceArgs, format: OutputFormat) -> anyhow::Result<()> {
    let keys = store.read_all_keys(&args.namespace).await?;
    match format {
        OutputFormat::Text if keys.is_empty() => println!("No keys in {}.", args.namespace.bold()),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
        }
        OutputFormat::Json => println!("{}", json!(keys)),
    }
    Ok(())
}

async fn cmd_watch(store: ObjectStore, args: WatchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = Arc::new(store);
    let mut stream = store.observe::<Value>(&args.key, &args.namespace).await?;

    if args.feed {
        let feeder = Arc::clone(&store);
        let (namespace, key) = (args.namespace.clone(), args.key.clone());
        tokio::spawn(async move {
            if let Err(e) = feed_from_stdin(&feeder, &namespace, &key).await {
                eprintln!("{} {e:#}", "feed stopped:".red());
            }
        });
    }

    let mut seen = 0usize;
    while args.count.map_or(true, |count| seen < count) {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(item) = item else { break };
        let value = item?;
        seen += 1;
        match format {
            OutputFormat::Text => println!("{} {}", format!("[{seen}]").dimmed(), render_value(value.as_ref())),
            OutputFormat::Json => println!("{}", json!({ "seq": seen, "value": value })),
        }
    }
    Ok(())
}

async fn feed_from_stdin(store: &ObjectStore, namespace: &str, key: &str) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            store.remove(key, namespace).await?;
        } else {
            store.write(key, namespace, &parse_json(line)?).await?;
        }
    }
    Ok(())
}

async fn cmd_log(settings: &Settings, base: &Path, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = settings.log_config(base);
    match args.action {
        LogAction::Append { name, json } => {
            let log: AppendLog<Value> = AppendLog::open(&name, config).await?;
            log.append(&parse_json(&json)?).await?;
            match format {
                OutputFormat::Text => println!("{} Appended to {}", "✓".green().bold(), name.bold()),
                OutputFormat::Json => println!("{}", json!({ "appended": name })),
            }
        }
        LogAction::Flush { name, raw: false } => {
            let log: AppendLog<Value> = AppendLog::open(&name, config).await?;
            let records = log.flush().await?;
            match format {
                OutputFormat::Text if records.is_empty() => println!("{} is empty.", name.bold()),
                OutputFormat::Text => {
                    for record in &records {
                        println!("{record}");
                    }
                }
                OutputFormat::Json => println!("{}", Value::Array(records)),
            }
        }
        LogAction::Flush { name, raw: true } => {
            let log: AppendLog<Value> = AppendLog::open(&name, config).await?;
            let frames: Vec<String> = log.flush_raw().await?.iter().map(hex::encode).collect();
            match format {
                OutputFormat::Text if frames.is_empty() => println!("{} is empty.", name.bold()),
                OutputFormat::Text => {
                    for (index, frame) in frames.iter().enumerate() {
                        println!("{} {frame}", format!("#{index}").dimmed());
                    }
                }
                OutputFormat::Json => println!("{}", json!(frames)),
            }
        }
    }
    Ok(())
}
