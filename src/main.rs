use anyhow::{Context, Result};
use dialoguer::Confirm;
use serde_json::Value;
use std::env;
use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use fileplumb::config::{load_config, Config};
use fileplumb::{
    append_records, classify_and_copy_with_limit, copy_to_with_limit, destination_in, list_files, resolve_collision_with_limit,
    safe_destination, sanitize_filename, Classification, CsvRecord, LogSettings,
};

const USAGE: &str = "\
Usage: fileplumb [--config PATH] <command> [options]

Commands:
  list [--root DIR] [--pattern PAT]       list matching files recursively
  sanitize NAME                           print NAME without invalid characters
  destination NAME --dir DIR [--rename]   print a safe path for NAME inside DIR
  copy FILE [--to DIR]                    copy FILE without overwriting
  by-date FILE [--to DIR]                 copy FILE into DIR/YYYY/MM/
  by-prefix FILE [--to DIR] [--characters N]
                                          copy FILE into DIR/<first N chars>/
  csv --field KEY=VALUE... [--file NAME] [--dir DIR]
                                          append one record to a CSV file
  demo                                    enumerate and show sample conversions";

#[derive(Debug)]
enum Command {
    List { root: Option<PathBuf>, pattern: Option<String> },
    Sanitize { name: String },
    Destination { name: String, dir: PathBuf, rename: bool },
    Copy { file: PathBuf, to: Option<PathBuf> },
    ByDate { file: PathBuf, to: Option<PathBuf> },
    ByPrefix { file: PathBuf, to: Option<PathBuf>, characters: Option<String> },
    Csv { fields: Vec<(String, String)>, file: Option<String>, dir: Option<PathBuf> },
    Demo,
}

#[derive(Debug)]
struct Cli {
    config: Option<PathBuf>,
    command: Command,
}

fn main() -> Result<()> {
    let cli = parse_args(env::args().skip(1)).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!("{}", USAGE);
        e
    })?;
    run(cli).map_err(|e| {
        eprintln!("Error: {:#}", e);
        e
    })
}

fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().context("Failed to resolve current directory")?;
    let cfg = load_config(cli.config.as_deref(), &cwd)?;

    // Best-effort: the tool still works without a log file.
    match LogSettings::new(&cfg.log_name, &cfg.console_level, &cfg.file_level) {
        Ok(settings) => {
            if let Err(e) = settings.with_directory(&cfg.log_dir).install() {
                eprintln!("Warning: logging setup failed: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: {}", e),
    }

    match cli.command {
        Command::List { root, pattern } => {
            let root = root.unwrap_or_else(|| cfg.root.clone());
            let pattern = pattern.unwrap_or_else(|| cfg.pattern.clone());
            for file in list_files(&root, Some(&pattern)) {
                println!("{}", file.display());
            }
        }
        Command::Sanitize { name } => {
            println!("{}", sanitize_filename(&name));
        }
        Command::Destination { name, dir, rename } => {
            let path = destination(&cfg, &name, &dir, rename)?;
            println!("{}", path.display());
        }
        Command::Copy { file, to } => {
            let out = copy_to_with_limit(&file, to.as_deref(), cfg.max_collision_attempts)?;
            println!("{}", out.display());
        }
        Command::ByDate { file, to } => {
            let out = classify_and_copy_with_limit(&file, to.as_deref(), &Classification::ModifiedDate, cfg.max_collision_attempts)?;
            println!("{}", out.display());
        }
        Command::ByPrefix { file, to, characters } => {
            let classification = match characters {
                Some(n) => Classification::name_prefix_from_str(&n)?,
                None => Classification::name_prefix(cfg.prefix_characters)?,
            };
            let out = classify_and_copy_with_limit(&file, to.as_deref(), &classification, cfg.max_collision_attempts)?;
            println!("{}", out.display());
        }
        Command::Csv { fields, file, dir } => {
            let record: CsvRecord = fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            let file = file.unwrap_or_else(|| cfg.csv_file.clone());
            let dir = dir.unwrap_or_else(|| cfg.csv_directory.clone());
            let out = append_records(&[record], &file, &dir)?;
            println!("{}", out.display());
        }
        Command::Demo => demo(&cfg)?,
    }
    Ok(())
}

// An occupied destination is the caller's call: rename when asked to, otherwise prompt.
fn destination(cfg: &Config, name: &str, dir: &Path, rename: bool) -> Result<PathBuf> {
    if let Some(p) = safe_destination(name, dir, false)? {
        return Ok(p);
    }
    let occupied = destination_in(name, dir)?;
    let accept = rename || confirm_rename(&occupied)?;
    if !accept {
        anyhow::bail!("Destination already exists: {}", occupied.display());
    }
    Ok(resolve_collision_with_limit(&occupied, cfg.max_collision_attempts)?)
}

fn confirm_rename(occupied: &Path) -> Result<bool> {
    let prompt = format!("{} already exists. Use a numbered name instead?", occupied.display());
    if io::stdin().is_terminal() {
        return Ok(Confirm::new().with_prompt(prompt).default(false).interact()?);
    }
    println!("{} (y/n, default: n)", prompt);
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_ascii_lowercase().starts_with('y'))
}

fn demo(cfg: &Config) -> Result<()> {
    let files = list_files(&cfg.root, Some(&cfg.pattern));
    println!("{} files matching '{}' under {}", files.len(), cfg.pattern, cfg.root.display());

    let sample = "qwerty~!@#$%^&*().ext";
    println!("sanitize: {} -> {}", sample, sanitize_filename(sample));

    let readme = cfg.root.join("README.md");
    let free = resolve_collision_with_limit(&readme, cfg.max_collision_attempts)?;
    println!("collision: {} -> {}", readme.display(), free.display());
    Ok(())
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Cli> {
    let mut config: Option<PathBuf> = None;
    let mut command: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut root: Option<PathBuf> = None;
    let mut pattern: Option<String> = None;
    let mut dir: Option<PathBuf> = None;
    let mut to: Option<PathBuf> = None;
    let mut file: Option<String> = None;
    let mut characters: Option<String> = None;
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut rename = false;

    fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
        args.next().ok_or_else(|| anyhow::anyhow!("Missing value for {}", flag))
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => config = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--root" => root = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--pattern" => pattern = Some(value(&mut args, &arg)?),
            "--dir" => dir = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--to" => to = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--file" => file = Some(value(&mut args, &arg)?),
            "--characters" => characters = Some(value(&mut args, &arg)?),
            "--rename" => rename = true,
            "--field" => {
                let pair = value(&mut args, &arg)?;
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("--field expects KEY=VALUE, got {:?}", pair))?;
                fields.push((k.to_string(), v.to_string()));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            s if s.starts_with('-') && s.len() > 1 => anyhow::bail!("Unknown option: {}", s),
            _ => {
                if command.is_none() { command = Some(arg); } else { positional.push(arg); }
            }
        }
    }

    let mut positional = positional.into_iter();
    let mut required = |what: &str| {
        positional.next().ok_or_else(|| anyhow::anyhow!("Missing {} argument", what))
    };
    let command = match command.as_deref().unwrap_or("demo") {
        "list" => Command::List { root, pattern },
        "sanitize" => Command::Sanitize { name: required("NAME")? },
        "destination" => {
            let name = required("NAME")?;
            let dir = dir.ok_or_else(|| anyhow::anyhow!("Missing --dir for destination"))?;
            Command::Destination { name, dir, rename }
        }
        "copy" => Command::Copy { file: PathBuf::from(required("FILE")?), to },
        "by-date" => Command::ByDate { file: PathBuf::from(required("FILE")?), to },
        "by-prefix" => Command::ByPrefix { file: PathBuf::from(required("FILE")?), to, characters },
        "csv" => {
            if fields.is_empty() { anyhow::bail!("csv needs at least one --field KEY=VALUE"); }
            Command::Csv { fields, file, dir }
        }
        "demo" => Command::Demo,
        other => anyhow::bail!("Unknown command: {}", other),
    };
    Ok(Cli { config, command })
}
