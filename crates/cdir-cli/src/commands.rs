use std::path::Path;

use anyhow::Context;
use cdir_directory::{ClassDefinition, Directory, DirectoryConfig, Operation, PlainOptions};
use cdir_store::InMemoryDirectoryStore;
use cdir_types::EntityId;
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => DirectoryConfig::load(path)?,
        None => DirectoryConfig::default(),
    };
    match cli.command {
        Command::Init(args) => cmd_init(args),
        Command::DefineClass(args) => cmd_define_class(args, config),
        Command::Apply(args) => cmd_apply(args, config),
        Command::Show(args) => cmd_show(args, config),
        Command::Config => cmd_config(&config),
    }
}

fn open(state: &Path, config: DirectoryConfig) -> anyhow::Result<Directory> {
    let store = InMemoryDirectoryStore::load(state)
        .with_context(|| format!("reading state file {}", state.display()))?;
    Ok(Directory::new(store, config))
}

fn save(directory: &Directory, state: &Path) -> anyhow::Result<()> {
    directory
        .store()
        .save(state)
        .with_context(|| format!("writing state file {}", state.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    if args.state.exists() {
        anyhow::bail!("{} already exists", args.state.display());
    }
    InMemoryDirectoryStore::new().save(&args.state)?;
    println!(
        "{} Initialized empty directory in {}",
        "✓".green().bold(),
        args.state.display().to_string().bold()
    );
    Ok(())
}

fn cmd_define_class(args: DefineClassArgs, config: DirectoryConfig) -> anyhow::Result<()> {
    let definition: ClassDefinition = read_json(&args.definition)?;
    let directory = open(&args.state, config)?;
    let class_id = directory.define_class(&args.actor, &definition)?;
    save(&directory, &args.state)?;

    println!(
        "{} Defined {} as {}",
        "✓".green().bold(),
        definition.name.bold(),
        class_id.to_string().yellow()
    );
    println!("  Properties: {}", definition.properties.len());
    println!("  Schemas: {}", definition.schemas.len());
    Ok(())
}

fn cmd_apply(args: ApplyArgs, config: DirectoryConfig) -> anyhow::Result<()> {
    let operations: Vec<Operation> = read_json(&args.batch)?;
    let directory = open(&args.state, config)?;
    let count = operations.len();

    match directory.execute_batch(&args.actor, operations) {
        Ok(created) => {
            save(&directory, &args.state)?;
            println!(
                "{} Applied {} operations as {}",
                "✓".green().bold(),
                count,
                args.actor.to_string().cyan()
            );
            for entity_id in created {
                println!("  created {}", entity_id.to_string().yellow());
            }
            Ok(())
        }
        Err(error) => {
            println!(
                "{} Batch rolled back at operation {}",
                "✗".red().bold(),
                error.operation_index.to_string().bold()
            );
            Err(error.into())
        }
    }
}

fn cmd_show(args: ShowArgs, config: DirectoryConfig) -> anyhow::Result<()> {
    let directory = open(&args.state, config)?;
    let entity_id = EntityId(args.entity);
    let entity = directory.entity(entity_id)?;
    let record = directory.to_plain_object(
        entity_id,
        PlainOptions {
            resolve_references: args.resolve,
        },
    )?;

    println!(
        "{} ({}, controller {})",
        entity_id.to_string().yellow().bold(),
        entity.class_id(),
        entity.controller().to_string().cyan()
    );
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_config(config: &DirectoryConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    const CLASS: &str = r#"{
        "name": "Artist",
        "maximum_entities_count": 10,
        "default_entity_creation_voucher_upper_bound": 10,
        "properties": [
            {
                "property_type": {"Single": {"Text": 32}},
                "required": true,
                "unique": false,
                "name": "name"
            },
            {
                "property_type": {"Single": {"Reference": [1, false]}},
                "required": false,
                "unique": false,
                "name": "mentor"
            }
        ],
        "schemas": [[0, 1]]
    }"#;

    const BATCH: &str = r#"[
        {"CreateEntity": {"class_id": 1}},
        {"CreateEntity": {"class_id": 1}},
        {"AddSchemaSupportToEntity": {
            "entity": {"InternalEntityJustAdded": 0},
            "schema_id": 0,
            "values": {"0": {"InputPropertyValue": {"Single": {"Text": "Ada"}}}}
        }},
        {"AddSchemaSupportToEntity": {
            "entity": {"InternalEntityJustAdded": 1},
            "schema_id": 0,
            "values": {
                "0": {"InputPropertyValue": {"Single": {"Text": "Bo"}}},
                "1": {"InternalEntityJustAdded": 0}
            }
        }}
    ]"#;

    struct Workspace {
        _dir: tempfile::TempDir,
        state: PathBuf,
        class: PathBuf,
        batch: PathBuf,
    }

    fn workspace(batch: &str) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let class = dir.path().join("class.json");
        let batch_path = dir.path().join("batch.json");
        std::fs::write(&class, CLASS).unwrap();
        std::fs::write(&batch_path, batch).unwrap();
        Workspace {
            _dir: dir,
            state,
            class,
            batch: batch_path,
        }
    }

    fn run(args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["cdir"];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv)?)
    }

    fn arg(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn init_define_apply_show() {
        let ws = workspace(BATCH);
        run(&["init", arg(&ws.state)]).unwrap();
        run(&["define-class", arg(&ws.state), arg(&ws.class)]).unwrap();
        run(&["apply", arg(&ws.state), arg(&ws.batch)]).unwrap();
        run(&["show", arg(&ws.state), "2", "--resolve"]).unwrap();

        let store = InMemoryDirectoryStore::load(&ws.state).unwrap();
        assert_eq!(store.entity_count(), 2);
        let directory = Directory::new(store, DirectoryConfig::default());
        let record = directory.to_plain_object(EntityId(2), PlainOptions::default()).unwrap();
        assert_eq!(record["mentor"], serde_json::json!(1));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let ws = workspace(BATCH);
        run(&["init", arg(&ws.state)]).unwrap();
        assert!(run(&["init", arg(&ws.state)]).is_err());
    }

    #[test]
    fn failed_batch_keeps_state_file() {
        let ws = workspace(r#"[
            {"CreateEntity": {"class_id": 1}},
            {"AddSchemaSupportToEntity": {"entity": {"InternalEntityJustAdded": 0}, "schema_id": 0}}
        ]"#);
        run(&["init", arg(&ws.state)]).unwrap();
        run(&["define-class", arg(&ws.state), arg(&ws.class)]).unwrap();
        let before = std::fs::read_to_string(&ws.state).unwrap();

        assert!(run(&["apply", arg(&ws.state), arg(&ws.batch)]).is_err());
        assert_eq!(std::fs::read_to_string(&ws.state).unwrap(), before);
    }

    #[test]
    fn member_needs_class_permission() {
        let ws = workspace(BATCH);
        run(&["init", arg(&ws.state)]).unwrap();
        run(&["define-class", arg(&ws.state), arg(&ws.class)]).unwrap();
        assert!(run(&["apply", arg(&ws.state), arg(&ws.batch), "--actor", "member:1"]).is_err());
    }

    #[test]
    fn config_file_is_applied() {
        let ws = workspace(BATCH);
        let config = ws.state.with_file_name("cdir.toml");
        std::fs::write(&config, "max_operations_per_batch = 2\n").unwrap();
        run(&["init", arg(&ws.state)]).unwrap();
        run(&["define-class", arg(&ws.state), arg(&ws.class)]).unwrap();
        let result = run(&["apply", arg(&ws.state), arg(&ws.batch), "--config", arg(&config)]);
        assert!(result.is_err());
        run(&["config", "--config", arg(&config)]).unwrap();
    }
}
