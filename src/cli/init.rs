//! taskgate init command implementation
//!
//! Creates the data directory, a default config and an empty store.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;
use crate::store::StoreState;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
    store: bool,
}

pub fn run(storage: Storage, output: OutputOptions) -> Result<()> {
    let created_data_dir = !storage.is_initialized();
    storage.init()?;

    let config_path = storage.config_file();
    let created_config = !config_path.exists();
    if created_config {
        Config::default().save(&config_path)?;
    }

    let store_path = storage.store_file();
    let created_store = !store_path.exists();
    if created_store {
        storage.write_json(&store_path, &StoreState::default())?;
    }

    let report = InitReport {
        root: storage.root().to_path_buf(),
        created: InitCreated {
            data_dir: created_data_dir,
            config: created_config,
            store: created_store,
        },
    };

    let header = if created_data_dir || created_config || created_store {
        format!("taskgate initialized in {}", storage.root().display())
    } else {
        format!("taskgate already initialized in {}", storage.root().display())
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", yes_no(created_data_dir));
    human.push_summary("config", yes_no(created_config));
    human.push_summary("store", yes_no(created_store));
    human.push_next_step("taskgate user add <id> --name <name> --email <email>");
    human.push_next_step("taskgate actor set <id>");

    emit_success(output, "init", &report, Some(&human))
}

fn yes_no(created: bool) -> &'static str {
    if created {
        "created"
    } else {
        "exists"
    }
}
