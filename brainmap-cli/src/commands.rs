//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use brainmap_core::codec::decode_playbooks;
use brainmap_core::config::workspace_config_path;
use brainmap_core::repository::atomic_write;
use brainmap_core::{
    BrainmapConfig, ImportMode, NavOutcome, NavigationEngine, NodeLayout, Playbook,
    PlaybookRepository, PlaybookStore, StepKind, Target, load_config, repository_from_config,
};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    remote: Option<String>,
) -> anyhow::Result<()> {
    let open = || Session::open(workspace, remote.clone());
    match command {
        Commands::Config { action } => handle_config(action, workspace).await,
        Commands::List => {
            let session = open().await?;
            print!("{}", render_list(&session.store));
            Ok(())
        }
        Commands::Show { title, step } => {
            let session = open().await?;
            let playbook = session
                .store
                .find_by_title(&title)
                .ok_or_else(|| anyhow::anyhow!("No playbook titled '{}'", title))?;
            let focus = step.map(|s| focus_step(playbook, s)).transpose()?;
            print!("{}", render_playbook(playbook, focus));
            Ok(())
        }
        Commands::Follow {
            title,
            step,
            condition,
            link,
        } => {
            let session = open().await?;
            let branch = match (condition, link) {
                (Some(c), None) => BranchChoice::Condition(c),
                (None, Some(l)) => BranchChoice::Link(l),
                _ => anyhow::bail!("Pass exactly one of --condition or --link"),
            };
            let (landed, step) = follow(&session, &title, step, branch).await?;
            let playbook = session
                .store
                .find_by_title(&landed)
                .ok_or_else(|| anyhow::anyhow!("No playbook titled '{}'", landed))?;
            print!("{}", render_playbook(playbook, Some(step)));
            Ok(())
        }
        Commands::Check => {
            let session = open().await?;
            let issues = session.store.audit_links();
            if issues.is_empty() {
                println!("All {} playbooks resolve cleanly.", session.store.len());
                return Ok(());
            }
            for issue in &issues {
                println!("{issue}");
            }
            anyhow::bail!("{} cross-reference problem(s) found", issues.len())
        }
        Commands::Import { file, merge } => {
            let mut session = open().await?;
            let json = tokio::fs::read_to_string(&file).await?;
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            let summary = session.store.import_json(&json, mode)?;
            session.save().await?;
            println!(
                "Imported {} playbook(s) ({} added, {} replaced); {} total.",
                summary.added + summary.replaced,
                summary.added,
                summary.replaced,
                summary.total
            );
            Ok(())
        }
        Commands::Export { file } => {
            let session = open().await?;
            let json = session.store.export_json()?;
            atomic_write(&file, json.as_bytes()).await?;
            println!(
                "Exported {} playbook(s) to {}",
                session.store.len(),
                file.display()
            );
            Ok(())
        }
        Commands::Add { file } => {
            let mut session = open().await?;
            let json = tokio::fs::read_to_string(&file).await?;
            let playbooks = parse_one_or_many(&json, session.store.capacity())?;
            let count = playbooks.len();
            for playbook in playbooks {
                session.store.add(playbook)?;
            }
            session.save().await?;
            println!("Added {count} playbook(s).");
            Ok(())
        }
        Commands::Remove { index } => {
            let mut session = open().await?;
            let removed = session.store.remove(index)?;
            session.save().await?;
            println!("Removed '{}' from node slot {}.", removed.title, index);
            Ok(())
        }
        Commands::Nodes { playbooks_only } => {
            let session = open().await?;
            let layout = NodeLayout::generate(&session.config.visual);
            let incidents = session.store.render_nodes(&layout);
            let out = if playbooks_only {
                serde_json::to_string_pretty(&incidents)?
            } else {
                serde_json::to_string_pretty(&serde_json::json!({
                    "positions": layout.positions,
                    "edges": layout.edges,
                    "incidents": incidents,
                }))?
            };
            println!("{out}");
            Ok(())
        }
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let default_config = BrainmapConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Loaded configuration, collection and the repository it came from.
struct Session {
    config: BrainmapConfig,
    store: PlaybookStore,
    repo: Box<dyn PlaybookRepository>,
}

impl Session {
    /// Load the saved collection, or the built-in playbooks if nothing is saved.
    async fn open(workspace: &Path, remote: Option<String>) -> anyhow::Result<Self> {
        let mut config = load_config(Some(workspace), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
        if let Some(url) = remote {
            config.storage.remote_url = Some(url);
        }
        config.visual.validate()?;

        let repo = repository_from_config(&config.storage, workspace)?;
        let capacity = config.visual.node_slots;
        let mut store = PlaybookStore::new(capacity);
        if !store.load(repo.as_ref()).await? {
            debug!(source = %repo.describe(), "Starting from built-in playbooks");
            store = PlaybookStore::with_defaults(capacity)?;
        }
        Ok(Self {
            config,
            store,
            repo,
        })
    }

    async fn save(&mut self) -> anyhow::Result<()> {
        self.store.save(self.repo.as_ref()).await?;
        Ok(())
    }
}

/// Which branch of a step to take, 1-based.
#[derive(Debug, Clone, Copy)]
enum BranchChoice {
    Condition(usize),
    Link(usize),
}

/// Open `title` at `step` (1-based), take a branch and wait out any
/// transition. Returns the playbook and 0-based step the panel lands on.
async fn follow(
    session: &Session,
    title: &str,
    step: usize,
    branch: BranchChoice,
) -> anyhow::Result<(String, usize)> {
    let store = &session.store;
    let playbook = store
        .find_by_title(title)
        .ok_or_else(|| anyhow::anyhow!("No playbook titled '{}'", title))?;
    let focus = focus_step(playbook, step)?;

    let mut engine = NavigationEngine::new(&session.config.navigation);
    engine.show_panel(playbook);
    engine.try_resolve_target(store, &Target::Step(focus), Instant::now())?;

    let outcome = match branch {
        BranchChoice::Condition(n) => {
            engine.follow_condition(store, one_based(n, "condition")?, Instant::now())
        }
        BranchChoice::Link(n) => engine.follow_link(store, one_based(n, "link")?, Instant::now()),
    };

    match outcome {
        NavOutcome::Ignored(e) => anyhow::bail!("Navigation ignored: {}", e),
        NavOutcome::Switching {
            playbook, ready_at, ..
        } => {
            info!(to = %playbook, "Switching playbook");
            tokio::time::sleep(ready_at.saturating_duration_since(Instant::now())).await;
            engine.tick(Instant::now());
        }
        _ => {}
    }

    let view = engine
        .view()
        .ok_or_else(|| anyhow::anyhow!("Panel closed unexpectedly"))?;
    Ok((view.playbook.clone(), view.step))
}

fn one_based(n: usize, what: &str) -> anyhow::Result<usize> {
    n.checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("{} numbers start at 1", what))
}

fn focus_step(playbook: &Playbook, step: usize) -> anyhow::Result<usize> {
    let position = one_based(step, "step")?;
    if position >= playbook.steps.len() {
        anyhow::bail!(
            "'{}' has {} steps; step {} does not exist",
            playbook.title,
            playbook.steps.len(),
            step
        );
    }
    Ok(position)
}

/// Accept either a single playbook object or an array of them.
fn parse_one_or_many(json: &str, capacity: u32) -> anyhow::Result<Vec<Playbook>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let document = if value.is_object() {
        serde_json::Value::Array(vec![value]).to_string()
    } else {
        json.to_string()
    };
    Ok(decode_playbooks(&document, capacity)?)
}

fn render_list(store: &PlaybookStore) -> String {
    let mut playbooks: Vec<&Playbook> = store.all().iter().collect();
    playbooks.sort_by_key(|p| p.index);

    let mut out = String::new();
    for p in playbooks {
        out.push_str(&format!(
            "{:>4}  {}  {}  ({} steps)\n",
            p.index,
            p.color,
            p.title,
            p.steps.len()
        ));
    }
    out
}

fn render_playbook(playbook: &Playbook, focus: Option<usize>) -> String {
    let mut out = format!(
        "{}  [slot {}, {}]\n",
        playbook.title, playbook.index, playbook.color
    );
    for (i, step) in playbook.steps.iter().enumerate() {
        let marker = if focus == Some(i) { '>' } else { ' ' };
        let kind = match step.kind {
            StepKind::Standard => String::new(),
            StepKind::Condition => format!(" ({})", step.kind.as_str()),
        };
        out.push_str(&format!("{marker} {}. {}{kind}\n", i + 1, step.title));
        if !step.description.is_empty() {
            out.push_str(&format!("     {}\n", step.description));
        }
        for (n, c) in step.active_conditions().iter().enumerate() {
            out.push_str(&format!("     ? {}. {} -> {}\n", n + 1, c.title, c.target));
        }
        for (n, l) in step.links.iter().enumerate() {
            out.push_str(&format!("     @ {}. {} -> {}\n", n + 1, l.title, l.target));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// A workspace with a fast transition so `follow` doesn't sleep long.
    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[navigation]\ntransition_ms = 5\n").unwrap();
        dir
    }

    async fn session(dir: &TempDir) -> Session {
        Session::open(dir.path(), None).await.unwrap()
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();

        let config_path = workspace.join(".brainmap").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: BrainmapConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, BrainmapConfig::default());
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = workspace();
        let config_path = workspace_config_path(dir.path());
        let before = std::fs::read_to_string(&config_path).unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, dir.path(), None).await.unwrap();
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_config_commands_skip_playbook_loading() {
        let dir = workspace();
        std::fs::write(dir.path().join("playbooks.json"), "not json").unwrap();

        let show = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(show, dir.path(), None).await.is_ok());
        assert!(handle_command(Commands::List, dir.path(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_session_falls_back_to_builtin_playbooks() {
        let dir = workspace();
        let session = session(&dir).await;
        assert_eq!(session.store.len(), 4);
        assert!(!dir.path().join("playbooks.json").exists());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = workspace();
        handle_command(Commands::Remove { index: 45 }, dir.path(), None)
            .await
            .unwrap();

        assert!(dir.path().join("playbooks.json").exists());
        let session = session(&dir).await;
        assert_eq!(session.store.len(), 3);
        assert!(session.store.find_by_index(45).is_none());
    }

    #[tokio::test]
    async fn test_add_single_object() {
        let dir = workspace();
        let file = dir.path().join("insider.json");
        std::fs::write(
            &file,
            r##"{ "title": "Insider Threat", "index": 7, "color": "#336699",
                 "steps": [ { "title": "Preserve evidence" }, { "title": "Escalate to HR" } ] }"##,
        )
        .unwrap();

        handle_command(Commands::Add { file }, dir.path(), None)
            .await
            .unwrap();
        let session = session(&dir).await;
        assert_eq!(session.store.len(), 5);
        assert_eq!(
            session.store.find_by_index(7).unwrap().title,
            "Insider Threat"
        );
    }

    #[tokio::test]
    async fn test_add_duplicate_saves_nothing() {
        let dir = workspace();
        let file = dir.path().join("dup.json");
        std::fs::write(
            &file,
            r##"[ { "title": "Phishing", "index": 3, "color": "#000000", "steps": [ { "title": "A" } ] } ]"##,
        )
        .unwrap();

        assert!(
            handle_command(Commands::Add { file }, dir.path(), None)
                .await
                .is_err()
        );
        assert!(!dir.path().join("playbooks.json").exists());
    }

    #[tokio::test]
    async fn test_import_export_roundtrip() {
        let dir = workspace();
        let exported = dir.path().join("out").join("export.json");
        handle_command(
            Commands::Export {
                file: exported.clone(),
            },
            dir.path(),
            None,
        )
        .await
        .unwrap();

        handle_command(Commands::Remove { index: 20 }, dir.path(), None)
            .await
            .unwrap();
        handle_command(
            Commands::Import {
                file: exported,
                merge: true,
            },
            dir.path(),
            None,
        )
        .await
        .unwrap();

        let session = session(&dir).await;
        assert_eq!(session.store.len(), 4);
        assert!(session.store.find_by_title("Phishing").is_some());
    }

    #[tokio::test]
    async fn test_follow_condition_across_playbooks() {
        let dir = workspace();
        let session = session(&dir).await;

        let landed = follow(&session, "Phishing", 2, BranchChoice::Condition(1))
            .await
            .unwrap();
        assert_eq!(landed, ("Malware Attack".to_string(), 2));
    }

    #[tokio::test]
    async fn test_follow_in_page_condition() {
        let dir = workspace();
        let session = session(&dir).await;

        let landed = follow(&session, "Phishing", 2, BranchChoice::Condition(2))
            .await
            .unwrap();
        assert_eq!(landed, ("Phishing".to_string(), 3));
    }

    #[tokio::test]
    async fn test_follow_rejects_bad_positions() {
        let dir = workspace();
        let session = session(&dir).await;

        assert!(
            follow(&session, "Phishing", 9, BranchChoice::Link(1))
                .await
                .is_err()
        );
        assert!(
            follow(&session, "Phishing", 2, BranchChoice::Condition(0))
                .await
                .is_err()
        );
        // step 1 has no links
        assert!(
            follow(&session, "Phishing", 1, BranchChoice::Link(1))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_check_reports_broken_reference() {
        let dir = workspace();
        assert!(handle_command(Commands::Check, dir.path(), None).await.is_ok());

        handle_command(Commands::Remove { index: 150 }, dir.path(), None)
            .await
            .unwrap();
        assert!(handle_command(Commands::Check, dir.path(), None).await.is_err());
    }

    #[test]
    fn test_render_list_sorted_by_slot() {
        let store = PlaybookStore::with_defaults(200).unwrap();
        let listing = render_list(&store);
        let titles: Vec<&str> = listing
            .lines()
            .map(|l| l.trim_start().split("  ").nth(2).unwrap())
            .collect();
        assert_eq!(
            titles,
            vec!["Phishing", "Ransomware", "Malware Attack", "Data Exfiltration"]
        );
    }

    #[test]
    fn test_render_playbook_marks_focus() {
        let store = PlaybookStore::with_defaults(200).unwrap();
        let phishing = store.find_by_title("Phishing").unwrap();
        let text = render_playbook(phishing, Some(1));

        assert!(text.starts_with("Phishing  [slot 20, "));
        let focused: Vec<&str> = text.lines().filter(|l| l.starts_with('>')).collect();
        assert_eq!(focused, vec!["> 2. Analyze the message (condition)"]);
        assert!(text.contains("? 1. Contains attachment -> Malware Attack (step 3)"));
    }

    #[test]
    fn test_parse_one_or_many() {
        let one = r##"{ "title": "A", "index": 1, "color": "#000000", "steps": [ { "title": "x" } ] }"##;
        assert_eq!(parse_one_or_many(one, 200).unwrap().len(), 1);
        let many = format!("[{one}]");
        assert_eq!(parse_one_or_many(&many, 200).unwrap().len(), 1);
        assert!(parse_one_or_many("42", 200).is_err());
    }
}
