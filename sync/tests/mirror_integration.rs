use mirror_core::traits::{ContentConverter, Converted};
use mirror_core::types::{RemoteNode, SpaceInfo};
use std::sync::Arc;
use sync::frontmatter;
use sync::{
    JsonFilePersister, MemoryPersister, MirrorState, PullOptions, PushOptions, StatePersister,
    SyncManager
};
use testing::{InMemoryRemote, MirrorFixture};
use tokio::sync::watch;

struct Identity;

impl ContentConverter for Identity {
    fn to_local_format(&self, remote_body: &str) -> Converted {
        Converted {
            text: remote_body.to_string(),
            warnings: Vec::new()
        }
    }

    fn to_remote_format(&self, text: &str) -> Converted {
        Converted {
            text: text.to_string(),
            warnings: Vec::new()
        }
    }
}

fn initial_state() -> MirrorState {
    MirrorState::new(&SpaceInfo {
        id: "100".to_string(),
        key: "DOCS".to_string(),
        name: "Docs".to_string(),
        homepage_id: Some("1".to_string())
    })
}

async fn remote_space() -> Arc<InMemoryRemote> {
    let remote = Arc::new(InMemoryRemote::new("DOCS", "100"));
    remote
        .set_homepage("1", "Home", "Welcome. See [faq](page://4).\n")
        .await;
    remote
        .add_page(RemoteNode::page("2", "Getting Started", Some("1"), 1), "Start here.\n")
        .await;
    remote
        .add_page(RemoteNode::page("3", "Install", Some("2"), 1), "Run it.\n")
        .await;
    remote
        .add_page(
            RemoteNode::page("4", "FAQ", Some("1"), 1),
            "Answers. See [install](page://3#steps).\n"
        )
        .await;
    remote
        .add_page(RemoteNode::page("6", "Notes", Some("1"), 1), "first\n")
        .await;
    remote
        .add_page(RemoteNode::page("7", "Notes", Some("1"), 1), "second\n")
        .await;
    remote.add_folder("f", "Guides", Some("1")).await;
    remote
        .add_page(RemoteNode::page("5", "Deploy", Some("f"), 1), "Ship it.\n")
        .await;
    remote
}

fn manager(
    remote: &Arc<InMemoryRemote>,
    persister: Arc<dyn StatePersister>,
    fixture: &MirrorFixture
) -> SyncManager {
    SyncManager::new(
        remote.clone(),
        Arc::new(Identity),
        persister,
        fixture.root(),
        &config::SyncConfig {
            mtime_tolerance_seconds: 2,
            repair_links: true
        }
    )
}

async fn pulled() -> (MirrorFixture, Arc<InMemoryRemote>, Arc<MemoryPersister>) {
    let fixture = MirrorFixture::new().unwrap();
    let remote = remote_space().await;
    let persister = Arc::new(MemoryPersister::new(Some(initial_state())));
    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    (fixture, remote, persister)
}

fn front_matter(fixture: &MirrorFixture, path: &str) -> frontmatter::FrontMatter {
    let text = fixture.read(path).unwrap();
    frontmatter::parse(path, &text)
        .unwrap()
        .front_matter
        .unwrap()
}

fn edit_body(fixture: &MirrorFixture, path: &str, from: &str, to: &str) {
    let text = fixture.read(path).unwrap();
    fixture.write(path, &text.replace(from, to)).unwrap();
    fixture.touch_future(path, 60).unwrap();
}

#[tokio::test]
async fn test_pull_builds_hierarchical_layout() {
    let (fixture, _remote, persister) = pulled().await;

    assert_eq!(
        fixture.files(),
        vec![
            "README.md",
            "faq.md",
            "getting-started/README.md",
            "getting-started/install.md",
            "guides/deploy.md",
            "notes-2.md",
            "notes.md",
        ]
    );

    let fm = front_matter(&fixture, "getting-started/install.md");
    assert_eq!(fm.page_id.as_deref(), Some("3"));
    assert_eq!(fm.title.as_deref(), Some("Install"));
    assert_eq!(fm.version, Some(1));
    assert_eq!(fm.parent_id.as_deref(), Some("2"));
    assert!(fm.synced_at.is_some());

    let state = persister.current().await.unwrap();
    assert_eq!(state.path_of("6"), Some("notes.md"));
    assert_eq!(state.path_of("7"), Some("notes-2.md"));
    assert_eq!(state.folders["f"].local_path, "guides");
    assert_eq!(state.pages.len(), 7);
}

#[tokio::test]
async fn test_pull_translates_page_links() {
    let (fixture, _remote, _persister) = pulled().await;

    let faq = fixture.read("faq.md").unwrap();
    assert!(faq.contains("[install](getting-started/install.md#steps)"));
    let home = fixture.read("README.md").unwrap();
    assert!(home.contains("[faq](faq.md)"));
}

#[tokio::test]
async fn test_second_pull_is_empty() {
    let (fixture, remote, persister) = pulled().await;

    let report = manager(&remote, persister, &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.changes.is_empty());
    assert!(report.written.is_empty());
}

#[tokio::test]
async fn test_pull_applies_added_modified_deleted() {
    let (fixture, remote, persister) = pulled().await;
    remote.edit_page("2", None, "Start here, updated.\n").await;
    remote
        .add_page(RemoteNode::page("8", "Changelog", Some("1"), 1), "v1\n")
        .await;
    remote.remove("6").await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();

    let ids = |entries: &[mirror_core::types::ChangeEntry]| -> Vec<String> {
        entries.iter().map(|e| e.page_id.clone()).collect()
    };
    assert_eq!(ids(&report.changes.added), vec!["8"]);
    assert_eq!(ids(&report.changes.modified), vec!["2"]);
    assert_eq!(ids(&report.changes.deleted), vec!["6"]);
    assert_eq!(
        report.changes.deleted[0].local_path.as_deref(),
        Some("notes.md")
    );

    assert!(!fixture.exists("notes.md"));
    assert!(fixture.exists("changelog.md"));
    assert!(
        fixture
            .read("getting-started/README.md")
            .unwrap()
            .contains("updated")
    );
    assert_eq!(front_matter(&fixture, "getting-started/README.md").version, Some(2));

    let state = persister.current().await.unwrap();
    assert!(state.path_of("6").is_none());
    assert_eq!(state.path_of("8"), Some("changelog.md"));
}

#[tokio::test]
async fn test_remote_deletion_keeps_locally_edited_file() {
    let (fixture, remote, persister) = pulled().await;
    edit_body(&fixture, "notes.md", "first", "first, with my notes");
    remote.remove("6").await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert_eq!(report.kept, vec!["notes.md"]);
    assert!(report.deleted.is_empty());
    assert!(fixture.exists("notes.md"));
    assert!(persister.current().await.unwrap().path_of("6").is_none());
}

#[tokio::test]
async fn test_title_change_renames_and_repairs_links() {
    let (fixture, remote, persister) = pulled().await;
    remote
        .edit_page("4", Some("Questions"), "Answers. See [install](page://3#steps).\n")
        .await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report.renamed,
        vec![("faq.md".to_string(), "questions.md".to_string())]
    );
    assert!(!fixture.exists("faq.md"));
    assert!(fixture.exists("questions.md"));
    assert!(report.links_repaired >= 1);
    let home = fixture.read("README.md").unwrap();
    assert!(home.contains("[faq](questions.md)"));
    assert!(!fixture.files().iter().any(|f| f.ends_with(".bak")));
    assert_eq!(
        persister.current().await.unwrap().path_of("4"),
        Some("questions.md")
    );
}

#[tokio::test]
async fn test_new_page_with_renamed_pages_old_title_gets_fresh_path() {
    let (fixture, remote, persister) = pulled().await;
    remote
        .edit_page("4", Some("Questions"), "Answers. See [install](page://3#steps).\n")
        .await;
    remote
        .add_page(RemoteNode::page("9", "FAQ", Some("1"), 1), "Fresh answers.\n")
        .await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(
        report.renamed,
        vec![("faq.md".to_string(), "questions.md".to_string())]
    );

    let state = persister.current().await.unwrap();
    assert_eq!(state.path_of("4"), Some("questions.md"));
    assert_eq!(state.path_of("9"), Some("faq-2.md"));
    assert_eq!(front_matter(&fixture, "questions.md").page_id.as_deref(), Some("4"));
    assert_eq!(front_matter(&fixture, "faq-2.md").page_id.as_deref(), Some("9"));
    assert!(fixture.read("faq-2.md").unwrap().contains("Fresh answers."));
    for record in state.records() {
        assert!(fixture.exists(&record.local_path), "{} missing", record.local_path);
    }
    assert!(fixture.read("README.md").unwrap().contains("[faq](questions.md)"));
}

#[tokio::test]
async fn test_deleted_page_path_is_not_handed_to_a_new_page() {
    let (fixture, remote, persister) = pulled().await;
    remote.remove("4").await;
    remote
        .add_page(RemoteNode::page("9", "FAQ", Some("1"), 1), "Fresh answers.\n")
        .await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.deleted, vec!["faq.md"]);

    let state = persister.current().await.unwrap();
    assert!(state.path_of("4").is_none());
    assert_eq!(state.path_of("9"), Some("faq-2.md"));
    assert!(fixture.read("faq-2.md").unwrap().contains("Fresh answers."));
    for record in state.records() {
        assert!(fixture.exists(&record.local_path), "{} missing", record.local_path);
    }
}

#[tokio::test]
async fn test_remote_deletion_leaves_file_owned_by_another_page() {
    let (fixture, remote, persister) = pulled().await;
    fixture
        .write(
            "notes.md",
            &testing::document("42", "Moved In", 1, "2026-01-01T00:00:00Z", "not yours\n")
        )
        .unwrap();
    remote.remove("6").await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.deleted.is_empty());
    assert!(report.kept.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("notes.md left in place")));
    assert!(fixture.read("notes.md").unwrap().contains("not yours"));
    assert!(persister.current().await.unwrap().path_of("6").is_none());
}

#[tokio::test]
async fn test_added_page_does_not_overwrite_untracked_file() {
    let (fixture, remote, persister) = pulled().await;
    fixture.write("changelog.md", "# My own changelog\n").unwrap();
    remote
        .add_page(RemoteNode::page("8", "Changelog", Some("1"), 1), "v1\n")
        .await;

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("changelog.md"));
    assert_eq!(fixture.read("changelog.md").unwrap(), "# My own changelog\n");
    assert!(persister.current().await.unwrap().path_of("8").is_none());
}

#[tokio::test]
async fn test_repaired_links_are_not_local_edits() {
    let (fixture, remote, persister) = pulled().await;
    remote
        .edit_page("4", Some("Questions"), "Answers. See [install](page://3#steps).\n")
        .await;
    manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(fixture.read("README.md").unwrap().contains("[faq](questions.md)"));
    fixture.touch_future("README.md", 60).unwrap();

    let report = manager(&remote, persister, &fixture)
        .push(PushOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(report.order.is_empty(), "{:?}", report.order);
}

#[tokio::test]
async fn test_repair_keeps_genuine_local_edits_pending() {
    let (fixture, remote, persister) = pulled().await;
    edit_body(&fixture, "README.md", "Welcome.", "Welcome, reader.");
    remote
        .edit_page("4", Some("Questions"), "Answers. See [install](page://3#steps).\n")
        .await;
    manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    fixture.touch_future("README.md", 60).unwrap();

    let report = manager(&remote, persister, &fixture)
        .push(PushOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.order, vec!["README.md"]);
}

#[tokio::test]
async fn test_pull_warns_when_remote_replaces_local_edits() {
    let (fixture, remote, persister) = pulled().await;
    edit_body(&fixture, "faq.md", "Answers.", "My answers.");
    remote
        .edit_page("4", None, "New answers. See [install](page://3#steps).\n")
        .await;

    let report = manager(&remote, persister, &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.starts_with("faq.md:") && w.contains("unpushed local edits"))
    );
    let text = fixture.read("faq.md").unwrap();
    assert!(text.contains("New answers."));
    assert!(!text.contains("My answers."));
}

#[tokio::test]
async fn test_homepage_readme_is_never_renamed() {
    let (fixture, remote, persister) = pulled().await;
    remote.edit_page("1", Some("Start Page"), "Welcome back.\n").await;

    let report = manager(&remote, persister, &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.renamed.is_empty());
    assert!(fixture.read("README.md").unwrap().contains("Welcome back."));
}

#[tokio::test]
async fn test_selective_pull_forces_named_pages() {
    let (fixture, remote, persister) = pulled().await;
    remote.edit_page("2", None, "changed\n").await;

    let report = manager(&remote, persister, &fixture)
        .pull(PullOptions {
            pages: vec!["faq.md".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(report.changes.added.is_empty());
    assert_eq!(report.changes.modified.len(), 1);
    assert_eq!(report.changes.modified[0].page_id, "4");
    assert_eq!(report.written, vec!["faq.md"]);
}

#[tokio::test]
async fn test_forced_pull_resyncs_in_place() {
    let (fixture, remote, persister) = pulled().await;
    let before = fixture.files();

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions {
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.changes.added.len(), 7);
    assert!(report.renamed.is_empty());
    assert_eq!(fixture.files(), before);
    assert_eq!(persister.current().await.unwrap().pages.len(), 7);
}

#[tokio::test]
async fn test_push_creates_link_targets_first() {
    let (fixture, remote, persister) = pulled().await;
    fixture
        .write("getting-started/a.md", "# Alpha\n\nNeeds [beta](b.md).\n")
        .unwrap();
    fixture
        .write("getting-started/b.md", "# Beta\n\nStandalone.\n")
        .unwrap();

    let report = manager(&remote, persister.clone(), &fixture)
        .push(PushOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(
        report.order,
        vec!["getting-started/b.md", "getting-started/a.md"]
    );
    assert_eq!(remote.calls().await, vec!["create:Beta", "create:Alpha"]);

    let beta = remote.find_by_title("Beta").await.unwrap();
    let alpha = remote.find_by_title("Alpha").await.unwrap();
    assert_eq!(alpha.parent_id.as_deref(), Some("2"));
    let alpha_body = remote.body(&alpha.id).await.unwrap();
    assert!(alpha_body.contains(&format!("[beta](page://{})", beta.id)));

    // The local document keeps its relative link and gains front matter.
    let local = fixture.read("getting-started/a.md").unwrap();
    assert!(local.contains("[beta](b.md)"));
    let fm = front_matter(&fixture, "getting-started/a.md");
    assert_eq!(fm.page_id.as_deref(), Some(alpha.id.as_str()));
    assert_eq!(fm.version, Some(1));

    let state = persister.current().await.unwrap();
    assert_eq!(state.path_of(&beta.id), Some("getting-started/b.md"));
}

#[tokio::test]
async fn test_push_reports_cycles_and_still_pushes_both() {
    let (fixture, remote, persister) = pulled().await;
    fixture.write("a.md", "# A\n\n[b](b.md)\n").unwrap();
    fixture.write("b.md", "# B\n\n[a](a.md)\n").unwrap();

    let report = manager(&remote, persister, &fixture)
        .push(PushOptions::default())
        .await
        .unwrap();
    assert_eq!(report.cycles, vec![vec!["a.md".to_string(), "b.md".to_string()]]);
    assert_eq!(report.pushed.len(), 2);
}

#[tokio::test]
async fn test_push_conflict_then_force() {
    let (fixture, remote, persister) = pulled().await;
    remote.edit_page("4", None, "Someone else's answers.\n").await;
    edit_body(&fixture, "faq.md", "Answers.", "My answers.");

    let report = manager(&remote, persister.clone(), &fixture)
        .push(PushOptions::default())
        .await
        .unwrap();
    assert!(report.pushed.is_empty());
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path, "faq.md");
    assert_eq!((report.conflicts[0].local, report.conflicts[0].remote), (1, 2));
    assert_eq!(
        remote.body("4").await.as_deref(),
        Some("Someone else's answers.\n")
    );

    let report = manager(&remote, persister, &fixture)
        .push(PushOptions {
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.pushed, vec!["faq.md"]);
    assert_eq!(remote.node("4").await.unwrap().version, Some(3));
    assert!(remote.body("4").await.unwrap().contains("My answers."));
    assert!(
        remote
            .body("4")
            .await
            .unwrap()
            .contains("[install](page://3#steps)")
    );
    assert_eq!(front_matter(&fixture, "faq.md").version, Some(3));
}

#[tokio::test]
async fn test_push_single_file() {
    let (fixture, remote, persister) = pulled().await;
    edit_body(&fixture, "notes.md", "first", "first edited");
    fixture.write("other.md", "# Other\n").unwrap();

    let report = manager(&remote, persister.clone(), &fixture)
        .push(PushOptions {
            file: Some("notes.md".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.pushed, vec!["notes.md"]);
    assert!(remote.find_by_title("Other").await.is_none());

    // Unchanged and named explicitly: nothing to send.
    let report = manager(&remote, persister.clone(), &fixture)
        .push(PushOptions {
            file: Some("faq.md".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.skipped, vec!["faq.md"]);

    let err = manager(&remote, persister, &fixture)
        .push(PushOptions {
            file: Some("missing.md".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_push_dry_run_sends_nothing() {
    let (fixture, remote, persister) = pulled().await;
    fixture.write("new.md", "# New\n").unwrap();

    let report = manager(&remote, persister, &fixture)
        .push(PushOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.order, vec!["new.md"]);
    assert!(remote.calls().await.is_empty());
    assert!(frontmatter::parse("new.md", &fixture.read("new.md").unwrap())
        .unwrap()
        .front_matter
        .is_none());
}

#[tokio::test]
async fn test_cancelled_push_sends_nothing() {
    let (fixture, remote, persister) = pulled().await;
    fixture.write("new.md", "# New\n").unwrap();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = manager(&remote, persister, &fixture)
        .with_cancellation(rx)
        .push(PushOptions::default())
        .await
        .unwrap();
    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(remote.calls().await.is_empty());
}

#[tokio::test]
async fn test_status_reports_both_directions() {
    let (fixture, remote, persister) = pulled().await;
    remote.edit_page("5", None, "Ship it faster.\n").await;
    fixture.write("draft.md", "# Draft\n").unwrap();

    let status = manager(&remote, persister, &fixture).status().await.unwrap();
    assert_eq!(status.changes.modified.len(), 1);
    assert_eq!(status.pending.len(), 1);
    assert_eq!(status.pending[0].path, "draft.md");
    assert!(!fixture.read("guides/deploy.md").unwrap().contains("faster"));
}

#[tokio::test]
async fn test_json_state_file_round_trip() {
    let fixture = MirrorFixture::new().unwrap();
    let remote = remote_space().await;
    let persister = Arc::new(JsonFilePersister::new(fixture.path(".mirror/state.json")));
    persister.save(&initial_state()).await.unwrap();

    let report = manager(&remote, persister.clone(), &fixture)
        .pull(PullOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());

    let raw: serde_json::Value =
        serde_json::from_str(&fixture.read(".mirror/state.json").unwrap()).unwrap();
    assert_eq!(raw["spaceKey"], "DOCS");
    assert_eq!(raw["pages"]["4"], "faq.md");
    assert_eq!(raw["folders"]["f"]["localPath"], "guides");

    let scratch = fixture.path(".mirror/tmp");
    let leftovers = std::fs::read_dir(&scratch)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}
