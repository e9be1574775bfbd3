//! End-to-end tests for the `apply` command.
//!
//! Every test builds local upstream repositories, so they need a `git`
//! binary but no network access.

mod common;
use common::prelude::*;

fn platform(fixture: &CastorFixture) -> Upstream {
    fixture.upstream(
        "platform",
        &[
            ("index.php", "<?php // platform"),
            ("themes/.gitkeep", ""),
            ("config/settings.php", "<?php // default settings"),
        ],
    )
}

fn theme(fixture: &CastorFixture) -> Upstream {
    fixture.upstream("theme", &[("style.css", "body { color: black; }")])
}

#[test]
fn test_apply_nested_entry_wins_regardless_of_order() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let platform = platform(&fixture);
    let theme = theme(&fixture);

    // Nested entry declared first
    fixture.write_manifest(&manifest_of(&[
        git_entry("/themes/x", &theme, "main"),
        git_entry("/", &platform, "main"),
    ]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Applied successfully"));

    assert_eq!(fixture.read("lodge/index.php"), "<?php // platform");
    assert_eq!(
        fixture.read("lodge/themes/x/style.css"),
        "body { color: black; }"
    );
    assert_eq!(git(&fixture.lodge().join("themes/x"), &["rev-parse", "HEAD"]), theme.head());
}

#[test]
fn test_apply_is_idempotent() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let platform = platform(&fixture);
    let theme = theme(&fixture);
    fixture.write("files/settings.php", "<?php // production");
    fixture.write_manifest(&manifest_of(&[
        git_entry("/", &platform, "main"),
        git_entry("/themes/x", &theme, "main"),
        file_entry("/config/settings.php", "files/settings.php"),
    ]));

    fixture.command().arg("apply").assert().success();
    fixture.command().arg("apply").assert().success();

    assert_eq!(
        fixture.read("lodge/config/settings.php"),
        "<?php // production"
    );
    assert_eq!(git(&fixture.lodge(), &["rev-parse", "HEAD"]), platform.head());

    // Nested targets are excluded from the enclosing checkout
    let exclude = fixture.read("lodge/.git/info/exclude");
    assert!(exclude.lines().any(|l| l == "/themes/x"));
    assert!(exclude.lines().any(|l| l == "/config/settings.php"));
    let untracked = git(&fixture.lodge(), &["status", "--porcelain", "--untracked-files=all"]);
    assert!(
        !untracked.contains("themes/x"),
        "unexpected status: {}",
        untracked
    );
}

#[test]
fn test_apply_moves_overlaid_checkout_to_new_commit() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let platform = platform(&fixture);
    let first = platform.head();
    fixture.write("files/settings.php", "<?php // production");
    fixture.write_manifest(&manifest_of(&[
        git_entry("/", &platform, &first),
        file_entry("/config/settings.php", "files/settings.php"),
    ]));
    fixture.command().arg("apply").assert().success();

    let second = platform.commit(
        &[
            ("index.php", "<?php // platform v2"),
            ("config/settings.php", "<?php // new defaults"),
        ],
        "v2",
    );
    fixture.write_manifest(&manifest_of(&[
        git_entry("/", &platform, &second),
        file_entry("/config/settings.php", "files/settings.php"),
    ]));

    fixture.command().arg("apply").assert().success();

    assert_eq!(fixture.read("lodge/index.php"), "<?php // platform v2");
    assert_eq!(
        fixture.read("lodge/config/settings.php"),
        "<?php // production"
    );
    assert_eq!(git(&fixture.lodge(), &["rev-parse", "HEAD"]), second);
}

#[test]
fn test_apply_branch_follows_remote() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let theme = theme(&fixture);
    fixture.write_manifest(&manifest_of(&[git_entry("/", &theme, "main")]));
    fixture.command().arg("apply").assert().success();

    let next = theme.commit(&[("style.css", "body { color: red; }")], "red");
    fixture.command().arg("apply").assert().success();

    assert_eq!(git(&fixture.lodge(), &["rev-parse", "HEAD"]), next);
    assert_eq!(fixture.read("lodge/style.css"), "body { color: red; }");
}

#[test]
fn test_apply_refuses_to_discard_local_changes() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let theme = theme(&fixture);
    fixture.write_manifest(&manifest_of(&[git_entry("/", &theme, "main")]));
    fixture.command().arg("apply").assert().success();

    fixture.write("lodge/style.css", "body { color: hotpink; }");
    let next = theme.commit(&[("style.css", "body { color: red; }")], "red");
    fixture.write_manifest(&manifest_of(&[git_entry("/", &theme, &next)]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ERR] Apply failed"))
        .stderr(predicate::str::contains("Refusing to touch"))
        .stderr(predicate::str::contains("style.css"));

    assert_eq!(fixture.read("lodge/style.css"), "body { color: hotpink; }");
}

#[test]
fn test_apply_refuses_foreign_directory() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let theme = theme(&fixture);
    fixture.write("lodge/themes/x/notes.txt", "mine");
    fixture.write_manifest(&manifest_of(&[git_entry("/themes/x", &theme, "main")]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a git checkout"));

    assert_eq!(fixture.read("lodge/themes/x/notes.txt"), "mine");
}

#[test]
fn test_apply_refuses_nested_target_tracked_by_enclosing_checkout() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let platform = fixture.upstream(
        "platform",
        &[
            ("index.php", "<?php // platform"),
            ("themes/x/style.css", "body { color: gray; }"),
        ],
    );
    let theme = theme(&fixture);
    fixture.write_manifest(&manifest_of(&[
        git_entry("/", &platform, "main"),
        git_entry("/themes/x", &theme, "main"),
    ]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Entry /themes/x failed during apply"))
        .stderr(predicate::str::contains("the checkout at / tracks files there"));

    // The enclosing checkout is untouched and no clone was made
    assert_eq!(fixture.read("lodge/themes/x/style.css"), "body { color: gray; }");
    assert!(!fixture.lodge().join("themes/x/.git").exists());
}

#[test]
fn test_apply_unknown_revision() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let theme = theme(&fixture);
    fixture.write_manifest(&manifest_of(&[git_entry("/", &theme, "v9.9.9")]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Revision 'v9.9.9' not found"));
}

#[test]
fn test_apply_stops_at_failing_entry() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let platform = platform(&fixture);
    let theme = theme(&fixture);
    fixture.write_manifest(&manifest_of(&[
        git_entry("/", &platform, "main"),
        file_entry("/etc/motd", "files/missing-motd"),
        git_entry("/themes/x", &theme, "main"),
    ]));

    fixture
        .command()
        .arg("apply")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Entry /etc/motd failed during apply"));

    // The first entry stays, the third is never attempted
    assert!(fixture.lodge().join("index.php").is_file());
    assert!(!fixture.lodge().join("themes/x/style.css").exists());
}

#[cfg(unix)]
#[test]
fn test_apply_exec_post_freeze_runs_in_lodge() {
    if skip_without_git() {
        return;
    }
    let fixture = CastorFixture::new();
    let theme = theme(&fixture);
    let entry = serde_json::json!({
        "target": "/themes/x",
        "type": "git",
        "repo": theme.url(),
        "version": "main",
        "post_freeze": ["printf '%s %s' \"$CASTOR_PHASE\" \"$CASTOR_TARGET\" > built.txt"]
    });
    fixture.write_manifest(&manifest_of(&[entry.to_string()]));

    fixture.command().arg("apply").assert().success();
    assert!(!fixture.lodge().join("themes/x/built.txt").exists());

    fixture
        .command()
        .args(["apply", "--exec-post-freeze"])
        .assert()
        .success();
    assert_eq!(fixture.read("lodge/themes/x/built.txt"), "apply /themes/x");
}
