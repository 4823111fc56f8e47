//! Configuration loading against real files on disk: base file, the
//! environment overlay, and path expansion of the index root.

use std::fs;
use std::path::PathBuf;

use searchbridge_core::config::Config;

fn write_base(dir: &std::path::Path) {
    fs::write(
        dir.join("config.toml"),
        "[search]\nscope = \"default\"\nroot_dir = \"/var/lib/searchbridge\"\n",
    )
    .expect("write config.toml");
}

#[test]
fn base_file_provides_search_options() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_base(dir.path());

    let config = Config::load_for_env(dir.path(), "dev").expect("load config");
    let options = config.search_options().expect("search options");
    assert_eq!(options.scope, "default");
    assert_eq!(options.root_dir, PathBuf::from("/var/lib/searchbridge"));
}

#[test]
fn environment_overlay_wins_over_the_base_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_base(dir.path());
    fs::write(
        dir.path().join("config.prod.toml"),
        "[search]\nscope = \"prod\"\n",
    )
    .expect("write config.prod.toml");

    let prod = Config::load_for_env(dir.path(), "prod").expect("load prod config");
    assert_eq!(prod.search_options().expect("search options").scope, "prod");

    // The dev environment ignores the prod overlay.
    let dev = Config::load_for_env(dir.path(), "dev").expect("load dev config");
    assert_eq!(dev.search_options().expect("search options").scope, "default");
}

#[test]
fn root_dir_is_tilde_expanded() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("config.toml"),
        "[search]\nscope = \"default\"\nroot_dir = \"~/searchbridge/indexes\"\n",
    )
    .expect("write config.toml");

    let config = Config::load_for_env(dir.path(), "dev").expect("load config");
    let options = config.search_options().expect("search options");
    if std::env::var_os("HOME").is_some() {
        assert!(!options.root_dir.to_string_lossy().starts_with('~'));
    }
    assert!(options.root_dir.ends_with("searchbridge/indexes"));
}

#[test]
fn missing_keys_report_their_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_base(dir.path());

    let config = Config::load_for_env(dir.path(), "dev").expect("load config");
    let err = config.get::<String>("search.missing").expect_err("missing key");
    assert!(err.to_string().contains("search.missing"));
}
