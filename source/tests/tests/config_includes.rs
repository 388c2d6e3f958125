//! End-to-end include resolution against real files on disk, complementing
//! `sentinel-config`'s own in-memory unit tests.

use std::fs;

#[test]
fn included_file_overrides_the_including_file() {
    let dir = tempfile::tempdir().unwrap();
    let root_path = dir.path().join("sentineld.ini");
    let included_path = dir.path().join("overrides.ini");

    fs::write(
        &included_path,
        "[/settings/default]\ntimeout = 30s\n",
    )
    .unwrap();
    fs::write(
        &root_path,
        format!(
            "[/settings/default]\ntimeout = 10s\n\n[/includes]\noverrides = {}\n",
            included_path.display()
        ),
    )
    .unwrap();

    let tree = sentinel_config::load(&root_path).unwrap();
    let defaults = std::collections::HashMap::new();
    assert_eq!(tree.get_duration("/settings/default", "timeout", &defaults), Some(30.0));
}

#[test]
fn directory_include_loads_every_ini_file_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let conf_d = dir.path().join("conf.d");
    fs::create_dir(&conf_d).unwrap();
    fs::write(conf_d.join("01-a.ini"), "[/settings/WEB/server]\nport = 8080\n").unwrap();
    fs::write(conf_d.join("02-b.ini"), "[/settings/WEB/server]\nport = 8443s\n").unwrap();

    let root_path = dir.path().join("sentineld.ini");
    fs::write(
        &root_path,
        format!("[/includes]\nconf_d = {}\n", conf_d.display()),
    )
    .unwrap();

    let tree = sentinel_config::load(&root_path).unwrap();
    let defaults = std::collections::HashMap::new();
    assert_eq!(tree.get_string("/settings/WEB/server", "port", &defaults), Some("8443s".to_string()));
}
