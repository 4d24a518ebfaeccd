use primetower::*;
use std::fs;

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "tools": [
                { "nozzle_diameter": 0.6, "filament_diameter": 2.85,
                  "min_layer_height": 0.1, "max_layer_height": 0.45 }
            ],
            "brim_width": 4
        }"#,
    )
    .unwrap();

    let config = TowerConfig::load_from_path(&path).unwrap();
    assert_eq!(config.brim_width, 4);
    assert_eq!(config.tools.len(), 1);
    assert_eq!(config.tools[0].extrusion_multiplier, 1.0);
    assert_eq!(
        config.prime_tower_band_num_faces,
        TowerConfig::default().prime_tower_band_num_faces
    );
}

#[test]
fn test_invalid_config_is_rejected_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "prime_tower_band_num_faces": 0 }"#).unwrap();

    let err = TowerConfig::load_from_path(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("validate config"), "{message}");
    assert!(message.contains("prime_tower_band_num_faces"), "{message}");
}

#[test]
fn test_malformed_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(TowerConfig::load_from_path(&path).is_err());
}

#[test]
fn test_default_path_is_under_home() {
    if let Ok(path) = TowerConfig::default_config_path() {
        assert!(path.ends_with(".primetower/config.json"));
    }
}
