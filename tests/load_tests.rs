// tests/load_tests.rs

use macroquad::color::Color;
use macroquad::texture::Image;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tmx_arena::{decode_map, ErrorKind, FsAssets, Layer, MapError, Session, TileFlags};

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("tmx_arena_{tag}_{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn write_atlas(path: &PathBuf) {
    let img = Image::gen_image_color(64, 32, Color::from_rgba(10, 20, 30, 255));
    img.export_png(path.to_str().expect("path utf8"));
}

fn write_level(dir: &PathBuf) -> PathBuf {
    fs::create_dir_all(dir.join("maps/sets")).unwrap();
    write_atlas(&dir.join("maps/sets/stone.png"));

    fs::write(
        dir.join("maps/sets/stone.tsx"),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.4" name="stone" tilewidth="16" tileheight="16" tilecount="8" columns="4">
 <image source="stone.png" width="64" height="32"/>
</tileset>"#,
    )
    .unwrap();

    // gid 1 plain, gid 2 mirrored left to right (flag bits 4 << 28)
    let map_path = dir.join("maps/arena.xml");
    fs::write(
        &map_path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.4" orientation="orthogonal" renderorder="right-down" width="2" height="2" tilewidth="16" tileheight="16">
 <tileset firstgid="1" source="sets/stone.tsx"/>
 <layer id="1" name="ground" width="2" height="2">
  <properties>
   <property name="solid" value="true"/>
  </properties>
  <data encoding="csv">
1,1073741826,
0,8
</data>
 </layer>
 <objectgroup id="2" name="spawns"/>
</map>"#,
    )
    .unwrap();
    map_path
}

#[test]
fn loads_level_with_external_tileset_from_disk() {
    let dir = temp_dir("disk");
    let map_path = write_level(&dir);

    let map = decode_map(&map_path, &FsAssets).expect("level should load");
    assert_eq!((map.width, map.height), (2, 2));
    assert_eq!(map.tilesets.len(), 1);

    let Layer::Tiles(ground) = &map.layers[0] else {
        panic!("expected tile layer first");
    };
    assert_eq!(ground.tile_ids, vec![1, 2, 0, 8]);
    assert_eq!(ground.tile_rotations[1], TileFlags::HORIZONTAL);
    assert_eq!(ground.properties.get("solid").map(String::as_str), Some("true"));
    assert!(matches!(map.layers[1], Layer::Objects(_)));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_image_is_a_resource_error() {
    let dir = temp_dir("noimg");
    let map_path = write_level(&dir);
    fs::remove_file(dir.join("maps/sets/stone.png")).unwrap();

    let err = decode_map(&map_path, &FsAssets).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLoad);
    assert!(matches!(err, MapError::Io { .. }));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_map_file_is_an_io_error() {
    let err = decode_map(&PathBuf::from("definitely/not/here.xml"), &FsAssets).unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
}

#[test]
fn session_loads_from_config() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = temp_dir("session");
    write_level(&dir);
    fs::create_dir_all(dir.join("sprites"))?;
    write_atlas(&dir.join("sprites/hero.png"));
    fs::write(
        dir.join("anims.json"),
        r#"{
  "sheets": { "hero": { "image": "sprites/hero.png", "tile_width": 16, "tile_height": 16 } },
  "animations": { "idle": { "sheet": "hero", "frames": [ { "tile": 0, "duration": 250 } ] } }
}"#,
    )?;
    fs::write(
        dir.join("session.json"),
        r#"{ "map": "maps/arena.xml", "animations": "anims.json", "clear_color": [20, 20, 28] }"#,
    )?;

    let session = Session::load(&dir.join("session.json"), &FsAssets)?;
    assert_eq!((session.layers.width, session.layers.height), (32, 32));
    assert!(session.library.get("idle").is_some());
    assert_eq!(session.clear_color, [20, 20, 28]);

    fs::remove_dir_all(&dir).ok();
    Ok(())
}
