// src/loader/tmx_loader.rs
//! TMX maps and TSX tile sets.

use crate::assets::{resolve_relative, AssetSource};
use crate::error::{MapError, MapResult};
use crate::gid::{split_cell, TileFlags, GID_MASK};
use crate::map::*;
use crate::tileset::{SpriteSheet, TileSet, TileSets};
use base64::Engine as _;
use rayon::prelude::*;
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

fn str_attr<'a>(el: Node<'a, '_>, name: &str) -> &'a str {
    el.attribute(name).unwrap_or("")
}

fn num_attr<T: FromStr + Default>(el: Node<'_, '_>, name: &str) -> MapResult<T> {
    match el.attribute(name).map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(raw) => raw.parse().map_err(|_| MapError::InvalidAttribute {
            element: el.tag_name().name().to_owned(),
            name: name.to_owned(),
            value: raw.to_owned(),
        }),
    }
}

fn int_attr(el: Node<'_, '_>, name: &str) -> MapResult<u32> {
    num_attr(el, name)
}

fn float_attr(el: Node<'_, '_>, name: &str) -> MapResult<f32> {
    num_attr(el, name)
}

fn bool_attr(el: Node<'_, '_>, name: &str, default: bool) -> bool {
    match el.attribute(name) {
        Some(v) => v.trim() != "0",
        None => default,
    }
}

fn elements<'a, 'input>(el: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    el.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(el: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    elements(el).find(|n| n.has_tag_name(tag))
}

fn parse_document<'input>(text: &'input str, path: &Path) -> MapResult<Document<'input>> {
    Document::parse(text).map_err(|source| MapError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

/// `<properties><property name=".." value=".."/></properties>` below `el`.
fn properties_from_xml(el: Node<'_, '_>) -> Properties {
    let mut out = Properties::new();
    let Some(block) = child(el, "properties") else {
        return out;
    };
    for prop in elements(block).filter(|n| n.has_tag_name("property")) {
        let value = match prop.attribute("value") {
            Some(v) => v.to_owned(),
            // multi-line string properties keep their value in the element text
            None => prop.text().unwrap_or("").to_owned(),
        };
        out.insert(str_attr(prop, "name").to_owned(), value);
    }
    out
}

/// Decode a `<data>` payload into `(tile_ids, tile_rotations)`.
///
/// `encoding` is `base64` (little-endian `u32` words) or `csv`.
pub fn decode_cells(layer: &str, encoding: &str, payload: &str) -> MapResult<(Vec<u32>, Vec<TileFlags>)> {
    let raw: Vec<u32> = match encoding {
        "base64" => {
            let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|e| MapError::cells(layer, format!("bad base64: {e}")))?;
            if bytes.len() % 4 != 0 {
                return Err(MapError::cells(
                    layer,
                    format!("{} bytes is not a whole number of cells", bytes.len()),
                ));
            }
            bytes
                .chunks_exact(4)
                .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
                .collect()
        }
        "csv" => payload
            .split(',')
            .map(str::trim)
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<u32>()
                    .map_err(|_| MapError::cells(layer, format!("bad CSV token '{tok}'")))
            })
            .collect::<MapResult<_>>()?,
        other => {
            return Err(MapError::UnsupportedEncoding {
                layer: layer.to_owned(),
                detail: if other.is_empty() {
                    "missing encoding (XML tile elements)".to_owned()
                } else {
                    format!("unknown layer data encoding '{other}'")
                },
            })
        }
    };

    Ok(raw.into_iter().map(split_cell).unzip())
}

fn decode_tile_layer(el: Node<'_, '_>) -> MapResult<TileLayer> {
    let name = str_attr(el, "name").to_owned();
    let width = int_attr(el, "width")?;
    let height = int_attr(el, "height")?;

    let compression: i64 = num_attr(el, "compressionlevel")?;
    if compression > 0 {
        return Err(MapError::UnsupportedEncoding {
            layer: name,
            detail: format!("compressed layer data not supported (compressionlevel {compression})"),
        });
    }

    let data = child(el, "data").ok_or_else(|| MapError::MissingLayerData { layer: name.clone() })?;
    if let Some(method) = data.attribute("compression").filter(|m| !m.is_empty()) {
        return Err(MapError::UnsupportedEncoding {
            layer: name,
            detail: format!("compressed layer data not supported ({method})"),
        });
    }

    let (tile_ids, tile_rotations) =
        decode_cells(&name, str_attr(data, "encoding"), data.text().unwrap_or(""))?;

    let expected = width as usize * height as usize;
    if tile_ids.len() != expected {
        return Err(MapError::cells(
            &name,
            format!("{} cells for a {width}x{height} layer", tile_ids.len()),
        ));
    }

    debug!(layer = %name, width, height, "decoded tile layer");

    Ok(TileLayer {
        id: int_attr(el, "id")?,
        width,
        height,
        visible: bool_attr(el, "visible", true),
        offset_x: float_attr(el, "offsetx")?.round() as i32,
        offset_y: float_attr(el, "offsety")?.round() as i32,
        properties: properties_from_xml(el),
        tile_ids,
        tile_rotations,
        name,
    })
}

fn decode_object(el: Node<'_, '_>) -> MapResult<MapObject> {
    let class_name = match el.attribute("class") {
        Some(c) if !c.is_empty() => c,
        _ => str_attr(el, "type"),
    };
    let gid = match el.attribute("gid") {
        Some(_) => Some(int_attr(el, "gid")?),
        None => None,
    };
    Ok(MapObject {
        id: int_attr(el, "id")?,
        name: str_attr(el, "name").to_owned(),
        class_name: class_name.to_owned(),
        x: float_attr(el, "x")?,
        y: float_attr(el, "y")?,
        width: float_attr(el, "width")?,
        height: float_attr(el, "height")?,
        gid,
        properties: properties_from_xml(el),
    })
}

fn decode_object_layer(el: Node<'_, '_>) -> MapResult<ObjectLayer> {
    let objects = elements(el)
        .filter(|n| n.has_tag_name("object"))
        .map(decode_object)
        .collect::<MapResult<Vec<_>>>()?;
    let name = str_attr(el, "name").to_owned();
    debug!(layer = %name, objects = objects.len(), "decoded object layer");
    Ok(ObjectLayer {
        id: int_attr(el, "id")?,
        name,
        visible: bool_attr(el, "visible", true),
        properties: properties_from_xml(el),
        objects,
    })
}

/// Tile set attributes, detached from the XML tree so they can cross threads.
struct TilesetDef {
    name: String,
    tile_w: u32,
    tile_h: u32,
    columns: u32,
    tile_count: u32,
    spacing: u32,
    margin: u32,
    image: String,
}

fn tileset_def(el: Node<'_, '_>, label: &str) -> MapResult<TilesetDef> {
    let image = elements(el)
        .next()
        .filter(|n| n.has_tag_name("image"))
        .ok_or_else(|| MapError::MissingTileImage {
            tileset: label.to_owned(),
        })?;
    Ok(TilesetDef {
        name: str_attr(el, "name").to_owned(),
        tile_w: int_attr(el, "tilewidth")?,
        tile_h: int_attr(el, "tileheight")?,
        columns: int_attr(el, "columns")?,
        tile_count: int_attr(el, "tilecount")?,
        spacing: int_attr(el, "spacing")?,
        margin: int_attr(el, "margin")?,
        image: str_attr(image, "source").to_owned(),
    })
}

enum TilesetDecl {
    Inline {
        first_gid: u32,
        owner: PathBuf,
        def: TilesetDef,
    },
    External {
        first_gid: u32,
        source: PathBuf,
    },
}

fn tileset_decl(el: Node<'_, '_>, owner: &Path) -> MapResult<TilesetDecl> {
    let first_gid = int_attr(el, "firstgid")?;
    match el.attribute("source").filter(|s| !s.is_empty()) {
        Some(source) => Ok(TilesetDecl::External {
            first_gid,
            source: resolve_relative(owner, source),
        }),
        None => {
            let label = str_attr(el, "name");
            Ok(TilesetDecl::Inline {
                first_gid,
                owner: owner.to_path_buf(),
                def: tileset_def(el, label)?,
            })
        }
    }
}

fn load_tileset(decl: TilesetDecl, assets: &dyn AssetSource) -> MapResult<TileSet> {
    let (first_gid, owner, def) = match decl {
        TilesetDecl::Inline { first_gid, owner, def } => (first_gid, owner, def),
        TilesetDecl::External { first_gid, source } => {
            let text = assets.read_text(&source)?;
            let doc = parse_document(&text, &source)?;
            let def = tileset_def(doc.root_element(), &source.display().to_string())?;
            (first_gid, source, def)
        }
    };

    let image_path = resolve_relative(&owner, &def.image);
    let image = assets.load_image(&image_path)?;
    let sheet = SpriteSheet::new(image, def.tile_w, def.tile_h, def.columns, def.spacing, def.margin);
    let tile_count = match def.tile_count {
        0 => sheet.tile_count(),
        declared => declared.min(sheet.tile_count()),
    };

    debug!(
        tileset = %def.name,
        first_gid,
        columns = sheet.columns,
        rows = sheet.rows,
        "decoded tile set"
    );

    Ok(TileSet {
        name: def.name,
        first_gid,
        tile_count,
        sheet,
    })
}

fn validate_gids(layers: &[Layer], tilesets: &TileSets) -> MapResult<()> {
    for layer in layers {
        match layer {
            Layer::Tiles(t) => {
                if let Some(&gid) = t
                    .tile_ids
                    .iter()
                    .find(|&&gid| gid != 0 && tilesets.resolve(gid).is_none())
                {
                    return Err(MapError::InvalidTileGid {
                        layer: t.name.clone(),
                        gid,
                    });
                }
            }
            Layer::Objects(o) => {
                for obj in &o.objects {
                    if let Some(raw) = obj.gid {
                        let gid = raw & GID_MASK;
                        if gid == 0 || tilesets.resolve(gid).is_none() {
                            return Err(MapError::InvalidTileGid {
                                layer: o.name.clone(),
                                gid,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Decode a map document already in memory. `path` anchors relative
/// tile set and image references.
pub fn decode_map_str(text: &str, path: &Path, assets: &dyn AssetSource) -> MapResult<TmxMap> {
    let doc = parse_document(text, path)?;
    let root = doc.root_element();

    let mut layers = Vec::new();
    let mut decls = Vec::new();
    for el in elements(root) {
        match el.tag_name().name() {
            "tileset" => decls.push(tileset_decl(el, path)?),
            "layer" => layers.push(Layer::Tiles(decode_tile_layer(el)?)),
            "objectgroup" => layers.push(Layer::Objects(decode_object_layer(el)?)),
            _ => {}
        }
    }

    // independent sets: fetch + decode in parallel, order preserved by collect
    let tilesets = decls
        .into_par_iter()
        .map(|decl| load_tileset(decl, assets))
        .collect::<MapResult<Vec<_>>>()?;
    let tilesets = TileSets::new(tilesets);

    validate_gids(&layers, &tilesets)?;

    let map = TmxMap {
        width: int_attr(root, "width")?,
        height: int_attr(root, "height")?,
        tile_w: int_attr(root, "tilewidth")?,
        tile_h: int_attr(root, "tileheight")?,
        properties: properties_from_xml(root),
        layers,
        tilesets,
    };

    info!(
        path = %path.display(),
        layers = map.layers.len(),
        tilesets = map.tilesets.len(),
        "map decoded"
    );
    Ok(map)
}

/// Read and decode the map at `path`.
#[tracing::instrument(skip(assets))]
pub fn decode_map(path: &Path, assets: &dyn AssetSource) -> MapResult<TmxMap> {
    let text = assets.read_text(path)?;
    decode_map_str(&text, path, assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::gid::pack_cell;
    use macroquad::color::WHITE;
    use macroquad::texture::Image;

    fn assets() -> MemoryAssets {
        MemoryAssets::new()
            .with_image("maps/tiles.png", Image::gen_image_color(128, 128, WHITE))
            .with_image("maps/props.png", Image::gen_image_color(64, 32, WHITE))
    }

    fn b64(cells: &[u32]) -> String {
        let bytes: Vec<u8> = cells.iter().flat_map(|c| c.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn decode(xml: &str, assets: &MemoryAssets) -> MapResult<TmxMap> {
        decode_map_str(xml, Path::new("maps/arena.xml"), assets)
    }

    #[test]
    fn csv_and_base64_decode_identically() {
        let cells = [
            1,
            0,
            pack_cell(3, TileFlags::HORIZONTAL),
            pack_cell(9, TileFlags::VERTICAL | TileFlags::HORIZONTAL),
            0x8000_0002,
            0,
        ];
        let csv = cells.iter().map(u32::to_string).collect::<Vec<_>>().join(",\n");
        let from_csv = decode_cells("l", "csv", &csv).unwrap();
        let from_b64 = decode_cells("l", "base64", &format!("\n   {}\n  ", b64(&cells))).unwrap();
        assert_eq!(from_csv, from_b64);
        assert_eq!(from_csv.0, vec![1, 0, 3, 9, 2, 0]);
        assert_eq!(from_csv.1[2], TileFlags::HORIZONTAL);
        assert_eq!(from_csv.1[4].bits(), 8);
    }

    #[test]
    fn rejects_unknown_encoding() {
        let err = decode_cells("walls", "hex", "00").unwrap_err();
        assert!(matches!(err, MapError::UnsupportedEncoding { ref layer, .. } if layer == "walls"));
        let err = decode_cells("walls", "", "").unwrap_err();
        assert!(matches!(err, MapError::UnsupportedEncoding { .. }));
    }

    #[test]
    fn rejects_truncated_base64_words() {
        let err = decode_cells("l", "base64", "AQID").unwrap_err();
        assert!(matches!(err, MapError::InvalidCellData { .. }));
    }

    #[test]
    fn rejects_bad_csv_token() {
        let err = decode_cells("l", "csv", "1,2,x").unwrap_err();
        assert!(matches!(err, MapError::InvalidCellData { .. }));
    }

    #[test]
    fn decodes_layers_in_document_order() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.4" orientation="orthogonal" width="2" height="2" tilewidth="16" tileheight="16">
  <properties><property name="music" value="arena.ogg"/></properties>
  <tileset firstgid="1" name="tiles" tilewidth="16" tileheight="16">
    <image source="tiles.png" width="128" height="128"/>
  </tileset>
  <layer id="1" name="floor" width="2" height="2">
    <properties>
      <property name="solid" value="false"/>
      <property name="note">line one</property>
    </properties>
    <data encoding="base64">{}</data>
  </layer>
  <objectgroup id="2" name="spawns">
    <properties><property name="team" value="red"/></properties>
    <object id="7" name="player" type="spawn" x="32" y="48.5" width="16" height="16"/>
  </objectgroup>
  <layer id="3" name="roof" width="2" height="2" visible="0">
    <data encoding="csv">
0,2,
3,0
</data>
  </layer>
</map>"#,
            b64(&[1, 0, 0, 4])
        );

        let map = decode(&xml, &assets()).unwrap();
        assert_eq!((map.width, map.height, map.tile_w, map.tile_h), (2, 2, 16, 16));
        assert_eq!(map.properties.get("music").map(String::as_str), Some("arena.ogg"));

        let names: Vec<_> = map.layers.iter().map(Layer::name).collect();
        assert_eq!(names, vec!["floor", "spawns", "roof"]);

        let Layer::Tiles(floor) = &map.layers[0] else { panic!("expected tile layer") };
        assert_eq!(floor.tile_ids, vec![1, 0, 0, 4]);
        assert_eq!(floor.properties["solid"], "false");
        assert_eq!(floor.properties["note"], "line one");

        let Layer::Objects(spawns) = &map.layers[1] else { panic!("expected object layer") };
        assert_eq!(spawns.id, 2);
        assert_eq!(spawns.properties["team"], "red");
        assert_eq!(spawns.objects[0].class_name, "spawn");
        assert_eq!(spawns.objects[0].y, 48.5);

        let Layer::Tiles(roof) = &map.layers[2] else { panic!("expected tile layer") };
        assert!(!roof.visible);
        assert_eq!(roof.tile_ids, vec![0, 2, 3, 0]);
    }

    #[test]
    fn missing_attributes_default_to_zero_and_empty() {
        let xml = r#"<map><layer><data encoding="csv"></data></layer></map>"#;
        let map = decode(xml, &assets()).unwrap();
        assert_eq!((map.width, map.height, map.tile_w, map.tile_h), (0, 0, 0, 0));
        let Layer::Tiles(l) = &map.layers[0] else { panic!("expected tile layer") };
        assert_eq!(l.name, "");
        assert!(l.tile_ids.is_empty());
    }

    #[test]
    fn non_numeric_attribute_is_an_error() {
        let xml = r#"<map width="wide"/>"#;
        let err = decode(xml, &assets()).unwrap_err();
        assert!(matches!(err, MapError::InvalidAttribute { ref name, .. } if name == "width"));
    }

    #[test]
    fn compressed_layers_are_rejected() {
        let xml = r#"<map width="1" height="1"><layer name="l" width="1" height="1" compressionlevel="1"><data encoding="csv">1</data></layer></map>"#;
        assert!(matches!(
            decode(xml, &assets()),
            Err(MapError::UnsupportedEncoding { .. })
        ));

        let xml = r#"<map><layer name="l" width="1" height="1"><data encoding="base64" compression="zlib">AAAA</data></layer></map>"#;
        assert!(matches!(
            decode(xml, &assets()),
            Err(MapError::UnsupportedEncoding { .. })
        ));
    }

    #[test]
    fn layer_without_data_is_an_error() {
        let xml = r#"<map><layer name="empty" width="1" height="1"/></map>"#;
        let err = decode(xml, &assets()).unwrap_err();
        assert!(matches!(err, MapError::MissingLayerData { ref layer } if layer == "empty"));
    }

    #[test]
    fn cell_count_must_match_layer_size() {
        let xml = r#"<map><layer name="oops" width="2" height="2"><data encoding="csv">1,2,3</data></layer></map>"#;
        assert!(matches!(
            decode(xml, &assets()),
            Err(MapError::InvalidCellData { ref layer, .. }) if layer == "oops"
        ));
    }

    #[test]
    fn tileset_needs_leading_image() {
        let xml = r#"<map><tileset firstgid="1" name="bare" tilewidth="16" tileheight="16"><tileoffset x="0" y="0"/><image source="tiles.png"/></tileset></map>"#;
        let err = decode(xml, &assets()).unwrap_err();
        assert!(matches!(err, MapError::MissingTileImage { ref tileset } if tileset == "bare"));
    }

    #[test]
    fn external_tileset_resolves_relative_to_owner() {
        let assets = assets()
            .with_text(
                "maps/sets/props.tsx",
                r#"<tileset name="props" tilewidth="16" tileheight="16" columns="4"><image source="../props.png"/></tileset>"#,
            )
            .with_image("maps/props.png", Image::gen_image_color(64, 32, WHITE));
        let xml = r#"<map width="1" height="1" tilewidth="16" tileheight="16">
            <tileset firstgid="65" source="sets/props.tsx"/>
            <tileset firstgid="1" name="tiles" tilewidth="16" tileheight="16"><image source="tiles.png"/></tileset>
            <layer name="l" width="1" height="1"><data encoding="csv">66</data></layer>
        </map>"#;

        let map = decode(xml, &assets).unwrap();
        let firsts: Vec<_> = map.tilesets.iter().map(|t| t.first_gid).collect();
        assert_eq!(firsts, vec![1, 65]);
        let props = map.tilesets.get(1).unwrap();
        assert_eq!(props.name, "props");
        assert_eq!((props.sheet.columns, props.sheet.rows), (4, 2));
        assert_eq!(map.tilesets.resolve(66).unwrap().rect.x, 16);
    }

    #[test]
    fn missing_external_tileset_is_a_resource_error() {
        let xml = r#"<map><tileset firstgid="1" source="gone.tsx"/></map>"#;
        let err = decode(xml, &assets()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ResourceLoad);
    }

    #[test]
    fn unowned_gid_is_rejected_at_load() {
        let xml = r#"<map><tileset firstgid="1" name="t" tilewidth="16" tileheight="16"><image source="props.png"/></tileset>
            <layer name="ground" width="1" height="1"><data encoding="csv">99</data></layer></map>"#;
        let err = decode(xml, &assets()).unwrap_err();
        assert!(matches!(err, MapError::InvalidTileGid { gid: 99, .. }));
    }

    #[test]
    fn malformed_xml_is_typed() {
        let err = decode("<map", &assets()).unwrap_err();
        assert!(matches!(err, MapError::Xml { .. }));
    }
}
