use std::fs;
use std::rc::Rc;
use tmxscripter::TmxScripter;
use tmxscripter::filesystem::{Filesystem, RealFilesystem, read_all, write_all};
use tmxscripter::tmx::{GridTile, parse_map_string};

const MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="2" height="2" tilewidth="16" tileheight="16" nextlayerid="2" nextobjectid="1">
 <tileset firstgid="1" source="terrain.tsx"/>
 <layer id="1" name="ground" width="2" height="2">
  <data encoding="csv">
1,2,
3,4
</data>
 </layer>
</map>
"#;

#[test]
fn real_filesystem_basics() {
    let dir = tempfile::tempdir().unwrap();
    let fs = RealFilesystem;
    let nested = dir.path().join("a/b");
    fs.mkdir_all(&nested).unwrap();
    assert!(fs.stat(&nested).unwrap().is_dir);

    let file = nested.join("c.txt");
    write_all(&fs, &file, b"hello").unwrap();
    assert_eq!(fs.stat(&file).unwrap().len, 5);
    assert_eq!(read_all(&fs, &file).unwrap(), b"hello");

    write_all(&fs, &file, b"hi").unwrap();
    assert_eq!(read_all(&fs, &file).unwrap(), b"hi");
    assert_eq!(
        fs.stat(&dir.path().join("missing")).unwrap_err().kind(),
        std::io::ErrorKind::NotFound
    );
}

#[test]
fn run_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("maps")).unwrap();
    fs::create_dir_all(root.join("scripts")).unwrap();
    fs::write(root.join("maps/level.tmx"), MAP).unwrap();
    fs::write(root.join("scripts/offset.json"), r#"{"offset":10}"#).unwrap();
    fs::write(
        root.join("scripts/level.lua"),
        r#"
        local offset = json.decode(readFile("offset.json")).offset
        addEventListener("map", function(m)
            local grid = m:GetLayer("ground"):GetGrid()
            for _, tile in ipairs(grid:TileList()) do
                tile.Id = tile.Id + offset
            end
            grid:Save()
            m:AddLayer("overlay")
            writeFile("done.txt", "ok")
        end)
        "#,
    )
    .unwrap();

    let real: Rc<dyn Filesystem> = Rc::new(RealFilesystem);
    let mut scripter = TmxScripter::new(
        real,
        root.join("maps/level.tmx"),
        root.join("build/out/level.tmx"),
        root.join("scripts/level.lua"),
    );
    scripter.run().unwrap();

    let output = fs::read_to_string(root.join("build/out/level.tmx")).unwrap();
    let map = parse_map_string(&output).unwrap();
    let ids: Vec<u32> = map
        .layer_by_name("ground")
        .unwrap()
        .grid()
        .unwrap()
        .to_gids()
        .into_iter()
        .map(|gid| GridTile::from_gid(gid).id)
        .collect();
    assert_eq!(ids, vec![11, 12, 13, 14]);

    let overlay = map.layer_by_name("overlay").unwrap();
    assert_eq!(overlay.attribute("id"), Some("2"));
    assert_eq!(map.attribute("nextlayerid"), Some("3"));
    assert!(output.contains(r#"<tileset firstgid="1" source="terrain.tsx"/>"#));

    assert_eq!(fs::read_to_string(root.join("scripts/done.txt")).unwrap(), "ok");
}
