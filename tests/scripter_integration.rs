use std::path::Path;
use std::rc::Rc;
use tmxscripter::filesystem::{Filesystem, MockFilesystem};
use tmxscripter::tmx::{DataEncoding, GridTile, parse_map_string};
use tmxscripter::{RunStage, ScripterError, TmxScripter};

const TEST_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="orthogonal" width="3" height="3" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="sprites32" tilewidth="32" tileheight="32">
  <image source="sprites.png" width="512" height="512"/>
 </tileset>
 <layer name="layer1" width="3" height="3">
  <data>
   <tile gid="1" />
   <tile gid="0" />
   <tile gid="0" />

   <tile gid="0" />
   <tile gid="1" />
   <tile gid="0" />

   <tile gid="0" />
   <tile gid="0" />
   <tile gid="1" />
  </data>
 </layer>
</map>
"#;

const ANNOTATED_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE map SYSTEM "http://mapeditor.org/dtd/1.0/map.dtd">
<map version="1.0" orientation="orthogonal" width="1" height="1" tilewidth="32" tileheight="32">
 <properties>
  <property name="notes">  first line
  second line
</property>
 </properties>
 <layer name="layer1" width="1" height="1">
  <data encoding="csv">
1
</data>
 </layer>
</map>
"#;

struct Run {
    fs: Rc<MockFilesystem>,
    scripter: TmxScripter,
}

fn setup(map: &str, script: &str) -> Run {
    let fs = Rc::new(MockFilesystem::new());
    fs.insert("./map.tmx", map);
    fs.insert("./script.lua", script);
    let dyn_fs: Rc<dyn Filesystem> = fs.clone();
    let scripter = TmxScripter::new(dyn_fs, "./map.tmx", "./modified.tmx", "./script.lua");
    Run { fs, scripter }
}

fn run_script(script: &str) -> String {
    let mut run = setup(TEST_MAP, script);
    run.scripter.run().unwrap();
    assert_eq!(run.scripter.stage(), RunStage::Done);
    run.fs.contents_string("modified.tmx").unwrap()
}

fn grid_ids(output: &str, layer: &str) -> Vec<u32> {
    let map = parse_map_string(output).unwrap();
    map.layer_by_name(layer)
        .unwrap_or_else(|| panic!("layer {layer} missing from output"))
        .grid()
        .unwrap()
        .to_gids()
        .into_iter()
        .map(|gid| GridTile::from_gid(gid).id)
        .collect()
}

#[test]
fn no_op_script_leaves_grid_unchanged() {
    let output = run_script(r#"log("nothing to do")"#);
    assert_eq!(grid_ids(&output, "layer1"), vec![1, 0, 0, 0, 1, 0, 0, 0, 1]);
}

#[test]
fn no_listener_output_is_structurally_identical() {
    let output = run_script("");
    assert_eq!(
        parse_map_string(&output).unwrap(),
        parse_map_string(TEST_MAP).unwrap()
    );
    assert!(output.contains(r#"<image source="sprites.png" width="512" height="512"/>"#));

    let mut run = setup(ANNOTATED_MAP, "");
    run.scripter.run().unwrap();
    let output = run.fs.contents_string("modified.tmx").unwrap();
    assert_eq!(
        parse_map_string(&output).unwrap(),
        parse_map_string(ANNOTATED_MAP).unwrap()
    );
    assert!(output.contains(r#"<!DOCTYPE map SYSTEM "http://mapeditor.org/dtd/1.0/map.dtd">"#));
    assert!(output.contains("<property name=\"notes\">  first line\n  second line\n</property>"));
}

#[test]
fn increments_every_tile() {
    let output = run_script(
        r#"
        addEventListener("map", function(m)
            local grid = m:GetLayer("layer1"):GetGrid()
            for y = 0, grid:Height() - 1 do
                for x = 0, grid:Width() - 1 do
                    local tile = grid:TileAt(x, y)
                    tile.Id = tile.Id + 1
                end
            end
            grid:Save()
        end)
        "#,
    );
    assert_eq!(grid_ids(&output, "layer1"), vec![2, 1, 1, 1, 2, 1, 1, 1, 2]);
}

#[test]
fn add_layer_and_set_center() {
    let output = run_script(
        r#"
        addEventListener("map", function(m)
            local grid = m:AddLayer("layer2"):GetGrid()
            grid:TileAt(1, 1).Id = 1
            grid:Save()
        end)
        "#,
    );
    assert_eq!(grid_ids(&output, "layer2"), vec![0, 0, 0, 0, 1, 0, 0, 0, 0]);
    assert_eq!(grid_ids(&output, "layer1"), vec![1, 0, 0, 0, 1, 0, 0, 0, 1]);

    let map = parse_map_string(&output).unwrap();
    let layer2 = map.layer_by_name("layer2").unwrap();
    assert_eq!((layer2.width(), layer2.height()), (3, 3));
    assert_eq!(layer2.encoding(), DataEncoding::Csv);
}

#[test]
fn add_layer_honours_configured_encoding() {
    let mut run = setup(
        TEST_MAP,
        r#"addEventListener("map", function(m) m:AddLayer("layer2") end)"#,
    );
    run.scripter.new_layer_encoding = DataEncoding::Xml;
    run.scripter.run().unwrap();
    let output = run.fs.contents_string("modified.tmx").unwrap();
    let map = parse_map_string(&output).unwrap();
    assert_eq!(map.layer_by_name("layer2").unwrap().encoding(), DataEncoding::Xml);
    assert_eq!(grid_ids(&output, "layer2"), vec![0; 9]);
}

#[test]
fn reads_sibling_json() {
    let mut run = setup(
        TEST_MAP,
        r#"
        addEventListener("map", function(m)
            local data = json.decode(readFile("data.json"))
            local grid = m:GetLayer("layer1"):GetGrid()
            for _, tile in ipairs(grid:TileList()) do
                tile.Id = data.aNumber
            end
            grid:Save()
        end)
        "#,
    );
    run.fs.insert("data.json", r#"{"aNumber":20}"#);
    run.scripter.run().unwrap();
    let output = run.fs.contents_string("modified.tmx").unwrap();
    assert_eq!(grid_ids(&output, "layer1"), vec![20; 9]);
}

#[test]
fn edits_without_save_are_not_written() {
    let output = run_script(
        r#"
        addEventListener("map", function(m)
            local grid = m:GetLayer("layer1"):GetGrid()
            grid:TileAt(0, 0).Id = 7
            grid:TileAt(2, 2).FlipX = true
        end)
        "#,
    );
    assert_eq!(
        parse_map_string(&output).unwrap(),
        parse_map_string(TEST_MAP).unwrap()
    );
}

#[test]
fn flip_flags_persist() {
    let output = run_script(
        r#"
        addEventListener("map", function(m)
            local grid = m:GetLayer("layer1"):GetGrid()
            local tile = grid:TileAt(0, 0)
            tile.FlipX = true
            tile.FlipD = true
            grid:Save()
        end)
        "#,
    );
    let map = parse_map_string(&output).unwrap();
    let grid = map.layer_by_name("layer1").unwrap().grid().unwrap();
    let tile = grid.get(0, 0).unwrap();
    assert_eq!(tile.id, 1);
    assert!(tile.flip_x && tile.flip_d && !tile.flip_y);
    assert!(output.contains(r#"gid="2684354561""#), "{output}");
}

#[test]
fn missing_layer_is_nil() {
    let output = run_script(
        r#"
        addEventListener("map", function(m)
            assert(m:GetLayer("missing") == nil)
        end)
        "#,
    );
    assert_eq!(grid_ids(&output, "layer1"), vec![1, 0, 0, 0, 1, 0, 0, 0, 1]);
}

#[test]
fn file_access_resolves_against_script_directory() {
    let fs = Rc::new(MockFilesystem::new());
    fs.insert("maps/level.tmx", TEST_MAP);
    fs.insert(
        "scripts/level.lua",
        r#"
        local n = json.decode(readFile("values.json")).aNumber
        writeFile("report.txt", "value " .. n)
        "#,
    );
    fs.insert("scripts/values.json", r#"{"aNumber":3}"#);
    fs.insert("values.json", r#"{"aNumber":99}"#);
    fs.insert("maps/values.json", r#"{"aNumber":98}"#);
    let dyn_fs: Rc<dyn Filesystem> = fs.clone();
    let mut scripter =
        TmxScripter::new(dyn_fs, "maps/level.tmx", "build/level.tmx", "scripts/level.lua");
    scripter.run().unwrap();

    assert_eq!(fs.contents_string("scripts/report.txt").unwrap(), "value 3");
    assert!(!fs.exists("report.txt"));
    assert!(!fs.exists("maps/report.txt"));
    assert!(!fs.exists("build/report.txt"));
    assert!(fs.exists("build/level.tmx"));
}

#[test]
fn validation_distinguishes_missing_files() {
    let fs = Rc::new(MockFilesystem::new());
    let dyn_fs: Rc<dyn Filesystem> = fs.clone();
    let mut scripter = TmxScripter::new(dyn_fs, "map.tmx", "out.tmx", "script.lua");

    let err = scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::MissingInput(_)));
    assert_eq!(err.to_string(), "Input file map.tmx does not exist");

    fs.insert("map.tmx", TEST_MAP);
    let err = scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::MissingScript(_)));
    assert_eq!(err.to_string(), "Script file script.lua does not exist");
    assert_eq!(scripter.stage(), RunStage::Init);
}

#[test]
fn malformed_map_is_a_parse_error() {
    let mut run = setup("<map><layer>", "");
    let err = run.scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::Parse(_)), "{err}");
    assert!(!run.fs.exists("modified.tmx"));
}

#[test]
fn syntax_error_is_a_compile_error() {
    let mut run = setup(TEST_MAP, "addEventListener(\"map\", function(m)");
    let err = run.scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::ScriptCompile(_)), "{err}");
    assert!(err.to_string().starts_with("Could not compile script"));
    assert_eq!(run.scripter.stage(), RunStage::MapLoaded);
}

#[test]
fn host_api_misuse_aborts_the_script() {
    let mut run = setup(TEST_MAP, r#"addEventListener("map")"#);
    let err = run.scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::ScriptRuntime { .. }), "{err}");
    assert!(
        err.to_string().contains("Usage: addEventListener(string, func)"),
        "{err}"
    );
    assert!(!run.fs.exists("modified.tmx"));
}

#[test]
fn listener_error_produces_no_output() {
    let mut run = setup(
        TEST_MAP,
        r#"
        addEventListener("map", function(m)
            local grid = m:GetLayer("layer1"):GetGrid()
            grid:TileAt(0, 0).Id = 5
            grid:Save()
            grid:TileAt(3, 0)
        end)
        "#,
    );
    let err = run.scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::ScriptRuntime { .. }));
    let message = err.to_string();
    assert!(message.starts_with(r#"Listener for event "map" failed"#), "{message}");
    assert!(message.contains("TileAt(3, 0) is outside the 3x3 grid"), "{message}");
    assert_eq!(run.scripter.stage(), RunStage::ScriptExecuted);
    assert!(!run.fs.exists("modified.tmx"));
}

#[test]
fn missing_script_data_file_is_reported() {
    let mut run = setup(TEST_MAP, r#"readFile("nope.json")"#);
    let err = run.scripter.run().unwrap_err();
    assert!(err.to_string().starts_with("Could not execute script"), "{err}");
    assert!(err.to_string().contains("Could not read file nope.json"), "{err}");
}

#[test]
fn write_failure_is_an_io_error() {
    let mut run = setup(TEST_MAP, "");
    run.fs.deny_writes("modified.tmx");
    let err = run.scripter.run().unwrap_err();
    assert!(matches!(err, ScripterError::Io { .. }), "{err}");
    assert!(err.to_string().starts_with("Could not open output file"));
    assert_eq!(run.scripter.stage(), RunStage::EventFired);
}

#[test]
fn each_run_starts_with_fresh_listeners() {
    let mut run = setup(
        TEST_MAP,
        r#"
        addEventListener("map", function(m)
            local grid = m:GetLayer("layer1"):GetGrid()
            grid:TileAt(1, 0).Id = grid:TileAt(1, 0).Id + 1
            grid:Save()
        end)
        "#,
    );
    run.scripter.run().unwrap();
    run.scripter.run().unwrap();
    let output = run.fs.contents_string("modified.tmx").unwrap();
    // Both runs read the untouched input, so the cell is incremented once.
    assert_eq!(grid_ids(&output, "layer1"), vec![1, 1, 0, 0, 1, 0, 0, 0, 1]);
    assert!(run.fs.stat(Path::new("modified.tmx")).is_ok());
}
